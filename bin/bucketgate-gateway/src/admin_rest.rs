//! REST client for the backend admin plane, plus the backend prober
//!
//! The storage backend exposes its user/credential registry and bucket
//! administration under an admin endpoint separate from the data plane.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use bucketgate_auth::{AdminClient, AdminError, BackendUser, Credential};
use bucketgate_common::HealthCheckMethod;
use bucketgate_health::{ProbeOutcome, Prober};

#[derive(Deserialize)]
struct UserResponse {
    user_name: String,
    #[serde(default)]
    credentials: Vec<CredentialWire>,
}

#[derive(Serialize, Deserialize)]
struct CredentialWire {
    access_key_id: String,
    secret_key: String,
}

#[derive(Serialize)]
struct CreateUserRequest<'a> {
    user_name: &'a str,
    access_key_id: &'a str,
    secret_key: &'a str,
    system: bool,
}

#[derive(Serialize)]
struct SetPolicyRequest<'a> {
    policy: &'a str,
}

/// Admin client speaking the backend's REST admin API
pub struct RestAdminClient {
    client: reqwest::Client,
    endpoint: String,
}

impl RestAdminClient {
    /// Create an admin client against the given admin endpoint
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }
}

/// Percent-encode one URL path segment; user and bucket names come from
/// outside and may carry separators
fn encode_segment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn map_send_error(e: &reqwest::Error) -> AdminError {
    if e.is_timeout() {
        AdminError::Timeout
    } else {
        AdminError::Unreachable(e.to_string())
    }
}

async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response, AdminError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let detail = response.text().await.unwrap_or_default();
        Err(AdminError::Rejected(format!("{status}: {detail}")))
    }
}

#[async_trait]
impl AdminClient for RestAdminClient {
    async fn get_user(&self, user_name: &str) -> Result<Option<BackendUser>, AdminError> {
        let response = self
            .client
            .get(self.url(&format!("/v1/users/{}", encode_segment(user_name))))
            .send()
            .await
            .map_err(|e| map_send_error(&e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: UserResponse = expect_success(response)
            .await?
            .json()
            .await
            .map_err(|e| AdminError::Protocol(e.to_string()))?;

        Ok(Some(BackendUser::new(
            body.user_name,
            body.credentials
                .into_iter()
                .map(|c| Credential::new(c.access_key_id, c.secret_key))
                .collect(),
        )))
    }

    async fn create_user(
        &self,
        user_name: &str,
        credential: &Credential,
        system: bool,
    ) -> Result<(), AdminError> {
        let response = self
            .client
            .post(self.url("/v1/users"))
            .json(&CreateUserRequest {
                user_name,
                access_key_id: &credential.access_key_id,
                secret_key: &credential.secret_key,
                system,
            })
            .send()
            .await
            .map_err(|e| map_send_error(&e))?;
        expect_success(response).await.map(|_| ())
    }

    async fn create_credential(
        &self,
        user_name: &str,
        credential: &Credential,
    ) -> Result<(), AdminError> {
        let response = self
            .client
            .post(self.url(&format!(
                "/v1/users/{}/access-keys",
                encode_segment(user_name)
            )))
            .json(&CredentialWire {
                access_key_id: credential.access_key_id.clone(),
                secret_key: credential.secret_key.clone(),
            })
            .send()
            .await
            .map_err(|e| map_send_error(&e))?;
        expect_success(response).await.map(|_| ())
    }

    async fn remove_credential(
        &self,
        user_name: &str,
        access_key_id: &str,
    ) -> Result<(), AdminError> {
        let response = self
            .client
            .delete(self.url(&format!(
                "/v1/users/{}/access-keys/{}",
                encode_segment(user_name),
                encode_segment(access_key_id)
            )))
            .send()
            .await
            .map_err(|e| map_send_error(&e))?;
        expect_success(response).await.map(|_| ())
    }

    async fn list_all_buckets(&self) -> Result<Vec<String>, AdminError> {
        let response = self
            .client
            .get(self.url("/v1/buckets"))
            .send()
            .await
            .map_err(|e| map_send_error(&e))?;
        expect_success(response)
            .await?
            .json()
            .await
            .map_err(|e| AdminError::Protocol(e.to_string()))
    }

    async fn set_bucket_policy(
        &self,
        bucket: &str,
        policy_document: &str,
    ) -> Result<(), AdminError> {
        let response = self
            .client
            .put(self.url(&format!(
                "/v1/buckets/{}/policy",
                encode_segment(bucket)
            )))
            .json(&SetPolicyRequest {
                policy: policy_document,
            })
            .send()
            .await
            .map_err(|e| map_send_error(&e))?;
        expect_success(response).await.map(|_| ())
    }
}

/// Liveness prober dispatching on the configured probe mode
pub struct BackendProber {
    method: HealthCheckMethod,
    admin: Arc<dyn AdminClient>,
    data_client: reqwest::Client,
    data_endpoint: String,
    bucket: String,
}

impl BackendProber {
    /// Create a prober for the configured mode
    pub fn new(
        method: HealthCheckMethod,
        admin: Arc<dyn AdminClient>,
        data_endpoint: impl Into<String>,
        bucket: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let data_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            method,
            admin,
            data_client,
            data_endpoint: data_endpoint.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
        })
    }

    async fn probe_one_bucket(&self) -> ProbeOutcome {
        let url = format!("{}/{}", self.data_endpoint, self.bucket);
        match self.data_client.head(&url).send().await {
            Ok(response) if response.status().is_success() => ProbeOutcome::Ok,
            Ok(response) => ProbeOutcome::Failed(format!(
                "bucket {} returned {}",
                self.bucket,
                response.status()
            )),
            Err(e) => ProbeOutcome::Failed(e.to_string()),
        }
    }
}

#[async_trait]
impl Prober for BackendProber {
    async fn probe(&self) -> ProbeOutcome {
        match self.method {
            HealthCheckMethod::ListAllBuckets => match self.admin.list_all_buckets().await {
                Ok(_) => ProbeOutcome::Ok,
                Err(e) => ProbeOutcome::Failed(e.to_string()),
            },
            HealthCheckMethod::ListOneBucket => self.probe_one_bucket().await,
        }
    }
}
