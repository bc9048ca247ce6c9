//! REST client for the token-issuing identity service
//!
//! The gateway asks the STS-like service to validate the credential material
//! extracted from the request. A recognized credential yields the federated
//! user and its current key pair; an unknown one yields nothing; a failure
//! of the service itself is a distinct fault class.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use bucketgate_auth::{Credential, FederatedUser, IdentityValidator, ValidatorError};

#[derive(Serialize)]
struct ValidateRequest<'a> {
    access_key_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_token: Option<&'a str>,
}

#[derive(Deserialize)]
struct ValidateResponse {
    user_name: String,
    #[serde(default)]
    assumed_group: Option<String>,
    secret_key: String,
}

/// Identity validator backed by the token service's REST API
pub struct RestStsValidator {
    client: reqwest::Client,
    endpoint: String,
}

impl RestStsValidator {
    /// Create a validator against the given STS endpoint
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl IdentityValidator for RestStsValidator {
    async fn validate(
        &self,
        access_key_id: &str,
        session_token: Option<&str>,
    ) -> Result<Option<FederatedUser>, ValidatorError> {
        if access_key_id.is_empty() {
            return Ok(None);
        }

        let response = self
            .client
            .post(format!("{}/v1/validate", self.endpoint))
            .json(&ValidateRequest {
                access_key_id,
                session_token,
            })
            .send()
            .await
            .map_err(|e| ValidatorError::Unreachable(e.to_string()))?;

        match response.status() {
            s if s.is_success() => {
                let body: ValidateResponse = response
                    .json()
                    .await
                    .map_err(|e| ValidatorError::Internal(e.to_string()))?;
                debug!(user = %body.user_name, "token service recognized credential");
                let mut user = FederatedUser::new(
                    body.user_name,
                    Credential::new(access_key_id, body.secret_key),
                );
                user.assumed_group = body.assumed_group;
                Ok(Some(user))
            }
            s if s == reqwest::StatusCode::UNAUTHORIZED
                || s == reqwest::StatusCode::FORBIDDEN
                || s == reqwest::StatusCode::NOT_FOUND =>
            {
                Ok(None)
            }
            s => Err(ValidatorError::Internal(format!(
                "unexpected status {s} from token service"
            ))),
        }
    }
}
