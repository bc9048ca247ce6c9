//! The request pipeline
//!
//! Every inbound data-plane request runs through the same gate order:
//! extract credentials, validate the identity against the token service,
//! authorize the bucket/operation, kick off identity reconciliation, then
//! forward to the backend. Each gate short-circuits; no request revisits an
//! earlier gate.

use axum::body::Body;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::Response;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use bucketgate_auth::{
    Authorizer, FederatedUser, IdentityReconciler, IdentityValidator, S3Request, SigV4Verifier,
    SignatureError,
};
use bucketgate_common::{Error, RequestId};

use crate::forward::{ForwardError, Forwarder};

/// Generic body for faults whose detail stays in the logs
const INTERNAL_ERROR_BODY: &str = "There was an internal server error.";

/// The Auth Gateway: per-request decision pipeline
pub struct Gateway {
    validator: Arc<dyn IdentityValidator>,
    authorizer: Arc<dyn Authorizer>,
    reconciler: Arc<IdentityReconciler>,
    forwarder: Arc<dyn Forwarder>,
    /// SigV4 re-check before forwarding; `None` disables the gate
    verifier: Option<SigV4Verifier>,
    /// Bounds concurrent backend reconciliations
    reconcile_permits: Arc<Semaphore>,
}

impl Gateway {
    /// Assemble the pipeline from its collaborators
    pub fn new(
        validator: Arc<dyn IdentityValidator>,
        authorizer: Arc<dyn Authorizer>,
        reconciler: Arc<IdentityReconciler>,
        forwarder: Arc<dyn Forwarder>,
        verifier: Option<SigV4Verifier>,
        max_concurrent_reconciliations: usize,
    ) -> Self {
        Self {
            validator,
            authorizer,
            reconciler,
            forwarder,
            verifier,
            reconcile_permits: Arc::new(Semaphore::new(max_concurrent_reconciliations)),
        }
    }

    /// Run one request through the pipeline
    pub async fn handle(&self, request: Request, client_addr: SocketAddr) -> Response {
        let request_id = RequestId::new();

        // Gates 1+3: extract credentials and build the normalized view.
        // The descriptor only needs the raw parts, so it is built up front
        // and reused for rejection bodies and the authorization call.
        let s3_request =
            S3Request::from_http(request.method(), request.uri().path(), request.headers());
        debug!(%request_id, client = %client_addr, request = %s3_request, "request received");

        // Gate 2: identity validation
        let user = match self
            .validator
            .validate(
                &s3_request.access_key_id,
                s3_request.session_token.as_deref(),
            )
            .await
        {
            Ok(Some(user)) => user,
            Ok(None) => {
                info!(%request_id, request = %s3_request, "authentication failed");
                return reject(&Error::not_authenticated(s3_request.to_string()));
            }
            Err(e) => {
                error!(%request_id, request = %s3_request, error = %e,
                    "identity validator fault");
                return reject(&Error::ValidatorFault(e.to_string()));
            }
        };

        // Gate 4: authorization. Logged under its own category, distinct
        // from authentication failures.
        if !self.authorizer.authorize(&s3_request, &user).await {
            warn!(%request_id, request = %s3_request, user = %user.user_name,
                "authorization rejected");
            return reject(&Error::not_authorized(s3_request.to_string()));
        }

        // Gate 5: reconcile the backend registry, detached from the
        // response path. Errors are absorbed inside the reconciler.
        self.spawn_reconciliation(user.clone(), request_id);

        // Gate 6a: low-level signature re-check against the federated
        // secret key.
        if let Some(verifier) = &self.verifier {
            match verifier.verify(
                request.method(),
                request.uri(),
                request.headers(),
                &user.credential.secret_key,
            ) {
                Ok(()) => {}
                Err(SignatureError::NotSigV4) => {
                    // Legacy or absent scheme; the token service already
                    // vouched for the identity, so pass, but leave a trace.
                    debug!(%request_id, request = %s3_request, user = %user.user_name,
                        "no SigV4 authorization header, signature re-check skipped");
                }
                Err(e) => {
                    warn!(%request_id, request = %s3_request, user = %user.user_name,
                        error = %e, "signature re-check failed");
                    return reject(&Error::SignatureMismatch);
                }
            }
        }

        // Gate 6b: forward; the backend's response is returned verbatim.
        match self
            .forwarder
            .forward(request, client_addr, &user, request_id)
            .await
        {
            Ok(response) => {
                debug!(%request_id, status = %response.status(), "request forwarded");
                response
            }
            Err(e) => {
                error!(%request_id, request = %s3_request, error = %e, "forwarding fault");
                let error = match e {
                    ForwardError::Timeout => Error::Timeout,
                    ForwardError::Transport(detail) => Error::ForwardingFault(detail),
                };
                reject(&error)
            }
        }
    }

    fn spawn_reconciliation(&self, user: FederatedUser, request_id: RequestId) {
        let permits = self.reconcile_permits.clone();
        let reconciler = self.reconciler.clone();
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                // Semaphore closed during shutdown
                return;
            };
            let mutated = reconciler.reconcile(&user, request_id).await;
            if mutated {
                info!(%request_id, user = %user.user_name, "backend registry reconciled");
            }
        });
    }
}

/// Render a rejection from the error taxonomy: the class picks the status,
/// opaque classes get the generic body and keep their detail in the logs
fn reject(error: &Error) -> Response {
    let status = StatusCode::from_u16(error.http_status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = if error.is_opaque_to_caller() {
        INTERNAL_ERROR_BODY.to_string()
    } else {
        error.to_string()
    };

    Response::builder()
        .status(status)
        .header("content-type", "text/plain; charset=utf-8")
        .body(Body::from(body))
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::empty())
                .expect("empty response")
        })
}

#[cfg(test)]
pub mod test_support {
    //! Minimal gateway wiring for handler tests elsewhere in the binary

    use super::*;
    use async_trait::async_trait;
    use bucketgate_auth::{
        AdminClient, AdminError, AllowAllAuthorizer, BackendUser, Credential, ValidatorError,
    };

    struct NoIdentity;

    #[async_trait]
    impl IdentityValidator for NoIdentity {
        async fn validate(
            &self,
            _access_key_id: &str,
            _session_token: Option<&str>,
        ) -> Result<Option<FederatedUser>, ValidatorError> {
            Ok(None)
        }
    }

    struct NoAdmin;

    #[async_trait]
    impl AdminClient for NoAdmin {
        async fn get_user(&self, _: &str) -> Result<Option<BackendUser>, AdminError> {
            Ok(None)
        }
        async fn create_user(&self, _: &str, _: &Credential, _: bool) -> Result<(), AdminError> {
            Ok(())
        }
        async fn create_credential(&self, _: &str, _: &Credential) -> Result<(), AdminError> {
            Ok(())
        }
        async fn remove_credential(&self, _: &str, _: &str) -> Result<(), AdminError> {
            Ok(())
        }
        async fn list_all_buckets(&self) -> Result<Vec<String>, AdminError> {
            Ok(vec![])
        }
        async fn set_bucket_policy(&self, _: &str, _: &str) -> Result<(), AdminError> {
            Ok(())
        }
    }

    struct NoForward;

    #[async_trait]
    impl Forwarder for NoForward {
        async fn forward(
            &self,
            _request: Request,
            _client_addr: SocketAddr,
            _user: &FederatedUser,
            _request_id: RequestId,
        ) -> Result<Response, crate::forward::ForwardError> {
            Err(crate::forward::ForwardError::Transport("unwired".into()))
        }
    }

    /// Gateway whose collaborators reject everything; for tests that only
    /// exercise the surrounding HTTP surface
    pub fn noop_gateway() -> Arc<Gateway> {
        Arc::new(Gateway::new(
            Arc::new(NoIdentity),
            Arc::new(AllowAllAuthorizer),
            Arc::new(IdentityReconciler::new(Arc::new(NoAdmin))),
            Arc::new(NoForward),
            None,
            1,
        ))
    }
}
