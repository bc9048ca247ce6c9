//! Backend admin-plane client trait
//!
//! The storage backend's native user/credential registry is managed through
//! an administrative API distinct from data-plane object operations. The
//! gateway consumes it through this trait; the REST implementation lives in
//! the gateway binary.

use async_trait::async_trait;

use crate::credential::{BackendUser, Credential};

/// Admin-plane call failure
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("admin endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("admin call rejected: {0}")]
    Rejected(String),
    #[error("admin call timed out")]
    Timeout,
    #[error("unexpected admin response: {0}")]
    Protocol(String),
}

/// Trait for the backend's admin plane
#[async_trait]
pub trait AdminClient: Send + Sync {
    /// Fetch the backend's view of a user, or `None` when absent
    async fn get_user(&self, user_name: &str) -> Result<Option<BackendUser>, AdminError>;

    /// Create a user with an initial credential pair
    ///
    /// `system` marks the account as privileged/system-managed on the
    /// backend.
    async fn create_user(
        &self,
        user_name: &str,
        credential: &Credential,
        system: bool,
    ) -> Result<(), AdminError>;

    /// Register an additional credential pair for an existing user
    async fn create_credential(
        &self,
        user_name: &str,
        credential: &Credential,
    ) -> Result<(), AdminError>;

    /// Remove a credential pair by access key id
    async fn remove_credential(
        &self,
        user_name: &str,
        access_key_id: &str,
    ) -> Result<(), AdminError>;

    /// List every bucket known to the backend (admin-plane probe mode)
    async fn list_all_buckets(&self) -> Result<Vec<String>, AdminError>;

    /// Install a policy document on a bucket
    async fn set_bucket_policy(
        &self,
        bucket: &str,
        policy_document: &str,
    ) -> Result<(), AdminError>;
}
