//! Credential and identity types

use serde::{Deserialize, Serialize};

/// An access key pair
///
/// Both halves are opaque strings; equality is exact-match on both fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Access key id presented by the client
    pub access_key_id: String,
    /// Secret key used to sign requests
    pub secret_key: String,
}

impl Credential {
    /// Create a new credential pair
    pub fn new(access_key_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_key: secret_key.into(),
        }
    }
}

/// Identity asserted by the external token service for one request
///
/// Created per-request by the identity validator and owned by that request's
/// pipeline invocation; never persisted or shared across requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederatedUser {
    /// Display name of the federated user
    pub user_name: String,
    /// Group assumed for the current session, if any
    pub assumed_group: Option<String>,
    /// The user's current key pair as issued by the token service
    pub credential: Credential,
}

impl FederatedUser {
    /// Create a new federated user
    pub fn new(user_name: impl Into<String>, credential: Credential) -> Self {
        Self {
            user_name: user_name.into(),
            assumed_group: None,
            credential,
        }
    }

    /// Set the assumed group
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.assumed_group = Some(group.into());
        self
    }
}

/// The storage backend's native view of a user's key pairs
///
/// Fetched on demand during reconciliation and discarded afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackendUser {
    /// User name in the backend registry
    pub user_name: String,
    /// Key pairs registered for the user, in backend order
    pub credentials: Vec<Credential>,
}

impl BackendUser {
    /// Create a backend user view
    pub fn new(user_name: impl Into<String>, credentials: Vec<Credential>) -> Self {
        Self {
            user_name: user_name.into(),
            credentials,
        }
    }
}
