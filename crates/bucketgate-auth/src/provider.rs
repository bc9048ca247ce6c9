//! Identity validation and authorization collaborator traits
//!
//! The gateway consumes the token service and the policy decision point
//! through these traits; REST-backed implementations live in the gateway
//! binary, mocks live in tests.

use async_trait::async_trait;

use crate::credential::FederatedUser;
use crate::request::S3Request;

/// Failure of the identity service itself
///
/// Distinct from "credentials unknown": these are transport or internal
/// faults that render as 500, with detail kept out of the response body.
#[derive(Debug, thiserror::Error)]
pub enum ValidatorError {
    #[error("identity service unreachable: {0}")]
    Unreachable(String),
    #[error("identity service internal error: {0}")]
    Internal(String),
}

/// Trait for the token-service identity validator
#[async_trait]
pub trait IdentityValidator: Send + Sync {
    /// Validate the extracted credential material
    ///
    /// Returns `Ok(Some(user))` for a recognized credential, `Ok(None)` for
    /// an unknown/invalid one, and `Err` only when the service itself fails.
    async fn validate(
        &self,
        access_key_id: &str,
        session_token: Option<&str>,
    ) -> Result<Option<FederatedUser>, ValidatorError>;
}

/// Trait for the authorization decision point
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Decide whether the user may perform the request
    async fn authorize(&self, request: &S3Request, user: &FederatedUser) -> bool;
}

/// Authorizer that grants everything (development or trusted deployments)
pub struct AllowAllAuthorizer;

#[async_trait]
impl Authorizer for AllowAllAuthorizer {
    async fn authorize(&self, _request: &S3Request, _user: &FederatedUser) -> bool {
        true
    }
}

/// Authorizer that denies everything (testing)
pub struct DenyAllAuthorizer;

#[async_trait]
impl Authorizer for DenyAllAuthorizer {
    async fn authorize(&self, _request: &S3Request, _user: &FederatedUser) -> bool {
        false
    }
}

/// Authorizer keyed on the session's assumed group
///
/// Grants bucket-scoped requests when the bucket name starts with the
/// assumed group, and service-level requests for any authenticated user.
pub struct GroupAuthorizer;

#[async_trait]
impl Authorizer for GroupAuthorizer {
    async fn authorize(&self, request: &S3Request, user: &FederatedUser) -> bool {
        let Some(bucket) = request.bucket.as_deref() else {
            return true;
        };
        match user.assumed_group.as_deref() {
            Some(group) => bucket == group || bucket.starts_with(&format!("{group}-")),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::Credential;
    use crate::request::AccessType;

    fn request_for(bucket: Option<&str>) -> S3Request {
        S3Request {
            access_key_id: "AKID".to_string(),
            session_token: None,
            bucket: bucket.map(str::to_string),
            access_type: AccessType::Read,
        }
    }

    fn user_in_group(group: Option<&str>) -> FederatedUser {
        let user = FederatedUser::new("alice", Credential::new("AKID", "secret"));
        match group {
            Some(g) => user.with_group(g),
            None => user,
        }
    }

    #[tokio::test]
    async fn test_allow_and_deny_all() {
        let request = request_for(Some("any"));
        let user = user_in_group(None);
        assert!(AllowAllAuthorizer.authorize(&request, &user).await);
        assert!(!DenyAllAuthorizer.authorize(&request, &user).await);
    }

    #[tokio::test]
    async fn test_group_authorizer_matches_prefix() {
        let user = user_in_group(Some("analytics"));
        assert!(
            GroupAuthorizer
                .authorize(&request_for(Some("analytics")), &user)
                .await
        );
        assert!(
            GroupAuthorizer
                .authorize(&request_for(Some("analytics-raw")), &user)
                .await
        );
        assert!(
            !GroupAuthorizer
                .authorize(&request_for(Some("finance")), &user)
                .await
        );
    }

    #[tokio::test]
    async fn test_group_authorizer_service_level() {
        // List-all-buckets is not bucket-scoped and passes for any identity
        let user = user_in_group(None);
        assert!(GroupAuthorizer.authorize(&request_for(None), &user).await);
    }

    #[tokio::test]
    async fn test_group_authorizer_requires_group_for_buckets() {
        let user = user_in_group(None);
        assert!(
            !GroupAuthorizer
                .authorize(&request_for(Some("analytics")), &user)
                .await
        );
    }
}
