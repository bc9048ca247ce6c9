//! Error types for BucketGate
//!
//! The gateway distinguishes failure classes that all render as a small set
//! of HTTP statuses but are logged under different categories. The pipeline
//! renders a rejection from the class: `http_status_code()` picks the
//! status, `is_opaque_to_caller()` decides whether the detail reaches the
//! response body or stays in the logs.

use thiserror::Error;

/// Common result type for BucketGate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Gateway-wide error type
#[derive(Debug, Error)]
pub enum Error {
    /// Credential absent, malformed, or unknown to the token service
    #[error("not authenticated: {0}")]
    AuthenticationFailure(String),

    /// Valid identity, but insufficient rights for the bucket/operation
    #[error("not authorized: {0}")]
    AuthorizationFailure(String),

    /// The identity service itself errored (unreachable/broken, not "invalid")
    #[error("identity validator fault: {0}")]
    ValidatorFault(String),

    /// Signature re-check against the signed request failed
    #[error("signature mismatch")]
    SignatureMismatch,

    /// Backend data-plane call failed
    #[error("forwarding failed: {0}")]
    ForwardingFault(String),

    /// Backend data-plane call timed out
    #[error("request timeout")]
    Timeout,

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create an authentication failure
    pub fn not_authenticated(msg: impl Into<String>) -> Self {
        Self::AuthenticationFailure(msg.into())
    }

    /// Create an authorization failure
    pub fn not_authorized(msg: impl Into<String>) -> Self {
        Self::AuthorizationFailure(msg.into())
    }

    /// Check if this error must not leak detail to the caller
    #[must_use]
    pub const fn is_opaque_to_caller(&self) -> bool {
        matches!(
            self,
            Self::ValidatorFault(_) | Self::ForwardingFault(_) | Self::Timeout
        )
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 403 Forbidden
            Self::AuthenticationFailure(_)
            | Self::AuthorizationFailure(_)
            | Self::SignatureMismatch => 403,

            // 500 Internal Server Error
            Self::ValidatorFault(_)
            | Self::ForwardingFault(_)
            | Self::Timeout
            | Self::Configuration(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failures_are_forbidden() {
        assert_eq!(
            Error::not_authenticated("no key").http_status_code(),
            403
        );
        assert_eq!(Error::not_authorized("read").http_status_code(), 403);
        assert_eq!(Error::SignatureMismatch.http_status_code(), 403);
    }

    #[test]
    fn test_faults_are_internal_errors() {
        assert_eq!(Error::ValidatorFault("down".into()).http_status_code(), 500);
        assert_eq!(Error::Timeout.http_status_code(), 500);
        assert_eq!(
            Error::ForwardingFault("refused".into()).http_status_code(),
            500
        );
    }

    #[test]
    fn test_opaque_errors() {
        assert!(Error::ValidatorFault("stack trace".into()).is_opaque_to_caller());
        assert!(Error::ForwardingFault("backend detail".into()).is_opaque_to_caller());
        assert!(!Error::AuthenticationFailure("bad key".into()).is_opaque_to_caller());
    }
}
