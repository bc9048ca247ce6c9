//! BucketGate authentication and identity reconciliation
//!
//! This crate provides:
//! - The credential and federated-identity data model
//! - The normalized `S3Request` view of an inbound call
//! - Collaborator traits for identity validation, authorization, and the
//!   storage backend's admin plane
//! - The identity reconciler that converges the backend registry to the
//!   federated user's current key pair
//! - SigV4 re-verification used as the low-level gate before forwarding

pub mod admin;
pub mod credential;
pub mod provider;
pub mod reconciler;
pub mod request;
pub mod sigv4;

// Re-export core types
pub use admin::{AdminClient, AdminError};
pub use credential::{BackendUser, Credential, FederatedUser};
pub use provider::{
    AllowAllAuthorizer, Authorizer, DenyAllAuthorizer, GroupAuthorizer, IdentityValidator,
    ValidatorError,
};
pub use reconciler::IdentityReconciler;
pub use request::{AccessType, S3Request};
pub use sigv4::{SigV4Verifier, SignatureError};
