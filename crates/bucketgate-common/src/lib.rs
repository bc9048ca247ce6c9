//! BucketGate common types
//!
//! Shared building blocks used by every BucketGate crate: the gateway-wide
//! error taxonomy, configuration structures, and the per-request correlation
//! id that is threaded through the pipeline.

pub mod config;
pub mod error;
pub mod request_id;

// Re-exports
pub use config::{
    BackendConfig, GatewayConfig, HealthCheckConfig, HealthCheckMethod, StsConfig,
};
pub use error::{Error, Result};
pub use request_id::RequestId;
