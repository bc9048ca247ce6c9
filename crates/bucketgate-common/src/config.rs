//! Configuration types for BucketGate
//!
//! This module defines the configuration structures for the gateway binary.
//! Values come from an optional TOML file overlaid with `BUCKETGATE_*`
//! environment variables; the CLI applies its own overrides on top.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::error::{Error, Result};

/// Root configuration for the gateway
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Address for the S3 proxy listener
    pub listen: SocketAddr,
    /// AWS region used for SigV4 re-verification
    pub region: String,
    /// Re-check request signatures against the federated secret key
    pub verify_signatures: bool,
    /// Maximum number of in-flight identity reconciliations
    pub max_concurrent_reconciliations: usize,
    /// Storage backend endpoints
    pub backend: BackendConfig,
    /// Token service (STS) endpoint
    pub sts: StsConfig,
    /// Liveness probing
    pub health: HealthCheckConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".parse().expect("valid default listen addr"),
            region: "us-east-1".to_string(),
            verify_signatures: true,
            max_concurrent_reconciliations: 8,
            backend: BackendConfig::default(),
            sts: StsConfig::default(),
            health: HealthCheckConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from an optional TOML file plus environment overrides
    ///
    /// Environment variables use the `BUCKETGATE_` prefix with `__` as the
    /// nesting separator (e.g. `BUCKETGATE_BACKEND__ENDPOINT`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("BUCKETGATE").separator("__"),
        );

        let merged = builder
            .build()
            .map_err(|e| Error::Configuration(e.to_string()))?;

        merged
            .try_deserialize()
            .map_err(|e| Error::Configuration(e.to_string()))
    }
}

/// Storage backend endpoints and limits
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Data-plane endpoint requests are forwarded to
    pub endpoint: String,
    /// Admin-plane endpoint for the user/credential registry
    pub admin_endpoint: String,
    /// Timeout for forwarded data-plane calls (seconds)
    pub forward_timeout_secs: u64,
    /// Timeout for admin-plane calls (seconds)
    pub admin_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9000".to_string(),
            admin_endpoint: "http://localhost:9001".to_string(),
            forward_timeout_secs: 30,
            admin_timeout_secs: 10,
        }
    }
}

/// Token service configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StsConfig {
    /// Validation endpoint of the token-issuing identity service
    pub endpoint: String,
    /// Timeout for validation calls (seconds)
    pub timeout_secs: u64,
}

impl Default for StsConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9990".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Liveness probe mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthCheckMethod {
    /// Probe via the admin plane by listing every bucket
    #[default]
    ListAllBuckets,
    /// Probe via the data plane by heading one designated bucket
    ListOneBucket,
}

/// Liveness probe configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Probe mode
    pub method: HealthCheckMethod,
    /// How long a probe outcome stays fresh (seconds)
    pub interval_secs: u64,
    /// Designated bucket for the `list-one-bucket` mode
    pub bucket: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            method: HealthCheckMethod::ListAllBuckets,
            interval_secs: 30,
            bucket: "bucketgate-health".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.listen.port(), 8000);
        assert!(config.verify_signatures);
        assert_eq!(config.health.method, HealthCheckMethod::ListAllBuckets);
        assert_eq!(config.health.interval_secs, 30);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
            region = "eu-west-1"

            [health]
            method = "list-one-bucket"
            interval_secs = 5
            bucket = "probe"
            "#
        )
        .unwrap();

        let config = GatewayConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.health.method, HealthCheckMethod::ListOneBucket);
        assert_eq!(config.health.interval_secs, 5);
        assert_eq!(config.health.bucket, "probe");
        // Untouched sections keep their defaults
        assert_eq!(config.backend.forward_timeout_secs, 30);
    }

    #[test]
    fn test_method_serde_kebab_case() {
        let json = serde_json::to_string(&HealthCheckMethod::ListOneBucket).unwrap();
        assert_eq!(json, "\"list-one-bucket\"");
    }
}
