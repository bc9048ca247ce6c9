//! Liveness probe abstraction

use async_trait::async_trait;
use std::fmt;

/// Result of one backend liveness probe
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Backend answered the probe
    Ok,
    /// Backend could not be probed
    Failed(String),
}

impl ProbeOutcome {
    /// Whether the probe succeeded
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Trait for backend liveness probes
///
/// The gateway binary supplies an implementation dispatching on the
/// configured probe mode (list-all-buckets via the admin plane, or
/// list-one-bucket via the data plane). Probes never fail with an error;
/// every failure is an outcome.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Execute one probe against the backend
    async fn probe(&self) -> ProbeOutcome;
}
