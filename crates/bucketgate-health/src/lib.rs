//! BucketGate health cache
//!
//! A single-slot, time-windowed cache around a backend liveness probe. Under
//! concurrent liveness checks arriving at an expired cache, the probe runs
//! once, not once per caller: the slot's async mutex is held across the
//! probe await, so every other caller observes the freshly written entry.

pub mod cache;
pub mod probe;

pub use cache::{HealthCache, HealthEntry};
pub use probe::{ProbeOutcome, Prober};
