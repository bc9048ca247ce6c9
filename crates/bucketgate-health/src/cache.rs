//! Single-slot probe cache

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use crate::probe::{ProbeOutcome, Prober};

/// The one cached probe result
///
/// At most one entry exists at any time; a new probe replaces it, never
/// appends.
#[derive(Clone, Debug)]
pub struct HealthEntry {
    /// When the probe ran
    pub taken_at: Instant,
    /// What it found
    pub outcome: ProbeOutcome,
}

/// Time-windowed cache around a liveness probe
pub struct HealthCache {
    ttl: Duration,
    prober: Arc<dyn Prober>,
    slot: Mutex<Option<HealthEntry>>,
}

impl HealthCache {
    /// Create a cache over the given prober with the given freshness window
    pub fn new(prober: Arc<dyn Prober>, ttl: Duration) -> Self {
        Self {
            ttl,
            prober,
            slot: Mutex::new(None),
        }
    }

    /// Return the probe outcome as of `now`, probing if the slot is stale
    ///
    /// The slot lock is held across the probe await; concurrent callers at
    /// an expired cache serialize behind the first one and read its fresh
    /// entry instead of probing again. `None` is the defensive empty-slot
    /// case and should not occur.
    pub async fn status(&self, now: Instant) -> Option<ProbeOutcome> {
        let mut slot = self.slot.lock().await;

        let fresh = slot
            .as_ref()
            .is_some_and(|entry| entry.taken_at + self.ttl >= now);

        if !fresh {
            debug!("health entry missing or expired, probing backend");
            let outcome = self.prober.probe().await;
            debug!(ok = outcome.is_ok(), "backend probe completed");
            *slot = Some(HealthEntry {
                taken_at: now,
                outcome,
            });
        }

        slot.as_ref().map(|entry| entry.outcome.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Prober that counts invocations and returns a canned outcome
    struct CountingProber {
        calls: AtomicU32,
        outcome: ProbeOutcome,
    }

    impl CountingProber {
        fn new(outcome: ProbeOutcome) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                outcome,
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Prober for CountingProber {
        async fn probe(&self) -> ProbeOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    #[tokio::test]
    async fn test_fresh_entry_is_served_from_cache() {
        let prober = CountingProber::new(ProbeOutcome::Ok);
        let cache = HealthCache::new(prober.clone(), Duration::from_secs(10));
        let t0 = Instant::now();

        assert_eq!(cache.status(t0).await, Some(ProbeOutcome::Ok));
        assert_eq!(prober.calls(), 1);

        // One second before expiry: cached, probe not re-invoked
        let just_before = t0 + Duration::from_secs(9);
        assert_eq!(cache.status(just_before).await, Some(ProbeOutcome::Ok));
        assert_eq!(prober.calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_triggers_reprobe() {
        let prober = CountingProber::new(ProbeOutcome::Ok);
        let cache = HealthCache::new(prober.clone(), Duration::from_secs(10));
        let t0 = Instant::now();

        cache.status(t0).await;
        let just_after = t0 + Duration::from_secs(11);
        assert_eq!(cache.status(just_after).await, Some(ProbeOutcome::Ok));
        assert_eq!(prober.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_outcome_is_cached_too() {
        let prober = CountingProber::new(ProbeOutcome::Failed("boom".into()));
        let cache = HealthCache::new(prober.clone(), Duration::from_secs(10));
        let t0 = Instant::now();

        assert_eq!(
            cache.status(t0).await,
            Some(ProbeOutcome::Failed("boom".into()))
        );
        assert_eq!(
            cache.status(t0 + Duration::from_secs(1)).await,
            Some(ProbeOutcome::Failed("boom".into()))
        );
        assert_eq!(prober.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_checks_probe_once() {
        let prober = CountingProber::new(ProbeOutcome::Ok);
        let cache = Arc::new(HealthCache::new(prober.clone(), Duration::from_secs(10)));
        let t0 = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.status(t0).await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Some(ProbeOutcome::Ok));
        }

        assert_eq!(prober.calls(), 1);
    }
}
