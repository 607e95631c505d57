use std::time::Duration;

use rand::{Rng, SeedableRng, rngs::SmallRng};

/// Reconnect delay policy.
///
/// Each channel supplies its own base, cap, jitter and retry ceiling.
pub trait ReconnectPolicy: Send + Sync + 'static {
    /// Deterministic part of the delay for `retry_count`.
    fn base_delay(&self, retry_count: u32) -> Duration;

    /// Random addition drawn fresh on every call.
    fn jitter(&self) -> Duration;

    /// `None` means retry forever.
    fn max_retries(&self) -> Option<u32>;

    /// Delay before the next attempt, or `None` once the retry budget is spent.
    fn next_delay(&self, retry_count: u32) -> Option<Duration> {
        if let Some(max) = self.max_retries()
            && retry_count > max
        {
            return None;
        }
        Some(self.base_delay(retry_count).saturating_add(self.jitter()))
    }
}

/// Capped exponential backoff: `min(max, base * 2^n) + uniform(0, jitter)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    jitter: Duration,
    max_retries: Option<u32>,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            jitter: Duration::ZERO,
            max_retries: None,
        }
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Alerts channel: 1s doubling up to 30s, up to 500ms jitter, gives up after 10 retries.
    pub fn alerts() -> Self {
        Self::new(Duration::from_millis(1_000), Duration::from_millis(30_000))
            .with_jitter(Duration::from_millis(500))
            .with_max_retries(Some(10))
    }

    /// Unread channel: 500ms doubling up to 20s, up to 250ms jitter, never gives up.
    pub fn unread() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_millis(20_000))
            .with_jitter(Duration::from_millis(250))
    }

    pub fn cap(&self) -> Duration {
        self.max
    }
}

impl ReconnectPolicy for ExponentialBackoff {
    fn base_delay(&self, retry_count: u32) -> Duration {
        let base_ms = self.base.as_millis().min(u64::MAX as u128) as u64;
        let factor = 1u64.checked_shl(retry_count).unwrap_or(u64::MAX);
        let max_ms = self.max.as_millis().min(u64::MAX as u128) as u64;
        Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
    }

    fn jitter(&self) -> Duration {
        jitter_up_to(self.jitter)
    }

    fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }
}

/// Uniform random duration in `[0, bound]`, millisecond resolution.
pub fn jitter_up_to(bound: Duration) -> Duration {
    let bound_ms = bound.as_millis().min(u64::MAX as u128) as u64;
    if bound_ms == 0 {
        return Duration::ZERO;
    }

    let mut rng = SmallRng::from_entropy();
    Duration::from_millis(rng.gen_range(0..=bound_ms))
}
