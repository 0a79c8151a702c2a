//! Politeness delays between network fetches
//!
//! The engine asks its `DelayPolicy` for a pause before and after every
//! detail navigation and after every list scan. Production runs use
//! `RandomDelay` so the request cadence is not regular; tests substitute
//! `NoDelay` or `FixedDelay`.

use std::time::Duration;

/// Source of pauses between requests
pub trait DelayPolicy: Send {
    /// Duration of the next pause
    fn next_delay(&mut self) -> Duration;

    /// Lower bound of any value `next_delay` returns
    fn minimum(&self) -> Duration;
}

/// Uniformly random delay in `[min, max]` from an instance-local RNG
#[derive(Debug)]
pub struct RandomDelay {
    min_ms: u64,
    max_ms: u64,
    rng: fastrand::Rng,
}

impl RandomDelay {
    pub fn new(min: Duration, max: Duration, seed: u64) -> Self {
        let min_ms = u64::try_from(min.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX).max(min_ms);
        Self {
            min_ms,
            max_ms,
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    pub fn from_millis(min_ms: u64, max_ms: u64, seed: u64) -> Self {
        Self::new(Duration::from_millis(min_ms), Duration::from_millis(max_ms), seed)
    }
}

impl DelayPolicy for RandomDelay {
    fn next_delay(&mut self) -> Duration {
        Duration::from_millis(self.rng.u64(self.min_ms..=self.max_ms))
    }

    fn minimum(&self) -> Duration {
        Duration::from_millis(self.min_ms)
    }
}

/// Always the same pause
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl DelayPolicy for FixedDelay {
    fn next_delay(&mut self) -> Duration {
        self.0
    }

    fn minimum(&self) -> Duration {
        self.0
    }
}

/// Zero pause, for deterministic tests and fixture replays
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl DelayPolicy for NoDelay {
    fn next_delay(&mut self) -> Duration {
        Duration::ZERO
    }

    fn minimum(&self) -> Duration {
        Duration::ZERO
    }
}
