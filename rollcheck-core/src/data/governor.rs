//! Request pacing and circuit breaking for the market-data provider.
//!
//! The governor spaces requests at least `min_interval` apart and refuses all
//! requests for a cooldown once the provider bans us (HTTP 403) or fails
//! `failure_threshold` times in a row.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    /// Requests are refused until the cooldown expires.
    Open { tripped_at: Instant },
}

#[derive(Debug)]
struct GovernorState {
    breaker: BreakerState,
    consecutive_failures: u32,
    last_request: Option<Instant>,
}

#[derive(Debug)]
pub struct RequestGovernor {
    state: Mutex<GovernorState>,
    min_interval: Duration,
    cooldown: Duration,
    failure_threshold: u32,
}

impl RequestGovernor {
    pub fn new(min_interval: Duration, cooldown: Duration, failure_threshold: u32) -> Self {
        Self {
            state: Mutex::new(GovernorState {
                breaker: BreakerState::Closed,
                consecutive_failures: 0,
                last_request: None,
            }),
            min_interval,
            cooldown,
            failure_threshold: failure_threshold.max(1),
        }
    }

    /// One request per second, 30-minute cooldown after 3 consecutive failures.
    pub fn default_provider() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30 * 60), 3)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GovernorState> {
        // A poisoned lock only means another thread panicked mid-update;
        // the counters are still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// True when the breaker is closed (or its cooldown has expired).
    pub fn is_allowed(&self) -> bool {
        let mut state = self.lock();
        match state.breaker {
            BreakerState::Closed => true,
            BreakerState::Open { tripped_at } => {
                if tripped_at.elapsed() >= self.cooldown {
                    state.breaker = BreakerState::Closed;
                    state.consecutive_failures = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Block until the pacing interval since the previous request has passed,
    /// then claim the slot. Returns how long the caller waited.
    pub fn wait_turn(&self) -> Duration {
        let wait = {
            let mut state = self.lock();
            let now = Instant::now();
            let wait = match state.last_request {
                Some(prev) => self.min_interval.saturating_sub(now.duration_since(prev)),
                None => Duration::ZERO,
            };
            state.last_request = Some(now + wait);
            wait
        };
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
        wait
    }

    pub fn record_success(&self) {
        self.lock().consecutive_failures = 0;
    }

    /// Count a failure; trips the breaker once the threshold is reached.
    pub fn record_failure(&self) {
        let mut state = self.lock();
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.failure_threshold {
            tracing::warn!(
                failures = state.consecutive_failures,
                "circuit breaker tripped after repeated provider failures"
            );
            state.breaker = BreakerState::Open {
                tripped_at: Instant::now(),
            };
        }
    }

    /// Trip immediately (HTTP 403).
    pub fn trip(&self) {
        tracing::warn!("circuit breaker tripped: provider refused access");
        self.lock().breaker = BreakerState::Open {
            tripped_at: Instant::now(),
        };
    }

    pub fn remaining_cooldown(&self) -> Duration {
        match self.lock().breaker {
            BreakerState::Closed => Duration::ZERO,
            BreakerState::Open { tripped_at } => {
                self.cooldown.saturating_sub(tripped_at.elapsed())
            }
        }
    }
}
