// ── Circuit breaker ──
//
// Guards every device dispatch. CLOSED is normal operation; reaching
// `failure_threshold` consecutive connectivity failures opens the
// circuit and all calls are rejected immediately with `CircuitOpen`
// (no device traffic). After `reset_timeout` a single trial call is
// admitted (HALF_OPEN); its outcome decides between CLOSED and OPEN.
//
// Only connectivity outcomes count as failures. A validation or
// conflict rejection proves the link works -- it resets the counter
// and passes through to the caller untouched.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::BreakerConfig;
use crate::error::CoreError;

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

enum State {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen,
}

pub(crate) struct CircuitBreaker {
    config: BreakerConfig,
    state: Mutex<State>,
    trips: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::Closed { failures: 0 }),
            trips: AtomicU64::new(0),
        }
    }

    /// Run `op` under breaker protection.
    pub async fn guard<T, F, Fut>(&self, op: F) -> Result<T, CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        self.admit().await?;

        match op().await {
            Ok(value) => {
                self.record_success().await;
                Ok(value)
            }
            Err(e) if e.is_breaker_failure() => {
                self.record_failure().await;
                Err(e)
            }
            Err(e) => {
                // Device answered, just not the way the caller hoped.
                self.record_success().await;
                Err(e)
            }
        }
    }

    /// Close the circuit unconditionally (after an out-of-band recovery).
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        if !matches!(*state, State::Closed { failures: 0 }) {
            debug!("circuit breaker reset");
        }
        *state = State::Closed { failures: 0 };
    }

    pub async fn state(&self) -> BreakerState {
        match *self.state.lock().await {
            State::Closed { .. } => BreakerState::Closed,
            State::Open { .. } => BreakerState::Open,
            State::HalfOpen => BreakerState::HalfOpen,
        }
    }

    /// Times the circuit has opened since startup.
    pub fn trips(&self) -> u64 {
        self.trips.load(Ordering::Relaxed)
    }

    /// Admission check. Transitions OPEN -> HALF_OPEN once the reset
    /// timeout elapses; while HALF_OPEN, exactly the one probe that
    /// performed the transition is in flight and everything else is
    /// rejected.
    async fn admit(&self) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;
        match *state {
            State::Closed { .. } => Ok(()),
            State::Open { since } => {
                if since.elapsed() >= self.config.reset_timeout {
                    debug!("circuit half-open -- admitting one trial call");
                    *state = State::HalfOpen;
                    Ok(())
                } else {
                    Err(CoreError::CircuitOpen)
                }
            }
            State::HalfOpen => Err(CoreError::CircuitOpen),
        }
    }

    async fn record_success(&self) {
        let mut state = self.state.lock().await;
        if matches!(*state, State::HalfOpen) {
            info!("circuit closed after successful trial call");
        }
        *state = State::Closed { failures: 0 };
    }

    async fn record_failure(&self) {
        let mut state = self.state.lock().await;
        match *state {
            State::Closed { failures } => {
                let failures = failures + 1;
                if failures >= self.config.failure_threshold {
                    warn!(failures, "failure threshold reached -- circuit open");
                    self.trips.fetch_add(1, Ordering::Relaxed);
                    *state = State::Open {
                        since: Instant::now(),
                    };
                } else {
                    *state = State::Closed { failures };
                }
            }
            State::HalfOpen => {
                warn!("trial call failed -- circuit re-opened");
                self.trips.fetch_add(1, Ordering::Relaxed);
                *state = State::Open {
                    since: Instant::now(),
                };
            }
            State::Open { .. } => {}
        }
    }
}
