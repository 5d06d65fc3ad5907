// ── Health monitor / recovery service ──
//
// Runs independently of caller traffic on an adaptive timer. A healthy
// tick is cheap (status snapshot only); an unhealthy one drives the
// recovery sequence: forced disconnect -> delay -> reconnect ->
// identity probe. Repeated recovery failures stretch the check
// interval (a device that is down for hours should not be hammered
// every 30 seconds); a successful recovery shrinks it back.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::breaker::CircuitBreaker;
use crate::command::Command;
use crate::config::HealthConfig;
use crate::error::CoreError;
use crate::session::ConnectionSupervisor;

/// Events emitted for dashboards and monitoring routes. The core never
/// consumes its own events.
#[derive(Debug, Clone)]
pub enum HealthEvent {
    /// Periodic check found the connection healthy.
    Healthy,
    /// A recovery sequence restored the connection.
    Recovered,
    /// A recovery sequence failed; `consecutive` counts the streak.
    RecoveryFailed { consecutive: u32, message: String },
    /// A non-recoverable condition needing operator attention.
    Error { message: String },
}

// ── Adaptive interval ───────────────────────────────────────────────

/// Restartable-timer schedule: doubles toward `max` while recovery
/// keeps failing, halves toward `min` when it succeeds.
pub(crate) struct IntervalSchedule {
    current: Duration,
    base: Duration,
    min: Duration,
    max: Duration,
}

impl IntervalSchedule {
    pub fn new(config: &HealthConfig) -> Self {
        let base = config.base_interval.clamp(config.min_interval, config.max_interval);
        Self {
            current: base,
            base,
            min: config.min_interval,
            max: config.max_interval,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Double the interval, capped at `max`.
    pub fn back_off(&mut self) -> Duration {
        self.current = (self.current * 2).min(self.max);
        self.current
    }

    /// Halve the interval, floored at `min`.
    pub fn restore(&mut self) -> Duration {
        self.current = (self.current / 2).max(self.min);
        self.current
    }

    /// Snap back to the configured base (manual recovery succeeded).
    pub fn reset(&mut self) -> Duration {
        self.current = self.base;
        self.current
    }
}

// ── Monitor ─────────────────────────────────────────────────────────

pub(crate) struct HealthMonitor {
    supervisor: Arc<ConnectionSupervisor>,
    breaker: Arc<CircuitBreaker>,
    config: HealthConfig,
    schedule: Mutex<IntervalSchedule>,
    consecutive_failures: AtomicU32,
    recovery_in_progress: AtomicBool,
    /// Set while the caller wants the gateway offline; ticks no-op so
    /// recovery does not resurrect an intentional disconnect.
    suspended: AtomicBool,
    events_tx: broadcast::Sender<HealthEvent>,
}

impl HealthMonitor {
    pub fn new(
        supervisor: Arc<ConnectionSupervisor>,
        breaker: Arc<CircuitBreaker>,
        config: HealthConfig,
        events_tx: broadcast::Sender<HealthEvent>,
    ) -> Self {
        let schedule = Mutex::new(IntervalSchedule::new(&config));
        Self {
            supervisor,
            breaker,
            config,
            schedule,
            consecutive_failures: AtomicU32::new(0),
            recovery_in_progress: AtomicBool::new(false),
            suspended: AtomicBool::new(true),
            events_tx,
        }
    }

    pub fn suspend(&self) {
        self.suspended.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.suspended.store(false, Ordering::Release);
    }

    /// Current check interval.
    pub fn interval(&self) -> Duration {
        self.schedule.lock().expect("schedule mutex poisoned").current()
    }

    /// One timer tick: snapshot health, recover if needed.
    pub async fn tick(&self) {
        if self.suspended.load(Ordering::Acquire) {
            return;
        }
        let info = self.supervisor.connection_info();

        if info.connected && !info.is_offline {
            self.consecutive_failures.store(0, Ordering::Relaxed);
            self.emit(HealthEvent::Healthy);
            return;
        }

        if !info.has_valid_config {
            // Credentials are wrong; reconnecting in a loop cannot fix
            // that and only locks the account out.
            self.emit(HealthEvent::Error {
                message: "device credentials rejected -- recovery suspended".into(),
            });
            return;
        }

        match self.run_recovery().await {
            Ok(()) => {}
            Err(CoreError::Internal(_)) => {
                // Another recovery is already in flight.
                debug!("skipping tick -- recovery already in progress");
            }
            Err(_) => {}
        }
    }

    /// Operator-triggered recovery, bypassing the timer. On success the
    /// backoff snaps back to the configured base interval.
    pub async fn force_recovery(&self) -> Result<(), CoreError> {
        self.run_recovery().await?;
        let interval = self
            .schedule
            .lock()
            .expect("schedule mutex poisoned")
            .reset();
        debug!(interval_secs = interval.as_secs(), "backoff reset after forced recovery");
        Ok(())
    }

    /// Run one recovery sequence, guarded against overlap.
    async fn run_recovery(&self) -> Result<(), CoreError> {
        if self
            .recovery_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CoreError::Internal("recovery already in progress".into()));
        }

        let result = self.recovery_sequence().await;
        self.recovery_in_progress.store(false, Ordering::Release);

        match result {
            Ok(()) => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
                let interval = self
                    .schedule
                    .lock()
                    .expect("schedule mutex poisoned")
                    .restore();
                // The out-of-band recovery proved the link; let caller
                // traffic flow again immediately.
                self.breaker.reset().await;
                info!(interval_secs = interval.as_secs(), "connection recovered");
                self.emit(HealthEvent::Recovered);
                Ok(())
            }
            Err(e) => {
                let consecutive = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                if consecutive >= self.config.backoff_after {
                    let interval = self
                        .schedule
                        .lock()
                        .expect("schedule mutex poisoned")
                        .back_off();
                    warn!(
                        consecutive,
                        interval_secs = interval.as_secs(),
                        error = %e,
                        "recovery failed -- backing off"
                    );
                } else {
                    warn!(consecutive, error = %e, "recovery failed");
                }
                self.emit(HealthEvent::RecoveryFailed {
                    consecutive,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Forced disconnect -> delay -> reconnect -> verification probe.
    async fn recovery_sequence(&self) -> Result<(), CoreError> {
        debug!("starting recovery sequence");
        self.supervisor.disconnect().await;
        tokio::time::sleep(self.config.recovery_delay).await;
        self.supervisor.connect().await?;
        self.supervisor.dispatch(&Command::Identity).await?;
        Ok(())
    }

    fn emit(&self, event: HealthEvent) {
        let _ = self.events_tx.send(event);
    }
}

/// Background task: tick on the adaptive interval until cancelled.
pub(crate) async fn health_task(monitor: Arc<HealthMonitor>, cancel: CancellationToken) {
    loop {
        let interval = monitor.interval();
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {
                monitor.tick().await;
            }
        }
    }
    debug!("health task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::breaker::BreakerState;
    use crate::config::{BreakerConfig, GatewayConfig};

    fn config() -> HealthConfig {
        HealthConfig {
            base_interval: Duration::from_secs(30),
            min_interval: Duration::from_secs(15),
            max_interval: Duration::from_secs(300),
            backoff_after: 3,
            recovery_delay: Duration::from_millis(10),
        }
    }

    #[test]
    fn interval_doubles_up_to_the_cap() {
        let mut schedule = IntervalSchedule::new(&config());
        assert_eq!(schedule.current(), Duration::from_secs(30));

        let mut previous = schedule.current();
        loop {
            let next = schedule.back_off();
            assert!(next >= previous, "interval must never shrink on failure");
            if next == previous {
                break;
            }
            previous = next;
        }
        assert_eq!(schedule.current(), Duration::from_secs(300));
    }

    #[test]
    fn interval_halves_down_to_the_floor() {
        let mut schedule = IntervalSchedule::new(&config());
        for _ in 0..10 {
            schedule.back_off();
        }
        assert_eq!(schedule.current(), Duration::from_secs(300));

        let mut previous = schedule.current();
        loop {
            let next = schedule.restore();
            assert!(next <= previous, "interval must never grow on success");
            if next == previous {
                break;
            }
            previous = next;
        }
        assert_eq!(schedule.current(), Duration::from_secs(15));
    }

    #[test]
    fn reset_snaps_back_to_base() {
        let mut schedule = IntervalSchedule::new(&config());
        schedule.back_off();
        schedule.back_off();
        assert_eq!(schedule.reset(), Duration::from_secs(30));
    }

    #[test]
    fn base_interval_is_clamped_to_bounds() {
        let mut cfg = config();
        cfg.base_interval = Duration::from_secs(1);
        let schedule = IntervalSchedule::new(&cfg);
        assert_eq!(schedule.current(), Duration::from_secs(15));
    }

    // ── Recovery sequence ───────────────────────────────────────────

    fn monitor_against(
        uri: &str,
        config: HealthConfig,
    ) -> (
        Arc<HealthMonitor>,
        Arc<CircuitBreaker>,
        broadcast::Receiver<HealthEvent>,
    ) {
        let gateway_config = GatewayConfig {
            url: uri.parse().expect("device url"),
            ..GatewayConfig::default()
        };
        let supervisor = Arc::new(ConnectionSupervisor::new(gateway_config));
        let breaker = Arc::new(CircuitBreaker::new(BreakerConfig::default()));
        let (events_tx, events_rx) = broadcast::channel(16);
        let monitor = Arc::new(HealthMonitor::new(
            supervisor,
            breaker.clone(),
            config,
            events_tx,
        ));
        monitor.resume();
        (monitor, breaker, events_rx)
    }

    async fn mock_identity(server: &MockServer, status: u16) {
        let template = if status == 200 {
            ResponseTemplate::new(200).set_body_json(json!({"name": "gw-lab"}))
        } else {
            ResponseTemplate::new(status)
        };
        Mock::given(method("GET"))
            .and(path("/rest/system/identity"))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn unhealthy_tick_runs_recovery_and_closes_the_breaker() {
        let server = MockServer::start().await;
        mock_identity(&server, 200).await;
        let (monitor, breaker, mut events) = monitor_against(&server.uri(), config());

        // Trip the circuit first so the post-recovery reset is visible.
        for _ in 0..5 {
            let _: Result<(), CoreError> = breaker
                .guard(|| async { Err(CoreError::Timeout { timeout_secs: 1 }) })
                .await;
        }
        assert_eq!(breaker.state().await, BreakerState::Open);

        monitor.tick().await;

        assert!(matches!(events.recv().await, Ok(HealthEvent::Recovered)));
        assert_eq!(breaker.state().await, BreakerState::Closed);
    }

    #[tokio::test]
    async fn failed_recovery_emits_the_event_and_backs_off() {
        let server = MockServer::start().await;
        mock_identity(&server, 500).await;
        let mut cfg = config();
        cfg.backoff_after = 1;
        let (monitor, _breaker, mut events) = monitor_against(&server.uri(), cfg);
        let base = monitor.interval();

        monitor.tick().await;

        match events.recv().await {
            Ok(HealthEvent::RecoveryFailed {
                consecutive,
                message,
            }) => {
                assert_eq!(consecutive, 1);
                assert!(!message.is_empty());
            }
            other => panic!("expected RecoveryFailed, got {other:?}"),
        }
        assert_eq!(monitor.interval(), base * 2);
    }

    #[tokio::test]
    async fn concurrent_recovery_is_rejected_not_overlapped() {
        let server = MockServer::start().await;
        mock_identity(&server, 200).await;
        let mut cfg = config();
        cfg.recovery_delay = Duration::from_millis(200);
        let (monitor, _breaker, _events) = monitor_against(&server.uri(), cfg);

        let first = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.force_recovery().await })
        };
        // Let the first sequence reach its settle delay.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = monitor
            .force_recovery()
            .await
            .expect_err("second recovery must be rejected while one is in flight");
        assert!(matches!(err, CoreError::Internal(_)));

        first
            .await
            .expect("recovery task panicked")
            .expect("first recovery completes");
    }

    #[tokio::test]
    async fn suspended_monitor_skips_ticks() {
        let (monitor, _breaker, mut events) = monitor_against("http://127.0.0.1:9", config());
        monitor.suspend();

        monitor.tick().await;

        assert!(matches!(
            events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
