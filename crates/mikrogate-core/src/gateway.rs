// ── Device gateway ──
//
// The public face of the crate. One gateway owns one device: a
// connection supervisor for the session, a circuit breaker guarding
// every dispatch, a priority queue feeding a single executor task, and
// a health monitor running recovery out of band.
//
// Cheap to clone; all clones share the same inner state.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::breaker::CircuitBreaker;
use crate::command::{Command, CommandEnvelope, CommandResult, Priority, UpdateUser};
use crate::config::GatewayConfig;
use crate::error::CoreError;
use crate::health::{HealthEvent, HealthMonitor, health_task};
use crate::model::{
    AccessProfile, ActiveSession, ClientStats, ConnectionCounters, ConnectionInfo,
    ConnectionStats, ConnectionStatus, DeviceObject, ErrorStats, ExpectedObject, HealthStatus,
    ObjectKind, PerformanceStats, ProfileSpec,
};
use crate::queue::CommandQueue;
use crate::reconcile::{self, ReconciliationResult};
use crate::session::ConnectionSupervisor;

#[derive(Default)]
struct CommandStats {
    executed: AtomicU64,
    failed: AtomicU64,
    latency_ms_total: AtomicU64,
}

struct GatewayInner {
    supervisor: Arc<ConnectionSupervisor>,
    breaker: Arc<CircuitBreaker>,
    queue: Arc<CommandQueue>,
    health: Arc<HealthMonitor>,
    events_tx: broadcast::Sender<HealthEvent>,
    stats: Arc<CommandStats>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    health_started: AtomicBool,
}

impl Drop for GatewayInner {
    fn drop(&mut self) {
        // Last handle gone: stop the executor and health tasks and fail
        // anything still queued. `shutdown()` remains the way to also
        // wait for the tasks to finish.
        self.cancel.cancel();
        self.queue.close();
    }
}

/// Handle to one managed device.
///
/// Dropping the last clone cancels the background tasks and fails
/// undispatched commands; call [`shutdown`](Self::shutdown) first when
/// teardown must wait for the in-flight command to complete.
#[derive(Clone)]
pub struct DeviceGateway {
    inner: Arc<GatewayInner>,
}

impl DeviceGateway {
    /// Build a gateway and start its executor task. Must be called from
    /// within a tokio runtime. No device traffic happens until
    /// [`connect`](Self::connect).
    pub fn new(config: GatewayConfig) -> Self {
        let supervisor = Arc::new(ConnectionSupervisor::new(config.clone()));
        let breaker = Arc::new(CircuitBreaker::new(config.breaker.clone()));
        let queue = Arc::new(CommandQueue::new());
        let (events_tx, _) = broadcast::channel(32);
        let health = Arc::new(HealthMonitor::new(
            supervisor.clone(),
            breaker.clone(),
            config.health.clone(),
            events_tx.clone(),
        ));
        let stats = Arc::new(CommandStats::default());
        let cancel = CancellationToken::new();

        let executor = tokio::spawn(executor_task(
            queue.clone(),
            supervisor.clone(),
            breaker.clone(),
            stats.clone(),
            cancel.child_token(),
        ));

        Self {
            inner: Arc::new(GatewayInner {
                supervisor,
                breaker,
                queue,
                health,
                events_tx,
                stats,
                cancel,
                tasks: Mutex::new(vec![executor]),
                health_started: AtomicBool::new(false),
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Open the device session. Idempotent. The first successful call
    /// also starts the background health monitor.
    pub async fn connect(&self) -> Result<bool, CoreError> {
        let connected = self.inner.supervisor.connect().await?;
        self.inner.health.resume();
        if self
            .inner
            .health_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let handle = tokio::spawn(health_task(
                self.inner.health.clone(),
                self.inner.cancel.child_token(),
            ));
            self.inner
                .tasks
                .lock()
                .expect("task mutex poisoned")
                .push(handle);
        }
        Ok(connected)
    }

    /// Drop the device session and suspend automatic recovery. The
    /// gateway stays usable: queued commands fail fast with
    /// `NotConnected` until the next [`connect`](Self::connect).
    pub async fn disconnect(&self) {
        self.inner.health.suspend();
        self.inner.supervisor.disconnect().await;
    }

    /// Full teardown: cancel background tasks, fail every undispatched
    /// command with `Cancelled`, wait for the in-flight one to finish,
    /// drop the session. The gateway is unusable afterwards.
    pub async fn shutdown(&self) {
        self.inner.health.suspend();
        self.inner.cancel.cancel();
        self.inner.queue.close();

        let handles: Vec<JoinHandle<()>> = self
            .inner
            .tasks
            .lock()
            .expect("task mutex poisoned")
            .drain(..)
            .collect();
        for handle in handles {
            let _ = handle.await;
        }

        self.inner.supervisor.disconnect().await;
        info!("gateway shut down");
    }

    // ── Command execution ────────────────────────────────────────────

    /// Queue one command and wait for its result.
    pub async fn execute(
        &self,
        command: Command,
        priority: Priority,
    ) -> Result<CommandResult, CoreError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.inner.queue.push(
            CommandEnvelope {
                command,
                submitted_at: Instant::now(),
                response_tx,
            },
            priority,
        );
        response_rx.await.map_err(|_| CoreError::Cancelled)?
    }

    /// Queue a batch atomically (contiguous in the band, submission
    /// order preserved) and wait for every result. Results are per
    /// command; a failure does not stop the rest.
    pub async fn execute_batch(
        &self,
        commands: Vec<Command>,
        priority: Priority,
    ) -> Vec<Result<CommandResult, CoreError>> {
        let mut envelopes = Vec::with_capacity(commands.len());
        let mut receivers = Vec::with_capacity(commands.len());
        for command in commands {
            let (response_tx, response_rx) = oneshot::channel();
            envelopes.push(CommandEnvelope {
                command,
                submitted_at: Instant::now(),
                response_tx,
            });
            receivers.push(response_rx);
        }
        self.inner.queue.push_batch(envelopes, priority);

        let mut results = Vec::with_capacity(receivers.len());
        for receiver in receivers {
            results.push(receiver.await.unwrap_or(Err(CoreError::Cancelled)));
        }
        results
    }

    // ── Subscriber-access operations ─────────────────────────────────

    /// Create one object with encoded metadata. Interactive priority.
    pub async fn create_user(&self, object: ExpectedObject) -> Result<DeviceObject, CoreError> {
        match self
            .execute(Command::CreateUser(object), Priority::High)
            .await?
        {
            CommandResult::User(user) => Ok(user),
            other => Err(unexpected("create-user", &other)),
        }
    }

    /// Create many objects at Bulk priority. One result per object, in
    /// submission order.
    pub async fn create_users_batch(
        &self,
        objects: Vec<ExpectedObject>,
    ) -> Vec<Result<DeviceObject, CoreError>> {
        let commands = objects.into_iter().map(Command::CreateUser).collect();
        self.execute_batch(commands, Priority::Bulk)
            .await
            .into_iter()
            .map(|result| match result? {
                CommandResult::User(user) => Ok(user),
                other => Err(unexpected("create-user", &other)),
            })
            .collect()
    }

    pub async fn update_user(
        &self,
        kind: ObjectKind,
        name: &str,
        update: UpdateUser,
    ) -> Result<DeviceObject, CoreError> {
        match self
            .execute(
                Command::UpdateUser {
                    kind,
                    name: name.to_owned(),
                    update,
                },
                Priority::High,
            )
            .await?
        {
            CommandResult::User(user) => Ok(user),
            other => Err(unexpected("update-user", &other)),
        }
    }

    pub async fn delete_user(&self, kind: ObjectKind, name: &str) -> Result<(), CoreError> {
        self.execute(
            Command::DeleteUser {
                kind,
                name: name.to_owned(),
            },
            Priority::High,
        )
        .await
        .map(|_| ())
    }

    pub async fn enable_user(&self, kind: ObjectKind, name: &str) -> Result<DeviceObject, CoreError> {
        self.update_user(
            kind,
            name,
            UpdateUser {
                disabled: Some(false),
                ..UpdateUser::default()
            },
        )
        .await
    }

    pub async fn disable_user(&self, kind: ObjectKind, name: &str) -> Result<DeviceObject, CoreError> {
        self.update_user(
            kind,
            name,
            UpdateUser {
                disabled: Some(true),
                ..UpdateUser::default()
            },
        )
        .await
    }

    pub async fn list_users(&self, kind: ObjectKind) -> Result<Vec<DeviceObject>, CoreError> {
        match self
            .execute(Command::ListUsers { kind }, Priority::Normal)
            .await?
        {
            CommandResult::Users(users) => Ok(users),
            other => Err(unexpected("list-users", &other)),
        }
    }

    pub async fn list_active_sessions(
        &self,
        kind: ObjectKind,
    ) -> Result<Vec<ActiveSession>, CoreError> {
        match self
            .execute(Command::ListActiveSessions { kind }, Priority::Normal)
            .await?
        {
            CommandResult::Sessions(sessions) => Ok(sessions),
            other => Err(unexpected("list-active", &other)),
        }
    }

    /// Force-disconnect a live session by device id.
    pub async fn remove_active_session(
        &self,
        kind: ObjectKind,
        id: &str,
    ) -> Result<(), CoreError> {
        self.execute(
            Command::RemoveActiveSession {
                kind,
                id: id.to_owned(),
            },
            Priority::High,
        )
        .await
        .map(|_| ())
    }

    pub async fn create_profile(
        &self,
        kind: ObjectKind,
        spec: ProfileSpec,
    ) -> Result<AccessProfile, CoreError> {
        match self
            .execute(Command::CreateProfile { kind, spec }, Priority::Normal)
            .await?
        {
            CommandResult::Profile(profile) => Ok(profile),
            other => Err(unexpected("create-profile", &other)),
        }
    }

    // ── Reconciliation ───────────────────────────────────────────────

    /// Converge the device toward `expected`: create what is missing,
    /// recreate legacy-commented objects with tagged metadata, treat
    /// "already exists" as success, and report per-object outcomes.
    pub async fn ensure_integration(
        &self,
        expected: Vec<ExpectedObject>,
    ) -> Result<ReconciliationResult, CoreError> {
        reconcile::run(self, expected).await
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn connection_info(&self) -> ConnectionInfo {
        self.inner.supervisor.connection_info()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.supervisor.subscribe_status()
    }

    /// Health and recovery events. Safe to drop the receiver; events
    /// are best-effort.
    pub fn events(&self) -> broadcast::Receiver<HealthEvent> {
        self.inner.events_tx.subscribe()
    }

    /// On-demand end-to-end probe: runs an identity command through the
    /// full queue/breaker/session path at interactive priority.
    pub async fn health_status(&self) -> HealthStatus {
        let started = Instant::now();
        match self.execute(Command::Identity, Priority::High).await {
            Ok(CommandResult::Identity(name)) => HealthStatus {
                healthy: true,
                message: format!("device '{name}' responding"),
                duration: started.elapsed(),
            },
            Ok(_) => HealthStatus {
                healthy: true,
                message: "device responding".into(),
                duration: started.elapsed(),
            },
            Err(e) => HealthStatus {
                healthy: false,
                message: e.to_string(),
                duration: started.elapsed(),
            },
        }
    }

    /// Trigger one recovery sequence immediately, outside the adaptive
    /// schedule. Success also resets the schedule to its base interval.
    pub async fn force_recovery(&self) -> Result<(), CoreError> {
        self.inner.health.force_recovery().await
    }

    pub async fn connection_stats(&self) -> ConnectionStats {
        let (attempts, successes, failures) = self.inner.supervisor.connect_counters();
        let executed = self.inner.stats.executed.load(Ordering::Relaxed);
        let failed = self.inner.stats.failed.load(Ordering::Relaxed);
        let total_ms = self.inner.stats.latency_ms_total.load(Ordering::Relaxed);
        let completed = executed + failed;
        let info = self.inner.supervisor.connection_info();

        ConnectionStats {
            connections: ConnectionCounters {
                attempts,
                successes,
                failures,
            },
            performance: PerformanceStats {
                commands_executed: executed,
                commands_failed: failed,
                avg_latency_ms: if completed > 0 { total_ms / completed } else { 0 },
            },
            client: ClientStats {
                connected: info.connected,
                status: info.status,
                identity: self.inner.supervisor.identity(),
            },
            errors: ErrorStats {
                breaker_trips: self.inner.breaker.trips(),
                last_error: self.inner.supervisor.last_error(),
            },
        }
    }

    /// Commands queued but not yet dispatched.
    pub fn pending_commands(&self) -> usize {
        self.inner.queue.pending()
    }
}

fn unexpected(op: &str, result: &CommandResult) -> CoreError {
    CoreError::Internal(format!("unexpected result for {op}: {result:?}"))
}

// ── Executor task ────────────────────────────────────────────────────

/// Single consumer of the command queue. One command is on the wire at
/// a time; the breaker decides whether it goes out at all.
async fn executor_task(
    queue: Arc<CommandQueue>,
    supervisor: Arc<ConnectionSupervisor>,
    breaker: Arc<CircuitBreaker>,
    stats: Arc<CommandStats>,
    cancel: CancellationToken,
) {
    loop {
        let envelope = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            maybe = queue.pop() => match maybe {
                Some(envelope) => envelope,
                None => break,
            },
        };

        let op = envelope.command.op();
        let queued_ms = envelope.submitted_at.elapsed().as_millis() as u64;
        let started = Instant::now();

        let result = breaker
            .guard(|| supervisor.dispatch(&envelope.command))
            .await;

        let latency_ms = started.elapsed().as_millis() as u64;
        stats
            .latency_ms_total
            .fetch_add(latency_ms, Ordering::Relaxed);
        match &result {
            Ok(_) => {
                stats.executed.fetch_add(1, Ordering::Relaxed);
                debug!(op, queued_ms, latency_ms, "command completed");
            }
            Err(e) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(op, queued_ms, latency_ms, error = %e, "command failed");
            }
        }

        // Caller may have given up waiting; that is fine.
        let _ = envelope.response_tx.send(result);
    }
    debug!("executor task stopped");
}
