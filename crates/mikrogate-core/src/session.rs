// ── Connection supervisor ──
//
// Owns the single live device session. All command routing happens
// here; the gateway's executor funnels every dispatch through one
// supervisor instance so the device never sees concurrent sessions.
//
// Authentication failure is a configuration error: it clears
// `has_valid_config` and is never retried automatically. Transient
// connect failures leave the config valid so the recovery service can
// keep probing.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use mikrogate_api::RouterClient;
use mikrogate_api::transport::{TlsMode, TransportConfig};

use crate::command::{Command, CommandResult};
use crate::config::{GatewayConfig, TlsVerification};
use crate::convert;
use crate::error::{CoreError, ErrorKind};
use crate::model::{ConnectionInfo, ConnectionStatus, DeviceObject, ObjectKind};

pub(crate) struct ConnectionSupervisor {
    config: GatewayConfig,
    client: tokio::sync::Mutex<Option<RouterClient>>,
    status_tx: watch::Sender<ConnectionStatus>,
    has_valid_config: AtomicBool,
    last_error: Mutex<Option<String>>,
    last_success: Mutex<Option<DateTime<Utc>>>,
    identity: Mutex<Option<String>>,
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
}

impl ConnectionSupervisor {
    pub fn new(config: GatewayConfig) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            config,
            client: tokio::sync::Mutex::new(None),
            status_tx,
            has_valid_config: AtomicBool::new(true),
            last_error: Mutex::new(None),
            last_success: Mutex::new(None),
            identity: Mutex::new(None),
            attempts: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Open the session. Idempotent: an already-connected supervisor
    /// returns `Ok(true)` without re-authenticating.
    pub async fn connect(&self) -> Result<bool, CoreError> {
        let mut client_guard = self.client.lock().await;
        if client_guard.is_some() {
            return Ok(true);
        }

        self.attempts.fetch_add(1, Ordering::Relaxed);
        self.set_status(ConnectionStatus::Connecting);

        let transport = TransportConfig {
            tls: tls_to_transport(&self.config.tls),
            timeout: self.config.timeout,
        };
        let client = RouterClient::new(
            self.config.url.clone(),
            self.config.username.clone(),
            self.config.password.expose_secret(),
            &transport,
        )
        .map_err(CoreError::from)?;

        match client.login().await {
            Ok(identity) => {
                info!(identity = %identity, "device session established");
                *self.identity.lock().expect("identity mutex poisoned") = Some(identity);
                self.has_valid_config.store(true, Ordering::Relaxed);
                self.successes.fetch_add(1, Ordering::Relaxed);
                self.record_success();
                *client_guard = Some(client);
                self.set_status(ConnectionStatus::Connected);
                Ok(true)
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                let core: CoreError = e.into();
                if core.kind() == ErrorKind::Configuration {
                    // Bad credentials -- retrying cannot help.
                    warn!(error = %core, "authentication rejected, marking config invalid");
                    self.has_valid_config.store(false, Ordering::Relaxed);
                } else {
                    warn!(error = %core, "device unreachable");
                }
                self.record_error(&core);
                self.set_status(ConnectionStatus::Disconnected);
                Err(core)
            }
        }
    }

    /// Drop the session. REST sessions have no server-side state to
    /// tear down, so this is purely local.
    pub async fn disconnect(&self) {
        let mut client_guard = self.client.lock().await;
        if client_guard.take().is_some() {
            debug!("device session dropped");
        }
        self.set_status(ConnectionStatus::Disconnected);
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    /// Route one command to the device. Fails fast with `NotConnected`
    /// on a disconnected session -- reconnection is the circuit breaker
    /// and recovery service's decision, not ours.
    ///
    /// Every underlying request is bounded by the transport timeout.
    pub async fn dispatch(&self, command: &Command) -> Result<CommandResult, CoreError> {
        let client_guard = self.client.lock().await;
        let client = client_guard.as_ref().ok_or(CoreError::NotConnected)?;

        let result = route_command(client, command).await;
        match &result {
            Ok(_) => self.record_success(),
            Err(e) => {
                self.record_error(e);
                if e.kind() == ErrorKind::Transient {
                    self.set_status(ConnectionStatus::Degraded);
                }
            }
        }
        result
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    pub fn has_valid_config(&self) -> bool {
        self.has_valid_config.load(Ordering::Relaxed)
    }

    pub fn identity(&self) -> Option<String> {
        self.identity.lock().expect("identity mutex poisoned").clone()
    }

    pub fn connection_info(&self) -> ConnectionInfo {
        let status = self.status();
        ConnectionInfo {
            connected: matches!(
                status,
                ConnectionStatus::Connected | ConnectionStatus::Degraded
            ),
            has_valid_config: self.has_valid_config(),
            status,
            is_offline: status != ConnectionStatus::Connected,
            last_error: self.last_error.lock().expect("error mutex poisoned").clone(),
            last_success: *self.last_success.lock().expect("success mutex poisoned"),
        }
    }

    /// (attempts, successes, failures) connect counters.
    pub fn connect_counters(&self) -> (u64, u64, u64) {
        (
            self.attempts.load(Ordering::Relaxed),
            self.successes.load(Ordering::Relaxed),
            self.failures.load(Ordering::Relaxed),
        )
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().expect("error mutex poisoned").clone()
    }

    fn record_success(&self) {
        *self.last_success.lock().expect("success mutex poisoned") = Some(Utc::now());
        if self.status() == ConnectionStatus::Degraded {
            self.set_status(ConnectionStatus::Connected);
        }
    }

    fn record_error(&self, error: &CoreError) {
        *self.last_error.lock().expect("error mutex poisoned") = Some(error.to_string());
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                debug!(from = %current, to = %status, "connection status change");
                *current = status;
                true
            }
        });
    }
}

// ── Command routing ──────────────────────────────────────────────────

async fn route_command(
    client: &RouterClient,
    command: &Command,
) -> Result<CommandResult, CoreError> {
    match command {
        Command::CreateUser(expected) => match expected.kind {
            ObjectKind::HotspotUser => {
                let created = client
                    .add_hotspot_user(&convert::hotspot_params(expected))
                    .await?;
                Ok(CommandResult::User(created.into()))
            }
            ObjectKind::PppSecret => {
                let created = client.add_ppp_secret(&convert::ppp_params(expected)).await?;
                Ok(CommandResult::User(created.into()))
            }
        },

        Command::UpdateUser { kind, name, update } => {
            let target = find_by_name(client, *kind, name).await?;
            match kind {
                ObjectKind::HotspotUser => {
                    let params = mikrogate_api::models::HotspotUserParams {
                        password: update.password.clone(),
                        profile: update.profile.clone(),
                        comment: update.comment.clone(),
                        disabled: update.disabled.map(|d| d.to_string()),
                        ..Default::default()
                    };
                    let updated = client.set_hotspot_user(&target.id, &params).await?;
                    Ok(CommandResult::User(updated.into()))
                }
                ObjectKind::PppSecret => {
                    let params = mikrogate_api::models::PppSecretParams {
                        password: update.password.clone(),
                        profile: update.profile.clone(),
                        comment: update.comment.clone(),
                        disabled: update.disabled.map(|d| d.to_string()),
                        ..Default::default()
                    };
                    let updated = client.set_ppp_secret(&target.id, &params).await?;
                    Ok(CommandResult::User(updated.into()))
                }
            }
        }

        Command::DeleteUser { kind, name } => {
            let target = find_by_name(client, *kind, name).await?;
            match kind {
                ObjectKind::HotspotUser => client.remove_hotspot_user(&target.id).await?,
                ObjectKind::PppSecret => client.remove_ppp_secret(&target.id).await?,
            }
            Ok(CommandResult::Done)
        }

        Command::ListUsers { kind } => {
            let users: Vec<DeviceObject> = match kind {
                ObjectKind::HotspotUser => client
                    .list_hotspot_users()
                    .await?
                    .into_iter()
                    .map(Into::into)
                    .collect(),
                ObjectKind::PppSecret => client
                    .list_ppp_secrets()
                    .await?
                    .into_iter()
                    .map(Into::into)
                    .collect(),
            };
            Ok(CommandResult::Users(users))
        }

        Command::ListActiveSessions { kind } => {
            let sessions = match kind {
                ObjectKind::HotspotUser => client
                    .list_hotspot_active()
                    .await?
                    .into_iter()
                    .map(Into::into)
                    .collect(),
                ObjectKind::PppSecret => client
                    .list_ppp_active()
                    .await?
                    .into_iter()
                    .map(Into::into)
                    .collect(),
            };
            Ok(CommandResult::Sessions(sessions))
        }

        Command::RemoveActiveSession { kind, id } => {
            match kind {
                ObjectKind::HotspotUser => client.remove_hotspot_active(id).await?,
                ObjectKind::PppSecret => client.remove_ppp_active(id).await?,
            }
            Ok(CommandResult::Done)
        }

        Command::CreateProfile { kind, spec } => {
            let params = convert::profile_params(spec);
            match kind {
                ObjectKind::HotspotUser => {
                    let created = client.add_hotspot_profile(&params).await?;
                    Ok(CommandResult::Profile(created.into()))
                }
                ObjectKind::PppSecret => {
                    let created = client.add_ppp_profile(&params).await?;
                    Ok(CommandResult::Profile(created.into()))
                }
            }
        }

        Command::Identity => {
            let identity = client.identity().await?;
            Ok(CommandResult::Identity(identity.name))
        }
    }
}

/// Resolve an object name to its current device entry.
async fn find_by_name(
    client: &RouterClient,
    kind: ObjectKind,
    name: &str,
) -> Result<DeviceObject, CoreError> {
    let found: Option<DeviceObject> = match kind {
        ObjectKind::HotspotUser => client
            .find_hotspot_users(name)
            .await?
            .into_iter()
            .next()
            .map(Into::into),
        ObjectKind::PppSecret => client
            .find_ppp_secrets(name)
            .await?
            .into_iter()
            .next()
            .map(Into::into),
    };
    found.ok_or_else(|| CoreError::NotFound {
        name: name.to_owned(),
    })
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
