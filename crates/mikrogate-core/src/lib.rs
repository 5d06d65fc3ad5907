//! Resilient device-integration layer between `mikrogate-api` and
//! billing/portal consumers.
//!
//! This crate keeps subscriber-access objects (hotspot vouchers, PPPoE
//! secrets) consistent between a database and a MikroTik-class router
//! whose API is stateful, slow, and occasionally unreachable:
//!
//! - **[`DeviceGateway`]** — Central facade managing the full lifecycle:
//!   [`connect()`](DeviceGateway::connect) authenticates and starts the
//!   background health monitor; every device operation flows through a
//!   four-band priority queue into a single executor so the device never
//!   sees concurrent sessions.
//!
//! - **Circuit breaker** ([`breaker`]) — Consecutive connectivity
//!   failures open the circuit and commands fail fast with
//!   [`CoreError::CircuitOpen`] instead of hammering a dead device.
//!
//! - **Health monitor** ([`HealthEvent`]) — Out-of-band recovery on an
//!   adaptive interval: backs off while the device stays down, speeds
//!   back up once it answers.
//!
//! - **Reconciliation** ([`reconcile`]) —
//!   [`ensure_integration()`](DeviceGateway::ensure_integration)
//!   converges the device toward the database's expected state:
//!   creates what is missing, migrates legacy-commented objects, and
//!   treats "already exists" as success.
//!
//! - **Metadata codec** ([`codec`]) — Business metadata (price, expiry,
//!   batch) embedded in each object's device comment field under a
//!   versioned `MGATE1|...` format; decoding never fails.

pub mod breaker;
pub mod codec;
pub mod command;
pub mod config;
pub mod error;
pub mod gateway;
pub mod health;
pub mod model;
pub mod reconcile;

mod convert;
mod queue;
mod session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use breaker::BreakerState;
pub use command::{Command, CommandResult, Priority, UpdateUser};
pub use config::{BreakerConfig, GatewayConfig, HealthConfig, TlsVerification};
pub use error::{CoreError, ErrorKind};
pub use gateway::DeviceGateway;
pub use health::HealthEvent;
pub use reconcile::{LocalStatus, LocalUpdate, ReconcileError, ReconciliationResult};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    AccessProfile,
    ActiveSession,
    ConnectionInfo,
    ConnectionStats,
    ConnectionStatus,
    DeviceObject,
    ExpectedObject,
    HealthStatus,
    ObjectKind,
    ProfileSpec,
};
