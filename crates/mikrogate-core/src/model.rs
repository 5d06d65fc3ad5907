// ── Domain types ──
//
// Device-agnostic projections of router state plus the status/stats
// structs the gateway reports. Wire structs live in mikrogate-api;
// convert.rs maps between the two.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::codec::MetadataRecord;

/// Which device table a subscriber-access object lives in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    /// `/ip/hotspot/user` -- prepaid voucher logins.
    HotspotUser,
    /// `/ppp/secret` -- PPPoE subscriber accounts.
    PppSecret,
}

/// A subscriber-access object as reported by the device.
///
/// A read/write projection of device state -- fetched on demand,
/// never cached indefinitely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceObject {
    /// Device-internal id (`*1`, `*A3`...). Valid only until the object
    /// is removed; never persisted upstream.
    pub id: String,
    pub kind: ObjectKind,
    pub name: String,
    pub profile: Option<String>,
    pub disabled: bool,
    /// Raw comment text. Decode with [`crate::codec`] to get metadata.
    pub comment: String,
    pub bytes_in: Option<u64>,
    pub bytes_out: Option<u64>,
}

/// A live session (hotspot login or PPPoE connection).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveSession {
    pub id: String,
    pub kind: ObjectKind,
    /// Login name of the subscriber.
    pub user: String,
    pub address: Option<String>,
    /// MAC for hotspot sessions, caller-id for PPPoE.
    pub endpoint: Option<String>,
    pub uptime: Option<Duration>,
    pub bytes_in: Option<u64>,
    pub bytes_out: Option<u64>,
}

/// A bandwidth/session profile on the device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessProfile {
    pub id: String,
    pub name: String,
    pub rate_limit: Option<String>,
    pub shared_users: Option<u32>,
}

/// Specification for creating a profile on the device.
#[derive(Debug, Clone, Default)]
pub struct ProfileSpec {
    pub name: String,
    pub rate_limit: Option<String>,
    pub shared_users: Option<u32>,
    pub session_timeout: Option<String>,
}

/// What the database says should exist on the device.
///
/// The reconciliation engine converges the device toward a list of these.
#[derive(Debug, Clone)]
pub struct ExpectedObject {
    pub kind: ObjectKind,
    pub name: String,
    pub password: String,
    pub profile: String,
    pub disabled: bool,
    /// Business metadata to embed in the device comment field.
    pub metadata: MetadataRecord,
}

// ── Connection status & reporting ───────────────────────────────────

/// Connection status observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    /// Connected but the last command failed -- link is suspect.
    Degraded,
}

/// Snapshot of the connection for dashboards and callers.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub connected: bool,
    /// `false` after an authentication failure -- operator action needed,
    /// automatic recovery will not retry.
    pub has_valid_config: bool,
    pub status: ConnectionStatus,
    pub is_offline: bool,
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
}

/// Result of an on-demand health probe.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub message: String,
    /// How long the probe took.
    pub duration: Duration,
}

// ── Connection statistics ───────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectionCounters {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PerformanceStats {
    pub commands_executed: u64,
    pub commands_failed: u64,
    pub avg_latency_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientStats {
    pub connected: bool,
    pub status: ConnectionStatus,
    pub identity: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ErrorStats {
    pub breaker_trips: u64,
    pub last_error: Option<String>,
}

/// Aggregate statistics for monitoring routes.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStats {
    pub connections: ConnectionCounters,
    pub performance: PerformanceStats,
    pub client: ClientStats,
    pub errors: ErrorStats,
}
