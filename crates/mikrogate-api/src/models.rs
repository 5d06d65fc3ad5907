// RouterOS REST wire types.
//
// The REST API serializes every value as a JSON string ("true", "1024",
// "10d4h"), so the wire structs here are string-typed and deliberately
// dumb. mikrogate-core's convert module turns them into domain types.

use serde::{Deserialize, Serialize};

// ── Error envelope ──────────────────────────────────────────────────

/// Error body returned on non-2xx responses:
/// `{"error": 400, "message": "Bad Request", "detail": "failure: ..."}`
#[derive(Debug, Clone, Deserialize)]
pub struct RestError {
    pub error: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub detail: Option<String>,
}

// ── Hotspot ─────────────────────────────────────────────────────────

/// `/ip/hotspot/user` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RosHotspotUser {
    #[serde(rename = ".id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub disabled: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(rename = "limit-uptime", default)]
    pub limit_uptime: Option<String>,
    #[serde(rename = "bytes-in", default)]
    pub bytes_in: Option<String>,
    #[serde(rename = "bytes-out", default)]
    pub bytes_out: Option<String>,
    #[serde(default)]
    pub uptime: Option<String>,
}

/// `/ip/hotspot/active` entry (a live hotspot session).
#[derive(Debug, Clone, Deserialize)]
pub struct RosHotspotActive {
    #[serde(rename = ".id")]
    pub id: String,
    pub user: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(rename = "mac-address", default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub uptime: Option<String>,
    #[serde(rename = "bytes-in", default)]
    pub bytes_in: Option<String>,
    #[serde(rename = "bytes-out", default)]
    pub bytes_out: Option<String>,
    #[serde(rename = "login-by", default)]
    pub login_by: Option<String>,
}

/// `/ip/hotspot/user/profile` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RosHotspotProfile {
    #[serde(rename = ".id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: Option<String>,
    #[serde(rename = "shared-users", default)]
    pub shared_users: Option<String>,
    #[serde(rename = "session-timeout", default)]
    pub session_timeout: Option<String>,
}

// ── PPP ─────────────────────────────────────────────────────────────

/// `/ppp/secret` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RosPppSecret {
    #[serde(rename = ".id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub disabled: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(rename = "remote-address", default)]
    pub remote_address: Option<String>,
}

/// `/ppp/active` entry (a live PPPoE session).
#[derive(Debug, Clone, Deserialize)]
pub struct RosPppActive {
    #[serde(rename = ".id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(rename = "caller-id", default)]
    pub caller_id: Option<String>,
    #[serde(default)]
    pub uptime: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
}

/// `/ppp/profile` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RosPppProfile {
    #[serde(rename = ".id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: Option<String>,
    #[serde(rename = "local-address", default)]
    pub local_address: Option<String>,
    #[serde(rename = "remote-address", default)]
    pub remote_address: Option<String>,
}

// ── System ──────────────────────────────────────────────────────────

/// `/system/identity` -- the cheapest possible liveness probe.
#[derive(Debug, Clone, Deserialize)]
pub struct RosIdentity {
    pub name: String,
}

/// `/system/resource` (subset).
#[derive(Debug, Clone, Deserialize)]
pub struct RosResource {
    #[serde(default)]
    pub uptime: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(rename = "board-name", default)]
    pub board_name: Option<String>,
    #[serde(rename = "cpu-load", default)]
    pub cpu_load: Option<String>,
}

// ── Write parameter structs ─────────────────────────────────────────
//
// PUT/PATCH bodies. `None` fields are omitted entirely so a PATCH only
// touches what the caller set.

/// Parameters for creating or patching a hotspot user.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HotspotUserParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<String>,
    #[serde(rename = "limit-uptime", skip_serializing_if = "Option::is_none")]
    pub limit_uptime: Option<String>,
}

/// Parameters for creating or patching a PPP secret.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PppSecretParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<String>,
}

/// Parameters for creating a hotspot user profile or PPP profile.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "rate-limit", skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<String>,
    #[serde(rename = "shared-users", skip_serializing_if = "Option::is_none")]
    pub shared_users: Option<String>,
    #[serde(rename = "session-timeout", skip_serializing_if = "Option::is_none")]
    pub session_timeout: Option<String>,
}
