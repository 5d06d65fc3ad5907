// ── Wire → domain conversion ──
//
// RouterOS REST serializes everything as strings ("true", "1024",
// "1d2h3m4s"); all of that parsing lives here so the rest of the core
// only sees typed domain structs.

use std::time::Duration;

use mikrogate_api::models::{
    HotspotUserParams, PppSecretParams, ProfileParams, RosHotspotActive, RosHotspotProfile,
    RosHotspotUser, RosPppActive, RosPppProfile, RosPppSecret,
};

use crate::codec;
use crate::model::{AccessProfile, ActiveSession, DeviceObject, ExpectedObject, ObjectKind,
    ProfileSpec};

// ── Scalar parsers ──────────────────────────────────────────────────

/// RouterOS booleans arrive as the strings "true"/"false" (or "yes"/"no"
/// on some paths). Anything unrecognized is treated as false.
fn parse_bool(value: Option<&str>) -> bool {
    matches!(value, Some("true" | "yes"))
}

fn parse_u64(value: Option<&str>) -> Option<u64> {
    value.and_then(|v| v.parse().ok())
}

/// Parse a RouterOS uptime string like `"2w1d5h30m12s"` into a Duration.
/// Unrecognized input yields `None` rather than a partial value.
pub(crate) fn parse_uptime(value: &str) -> Option<Duration> {
    if value.is_empty() {
        return None;
    }

    let mut total: u64 = 0;
    let mut num: u64 = 0;
    let mut saw_digit = false;

    for ch in value.chars() {
        if let Some(d) = ch.to_digit(10) {
            num = num.checked_mul(10)?.checked_add(u64::from(d))?;
            saw_digit = true;
        } else {
            if !saw_digit {
                return None;
            }
            let secs = match ch {
                'w' => 604_800,
                'd' => 86_400,
                'h' => 3_600,
                'm' => 60,
                's' => 1,
                _ => return None,
            };
            total = total.checked_add(num.checked_mul(secs)?)?;
            num = 0;
            saw_digit = false;
        }
    }

    // Trailing digits without a unit -> malformed.
    if saw_digit { None } else { Some(Duration::from_secs(total)) }
}

// ── Object conversions ──────────────────────────────────────────────

impl From<RosHotspotUser> for DeviceObject {
    fn from(u: RosHotspotUser) -> Self {
        DeviceObject {
            id: u.id,
            kind: ObjectKind::HotspotUser,
            name: u.name,
            profile: u.profile,
            disabled: parse_bool(u.disabled.as_deref()),
            comment: u.comment.unwrap_or_default(),
            bytes_in: parse_u64(u.bytes_in.as_deref()),
            bytes_out: parse_u64(u.bytes_out.as_deref()),
        }
    }
}

impl From<RosPppSecret> for DeviceObject {
    fn from(s: RosPppSecret) -> Self {
        DeviceObject {
            id: s.id,
            kind: ObjectKind::PppSecret,
            name: s.name,
            profile: s.profile,
            disabled: parse_bool(s.disabled.as_deref()),
            comment: s.comment.unwrap_or_default(),
            bytes_in: None,
            bytes_out: None,
        }
    }
}

impl From<RosHotspotActive> for ActiveSession {
    fn from(a: RosHotspotActive) -> Self {
        ActiveSession {
            id: a.id,
            kind: ObjectKind::HotspotUser,
            user: a.user,
            address: a.address,
            endpoint: a.mac_address,
            uptime: a.uptime.as_deref().and_then(parse_uptime),
            bytes_in: parse_u64(a.bytes_in.as_deref()),
            bytes_out: parse_u64(a.bytes_out.as_deref()),
        }
    }
}

impl From<RosPppActive> for ActiveSession {
    fn from(a: RosPppActive) -> Self {
        ActiveSession {
            id: a.id,
            kind: ObjectKind::PppSecret,
            user: a.name,
            address: a.address,
            endpoint: a.caller_id,
            uptime: a.uptime.as_deref().and_then(parse_uptime),
            bytes_in: None,
            bytes_out: None,
        }
    }
}

impl From<RosHotspotProfile> for AccessProfile {
    fn from(p: RosHotspotProfile) -> Self {
        AccessProfile {
            id: p.id,
            name: p.name,
            rate_limit: p.rate_limit,
            shared_users: p.shared_users.as_deref().and_then(|v| v.parse().ok()),
        }
    }
}

impl From<RosPppProfile> for AccessProfile {
    fn from(p: RosPppProfile) -> Self {
        AccessProfile {
            id: p.id,
            name: p.name,
            rate_limit: p.rate_limit,
            shared_users: None,
        }
    }
}

// ── Write-parameter builders ────────────────────────────────────────

/// Build hotspot creation params from an expected object, encoding the
/// metadata into the comment field.
pub(crate) fn hotspot_params(expected: &ExpectedObject) -> HotspotUserParams {
    HotspotUserParams {
        name: Some(expected.name.clone()),
        password: Some(expected.password.clone()),
        profile: Some(expected.profile.clone()),
        comment: Some(codec::encode(&expected.metadata)),
        disabled: Some(expected.disabled.to_string()),
        limit_uptime: None,
    }
}

/// Build PPP secret creation params from an expected object.
pub(crate) fn ppp_params(expected: &ExpectedObject) -> PppSecretParams {
    PppSecretParams {
        name: Some(expected.name.clone()),
        password: Some(expected.password.clone()),
        profile: Some(expected.profile.clone()),
        service: Some("pppoe".into()),
        comment: Some(codec::encode(&expected.metadata)),
        disabled: Some(expected.disabled.to_string()),
    }
}

pub(crate) fn profile_params(spec: &ProfileSpec) -> ProfileParams {
    ProfileParams {
        name: Some(spec.name.clone()),
        rate_limit: spec.rate_limit.clone(),
        shared_users: spec.shared_users.map(|n| n.to_string()),
        session_timeout: spec.session_timeout.clone(),
    }
}
