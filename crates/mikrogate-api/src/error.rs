use thiserror::Error;

/// Top-level error type for the `mikrogate-api` crate.
///
/// Covers every failure mode of the REST surface: authentication,
/// transport, and device-side command rejections. `mikrogate-core`
/// maps these into its own taxonomy -- the RouterOS message-text
/// sniffing below is the only place in the system that looks at
/// device error strings.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Credentials rejected by the router (HTTP 401).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Device API ──────────────────────────────────────────────────
    /// Structured error from the REST API (parsed from the
    /// `{error, message, detail}` body on a non-2xx response).
    #[error("Device API error (HTTP {status}): {message}")]
    DeviceApi {
        message: String,
        detail: Option<String>,
        status: u16,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

// RouterOS reports command rejections only as free text in the `detail`
// field. These fragments are stable across 7.x releases.
const DETAIL_ALREADY_EXISTS: &[&str] = &["already have", "entry already exists"];
const DETAIL_PROFILE_MISSING: &str = "value of profile";
const DETAIL_NOT_FOUND: &str = "no such item";

impl Error {
    /// Returns `true` if this error indicates rejected credentials.
    /// Configuration problem -- never worth an automatic retry.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient connectivity error worth
    /// retrying (timeout, connection reset, unreachable host).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the device rejected a create because the
    /// object already exists.
    pub fn is_conflict(&self) -> bool {
        self.detail_contains(|d| {
            DETAIL_ALREADY_EXISTS.iter().any(|frag| d.contains(frag))
        })
    }

    /// Returns `true` if the device rejected a command because it
    /// references a profile that does not exist on the device.
    pub fn is_profile_missing(&self) -> bool {
        self.detail_contains(|d| d.contains(DETAIL_PROFILE_MISSING))
    }

    /// Returns `true` if this is a "no such item" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::DeviceApi { status: 404, .. } => true,
            _ => self.detail_contains(|d| d.contains(DETAIL_NOT_FOUND)),
        }
    }

    /// Returns `true` if the device rejected the command's shape
    /// (validation) for a reason other than conflict or missing item.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::DeviceApi { status: 400, .. })
            && !self.is_conflict()
            && !self.is_not_found()
    }

    /// The device-supplied detail text, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::DeviceApi { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    fn detail_contains(&self, pred: impl Fn(&str) -> bool) -> bool {
        match self {
            Self::DeviceApi { detail, message, .. } => {
                detail.as_deref().is_some_and(&pred) || pred(message)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_err(status: u16, message: &str, detail: Option<&str>) -> Error {
        Error::DeviceApi {
            message: message.into(),
            detail: detail.map(Into::into),
            status,
        }
    }

    #[test]
    fn conflict_detected_from_detail_text() {
        let err = device_err(
            400,
            "Bad Request",
            Some("failure: already have user with this name"),
        );
        assert!(err.is_conflict());
        assert!(!err.is_profile_missing());
        assert!(!err.is_validation());
    }

    #[test]
    fn profile_mismatch_detected_from_detail_text() {
        let err = device_err(
            400,
            "Bad Request",
            Some("input does not match any value of profile"),
        );
        assert!(err.is_profile_missing());
        assert!(!err.is_conflict());
    }

    #[test]
    fn not_found_detected_from_status_and_detail() {
        assert!(device_err(404, "Not Found", None).is_not_found());
        assert!(device_err(400, "Bad Request", Some("no such item")).is_not_found());
    }

    #[test]
    fn auth_error_is_not_transient() {
        let err = Error::Authentication {
            message: "invalid user name or password".into(),
        };
        assert!(err.is_auth());
        assert!(!err.is_transient());
    }

    #[test]
    fn timeout_is_transient() {
        assert!(Error::Timeout { timeout_secs: 10 }.is_transient());
    }
}
