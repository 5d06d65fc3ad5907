// Core error types
//
// User-facing errors from mikrogate-core. Consumers never see HTTP
// status codes or raw device strings directly -- the `From<mikrogate_api::Error>`
// impl translates transport-layer errors into domain variants, and
// `ErrorKind` drives every retry/repair decision in the system.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to device at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Device not connected")]
    NotConnected,

    #[error("Device command timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Circuit breaker is open -- device calls suspended")]
    CircuitOpen,

    // ── Queue errors ─────────────────────────────────────────────────
    #[error("Command cancelled before dispatch")]
    Cancelled,

    // ── Device command errors ────────────────────────────────────────
    #[error("Object already exists on device: {name}")]
    Conflict { name: String },

    #[error("Device rejected command: {message}")]
    ValidationFailed { message: String },

    #[error("Profile not present on device: {message}")]
    ProfileMissing { message: String },

    #[error("Object not found on device: {name}")]
    NotFound { name: String },

    #[error("Device API error: {message}")]
    Api {
        message: String,
        detail: Option<String>,
        status: Option<u16>,
    },

    // ── Protocol errors ──────────────────────────────────────────────
    #[error("Unparseable device response: {message}")]
    Protocol { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure classes driving retry/repair policy (one class per error).
///
/// - `Configuration` -- never retried automatically
/// - `Transient` -- absorbed by the circuit breaker / recovery service
/// - `Validation` -- targeted auto-repair in reconciliation, one retry
/// - `Conflict` -- treated as idempotent success during creation
/// - `Fatal` -- surfaced to the caller, never retried silently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Transient,
    Validation,
    Conflict,
    Fatal,
}

impl CoreError {
    /// Classify this error for retry/repair policy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthenticationFailed { .. } | Self::Config { .. } => ErrorKind::Configuration,
            Self::ConnectionFailed { .. }
            | Self::NotConnected
            | Self::Timeout { .. }
            | Self::CircuitOpen
            | Self::Cancelled => ErrorKind::Transient,
            Self::ValidationFailed { .. } | Self::ProfileMissing { .. } => ErrorKind::Validation,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::NotFound { .. }
            | Self::Api { .. }
            | Self::Protocol { .. }
            | Self::Internal(_) => ErrorKind::Fatal,
        }
    }

    /// Returns `true` if this failure should count against the circuit
    /// breaker. Only connectivity-class outcomes qualify -- device-side
    /// validation and conflicts say nothing about link health.
    pub fn is_breaker_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::Timeout { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<mikrogate_api::Error> for CoreError {
    fn from(err: mikrogate_api::Error) -> Self {
        // Classify on the api error first -- its helpers are the only
        // place that understands device message text.
        if err.is_conflict() {
            return CoreError::Conflict {
                name: err.detail().unwrap_or_default().to_owned(),
            };
        }
        if err.is_profile_missing() {
            return CoreError::ProfileMissing {
                message: err.detail().unwrap_or_default().to_owned(),
            };
        }
        if err.is_not_found() {
            return CoreError::NotFound {
                name: err.detail().unwrap_or_default().to_owned(),
            };
        }

        match err {
            mikrogate_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            // Timeouts never arrive as raw transport errors: the api
            // client classifies them into `Error::Timeout` with the
            // configured budget.
            mikrogate_api::Error::Transport(ref e) => CoreError::ConnectionFailed {
                url: e
                    .url()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "<unknown>".into()),
                reason: e.to_string(),
            },
            mikrogate_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            mikrogate_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            mikrogate_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            mikrogate_api::Error::DeviceApi {
                message,
                detail,
                status,
            } => {
                if status == 400 {
                    CoreError::ValidationFailed {
                        message: detail.unwrap_or(message),
                    }
                } else {
                    CoreError::Api {
                        message,
                        detail,
                        status: Some(status),
                    }
                }
            }
            mikrogate_api::Error::Deserialization { message, body: _ } => CoreError::Protocol {
                message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_classified_as_conflict_kind() {
        let api_err = mikrogate_api::Error::DeviceApi {
            message: "Bad Request".into(),
            detail: Some("failure: already have user with this name".into()),
            status: 400,
        };
        let core: CoreError = api_err.into();
        assert_eq!(core.kind(), ErrorKind::Conflict);
        assert!(!core.is_breaker_failure());
    }

    #[test]
    fn profile_mismatch_classified_as_validation_kind() {
        let api_err = mikrogate_api::Error::DeviceApi {
            message: "Bad Request".into(),
            detail: Some("input does not match any value of profile".into()),
            status: 400,
        };
        let core: CoreError = api_err.into();
        assert!(matches!(core, CoreError::ProfileMissing { .. }));
        assert_eq!(core.kind(), ErrorKind::Validation);
    }

    #[test]
    fn timeout_counts_against_breaker() {
        let core: CoreError = mikrogate_api::Error::Timeout { timeout_secs: 10 }.into();
        assert_eq!(core.kind(), ErrorKind::Transient);
        assert!(core.is_breaker_failure());
    }

    #[test]
    fn auth_failure_is_configuration_not_transient() {
        let core: CoreError = mikrogate_api::Error::Authentication {
            message: "bad credentials".into(),
        }
        .into();
        assert_eq!(core.kind(), ErrorKind::Configuration);
        assert!(!core.is_breaker_failure());
    }

    #[test]
    fn unparseable_body_is_fatal() {
        let core: CoreError = mikrogate_api::Error::Deserialization {
            message: "expected value".into(),
            body: "<html>".into(),
        }
        .into();
        assert_eq!(core.kind(), ErrorKind::Fatal);
    }
}
