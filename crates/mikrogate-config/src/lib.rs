//! Shared configuration for mikrogate deployments.
//!
//! TOML device profiles, credential resolution (env + plaintext), and
//! translation to `mikrogate_core::GatewayConfig`. The core crate never
//! reads files or environment variables — everything it needs is built
//! here and handed in.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use mikrogate_core::{BreakerConfig, GatewayConfig, HealthConfig, TlsVerification};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no device profile named '{device}'")]
    NoSuchDevice { device: String },

    #[error("no password configured for device '{device}'")]
    NoCredentials { device: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Device profile used when the caller does not name one.
    pub default_device: Option<String>,

    /// Global defaults applied to every device.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named device profiles.
    #[serde(default)]
    pub devices: HashMap<String, DeviceProfile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_device: Some("default".into()),
            defaults: Defaults::default(),
            devices: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Skip TLS verification. Routers ship self-signed certs, so this
    /// defaults to true; set a `ca_cert` per device to verify properly.
    #[serde(default = "default_insecure")]
    pub insecure: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            insecure: default_insecure(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}
fn default_insecure() -> bool {
    true
}

/// A named device profile.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DeviceProfile {
    /// Device base URL (e.g., "https://192.168.88.1").
    pub url: String,

    /// REST API username.
    #[serde(default = "default_username")]
    pub username: String,

    /// Password (plaintext — prefer `password_env`).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,

    /// Circuit breaker tuning.
    #[serde(default)]
    pub breaker: BreakerTuning,

    /// Health monitor tuning.
    #[serde(default)]
    pub health: HealthTuning,
}

fn default_username() -> String {
    "admin".into()
}

/// Circuit breaker overrides; unset fields take core defaults.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct BreakerTuning {
    pub failure_threshold: Option<u32>,
    pub reset_timeout_secs: Option<u64>,
}

/// Health monitor overrides; unset fields take core defaults.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct HealthTuning {
    pub base_interval_secs: Option<u64>,
    pub min_interval_secs: Option<u64>,
    pub max_interval_secs: Option<u64>,
    pub backoff_after: Option<u32>,
    pub recovery_delay_secs: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "mikrogate", "mikrogate").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("mikrogate");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from an explicit path + environment. Environment keys
/// are prefixed `MIKROGATE_` and nested with `_` (e.g.,
/// `MIKROGATE_DEFAULTS_TIMEOUT=5`).
pub fn load_config_from(path: &std::path::Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("MIKROGATE_").split("_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(())
}

// ── Profile resolution ──────────────────────────────────────────────

/// Pick a device profile by name, falling back to `default_device`.
pub fn device_profile<'a>(
    config: &'a Config,
    name: Option<&str>,
) -> Result<(&'a str, &'a DeviceProfile), ConfigError> {
    let name = name
        .or(config.default_device.as_deref())
        .ok_or_else(|| ConfigError::NoSuchDevice {
            device: "<default>".into(),
        })?;
    config
        .devices
        .get_key_value(name)
        .map(|(k, v)| (k.as_str(), v))
        .ok_or_else(|| ConfigError::NoSuchDevice {
            device: name.into(),
        })
}

/// Resolve a device password: named env var, then `MIKROGATE_PASSWORD`,
/// then plaintext in the profile.
pub fn resolve_password(
    profile: &DeviceProfile,
    device_name: &str,
) -> Result<SecretString, ConfigError> {
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    if let Ok(val) = std::env::var("MIKROGATE_PASSWORD") {
        return Ok(SecretString::from(val));
    }

    if let Some(ref password) = profile.password {
        return Ok(SecretString::from(password.clone()));
    }

    Err(ConfigError::NoCredentials {
        device: device_name.into(),
    })
}

/// Build a `GatewayConfig` from a device profile.
pub fn profile_to_gateway_config(
    profile: &DeviceProfile,
    device_name: &str,
    defaults: &Defaults,
) -> Result<GatewayConfig, ConfigError> {
    let url: url::Url = profile.url.parse().map_err(|_| ConfigError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {}", profile.url),
    })?;

    let password = resolve_password(profile, device_name)?;

    let tls = if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else {
        TlsVerification::SystemDefaults
    };

    let breaker_defaults = BreakerConfig::default();
    let breaker = BreakerConfig {
        failure_threshold: profile
            .breaker
            .failure_threshold
            .unwrap_or(breaker_defaults.failure_threshold),
        reset_timeout: profile
            .breaker
            .reset_timeout_secs
            .map_or(breaker_defaults.reset_timeout, Duration::from_secs),
    };
    validate_breaker(&breaker)?;

    let health_defaults = HealthConfig::default();
    let health = HealthConfig {
        base_interval: profile
            .health
            .base_interval_secs
            .map_or(health_defaults.base_interval, Duration::from_secs),
        min_interval: profile
            .health
            .min_interval_secs
            .map_or(health_defaults.min_interval, Duration::from_secs),
        max_interval: profile
            .health
            .max_interval_secs
            .map_or(health_defaults.max_interval, Duration::from_secs),
        backoff_after: profile
            .health
            .backoff_after
            .unwrap_or(health_defaults.backoff_after),
        recovery_delay: profile
            .health
            .recovery_delay_secs
            .map_or(health_defaults.recovery_delay, Duration::from_secs),
    };
    validate_health(&health)?;

    Ok(GatewayConfig {
        url,
        username: profile.username.clone(),
        password,
        tls,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        breaker,
        health,
    })
}

fn validate_breaker(breaker: &BreakerConfig) -> Result<(), ConfigError> {
    if breaker.failure_threshold == 0 {
        return Err(ConfigError::Validation {
            field: "breaker.failure_threshold".into(),
            reason: "must be at least 1".into(),
        });
    }
    Ok(())
}

fn validate_health(health: &HealthConfig) -> Result<(), ConfigError> {
    if health.min_interval > health.max_interval {
        return Err(ConfigError::Validation {
            field: "health.min_interval_secs".into(),
            reason: "must not exceed max_interval_secs".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    const SAMPLE: &str = r#"
        default_device = "office"

        [defaults]
        timeout = 8

        [devices.office]
        url = "https://10.0.0.1"
        password = "hunter2"

        [devices.branch]
        url = "https://10.0.1.1"
        username = "ops"
        password = "p"
        insecure = false
        timeout = 3

        [devices.branch.breaker]
        failure_threshold = 2
        reset_timeout_secs = 10

        [devices.branch.health]
        base_interval_secs = 60
        backoff_after = 5
    "#;

    fn sample() -> Config {
        toml::from_str(SAMPLE).expect("sample config parses")
    }

    #[test]
    fn default_device_is_used_when_no_name_given() {
        let config = sample();
        let (name, profile) = device_profile(&config, None).expect("default device");
        assert_eq!(name, "office");
        assert_eq!(profile.username, "admin");
    }

    #[test]
    fn unknown_device_is_an_error() {
        let config = sample();
        let err = device_profile(&config, Some("warehouse")).expect_err("missing");
        assert!(matches!(err, ConfigError::NoSuchDevice { device } if device == "warehouse"));
    }

    #[test]
    fn profile_overrides_beat_global_defaults() {
        let config = sample();
        let (name, profile) = device_profile(&config, Some("branch")).expect("branch");
        let gw = profile_to_gateway_config(profile, name, &config.defaults).expect("gateway cfg");

        assert_eq!(gw.username, "ops");
        assert_eq!(gw.timeout, Duration::from_secs(3));
        assert_eq!(gw.tls, TlsVerification::SystemDefaults);
        assert_eq!(gw.breaker.failure_threshold, 2);
        assert_eq!(gw.breaker.reset_timeout, Duration::from_secs(10));
        assert_eq!(gw.health.base_interval, Duration::from_secs(60));
        assert_eq!(gw.health.backoff_after, 5);
        // Unset health fields keep core defaults.
        assert_eq!(gw.health.min_interval, HealthConfig::default().min_interval);
    }

    #[test]
    fn defaults_fill_in_unset_profile_fields() {
        let config = sample();
        let (name, profile) = device_profile(&config, Some("office")).expect("office");
        let gw = profile_to_gateway_config(profile, name, &config.defaults).expect("gateway cfg");

        assert_eq!(gw.timeout, Duration::from_secs(8));
        assert_eq!(gw.tls, TlsVerification::DangerAcceptInvalid);
        assert_eq!(gw.password.expose_secret(), "hunter2");
    }

    #[test]
    fn missing_password_is_a_credentials_error() {
        let mut profile = DeviceProfile {
            url: "https://10.0.0.1".into(),
            username: "admin".into(),
            ..DeviceProfile::default()
        };
        profile.password_env = Some("MIKROGATE_TEST_SURELY_UNSET_VAR".into());

        let err = profile_to_gateway_config(&profile, "office", &Defaults::default())
            .expect_err("no password anywhere");
        assert!(matches!(err, ConfigError::NoCredentials { .. }));
    }

    #[test]
    fn invalid_url_is_a_validation_error() {
        let profile = DeviceProfile {
            url: "not a url".into(),
            username: "admin".into(),
            password: Some("p".into()),
            ..DeviceProfile::default()
        };
        let err = profile_to_gateway_config(&profile, "office", &Defaults::default())
            .expect_err("bad url");
        assert!(matches!(err, ConfigError::Validation { field, .. } if field == "url"));
    }

    #[test]
    fn zero_failure_threshold_is_rejected() {
        let profile = DeviceProfile {
            url: "https://10.0.0.1".into(),
            username: "admin".into(),
            password: Some("p".into()),
            breaker: BreakerTuning {
                failure_threshold: Some(0),
                reset_timeout_secs: None,
            },
            ..DeviceProfile::default()
        };
        let err = profile_to_gateway_config(&profile, "office", &Defaults::default())
            .expect_err("threshold 0");
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn load_config_from_reads_a_toml_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).expect("write sample");

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.default_device.as_deref(), Some("office"));
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.defaults.timeout, 8);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = sample();
        let serialized = toml::to_string_pretty(&config).expect("serialize");
        let reparsed: Config = toml::from_str(&serialized).expect("reparse");
        assert_eq!(reparsed.devices.len(), config.devices.len());
        assert_eq!(reparsed.default_device, config.default_device);
    }
}
