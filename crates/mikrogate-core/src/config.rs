// ── Runtime connection configuration ──
//
// These types describe *how* to reach a device and how aggressively to
// protect it. They carry credential data and resilience tuning, but never
// touch disk -- mikrogate-config builds a `GatewayConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// TLS verification strategy.
#[derive(Debug, Clone, Default)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification. Default -- routers ship self-signed certs.
    #[default]
    DangerAcceptInvalid,
}

impl PartialEq for TlsVerification {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::SystemDefaults, Self::SystemDefaults) => true,
            (Self::CustomCa(a), Self::CustomCa(b)) => a == b,
            (Self::DangerAcceptInvalid, Self::DangerAcceptInvalid) => true,
            _ => false,
        }
    }
}

impl Eq for TlsVerification {}

/// Circuit breaker tuning.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive connectivity failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long the circuit stays open before allowing one trial call.
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Health monitor / recovery tuning.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Check interval while the connection is stable.
    pub base_interval: Duration,
    /// Floor the interval shrinks back to after successful recoveries.
    pub min_interval: Duration,
    /// Cap the interval grows to while the device stays down.
    pub max_interval: Duration,
    /// Consecutive recovery failures before the interval starts doubling.
    pub backoff_after: u32,
    /// Pause between forced disconnect and reconnect during recovery.
    pub recovery_delay: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(30),
            min_interval: Duration::from_secs(15),
            max_interval: Duration::from_secs(300),
            backoff_after: 3,
            recovery_delay: Duration::from_secs(2),
        }
    }
}

/// Configuration for one device gateway.
///
/// Built by mikrogate-config (or tests), passed to `DeviceGateway` --
/// core never reads config files.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Device base URL (e.g., `https://192.168.88.1`).
    pub url: Url,
    /// REST API username.
    pub username: String,
    /// REST API password.
    pub password: SecretString,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Per-request timeout. Every queued command is bounded by this.
    pub timeout: Duration,
    /// Circuit breaker tuning.
    pub breaker: BreakerConfig,
    /// Health monitor tuning.
    pub health: HealthConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "https://192.168.88.1".parse().expect("static URL"),
            username: "admin".into(),
            password: SecretString::from(String::new()),
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(10),
            breaker: BreakerConfig::default(),
            health: HealthConfig::default(),
        }
    }
}
