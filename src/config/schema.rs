//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};

/// Root configuration for the API gateway layer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Controls how much internal error detail clients see.
    pub mode: ExecutionMode,

    /// Listener configuration (bind address, request timeout).
    pub listener: ListenerConfig,

    /// Token signing settings.
    pub auth: AuthConfig,

    /// Allowed cross-origin callers.
    pub cors: CorsConfig,

    /// Per-route-class quota settings.
    pub quota: QuotaConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub security: SecurityConfig,
}

/// Deployment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Error messages and stack traces are returned to clients.
    Development,
    #[default]
    Production,
    Test,
}

impl ExecutionMode {
    pub fn exposes_diagnostics(self) -> bool {
        self == Self::Development
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(format!("unknown execution mode '{other}'")),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Optional cap on total request time, in seconds. Unset or 0 disables it.
    pub request_timeout_secs: Option<u64>,
}

impl ListenerConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            request_timeout_secs: None,
        }
    }
}

/// Token signing configuration.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret. Without it, protected routes cannot be mounted.
    #[serde(skip_serializing, deserialize_with = "deserialize_secret")]
    pub jwt_secret: Option<SecretString>,
}

impl AuthConfig {
    /// The signing secret, if one is set and non-empty.
    pub fn secret(&self) -> Option<SecretString> {
        self.jwt_secret
            .clone()
            .filter(|s| !s.expose_secret().is_empty())
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).map(SecretString::from))
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Exact origins allowed to call the API.
    pub allowed_origins: Vec<String>,

    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3001".to_string()],
            allow_credentials: true,
        }
    }
}

/// Quota configuration. Limits per route class are fixed, not configurable.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Enable quota enforcement.
    pub enabled: bool,

    /// Key clients on the first `X-Forwarded-For` hop instead of the peer.
    /// Only safe behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,

    /// How often elapsed windows are purged, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trust_forwarded_for: false,
            sweep_interval_secs: 60,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_bytes: 10 * 1024 * 1024, // 10MB
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = GatewayConfig::default();
        assert_eq!(config.mode, ExecutionMode::Production);
        assert_eq!(config.listener.bind_address, "0.0.0.0:3000");
        assert!(config.quota.enabled);
        assert_eq!(config.security.max_body_bytes, 10 * 1024 * 1024);
        assert!(config.auth.secret().is_none());
        assert_eq!(config.listener.request_timeout(), None);
    }

    #[test]
    fn zero_timeout_means_no_timeout() {
        let mut listener = ListenerConfig::default();
        listener.request_timeout_secs = Some(0);
        assert_eq!(listener.request_timeout(), None);
        listener.request_timeout_secs = Some(15);
        assert_eq!(listener.request_timeout(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn debug_never_prints_the_secret() {
        let auth = AuthConfig {
            jwt_secret: Some(SecretString::from("super-secret-signing-key")),
        };
        let printed = format!("{auth:?}");
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("REDACTED"));
    }

    #[test]
    fn empty_secret_counts_as_missing() {
        let auth = AuthConfig {
            jwt_secret: Some(SecretString::from("")),
        };
        assert!(auth.secret().is_none());
    }

    #[test]
    fn secret_is_read_from_toml_without_keeping_a_plain_copy() {
        let config: GatewayConfig =
            toml::from_str("[auth]\njwt_secret = \"toml-signing-secret\"").unwrap();
        let secret = config.auth.secret().unwrap();
        assert_eq!(secret.expose_secret(), "toml-signing-secret");
        assert!(!format!("{config:?}").contains("toml-signing-secret"));

        let blank: GatewayConfig = toml::from_str("[auth]\njwt_secret = \"\"").unwrap();
        assert!(blank.auth.jwt_secret.is_none());
    }

    #[test]
    fn execution_mode_parses_common_spellings() {
        assert_eq!("dev".parse::<ExecutionMode>(), Ok(ExecutionMode::Development));
        assert_eq!("Production".parse::<ExecutionMode>(), Ok(ExecutionMode::Production));
        assert_eq!("test".parse::<ExecutionMode>(), Ok(ExecutionMode::Test));
        assert!("staging".parse::<ExecutionMode>().is_err());
    }
}
