//! Configuration loading from disk and environment.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {var}: {reason}")]
    Env { var: &'static str, reason: String },
    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, override from the process environment, and validate.
///
/// Without a path the built-in defaults are the starting point.
pub fn load(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_file(path)?,
        None => GatewayConfig::default(),
    };
    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file, ignoring the environment.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let config = read_file(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Parse TOML without validating it.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

fn read_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Apply `PORT`, `JWT_SECRET`, `APP_ENV`, `CORS_ORIGIN` and `LOG_FORMAT`.
///
/// `lookup` resolves a variable name; tests pass a map instead of the
/// process environment.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT") {
        let port: u16 = port.trim().parse().map_err(|_| ConfigError::Env {
            var: "PORT",
            reason: format!("'{port}' is not a port number"),
        })?;
        config.listener.bind_address = match config.listener.bind_address.parse::<SocketAddr>() {
            Ok(mut addr) => {
                addr.set_port(port);
                addr.to_string()
            }
            Err(_) => format!("0.0.0.0:{port}"),
        };
    }

    if let Some(secret) = lookup("JWT_SECRET") {
        config.auth.jwt_secret = Some(SecretString::from(secret));
    }

    if let Some(mode) = lookup("APP_ENV") {
        config.mode = mode
            .parse()
            .map_err(|reason| ConfigError::Env { var: "APP_ENV", reason })?;
    }

    if let Some(origins) = lookup("CORS_ORIGIN") {
        config.cors.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
    }

    if let Some(format) = lookup("LOG_FORMAT") {
        config.observability.log_format = format
            .parse()
            .map_err(|reason| ConfigError::Env { var: "LOG_FORMAT", reason })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ExecutionMode, LogFormat};
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var: &str| map.get(var).cloned()
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config = parse_config(
            r#"
            mode = "development"

            [listener]
            bind_address = "127.0.0.1:4000"

            [quota]
            trust_forwarded_for = true
            "#,
        )
        .unwrap();
        assert_eq!(config.mode, ExecutionMode::Development);
        assert_eq!(config.listener.bind_address, "127.0.0.1:4000");
        assert_eq!(config.listener.request_timeout_secs, None);
        assert!(config.quota.trust_forwarded_for);
        assert!(config.quota.enabled);
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("PORT", "8088"),
                ("JWT_SECRET", "from-env"),
                ("APP_ENV", "development"),
                ("CORS_ORIGIN", "https://a.example, https://b.example"),
                ("LOG_FORMAT", "json"),
            ]),
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "0.0.0.0:8088");
        assert_eq!(
            config.auth.secret().map(|s| s.expose_secret().to_string()).as_deref(),
            Some("from-env")
        );
        assert_eq!(config.mode, ExecutionMode::Development);
        assert_eq!(
            config.cors.allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }

    #[test]
    fn bad_env_values_are_errors() {
        let mut config = GatewayConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "PORT", .. }));

        let err = apply_env_overrides(&mut config, env(&[("APP_ENV", "staging")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "APP_ENV", .. }));
    }

    #[test]
    fn load_config_reports_validation_failures() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[quota]\nsweep_interval_secs = 0").unwrap();

        match load_config(file.path()) {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors, vec![ValidationError::SweepInterval]);
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
