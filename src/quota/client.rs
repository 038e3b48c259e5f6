//! Client identification for quota keys.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::request::Parts;

/// Identity a quota window is keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key shared by every request whose peer address is unknown.
    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<IpAddr> for ClientKey {
    fn from(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the client address is derived from a request.
///
/// `X-Forwarded-For` is spoofable, so it is only honoured when the
/// deployment sits behind a proxy that overwrites it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientAddressPolicy {
    pub trust_forwarded_for: bool,
}

impl ClientAddressPolicy {
    pub fn resolve(&self, parts: &Parts) -> ClientKey {
        if self.trust_forwarded_for {
            let forwarded = parts
                .headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split(',').next())
                .map(str::trim)
                .and_then(|s| s.parse::<IpAddr>().ok());
            if let Some(ip) = forwarded {
                return ip.into();
            }
        }

        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| ClientKey::from(addr.ip()))
            .unwrap_or_else(ClientKey::unknown)
    }
}
