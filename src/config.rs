//! Configuration for the demo binaries
//!
//! Both binaries read their settings from the environment once at startup.
//!
//! | variable | used by | default |
//! |---|---|---|
//! | `HABERDASHER_ADDR` | server | `0.0.0.0:8080` |
//! | `HABERDASHER_FAILURE_RATE` | server | `0.3` |
//! | `HABERDASHER_URL` | client | `ws://127.0.0.1:8080` |
//! | `HABERDASHER_MAX_ATTEMPTS` | client | `5` |
//!
//! Telemetry settings come from [`TelemetryConfig`]'s own environment
//! variables (`OTEL_EXPORTER_OTLP_ENDPOINT`, `RUST_LOG`).

use std::net::SocketAddr;
use std::str::FromStr;
use tailor_client::DEFAULT_MAX_ATTEMPTS;
use tailor_core::{Error, Result, TelemetryConfig};

/// Server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    pub addr: SocketAddr,
    /// Share of MakeHat calls that fail with a retryable error
    pub failure_rate: f64,
    /// Telemetry settings
    pub telemetry: TelemetryConfig,
}

impl ServerConfig {
    /// Read the configuration from the environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            addr: parse_or(&lookup, "HABERDASHER_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            failure_rate: parse_or(&lookup, "HABERDASHER_FAILURE_RATE", 0.3)?,
            telemetry: TelemetryConfig::new("haberdasher"),
        })
    }
}

/// Client settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server URL
    pub url: String,
    /// Attempts per call
    pub max_attempts: u32,
    /// Telemetry settings
    pub telemetry: TelemetryConfig,
}

impl ClientConfig {
    /// Read the configuration from the environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            url: lookup("HABERDASHER_URL").unwrap_or_else(|| "ws://127.0.0.1:8080".to_string()),
            max_attempts: parse_or(&lookup, "HABERDASHER_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
            telemetry: TelemetryConfig::new("haberdasher-client"),
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Internal(format!("invalid {}={:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}
