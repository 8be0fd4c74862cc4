//! Server configuration read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;

/// Runtime configuration for the API server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// PostgreSQL event store; the in-memory store is used when unset.
    pub database_url: Option<String>,
    /// YAML vocabulary; the built-in list is used when unset.
    pub word_bank_path: Option<PathBuf>,
    /// Age at which the sweeper expires a pending request.
    pub request_ttl: Duration,
    /// Period between sweeps.
    pub sweep_interval: Duration,
    /// Bound on queued oracle callbacks.
    pub queue_capacity: usize,
    /// OTLP collector endpoint; span export is disabled when unset.
    pub otlp_endpoint: Option<String>,
}

impl Config {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set but malformed.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of
    /// a variable if it is set.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            host: non_empty("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 3000)?,
            database_url: non_empty("DATABASE_URL"),
            word_bank_path: non_empty("NORDLE_WORD_BANK_PATH").map(PathBuf::from),
            request_ttl: Duration::from_secs(parse_or(&lookup, "NORDLE_REQUEST_TTL_SECS", 3600)?),
            sweep_interval: Duration::from_secs(
                parse_or(&lookup, "NORDLE_SWEEP_INTERVAL_SECS", 60)?.max(1),
            ),
            queue_capacity: parse_or(&lookup, "NORDLE_QUEUE_CAPACITY", 1024)?,
            otlp_endpoint: non_empty("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }

    /// The socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `HOST:PORT` is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }

    /// The request TTL as a domain duration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the TTL does not fit a signed duration.
    pub fn request_max_age(&self) -> Result<chrono::Duration, AppError> {
        chrono::Duration::from_std(self.request_ttl)
            .map_err(|e| AppError::Config(format!("NORDLE_REQUEST_TTL_SECS out of range: {e}")))
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} must be a valid number: {e}"))),
        _ => Ok(default),
    }
}
