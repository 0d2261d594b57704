//! Configuration loader for the `hostname-greeter` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). The resulting [`Config`] is built once at startup
//! and handed to the router and server by value, so no other module reads
//! the environment directly.
use std::{env, time::Duration};

use anyhow::{anyhow, Result};

/// Port used when `PORT` is unset or empty.
pub const DEFAULT_PORT: &str = "2593";

/// Header read timeout used when `HEADER_READ_TIMEOUT_SECS` is unset.
pub const DEFAULT_HEADER_READ_TIMEOUT_SECS: u32 = 10;

/// Parse an optional integer variable with a default value.
macro_rules! parse_var_u32 {
    ($lookup:expr, $var_name:expr, $default:expr) => {
        $lookup($var_name)
            .filter(|v: &String| !v.is_empty())
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Read an optional string variable, treating an empty value as unset.
macro_rules! string_var_or {
    ($lookup:expr, $var_name:expr, $default:expr) => {
        $lookup($var_name)
            .filter(|v: &String| !v.is_empty())
            .unwrap_or_else(|| $default.to_string())
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    // ---
    /// TCP port to listen on, kept exactly as supplied.
    pub port: String,

    /// Time allowed for a client to finish sending request headers.
    pub header_read_timeout: Duration,
}

/// Load configuration from the process environment.
///
/// Optional:
/// - `PORT` – listening port (default: 2593)
/// - `HEADER_READ_TIMEOUT_SECS` – header read timeout (default: 10)
///
/// Returns an error if a numeric variable cannot be parsed.
pub fn load_from_env() -> Result<Config> {
    load_from(|name| env::var(name).ok())
}

/// Load configuration through an arbitrary variable lookup.
pub fn load_from<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    let port = string_var_or!(lookup, "PORT", DEFAULT_PORT);
    let timeout_secs = parse_var_u32!(
        lookup,
        "HEADER_READ_TIMEOUT_SECS",
        DEFAULT_HEADER_READ_TIMEOUT_SECS
    );

    Ok(Config {
        port,
        header_read_timeout: Duration::from_secs(u64::from(timeout_secs)),
    })
}

impl Config {
    /// Address the listener binds to: every interface on the configured port.
    pub fn bind_addr(&self) -> String {
        format!("[::]:{}", self.port)
    }

    /// IPv4-only wildcard address, used when the host has no IPv6 stack.
    pub fn bind_addr_v4(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  PORT                     : {}", self.port);
        tracing::info!(
            "  HEADER_READ_TIMEOUT_SECS : {}",
            self.header_read_timeout.as_secs()
        );
    }
}
