use std::env;
use std::str::FromStr;

use tracing::warn;

use super::utils::{parse_bool, parse_list};
use super::{DEFAULT_IDLE_TIMEOUT_SECONDS, ServerConfig, merge, validation};

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Reads configuration from environment variables, with sensible defaults.
    /// Also loads from .env file if present using dotenvy.
    ///
    /// # Errors
    /// Returns an error if:
    /// - A numeric environment variable is malformed
    /// - Configuration validation fails
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

/// Raw string value of a set, non-empty variable
pub(super) fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a variable, failing on malformed values
pub(super) fn parsed<T>(name: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid {name} environment variable: {e}")),
        None => Ok(None),
    }
}

/// Boolean variable; unrecognised values are ignored with a warning
pub(super) fn boolean(name: &str) -> Option<bool> {
    let raw = var(name)?;
    let value = parse_bool(&raw);
    if value.is_none() {
        warn!("Ignoring {}={:?}: expected true/false, 1/0 or yes/no", name, raw);
    }
    value
}

pub(super) fn list(name: &str) -> Option<Vec<String>> {
    var(name).map(|raw| parse_list(&raw))
}

/// `IDLE_TIMEOUT_SECONDS`, falling back to the default on bad input
pub(super) fn idle_timeout_seconds() -> Option<u64> {
    let raw = var("IDLE_TIMEOUT_SECONDS")?;
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(secs),
        _ => {
            warn!(
                "Invalid IDLE_TIMEOUT_SECONDS value {:?}, using default of {} seconds",
                raw, DEFAULT_IDLE_TIMEOUT_SECONDS
            );
            Some(DEFAULT_IDLE_TIMEOUT_SECONDS)
        }
    }
}
