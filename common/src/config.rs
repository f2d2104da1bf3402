//! Environment variable parsing helpers
//!
//! Provides ergonomic helpers for reading configuration from environment variables.
//! Container runtimes frequently pass declared-but-empty variables, so an empty
//! value is treated the same as an unset one everywhere in this module.

use std::env;
use std::str::FromStr;

/// Read an environment variable, treating empty values as unset.
pub fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Extension trait for parsing environment variables.
///
/// Provides convenient methods for reading env vars with defaults and type
/// parsing.
pub trait ConfigExt {
    /// Get an environment variable with a default value.
    ///
    /// # Example
    /// ```ignore
    /// let locale = String::env_or("DATABASE_LOCALE", "C.UTF-8");
    /// ```
    fn env_or(name: &str, default: &str) -> String {
        env_opt(name).unwrap_or_else(|| default.to_string())
    }

    /// Get an environment variable as a boolean.
    ///
    /// Accepts "true", "1" and "yes" (case-insensitive); any other set value is
    /// `false`. Returns `default` when unset.
    fn env_bool(name: &str, default: bool) -> bool {
        env_opt(name)
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(default)
    }

    /// Get an environment variable parsed as a specific type.
    ///
    /// Returns `default` if the variable is not set or fails to parse.
    ///
    /// # Example
    /// ```ignore
    /// let timeout: u64 = u64::env_parse("DATABASE_STARTUP_TIMEOUT", 60);
    /// ```
    fn env_parse<T: FromStr>(name: &str, default: T) -> T {
        env_opt(name)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

// Blanket implementation for all types
impl<T> ConfigExt for T {}

/// Split a comma separated list, dropping blank entries.
pub fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split a whitespace separated option string into arguments.
pub fn split_opts(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}
