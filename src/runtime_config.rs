//! # Runtime Configuration Module
//!
//! Environment-driven defaults read once when an
//! [`Application`](crate::Application) is created.
//!
//! ## Environment Variables
//!
//! ### `WAYPOINT_ENV`
//!
//! Initial value of the `env` setting. Defaults to `development`. In
//! `production` the terminal error handler hides error details; in `test` it
//! stops logging them.
//!
//! ### `WAYPOINT_STACK_SIZE`
//!
//! Stack size for coroutines started by
//! [`Application::spawn`](crate::Application::spawn). Accepts decimal
//! (`65536`) or hexadecimal (`0x10000`). Default: `0x10000` (64 KB).
//!
//! ### `WAYPOINT_CASE_SENSITIVE_ROUTING` / `WAYPOINT_STRICT_ROUTING`
//!
//! Initial values of the `case sensitive routing` and `strict routing`
//! settings (`true`/`false`). Both default to `false`.
//!
//! ## Usage
//!
//! ```rust
//! use waypoint::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Stack size: {} bytes", config.stack_size);
//! ```

use std::env;

pub const DEFAULT_STACK_SIZE: usize = 0x10000;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Initial `env` setting
    pub env: String,
    /// Stack size for coroutines in bytes
    pub stack_size: usize,
    pub case_sensitive_routing: bool,
    pub strict_routing: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            env: "development".to_string(),
            stack_size: DEFAULT_STACK_SIZE,
            case_sensitive_routing: false,
            strict_routing: false,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup` instead of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            env: lookup("WAYPOINT_ENV")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.env),
            stack_size: lookup("WAYPOINT_STACK_SIZE")
                .and_then(|v| parse_size(&v))
                .unwrap_or(defaults.stack_size),
            case_sensitive_routing: lookup("WAYPOINT_CASE_SENSITIVE_ROUTING")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.case_sensitive_routing),
            strict_routing: lookup("WAYPOINT_STRICT_ROUTING")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.strict_routing),
        }
    }
}

fn parse_size(val: &str) -> Option<usize> {
    match val.strip_prefix("0x") {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        assert_eq!(RuntimeConfig::from_lookup(lookup(&[])), RuntimeConfig::default());
    }

    #[test]
    fn test_stack_size_hex_and_decimal() {
        let hex = RuntimeConfig::from_lookup(lookup(&[("WAYPOINT_STACK_SIZE", "0x8000")]));
        assert_eq!(hex.stack_size, 0x8000);
        let dec = RuntimeConfig::from_lookup(lookup(&[("WAYPOINT_STACK_SIZE", "32768")]));
        assert_eq!(dec.stack_size, 32768);
        let bad = RuntimeConfig::from_lookup(lookup(&[("WAYPOINT_STACK_SIZE", "lots")]));
        assert_eq!(bad.stack_size, DEFAULT_STACK_SIZE);
    }

    #[test]
    fn test_env_and_routing_flags() {
        let config = RuntimeConfig::from_lookup(lookup(&[
            ("WAYPOINT_ENV", "production"),
            ("WAYPOINT_CASE_SENSITIVE_ROUTING", "true"),
            ("WAYPOINT_STRICT_ROUTING", "nope"),
        ]));
        assert_eq!(config.env, "production");
        assert!(config.case_sensitive_routing);
        assert!(!config.strict_routing);
    }
}
