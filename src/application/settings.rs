//! Application settings.
//!
//! Settings are loosely typed [`serde_json::Value`]s. A lookup consults the
//! application's own values first, then its parent chain, and finally the
//! application's inheritable defaults. The per-application defaults written at
//! construction (`env`, `x-powered-by`, `query parser`) therefore shadow a parent's
//! explicit values, while `trust proxy` and the routing flags follow the parent.

use serde_json::Value;
use std::collections::HashMap;

use crate::runtime_config::RuntimeConfig;

pub const ENV: &str = "env";
pub const X_POWERED_BY: &str = "x-powered-by";
pub const CASE_SENSITIVE_ROUTING: &str = "case sensitive routing";
pub const STRICT_ROUTING: &str = "strict routing";
pub const TRUST_PROXY: &str = "trust proxy";
/// Falsy disables the built-in query layer
pub const QUERY_PARSER: &str = "query parser";

/// JavaScript-style truthiness of a setting value.
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Settings {
    local: HashMap<String, Value>,
    /// Consulted only after the parent chain
    inheritable: HashMap<String, Value>,
}

impl Settings {
    pub(crate) fn with_defaults(config: &RuntimeConfig) -> Self {
        let mut local = HashMap::new();
        local.insert(ENV.to_string(), Value::from(config.env.clone()));
        local.insert(X_POWERED_BY.to_string(), Value::Bool(true));
        local.insert(QUERY_PARSER.to_string(), Value::from("extended"));

        let mut inheritable = HashMap::new();
        inheritable.insert(TRUST_PROXY.to_string(), Value::Bool(false));
        inheritable.insert(
            CASE_SENSITIVE_ROUTING.to_string(),
            Value::Bool(config.case_sensitive_routing),
        );
        inheritable.insert(
            STRICT_ROUTING.to_string(),
            Value::Bool(config.strict_routing),
        );

        Self { local, inheritable }
    }

    pub(crate) fn set(&mut self, name: &str, value: Value) {
        self.local.insert(name.to_string(), value);
    }

    pub(crate) fn local(&self, name: &str) -> Option<&Value> {
        self.local.get(name)
    }

    pub(crate) fn fallback(&self, name: &str) -> Option<&Value> {
        self.inheritable.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        for falsy in [json!(null), json!(false), json!(0), json!(""), json!(0.0)] {
            assert!(!truthy(&falsy), "{falsy} should be falsy");
        }
        for t in [json!(true), json!(1), json!("0"), json!([]), json!({})] {
            assert!(truthy(&t), "{t} should be truthy");
        }
    }

    #[test]
    fn test_defaults_split_local_and_inheritable() {
        let settings = Settings::with_defaults(&RuntimeConfig::default());
        assert_eq!(settings.local(ENV), Some(&json!("development")));
        assert_eq!(settings.local(X_POWERED_BY), Some(&json!(true)));
        assert_eq!(settings.local(TRUST_PROXY), None);
        assert_eq!(settings.fallback(TRUST_PROXY), Some(&json!(false)));
    }
}
