//! Configuration lookup
//!
//! Tunables are read through a small key/value abstraction so the engine
//! can be driven either by a configuration service or by process
//! environment variables. Only typed accessors with defaults are exposed;
//! a missing or unparsable value falls back to the default.

use std::collections::HashMap;

/// Key/value configuration lookup with typed accessors
pub trait ConfigSource: Send + Sync {
    /// Raw string value for a key, if present
    fn get(&self, key: &str) -> Option<String>;

    /// Boolean value, falling back to `default` when absent or invalid
    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Integer value, falling back to `default` when absent or invalid
    fn get_int(&self, key: &str, default: i64) -> i64 {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// String value, falling back to `default` when absent
    fn get_str(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }
}

/// Configuration sourced from process environment variables
pub struct EnvConfig;

impl ConfigSource for EnvConfig {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory configuration, used by tests and embedders
#[derive(Default)]
pub struct MapConfig {
    values: HashMap<String, String>,
}

impl MapConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value
    pub fn set(&mut self, key: &str, value: &str) -> &mut Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl ConfigSource for MapConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors_with_defaults() {
        let mut config = MapConfig::new();
        config.set("keySize", "2048").set("verify", "false");

        assert_eq!(config.get_int("keySize", 1024), 2048);
        assert!(!config.get_bool("verify", true));
        // Absent keys fall back
        assert_eq!(config.get_int("missing", 7), 7);
        assert_eq!(config.get_str("missing", "x"), "x");
    }

    #[test]
    fn test_invalid_value_falls_back() {
        let mut config = MapConfig::new();
        config.set("keySize", "not-a-number");
        assert_eq!(config.get_int("keySize", 1024), 1024);
    }
}
