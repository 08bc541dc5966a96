//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

/// Configuration shared by every connection a directory opens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Fixed delay between a transport close and the next connect attempt.
    pub reconnect_delay_ms: u64,
    /// Optional deadline for request-response replies (`None` waits forever).
    pub request_timeout_ms: Option<u64>,
    /// Scheme prepended to addresses that carry none.
    pub default_scheme: String,
    /// Largest inbound message accepted, in bytes.
    pub max_message_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 3000,
            request_timeout_ms: None,
            default_scheme: "wss".into(),
            max_message_size: 16 * 1024 * 1024, // 16 MB
        }
    }
}

impl ClientConfig {
    /// Build a config from a partial JSON object layered over the defaults.
    ///
    /// `null` values keep the default.
    pub fn from_json(overrides: Value) -> Result<Self, ConfigError> {
        let defaults = serde_json::to_value(Self::default())?;
        let merged = deep_merge(defaults, overrides);
        let config: Self = serde_json::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_scheme.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "default_scheme",
                reason: "must not be empty".into(),
            });
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_message_size",
                reason: "must be greater than zero".into(),
            });
        }
        if self.request_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be greater than zero when set".into(),
            });
        }
        Ok(())
    }

    /// Reconnect delay as a [`Duration`].
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Request timeout as a [`Duration`], if configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

/// Recursively merge `source` into `target`.
///
/// Objects merge key by key; `null` in `source` leaves `target` untouched;
/// anything else in `source` replaces the target value.
fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}
