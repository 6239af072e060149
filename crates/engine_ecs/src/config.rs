//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Tunables for an [`Engine`](crate::Engine).
///
/// All fields have defaults, so a partial JSON/TOML document deserialises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Systems whose single `update` call takes longer than this many
    /// milliseconds are reported at `warn` level. `None` disables the check.
    pub slow_system_threshold_ms: Option<f64>,
    /// Initial capacity of the deferred-operation queue.
    pub pending_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            slow_system_threshold_ms: None,
            pending_capacity: 64,
        }
    }
}

impl EngineConfig {
    /// Warn about systems slower than `millis` per update.
    #[must_use]
    pub fn with_slow_system_threshold_ms(mut self, millis: f64) -> Self {
        self.slow_system_threshold_ms = Some(millis);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "slow_system_threshold_ms": 2.5 }"#).unwrap();
        assert_eq!(config.slow_system_threshold_ms, Some(2.5));
        assert_eq!(config.pending_capacity, EngineConfig::default().pending_capacity);
    }

    #[test]
    fn test_builder_sets_threshold() {
        let config = EngineConfig::default().with_slow_system_threshold_ms(4.0);
        assert_eq!(config.slow_system_threshold_ms, Some(4.0));
    }
}
