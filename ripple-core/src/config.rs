//! Graph Configuration
//!
//! Settings shared by a graph and the session that may own it. Every field
//! has a default, so a configuration file only needs to name what it changes:
//!
//! ```json
//! { "label": "dashboard", "queue_capacity": 16 }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for a [`Graph`](crate::graph::Graph) and its session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphConfig {
    /// Name used in tracing spans and snapshots.
    pub label: String,

    /// Bound of the session's command queue. Must be at least 1.
    pub queue_capacity: usize,

    /// Run every sink once when a session starts.
    pub initial_render: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            label: "ripple".to_string(),
            queue_capacity: 64,
            initial_render: true,
        }
    }
}

impl GraphConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_initial_render(mut self, initial_render: bool) -> Self {
        self.initial_render = initial_render;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config = GraphConfig::from_json("{}").unwrap();
        assert_eq!(config, GraphConfig::default());
    }

    #[test]
    fn partial_json_overrides_fields() {
        let config = GraphConfig::from_json(r#"{"label": "app", "initial_render": false}"#).unwrap();
        assert_eq!(config.label, "app");
        assert!(!config.initial_render);
        assert_eq!(config.queue_capacity, 64);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = GraphConfig::from_json(r#"{"queue_capacity": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = GraphConfig::from_json(r#"{"lable": "typo"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
