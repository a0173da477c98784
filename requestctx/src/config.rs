//! Process-wide configuration for context switching and conflict reporting.

use crate::errors::ContextError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for request context behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Whether real context switches are forwarded to the event sink.
    #[serde(default = "default_emit_switch_events")]
    pub emit_switch_events: bool,
    /// Event type used for switch events.
    #[serde(default = "default_switch_event_type")]
    pub switch_event_type: String,
    /// Whether the first `set` conflict in the process is logged.
    #[serde(default = "default_warn_on_set_conflict")]
    pub warn_on_set_conflict: bool,
}

fn default_emit_switch_events() -> bool {
    true
}

fn default_switch_event_type() -> String {
    "request_context.switch".to_string()
}

fn default_warn_on_set_conflict() -> bool {
    true
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            emit_switch_events: default_emit_switch_events(),
            switch_event_type: default_switch_event_type(),
            warn_on_set_conflict: default_warn_on_set_conflict(),
        }
    }
}

impl ContextConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables switch events.
    #[must_use]
    pub fn with_switch_events(mut self, enabled: bool) -> Self {
        self.emit_switch_events = enabled;
        self
    }

    /// Sets the switch event type.
    #[must_use]
    pub fn with_switch_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.switch_event_type = event_type.into();
        self
    }

    /// Enables or disables the set-conflict warning.
    #[must_use]
    pub fn with_set_conflict_warning(mut self, enabled: bool) -> Self {
        self.warn_on_set_conflict = enabled;
        self
    }

    /// Parses and validates a configuration from JSON.
    ///
    /// Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ContextError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration is usable.
    pub fn validate(&self) -> Result<(), ContextError> {
        if self.switch_event_type.trim().is_empty() {
            return Err(ContextError::config("switch_event_type must not be empty"));
        }
        Ok(())
    }
}

static GLOBAL_CONFIG: RwLock<Option<ContextConfig>> = RwLock::new(None);

/// Installs the process-wide configuration.
pub fn configure(config: ContextConfig) -> Result<(), ContextError> {
    config.validate()?;
    debug!(config = ?config, "Request context configuration replaced");
    *GLOBAL_CONFIG.write() = Some(config);
    Ok(())
}

/// Restores the default configuration.
pub fn reset_config() {
    *GLOBAL_CONFIG.write() = None;
}

/// Returns the process-wide configuration.
#[must_use]
pub fn current_config() -> ContextConfig {
    GLOBAL_CONFIG.read().clone().unwrap_or_default()
}

/// Reads a single field without cloning the whole configuration.
pub(crate) fn with_config<R>(f: impl FnOnce(&ContextConfig) -> R) -> R {
    match GLOBAL_CONFIG.read().as_ref() {
        Some(config) => f(config),
        None => f(&ContextConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = ContextConfig::new();
        assert!(config.emit_switch_events);
        assert!(config.warn_on_set_conflict);
        assert_eq!(config.switch_event_type, "request_context.switch");
    }

    #[test]
    fn test_from_json_partial() {
        let config = ContextConfig::from_json(r#"{"emit_switch_events": false}"#).unwrap();
        assert_eq!(
            config,
            ContextConfig::new().with_switch_events(false)
        );
    }

    #[test]
    fn test_from_json_rejects_empty_event_type() {
        let result = ContextConfig::from_json(r#"{"switch_event_type": "  "}"#);
        assert!(matches!(result, Err(ContextError::Config(_))));
    }

    #[test]
    fn test_from_json_malformed() {
        let result = ContextConfig::from_json("{");
        assert!(matches!(result, Err(ContextError::Serialization(_))));
    }

    #[test]
    fn test_builders() {
        let config = ContextConfig::new()
            .with_switch_event_type("ctx.switch")
            .with_set_conflict_warning(false);
        assert_eq!(config.switch_event_type, "ctx.switch");
        assert!(!config.warn_on_set_conflict);
    }

    #[test]
    fn test_configure_rejects_invalid() {
        let invalid = ContextConfig::new().with_switch_event_type("");
        assert!(configure(invalid).is_err());
    }
}
