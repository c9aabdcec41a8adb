//! Application configuration.

use crate::error::{AppError, AppResult};
use neuro_history::HistoryConfig;
use neuro_server::ServerConfig;
use neuro_signal::{GeneratorConfig, ScorerConfig};
use neuro_ws::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration, one section per component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub scorer: ScorerConfig,
    /// Client multiplexer settings used by `watch`.
    #[serde(default)]
    pub client: ConnectionConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

impl AppConfig {
    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &str) -> AppResult<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            tracing::warn!(path = %path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Validate every section.
    pub fn validate(&self) -> AppResult<()> {
        self.server.validate()?;
        self.generator.validate()?;
        self.scorer.validate()?;
        self.client.validate()?;
        self.history.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.generator.channels.len(), 4);
        assert_eq!(config.scorer.threshold, 1.4);
        assert_eq!(config.client.close_grace_ms, 500);
        assert_eq!(config.history.capacity(), 960);
        assert_ok!(config.validate());
    }

    #[test]
    fn test_sections_override_independently() {
        let config = AppConfig::from_toml(
            r#"
            [server]
            port = 4100

            [client]
            url = "ws://example:4100"
            reconnect_backoff_ms = 250

            [scorer]
            emission_threshold = 0.1
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 4100);
        assert_eq!(config.server.tick_interval_ms, 100);
        assert_eq!(config.client.url, "ws://example:4100");
        assert_eq!(config.client.reconnect_backoff_ms, 250);
        assert_eq!(config.client.create_debounce_ms, 50);
        assert_eq!(config.scorer.emission_threshold, 0.1);
        assert_eq!(config.scorer.threshold, 1.4);
    }

    #[test]
    fn test_invalid_section_fails_validation() {
        let config = AppConfig::from_toml("[client]\nclose_grace_ms = 0").unwrap();
        assert!(matches!(config.validate(), Err(AppError::WebSocket(_))));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        assert!(matches!(
            AppConfig::from_toml("[server\nport = 1"),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load("does/not/exist.toml").unwrap();
        assert_eq!(config.server.default_session, "default");
    }

    #[test]
    fn test_shipped_default_config_parses() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/default.toml");
        let config = AppConfig::from_file(path).unwrap();
        assert_ok!(config.validate());
        assert_eq!(config.server.port, 4000);
    }
}
