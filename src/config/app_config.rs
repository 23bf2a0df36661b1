use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use super::AggregatorConfig;

const ENV_PREFIX: &str = "ERRWATCH";

/// Provides the default value for client_id_fields.
fn default_client_id_fields() -> Vec<String> {
    vec!["location_id".to_string(), "instance_name".to_string()]
}

/// Which delivery collaborator the binary wires to the aggregator.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    /// Print formatted messages to standard output.
    #[default]
    Stdout,
    /// Emit formatted messages as `tracing` events.
    Log,
    /// Print one JSON object per message to standard output.
    Json,
}

/// Application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Aggregation window and sweeper settings.
    #[serde(default)]
    pub aggregator: AggregatorConfig,

    /// Context fields that identify the client an error belongs to, in order
    /// of preference.
    #[serde(default = "default_client_id_fields")]
    pub client_id_fields: Vec<String>,

    /// Where notifications are delivered.
    #[serde(default)]
    pub notifier: NotifierKind,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            aggregator: AggregatorConfig::default(),
            client_id_fields: default_client_id_fields(),
            notifier: NotifierKind::default(),
        }
    }
}

impl AppConfig {
    /// Creates a new `AppConfig` from `app.yaml` in the configuration
    /// directory, overridden by `ERRWATCH__*` environment variables.
    ///
    /// The file is optional; every setting has a default.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        Self::with_environment(config_dir, environment())
    }

    fn with_environment(config_dir: Option<&str>, env: Environment) -> Result<Self, ConfigError> {
        let config_dir_str = config_dir.unwrap_or("configs");
        let s = Config::builder()
            .add_source(File::with_name(&format!("{}/app.yaml", config_dir_str)).required(false))
            .add_source(env)
            .build()?;
        s.try_deserialize()
    }
}

/// Environment overrides, e.g. `ERRWATCH__AGGREGATOR__WINDOW_DURATION_SECS=60`.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true)
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use super::*;

    #[test]
    fn test_app_config_defaults_without_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = AppConfig::new(Some(temp_dir.path().to_str().unwrap())).unwrap();

        assert_eq!(config.aggregator, AggregatorConfig::default());
        assert_eq!(config.client_id_fields, vec!["location_id", "instance_name"]);
        assert_eq!(config.notifier, NotifierKind::Stdout);
    }

    #[test]
    fn test_app_config_from_file() {
        let config_content = r#"
        aggregator:
          window_duration_secs: 30
          sweep_interval_secs: 90
        client_id_fields:
          - tenant
        notifier: log
        "#;
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("app.yaml"), config_content).unwrap();

        let config = AppConfig::new(Some(temp_dir.path().to_str().unwrap())).unwrap();

        assert_eq!(config.aggregator.window_duration, Duration::from_secs(30));
        assert_eq!(config.aggregator.sweep_interval, Duration::from_secs(90));
        assert_eq!(config.client_id_fields, vec!["tenant"]);
        assert_eq!(config.notifier, NotifierKind::Log);
    }

    #[test]
    fn test_app_config_partial_aggregator_section() {
        let config_content = r#"
        aggregator:
          window_duration_secs: 10
        "#;
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("app.yaml"), config_content).unwrap();

        let config = AppConfig::new(Some(temp_dir.path().to_str().unwrap())).unwrap();

        assert_eq!(config.aggregator.window_duration, Duration::from_secs(10));
        assert_eq!(config.aggregator.sweep_interval, Duration::from_secs(600));
    }

    #[test]
    fn test_app_config_environment_overrides_file() {
        let config_content = r#"
        aggregator:
          window_duration_secs: 30
        notifier: stdout
        "#;
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("app.yaml"), config_content).unwrap();
        let vars = HashMap::from([
            ("ERRWATCH__NOTIFIER".to_string(), "json".to_string()),
            ("ERRWATCH__AGGREGATOR__WINDOW_DURATION_SECS".to_string(), "45".to_string()),
            ("NOTIFIER__NOTIFIER".to_string(), "log".to_string()),
        ]);

        let config = AppConfig::with_environment(
            Some(temp_dir.path().to_str().unwrap()),
            environment().source(Some(vars)),
        )
        .unwrap();

        assert_eq!(config.notifier, NotifierKind::Json);
        assert_eq!(config.aggregator.window_duration, Duration::from_secs(45));
        assert_eq!(config.aggregator.sweep_interval, Duration::from_secs(600));
    }
}
