use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{deserialize_duration_from_seconds, serialize_duration_to_seconds};

/// Configuration for error aggregation windows and the stale-window sweeper.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// How long repeats of an error are collected before a summary is sent.
    #[serde(
        rename = "window_duration_secs",
        default = "default_window_duration",
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds"
    )]
    pub window_duration: Duration,

    /// How often the sweeper looks for windows whose timer never fired.
    #[serde(
        rename = "sweep_interval_secs",
        default = "default_sweep_interval",
        deserialize_with = "deserialize_duration_from_seconds",
        serialize_with = "serialize_duration_to_seconds"
    )]
    pub sweep_interval: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self { window_duration: default_window_duration(), sweep_interval: default_sweep_interval() }
    }
}

/// Provides the default value for window_duration.
fn default_window_duration() -> Duration {
    Duration::from_secs(5 * 60)
}

/// Provides the default value for sweep_interval.
fn default_sweep_interval() -> Duration {
    Duration::from_secs(10 * 60)
}

#[cfg(test)]
mod tests {
    use config::Config;

    use super::*;

    #[test]
    fn test_default_aggregator_config() {
        let yaml = r#""#; // Empty YAML should use defaults
        let config = Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize::<AggregatorConfig>()
            .unwrap();
        assert_eq!(config, AggregatorConfig::default());
        assert_eq!(config.window_duration, Duration::from_secs(300));
        assert_eq!(config.sweep_interval, Duration::from_secs(600));
    }

    #[test]
    fn test_custom_aggregator_config() {
        let yaml = r#"
          window_duration_secs: 60
          sweep_interval_secs: 120
        "#;
        let config = Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize::<AggregatorConfig>()
            .unwrap();
        assert_eq!(config.window_duration, Duration::from_secs(60));
        assert_eq!(config.sweep_interval, Duration::from_secs(120));
    }
}
