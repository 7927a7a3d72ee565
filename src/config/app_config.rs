use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use url::Url;

use super::{
    AlertTemplates, ChannelsConfig, DispatchConfig, ServerConfig, SeverityThresholds,
    deserialize_duration_from_seconds,
};

/// Provides the default value for shutdown_timeout.
fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Provides the default value for cooldown_secs.
fn default_cooldown() -> Duration {
    Duration::from_secs(60 * 60)
}

/// Provides the default value for feed_lookback_secs.
fn default_feed_lookback() -> Duration {
    Duration::from_secs(7 * 24 * 60 * 60)
}

/// Provides the default value for signal_channel_capacity.
fn default_signal_channel_capacity() -> u32 {
    1024
}

fn default_polling_interval() -> Duration {
    Duration::from_secs(300)
}

fn default_backlog_capacity() -> usize {
    1000
}

/// Geographic relevance settings.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct GeoConfig {
    /// Whether subscribers without a location receive alerts that carry a
    /// radius constraint.
    #[serde(default)]
    pub include_unlocated_subscribers: bool,
}

/// Upstream hazard signal feed polled by the ingestor.
#[derive(Debug, Deserialize, Clone)]
pub struct SignalSourceConfig {
    /// Endpoint returning a JSON array of hazard signals.
    pub url: Url,

    /// The interval in seconds between polls.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        default = "default_polling_interval"
    )]
    pub polling_interval_secs: Duration,

    /// Maximum number of signals kept for re-processing after storage
    /// failures. The oldest are dropped first.
    #[serde(default = "default_backlog_capacity")]
    pub backlog_capacity: usize,
}

/// Application configuration for ukame.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    /// Database URL for the SQLite database.
    pub database_url: String,

    /// Path to the region configuration file.
    #[serde(skip_deserializing)]
    pub region_config_path: PathBuf,

    /// Path to the subscriber configuration file.
    #[serde(skip_deserializing)]
    pub subscriber_config_path: PathBuf,

    /// Window during which a condition produces at most one active alert.
    #[serde(deserialize_with = "deserialize_duration_from_seconds", default = "default_cooldown")]
    pub cooldown_secs: Duration,

    /// How far back the subscriber feed looks for alerts.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        default = "default_feed_lookback"
    )]
    pub feed_lookback_secs: Duration,

    /// The maximum time in seconds to wait for graceful shutdown.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        default = "default_shutdown_timeout"
    )]
    pub shutdown_timeout: Duration,

    /// The capacity of the queue between alert creation and dispatch.
    #[serde(default = "default_signal_channel_capacity")]
    pub signal_channel_capacity: u32,

    /// Severity boundaries per metric.
    #[serde(default)]
    pub severity_thresholds: SeverityThresholds,

    /// Text templates per metric.
    #[serde(default)]
    pub alert_templates: AlertTemplates,

    /// Geo-relevance options.
    #[serde(default)]
    pub geo: GeoConfig,

    /// Fan-out and retry settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Adapters for the push channels.
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Optional upstream signal feed. Without it signals only arrive through
    /// the HTTP API.
    #[serde(default)]
    pub signal_source: Option<SignalSourceConfig>,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

impl AppConfig {
    /// Creates a new `AppConfig` by reading from the configuration directory.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir_str = config_dir.unwrap_or("configs");
        let s = Config::builder()
            .add_source(File::with_name(&format!("{}/app.yaml", config_dir_str)))
            .add_source(Environment::with_prefix("UKAME").separator("__"))
            .build()?;
        let mut config: Self = s.try_deserialize()?;

        config.severity_thresholds.validate().map_err(ConfigError::Message)?;
        if config.dispatch.retry_policy.max_attempts == 0 {
            return Err(ConfigError::Message(
                "dispatch.retry_policy.max_attempts must be at least 1".to_string(),
            ));
        }

        let config_path = Path::new(config_dir_str);
        config.region_config_path = config_path.join("regions.yaml");
        config.subscriber_config_path = config_path.join("subscribers.yaml");

        Ok(config)
    }

    /// Creates a new `AppConfigBuilder` for testing purposes.
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }
}

/// A builder for creating `AppConfig` instances in tests and tools.
#[derive(Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// Sets the database URL.
    pub fn database_url(mut self, url: &str) -> Self {
        self.config.database_url = url.to_string();
        self
    }

    /// Sets the region file path.
    pub fn region_config_path(mut self, path: &str) -> Self {
        self.config.region_config_path = path.into();
        self
    }

    /// Sets the subscriber file path.
    pub fn subscriber_config_path(mut self, path: &str) -> Self {
        self.config.subscriber_config_path = path.into();
        self
    }

    /// Sets the cooldown window.
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.config.cooldown_secs = cooldown;
        self
    }

    /// Sets the feed lookback.
    pub fn feed_lookback(mut self, lookback: Duration) -> Self {
        self.config.feed_lookback_secs = lookback;
        self
    }

    /// Sets the dispatch settings.
    pub fn dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.config.dispatch = dispatch;
        self
    }

    /// Controls whether subscribers without a location receive alerts.
    pub fn include_unlocated_subscribers(mut self, include: bool) -> Self {
        self.config.geo.include_unlocated_subscribers = include;
        self
    }

    /// Sets the HTTP server settings.
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.config.server = server;
        self
    }

    /// Sets the graceful shutdown timeout.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// Fills unset durations and capacities with their defaults.
    pub fn build(mut self) -> AppConfig {
        if self.config.cooldown_secs.is_zero() {
            self.config.cooldown_secs = default_cooldown();
        }
        if self.config.feed_lookback_secs.is_zero() {
            self.config.feed_lookback_secs = default_feed_lookback();
        }
        if self.config.shutdown_timeout.is_zero() {
            self.config.shutdown_timeout = default_shutdown_timeout();
        }
        if self.config.signal_channel_capacity == 0 {
            self.config.signal_channel_capacity = default_signal_channel_capacity();
        }
        self.config
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::config::{JitterSetting, ThresholdDirection};

    #[test]
    fn test_app_config_builder() {
        let config = AppConfig::builder()
            .database_url("sqlite::memory:")
            .region_config_path("test_regions.yaml")
            .subscriber_config_path("test_subscribers.yaml")
            .include_unlocated_subscribers(true)
            .build();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.region_config_path, PathBuf::from("test_regions.yaml"));
        assert_eq!(config.subscriber_config_path, PathBuf::from("test_subscribers.yaml"));
        assert!(config.geo.include_unlocated_subscribers);
        assert_eq!(config.cooldown_secs, Duration::from_secs(3600));
        assert_eq!(config.feed_lookback_secs, Duration::from_secs(604_800));
    }

    #[test]
    fn test_app_config_from_file() {
        let config_content = r#"
        database_url: "sqlite::memory:"
        cooldown_secs: 1800
        shutdown_timeout: 5
        severity_thresholds:
          rainfall:
            direction: below
            medium: 40.0
            high: 20.0
            critical: 10.0
        dispatch:
          retry_policy:
            max_attempts: 4
            jitter: none
        channels:
          sms:
            type: log
        signal_source:
          url: "http://localhost:9000/signals"
          polling_interval_secs: 60
        server:
          listen_address: "127.0.0.1:9090"
        "#;
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("app.yaml"), config_content).unwrap();

        let config = AppConfig::new(dir.path().to_str()).unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.cooldown_secs, Duration::from_secs(1800));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(config.feed_lookback_secs, Duration::from_secs(604_800));
        assert_eq!(config.severity_thresholds.rainfall.direction, ThresholdDirection::Below);
        assert_eq!(config.severity_thresholds.rainfall.medium, 40.0);
        assert_eq!(config.severity_thresholds.drought_risk.critical, 8.0);
        assert_eq!(config.dispatch.retry_policy.max_attempts, 4);
        assert_eq!(config.dispatch.retry_policy.jitter, JitterSetting::None);
        assert!(config.channels.sms.is_some());
        assert!(config.channels.ussd.is_none());
        let source = config.signal_source.unwrap();
        assert_eq!(source.polling_interval_secs, Duration::from_secs(60));
        assert_eq!(source.backlog_capacity, 1000);
        assert_eq!(config.server.listen_address, "127.0.0.1:9090");
        assert_eq!(config.region_config_path, dir.path().join("regions.yaml"));
        assert_eq!(config.subscriber_config_path, dir.path().join("subscribers.yaml"));
    }

    #[test]
    fn test_app_config_rejects_unordered_thresholds() {
        let config_content = r#"
        database_url: "sqlite::memory:"
        severity_thresholds:
          temperature:
            direction: above
            medium: 40.0
            high: 37.0
            critical: 34.0
        "#;
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("app.yaml"), config_content).unwrap();

        let err = AppConfig::new(dir.path().to_str()).unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }
}
