//! Configuration module for ukame.

mod app_config;
mod channels;
mod dispatch;
mod helpers;
mod server;
mod templates;
mod thresholds;

pub use app_config::{AppConfig, AppConfigBuilder, GeoConfig, SignalSourceConfig};
pub use channels::{ChannelAdapterConfig, ChannelsConfig, GatewayConfig};
pub use dispatch::{DispatchConfig, JitterSetting, RetryPolicyConfig};
pub use helpers::{deserialize_duration_from_ms, deserialize_duration_from_seconds};
pub use server::ServerConfig;
pub use templates::{AlertTemplates, MessageTemplate, RecommendedActions};
pub use thresholds::{MetricThresholds, SeverityThresholds, ThresholdDirection};
