use std::{collections::HashMap, time::Duration};

use serde::Deserialize;
use url::Url;

use super::deserialize_duration_from_ms;
use crate::models::Channel;

fn default_gateway_timeout() -> Duration {
    Duration::from_secs(10)
}

/// A generic JSON-over-HTTP messaging gateway.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Endpoint receiving `POST` requests with the message payload.
    pub url: Url,
    /// Extra headers, e.g. an API key expected by the gateway.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Per-request timeout. Timeouts count as transient failures.
    #[serde(default = "default_gateway_timeout", deserialize_with = "deserialize_duration_from_ms")]
    pub timeout_ms: Duration,
}

/// How a push channel is delivered.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelAdapterConfig {
    /// Write notifications to the log instead of sending them.
    Log,
    /// Send through an HTTP gateway.
    Gateway(GatewayConfig),
}

/// Adapter configuration for the push channels. The web channel is always
/// served by the in-app feed.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ChannelsConfig {
    /// SMS gateway.
    #[serde(default)]
    pub sms: Option<ChannelAdapterConfig>,
    /// WhatsApp gateway.
    #[serde(default)]
    pub whatsapp: Option<ChannelAdapterConfig>,
    /// USSD push gateway.
    #[serde(default)]
    pub ussd: Option<ChannelAdapterConfig>,
}

impl ChannelsConfig {
    /// Configured adapters keyed by channel. Channels without configuration
    /// are omitted.
    pub fn configured(&self) -> Vec<(Channel, &ChannelAdapterConfig)> {
        [
            (Channel::Sms, self.sms.as_ref()),
            (Channel::WhatsApp, self.whatsapp.as_ref()),
            (Channel::Ussd, self.ussd.as_ref()),
        ]
        .into_iter()
        .filter_map(|(channel, config)| config.map(|c| (channel, c)))
        .collect()
    }
}
