//! Notification transports and the registry that maps channels to them.

mod gateway;
mod logging;
mod traits;
mod web;

use std::{collections::HashMap, sync::Arc};

pub use gateway::GatewayAdapter;
pub use logging::LogAdapter;
use thiserror::Error;
#[cfg(test)]
pub use traits::MockChannelAdapter;
pub use traits::{ChannelAdapter, SendOutcome};
pub use web::WebFeedAdapter;

use crate::{
    config::{ChannelAdapterConfig, ChannelsConfig},
    models::Channel,
};

/// Errors that can occur while setting up channel adapters.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The adapter configuration is unusable.
    #[error("Invalid channel configuration: {0}")]
    Config(String),
}

/// Adapters keyed by the channel they serve.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    adapters: HashMap<Channel, Arc<dyn ChannelAdapter>>,
}

impl ChannelRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry from configuration. The web channel is always
    /// served by the in-app feed; push channels without configuration have no
    /// adapter.
    pub fn from_config(config: &ChannelsConfig) -> Result<Self, ChannelError> {
        let mut registry = Self::new().with_adapter(Arc::new(WebFeedAdapter));
        for (channel, adapter_config) in config.configured() {
            let adapter: Arc<dyn ChannelAdapter> = match adapter_config {
                ChannelAdapterConfig::Log => Arc::new(LogAdapter::new(channel)),
                ChannelAdapterConfig::Gateway(gateway) => {
                    Arc::new(GatewayAdapter::new(channel, gateway)?)
                }
            };
            tracing::info!(%channel, "Channel adapter configured.");
            registry = registry.with_adapter(adapter);
        }
        Ok(registry)
    }

    /// Registers `adapter` for the channel it reports, replacing any previous
    /// one.
    pub fn with_adapter(mut self, adapter: Arc<dyn ChannelAdapter>) -> Self {
        self.adapters.insert(adapter.channel(), adapter);
        self
    }

    /// The adapter for `channel`, if one is configured.
    pub fn get(&self, channel: Channel) -> Option<Arc<dyn ChannelAdapter>> {
        self.adapters.get(&channel).cloned()
    }

    /// Configured channels, sorted.
    pub fn channels(&self) -> Vec<Channel> {
        let mut channels: Vec<_> = self.adapters.keys().copied().collect();
        channels.sort();
        channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_from_config() {
        let config = ChannelsConfig {
            sms: Some(ChannelAdapterConfig::Log),
            whatsapp: None,
            ussd: Some(ChannelAdapterConfig::Log),
        };
        let registry = ChannelRegistry::from_config(&config).unwrap();

        assert_eq!(registry.channels(), vec![Channel::Web, Channel::Sms, Channel::Ussd]);
        assert!(registry.get(Channel::WhatsApp).is_none());
        let web = registry.get(Channel::Web).unwrap();
        assert!(web.confirms_delivery());
        assert!(!registry.get(Channel::Sms).unwrap().confirms_delivery());
    }
}
