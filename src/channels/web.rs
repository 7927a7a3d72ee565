use async_trait::async_trait;

use super::{ChannelAdapter, SendOutcome};
use crate::models::{Alert, Channel};

/// The in-app feed. Alerts are already stored, so recording the attempt is
/// the delivery; the web client picks them up on its next poll.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebFeedAdapter;

#[async_trait]
impl ChannelAdapter for WebFeedAdapter {
    fn channel(&self) -> Channel {
        Channel::Web
    }

    fn confirms_delivery(&self) -> bool {
        true
    }

    async fn send(&self, destination: &str, alert: &Alert) -> SendOutcome {
        tracing::debug!(subscriber_id = destination, alert_id = alert.id, "Alert placed in feed.");
        SendOutcome::Accepted { external_id: None }
    }
}
