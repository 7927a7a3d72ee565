use async_trait::async_trait;

use super::{ChannelAdapter, SendOutcome};
use crate::models::{Alert, Channel};

/// Writes notifications to the log instead of sending them. Used for push
/// channels in development.
#[derive(Debug, Clone, Copy)]
pub struct LogAdapter {
    channel: Channel,
}

impl LogAdapter {
    /// Creates a log adapter standing in for `channel`.
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl ChannelAdapter for LogAdapter {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, destination: &str, alert: &Alert) -> SendOutcome {
        tracing::info!(
            channel = %self.channel,
            destination,
            alert_id = alert.id,
            severity = %alert.severity,
            message = %alert.sms_message,
            "Notification (log channel)"
        );
        SendOutcome::Accepted { external_id: Some(format!("log-{}-{}", self.channel, alert.id)) }
    }
}
