use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::models::{Alert, Channel};

/// Result of handing a notification to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The transport took the message. `external_id` is the transport's own
    /// reference, used by delivery callbacks.
    Accepted { external_id: Option<String> },
    /// The transport refused the message for good.
    Rejected(String),
    /// The transport failed in a way that may succeed later.
    TransientError(String),
}

/// A notification transport.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// The channel this adapter serves.
    fn channel(&self) -> Channel;

    /// Whether acceptance already means the subscriber has the message.
    fn confirms_delivery(&self) -> bool {
        false
    }

    /// Sends `alert` to `destination`.
    async fn send(&self, destination: &str, alert: &Alert) -> SendOutcome;
}
