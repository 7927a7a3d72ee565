//! Per-recipient, per-channel delivery tracking.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::channel::Channel;

/// State of a single (alert, subscriber, channel) delivery.
///
/// `pending -> sent -> delivered`, with `failed` and `cancelled` as terminal
/// exits. A `pending` attempt with a `next_retry_at` is waiting for a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    /// Waiting to be sent.
    Pending,
    /// Accepted by the transport, no delivery confirmation yet.
    Sent,
    /// Confirmed by the transport.
    Delivered,
    /// Permanently failed or out of retries.
    Failed,
    /// The alert stopped being active before this attempt could run.
    Cancelled,
}

impl DeliveryState {
    /// Storage name.
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryState::Pending => "pending",
            DeliveryState::Sent => "sent",
            DeliveryState::Delivered => "delivered",
            DeliveryState::Failed => "failed",
            DeliveryState::Cancelled => "cancelled",
        }
    }

    /// Parses the storage name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DeliveryState::Pending),
            "sent" => Some(DeliveryState::Sent),
            "delivered" => Some(DeliveryState::Delivered),
            "failed" => Some(DeliveryState::Failed),
            "cancelled" => Some(DeliveryState::Cancelled),
            _ => None,
        }
    }

    /// No further transitions will be made by the dispatcher.
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryState::Delivered | DeliveryState::Failed | DeliveryState::Cancelled)
    }
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeliveryKey {
    /// The alert being delivered.
    pub alert_id: i64,
    /// The recipient.
    pub subscriber_id: String,
    /// The transport.
    pub channel: Channel,
}

impl DeliveryKey {
    /// Creates a new key.
    pub fn new(alert_id: i64, subscriber_id: impl Into<String>, channel: Channel) -> Self {
        Self { alert_id, subscriber_id: subscriber_id.into(), channel }
    }
}

impl fmt::Display for DeliveryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.alert_id, self.subscriber_id, self.channel)
    }
}

/// Delivery bookkeeping for one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    /// Attempt identity.
    pub key: DeliveryKey,
    /// Current state.
    pub state: DeliveryState,
    /// Number of send attempts made so far.
    pub attempts: u32,
    /// Time of the latest send.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// When the next retry becomes due, for pending attempts that failed
    /// transiently.
    pub next_retry_at: Option<DateTime<Utc>>,
    /// Reason for the latest failure.
    pub last_error: Option<String>,
    /// Message identifier reported by the transport.
    pub external_id: Option<String>,
}

impl DeliveryAttempt {
    /// A fresh attempt that has not been sent yet.
    pub fn pending(key: DeliveryKey) -> Self {
        Self {
            key,
            state: DeliveryState::Pending,
            attempts: 0,
            last_attempt_at: None,
            next_retry_at: None,
            last_error: None,
            external_id: None,
        }
    }

    /// Whether the dispatcher should attempt this delivery at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state == DeliveryState::Pending && self.next_retry_at.is_none_or(|at| at <= now)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_pending_attempt_due_rules() {
        let now = Utc::now();
        let mut attempt = DeliveryAttempt::pending(DeliveryKey::new(1, "s1", Channel::Sms));
        assert!(attempt.is_due(now));

        attempt.next_retry_at = Some(now + Duration::seconds(30));
        assert!(!attempt.is_due(now));
        assert!(attempt.is_due(now + Duration::seconds(30)));

        attempt.state = DeliveryState::Failed;
        assert!(!attempt.is_due(now + Duration::hours(1)));
    }

    #[test]
    fn test_state_roundtrip_and_terminality() {
        for state in [
            DeliveryState::Pending,
            DeliveryState::Sent,
            DeliveryState::Delivered,
            DeliveryState::Failed,
            DeliveryState::Cancelled,
        ] {
            assert_eq!(DeliveryState::parse(state.as_str()), Some(state));
        }
        assert!(!DeliveryState::Sent.is_terminal());
        assert!(DeliveryState::Cancelled.is_terminal());
    }
}
