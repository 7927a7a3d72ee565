//! Delivery performance of a single alert.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Alert, AlertStatus, DeliveryAttempt, DeliveryState, Severity};

/// Attempt counts per delivery state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryCounts {
    /// Not yet sent, including attempts waiting for a retry.
    pub pending: u64,
    /// Accepted by the transport without confirmation.
    pub sent: u64,
    /// Confirmed by the transport.
    pub delivered: u64,
    /// Out of retries or rejected.
    pub failed: u64,
    /// Dropped because the alert stopped being active.
    pub cancelled: u64,
}

impl DeliveryCounts {
    fn record(&mut self, state: DeliveryState) {
        match state {
            DeliveryState::Pending => self.pending += 1,
            DeliveryState::Sent => self.sent += 1,
            DeliveryState::Delivered => self.delivered += 1,
            DeliveryState::Failed => self.failed += 1,
            DeliveryState::Cancelled => self.cancelled += 1,
        }
    }
}

/// How an alert's deliveries went, for operators.
///
/// Rates are fractions in `[0, 1]` and are zero when their denominator is.
/// Delivery and failure rates are per attempt; the read rate is per
/// recipient, since reads are tracked per subscriber rather than per channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryReport {
    /// The reported alert.
    pub alert_id: i64,
    /// Alert title, as rendered for subscribers.
    pub title: String,
    /// Alert severity.
    pub severity: Severity,
    /// Current lifecycle status.
    pub status: AlertStatus,
    /// When the alert was raised.
    pub created_at: DateTime<Utc>,
    /// Distinct subscribers with at least one attempt.
    pub recipients: u64,
    /// One per (subscriber, channel).
    pub attempts: u64,
    /// Attempts per delivery state.
    pub by_state: DeliveryCounts,
    /// Recipients that marked the alert read.
    pub read_count: u64,
    /// Delivered attempts over all attempts.
    pub delivery_rate: f64,
    /// Readers over recipients.
    pub read_rate: f64,
    /// Failed attempts over all attempts.
    pub failure_rate: f64,
}

impl DeliveryReport {
    /// Builds the report for `alert` from its attempts and read count.
    pub fn new(alert: &Alert, attempts: &[DeliveryAttempt], read_count: u64) -> Self {
        let mut by_state = DeliveryCounts::default();
        let mut recipients = HashSet::new();
        for attempt in attempts {
            by_state.record(attempt.state);
            recipients.insert(attempt.key.subscriber_id.as_str());
        }
        let total = attempts.len() as u64;
        let recipients = recipients.len() as u64;

        Self {
            alert_id: alert.id,
            title: alert.title.clone(),
            severity: alert.severity,
            status: alert.status,
            created_at: alert.created_at,
            recipients,
            attempts: total,
            by_state,
            read_count,
            delivery_rate: ratio(by_state.delivered, total),
            read_rate: ratio(read_count, recipients),
            failure_rate: ratio(by_state.failed, total),
        }
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 { 0.0 } else { part as f64 / whole as f64 }
}
