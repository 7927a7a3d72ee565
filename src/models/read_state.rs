//! Server-owned read tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a subscriber has read an alert. Moves one way only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadStatus {
    /// Delivered to the feed, not opened yet.
    Unread,
    /// Opened by the subscriber.
    Read,
}

impl ReadStatus {
    /// Storage name.
    pub fn as_str(self) -> &'static str {
        match self {
            ReadStatus::Unread => "unread",
            ReadStatus::Read => "read",
        }
    }

    /// Parses the storage name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unread" => Some(ReadStatus::Unread),
            "read" => Some(ReadStatus::Read),
            _ => None,
        }
    }
}

/// Read state of one alert for one subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadState {
    /// The alert.
    pub alert_id: i64,
    /// The subscriber.
    pub subscriber_id: String,
    /// Unread or read.
    pub status: ReadStatus,
    /// Time of the first read event.
    pub read_at: Option<DateTime<Utc>>,
}
