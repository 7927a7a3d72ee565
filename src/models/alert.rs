//! Alert records and their lifecycle status.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{geo::GeoPoint, severity::Severity, signal::MetricKind};

/// Lifecycle of an alert. Only `Active` alerts are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    /// The single alert currently representing its cooldown key.
    Active,
    /// Replaced by a higher-severity alert for the same key. Terminal.
    Superseded,
    /// Outlived its cooldown window and was retired when a new signal for the
    /// key arrived. Terminal.
    Expired,
}

impl AlertStatus {
    /// Storage name.
    pub fn as_str(self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Superseded => "superseded",
            AlertStatus::Expired => "expired",
        }
    }

    /// Parses the storage name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(AlertStatus::Active),
            "superseded" => Some(AlertStatus::Superseded),
            "expired" => Some(AlertStatus::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an alert applies: the region plus an optional point and radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AlertSource {
    /// Region the triggering signal was reported for.
    pub region_id: String,
    /// Source point for distance checks.
    pub center: Option<GeoPoint>,
    /// Relevance radius in kilometres around `center`.
    pub radius_km: Option<f64>,
}

impl AlertSource {
    /// The point and radius, when both are set.
    pub fn radius_constraint(&self) -> Option<(GeoPoint, f64)> {
        match (self.center, self.radius_km) {
            (Some(center), Some(radius)) => Some((center, radius)),
            _ => None,
        }
    }
}

/// An alert that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlert {
    /// Rendered title.
    pub title: String,
    /// Rendered body.
    pub message: String,
    /// Short form for SMS and USSD, at most 160 characters.
    pub sms_message: String,
    /// Classified severity.
    pub severity: Severity,
    /// Where the alert applies.
    pub source: AlertSource,
    /// Action text for the severity, if configured.
    pub recommended_action: Option<String>,
    /// Metric of the triggering signal.
    pub metric: MetricKind,
    /// Value of the triggering signal.
    pub value: f64,
    /// Key the cooldown window is tracked under.
    pub cooldown_key: String,
    /// Observation time, never later than ingestion.
    pub created_at: DateTime<Utc>,
}

/// A stored alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Store-assigned identifier; increases with creation order.
    pub id: i64,
    /// Rendered title.
    pub title: String,
    /// Rendered body.
    pub message: String,
    /// Short form for SMS and USSD.
    pub sms_message: String,
    /// Classified severity.
    pub severity: Severity,
    /// Where the alert applies.
    pub source: AlertSource,
    /// Action text for the severity, if configured.
    pub recommended_action: Option<String>,
    /// Metric of the triggering signal.
    pub metric: MetricKind,
    /// Value of the triggering signal.
    pub value: f64,
    /// Key the cooldown window is tracked under.
    pub cooldown_key: String,
    /// Lifecycle status.
    pub status: AlertStatus,
    /// The alert that replaced this one, if it was superseded.
    pub superseded_by: Option<i64>,
    /// Observation time, never later than ingestion.
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Builds the stored form of `new` with the given id, as active.
    pub fn from_new(id: i64, new: NewAlert) -> Self {
        Self {
            id,
            title: new.title,
            message: new.message,
            sms_message: new.sms_message,
            severity: new.severity,
            source: new.source,
            recommended_action: new.recommended_action,
            metric: new.metric,
            value: new.value,
            cooldown_key: new.cooldown_key,
            status: AlertStatus::Active,
            superseded_by: None,
            created_at: new.created_at,
        }
    }

    /// Whether the alert still represents its cooldown key.
    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }
}
