//! Hazard signals emitted by the upstream risk collaborator.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The hazard metric a signal measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Drought risk score on a 0-10 scale.
    DroughtRisk,
    /// Accumulated rainfall in millimetres.
    Rainfall,
    /// Air temperature in degrees Celsius.
    Temperature,
}

impl MetricKind {
    /// Snake-case name used in cooldown keys, storage and templates.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::DroughtRisk => "drought_risk",
            MetricKind::Rainfall => "rainfall",
            MetricKind::Temperature => "temperature",
        }
    }

    /// Parses the snake-case name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "drought_risk" => Some(MetricKind::DroughtRisk),
            "rainfall" => Some(MetricKind::Rainfall),
            "temperature" => Some(MetricKind::Temperature),
            _ => None,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw hazard reading for a region. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardSignal {
    /// Identifier of the region the reading applies to.
    pub region_id: String,
    /// What was measured.
    pub metric: MetricKind,
    /// The measured value, in the metric's unit.
    pub value: f64,
    /// When the reading was taken.
    pub observed_at: DateTime<Utc>,
}

impl HazardSignal {
    /// Region plus condition signature. Signals sharing a key compete for the
    /// same active alert slot.
    pub fn cooldown_key(&self) -> String {
        cooldown_key(&self.region_id, self.metric)
    }
}

/// Builds the cooldown key for a region and metric.
pub fn cooldown_key(region_id: &str, metric: MetricKind) -> String {
    format!("{}:{}", region_id, metric.as_str())
}
