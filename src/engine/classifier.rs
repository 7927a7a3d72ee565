//! Severity classification of hazard signals.

use crate::{
    config::{MetricThresholds, SeverityThresholds, ThresholdDirection},
    models::{MetricKind, Severity},
};

/// Maps metric values to severities using configured thresholds.
///
/// A value exactly on a boundary takes the higher severity.
#[derive(Debug, Clone, Default)]
pub struct SeverityClassifier {
    thresholds: SeverityThresholds,
}

impl SeverityClassifier {
    /// Creates a classifier over validated thresholds.
    pub fn new(thresholds: SeverityThresholds) -> Self {
        Self { thresholds }
    }

    /// Severity of `value` for `metric`.
    pub fn classify(&self, metric: MetricKind, value: f64) -> Severity {
        classify_with(self.thresholds.for_metric(metric), value)
    }
}

fn classify_with(thresholds: &MetricThresholds, value: f64) -> Severity {
    let reaches = |boundary: f64| match thresholds.direction {
        ThresholdDirection::Above => value >= boundary,
        ThresholdDirection::Below => value <= boundary,
    };

    if reaches(thresholds.critical) {
        Severity::Critical
    } else if reaches(thresholds.high) {
        Severity::High
    } else if reaches(thresholds.medium) {
        Severity::Medium
    } else {
        Severity::Low
    }
}
