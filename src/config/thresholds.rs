use serde::Deserialize;

use crate::models::MetricKind;

/// Which side of a threshold is hazardous.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdDirection {
    /// Higher values are worse (drought risk, temperature).
    Above,
    /// Lower values are worse (rainfall).
    Below,
}

/// Boundaries between severities for one metric.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MetricThresholds {
    /// Which side of the boundaries is worse.
    pub direction: ThresholdDirection,
    /// Boundary from low to medium.
    pub medium: f64,
    /// Boundary from medium to high.
    pub high: f64,
    /// Boundary from high to critical.
    pub critical: f64,
}

impl MetricThresholds {
    /// Thresholds for a metric where higher values are worse.
    pub fn above(medium: f64, high: f64, critical: f64) -> Self {
        Self { direction: ThresholdDirection::Above, medium, high, critical }
    }

    /// Thresholds for a metric where lower values are worse.
    pub fn below(medium: f64, high: f64, critical: f64) -> Self {
        Self { direction: ThresholdDirection::Below, medium, high, critical }
    }

    /// Boundaries must be finite and strictly ordered in the hazardous
    /// direction.
    pub fn validate(&self, metric: MetricKind) -> Result<(), String> {
        let bounds = [self.medium, self.high, self.critical];
        if bounds.iter().any(|b| !b.is_finite()) {
            return Err(format!("{metric} thresholds must be finite numbers"));
        }
        let ordered = match self.direction {
            ThresholdDirection::Above => self.medium < self.high && self.high < self.critical,
            ThresholdDirection::Below => self.medium > self.high && self.high > self.critical,
        };
        if !ordered {
            return Err(format!(
                "{metric} thresholds must be strictly ordered (medium={}, high={}, critical={})",
                self.medium, self.high, self.critical
            ));
        }
        Ok(())
    }
}

/// Per-metric severity thresholds.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SeverityThresholds {
    /// Drought risk index, on a 0 to 10 scale.
    #[serde(default = "default_drought_risk")]
    pub drought_risk: MetricThresholds,
    /// Rainfall in millimetres over the observation period.
    #[serde(default = "default_rainfall")]
    pub rainfall: MetricThresholds,
    /// Temperature in degrees Celsius.
    #[serde(default = "default_temperature")]
    pub temperature: MetricThresholds,
}

fn default_drought_risk() -> MetricThresholds {
    MetricThresholds::above(4.0, 6.0, 8.0)
}

fn default_rainfall() -> MetricThresholds {
    MetricThresholds::below(30.0, 15.0, 5.0)
}

fn default_temperature() -> MetricThresholds {
    MetricThresholds::above(34.0, 37.0, 40.0)
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            drought_risk: default_drought_risk(),
            rainfall: default_rainfall(),
            temperature: default_temperature(),
        }
    }
}

impl SeverityThresholds {
    /// Thresholds for `metric`.
    pub fn for_metric(&self, metric: MetricKind) -> &MetricThresholds {
        match metric {
            MetricKind::DroughtRisk => &self.drought_risk,
            MetricKind::Rainfall => &self.rainfall,
            MetricKind::Temperature => &self.temperature,
        }
    }

    /// Validates every metric's thresholds.
    pub fn validate(&self) -> Result<(), String> {
        for metric in [MetricKind::DroughtRisk, MetricKind::Rainfall, MetricKind::Temperature] {
            self.for_metric(metric).validate(metric)?;
        }
        Ok(())
    }
}
