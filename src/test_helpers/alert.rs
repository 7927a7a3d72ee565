//! Builders for `NewAlert` and `Alert` instances in tests.

use chrono::{DateTime, Utc};

use crate::models::{
    Alert, AlertSource, AlertStatus, GeoPoint, MetricKind, NewAlert, Severity,
    signal::cooldown_key,
};

/// A builder for creating `NewAlert` instances in tests.
pub struct NewAlertBuilder {
    region_id: String,
    metric: MetricKind,
    value: Option<f64>,
    severity: Option<Severity>,
    center: Option<GeoPoint>,
    radius_km: Option<f64>,
    created_at: Option<DateTime<Utc>>,
    title: Option<String>,
}

impl NewAlertBuilder {
    /// Creates a builder for a drought risk alert in `region_id`.
    pub fn new(region_id: &str) -> Self {
        Self {
            region_id: region_id.to_string(),
            metric: MetricKind::DroughtRisk,
            value: None,
            severity: None,
            center: None,
            radius_km: None,
            created_at: None,
            title: None,
        }
    }

    /// Sets the metric, which also changes the cooldown key.
    pub fn metric(mut self, metric: MetricKind) -> Self {
        self.metric = metric;
        self
    }

    /// Sets the triggering value.
    pub fn value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    /// Sets the severity.
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Sets the source center point.
    pub fn center(mut self, lat: f64, lon: f64) -> Self {
        self.center = Some(GeoPoint::new(lat, lon));
        self
    }

    /// Sets the relevance radius.
    pub fn radius_km(mut self, radius_km: f64) -> Self {
        self.radius_km = Some(radius_km);
        self
    }

    /// Sets the creation timestamp.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Sets the title.
    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    /// Builds the `NewAlert` instance.
    pub fn build(self) -> NewAlert {
        let severity = self.severity.unwrap_or(Severity::Medium);
        NewAlert {
            title: self
                .title
                .unwrap_or_else(|| format!("{} {} in {}", severity, self.metric, self.region_id)),
            message: format!("Test alert for {}", self.region_id),
            sms_message: format!("{}: {} in {}", severity, self.metric, self.region_id),
            severity,
            source: AlertSource {
                region_id: self.region_id.clone(),
                center: self.center,
                radius_km: self.radius_km,
            },
            recommended_action: None,
            metric: self.metric,
            value: self.value.unwrap_or(5.0),
            cooldown_key: cooldown_key(&self.region_id, self.metric),
            created_at: self.created_at.unwrap_or_else(Utc::now),
        }
    }
}

/// A builder for stored `Alert` instances, for components that never touch
/// the store.
pub struct AlertBuilder {
    id: i64,
    inner: NewAlertBuilder,
    status: AlertStatus,
}

impl AlertBuilder {
    /// Creates a builder for an active alert with the given id.
    pub fn new(id: i64, region_id: &str) -> Self {
        Self { id, inner: NewAlertBuilder::new(region_id), status: AlertStatus::Active }
    }

    /// Sets the severity.
    pub fn severity(mut self, severity: Severity) -> Self {
        self.inner = self.inner.severity(severity);
        self
    }

    /// Sets the source center point.
    pub fn center(mut self, lat: f64, lon: f64) -> Self {
        self.inner = self.inner.center(lat, lon);
        self
    }

    /// Sets the relevance radius.
    pub fn radius_km(mut self, radius_km: f64) -> Self {
        self.inner = self.inner.radius_km(radius_km);
        self
    }

    /// Sets the creation timestamp.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.inner = self.inner.created_at(created_at);
        self
    }

    /// Sets the lifecycle status.
    pub fn status(mut self, status: AlertStatus) -> Self {
        self.status = status;
        self
    }

    /// Builds the `Alert` instance.
    pub fn build(self) -> Alert {
        let mut alert = Alert::from_new(self.id, self.inner.build());
        alert.status = self.status;
        alert
    }
}
