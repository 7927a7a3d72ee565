//! Turns hazard signals into alerts.
//!
//! A signal is validated, classified and rendered into alert text, then handed
//! to the deduplicator. New alerts are queued for dispatch.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc;

use super::{
    classifier::SeverityClassifier,
    deduplicator::{DedupError, DedupOutcome, Deduplicator},
    template::{SMS_MAX_CHARS, TemplateService, TemplateServiceError, truncate_chars},
};
use crate::{
    config::AlertTemplates,
    context::AppMetrics,
    models::{AlertSource, HazardSignal, MetricKind, NewAlert, Region, Severity},
    persistence::PersistenceError,
};

/// Errors that can occur while processing a signal.
#[derive(Debug, Error)]
pub enum SignalError {
    /// The signal failed boundary validation.
    #[error("Invalid signal: {0}")]
    Invalid(String),

    /// The signal names a region that is not configured.
    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    /// The alert store failed. The caller should re-queue the signal.
    #[error("Alert store unavailable: {0}")]
    StoreUnavailable(#[source] PersistenceError),

    /// Concurrent writers kept winning the cooldown key.
    #[error("Contention on cooldown key '{0}'")]
    Contention(String),

    /// A configured template failed to render.
    #[error("Template error: {0}")]
    Template(#[from] TemplateServiceError),
}

impl From<DedupError> for SignalError {
    fn from(error: DedupError) -> Self {
        match error {
            DedupError::Store(e) => SignalError::StoreUnavailable(e),
            DedupError::Contention { cooldown_key } => SignalError::Contention(cooldown_key),
        }
    }
}

impl SignalError {
    /// Whether the signal should be offered again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SignalError::StoreUnavailable(_))
    }
}

/// What became of a processed signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SignalOutcome {
    /// A new active alert was stored.
    Created {
        /// The stored alert.
        alert_id: i64,
        /// Its severity.
        severity: Severity,
        /// The alert retired because its window had passed.
        expired_alert_id: Option<i64>,
    },
    /// A higher-severity alert replaced the active one.
    Superseded {
        /// The stored alert.
        alert_id: i64,
        /// Its severity.
        severity: Severity,
        /// The alert it replaced.
        superseded_alert_id: i64,
    },
    /// The signal was dropped inside the active alert's window.
    Suppressed {
        /// Severity the signal classified as.
        severity: Severity,
        /// The alert still representing the condition.
        active_alert_id: i64,
    },
}

impl SignalOutcome {
    /// The alert created for the signal, if any.
    pub fn alert_id(&self) -> Option<i64> {
        match self {
            SignalOutcome::Created { alert_id, .. } | SignalOutcome::Superseded { alert_id, .. } => {
                Some(*alert_id)
            }
            SignalOutcome::Suppressed { .. } => None,
        }
    }
}

/// Validates, classifies and deduplicates hazard signals.
pub struct SignalProcessor {
    regions: Arc<HashMap<String, Region>>,
    classifier: SeverityClassifier,
    templates: AlertTemplates,
    template_service: Arc<TemplateService>,
    deduplicator: Arc<Deduplicator>,
    dispatch_tx: mpsc::Sender<i64>,
    metrics: AppMetrics,
}

impl SignalProcessor {
    /// Creates a new signal processor. Created alert ids are sent to
    /// `dispatch_tx`.
    pub fn new(
        regions: Arc<HashMap<String, Region>>,
        classifier: SeverityClassifier,
        templates: AlertTemplates,
        template_service: Arc<TemplateService>,
        deduplicator: Arc<Deduplicator>,
        dispatch_tx: mpsc::Sender<i64>,
        metrics: AppMetrics,
    ) -> Self {
        Self { regions, classifier, templates, template_service, deduplicator, dispatch_tx, metrics }
    }

    /// Checks the signal against the configured regions and the value range of
    /// its metric.
    pub fn validate(&self, signal: &HazardSignal) -> Result<&Region, SignalError> {
        if signal.region_id.trim().is_empty() {
            return Err(SignalError::Invalid("region_id cannot be empty".into()));
        }
        if !signal.value.is_finite() {
            return Err(SignalError::Invalid(format!("value must be finite, got {}", signal.value)));
        }
        let in_range = match signal.metric {
            MetricKind::DroughtRisk => (0.0..=10.0).contains(&signal.value),
            MetricKind::Rainfall => signal.value >= 0.0,
            MetricKind::Temperature => (-90.0..=70.0).contains(&signal.value),
        };
        if !in_range {
            return Err(SignalError::Invalid(format!(
                "{} value {} is out of range",
                signal.metric, signal.value
            )));
        }
        self.regions
            .get(&signal.region_id)
            .ok_or_else(|| SignalError::UnknownRegion(signal.region_id.clone()))
    }

    /// Builds the alert a valid signal proposes, without storing it.
    pub fn prepare(&self, signal: &HazardSignal) -> Result<NewAlert, SignalError> {
        let region = self.validate(signal)?;
        let severity = self.classifier.classify(signal.metric, signal.value);
        let template = self.templates.for_metric(signal.metric);
        let recommended_action =
            template.recommended_actions.for_severity(severity).map(str::to_string);

        let context = json!({
            "region_id": region.id,
            "region_name": region.name,
            "metric": signal.metric.as_str(),
            "value": signal.value,
            "severity": severity.as_str(),
            "observed_at": signal.observed_at.format("%Y-%m-%d %H:%M UTC").to_string(),
            "recommended_action": recommended_action.as_deref().unwrap_or_default(),
        });
        let title = self.template_service.render(&template.title, &context)?;
        let message = self.template_service.render(&template.body, &context)?;
        let sms = self.template_service.render(&template.sms, &context)?;

        let (center, radius_km) = match region.radius_constraint() {
            Some((center, radius)) => (Some(center), Some(radius)),
            None => (region.center, None),
        };

        Ok(NewAlert {
            title: title.trim().to_string(),
            message: message.trim().to_string(),
            sms_message: truncate_chars(&sms, SMS_MAX_CHARS),
            severity,
            source: AlertSource { region_id: region.id.clone(), center, radius_km },
            recommended_action,
            metric: signal.metric,
            value: signal.value,
            cooldown_key: signal.cooldown_key(),
            // Readings stamped in the future are treated as current.
            created_at: signal.observed_at.min(Utc::now()),
        })
    }

    /// Processes one signal end to end.
    #[tracing::instrument(skip(self, signal), fields(region_id = %signal.region_id, metric = %signal.metric, value = signal.value))]
    pub async fn process(&self, signal: &HazardSignal) -> Result<SignalOutcome, SignalError> {
        let proposed = match self.prepare(signal) {
            Ok(proposed) => proposed,
            Err(e) => {
                tracing::warn!(error = %e, "Signal rejected.");
                return Err(e);
            }
        };
        self.metrics.record_signal_processed().await;
        let severity = proposed.severity;

        let outcome = match self.deduplicator.submit(proposed).await? {
            DedupOutcome::Created { alert, expired } => SignalOutcome::Created {
                alert_id: alert.id,
                severity,
                expired_alert_id: expired,
            },
            DedupOutcome::Superseded { alert, previous_id } => SignalOutcome::Superseded {
                alert_id: alert.id,
                severity,
                superseded_alert_id: previous_id,
            },
            DedupOutcome::Suppressed { active_alert_id } => {
                SignalOutcome::Suppressed { severity, active_alert_id }
            }
        };

        if let Some(alert_id) = outcome.alert_id()
            && self.dispatch_tx.send(alert_id).await.is_err()
        {
            tracing::error!(alert_id, "Dispatch queue closed, alert will not be fanned out.");
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{DateTime, TimeDelta};

    use super::*;
    use crate::{
        config::{MessageTemplate, SeverityThresholds},
        models::{AlertStatus, GeoPoint},
        persistence::{AlertStore, SqliteStateRepository, traits::MockAlertStore},
        test_helpers::create_test_repo,
    };

    fn regions() -> Arc<HashMap<String, Region>> {
        let nairobi = Region {
            id: "R1".into(),
            name: "Nairobi".into(),
            center: Some(GeoPoint::new(-1.29, 36.82)),
            radius_km: Some(10.0),
        };
        let turkana = Region { id: "R2".into(), name: "Turkana".into(), center: None, radius_km: None };
        Arc::new(HashMap::from([(nairobi.id.clone(), nairobi), (turkana.id.clone(), turkana)]))
    }

    fn processor(
        store: Arc<dyn AlertStore>,
        templates: AlertTemplates,
    ) -> (SignalProcessor, mpsc::Receiver<i64>, AppMetrics) {
        let metrics = AppMetrics::default();
        let (tx, rx) = mpsc::channel(16);
        let deduplicator =
            Arc::new(Deduplicator::new(store, Duration::from_secs(3600), metrics.clone()));
        let processor = SignalProcessor::new(
            regions(),
            SeverityClassifier::new(SeverityThresholds::default()),
            templates,
            Arc::new(TemplateService::new()),
            deduplicator,
            tx,
            metrics.clone(),
        );
        (processor, rx, metrics)
    }

    async fn sqlite_processor() -> (Arc<SqliteStateRepository>, SignalProcessor, mpsc::Receiver<i64>, AppMetrics) {
        let repo = create_test_repo().await;
        let (processor, rx, metrics) = processor(repo.clone(), AlertTemplates::default());
        (repo, processor, rx, metrics)
    }

    fn drought(region: &str, value: f64, observed_at: DateTime<Utc>) -> HazardSignal {
        HazardSignal { region_id: region.into(), metric: MetricKind::DroughtRisk, value, observed_at }
    }

    #[tokio::test]
    async fn test_critical_then_high_is_suppressed() {
        let (repo, processor, mut rx, metrics) = sqlite_processor().await;
        let t0 = Utc::now() - TimeDelta::minutes(30);

        let first = processor.process(&drought("R1", 8.5, t0)).await.unwrap();
        let SignalOutcome::Created { alert_id: a1, severity, .. } = first else {
            panic!("expected a created alert, got {first:?}");
        };
        assert_eq!(severity, Severity::Critical);
        assert_eq!(rx.recv().await, Some(a1));

        let second = processor.process(&drought("R1", 6.0, t0 + TimeDelta::minutes(10))).await.unwrap();
        assert_eq!(second, SignalOutcome::Suppressed { severity: Severity::High, active_alert_id: a1 });
        assert!(rx.try_recv().is_err());

        let alerts = repo.list_feed_candidates(t0 - TimeDelta::days(1)).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].status, AlertStatus::Active);
        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.signals_processed, 2);
        assert_eq!(snapshot.suppressed_signals, 1);
    }

    #[tokio::test]
    async fn test_prepared_alert_text_and_scope() {
        let (_repo, processor, _rx, _metrics) = sqlite_processor().await;
        let observed_at = "2025-03-01T06:00:00Z".parse().unwrap();

        let alert = processor.prepare(&drought("R1", 8.46, observed_at)).unwrap();
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.cooldown_key, "R1:drought_risk");
        assert!(alert.title.contains("CRITICAL"), "title was {}", alert.title);
        assert!(alert.message.contains("Nairobi"));
        assert!(alert.message.contains("8.5"));
        assert!(alert.sms_message.chars().count() <= SMS_MAX_CHARS);
        assert!(alert.recommended_action.is_some());
        assert_eq!(alert.source.radius_km, Some(10.0));
        assert_eq!(alert.created_at, observed_at);

        let region_only = processor.prepare(&drought("R2", 2.0, observed_at)).unwrap();
        assert_eq!(region_only.severity, Severity::Low);
        assert!(region_only.source.radius_constraint().is_none());
    }

    #[tokio::test]
    async fn test_sms_text_is_truncated() {
        let mut templates = AlertTemplates::default();
        templates.drought_risk = MessageTemplate {
            title: "Drought".into(),
            body: "Body".into(),
            sms: "{{ region_name }} ".repeat(40),
            recommended_actions: Default::default(),
        };
        let (processor, _rx, _metrics) = processor(create_test_repo().await, templates);

        let alert = processor.prepare(&drought("R1", 5.0, Utc::now())).unwrap();
        assert_eq!(alert.sms_message.chars().count(), SMS_MAX_CHARS);
        assert!(alert.sms_message.ends_with('…'));
        assert_eq!(alert.recommended_action, None);
    }

    #[tokio::test]
    async fn test_invalid_signals_never_reach_the_store() {
        // No expectations: any store call panics.
        let (processor, _rx, metrics) = processor(Arc::new(MockAlertStore::new()), AlertTemplates::default());
        let now = Utc::now();

        let cases = [
            drought("", 5.0, now),
            drought("R1", f64::NAN, now),
            drought("R1", 10.5, now),
            drought("R1", -0.1, now),
            HazardSignal { region_id: "R1".into(), metric: MetricKind::Rainfall, value: -1.0, observed_at: now },
            HazardSignal { region_id: "R1".into(), metric: MetricKind::Temperature, value: 71.0, observed_at: now },
        ];
        for signal in cases {
            assert!(matches!(processor.process(&signal).await, Err(SignalError::Invalid(_))), "{signal:?}");
        }
        assert!(matches!(
            processor.process(&drought("R9", 5.0, now)).await,
            Err(SignalError::UnknownRegion(_))
        ));
        assert_eq!(metrics.snapshot().await.signals_processed, 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_retryable() {
        let mut store = MockAlertStore::new();
        store
            .expect_find_active_alert()
            .returning(|_| Err(PersistenceError::OperationFailed("database is locked".into())));
        let (processor, mut rx, _metrics) = processor(Arc::new(store), AlertTemplates::default());

        let error = processor.process(&drought("R1", 9.0, Utc::now())).await.unwrap_err();
        assert!(matches!(error, SignalError::StoreUnavailable(_)));
        assert!(error.is_retryable());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_superseding_signal_is_dispatched() {
        let (_repo, processor, mut rx, _metrics) = sqlite_processor().await;
        let t0 = Utc::now() - TimeDelta::minutes(30);

        let first = processor.process(&drought("R1", 4.5, t0)).await.unwrap();
        let second = processor.process(&drought("R1", 9.0, t0 + TimeDelta::minutes(5))).await.unwrap();
        let SignalOutcome::Superseded { alert_id, superseded_alert_id, severity } = second else {
            panic!("expected supersede, got {second:?}");
        };
        assert_eq!(Some(superseded_alert_id), first.alert_id());
        assert_eq!(severity, Severity::Critical);
        assert_eq!(rx.recv().await, first.alert_id());
        assert_eq!(rx.recv().await, Some(alert_id));
    }
}
