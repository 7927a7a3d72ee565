use std::sync::Arc;

use tokio::sync::RwLock;

/// Counters exposed to operators through the status endpoint.
#[derive(Debug, Clone)]
pub struct Metrics {
    /// The time the application started.
    pub start_time: tokio::time::Instant,
    /// Signals that passed validation and were classified.
    pub signals_processed: u64,
    /// Alerts created, superseding ones included.
    pub alerts_created: u64,
    /// Signals suppressed by an active alert of equal or higher severity.
    pub suppressed_signals: u64,
    /// Alerts replaced by a higher-severity alert.
    pub superseded_alerts: u64,
    /// Dedup decisions that lost the race twice.
    pub contention_anomalies: u64,
    /// Attempts that reached a terminal failure since startup.
    pub failed_deliveries: u64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            start_time: tokio::time::Instant::now(),
            signals_processed: 0,
            alerts_created: 0,
            suppressed_signals: 0,
            superseded_alerts: 0,
            contention_anomalies: 0,
            failed_deliveries: 0,
        }
    }
}

/// Shared application metrics.
#[derive(Clone, Default)]
pub struct AppMetrics {
    /// Shared metrics.
    pub metrics: Arc<RwLock<Metrics>>,
}

impl AppMetrics {
    /// A copy of the current values.
    pub async fn snapshot(&self) -> Metrics {
        self.metrics.read().await.clone()
    }

    /// Counts a validated signal.
    pub async fn record_signal_processed(&self) {
        self.metrics.write().await.signals_processed += 1;
    }

    /// Counts a newly stored alert.
    pub async fn record_alert_created(&self) {
        self.metrics.write().await.alerts_created += 1;
    }

    /// Counts a signal dropped inside its window.
    pub async fn record_suppressed(&self) {
        self.metrics.write().await.suppressed_signals += 1;
    }

    /// Counts a superseding alert, which is also a created one.
    pub async fn record_superseded(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.superseded_alerts += 1;
        metrics.alerts_created += 1;
    }

    /// Counts a dedup decision that lost its race twice.
    pub async fn record_contention_anomaly(&self) {
        self.metrics.write().await.contention_anomalies += 1;
    }

    /// Counts an attempt that failed terminally.
    pub async fn record_failed_delivery(&self) {
        self.metrics.write().await.failed_deliveries += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counters_are_shared_between_clones() {
        let metrics = AppMetrics::default();
        let clone = metrics.clone();

        clone.record_alert_created().await;
        clone.record_superseded().await;
        metrics.record_suppressed().await;

        let snapshot = metrics.snapshot().await;
        assert_eq!(snapshot.alerts_created, 2);
        assert_eq!(snapshot.superseded_alerts, 1);
        assert_eq!(snapshot.suppressed_signals, 1);
        assert_eq!(snapshot.contention_anomalies, 0);
    }
}
