//! Polls the upstream signal source and feeds the signal processor.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;

use super::signal_processor::SignalProcessor;
use crate::{models::HazardSignal, providers::SignalSource};

/// Counts for one polling cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Signals returned by the source this cycle.
    pub fetched: usize,
    /// Signals that reached a dedup decision.
    pub processed: usize,
    /// Signals dropped as invalid or after contention.
    pub rejected: usize,
    /// Signals kept for the next cycle after a storage failure.
    pub requeued: usize,
    /// Backlogged signals discarded because the backlog was full.
    pub dropped: usize,
}

/// The polling loop around a [`SignalSource`].
///
/// Signals that fail on storage errors go into a bounded backlog and are
/// offered again, before new signals, on the next cycle.
pub struct SignalIngestor {
    source: Arc<dyn SignalSource>,
    processor: Arc<SignalProcessor>,
    polling_interval: Duration,
    backlog: VecDeque<HazardSignal>,
    backlog_capacity: usize,
}

impl SignalIngestor {
    /// Creates a new ingestor.
    pub fn new(
        source: Arc<dyn SignalSource>,
        processor: Arc<SignalProcessor>,
        polling_interval: Duration,
        backlog_capacity: usize,
    ) -> Self {
        Self {
            source,
            processor,
            polling_interval,
            backlog: VecDeque::new(),
            backlog_capacity: backlog_capacity.max(1),
        }
    }

    /// Signals waiting to be re-processed.
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Runs one cycle: drains the backlog, then processes freshly fetched
    /// signals.
    pub async fn poll_once(&mut self) -> IngestReport {
        let mut report = IngestReport::default();
        let mut signals: Vec<HazardSignal> = self.backlog.drain(..).collect();

        match self.source.fetch_signals().await {
            Ok(fetched) => {
                report.fetched = fetched.len();
                signals.extend(fetched);
            }
            Err(e) => tracing::error!(error = %e, "Failed to fetch hazard signals."),
        }

        for signal in signals {
            match self.processor.process(&signal).await {
                Ok(_) => report.processed += 1,
                Err(e) if e.is_retryable() => {
                    report.requeued += 1;
                    self.backlog.push_back(signal);
                    if self.backlog.len() > self.backlog_capacity {
                        self.backlog.pop_front();
                        report.dropped += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Signal dropped.");
                    report.rejected += 1;
                }
            }
        }

        if report.requeued > 0 {
            tracing::warn!(
                requeued = report.requeued,
                dropped = report.dropped,
                backlog = self.backlog.len(),
                "Signals kept for re-processing after storage failures."
            );
        }
        report
    }

    /// Polls until cancelled.
    pub async fn run(mut self, cancellation_token: CancellationToken) {
        let mut interval = tokio::time::interval(self.polling_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(interval = ?self.polling_interval, "Signal ingestor started.");

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => break,
                _ = interval.tick() => {
                    let report = self.poll_once().await;
                    tracing::debug!(?report, "Signal polling cycle finished.");
                }
            }
        }

        if !self.backlog.is_empty() {
            tracing::warn!(backlog = self.backlog.len(), "Signal ingestor stopped with unprocessed signals.");
        } else {
            tracing::info!("Signal ingestor stopped.");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{TimeDelta, Utc};
    use mockall::Sequence;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        config::{AlertTemplates, SeverityThresholds},
        context::AppMetrics,
        engine::{
            classifier::SeverityClassifier, deduplicator::Deduplicator, template::TemplateService,
        },
        models::{MetricKind, Region},
        persistence::{AlertStore, PersistenceError, traits::MockAlertStore},
        providers::traits::MockSignalSource,
        test_helpers::create_test_repo,
    };

    fn signal(region: &str, value: f64, minutes: i64) -> HazardSignal {
        HazardSignal {
            region_id: region.into(),
            metric: MetricKind::DroughtRisk,
            value,
            observed_at: Utc::now() - TimeDelta::minutes(60 - minutes),
        }
    }

    fn processor(store: Arc<dyn AlertStore>) -> (Arc<SignalProcessor>, mpsc::Receiver<i64>) {
        let metrics = AppMetrics::default();
        let regions: HashMap<String, Region> = ["R1", "R2"]
            .into_iter()
            .map(|id| {
                (id.to_string(), Region { id: id.into(), name: id.into(), center: None, radius_km: None })
            })
            .collect();
        let (tx, rx) = mpsc::channel(64);
        let processor = SignalProcessor::new(
            Arc::new(regions),
            SeverityClassifier::new(SeverityThresholds::default()),
            AlertTemplates::default(),
            Arc::new(TemplateService::new()),
            Arc::new(Deduplicator::new(store, Duration::from_secs(3600), metrics.clone())),
            tx,
            metrics,
        );
        (Arc::new(processor), rx)
    }

    #[tokio::test]
    async fn test_poll_processes_and_rejects() {
        let repo = create_test_repo().await;
        let (processor, mut rx) = processor(repo.clone());
        let mut source = MockSignalSource::new();
        source.expect_fetch_signals().times(1).returning(|| {
            Ok(vec![signal("R1", 8.5, 0), signal("R1", 6.0, 10), signal("R9", 5.0, 0), signal("R2", 11.0, 0)])
        });

        let mut ingestor = SignalIngestor::new(Arc::new(source), processor, Duration::from_secs(60), 10);
        let report = ingestor.poll_once().await;

        assert_eq!(
            report,
            IngestReport { fetched: 4, processed: 2, rejected: 2, requeued: 0, dropped: 0 }
        );
        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_storage_failures_are_backlogged_and_retried() {
        let mut store = MockAlertStore::new();
        let mut seq = Sequence::new();
        store
            .expect_find_active_alert()
            .times(3)
            .in_sequence(&mut seq)
            .returning(|_| Err(PersistenceError::OperationFailed("database is locked".into())));
        store.expect_find_active_alert().times(2).in_sequence(&mut seq).returning(|_| Ok(None));
        store
            .expect_insert_alert()
            .times(2)
            .returning(|new, _| Ok(crate::models::Alert::from_new(1, new)));
        let (processor, _rx) = processor(Arc::new(store));

        let mut source = MockSignalSource::new();
        source
            .expect_fetch_signals()
            .times(1)
            .returning(|| Ok(vec![signal("R1", 8.5, 0), signal("R2", 8.5, 0), signal("R1", 9.0, 1)]));
        source.expect_fetch_signals().returning(|| Ok(Vec::new()));

        // Capacity two: the third failed signal pushes out the oldest.
        let mut ingestor = SignalIngestor::new(Arc::new(source), processor, Duration::from_secs(60), 2);
        let first = ingestor.poll_once().await;
        assert_eq!(first.requeued, 3);
        assert_eq!(first.dropped, 1);
        assert_eq!(ingestor.backlog_len(), 2);

        let second = ingestor.poll_once().await;
        assert_eq!(second.fetched, 0);
        assert_eq!(second.processed, 2);
        assert_eq!(ingestor.backlog_len(), 0);
    }

    #[tokio::test]
    async fn test_source_failure_still_drains_backlog() {
        let repo = create_test_repo().await;
        let (processor, _rx) = processor(repo);
        let mut source = MockSignalSource::new();
        source
            .expect_fetch_signals()
            .returning(|| Err(crate::providers::SignalSourceError::Decode("not a list".into())));

        let mut ingestor = SignalIngestor::new(Arc::new(source), processor, Duration::from_secs(60), 10);
        ingestor.backlog.push_back(signal("R1", 7.0, 0));
        let report = ingestor.poll_once().await;
        assert_eq!(report.fetched, 0);
        assert_eq!(report.processed, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let repo = create_test_repo().await;
        let (processor, _rx) = processor(repo);
        let mut source = MockSignalSource::new();
        source.expect_fetch_signals().returning(|| Ok(Vec::new()));
        let ingestor = SignalIngestor::new(Arc::new(source), processor, Duration::from_millis(10), 10);

        let token = CancellationToken::new();
        let handle = tokio::spawn(ingestor.run(token.clone()));
        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
