//! Fans alerts out to subscribers and drives delivery attempts through their
//! state machine.
//!
//! Every (alert, subscriber, channel) triple gets exactly one stored attempt.
//! Dispatching an alert again only resumes attempts that are still pending, and
//! an in-flight registry keeps two tasks from sending the same triple at once.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashSet;
use futures::{StreamExt, stream};
use rand::Rng;
use thiserror::Error;
use tokio::{
    sync::{Semaphore, mpsc},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;

use super::{delivery_report::DeliveryReport, geo_filter::GeoRelevanceFilter};
use crate::{
    channels::{ChannelRegistry, SendOutcome},
    config::{DispatchConfig, JitterSetting, RetryPolicyConfig},
    context::AppMetrics,
    models::{Alert, DeliveryAttempt, DeliveryKey, DeliveryState, Subscriber},
    persistence::{
        AlertStore, DeliveryStore, PersistenceError, ReadStateStore, StateRepository,
        SubscriberStore,
    },
};

/// Errors that can occur while dispatching.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A store call failed.
    #[error("Store error: {0}")]
    Store(#[from] PersistenceError),

    /// The alert to dispatch does not exist.
    #[error("Alert {0} not found")]
    AlertNotFound(i64),

    /// No attempt exists for the key.
    #[error("Delivery attempt {0} not found")]
    AttemptNotFound(DeliveryKey),

    /// The attempt is in a state the requested transition cannot start from.
    #[error("Delivery attempt {key} is {state}, expected sent")]
    InvalidTransition { key: DeliveryKey, state: DeliveryState },
}

/// The stores the fan-out works against.
#[derive(Clone)]
pub struct DispatchStores {
    /// Alert lookups.
    pub alerts: Arc<dyn AlertStore>,
    /// Recipient lookups.
    pub subscribers: Arc<dyn SubscriberStore>,
    /// Attempt bookkeeping.
    pub deliveries: Arc<dyn DeliveryStore>,
    /// Unread rows created on fan-out.
    pub read_states: Arc<dyn ReadStateStore>,
}

impl DispatchStores {
    /// Uses one repository for every store.
    pub fn from_repo<R: StateRepository + 'static>(repo: Arc<R>) -> Self {
        Self {
            alerts: repo.clone(),
            subscribers: repo.clone(),
            deliveries: repo.clone(),
            read_states: repo,
        }
    }
}

/// Result of dispatching one alert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    /// Subscribers the alert is relevant to.
    pub recipients: usize,
    /// Attempts created by this call. Zero when the alert was dispatched before.
    pub created: usize,
    /// Attempts that were run, in their resulting state.
    pub attempts: Vec<DeliveryAttempt>,
}

/// Removes its key from the in-flight registry when dropped.
struct InFlightGuard<'a> {
    registry: &'a DashSet<DeliveryKey>,
    key: DeliveryKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.registry.remove(&self.key);
    }
}

/// Schedules and runs delivery attempts.
pub struct DispatchFanOut {
    stores: DispatchStores,
    channels: ChannelRegistry,
    geo_filter: GeoRelevanceFilter,
    config: DispatchConfig,
    in_flight: DashSet<DeliveryKey>,
    metrics: AppMetrics,
}

impl DispatchFanOut {
    /// Creates a new fan-out.
    pub fn new(
        stores: DispatchStores,
        channels: ChannelRegistry,
        geo_filter: GeoRelevanceFilter,
        config: DispatchConfig,
        metrics: AppMetrics,
    ) -> Self {
        Self { stores, channels, geo_filter, config, in_flight: DashSet::new(), metrics }
    }

    /// Ensures attempts and unread rows for every relevant subscriber and
    /// channel, then runs the attempts that are due.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn dispatch_alert(&self, alert_id: i64) -> Result<DispatchReport, DispatchError> {
        let alert = self
            .stores
            .alerts
            .get_alert(alert_id)
            .await?
            .ok_or(DispatchError::AlertNotFound(alert_id))?;

        if !alert.is_active() {
            tracing::info!(alert_id, status = %alert.status, "Alert is no longer active, nothing to dispatch.");
            return Ok(DispatchReport::default());
        }

        let subscribers = self.stores.subscribers.list_subscribers().await?;
        let recipients = self.geo_filter.relevant_subscribers(&alert, &subscribers);
        let now = Utc::now();

        let mut report = DispatchReport { recipients: recipients.len(), ..Default::default() };
        let mut pending = Vec::new();
        for subscriber in recipients {
            self.stores.read_states.ensure_unread(alert.id, &subscriber.id, now).await?;
            for channel in subscriber.enabled_channels() {
                let key = DeliveryKey::new(alert.id, subscriber.id.clone(), channel);
                if self.stores.deliveries.ensure_attempt(&key, now).await? {
                    report.created += 1;
                }
                pending.push((key, subscriber.clone()));
            }
        }

        tracing::info!(
            alert_id,
            recipients = report.recipients,
            created = report.created,
            "Alert fanned out."
        );

        report.attempts = stream::iter(pending)
            .map(|(key, subscriber): (DeliveryKey, Subscriber)| async move {
                self.run_attempt(&key, Some(subscriber), Utc::now()).await
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .filter_map(|result| async move { self.settle(result) })
            .collect()
            .await;
        report.attempts.sort_by(|a, b| a.key.cmp(&b.key));

        Ok(report)
    }

    /// Runs pending attempts whose retry time is at or before `now`. Returns
    /// the attempts that were run.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn process_due_attempts(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeliveryAttempt>, DispatchError> {
        let due = self.stores.deliveries.list_due_attempts(now, self.config.retry_batch_size).await?;
        if due.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(count = due.len(), "Retrying due delivery attempts.");

        let mut subscribers: HashMap<String, Option<Subscriber>> = HashMap::new();
        for attempt in &due {
            if !subscribers.contains_key(&attempt.key.subscriber_id) {
                let subscriber =
                    self.stores.subscribers.get_subscriber(&attempt.key.subscriber_id).await?;
                subscribers.insert(attempt.key.subscriber_id.clone(), subscriber);
            }
        }

        let subscribers = &subscribers;
        let processed: Vec<_> = stream::iter(due)
            .map(|attempt| async move {
                let subscriber = subscribers.get(&attempt.key.subscriber_id).cloned().flatten();
                self.run_attempt(&attempt.key, subscriber, now).await
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .filter_map(|result| async move { self.settle(result) })
            .collect()
            .await;
        Ok(processed)
    }

    /// Promotes a `sent` attempt to `delivered`. Confirming an attempt that is
    /// already delivered is a no-op.
    #[tracing::instrument(skip(self, key), level = "debug", fields(key = %key))]
    pub async fn confirm_delivery(
        &self,
        key: &DeliveryKey,
    ) -> Result<DeliveryAttempt, DispatchError> {
        let mut attempt = self
            .stores
            .deliveries
            .get_attempt(key)
            .await?
            .ok_or_else(|| DispatchError::AttemptNotFound(key.clone()))?;

        match attempt.state {
            DeliveryState::Delivered => Ok(attempt),
            DeliveryState::Sent => {
                attempt.state = DeliveryState::Delivered;
                self.stores.deliveries.update_attempt(&attempt).await?;
                tracing::info!(key = %attempt.key, "Delivery confirmed.");
                Ok(attempt)
            }
            state => Err(DispatchError::InvalidTransition { key: key.clone(), state }),
        }
    }

    /// Summarizes how the deliveries of `alert_id` went so far.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn delivery_report(&self, alert_id: i64) -> Result<DeliveryReport, DispatchError> {
        let alert = self
            .stores
            .alerts
            .get_alert(alert_id)
            .await?
            .ok_or(DispatchError::AlertNotFound(alert_id))?;
        let attempts = self.stores.deliveries.list_attempts_for_alert(alert_id).await?;
        let read_count = self.stores.read_states.count_reads_for_alert(alert_id).await?;
        Ok(DeliveryReport::new(&alert, &attempts, read_count))
    }

    /// Logs attempt-level failures. A failed attempt stays pending in the
    /// store and is picked up by the retry loop.
    fn settle(
        &self,
        result: Result<Option<DeliveryAttempt>, DispatchError>,
    ) -> Option<DeliveryAttempt> {
        match result {
            Ok(attempt) => attempt,
            Err(e) => {
                tracing::error!(error = %e, "Delivery attempt could not be recorded.");
                None
            }
        }
    }

    /// Runs one attempt if it is still due and nobody else is running it.
    /// Returns `None` when the attempt was skipped.
    async fn run_attempt(
        &self,
        key: &DeliveryKey,
        subscriber: Option<Subscriber>,
        now: DateTime<Utc>,
    ) -> Result<Option<DeliveryAttempt>, DispatchError> {
        if !self.in_flight.insert(key.clone()) {
            tracing::debug!(%key, "Attempt already in flight, skipping.");
            return Ok(None);
        }
        let _guard = InFlightGuard { registry: &self.in_flight, key: key.clone() };

        // Re-read under the guard so a concurrent run that finished first is seen.
        let Some(mut attempt) = self.stores.deliveries.get_attempt(key).await? else {
            return Err(DispatchError::AttemptNotFound(key.clone()));
        };
        if !attempt.is_due(now) {
            return Ok(None);
        }

        let alert = self.stores.alerts.get_alert(key.alert_id).await?;
        let Some(alert) = alert.filter(Alert::is_active) else {
            attempt.state = DeliveryState::Cancelled;
            attempt.next_retry_at = None;
            self.stores.deliveries.update_attempt(&attempt).await?;
            tracing::info!(%key, "Alert is no longer active, attempt cancelled.");
            return Ok(Some(attempt));
        };

        let adapter = self.channels.get(key.channel);
        let destination = subscriber.as_ref().and_then(|s| s.destination(key.channel));
        let (Some(adapter), Some(destination)) = (adapter, destination) else {
            let reason = if subscriber.is_none() {
                "subscriber no longer exists"
            } else if self.channels.get(key.channel).is_none() {
                "no adapter configured for channel"
            } else {
                "subscriber has no destination for channel"
            };
            attempt.last_attempt_at = Some(now);
            self.fail(&mut attempt, reason.to_string()).await?;
            return Ok(Some(attempt));
        };

        let outcome = adapter.send(&destination, &alert).await;
        attempt.attempts += 1;
        attempt.last_attempt_at = Some(now);

        match outcome {
            SendOutcome::Accepted { external_id } => {
                attempt.state = if adapter.confirms_delivery() {
                    DeliveryState::Delivered
                } else {
                    DeliveryState::Sent
                };
                attempt.external_id = external_id;
                attempt.next_retry_at = None;
                attempt.last_error = None;
                self.stores.deliveries.update_attempt(&attempt).await?;
                tracing::info!(%key, state = %attempt.state, "Notification accepted.");
            }
            SendOutcome::Rejected(reason) => {
                self.fail(&mut attempt, reason).await?;
            }
            SendOutcome::TransientError(reason) => {
                let policy = &self.config.retry_policy;
                if attempt.attempts >= policy.max_attempts {
                    self.fail(&mut attempt, reason).await?;
                } else {
                    let delay = retry_delay(policy, attempt.attempts);
                    let next = now + TimeDelta::from_std(delay).unwrap_or(TimeDelta::days(1));
                    attempt.next_retry_at = Some(next);
                    attempt.last_error = Some(reason);
                    self.stores.deliveries.update_attempt(&attempt).await?;
                    tracing::warn!(
                        %key,
                        attempts = attempt.attempts,
                        next_retry_at = %next,
                        "Transient delivery failure, retry scheduled."
                    );
                }
            }
        }
        Ok(Some(attempt))
    }

    async fn fail(
        &self,
        attempt: &mut DeliveryAttempt,
        reason: String,
    ) -> Result<(), PersistenceError> {
        attempt.state = DeliveryState::Failed;
        attempt.next_retry_at = None;
        attempt.last_error = Some(reason);
        self.stores.deliveries.update_attempt(attempt).await?;
        self.metrics.record_failed_delivery().await;
        tracing::warn!(
            key = %attempt.key,
            attempts = attempt.attempts,
            error = attempt.last_error.as_deref().unwrap_or_default(),
            "Delivery failed permanently."
        );
        Ok(())
    }

    /// Dispatches alert ids from `alerts_rx`, up to `concurrency` alerts at a
    /// time, until cancelled or the sender side closes.
    pub async fn run(
        self: Arc<Self>,
        mut alerts_rx: mpsc::Receiver<i64>,
        cancellation_token: CancellationToken,
    ) {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut jobs = JoinSet::new();
        tracing::info!(concurrency = self.config.concurrency, "Dispatch fan-out started.");

        loop {
            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => break,
                Some(result) = jobs.join_next(), if !jobs.is_empty() => {
                    if let Err(e) = result {
                        tracing::error!(error = ?e, "Dispatch job panicked.");
                    }
                }
                maybe_alert_id = alerts_rx.recv() => {
                    let Some(alert_id) = maybe_alert_id else {
                        tracing::info!("Dispatch queue closed.");
                        break;
                    };
                    let permit = tokio::select! {
                        permit = semaphore.clone().acquire_owned() => permit,
                        _ = cancellation_token.cancelled() => break,
                    };
                    let Ok(permit) = permit else { break };
                    let fan_out = Arc::clone(&self);
                    jobs.spawn(async move {
                        let _permit = permit;
                        if let Err(e) = fan_out.dispatch_alert(alert_id).await {
                            tracing::error!(alert_id, error = %e, "Failed to dispatch alert.");
                        }
                    });
                }
            }
        }

        while let Some(result) = jobs.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = ?e, "Dispatch job panicked.");
            }
        }
        tracing::info!("Dispatch fan-out stopped.");
    }

    /// Periodically runs due attempts until cancelled.
    pub async fn run_retry_loop(self: Arc<Self>, cancellation_token: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.retry_interval_secs);
        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => break,
                _ = interval.tick() => {
                    // Errors are logged; the loop never stops on them.
                    if let Err(e) = self.process_due_attempts(Utc::now()).await {
                        tracing::error!(error = %e, "Retry cycle failed.");
                    }
                }
            }
        }
        tracing::info!("Delivery retry loop stopped.");
    }
}

/// Backoff for the retry after `attempts` failures, with jitter applied.
fn retry_delay(policy: &RetryPolicyConfig, attempts: u32) -> Duration {
    let delay = policy.backoff_for(attempts);
    match policy.jitter {
        JitterSetting::None => delay,
        JitterSetting::Full => {
            let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
            Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
        }
    }
}
