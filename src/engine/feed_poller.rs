//! Periodic feed refresh, the way the web client polls.

use std::{sync::Arc, time::Duration};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::feed::{FeedError, FeedOutcome, FeedQuery, FeedQueryService};

/// Latest poll result. `None` until the first poll completes.
pub type FeedSnapshot = Option<Result<FeedOutcome, FeedError>>;

/// Fetches a subscriber's feed at a fixed interval and publishes the latest
/// result on a watch channel. Readers are at most one interval behind.
pub struct FeedPoller {
    service: Arc<FeedQueryService>,
    subscriber_id: String,
    query: FeedQuery,
    interval: Duration,
    tx: watch::Sender<FeedSnapshot>,
}

impl FeedPoller {
    /// Creates a poller for `subscriber_id`.
    pub fn new(
        service: Arc<FeedQueryService>,
        subscriber_id: impl Into<String>,
        query: FeedQuery,
        interval: Duration,
    ) -> Self {
        let (tx, _) = watch::channel(None);
        Self { service, subscriber_id: subscriber_id.into(), query, interval, tx }
    }

    /// A receiver for the published results.
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.tx.subscribe()
    }

    /// Polls until `cancellation_token` is cancelled. The first poll runs
    /// immediately.
    pub async fn run(self, cancellation_token: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => break,
                _ = interval.tick() => {
                    let result = self.service.fetch(&self.subscriber_id, &self.query).await;
                    if let Ok(FeedOutcome::Degraded) = &result {
                        tracing::debug!(subscriber_id = %self.subscriber_id, "Feed poll returned a stale feed.");
                    }
                    self.tx.send_replace(Some(result));
                }
            }
        }
        tracing::debug!(subscriber_id = %self.subscriber_id, "Feed poller stopped.");
    }
}
