//! Server-owned read state.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use thiserror::Error;

use super::{feed::relevant_feed, geo_filter::GeoRelevanceFilter};
use crate::{
    models::{ReadState, ReadStatus},
    persistence::{AlertStore, PersistenceError, ReadStateStore, SubscriberStore},
};

/// Errors that can occur while tracking reads.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The store failed.
    #[error("Store error: {0}")]
    Store(#[from] PersistenceError),

    /// No subscriber with this id.
    #[error("Unknown subscriber: {0}")]
    UnknownSubscriber(String),

    /// No alert with this id.
    #[error("Alert {0} not found")]
    UnknownAlert(i64),

    /// The alert exists but is not addressed to the subscriber.
    #[error("Alert {alert_id} is not relevant to subscriber {subscriber_id}")]
    NotRelevant { alert_id: i64, subscriber_id: String },
}

/// Marks alerts read and counts unread ones.
pub struct ReadTracker {
    alerts: Arc<dyn AlertStore>,
    subscribers: Arc<dyn SubscriberStore>,
    read_states: Arc<dyn ReadStateStore>,
    geo_filter: GeoRelevanceFilter,
    lookback: TimeDelta,
}

impl ReadTracker {
    /// Creates a tracker whose unread count covers alerts within `lookback`.
    pub fn new(
        alerts: Arc<dyn AlertStore>,
        subscribers: Arc<dyn SubscriberStore>,
        read_states: Arc<dyn ReadStateStore>,
        geo_filter: GeoRelevanceFilter,
        lookback: std::time::Duration,
    ) -> Self {
        let lookback = TimeDelta::from_std(lookback).unwrap_or(TimeDelta::days(7));
        Self { alerts, subscribers, read_states, geo_filter, lookback }
    }

    /// Marks `alert_id` read for `subscriber_id`. Repeat calls return the
    /// state recorded by the first one.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn mark_read(
        &self,
        subscriber_id: &str,
        alert_id: i64,
    ) -> Result<ReadState, ReadError> {
        let subscriber = self
            .subscribers
            .get_subscriber(subscriber_id)
            .await?
            .ok_or_else(|| ReadError::UnknownSubscriber(subscriber_id.to_string()))?;
        let alert =
            self.alerts.get_alert(alert_id).await?.ok_or(ReadError::UnknownAlert(alert_id))?;

        if !self.geo_filter.is_relevant(&alert, &subscriber) {
            return Err(ReadError::NotRelevant {
                alert_id,
                subscriber_id: subscriber_id.to_string(),
            });
        }

        if let Some(state) = self.read_states.get_read_state(alert_id, subscriber_id).await?
            && state.status == ReadStatus::Read
        {
            return Ok(state);
        }

        let state = self.read_states.mark_read(alert_id, subscriber_id, Utc::now()).await?;
        tracing::debug!(alert_id, subscriber_id, "Alert marked read.");
        Ok(state)
    }

    /// Alerts in the subscriber's feed without a read state of `read`.
    pub async fn unread_count(&self, subscriber_id: &str) -> Result<u64, ReadError> {
        let subscriber = self
            .subscribers
            .get_subscriber(subscriber_id)
            .await?
            .ok_or_else(|| ReadError::UnknownSubscriber(subscriber_id.to_string()))?;
        let since = Utc::now() - self.lookback;
        let feed = relevant_feed(self.alerts.as_ref(), &self.geo_filter, &subscriber, since).await?;
        let read_ids = self.read_states.read_alert_ids(subscriber_id).await?;
        Ok(feed.iter().filter(|alert| !read_ids.contains(&alert.id)).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        models::Severity,
        persistence::SqliteStateRepository,
        test_helpers::{NewAlertBuilder, SubscriberBuilder, create_test_repo},
    };

    fn tracker(repo: &Arc<SqliteStateRepository>) -> ReadTracker {
        ReadTracker::new(
            repo.clone(),
            repo.clone(),
            repo.clone(),
            GeoRelevanceFilter::new(false),
            Duration::from_secs(7 * 24 * 3600),
        )
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let repo = create_test_repo().await;
        repo.upsert_subscribers(vec![SubscriberBuilder::new("s1").region("r1").build()])
            .await
            .unwrap();
        let alert = repo.insert_alert(NewAlertBuilder::new("r1").build(), None).await.unwrap();
        repo.ensure_unread(alert.id, "s1", Utc::now()).await.unwrap();
        let tracker = tracker(&repo);

        assert_eq!(tracker.unread_count("s1").await.unwrap(), 1);
        let first = tracker.mark_read("s1", alert.id).await.unwrap();
        assert_eq!(first.status, ReadStatus::Read);
        assert!(first.read_at.is_some());

        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = tracker.mark_read("s1", alert.id).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(tracker.unread_count("s1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unread_count_follows_the_feed_set() {
        let repo = create_test_repo().await;
        repo.upsert_subscribers(vec![
            SubscriberBuilder::new("s1").location(-1.30, 36.80).min_severity(Severity::High).build(),
        ])
        .await
        .unwrap();
        let near = repo
            .insert_alert(
                NewAlertBuilder::new("nairobi")
                    .severity(Severity::Critical)
                    .center(-1.29, 36.82)
                    .radius_km(10.0)
                    .build(),
                None,
            )
            .await
            .unwrap();
        repo.insert_alert(
            NewAlertBuilder::new("kisumu").severity(Severity::Critical).center(-0.09, 34.77).radius_km(10.0).build(),
            None,
        )
        .await
        .unwrap();
        repo.insert_alert(
            NewAlertBuilder::new("machakos").severity(Severity::Medium).center(-1.29, 36.82).radius_km(10.0).build(),
            None,
        )
        .await
        .unwrap();
        let tracker = tracker(&repo);

        // No read state rows at all counts as unread.
        assert_eq!(tracker.unread_count("s1").await.unwrap(), 1);
        tracker.mark_read("s1", near.id).await.unwrap();
        assert_eq!(tracker.unread_count("s1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_read_rejects_unknown_and_irrelevant() {
        let repo = create_test_repo().await;
        repo.upsert_subscribers(vec![SubscriberBuilder::new("s1").location(-1.30, 36.80).build()])
            .await
            .unwrap();
        let far = repo
            .insert_alert(
                NewAlertBuilder::new("kisumu").center(-0.09, 34.77).radius_km(10.0).build(),
                None,
            )
            .await
            .unwrap();
        let tracker = tracker(&repo);

        assert!(matches!(tracker.mark_read("ghost", far.id).await, Err(ReadError::UnknownSubscriber(_))));
        assert!(matches!(tracker.mark_read("s1", 999).await, Err(ReadError::UnknownAlert(999))));
        assert!(matches!(tracker.mark_read("s1", far.id).await, Err(ReadError::NotRelevant { .. })));
        assert!(repo.get_read_state(far.id, "s1").await.unwrap().is_none());
    }
}
