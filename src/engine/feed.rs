//! The subscriber alert feed served to the polling web client.

use std::{fmt, str::FromStr, sync::Arc};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use thiserror::Error;

use super::geo_filter::GeoRelevanceFilter;
use crate::{
    models::{Alert, AlertStatus, MetricKind, Severity, Subscriber},
    persistence::{AlertStore, PersistenceError, ReadStateStore, SubscriberStore},
};

/// Page size when the client does not ask for one.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Largest page a client may request.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Errors returned to the caller of a feed query.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    /// No subscriber with this id.
    #[error("Unknown subscriber: {0}")]
    UnknownSubscriber(String),

    /// The cursor was not produced by this service.
    #[error("Invalid feed cursor: {0}")]
    InvalidCursor(String),
}

/// Sort key of a feed item, used as the pagination cursor.
///
/// Serialized as `{rank}.{created_at_ms}.{id}`. Items sort descending on all
/// three parts, which makes the order total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeedCursor {
    /// Severity rank.
    pub rank: u8,
    /// Creation time in milliseconds.
    pub created_at_ms: i64,
    /// Alert id, the final tie-breaker.
    pub id: i64,
}

impl FeedCursor {
    /// The sort key of `alert`.
    pub fn of(alert: &Alert) -> Self {
        Self {
            rank: alert.severity.rank(),
            created_at_ms: alert.created_at.timestamp_millis(),
            id: alert.id,
        }
    }
}

impl fmt::Display for FeedCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.rank, self.created_at_ms, self.id)
    }
}

impl FromStr for FeedCursor {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FeedError::InvalidCursor(s.to_string());
        let mut parts = s.splitn(3, '.');
        let (Some(rank), Some(created_at_ms), Some(id)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        let rank: u8 = rank.parse().map_err(|_| invalid())?;
        if Severity::from_rank(rank).is_none() {
            return Err(invalid());
        }
        Ok(Self {
            rank,
            created_at_ms: created_at_ms.parse().map_err(|_| invalid())?,
            id: id.parse().map_err(|_| invalid())?,
        })
    }
}

/// Parameters of a feed request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedQuery {
    /// Only alerts of exactly this severity.
    pub severity: Option<Severity>,
    /// Cursor returned with the previous page.
    pub cursor: Option<String>,
    /// Page size, clamped to `1..=MAX_PAGE_LIMIT`.
    pub limit: Option<u32>,
}

impl FeedQuery {
    fn page_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT) as usize
    }
}

/// An alert as shown in the feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertSummary {
    /// Alert id.
    pub id: i64,
    /// Alert title.
    pub title: String,
    /// Full message body.
    pub message: String,
    /// Alert severity.
    pub severity: Severity,
    /// Region the alert was raised for.
    pub region_id: String,
    /// Metric that triggered the alert.
    pub metric: MetricKind,
    /// Metric value that triggered the alert.
    pub value: f64,
    /// What the subscriber should do.
    pub recommended_action: Option<String>,
    /// Lifecycle status. Expired alerts stay in the feed.
    pub status: AlertStatus,
    /// When the alert was raised.
    pub created_at: DateTime<Utc>,
    /// Whether the subscriber has read the alert.
    pub read: bool,
}

impl AlertSummary {
    fn new(alert: Alert, read: bool) -> Self {
        Self {
            id: alert.id,
            title: alert.title,
            message: alert.message,
            severity: alert.severity,
            region_id: alert.source.region_id,
            metric: alert.metric,
            value: alert.value,
            recommended_action: alert.recommended_action,
            status: alert.status,
            created_at: alert.created_at,
            read,
        }
    }
}

/// One page of a subscriber's feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedPage {
    /// Feed items in feed order.
    pub items: Vec<AlertSummary>,
    /// Unread alerts across the whole feed, not just this page.
    pub unread_count: u64,
    /// Cursor for the next page, absent on the last one.
    pub next_cursor: Option<String>,
}

/// Result of a feed query.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedOutcome {
    /// The page as read from the store.
    Fresh(FeedPage),
    /// The store was unavailable. Rendered as an empty, stale feed.
    Degraded,
}

/// Alerts currently in `subscriber`'s feed, highest severity first, then
/// newest first, then highest id first.
pub(crate) async fn relevant_feed(
    alerts: &dyn AlertStore,
    geo_filter: &GeoRelevanceFilter,
    subscriber: &Subscriber,
    since: DateTime<Utc>,
) -> Result<Vec<Alert>, PersistenceError> {
    let mut feed: Vec<Alert> = alerts
        .list_feed_candidates(since)
        .await?
        .into_iter()
        .filter(|alert| geo_filter.is_relevant(alert, subscriber))
        .collect();
    feed.sort_by(|a, b| FeedCursor::of(b).cmp(&FeedCursor::of(a)));
    Ok(feed)
}

/// Serves subscriber feeds. Queries never change state.
pub struct FeedQueryService {
    alerts: Arc<dyn AlertStore>,
    subscribers: Arc<dyn SubscriberStore>,
    read_states: Arc<dyn ReadStateStore>,
    geo_filter: GeoRelevanceFilter,
    lookback: TimeDelta,
}

impl FeedQueryService {
    /// Creates a feed service over alerts created within `lookback`.
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

    /// Fetches one page of `subscriber_id`'s feed.
    ///
    /// Unknown subscribers and malformed cursors are errors. Store failures
    /// yield [`FeedOutcome::Degraded`].
    #[tracing::instrument(skip(self, query), level = "debug")]
    pub async fn fetch(
        &self,
        subscriber_id: &str,
        query: &FeedQuery,
    ) -> Result<FeedOutcome, FeedError> {
        let cursor = query.cursor.as_deref().map(FeedCursor::from_str).transpose()?;

        let subscriber = match self.subscribers.get_subscriber(subscriber_id).await {
            Ok(Some(subscriber)) => subscriber,
            Ok(None) => return Err(FeedError::UnknownSubscriber(subscriber_id.to_string())),
            Err(e) => return Ok(self.degraded(e)),
        };

        let since = Utc::now() - self.lookback;
        let feed =
            match relevant_feed(self.alerts.as_ref(), &self.geo_filter, &subscriber, since).await {
                Ok(feed) => feed,
                Err(e) => return Ok(self.degraded(e)),
            };
        let read_ids = match self.read_states.read_alert_ids(subscriber_id).await {
            Ok(ids) => ids,
            Err(e) => return Ok(self.degraded(e)),
        };

        let unread_count = feed.iter().filter(|alert| !read_ids.contains(&alert.id)).count() as u64;

        let limit = query.page_limit();
        let mut matching = feed
            .into_iter()
            .filter(|alert| query.severity.is_none_or(|severity| alert.severity == severity))
            .filter(|alert| cursor.is_none_or(|cursor| FeedCursor::of(alert) < cursor))
            .peekable();

        let mut items = Vec::with_capacity(limit);
        let mut last = None;
        while items.len() < limit {
            let Some(alert) = matching.next() else { break };
            last = Some(FeedCursor::of(&alert));
            let read = read_ids.contains(&alert.id);
            items.push(AlertSummary::new(alert, read));
        }
        let next_cursor =
            if matching.peek().is_some() { last.map(|cursor| cursor.to_string()) } else { None };

        Ok(FeedOutcome::Fresh(FeedPage { items, unread_count, next_cursor }))
    }

    fn degraded(&self, error: PersistenceError) -> FeedOutcome {
        tracing::warn!(error = %error, "Alert store unavailable, serving a stale feed.");
        FeedOutcome::Degraded
    }
}
