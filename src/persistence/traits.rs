//! Storage interfaces used by the engine.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

use crate::{
    models::{
        Alert, AlertStatus, DeliveryAttempt, DeliveryKey, DeliveryState, NewAlert, ReadState,
        Subscriber,
    },
    persistence::error::PersistenceError,
};

/// How the previously active alert of a cooldown key is retired when a new
/// alert takes its place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retirement {
    /// The alert being retired. It must still be active.
    pub alert_id: i64,
    /// `Superseded` links the retired alert to the new one; `Expired` does not.
    pub status: AlertStatus,
}

/// Durable record of alerts and their lifecycle.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Retrieves an alert by id.
    async fn get_alert(&self, alert_id: i64) -> Result<Option<Alert>, PersistenceError>;

    /// Retrieves the active alert for a cooldown key, if any.
    async fn find_active_alert(&self, cooldown_key: &str)
    -> Result<Option<Alert>, PersistenceError>;

    /// Stores `alert` as active, retiring the prior alert in the same
    /// transaction.
    ///
    /// Fails with [`PersistenceError::AlreadyExists`] when another active alert
    /// holds the cooldown key and with [`PersistenceError::Conflict`] when the
    /// alert to retire is no longer active.
    async fn insert_alert(
        &self,
        alert: NewAlert,
        retire: Option<Retirement>,
    ) -> Result<Alert, PersistenceError>;

    /// Alerts that are not superseded and were created at or after `since`,
    /// ordered by severity, creation time and id, all descending.
    async fn list_feed_candidates(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Alert>, PersistenceError>;
}

/// Alert recipients.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Inserts or replaces subscribers.
    async fn upsert_subscribers(&self, subscribers: Vec<Subscriber>)
    -> Result<(), PersistenceError>;

    /// Retrieves a subscriber by id.
    async fn get_subscriber(
        &self,
        subscriber_id: &str,
    ) -> Result<Option<Subscriber>, PersistenceError>;

    /// Retrieves all subscribers.
    async fn list_subscribers(&self) -> Result<Vec<Subscriber>, PersistenceError>;
}

/// Per-channel delivery attempts.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DeliveryStore: Send + Sync {
    /// Creates a pending attempt unless one exists for the key. Returns
    /// whether a row was created.
    async fn ensure_attempt(
        &self,
        key: &DeliveryKey,
        now: DateTime<Utc>,
    ) -> Result<bool, PersistenceError>;

    /// Retrieves an attempt by key.
    async fn get_attempt(
        &self,
        key: &DeliveryKey,
    ) -> Result<Option<DeliveryAttempt>, PersistenceError>;

    /// Attempts for one alert.
    async fn list_attempts_for_alert(
        &self,
        alert_id: i64,
    ) -> Result<Vec<DeliveryAttempt>, PersistenceError>;

    /// Pending attempts whose retry time has passed, oldest first.
    async fn list_due_attempts(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<DeliveryAttempt>, PersistenceError>;

    /// Persists the mutable fields of an attempt.
    async fn update_attempt(&self, attempt: &DeliveryAttempt) -> Result<(), PersistenceError>;

    /// Number of attempts in `state`.
    async fn count_attempts(&self, state: DeliveryState) -> Result<u64, PersistenceError>;
}

/// Per-recipient read tracking.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ReadStateStore: Send + Sync {
    /// Creates an unread row unless one exists.
    async fn ensure_unread(
        &self,
        alert_id: i64,
        subscriber_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), PersistenceError>;

    /// Marks an alert read. The first read timestamp is kept on repeat calls.
    async fn mark_read(
        &self,
        alert_id: i64,
        subscriber_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ReadState, PersistenceError>;

    /// Retrieves the read state of an alert for a subscriber.
    async fn get_read_state(
        &self,
        alert_id: i64,
        subscriber_id: &str,
    ) -> Result<Option<ReadState>, PersistenceError>;

    /// Ids of the alerts the subscriber has read.
    async fn read_alert_ids(&self, subscriber_id: &str) -> Result<HashSet<i64>, PersistenceError>;

    /// Number of subscribers that have read the alert.
    async fn count_reads_for_alert(&self, alert_id: i64) -> Result<u64, PersistenceError>;
}

/// Repository lifecycle hooks used at shutdown.
#[async_trait]
pub trait StateRepository:
    AlertStore + SubscriberStore + DeliveryStore + ReadStateStore + Send + Sync
{
    /// Performs any necessary cleanup operations before shutdown.
    async fn cleanup(&self) -> Result<(), PersistenceError>;

    /// Ensures all pending writes are flushed to disk.
    async fn flush(&self) -> Result<(), PersistenceError>;
}
