//! Implementation of the DeliveryStore trait for SqliteStateRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{from_optional_millis, to_millis};
use crate::{
    models::{Channel, DeliveryAttempt, DeliveryKey, DeliveryState},
    persistence::{error::PersistenceError, sqlite::SqliteStateRepository, traits::DeliveryStore},
};

/// SQL query constants for delivery attempt operations
mod delivery_sql {
    pub const SELECT_COLUMNS: &str = "SELECT alert_id, subscriber_id, channel, state, attempts, \
         last_attempt_at, next_retry_at, last_error, external_id FROM delivery_attempts";

    pub const WHERE_KEY: &str = " WHERE alert_id = ? AND subscriber_id = ? AND channel = ?";

    pub const WHERE_ALERT: &str = " WHERE alert_id = ? ORDER BY subscriber_id, channel";

    /// Pending attempts that are due, oldest retry time first
    pub const WHERE_DUE: &str = " WHERE state = 'pending' \
         AND (next_retry_at IS NULL OR next_retry_at <= ?) \
         ORDER BY COALESCE(next_retry_at, created_at), alert_id LIMIT ?";

    pub const INSERT_IF_ABSENT: &str = "INSERT OR IGNORE INTO delivery_attempts \
         (alert_id, subscriber_id, channel, state, attempts, created_at) \
         VALUES (?, ?, ?, 'pending', 0, ?)";

    pub const UPDATE: &str = "UPDATE delivery_attempts SET state = ?, attempts = ?, \
         last_attempt_at = ?, next_retry_at = ?, last_error = ?, external_id = ? \
         WHERE alert_id = ? AND subscriber_id = ? AND channel = ?";

    pub const COUNT_BY_STATE: &str = "SELECT COUNT(*) FROM delivery_attempts WHERE state = ?";
}

#[derive(sqlx::FromRow)]
struct DeliveryAttemptRow {
    alert_id: i64,
    subscriber_id: String,
    channel: String,
    state: String,
    attempts: i64,
    last_attempt_at: Option<i64>,
    next_retry_at: Option<i64>,
    last_error: Option<String>,
    external_id: Option<String>,
}

impl TryFrom<DeliveryAttemptRow> for DeliveryAttempt {
    type Error = PersistenceError;

    fn try_from(row: DeliveryAttemptRow) -> Result<Self, Self::Error> {
        let channel = Channel::parse(&row.channel).ok_or_else(|| {
            PersistenceError::SerializationError(format!("unknown channel: {}", row.channel))
        })?;
        let state = DeliveryState::parse(&row.state).ok_or_else(|| {
            PersistenceError::SerializationError(format!("unknown delivery state: {}", row.state))
        })?;
        let attempts = u32::try_from(row.attempts)
            .map_err(|e| PersistenceError::SerializationError(e.to_string()))?;

        Ok(DeliveryAttempt {
            key: DeliveryKey::new(row.alert_id, row.subscriber_id, channel),
            state,
            attempts,
            last_attempt_at: from_optional_millis(row.last_attempt_at)?,
            next_retry_at: from_optional_millis(row.next_retry_at)?,
            last_error: row.last_error,
            external_id: row.external_id,
        })
    }
}

#[async_trait]
impl DeliveryStore for SqliteStateRepository {
    #[tracing::instrument(skip(self), level = "debug", fields(key = %key))]
    async fn ensure_attempt(
        &self,
        key: &DeliveryKey,
        now: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "ensure delivery attempt",
                sqlx::query(delivery_sql::INSERT_IF_ABSENT)
                    .bind(key.alert_id)
                    .bind(&key.subscriber_id)
                    .bind(key.channel.as_str())
                    .bind(to_millis(now))
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), level = "debug", fields(key = %key))]
    async fn get_attempt(
        &self,
        key: &DeliveryKey,
    ) -> Result<Option<DeliveryAttempt>, PersistenceError> {
        let sql = format!("{}{}", delivery_sql::SELECT_COLUMNS, delivery_sql::WHERE_KEY);
        let row = self
            .execute_query_with_error_handling(
                "get delivery attempt",
                sqlx::query_as::<_, DeliveryAttemptRow>(&sql)
                    .bind(key.alert_id)
                    .bind(&key.subscriber_id)
                    .bind(key.channel.as_str())
                    .fetch_optional(&self.pool),
            )
            .await?;
        row.map(DeliveryAttempt::try_from).transpose()
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn list_attempts_for_alert(
        &self,
        alert_id: i64,
    ) -> Result<Vec<DeliveryAttempt>, PersistenceError> {
        let sql = format!("{}{}", delivery_sql::SELECT_COLUMNS, delivery_sql::WHERE_ALERT);
        let rows = self
            .execute_query_with_error_handling(
                "list delivery attempts for alert",
                sqlx::query_as::<_, DeliveryAttemptRow>(&sql).bind(alert_id).fetch_all(&self.pool),
            )
            .await?;
        rows.into_iter().map(DeliveryAttempt::try_from).collect()
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn list_due_attempts(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<DeliveryAttempt>, PersistenceError> {
        let sql = format!("{}{}", delivery_sql::SELECT_COLUMNS, delivery_sql::WHERE_DUE);
        let rows = self
            .execute_query_with_error_handling(
                "list due delivery attempts",
                sqlx::query_as::<_, DeliveryAttemptRow>(&sql)
                    .bind(to_millis(now))
                    .bind(i64::from(limit))
                    .fetch_all(&self.pool),
            )
            .await?;
        rows.into_iter().map(DeliveryAttempt::try_from).collect()
    }

    #[tracing::instrument(skip(self, attempt), level = "debug", fields(key = %attempt.key, state = %attempt.state))]
    async fn update_attempt(&self, attempt: &DeliveryAttempt) -> Result<(), PersistenceError> {
        let result = self
            .execute_query_with_error_handling(
                "update delivery attempt",
                sqlx::query(delivery_sql::UPDATE)
                    .bind(attempt.state.as_str())
                    .bind(i64::from(attempt.attempts))
                    .bind(attempt.last_attempt_at.map(to_millis))
                    .bind(attempt.next_retry_at.map(to_millis))
                    .bind(&attempt.last_error)
                    .bind(&attempt.external_id)
                    .bind(attempt.key.alert_id)
                    .bind(&attempt.key.subscriber_id)
                    .bind(attempt.key.channel.as_str())
                    .execute(&self.pool),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound(format!("delivery attempt {}", attempt.key)));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn count_attempts(&self, state: DeliveryState) -> Result<u64, PersistenceError> {
        let count: i64 = self
            .execute_query_with_error_handling(
                "count delivery attempts",
                sqlx::query_scalar(delivery_sql::COUNT_BY_STATE)
                    .bind(state.as_str())
                    .fetch_one(&self.pool),
            )
            .await?;
        Ok(count.max(0) as u64)
    }
}
