//! Implementation of the ReadStateStore trait for SqliteStateRepository

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{from_optional_millis, to_millis};
use crate::{
    models::{ReadState, ReadStatus},
    persistence::{error::PersistenceError, sqlite::SqliteStateRepository, traits::ReadStateStore},
};

/// SQL query constants for read state operations
mod read_sql {
    pub const INSERT_UNREAD: &str = "INSERT OR IGNORE INTO read_states \
         (alert_id, subscriber_id, state, created_at) VALUES (?, ?, 'unread', ?)";

    /// Mark read, keeping the first read timestamp
    pub const UPSERT_READ: &str = "INSERT INTO read_states \
         (alert_id, subscriber_id, state, read_at, created_at) VALUES (?, ?, 'read', ?, ?) \
         ON CONFLICT (alert_id, subscriber_id) DO UPDATE SET state = 'read', \
         read_at = COALESCE(read_states.read_at, excluded.read_at)";

    pub const SELECT_ONE: &str = "SELECT alert_id, subscriber_id, state, read_at FROM read_states \
         WHERE alert_id = ? AND subscriber_id = ?";

    pub const SELECT_READ_IDS: &str =
        "SELECT alert_id FROM read_states WHERE subscriber_id = ? AND state = 'read'";

    pub const COUNT_READS_FOR_ALERT: &str =
        "SELECT COUNT(*) FROM read_states WHERE alert_id = ? AND state = 'read'";
}

#[derive(sqlx::FromRow)]
struct ReadStateRow {
    alert_id: i64,
    subscriber_id: String,
    state: String,
    read_at: Option<i64>,
}

impl TryFrom<ReadStateRow> for ReadState {
    type Error = PersistenceError;

    fn try_from(row: ReadStateRow) -> Result<Self, Self::Error> {
        let status = ReadStatus::parse(&row.state).ok_or_else(|| {
            PersistenceError::SerializationError(format!("unknown read state: {}", row.state))
        })?;
        Ok(ReadState {
            alert_id: row.alert_id,
            subscriber_id: row.subscriber_id,
            status,
            read_at: from_optional_millis(row.read_at)?,
        })
    }
}

#[async_trait]
impl ReadStateStore for SqliteStateRepository {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn ensure_unread(
        &self,
        alert_id: i64,
        subscriber_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        self.execute_query_with_error_handling(
            "ensure unread state",
            sqlx::query(read_sql::INSERT_UNREAD)
                .bind(alert_id)
                .bind(subscriber_id)
                .bind(to_millis(now))
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn mark_read(
        &self,
        alert_id: i64,
        subscriber_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ReadState, PersistenceError> {
        self.execute_query_with_error_handling(
            "mark alert read",
            sqlx::query(read_sql::UPSERT_READ)
                .bind(alert_id)
                .bind(subscriber_id)
                .bind(to_millis(now))
                .bind(to_millis(now))
                .execute(&self.pool),
        )
        .await?;

        self.get_read_state(alert_id, subscriber_id).await?.ok_or_else(|| {
            PersistenceError::NotFound(format!("read state {alert_id}/{subscriber_id}"))
        })
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_read_state(
        &self,
        alert_id: i64,
        subscriber_id: &str,
    ) -> Result<Option<ReadState>, PersistenceError> {
        let row = self
            .execute_query_with_error_handling(
                "get read state",
                sqlx::query_as::<_, ReadStateRow>(read_sql::SELECT_ONE)
                    .bind(alert_id)
                    .bind(subscriber_id)
                    .fetch_optional(&self.pool),
            )
            .await?;
        row.map(ReadState::try_from).transpose()
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn read_alert_ids(&self, subscriber_id: &str) -> Result<HashSet<i64>, PersistenceError> {
        let ids: Vec<i64> = self
            .execute_query_with_error_handling(
                "list read alert ids",
                sqlx::query_scalar(read_sql::SELECT_READ_IDS)
                    .bind(subscriber_id)
                    .fetch_all(&self.pool),
            )
            .await?;
        Ok(ids.into_iter().collect())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn count_reads_for_alert(&self, alert_id: i64) -> Result<u64, PersistenceError> {
        let count: i64 = self
            .execute_query_with_error_handling(
                "count reads for alert",
                sqlx::query_scalar(read_sql::COUNT_READS_FOR_ALERT)
                    .bind(alert_id)
                    .fetch_one(&self.pool),
            )
            .await?;
        Ok(count.max(0) as u64)
    }
}
