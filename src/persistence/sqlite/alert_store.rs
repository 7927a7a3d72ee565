//! Implementation of the AlertStore trait for SqliteStateRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{from_millis, map_sqlx_error, to_millis};
use crate::{
    models::{Alert, AlertSource, AlertStatus, GeoPoint, MetricKind, NewAlert, Severity},
    persistence::{
        error::PersistenceError,
        sqlite::SqliteStateRepository,
        traits::{AlertStore, Retirement},
    },
};

/// SQL query constants for alert operations
mod alert_sql {
    pub const SELECT_COLUMNS: &str = "SELECT alert_id, title, message, sms_message, severity, \
         region_id, center_lat, center_lon, radius_km, recommended_action, metric, value, \
         cooldown_key, status, superseded_by, created_at FROM alerts";

    pub const WHERE_ID: &str = " WHERE alert_id = ?";

    pub const WHERE_ACTIVE_KEY: &str = " WHERE cooldown_key = ? AND status = 'active'";

    pub const WHERE_FEED_CANDIDATE: &str = " WHERE status != 'superseded' AND created_at >= ? \
         ORDER BY severity_rank DESC, created_at DESC, alert_id DESC";

    /// Retire a still-active alert
    pub const RETIRE_ACTIVE: &str =
        "UPDATE alerts SET status = ? WHERE alert_id = ? AND status = 'active'";

    pub const LINK_SUPERSEDED: &str = "UPDATE alerts SET superseded_by = ? WHERE alert_id = ?";

    pub const INSERT_ALERT: &str = "INSERT INTO alerts (title, message, sms_message, severity, \
         severity_rank, region_id, center_lat, center_lon, radius_km, recommended_action, metric, \
         value, cooldown_key, status, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'active', ?)";
}

// Helper struct for mapping from the database row
#[derive(sqlx::FromRow)]
struct AlertRow {
    alert_id: i64,
    title: String,
    message: String,
    sms_message: String,
    severity: String,
    region_id: String,
    center_lat: Option<f64>,
    center_lon: Option<f64>,
    radius_km: Option<f64>,
    recommended_action: Option<String>,
    metric: String,
    value: f64,
    cooldown_key: String,
    status: String,
    superseded_by: Option<i64>,
    created_at: i64,
}

impl TryFrom<AlertRow> for Alert {
    type Error = PersistenceError;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        let severity = row
            .severity
            .parse::<Severity>()
            .map_err(|e| PersistenceError::SerializationError(e.to_string()))?;
        let metric = MetricKind::parse(&row.metric).ok_or_else(|| {
            PersistenceError::SerializationError(format!("unknown metric: {}", row.metric))
        })?;
        let status = AlertStatus::parse(&row.status).ok_or_else(|| {
            PersistenceError::SerializationError(format!("unknown alert status: {}", row.status))
        })?;
        let center = match (row.center_lat, row.center_lon) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        };

        Ok(Alert {
            id: row.alert_id,
            title: row.title,
            message: row.message,
            sms_message: row.sms_message,
            severity,
            source: AlertSource { region_id: row.region_id, center, radius_km: row.radius_km },
            recommended_action: row.recommended_action,
            metric,
            value: row.value,
            cooldown_key: row.cooldown_key,
            status,
            superseded_by: row.superseded_by,
            created_at: from_millis(row.created_at)?,
        })
    }
}

#[async_trait]
impl AlertStore for SqliteStateRepository {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_alert(&self, alert_id: i64) -> Result<Option<Alert>, PersistenceError> {
        let sql = format!("{}{}", alert_sql::SELECT_COLUMNS, alert_sql::WHERE_ID);
        let row = self
            .execute_query_with_error_handling(
                "get alert",
                sqlx::query_as::<_, AlertRow>(&sql).bind(alert_id).fetch_optional(&self.pool),
            )
            .await?;
        row.map(Alert::try_from).transpose()
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn find_active_alert(
        &self,
        cooldown_key: &str,
    ) -> Result<Option<Alert>, PersistenceError> {
        let sql = format!("{}{}", alert_sql::SELECT_COLUMNS, alert_sql::WHERE_ACTIVE_KEY);
        let row = self
            .execute_query_with_error_handling(
                "find active alert",
                sqlx::query_as::<_, AlertRow>(&sql).bind(cooldown_key).fetch_optional(&self.pool),
            )
            .await?;
        row.map(Alert::try_from).transpose()
    }

    #[tracing::instrument(skip(self, alert), level = "debug", fields(cooldown_key = %alert.cooldown_key))]
    async fn insert_alert(
        &self,
        alert: NewAlert,
        retire: Option<Retirement>,
    ) -> Result<Alert, PersistenceError> {
        let mut alert = alert;
        alert.created_at = from_millis(to_millis(alert.created_at))?;

        let mut tx =
            self.pool.begin().await.map_err(|e| map_sqlx_error("begin alert transaction", e))?;

        if let Some(retirement) = retire {
            let result = sqlx::query(alert_sql::RETIRE_ACTIVE)
                .bind(retirement.status.as_str())
                .bind(retirement.alert_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("retire alert", e))?;
            if result.rows_affected() == 0 {
                return Err(PersistenceError::Conflict(format!(
                    "alert {} is no longer active",
                    retirement.alert_id
                )));
            }
        }

        let center = alert.source.center;
        let result = sqlx::query(alert_sql::INSERT_ALERT)
            .bind(&alert.title)
            .bind(&alert.message)
            .bind(&alert.sms_message)
            .bind(alert.severity.as_str())
            .bind(i64::from(alert.severity.rank()))
            .bind(&alert.source.region_id)
            .bind(center.map(|c| c.lat))
            .bind(center.map(|c| c.lon))
            .bind(alert.source.radius_km)
            .bind(&alert.recommended_action)
            .bind(alert.metric.as_str())
            .bind(alert.value)
            .bind(&alert.cooldown_key)
            .bind(to_millis(alert.created_at))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert alert", e))?;
        let alert_id = result.last_insert_rowid();

        if let Some(retirement) = retire
            && retirement.status == AlertStatus::Superseded
        {
            sqlx::query(alert_sql::LINK_SUPERSEDED)
                .bind(alert_id)
                .bind(retirement.alert_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("link superseded alert", e))?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit alert transaction", e))?;

        tracing::debug!(alert_id, "Alert stored.");
        Ok(Alert::from_new(alert_id, alert))
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn list_feed_candidates(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Alert>, PersistenceError> {
        let sql = format!("{}{}", alert_sql::SELECT_COLUMNS, alert_sql::WHERE_FEED_CANDIDATE);
        let rows = self
            .execute_query_with_error_handling(
                "list feed candidates",
                sqlx::query_as::<_, AlertRow>(&sql).bind(to_millis(since)).fetch_all(&self.pool),
            )
            .await?;
        rows.into_iter().map(Alert::try_from).collect()
    }
}
