//! Implementation of the SubscriberStore trait for SqliteStateRepository

use async_trait::async_trait;

use super::map_sqlx_error;
use crate::{
    models::{Channel, GeoPoint, Severity, Subscriber},
    persistence::{error::PersistenceError, sqlite::SqliteStateRepository, traits::SubscriberStore},
};

/// SQL query constants for subscriber operations
mod subscriber_sql {
    pub const SELECT_ALL: &str = "SELECT subscriber_id, name, latitude, longitude, region_id, \
         phone_number, channels, min_severity FROM subscribers ORDER BY subscriber_id";

    pub const SELECT_BY_ID: &str = "SELECT subscriber_id, name, latitude, longitude, region_id, \
         phone_number, channels, min_severity FROM subscribers WHERE subscriber_id = ?";

    pub const UPSERT: &str = "INSERT OR REPLACE INTO subscribers (subscriber_id, name, latitude, \
         longitude, region_id, phone_number, channels, min_severity) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)";
}

#[derive(sqlx::FromRow)]
struct SubscriberRow {
    subscriber_id: String,
    name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    region_id: Option<String>,
    phone_number: Option<String>,
    channels: String,
    min_severity: String,
}

impl TryFrom<SubscriberRow> for Subscriber {
    type Error = PersistenceError;

    fn try_from(row: SubscriberRow) -> Result<Self, Self::Error> {
        let channels = row
            .channels
            .split(',')
            .filter(|c| !c.is_empty())
            .map(|c| {
                Channel::parse(c).ok_or_else(|| {
                    PersistenceError::SerializationError(format!("unknown channel: {c}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let min_severity = row
            .min_severity
            .parse::<Severity>()
            .map_err(|e| PersistenceError::SerializationError(e.to_string()))?;
        let location = match (row.latitude, row.longitude) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        };

        Ok(Subscriber {
            id: row.subscriber_id,
            name: row.name,
            location,
            region_id: row.region_id,
            phone_number: row.phone_number,
            channels,
            min_severity,
        })
    }
}

fn encode_channels(channels: &[Channel]) -> String {
    channels.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(",")
}

#[async_trait]
impl SubscriberStore for SqliteStateRepository {
    #[tracing::instrument(skip(self, subscribers), level = "debug", fields(count = subscribers.len()))]
    async fn upsert_subscribers(
        &self,
        subscribers: Vec<Subscriber>,
    ) -> Result<(), PersistenceError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin subscriber transaction", e))?;

        for subscriber in &subscribers {
            sqlx::query(subscriber_sql::UPSERT)
                .bind(&subscriber.id)
                .bind(&subscriber.name)
                .bind(subscriber.location.map(|l| l.lat))
                .bind(subscriber.location.map(|l| l.lon))
                .bind(&subscriber.region_id)
                .bind(&subscriber.phone_number)
                .bind(encode_channels(&subscriber.enabled_channels()))
                .bind(subscriber.min_severity.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("upsert subscriber", e))?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit subscriber transaction", e))?;
        tracing::info!(count = subscribers.len(), "Subscribers stored.");
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn get_subscriber(
        &self,
        subscriber_id: &str,
    ) -> Result<Option<Subscriber>, PersistenceError> {
        let row = self
            .execute_query_with_error_handling(
                "get subscriber",
                sqlx::query_as::<_, SubscriberRow>(subscriber_sql::SELECT_BY_ID)
                    .bind(subscriber_id)
                    .fetch_optional(&self.pool),
            )
            .await?;
        row.map(Subscriber::try_from).transpose()
    }

    #[tracing::instrument(skip(self), level = "debug")]
    async fn list_subscribers(&self) -> Result<Vec<Subscriber>, PersistenceError> {
        let rows = self
            .execute_query_with_error_handling(
                "list subscribers",
                sqlx::query_as::<_, SubscriberRow>(subscriber_sql::SELECT_ALL)
                    .fetch_all(&self.pool),
            )
            .await?;
        rows.into_iter().map(Subscriber::try_from).collect()
    }
}
