//! A `SignalSource` that reads a JSON array of signals over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use super::traits::{SignalSource, SignalSourceError};
use crate::models::HazardSignal;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Polls an HTTP endpoint that returns `[HazardSignal, ...]`.
#[derive(Debug, Clone)]
pub struct HttpSignalSource {
    client: reqwest::Client,
    url: Url,
}

impl HttpSignalSource {
    /// Creates a new source for `url`.
    pub fn new(url: Url) -> Result<Self, SignalSourceError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl SignalSource for HttpSignalSource {
    #[tracing::instrument(skip(self), level = "debug", fields(url = %self.url))]
    async fn fetch_signals(&self) -> Result<Vec<HazardSignal>, SignalSourceError> {
        let response = self.client.get(self.url.clone()).send().await?.error_for_status()?;
        let body = response.bytes().await?;
        let signals: Vec<HazardSignal> = serde_json::from_slice(&body)
            .map_err(|e| SignalSourceError::Decode(e.to_string()))?;
        tracing::debug!(count = signals.len(), "Fetched hazard signals.");
        Ok(signals)
    }
}
