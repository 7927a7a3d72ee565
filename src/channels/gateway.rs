//! Generic JSON-over-HTTP messaging gateway.
//!
//! The gateway receives `POST` requests with the payload below and answers
//! with an optional `{"id": "..."}` body carrying its message reference.
//! Status handling: 2xx accepted; 408, 429, 5xx, timeouts and connection
//! errors transient; any other status rejected.

use async_trait::async_trait;
use reqwest::{
    StatusCode,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{ChannelAdapter, ChannelError, SendOutcome};
use crate::{
    config::GatewayConfig,
    models::{Alert, Channel},
};

#[derive(Debug, Serialize)]
struct GatewayMessage<'a> {
    channel: Channel,
    to: &'a str,
    alert_id: i64,
    severity: &'a str,
    title: &'a str,
    message: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GatewayResponse {
    #[serde(default)]
    id: Option<String>,
}

/// Sends notifications through an HTTP gateway.
#[derive(Debug, Clone)]
pub struct GatewayAdapter {
    channel: Channel,
    url: Url,
    client: reqwest::Client,
    headers: HeaderMap,
}

impl GatewayAdapter {
    /// Creates an adapter for `channel` from its gateway configuration.
    pub fn new(channel: Channel, config: &GatewayConfig) -> Result<Self, ChannelError> {
        let mut headers = HeaderMap::new();
        for (key, value) in &config.headers {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                ChannelError::Config(format!("Invalid header name: {key}: {e}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                ChannelError::Config(format!("Invalid header value for {key}: {e}"))
            })?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout_ms)
            .build()
            .map_err(|e| ChannelError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { channel, url: config.url.clone(), client, headers })
    }

    /// WhatsApp carries the full message; SMS and USSD the short form.
    fn message_for<'a>(&self, alert: &'a Alert) -> &'a str {
        match self.channel {
            Channel::WhatsApp | Channel::Web => &alert.message,
            Channel::Sms | Channel::Ussd => &alert.sms_message,
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

#[async_trait]
impl ChannelAdapter for GatewayAdapter {
    fn channel(&self) -> Channel {
        self.channel
    }

    #[tracing::instrument(skip(self, alert), fields(channel = %self.channel, alert_id = alert.id))]
    async fn send(&self, destination: &str, alert: &Alert) -> SendOutcome {
        let payload = GatewayMessage {
            channel: self.channel,
            to: destination,
            alert_id: alert.id,
            severity: alert.severity.as_str(),
            title: &alert.title,
            message: self.message_for(alert),
        };

        let response = match self
            .client
            .post(self.url.clone())
            .headers(self.headers.clone())
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                tracing::warn!(error = %e, "Gateway unreachable.");
                return SendOutcome::TransientError(format!("gateway unreachable: {e}"));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Gateway request could not be built.");
                return SendOutcome::Rejected(format!("gateway request failed: {e}"));
            }
        };

        let status = response.status();
        if status.is_success() {
            let body = response.json::<GatewayResponse>().await.unwrap_or_default();
            return SendOutcome::Accepted { external_id: body.id };
        }

        let detail = response.text().await.unwrap_or_default();
        let reason = if detail.is_empty() {
            format!("gateway responded with {status}")
        } else {
            format!("gateway responded with {status}: {detail}")
        };
        if is_transient_status(status) {
            tracing::warn!(%status, "Gateway reported a transient failure.");
            SendOutcome::TransientError(reason)
        } else {
            tracing::warn!(%status, "Gateway rejected the message.");
            SendOutcome::Rejected(reason)
        }
    }
}
