use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::{Value, json};
use tokio::task;
use tokio_util::sync::CancellationToken;
use ukame::{
    channels::ChannelRegistry,
    config::{AppConfig, ServerConfig},
    models::{Channel, DeliveryKey, DeliveryState, GeoPoint, Region},
    persistence::{DeliveryStore, SqliteStateRepository, SubscriberStore},
    supervisor::Supervisor,
    test_helpers::{ScriptedAdapter, SubscriberBuilder, create_test_repo},
};

pub const API_KEY: &str = "test-key";

pub struct TestServer {
    pub address: SocketAddr,
    pub repo: Arc<SqliteStateRepository>,
    pub sms: ScriptedAdapter,
    pub client: Client,
    token: CancellationToken,
    handle: task::JoinHandle<()>,
}

impl TestServer {
    /// A running supervisor with one region ("nairobi", 10 km radius) and two
    /// subscribers: "near" (web + sms, 2.5 km from the center) and "far".
    pub async fn new() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
        let address = listener.local_addr().expect("Failed to get address");
        drop(listener); // Release port for the app to use

        let repo = create_test_repo().await;
        repo.upsert_subscribers(vec![
            SubscriberBuilder::new("near")
                .location(-1.30, 36.80)
                .phone("+254700000001")
                .channels(vec![Channel::Web, Channel::Sms])
                .build(),
            SubscriberBuilder::new("far").location(3.12, 35.60).build(),
        ])
        .await
        .expect("Failed to add subscribers");

        let config = AppConfig::builder()
            .database_url("sqlite::memory:")
            .server(ServerConfig {
                enabled: true,
                listen_address: address.to_string(),
                api_key: Some(API_KEY.to_string()),
            })
            .build();
        let region = Region {
            id: "nairobi".into(),
            name: "Nairobi".into(),
            center: Some(GeoPoint::new(-1.29, 36.82)),
            radius_km: Some(10.0),
        };
        let sms = ScriptedAdapter::accepting(Channel::Sms);
        let channels = ChannelRegistry::from_config(&Default::default())
            .expect("Failed to build channels")
            .with_adapter(Arc::new(sms.clone()));

        let supervisor = Supervisor::builder()
            .config(config)
            .state(repo.clone())
            .regions(Arc::new(HashMap::from([(region.id.clone(), region)])))
            .channels(channels)
            .build()
            .expect("Failed to build supervisor");
        let token = supervisor.cancellation_token();
        let handle = task::spawn(async move {
            supervisor.run().await.expect("Supervisor failed");
        });

        let server = Self { address, repo, sms, client: Client::new(), token, handle };
        server.wait_until_ready().await;
        server
    }

    async fn wait_until_ready(&self) {
        for _ in 0..100 {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await
                && resp.status().is_success()
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("Server did not start");
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.address, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.expect("Request failed")
    }

    pub fn get_authorized(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(API_KEY)
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path))
    }

    pub fn post_authorized(&self, path: &str) -> reqwest::RequestBuilder {
        self.post(path).bearer_auth(API_KEY)
    }

    /// Posts a drought signal for nairobi and returns the response body.
    pub async fn post_signal(&self, metric: &str, value: f64, observed_at: DateTime<Utc>) -> Value {
        let resp = self
            .post_authorized("/signals")
            .json(&signal_body(metric, value, observed_at))
            .send()
            .await
            .expect("Request failed");
        assert!(resp.status().is_success(), "signal rejected: {}", resp.status());
        resp.json().await.expect("Failed to parse JSON")
    }

    /// Waits until the delivery attempt for `key` reaches `state`.
    pub async fn wait_for_attempt(&self, key: &DeliveryKey, state: DeliveryState) {
        tokio::time::timeout(Duration::from_secs(3), async {
            loop {
                if let Some(attempt) = self.repo.get_attempt(key).await.unwrap()
                    && attempt.state == state
                {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("attempt did not reach the expected state");
    }

    pub async fn cleanup(self) {
        self.token.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

pub fn signal_body(metric: &str, value: f64, observed_at: DateTime<Utc>) -> Value {
    json!({
        "region_id": "nairobi",
        "metric": metric,
        "value": value,
        "observed_at": observed_at,
    })
}
