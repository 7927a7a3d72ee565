use chrono::{TimeDelta, Utc};

use crate::helpers::*;

#[tokio::test]
async fn status_endpoint_returns_status_json() {
    let server = TestServer::new().await;

    let resp = server.get("/status").await;

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.expect("Failed to parse JSON");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["uptime_secs"].as_u64().is_some());
    assert_eq!(body["suppressed_signals"], 0);
    assert_eq!(body["superseded_alerts"], 0);
    assert_eq!(body["contention_anomalies"], 0);
    assert_eq!(body["failed_deliveries"], 0);
    assert_eq!(body["retry_queue_depth"], 0);

    server.cleanup().await;
}

#[tokio::test]
async fn status_counts_suppressed_and_superseded_signals() {
    let server = TestServer::new().await;
    let t0 = Utc::now() - TimeDelta::minutes(30);

    server.post_signal("drought_risk", 6.0, t0).await;
    server.post_signal("drought_risk", 5.5, t0 + TimeDelta::minutes(5)).await;
    server.post_signal("drought_risk", 8.5, t0 + TimeDelta::minutes(10)).await;

    let body: serde_json::Value = server.get("/status").await.json().await.unwrap();
    assert_eq!(body["signals_processed"], 3);
    assert_eq!(body["alerts_created"], 2);
    assert_eq!(body["suppressed_signals"], 1);
    assert_eq!(body["superseded_alerts"], 1);

    server.cleanup().await;
}
