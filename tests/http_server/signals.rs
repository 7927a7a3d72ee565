use chrono::{TimeDelta, Utc};

use crate::helpers::*;

#[tokio::test]
async fn signals_require_the_api_key() {
    let server = TestServer::new().await;
    let body = signal_body("drought_risk", 8.5, Utc::now());

    let missing = server.post("/signals").json(&body).send().await.unwrap();
    assert_eq!(missing.status(), 401);

    let wrong = server.post("/signals").bearer_auth("nope").json(&body).send().await.unwrap();
    assert_eq!(wrong.status(), 401);

    server.cleanup().await;
}

#[tokio::test]
async fn lower_severity_signal_is_suppressed_by_the_active_alert() {
    let server = TestServer::new().await;
    let t0 = Utc::now() - TimeDelta::minutes(30);

    let resp = server
        .post_authorized("/signals")
        .json(&signal_body("drought_risk", 8.5, t0))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let created: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(created["outcome"], "created");
    assert_eq!(created["severity"], "critical");

    let resp = server
        .post_authorized("/signals")
        .json(&signal_body("drought_risk", 6.0, t0 + TimeDelta::minutes(10)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let suppressed: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(suppressed["outcome"], "suppressed");
    assert_eq!(suppressed["severity"], "high");
    assert_eq!(suppressed["active_alert_id"], created["alert_id"]);

    server.cleanup().await;
}

#[tokio::test]
async fn invalid_signals_are_rejected() {
    let server = TestServer::new().await;

    let out_of_range = server
        .post_authorized("/signals")
        .json(&signal_body("drought_risk", 11.0, Utc::now()))
        .send()
        .await
        .unwrap();
    assert_eq!(out_of_range.status(), 422);

    let mut unknown_region = signal_body("rainfall", 3.0, Utc::now());
    unknown_region["region_id"] = "atlantis".into();
    let resp = server.post_authorized("/signals").json(&unknown_region).send().await.unwrap();
    assert_eq!(resp.status(), 422);

    let status: serde_json::Value = server.get("/status").await.json().await.unwrap();
    assert_eq!(status["alerts_created"], 0);

    server.cleanup().await;
}
