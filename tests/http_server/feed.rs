use chrono::{TimeDelta, Utc};

use crate::helpers::*;

#[tokio::test]
async fn feed_shows_relevant_alerts_and_tracks_reads() {
    let server = TestServer::new().await;
    let created = server.post_signal("drought_risk", 8.5, Utc::now()).await;
    let alert_id = created["alert_id"].as_i64().unwrap();

    let body: serde_json::Value = server.get("/subscribers/near/feed").await.json().await.unwrap();
    assert_eq!(body["stale"], false);
    assert_eq!(body["unread_count"], 1);
    assert_eq!(body["items"][0]["id"], alert_id);
    assert_eq!(body["items"][0]["severity"], "critical");
    assert_eq!(body["items"][0]["read"], false);
    assert!(body["next_cursor"].is_null());

    let far: serde_json::Value = server.get("/subscribers/far/feed").await.json().await.unwrap();
    assert_eq!(far["items"].as_array().unwrap().len(), 0);

    let path = format!("/subscribers/near/alerts/{alert_id}/read");
    let first = server.post(&path).send().await.unwrap();
    assert_eq!(first.status(), 200);
    let first: serde_json::Value = first.json().await.unwrap();
    assert_eq!(first["status"], "read");
    let second: serde_json::Value = server.post(&path).send().await.unwrap().json().await.unwrap();
    assert_eq!(second["read_at"], first["read_at"]);

    let body: serde_json::Value = server.get("/subscribers/near/feed").await.json().await.unwrap();
    assert_eq!(body["unread_count"], 0);
    assert_eq!(body["items"][0]["read"], true);

    server.cleanup().await;
}

#[tokio::test]
async fn feed_paginates_and_filters_by_severity() {
    let server = TestServer::new().await;
    let now = Utc::now();
    server.post_signal("drought_risk", 8.5, now - TimeDelta::minutes(5)).await;
    server.post_signal("temperature", 36.0, now).await;

    let first: serde_json::Value =
        server.get("/subscribers/near/feed?limit=1").await.json().await.unwrap();
    assert_eq!(first["items"].as_array().unwrap().len(), 1);
    assert_eq!(first["items"][0]["severity"], "critical");
    assert_eq!(first["unread_count"], 2);
    let cursor = first["next_cursor"].as_str().unwrap().to_string();

    let second: serde_json::Value = server
        .get(&format!("/subscribers/near/feed?limit=1&cursor={cursor}"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(second["items"].as_array().unwrap().len(), 1);
    assert_ne!(second["items"][0]["id"], first["items"][0]["id"]);
    assert!(second["next_cursor"].is_null());

    let critical: serde_json::Value =
        server.get("/subscribers/near/feed?severity=critical").await.json().await.unwrap();
    assert_eq!(critical["items"].as_array().unwrap().len(), 1);
    assert_eq!(critical["unread_count"], 2);

    server.cleanup().await;
}

#[tokio::test]
async fn feed_rejects_bad_requests() {
    let server = TestServer::new().await;

    assert_eq!(server.get("/subscribers/ghost/feed").await.status(), 404);
    assert_eq!(server.get("/subscribers/near/feed?severity=extreme").await.status(), 400);
    assert_eq!(server.get("/subscribers/near/feed?cursor=garbage").await.status(), 400);
    assert_eq!(server.post("/subscribers/near/alerts/999/read").send().await.unwrap().status(), 404);

    server.cleanup().await;
}
