use chrono::Utc;
use serde_json::json;
use ukame::models::{Channel, DeliveryKey, DeliveryState};

use crate::helpers::*;

#[tokio::test]
async fn delivery_callback_promotes_sent_attempts() {
    let server = TestServer::new().await;
    let created = server.post_signal("drought_risk", 8.5, Utc::now()).await;
    let alert_id = created["alert_id"].as_i64().unwrap();

    let key = DeliveryKey::new(alert_id, "near", Channel::Sms);
    server.wait_for_attempt(&key, DeliveryState::Sent).await;
    let web = DeliveryKey::new(alert_id, "near", Channel::Web);
    server.wait_for_attempt(&web, DeliveryState::Delivered).await;
    assert_eq!(server.sms.destinations(), vec!["+254700000001".to_string()]);

    let body = json!({ "alert_id": alert_id, "subscriber_id": "near", "channel": "sms" });
    let unauthorized = server.post("/deliveries/confirm").json(&body).send().await.unwrap();
    assert_eq!(unauthorized.status(), 401);

    let resp = server.post_authorized("/deliveries/confirm").json(&body).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let attempt: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(attempt["state"], "delivered");
    assert_eq!(attempt["attempts"], 1);

    let again = server.post_authorized("/deliveries/confirm").json(&body).send().await.unwrap();
    assert_eq!(again.status(), 200);

    let unknown = json!({ "alert_id": alert_id, "subscriber_id": "far", "channel": "sms" });
    let resp = server.post_authorized("/deliveries/confirm").json(&unknown).send().await.unwrap();
    assert_eq!(resp.status(), 404);

    server.cleanup().await;
}

#[tokio::test]
async fn delivery_report_counts_states_and_reads() {
    let server = TestServer::new().await;
    let created = server.post_signal("drought_risk", 8.5, Utc::now()).await;
    let alert_id = created["alert_id"].as_i64().unwrap();
    let path = format!("/alerts/{alert_id}/deliveries");

    server.wait_for_attempt(&DeliveryKey::new(alert_id, "near", Channel::Sms), DeliveryState::Sent).await;
    server
        .wait_for_attempt(&DeliveryKey::new(alert_id, "near", Channel::Web), DeliveryState::Delivered)
        .await;

    let unauthorized = server.get(&path).await;
    assert_eq!(unauthorized.status(), 401);

    let report: serde_json::Value =
        server.get_authorized(&path).send().await.unwrap().json().await.unwrap();
    assert_eq!(report["alert_id"], alert_id);
    assert_eq!(report["recipients"], 1);
    assert_eq!(report["attempts"], 2);
    assert_eq!(report["by_state"]["sent"], 1);
    assert_eq!(report["by_state"]["delivered"], 1);
    assert_eq!(report["by_state"]["failed"], 0);
    assert_eq!(report["read_count"], 0);
    assert_eq!(report["delivery_rate"], 0.5);

    let read = server
        .post(&format!("/subscribers/near/alerts/{alert_id}/read"))
        .send()
        .await
        .unwrap();
    assert_eq!(read.status(), 200);

    let report: serde_json::Value =
        server.get_authorized(&path).send().await.unwrap().json().await.unwrap();
    assert_eq!(report["read_count"], 1);
    assert_eq!(report["read_rate"], 1.0);

    let missing = server.get_authorized("/alerts/999/deliveries").send().await.unwrap();
    assert_eq!(missing.status(), 404);

    server.cleanup().await;
}
