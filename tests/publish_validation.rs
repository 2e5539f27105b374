//! Publish validation against the real client
//!
//! The broker is unreachable in these tests on purpose: validation must
//! short-circuit before any connection attempt, and operations that do need
//! the broker must fail with a bounded, descriptive connection error.

use std::time::{Duration, Instant};
use uns_bridge::config::MqttSection;
use uns_bridge::{BridgeError, UnsClient};

fn unreachable_broker() -> MqttSection {
    MqttSection {
        // Reserved port, nothing listens here
        broker_url: "mqtt://127.0.0.1:9".to_string(),
        connect_timeout_secs: 1,
        ..MqttSection::default()
    }
}

#[tokio::test]
async fn wildcard_topic_fails_validation_before_any_connection() {
    let client = UnsClient::new(unreachable_broker()).unwrap();

    let started = Instant::now();
    let err = client
        .publish_message("sensors/#", "x", false, 1)
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::Validation { .. }));
    assert!(err.to_string().contains("wildcard"));
    assert!(
        started.elapsed() < Duration::from_millis(500),
        "validation must not wait on the connect timeout"
    );
}

#[tokio::test]
async fn plus_wildcard_and_empty_topics_are_rejected() {
    let client = UnsClient::new(unreachable_broker()).unwrap();

    for topic in ["factory/+/speed", "", "   "] {
        let err = client.publish_message(topic, "x", false, 1).await.unwrap_err();
        assert!(matches!(err, BridgeError::Validation { .. }), "{topic:?}");
    }
}

#[tokio::test]
async fn invalid_qos_is_rejected() {
    let client = UnsClient::new(unreachable_broker()).unwrap();

    for qos in [3u8, 5, 200] {
        let err = client.publish_message("a/b", "v", false, qos).await.unwrap_err();
        assert!(matches!(err, BridgeError::Validation { .. }), "qos {qos}");
        assert!(err.to_string().contains("Must be 0, 1, or 2"));
    }
}

#[tokio::test]
async fn valid_publish_against_dead_broker_reports_connection_error() {
    let client = UnsClient::new(unreachable_broker()).unwrap();

    let started = Instant::now();
    let err = client.publish_message("a/b", "v", false, 1).await.unwrap_err();

    assert!(err.is_connection());
    // Bounded by the 1s connect timeout, with some scheduling slack
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn discover_and_read_report_connection_errors() {
    let client = UnsClient::new(unreachable_broker()).unwrap();

    let err = client
        .discover("#", Duration::from_millis(100))
        .await
        .unwrap_err();
    assert!(err.is_connection());

    let err = client
        .read_topic("a/b", Duration::from_millis(100))
        .await
        .unwrap_err();
    assert!(err.is_connection());

    client.disconnect().await.unwrap();
}
