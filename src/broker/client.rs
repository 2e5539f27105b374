//! UNS broker client
//!
//! Owns the rumqttc session: a background supervisor task drives the network
//! event loop (connect acknowledgments, incoming publishes, publish acks,
//! reconnection with bounded backoff) while the public operations - discover,
//! read, publish - run as cooperative async calls on top of it.

use super::cache::{MessageCache, MessageSnapshot};
use super::connection::{
    configure_mqtt_options, generate_client_id, ConnectionState, ReconnectConfig,
};
use super::reason::{reason_string, DisconnectCause};
use crate::config::MqttSection;
use crate::error::{BridgeError, BridgeResult};
use chrono::{DateTime, Utc};
use rumqttc::v5::mqttbytes::v5::{ConnectReturnCode, Packet, PublishProperties};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, Event, EventLoop};
use rumqttc::Outgoing;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome of a publish operation.
///
/// Broker-reported failures surface here as data rather than as errors, so
/// a caller always gets a receipt once validation and connection checks have
/// passed.
#[derive(Debug, Clone, Serialize)]
pub struct PublishReceipt {
    pub success: bool,
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retain: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qos: Option<u8>,
    /// Broker packet identifier for acknowledged publishes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<u16>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl PublishReceipt {
    pub fn delivered(
        topic: &str,
        payload: &str,
        retain: bool,
        qos: u8,
        message_id: Option<u16>,
    ) -> Self {
        Self {
            success: true,
            topic: topic.to_string(),
            payload: Some(payload.to_string()),
            retain: Some(retain),
            qos: Some(qos),
            message_id,
            timestamp: Utc::now(),
            error: None,
            error_code: None,
        }
    }

    pub fn failed(topic: &str, error: impl Into<String>, error_code: Option<&str>) -> Self {
        Self {
            success: false,
            topic: topic.to_string(),
            payload: None,
            retain: None,
            qos: None,
            message_id: None,
            timestamp: Utc::now(),
            error: Some(error.into()),
            error_code: error_code.map(|c| c.to_string()),
        }
    }
}

/// Which packet completes a tracked publish.
#[derive(Debug, Clone, Copy, PartialEq)]
enum AckKind {
    /// PUBACK (QoS 1)
    Ack,
    /// PUBCOMP (QoS 2)
    Comp,
}

#[derive(Debug)]
struct PendingAck {
    qos: QoS,
    pkid: Option<u16>,
    tx: Option<oneshot::Sender<u16>>,
}

/// Single-slot acknowledgment tracker.
///
/// rumqttc assigns packet identifiers inside the event loop, so the publisher
/// cannot know its own pkid up front. Tracked publishes are serialized by the
/// client's publish gate; the supervisor binds the next outgoing publish pkid
/// to the armed slot and completes it when the matching PUBACK/PUBCOMP lands.
#[derive(Debug, Default)]
struct AckSlot {
    inner: std::sync::Mutex<Option<PendingAck>>,
}

impl AckSlot {
    fn arm(&self, qos: QoS) -> oneshot::Receiver<u16> {
        let (tx, rx) = oneshot::channel();
        let mut slot = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(PendingAck {
            qos,
            pkid: None,
            tx: Some(tx),
        });
        rx
    }

    fn disarm(&self) {
        let mut slot = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }

    /// Record the pkid the event loop assigned to the armed publish.
    /// pkid 0 is a QoS 0 publish and never acknowledged.
    fn bind_outgoing(&self, pkid: u16) {
        if pkid == 0 {
            return;
        }
        let mut slot = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pending) = slot.as_mut() {
            if pending.pkid.is_none() {
                pending.pkid = Some(pkid);
            }
        }
    }

    /// Complete the armed publish if the ack matches its pkid and QoS level.
    fn complete(&self, pkid: u16, kind: AckKind) {
        let mut slot = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let matched = match slot.as_ref() {
            Some(pending) => {
                pending.pkid == Some(pkid)
                    && matches!(
                        (pending.qos, kind),
                        (QoS::AtLeastOnce, AckKind::Ack) | (QoS::ExactlyOnce, AckKind::Comp)
                    )
            }
            None => false,
        };
        if matched {
            if let Some(pending) = slot.take() {
                if let Some(tx) = pending.tx {
                    let _ = tx.send(pkid);
                }
            }
        }
    }
}

/// State shared between the client and its supervisor task.
#[derive(Debug)]
struct SessionShared {
    state_tx: watch::Sender<ConnectionState>,
    cache: Arc<MessageCache>,
    acks: AckSlot,
    reconnects: AtomicU32,
    broker_url: String,
}

/// MQTT client for the Unified Namespace.
pub struct UnsClient {
    config: MqttSection,
    client_id: String,
    client: AsyncClient,
    event_loop: Mutex<Option<EventLoop>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    state_rx: watch::Receiver<ConnectionState>,
    shared: Arc<SessionShared>,
    /// Serializes discovery sweeps and single-topic reads so two concurrent
    /// calls can never interleave their clear/collect steps.
    sweep: Mutex<()>,
    /// Serializes acknowledgment-tracked publishes (one armed slot at a time)
    publish_gate: Mutex<()>,
}

impl UnsClient {
    pub fn new(config: MqttSection) -> BridgeResult<Self> {
        let client_id = generate_client_id(&config.client_id_base);
        let mqtt_options = configure_mqtt_options(&client_id, &config)?;
        let (client, event_loop) = AsyncClient::new(mqtt_options, 10);

        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let shared = Arc::new(SessionShared {
            state_tx,
            cache: Arc::new(MessageCache::new()),
            acks: AckSlot::default(),
            reconnects: AtomicU32::new(0),
            broker_url: config.broker_url.clone(),
        });

        Ok(Self {
            config,
            client_id,
            client,
            event_loop: Mutex::new(Some(event_loop)),
            supervisor: Mutex::new(None),
            shutdown_tx,
            shutdown_rx,
            state_rx,
            shared,
            sweep: Mutex::new(()),
            publish_gate: Mutex::new(()),
        })
    }

    /// The per-process session identifier presented to the broker.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state().is_connected()
    }

    fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.config.connect_timeout_secs)
    }

    /// Open the broker session: spawn the supervisor that drives the network
    /// event loop, then wait (bounded) for the connect acknowledgment. If the
    /// supervisor is already running, just wait for the session to recover.
    pub async fn connect(&self) -> BridgeResult<()> {
        let event_loop = self.event_loop.lock().await.take();

        if let Some(event_loop) = event_loop {
            info!(
                broker = %self.shared.broker_url,
                client_id = %self.client_id,
                "Connecting to MQTT broker"
            );
            let _ = self.shared.state_tx.send(ConnectionState::Connecting);

            let shared = self.shared.clone();
            let shutdown_rx = self.shutdown_rx.clone();
            let handle = tokio::spawn(run_session(event_loop, shared, shutdown_rx));
            *self.supervisor.lock().await = Some(handle);
        }

        wait_for_connected(self.state_rx.clone(), self.connect_timeout()).await
    }

    /// No-op when connected; otherwise connect (or wait for the reconnect
    /// loop to recover the session).
    pub async fn ensure_connected(&self) -> BridgeResult<()> {
        if self.is_connected() {
            return Ok(());
        }
        self.connect().await
    }

    /// Stop the supervisor and close the session. Idempotent.
    pub async fn disconnect(&self) -> BridgeResult<()> {
        let _ = self.shutdown_tx.send(true);

        if let Err(e) = self.client.disconnect().await {
            debug!("MQTT disconnect request not delivered: {e}");
        }

        if let Some(handle) = self.supervisor.lock().await.take() {
            match tokio::time::timeout(Duration::from_secs(2), handle).await {
                Ok(Ok(())) => debug!("Session supervisor shut down gracefully"),
                Ok(Err(e)) if !e.is_cancelled() => {
                    warn!("Session supervisor ended with error: {e}");
                }
                Err(_) => warn!("Session supervisor did not stop within grace period"),
                _ => {}
            }
        }

        let _ = self.shared.state_tx.send(ConnectionState::Disconnected);
        info!("{}", DisconnectCause::Requested.describe());
        Ok(())
    }

    /// Discover topics: clear the cache, subscribe to `pattern` at QoS 1,
    /// passively collect retained and live messages for exactly `dwell`,
    /// unsubscribe, and return a copy of what arrived.
    pub async fn discover(
        &self,
        pattern: &str,
        dwell: Duration,
    ) -> BridgeResult<HashMap<String, MessageSnapshot>> {
        self.ensure_connected().await?;

        let _sweep = self.sweep.lock().await;
        self.shared.cache.clear_all();

        self.client
            .subscribe(pattern, QoS::AtLeastOnce)
            .await
            .map_err(|e| BridgeError::subscribe(format!("Failed to subscribe to {pattern}: {e}")))?;

        info!(
            pattern = %pattern,
            dwell_secs = dwell.as_secs_f64(),
            "Subscribed, collecting messages"
        );

        // Fixed dwell: the collection window never exits early
        tokio::time::sleep(dwell).await;

        if let Err(e) = self.client.unsubscribe(pattern).await {
            warn!("Failed to unsubscribe from {pattern}: {e}");
        }

        Ok(self.shared.cache.snapshot())
    }

    /// Fresh read of a single topic. Any stale cache entry is dropped first
    /// so only messages arriving after the call are observed; the retained
    /// message (if any) is re-delivered by the subscribe.
    pub async fn read_topic(
        &self,
        topic: &str,
        timeout: Duration,
    ) -> BridgeResult<Option<MessageSnapshot>> {
        self.ensure_connected().await?;

        let _sweep = self.sweep.lock().await;
        self.shared.cache.clear_topic(topic);

        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| BridgeError::subscribe(format!("Failed to subscribe to {topic}: {e}")))?;

        info!(topic = %topic, "Subscribed, waiting for message");

        let result = self.shared.cache.wait_for(topic, timeout).await;

        if let Err(e) = self.client.unsubscribe(topic).await {
            warn!("Failed to unsubscribe from {topic}: {e}");
        }

        Ok(result)
    }

    /// Validate and publish one message. QoS 0 returns right after hand-off;
    /// QoS 1/2 wait (bounded) for the broker's PUBACK/PUBCOMP.
    pub async fn publish_message(
        &self,
        topic: &str,
        payload: &str,
        retain: bool,
        qos: u8,
    ) -> BridgeResult<PublishReceipt> {
        let qos_level = validate_publish(topic, qos)?;

        // Audit trail: every attempt against a writable namespace is logged,
        // whether or not the session turns out to be usable
        info!(
            topic = %topic,
            payload = %truncate_for_log(payload),
            retain = retain,
            qos = qos,
            "Publishing message"
        );

        self.ensure_connected().await?;

        if qos_level == QoS::AtMostOnce {
            return match self
                .client
                .publish_with_properties(
                    topic,
                    qos_level,
                    retain,
                    payload.to_string(),
                    PublishProperties::default(),
                )
                .await
            {
                Ok(()) => Ok(PublishReceipt::delivered(topic, payload, retain, qos, None)),
                Err(e) => Ok(PublishReceipt::failed(
                    topic,
                    format!("Publish failed: {e}"),
                    Some("client_error"),
                )),
            };
        }

        let _gate = self.publish_gate.lock().await;
        let ack_rx = self.shared.acks.arm(qos_level);

        if let Err(e) = self
            .client
            .publish_with_properties(
                topic,
                qos_level,
                retain,
                payload.to_string(),
                PublishProperties::default(),
            )
            .await
        {
            self.shared.acks.disarm();
            return Ok(PublishReceipt::failed(
                topic,
                format!("Publish failed: {e}"),
                Some("client_error"),
            ));
        }

        let ack_timeout = Duration::from_secs(self.config.ack_timeout_secs);
        match tokio::time::timeout(ack_timeout, ack_rx).await {
            Ok(Ok(pkid)) => {
                info!(topic = %topic, message_id = pkid, "Publish acknowledged");
                Ok(PublishReceipt::delivered(
                    topic,
                    payload,
                    retain,
                    qos,
                    Some(pkid),
                ))
            }
            Ok(Err(_)) => {
                self.shared.acks.disarm();
                Ok(PublishReceipt::failed(
                    topic,
                    "Acknowledgment channel closed",
                    Some("internal"),
                ))
            }
            Err(_) => {
                self.shared.acks.disarm();
                warn!(topic = %topic, "No acknowledgment from broker within {}s", ack_timeout.as_secs());
                Ok(PublishReceipt::failed(
                    topic,
                    format!(
                        "No acknowledgment from broker within {} seconds",
                        ack_timeout.as_secs()
                    ),
                    Some("ack_timeout"),
                ))
            }
        }
    }
}

#[async_trait::async_trait]
impl super::Broker for UnsClient {
    async fn ensure_connected(&self) -> BridgeResult<()> {
        UnsClient::ensure_connected(self).await
    }

    async fn discover(
        &self,
        pattern: &str,
        dwell: Duration,
    ) -> BridgeResult<HashMap<String, MessageSnapshot>> {
        UnsClient::discover(self, pattern, dwell).await
    }

    async fn read_topic(
        &self,
        topic: &str,
        timeout: Duration,
    ) -> BridgeResult<Option<MessageSnapshot>> {
        UnsClient::read_topic(self, topic, timeout).await
    }

    async fn publish_message(
        &self,
        topic: &str,
        payload: &str,
        retain: bool,
        qos: u8,
    ) -> BridgeResult<PublishReceipt> {
        UnsClient::publish_message(self, topic, payload, retain, qos).await
    }

    fn connection_state(&self) -> ConnectionState {
        UnsClient::connection_state(self)
    }
}

impl Drop for UnsClient {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Ok(mut guard) = self.supervisor.try_lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
        // Graceful teardown needs disconnect(); this only stops the task
    }
}

/// Validate publish arguments before any broker interaction.
pub(crate) fn validate_publish(topic: &str, qos: u8) -> BridgeResult<QoS> {
    let qos_level = match qos {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        other => {
            return Err(BridgeError::validation(format!(
                "Invalid QoS level: {other}. Must be 0, 1, or 2."
            )))
        }
    };

    if topic.trim().is_empty() {
        return Err(BridgeError::validation("Topic cannot be empty"));
    }
    if topic.contains('#') || topic.contains('+') {
        return Err(BridgeError::validation(
            "Cannot publish to wildcard topics (# or +)",
        ));
    }

    Ok(qos_level)
}

fn qos_to_u8(qos: QoS) -> u8 {
    match qos {
        QoS::AtMostOnce => 0,
        QoS::AtLeastOnce => 1,
        QoS::ExactlyOnce => 2,
    }
}

fn truncate_for_log(payload: &str) -> String {
    if payload.chars().count() > 100 {
        let prefix: String = payload.chars().take(100).collect();
        format!("{prefix}...")
    } else {
        payload.to_string()
    }
}

/// Wait until the state channel reports `Connected`, bounded by `timeout`.
async fn wait_for_connected(
    mut state_rx: watch::Receiver<ConnectionState>,
    timeout: Duration,
) -> BridgeResult<()> {
    if state_rx.borrow().is_connected() {
        return Ok(());
    }

    let wait = tokio::time::timeout(timeout, async {
        loop {
            if state_rx.changed().await.is_err() {
                return Err(BridgeError::connection("Connection state channel closed"));
            }
            if state_rx.borrow().is_connected() {
                return Ok(());
            }
        }
    })
    .await;

    match wait {
        Ok(result) => result,
        Err(_) => Err(BridgeError::connection(
            "Not connected to MQTT broker (no connect acknowledgment within timeout)",
        )),
    }
}

/// Supervisor: drives the network event loop for the life of the session.
///
/// Poll errors mark the session disconnected and back off exponentially
/// (bounded) before polling again; rumqttc re-establishes the connection on
/// the next poll, so the backoff is the whole reconnection policy.
async fn run_session(
    mut event_loop: EventLoop,
    shared: Arc<SessionShared>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let backoff = ReconnectConfig::default();

    loop {
        if *shutdown_rx.borrow() {
            break;
        }
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("Shutdown signal received, stopping session supervisor");
                    break;
                }
            }
            event = event_loop.poll() => {
                match event {
                    Ok(event) => handle_event(event, &shared),
                    Err(e) => {
                        let attempt = shared.reconnects.fetch_add(1, Ordering::SeqCst) + 1;
                        let cause = DisconnectCause::Network(e.to_string());
                        if cause.is_expected() {
                            info!("Disconnected from MQTT broker: {}", cause.describe());
                        } else {
                            warn!(
                                attempt = attempt,
                                "Disconnected from MQTT broker: {} (will auto-reconnect)",
                                cause.describe()
                            );
                        }
                        let _ = shared.state_tx.send(ConnectionState::Disconnected);

                        let delay = backoff.delay_for_attempt(attempt);
                        if !interruptible_sleep(shutdown_rx.clone(), delay).await {
                            break;
                        }
                        let _ = shared.state_tx.send(ConnectionState::Reconnecting(attempt));
                    }
                }
            }
        }
    }

    let _ = shared.state_tx.send(ConnectionState::Disconnected);
    info!("MQTT session supervisor stopped");
}

fn handle_event(event: Event, shared: &SessionShared) {
    match event {
        Event::Incoming(Packet::ConnAck(ack)) => {
            if ack.code != ConnectReturnCode::Success {
                let code = ack.code as u8;
                warn!(code = code, "Broker refused connection: {}", reason_string(code));
                return;
            }
            let prior = shared.reconnects.swap(0, Ordering::SeqCst);
            if prior > 0 {
                info!(
                    attempt = prior,
                    "Reconnected to MQTT broker at {}", shared.broker_url
                );
            } else {
                info!("Connected to MQTT broker at {}", shared.broker_url);
            }
            let _ = shared.state_tx.send(ConnectionState::Connected);
        }
        Event::Incoming(Packet::Publish(publish)) => {
            let topic = String::from_utf8_lossy(&publish.topic).to_string();
            let payload = String::from_utf8_lossy(&publish.payload).to_string();
            debug!(topic = %topic, payload = %truncate_for_log(&payload), "Received message");
            shared.cache.write(MessageSnapshot::new(
                topic,
                payload,
                qos_to_u8(publish.qos),
                publish.retain,
            ));
        }
        Event::Incoming(Packet::PubAck(puback)) => {
            shared.acks.complete(puback.pkid, AckKind::Ack);
        }
        Event::Incoming(Packet::PubComp(pubcomp)) => {
            shared.acks.complete(pubcomp.pkid, AckKind::Comp);
        }
        Event::Incoming(Packet::SubAck(suback)) => {
            debug!(pkid = suback.pkid, "Subscription confirmed");
        }
        Event::Incoming(Packet::Disconnect(disconnect)) => {
            // Broker-initiated DISCONNECT; the following poll error drives
            // the reconnect path
            let cause = DisconnectCause::Broker(disconnect.reason_code as u8);
            if cause.is_expected() {
                info!("Broker sent DISCONNECT: {}", cause.describe());
            } else {
                warn!("Broker sent DISCONNECT: {}", cause.describe());
            }
            let _ = shared.state_tx.send(ConnectionState::Disconnected);
        }
        Event::Incoming(other) => {
            debug!("MQTT event: {other:?}");
        }
        Event::Outgoing(Outgoing::Publish(pkid)) => {
            shared.acks.bind_outgoing(pkid);
        }
        Event::Outgoing(_) => {}
    }
}

/// Sleep that ends early (returning false) when shutdown is signaled.
async fn interruptible_sleep(mut shutdown_rx: watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        _ = shutdown_rx.changed() => {
            if *shutdown_rx.borrow() {
                info!("Shutdown signal received during reconnect delay");
                return false;
            }
            true
        }
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn test_config() -> MqttSection {
        MqttSection {
            broker_url: "mqtt://localhost:1883".to_string(),
            connect_timeout_secs: 1,
            ..MqttSection::default()
        }
    }

    #[test]
    fn test_validate_publish_accepts_plain_topics() {
        assert_eq!(validate_publish("a/b", 0).unwrap(), QoS::AtMostOnce);
        assert_eq!(validate_publish("a/b", 1).unwrap(), QoS::AtLeastOnce);
        assert_eq!(validate_publish("a/b", 2).unwrap(), QoS::ExactlyOnce);
    }

    #[test]
    fn test_validate_publish_rejects_bad_qos() {
        let err = validate_publish("a/b", 5).unwrap_err();
        assert!(matches!(err, BridgeError::Validation { .. }));
        assert!(err.to_string().contains("Invalid QoS level: 5"));
    }

    #[test]
    fn test_validate_publish_rejects_wildcards() {
        for topic in ["sensors/#", "sensors/+/temp", "#", "+"] {
            let err = validate_publish(topic, 1).unwrap_err();
            assert!(matches!(err, BridgeError::Validation { .. }), "{topic}");
            assert!(err.to_string().contains("wildcard"));
        }
    }

    #[test]
    fn test_validate_publish_rejects_empty_topic() {
        for topic in ["", "   "] {
            let err = validate_publish(topic, 1).unwrap_err();
            assert!(matches!(err, BridgeError::Validation { .. }));
        }
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short"), "short");
        let long = "x".repeat(150);
        let truncated = truncate_for_log(&long);
        assert_eq!(truncated.len(), 103);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn test_ack_slot_completes_on_matching_puback() {
        let slot = AckSlot::default();
        let mut rx = slot.arm(QoS::AtLeastOnce);

        slot.bind_outgoing(7);
        slot.complete(7, AckKind::Ack);

        assert_eq!(rx.try_recv().unwrap(), 7);
    }

    #[test]
    fn test_ack_slot_qos2_waits_for_pubcomp() {
        let slot = AckSlot::default();
        let mut rx = slot.arm(QoS::ExactlyOnce);

        slot.bind_outgoing(9);
        // PUBACK must not complete a QoS 2 publish
        slot.complete(9, AckKind::Ack);
        assert!(rx.try_recv().is_err());

        slot.complete(9, AckKind::Comp);
        assert_eq!(rx.try_recv().unwrap(), 9);
    }

    #[test]
    fn test_ack_slot_ignores_other_pkids_and_qos0() {
        let slot = AckSlot::default();
        let mut rx = slot.arm(QoS::AtLeastOnce);

        // QoS 0 publishes carry pkid 0 and must not bind the slot
        slot.bind_outgoing(0);
        slot.bind_outgoing(3);
        slot.complete(4, AckKind::Ack);
        assert!(rx.try_recv().is_err());

        slot.complete(3, AckKind::Ack);
        assert_eq!(rx.try_recv().unwrap(), 3);
    }

    #[test]
    fn test_publish_receipt_serialization() {
        let ok = PublishReceipt::delivered("a/b", "v", false, 1, Some(42));
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message_id"], 42);
        assert!(json.get("error").is_none());

        let failed = PublishReceipt::failed("a/b", "broker unavailable", Some("ack_timeout"));
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error_code"], "ack_timeout");
        assert!(json.get("payload").is_none());
    }

    #[tokio::test]
    async fn test_new_client_starts_disconnected() {
        let client = UnsClient::new(test_config()).unwrap();
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_client_id_carries_base_and_suffix() {
        let client = UnsClient::new(test_config()).unwrap();
        assert!(client.client_id().starts_with("uns-bridge-"));

        let other = UnsClient::new(test_config()).unwrap();
        assert_ne!(client.client_id(), other.client_id());
    }

    #[tokio::test]
    async fn test_publish_validation_precedes_connection() {
        // Broker is unreachable, but validation must fail first and fast
        let client = UnsClient::new(test_config()).unwrap();

        let err = client
            .publish_message("sensors/#", "x", false, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Validation { .. }));

        let err = client.publish_message("a/b", "v", false, 5).await.unwrap_err();
        assert!(matches!(err, BridgeError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_wait_for_connected_success() {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = state_tx.send(ConnectionState::Connected);
        });

        let result = wait_for_connected(state_rx, Duration::from_millis(200)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_wait_for_connected_timeout() {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        // Keep the sender alive so the channel does not close early
        let _keepalive = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            drop(state_tx);
        });

        let result = wait_for_connected(state_rx, Duration::from_millis(20)).await;
        let err = result.unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn test_interruptible_sleep_completes() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        assert!(interruptible_sleep(shutdown_rx, Duration::from_millis(5)).await);
    }

    #[tokio::test]
    async fn test_interruptible_sleep_interrupted() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let _ = shutdown_tx.send(true);
        });

        assert!(!interruptible_sleep(shutdown_rx, Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_concurrent_sweeps_serialize() {
        // Two sweeps sharing the client's lock: the second clear must not
        // land in the middle of the first collection window
        let client = Arc::new(UnsClient::new(test_config()).unwrap());
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for label in ["first", "second"] {
            let client = client.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let _sweep = client.sweep.lock().await;
                order.lock().unwrap().push(format!("{label}:clear"));
                client.shared.cache.clear_all();
                client
                    .shared
                    .cache
                    .write(MessageSnapshot::new(format!("{label}/marker"), "1", 1, true));
                tokio::time::sleep(Duration::from_millis(30)).await;
                // The marker written at the start of this sweep must survive
                // its whole collection window
                assert!(client.shared.cache.get(&format!("{label}/marker")).is_some());
                order.lock().unwrap().push(format!("{label}:done"));
            }));
        }
        for result in futures::future::join_all(handles).await {
            result.unwrap();
        }

        let order = order.lock().unwrap().clone();
        // Whichever sweep started first must finish before the other starts
        let first_done = order.iter().position(|s| s.ends_with(":done")).unwrap();
        assert_eq!(first_done, 1, "sweep phases interleaved: {order:?}");
    }

    #[tokio::test]
    async fn test_disconnect_without_connection_is_idempotent() {
        let client = UnsClient::new(test_config()).unwrap();
        assert!(client.disconnect().await.is_ok());
        assert!(client.disconnect().await.is_ok());
    }
}
