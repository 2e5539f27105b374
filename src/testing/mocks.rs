//! Mock broker backend
//!
//! [`MockBroker`] serves canned topics, records publishes, and can simulate
//! a down connection or broker-side publish failures. It applies the same
//! publish validation as the real client, so validation short-circuit
//! behavior is observable through it.

use crate::broker::client::validate_publish;
use crate::broker::{Broker, ConnectionState, MessageSnapshot, PublishReceipt};
use crate::error::{BridgeError, BridgeResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One recorded publish attempt that reached the mock broker.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishRecord {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
    pub qos: u8,
}

/// In-memory stand-in for the broker connection.
#[derive(Debug, Default)]
pub struct MockBroker {
    topics: HashMap<String, MessageSnapshot>,
    connection_down: bool,
    publish_error: Option<String>,
    /// Publishes that passed validation and the connection check
    pub published: Arc<Mutex<Vec<PublishRecord>>>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a retained topic value.
    pub fn with_topic(mut self, topic: &str, payload: &str) -> Self {
        self.topics
            .insert(topic.to_string(), MessageSnapshot::new(topic, payload, 1, true));
        self
    }

    /// Every operation fails with a connection error.
    pub fn with_connection_down(mut self) -> Self {
        self.connection_down = true;
        self
    }

    /// Publishes reach the broker but come back as failure receipts.
    pub fn with_publish_failure(mut self, error: &str) -> Self {
        self.publish_error = Some(error.to_string());
        self
    }

    fn check_connection(&self) -> BridgeResult<()> {
        if self.connection_down {
            Err(BridgeError::connection("not connected to MQTT broker"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Broker for MockBroker {
    async fn ensure_connected(&self) -> BridgeResult<()> {
        self.check_connection()
    }

    async fn discover(
        &self,
        pattern: &str,
        _dwell: Duration,
    ) -> BridgeResult<HashMap<String, MessageSnapshot>> {
        self.check_connection()?;
        // `#` collects everything; narrower patterns filter like a broker
        // subscription would
        if pattern == "#" {
            return Ok(self.topics.clone());
        }
        Ok(crate::matcher::filter_topics(&self.topics, pattern))
    }

    async fn read_topic(
        &self,
        topic: &str,
        _timeout: Duration,
    ) -> BridgeResult<Option<MessageSnapshot>> {
        self.check_connection()?;
        Ok(self.topics.get(topic).cloned())
    }

    async fn publish_message(
        &self,
        topic: &str,
        payload: &str,
        retain: bool,
        qos: u8,
    ) -> BridgeResult<PublishReceipt> {
        validate_publish(topic, qos)?;
        self.check_connection()?;

        self.published.lock().unwrap().push(PublishRecord {
            topic: topic.to_string(),
            payload: payload.to_string(),
            retain,
            qos,
        });

        if let Some(error) = &self.publish_error {
            return Ok(PublishReceipt::failed(topic, error.clone(), Some("broker_error")));
        }
        Ok(PublishReceipt::delivered(topic, payload, retain, qos, Some(1)))
    }

    fn connection_state(&self) -> ConnectionState {
        if self.connection_down {
            ConnectionState::Disconnected
        } else {
            ConnectionState::Connected
        }
    }
}
