//! Broker connection layer
//!
//! This module owns everything that talks MQTT: connection lifecycle and
//! reconnection, the last-value message cache, the time-boxed discovery
//! sweep, single-topic reads and validated publishing.
//!
//! The [`Broker`] trait abstracts the operation surface so the tool layer
//! can be exercised against a mock backend in tests.

use crate::error::BridgeResult;
use std::collections::HashMap;
use std::time::Duration;

pub mod cache;
pub mod client;
pub mod connection;
pub mod reason;

pub use cache::{MessageCache, MessageSnapshot};
pub use client::{PublishReceipt, UnsClient};
pub use connection::{ConnectionState, ReconnectConfig};
pub use reason::{reason_string, DisconnectCause};

/// Operation surface consumed by the tool layer.
#[async_trait::async_trait]
pub trait Broker: Send + Sync {
    /// Ensure an active broker session, connecting or waiting for the
    /// reconnect loop as needed. Every operation calls this first.
    async fn ensure_connected(&self) -> BridgeResult<()>;

    /// Run a time-boxed wildcard-subscription sweep and return the topics it
    /// collected. The dwell is a fixed window; discovery cost is always at
    /// least `dwell`.
    async fn discover(
        &self,
        pattern: &str,
        dwell: Duration,
    ) -> BridgeResult<HashMap<String, MessageSnapshot>>;

    /// Fresh read of a single topic: returns the retained message or the
    /// next live publish, or `None` if nothing arrives within `timeout`.
    async fn read_topic(
        &self,
        topic: &str,
        timeout: Duration,
    ) -> BridgeResult<Option<MessageSnapshot>>;

    /// Validate and publish one message, waiting for broker acknowledgment
    /// when `qos > 0`. Broker-reported failures come back as a receipt, not
    /// an error.
    async fn publish_message(
        &self,
        topic: &str,
        payload: &str,
        retain: bool,
        qos: u8,
    ) -> BridgeResult<PublishReceipt>;

    /// Current connection state.
    fn connection_state(&self) -> ConnectionState;
}
