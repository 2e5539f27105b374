//! UNS Bridge - MQTT Unified Namespace access for tool-calling clients
//!
//! This crate connects to an MQTT broker that carries a Unified Namespace of
//! hierarchical topics and exposes four operations to an external
//! tool-calling collaborator:
//!
//! - discover topics via a time-boxed wildcard subscription
//! - read the current value of a single topic
//! - search discovered topics by wildcard, glob or keyword pattern
//! - publish a validated message, waiting for broker acknowledgment
//!
//! # Quick Start
//!
//! ```no_run
//! use uns_bridge::broker::UnsClient;
//! use uns_bridge::config::BridgeConfig;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), uns_bridge::BridgeError> {
//! let config = BridgeConfig::from_env();
//! let client = UnsClient::new(config.mqtt)?;
//! client.connect().await?;
//!
//! let topics = client.discover("factory/#", Duration::from_secs(3)).await?;
//! for (topic, snapshot) in &topics {
//!     println!("{topic}: {}", snapshot.payload);
//! }
//!
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod broker;
pub mod config;
pub mod error;
pub mod matcher;
pub mod observability;
pub mod server;
pub mod testing;
pub mod tools;

pub use broker::{Broker, ConnectionState, MessageSnapshot, PublishReceipt, UnsClient};
pub use config::BridgeConfig;
pub use error::{BridgeError, BridgeResult};
pub use tools::{ToolDescription, UnsToolset};
