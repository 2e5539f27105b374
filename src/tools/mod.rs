//! Tool surface for the UNS bridge
//!
//! Four tools over the broker backend: discover topics, read one topic,
//! search topics, publish a message. Each tool carries a JSON-schema
//! description for the external tool-calling collaborator, and dispatch
//! resolves every failure class to text - nothing propagates past this
//! boundary, so the caller always receives a response.

pub mod render;

use crate::broker::Broker;
use crate::error::BridgeError;
use crate::matcher;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// Tool description handed to the external collaborator: a name, a prose
/// description, and a JSON-schema parameters document.
#[derive(Debug, Clone)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Arguments for `list_uns_topics`.
#[derive(Debug, Deserialize)]
struct ListTopicsArgs {
    #[serde(default = "default_base_path")]
    base_path: String,
    #[serde(default = "default_discover_timeout")]
    timeout: f64,
}

/// Arguments for `get_topic_value`.
#[derive(Debug, Deserialize)]
struct GetTopicArgs {
    topic: String,
    #[serde(default = "default_read_timeout")]
    timeout: f64,
}

/// Arguments for `search_topics`.
#[derive(Debug, Deserialize)]
struct SearchTopicsArgs {
    pattern: String,
    #[serde(default = "default_discover_timeout")]
    timeout: f64,
}

/// Arguments for `publish_message`.
#[derive(Debug, Deserialize)]
struct PublishArgs {
    topic: String,
    payload: String,
    #[serde(default)]
    retain: bool,
    #[serde(default = "default_qos")]
    qos: u8,
}

fn default_base_path() -> String {
    "#".to_string()
}

fn default_discover_timeout() -> f64 {
    3.0
}

fn default_read_timeout() -> f64 {
    5.0
}

fn default_qos() -> u8 {
    1
}

/// The bridge's tool set over a broker backend.
pub struct UnsToolset<B: Broker> {
    broker: Arc<B>,
}

impl<B: Broker> UnsToolset<B> {
    pub fn new(broker: Arc<B>) -> Self {
        Self { broker }
    }

    /// Descriptions of all four tools.
    pub fn descriptions(&self) -> Vec<ToolDescription> {
        vec![
            ToolDescription {
                name: "list_uns_topics".to_string(),
                description: "Discover available topics in the UNS (Unified Namespace) by \
                              subscribing to a wildcard pattern and collecting messages for a \
                              brief period. Use this to explore what data is available in the \
                              MQTT broker. Returns a list of topic paths with their current values."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "base_path": {
                            "type": "string",
                            "description": "MQTT wildcard pattern to subscribe to. Use '#' for all topics, or a specific path like 'flexpack/#' for a subtree. Default is '#' (all topics).",
                            "default": "#"
                        },
                        "timeout": {
                            "type": "number",
                            "description": "How long to collect messages in seconds. Longer timeout = more topics discovered. Default is 3 seconds.",
                            "default": 3
                        }
                    },
                    "required": []
                }),
            },
            ToolDescription {
                name: "get_topic_value".to_string(),
                description: "Read the current retained value from a specific MQTT topic. Use \
                              this when you know the exact topic path and want to read its \
                              current value. Example topic: 'flexpack/packaging/line1/filler/speed'"
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "topic": {
                            "type": "string",
                            "description": "Full topic path to read, e.g., 'flexpack/packaging/line1/filler/speed'"
                        },
                        "timeout": {
                            "type": "number",
                            "description": "How long to wait for a message in seconds. Default is 5 seconds.",
                            "default": 5
                        }
                    },
                    "required": ["topic"]
                }),
            },
            ToolDescription {
                name: "search_topics".to_string(),
                description: "Find topics matching a pattern or keyword. Use this when you want \
                              to find topics by name without knowing the exact path. Supports \
                              glob patterns (*, ?) and simple keyword search."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "pattern": {
                            "type": "string",
                            "description": "Search pattern or keyword. Can be: 1) A simple keyword to search in topic names (e.g., 'temperature'), 2) A glob pattern with wildcards (e.g., '*speed*', 'line1/*'), 3) An MQTT wildcard pattern (e.g., 'flexpack/+/line1/#')"
                        },
                        "timeout": {
                            "type": "number",
                            "description": "How long to collect topics before searching in seconds. Default is 3 seconds.",
                            "default": 3
                        }
                    },
                    "required": ["pattern"]
                }),
            },
            ToolDescription {
                name: "publish_message".to_string(),
                description: "Publish a message to a specific MQTT topic in the UNS. Use this to \
                              write data back to the Unified Namespace. Example: publish 'hello' \
                              to 'flexpack/test/greeting'. WARNING: This writes to the live MQTT \
                              broker - use with caution."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "topic": {
                            "type": "string",
                            "description": "Full topic path to publish to, e.g., 'flexpack/test/greeting'. Cannot contain wildcards (# or +)."
                        },
                        "payload": {
                            "type": "string",
                            "description": "The message payload to publish. Can be any string value, including JSON-formatted data."
                        },
                        "retain": {
                            "type": "boolean",
                            "description": "Whether to retain the message on the broker. Retained messages are stored and sent to new subscribers. Default is false.",
                            "default": false
                        },
                        "qos": {
                            "type": "integer",
                            "description": "Quality of Service level: 0 (at most once), 1 (at least once), or 2 (exactly once). Default is 1.",
                            "default": 1,
                            "enum": [0, 1, 2]
                        }
                    },
                    "required": ["topic", "payload"]
                }),
            },
        ]
    }

    /// Dispatch a tool call. Always returns text; every failure class is
    /// resolved here.
    pub async fn dispatch(&self, name: &str, arguments: &Value) -> String {
        match name {
            "list_uns_topics" => self.list_uns_topics(arguments).await,
            "get_topic_value" => self.get_topic_value(arguments).await,
            "search_topics" => self.search_topics(arguments).await,
            "publish_message" => self.publish_message(arguments).await,
            other => format!("Unknown tool: {other}"),
        }
    }

    async fn list_uns_topics(&self, arguments: &Value) -> String {
        let args: ListTopicsArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(text) => return text,
        };
        let dwell = match sanitize_timeout(args.timeout) {
            Ok(dwell) => dwell,
            Err(text) => return text,
        };

        match self.broker.discover(&args.base_path, dwell).await {
            Ok(topics) => render::discovery_listing(&topics, &args.base_path, args.timeout),
            Err(e) if e.is_connection() => e.to_string(),
            Err(e) => {
                error!("Error discovering topics: {e}");
                format!("Error discovering topics: {e}")
            }
        }
    }

    async fn get_topic_value(&self, arguments: &Value) -> String {
        let args: GetTopicArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(text) => return text,
        };
        if args.topic.is_empty() {
            return "Error: 'topic' parameter is required".to_string();
        }
        let timeout = match sanitize_timeout(args.timeout) {
            Ok(timeout) => timeout,
            Err(text) => return text,
        };

        match self.broker.read_topic(&args.topic, timeout).await {
            Ok(Some(snapshot)) => render::topic_value(&snapshot),
            Ok(None) => render::topic_not_found(&args.topic, args.timeout),
            Err(e) if e.is_connection() => e.to_string(),
            Err(e) => {
                error!("Error reading topic: {e}");
                format!("Error reading topic: {e}")
            }
        }
    }

    async fn search_topics(&self, arguments: &Value) -> String {
        let args: SearchTopicsArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(text) => return text,
        };
        if args.pattern.is_empty() {
            return "Error: 'pattern' parameter is required".to_string();
        }
        let dwell = match sanitize_timeout(args.timeout) {
            Ok(dwell) => dwell,
            Err(text) => return text,
        };

        // Collect the whole namespace, then filter by the pattern's tier
        let all_topics = match self.broker.discover("#", dwell).await {
            Ok(topics) => topics,
            Err(e) if e.is_connection() => return e.to_string(),
            Err(e) => {
                error!("Error searching topics: {e}");
                return format!("Error searching topics: {e}");
            }
        };

        if all_topics.is_empty() {
            return "No topics discovered to search through. \
                    The broker may have no retained messages."
                .to_string();
        }

        let matching = matcher::filter_topics(&all_topics, &args.pattern);
        render::search_listing(&matching, all_topics.len(), &args.pattern)
    }

    async fn publish_message(&self, arguments: &Value) -> String {
        let args: PublishArgs = match parse_args(arguments) {
            Ok(args) => args,
            Err(text) => return text,
        };
        if args.topic.is_empty() {
            return "Error: 'topic' parameter is required".to_string();
        }

        match self
            .broker
            .publish_message(&args.topic, &args.payload, args.retain, args.qos)
            .await
        {
            Ok(receipt) => render::publish_outcome(&receipt),
            Err(BridgeError::Validation { message }) => format!("Validation error: {message}"),
            Err(e) if e.is_connection() => e.to_string(),
            Err(e) => {
                error!("Error publishing message: {e}");
                format!("Error publishing message: {e}")
            }
        }
    }
}

/// Deserialize typed arguments, turning serde failures into the caller-facing
/// missing/invalid-parameter message.
fn parse_args<'a, T: Deserialize<'a>>(arguments: &'a Value) -> Result<T, String> {
    T::deserialize(arguments).map_err(|e| format!("Error: invalid arguments: {e}"))
}

/// Longest wait any single tool call may request, in seconds.
const MAX_TIMEOUT_SECS: f64 = 3600.0;

/// Timeouts come in as JSON numbers; reject the values `Duration` cannot hold.
fn sanitize_timeout(timeout: f64) -> Result<Duration, String> {
    if !timeout.is_finite() || timeout < 0.0 {
        return Err(format!(
            "Error: invalid arguments: timeout must be a non-negative number, got {timeout}"
        ));
    }
    if timeout > MAX_TIMEOUT_SECS {
        return Err(format!(
            "Error: invalid arguments: timeout must be at most {MAX_TIMEOUT_SECS} seconds, got {timeout}"
        ));
    }
    Ok(Duration::from_secs_f64(timeout))
}
