//! Text rendering for tool results
//!
//! The external tool-calling collaborator shows these strings verbatim, so
//! the formats here are the operation surface's contract: sorted topic
//! listings with truncated payloads, a field-per-line view of a single
//! message, and publish banners.

use crate::broker::{MessageSnapshot, PublishReceipt};
use std::collections::HashMap;

const PAYLOAD_PREVIEW_CHARS: usize = 100;

/// Truncate long payloads for listing readability.
pub fn truncate_payload(payload: &str) -> String {
    if payload.chars().count() > PAYLOAD_PREVIEW_CHARS {
        let prefix: String = payload.chars().take(PAYLOAD_PREVIEW_CHARS).collect();
        format!("{prefix}...")
    } else {
        payload.to_string()
    }
}

/// Sorted `topic: payload` bullet lines shared by the listing renderers.
fn topic_lines(topics: &HashMap<String, MessageSnapshot>) -> Vec<String> {
    let mut sorted: Vec<_> = topics.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    sorted
        .into_iter()
        .map(|(topic, snapshot)| format!("  • {topic}: {}", truncate_payload(&snapshot.payload)))
        .collect()
}

/// Render a discovery result.
pub fn discovery_listing(
    topics: &HashMap<String, MessageSnapshot>,
    pattern: &str,
    timeout_secs: f64,
) -> String {
    if topics.is_empty() {
        return format!(
            "No topics discovered with pattern '{pattern}' within {timeout_secs} seconds. \
             The broker may have no retained messages, or the pattern may not match any topics."
        );
    }

    let mut lines = vec![format!("Discovered {} topics:\n", topics.len())];
    lines.extend(topic_lines(topics));
    lines.join("\n")
}

/// Render a search result.
pub fn search_listing(
    matching: &HashMap<String, MessageSnapshot>,
    searched: usize,
    pattern: &str,
) -> String {
    if matching.is_empty() {
        return format!(
            "No topics found matching pattern '{pattern}'. \
             Searched through {searched} available topics."
        );
    }

    let mut lines = vec![format!(
        "Found {} topics matching '{pattern}':\n",
        matching.len()
    )];
    lines.extend(topic_lines(matching));
    lines.join("\n")
}

/// Render a single-topic read result.
pub fn topic_value(snapshot: &MessageSnapshot) -> String {
    [
        format!("Topic: {}", snapshot.topic),
        format!("Value: {}", snapshot.payload),
        format!("QoS: {}", snapshot.qos),
        format!("Retained: {}", snapshot.retain),
        format!(
            "Received at: {}",
            snapshot.received_at.format("%Y-%m-%d %H:%M:%S")
        ),
    ]
    .join("\n")
}

/// Explanation for a read that saw nothing within its window.
pub fn topic_not_found(topic: &str, timeout_secs: f64) -> String {
    format!(
        "No message received on topic '{topic}' within {timeout_secs} seconds. \
         The topic may not exist or have no retained message."
    )
}

/// Render a publish outcome.
pub fn publish_outcome(receipt: &PublishReceipt) -> String {
    if receipt.success {
        [
            "✓ Message published successfully!".to_string(),
            String::new(),
            format!("Topic: {}", receipt.topic),
            format!("Payload: {}", receipt.payload.as_deref().unwrap_or("")),
            format!("Retain: {}", receipt.retain.unwrap_or(false)),
            format!("QoS: {}", receipt.qos.unwrap_or(0)),
            format!(
                "Message ID: {}",
                receipt
                    .message_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "n/a".to_string())
            ),
            format!(
                "Timestamp: {}",
                receipt.timestamp.format("%Y-%m-%d %H:%M:%S")
            ),
        ]
        .join("\n")
    } else {
        format!(
            "✗ Publish failed: {}",
            receipt.error.as_deref().unwrap_or("Unknown error")
        )
    }
}
