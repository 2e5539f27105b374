//! Stdio front end
//!
//! Serves the tool surface over a line-delimited JSON protocol: the external
//! collaborator writes one request object per line on stdin and reads one
//! response object per line from stdout. Logging stays on stderr so stdout
//! carries nothing but protocol frames.
//!
//! Request:  `{"tool": "get_topic_value", "arguments": {"topic": "a/b"}}`
//! Response: `{"ok": true, "text": "Topic: a/b\n..."}`

use crate::broker::Broker;
use crate::tools::UnsToolset;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

/// One tool invocation from the external collaborator.
#[derive(Debug, Deserialize)]
pub struct ToolRequest {
    pub tool: String,
    #[serde(default = "default_arguments")]
    pub arguments: serde_json::Value,
}

fn default_arguments() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// One response frame.
#[derive(Debug, Serialize)]
pub struct ToolResponse {
    pub ok: bool,
    pub text: String,
}

/// Parse a request line. Malformed input becomes an error response rather
/// than tearing the loop down.
pub fn parse_request(line: &str) -> Result<ToolRequest, String> {
    serde_json::from_str(line).map_err(|e| format!("Error: invalid request: {e}"))
}

/// Serve tool requests from stdin until EOF or shutdown.
pub async fn run_stdio_server<B: Broker>(
    toolset: &UnsToolset<B>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> std::io::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    info!("Serving tools on stdio");

    loop {
        let line = tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("Shutdown signal received, stopping stdio server");
                    break;
                }
                continue;
            }
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            info!("stdin closed, stopping stdio server");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match parse_request(&line) {
            Ok(request) => {
                debug!(tool = %request.tool, "Dispatching tool request");
                ToolResponse {
                    ok: true,
                    text: toolset.dispatch(&request.tool, &request.arguments).await,
                }
            }
            Err(text) => ToolResponse { ok: false, text },
        };

        let mut frame = serde_json::to_vec(&response).unwrap_or_else(|_| {
            br#"{"ok":false,"text":"Error: failed to encode response"}"#.to_vec()
        });
        frame.push(b'\n');
        stdout.write_all(&frame).await?;
        stdout.flush().await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_request_minimal() {
        let request = parse_request(r#"{"tool": "list_uns_topics"}"#).unwrap();
        assert_eq!(request.tool, "list_uns_topics");
        // Missing arguments default to an empty object so all-default tools work
        assert_eq!(request.arguments, json!({}));
    }

    #[test]
    fn test_parse_request_with_arguments() {
        let request =
            parse_request(r#"{"tool": "get_topic_value", "arguments": {"topic": "a/b"}}"#).unwrap();
        assert_eq!(request.tool, "get_topic_value");
        assert_eq!(request.arguments, json!({"topic": "a/b"}));
    }

    #[test]
    fn test_parse_request_malformed() {
        let err = parse_request("not json").unwrap_err();
        assert!(err.starts_with("Error: invalid request:"));

        let err = parse_request(r#"{"arguments": {}}"#).unwrap_err();
        assert!(err.contains("tool"));
    }

    #[test]
    fn test_response_frame_shape() {
        let response = ToolResponse {
            ok: true,
            text: "Discovered 2 topics".to_string(),
        };
        let frame = serde_json::to_value(&response).unwrap();
        assert_eq!(frame, json!({"ok": true, "text": "Discovered 2 topics"}));
    }
}
