//! Broker reason-code translation
//!
//! Pure lookup from connect/disconnect reason codes to human-readable
//! strings. The table is a superset of the MQTT 3.1.1 numeric codes and the
//! v5 reason-code enumeration, so both legacy and v5 brokers decode to the
//! same stable strings.

/// Decode a numeric reason code to a human-readable string.
pub fn reason_string(code: u8) -> &'static str {
    match code {
        0 => "Normal disconnection",
        1 => "Incorrect protocol version",
        2 => "Invalid client identifier",
        3 => "Server unavailable",
        4 => "Bad username or password",
        5 => "Not authorized",
        7 => "Unexpected disconnect (no DISCONNECT packet)",
        16 => "Normal disconnection",
        128 => "Unspecified error",
        129 => "Malformed packet",
        130 => "Protocol error",
        131 => "Implementation specific error",
        132 => "Unsupported protocol version",
        133 => "Client identifier not valid",
        134 => "Bad username or password",
        135 => "Not authorized",
        136 => "Server unavailable",
        137 => "Server busy",
        138 => "Banned",
        139 => "Server shutting down",
        140 => "Bad authentication method",
        141 => "Keep alive timeout",
        // Another client connected with the same identifier
        142 => "Session taken over",
        143 => "Topic filter invalid",
        144 => "Topic name invalid",
        147 => "Receive maximum exceeded",
        148 => "Topic alias invalid",
        149 => "Packet too large",
        150 => "Message rate too high",
        151 => "Quota exceeded",
        152 => "Administrative action",
        153 => "Payload format invalid",
        154 => "Retain not supported",
        155 => "QoS not supported",
        156 => "Use another server",
        157 => "Server moved",
        158 => "Shared subscriptions not supported",
        159 => "Connection rate exceeded",
        160 => "Maximum connect time",
        161 => "Subscription identifiers not supported",
        162 => "Wildcard subscriptions not supported",
        _ => "Unknown reason code",
    }
}

/// Why the broker session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum DisconnectCause {
    /// Client-requested disconnect
    Requested,
    /// Broker sent a DISCONNECT with a reason code
    Broker(u8),
    /// Transport-level failure reported by the network loop
    Network(String),
}

impl DisconnectCause {
    /// Human-readable description of the cause.
    pub fn describe(&self) -> String {
        match self {
            Self::Requested => "Disconnect requested by client".to_string(),
            Self::Broker(code) => {
                let text = reason_string(*code);
                if text == "Unknown reason code" {
                    format!("Unknown ({code})")
                } else {
                    text.to_string()
                }
            }
            Self::Network(message) => message.clone(),
        }
    }

    /// Expected disconnects (client-requested, or broker codes 0/16) are
    /// logged at low severity; everything else is a warning because the
    /// session loop is about to start reconnecting.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::Requested | Self::Broker(0) | Self::Broker(16))
    }
}
