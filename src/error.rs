//! Error taxonomy for bridge operations
//!
//! Every public operation resolves these at its boundary: the tool dispatch
//! layer converts them to text so nothing propagates past an operation and
//! the process never dies because a single call failed.

use thiserror::Error;

/// Main error type for UNS bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Subscribe failed: {message}")]
    Subscribe { message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl BridgeError {
    /// Create a connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a subscribe error
    pub fn subscribe<S: Into<String>>(message: S) -> Self {
        Self::Subscribe {
            message: message.into(),
        }
    }

    /// True for errors caused by the broker session being unavailable.
    /// A rejected subscribe counts: the client only fails to queue a
    /// subscribe when the session is down.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Subscribe { .. })
    }
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;
