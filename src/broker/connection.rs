//! Pure connection-management pieces for the UNS client
//!
//! Connection state, reconnect backoff policy, client-identifier generation
//! and MQTT option construction live here; the network loop that consumes
//! them is in [`super::client`].

use crate::config::MqttSection;
use crate::error::BridgeError;
use rumqttc::v5::MqttOptions;
use rumqttc::Transport as RumqttcTransport;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// Connection state of the broker session.
///
/// Exactly one value at any instant; transitions are driven only by the
/// connection manager (connect, disconnect, and the session supervisor).
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// No session established
    Disconnected,
    /// Initial connection in progress
    Connecting,
    /// Session established, ready for operations
    Connected,
    /// Session lost, supervisor retrying (attempt count)
    Reconnecting(u32),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Reconnect backoff policy: exponential between a floor and a ceiling.
///
/// The bounds (1s..120s) keep reconnection storms off the broker without any
/// additional jitter logic.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    pub min_delay_secs: u64,
    pub max_delay_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: 1,
            max_delay_secs: 120,
        }
    }
}

impl ReconnectConfig {
    /// Delay before the given reconnection attempt (1-based): doubles from
    /// the floor, saturating at the ceiling.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let delay = self
            .min_delay_secs
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_secs);
        Duration::from_secs(delay)
    }
}

/// Generate the session's client identifier: the configured base plus a
/// random 8-hex-char suffix. A duplicate identifier makes the broker evict
/// the older session, and two instances sharing one identifier evict each
/// other in an endless loop, so the suffix is generated once per client.
pub fn generate_client_id(base: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{base}-{}", &suffix[..8])
}

/// Build MQTT options from the config section.
pub fn configure_mqtt_options(
    client_id: &str,
    config: &MqttSection,
) -> Result<MqttOptions, BridgeError> {
    let url = Url::parse(&config.broker_url)
        .map_err(|_| BridgeError::connection(format!("Invalid broker URL: {}", config.broker_url)))?;

    let host = url
        .host_str()
        .ok_or_else(|| BridgeError::connection(format!("Invalid broker URL: {}", config.broker_url)))?;
    let port = url
        .port()
        .unwrap_or(if url.scheme() == "mqtts" { 8883 } else { 1883 });

    let mut mqtt_options = MqttOptions::new(client_id, host, port);

    if url.scheme() == "mqtts" {
        let transport = RumqttcTransport::tls_with_default_config();
        mqtt_options.set_transport(transport);
    }

    // Credentials stay behind env indirection until connect time
    if let Some(username_env) = &config.username_env {
        if let Ok(username) = std::env::var(username_env) {
            let password = config
                .password_env
                .as_ref()
                .and_then(|env_name| std::env::var(env_name).ok())
                .unwrap_or_default();
            mqtt_options.set_credentials(&username, &password);
        }
    }

    mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    // Session state is not persisted across connections
    mqtt_options.set_clean_start(true);

    Ok(mqtt_options)
}
