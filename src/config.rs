//! Bridge configuration
//!
//! Configuration comes from a TOML file or, matching the deployment style of
//! most UNS installations, straight from environment variables. Credentials
//! are never stored in the file; the file names the environment variables
//! that hold them and they are resolved at connect time.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Top-level bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    pub mqtt: MqttSection,
}

/// MQTT broker section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Broker URL with scheme and optional port, e.g. `mqtt://localhost:1883`.
    /// `mqtts://` enables TLS.
    #[serde(default = "default_broker_url")]
    pub broker_url: String,
    /// Environment variable containing the username
    pub username_env: Option<String>,
    /// Environment variable containing the password
    pub password_env: Option<String>,
    /// Base string for the client identifier; a random 8-hex-char suffix is
    /// appended per client so concurrent instances never evict each other.
    #[serde(default = "default_client_id_base")]
    pub client_id_base: String,
    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// Bounded wait for the broker's connect acknowledgment, in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Bounded wait for publish acknowledgment at QoS > 0, in seconds
    #[serde(default = "default_ack_timeout_secs")]
    pub ack_timeout_secs: u64,
}

fn default_broker_url() -> String {
    "mqtt://localhost:1883".to_string()
}

fn default_client_id_base() -> String {
    "uns-bridge".to_string()
}

fn default_keep_alive_secs() -> u64 {
    60
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_ack_timeout_secs() -> u64 {
    10
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            broker_url: default_broker_url(),
            username_env: None,
            password_env: None,
            client_id_base: default_client_id_base(),
            keep_alive_secs: default_keep_alive_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            ack_timeout_secs: default_ack_timeout_secs(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: BridgeConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from environment variables.
    ///
    /// Recognized variables: `MQTT_BROKER` (host, default `localhost`),
    /// `MQTT_PORT` (default 1883), `MQTT_USERNAME`, `MQTT_PASSWORD`,
    /// `MQTT_CLIENT_ID` (client-id base, default `uns-bridge`). Username and
    /// password stay behind env indirection so they are read at connect time.
    pub fn from_env() -> Self {
        let host = std::env::var("MQTT_BROKER").unwrap_or_else(|_| "localhost".to_string());
        let port = std::env::var("MQTT_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(1883);

        let username_env = match std::env::var("MQTT_USERNAME") {
            Ok(v) if !v.is_empty() => Some("MQTT_USERNAME".to_string()),
            _ => None,
        };
        let password_env = match std::env::var("MQTT_PASSWORD") {
            Ok(v) if !v.is_empty() => Some("MQTT_PASSWORD".to_string()),
            _ => None,
        };

        let client_id_base =
            std::env::var("MQTT_CLIENT_ID").unwrap_or_else(|_| default_client_id_base());

        Self {
            mqtt: MqttSection {
                broker_url: format!("mqtt://{host}:{port}"),
                username_env,
                password_env,
                client_id_base,
                ..MqttSection::default()
            },
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.client_id_base.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "client_id_base must not be empty".to_string(),
            ));
        }
        if self.mqtt.connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "connect_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Helper to read an optional env-indirected variable
    fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
        env_var_name.and_then(|name| std::env::var(name).ok())
    }

    /// Get the MQTT username from its environment variable
    pub fn get_mqtt_username(&self) -> Option<String> {
        Self::get_env_var_optional(self.mqtt.username_env.as_ref())
    }

    /// Get the MQTT password from its environment variable
    pub fn get_mqtt_password(&self) -> Option<String> {
        Self::get_env_var_optional(self.mqtt.password_env.as_ref())
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttSection::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let toml_content = r#"
[mqtt]
broker_url = "mqtts://broker.plant.example:8883"
username_env = "MQTT_USERNAME"
password_env = "MQTT_PASSWORD"
client_id_base = "flexpack-bridge"
keep_alive_secs = 30
connect_timeout_secs = 5
ack_timeout_secs = 15
"#;

        let config: BridgeConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.mqtt.broker_url, "mqtts://broker.plant.example:8883");
        assert_eq!(config.mqtt.username_env.as_deref(), Some("MQTT_USERNAME"));
        assert_eq!(config.mqtt.client_id_base, "flexpack-bridge");
        assert_eq!(config.mqtt.keep_alive_secs, 30);
        assert_eq!(config.mqtt.connect_timeout_secs, 5);
        assert_eq!(config.mqtt.ack_timeout_secs, 15);
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config: BridgeConfig = toml::from_str("[mqtt]\n").unwrap();
        assert_eq!(config.mqtt.broker_url, "mqtt://localhost:1883");
        assert_eq!(config.mqtt.client_id_base, "uns-bridge");
        assert_eq!(config.mqtt.keep_alive_secs, 60);
        assert_eq!(config.mqtt.connect_timeout_secs, 10);
        assert_eq!(config.mqtt.ack_timeout_secs, 10);
        assert!(config.mqtt.username_env.is_none());
        assert!(config.mqtt.password_env.is_none());
    }

    #[test]
    fn test_empty_client_id_base_rejected() {
        let config: BridgeConfig = toml::from_str("[mqtt]\nclient_id_base = \"\"\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_connect_timeout_rejected() {
        let config: BridgeConfig =
            toml::from_str("[mqtt]\nconnect_timeout_secs = 0\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_credentials_resolve_through_env_indirection() {
        let config = BridgeConfig {
            mqtt: MqttSection {
                username_env: Some("UNS_BRIDGE_TEST_USER".to_string()),
                password_env: Some("UNS_BRIDGE_TEST_MISSING".to_string()),
                ..MqttSection::default()
            },
        };

        std::env::set_var("UNS_BRIDGE_TEST_USER", "operator");
        assert_eq!(config.get_mqtt_username().as_deref(), Some("operator"));
        std::env::remove_var("UNS_BRIDGE_TEST_USER");

        // Unset variable resolves to None rather than an error
        assert!(config.get_mqtt_password().is_none());
    }
}
