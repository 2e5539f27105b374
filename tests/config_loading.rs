//! Configuration loading from files and the environment

use std::io::Write;
use tempfile::NamedTempFile;
use uns_bridge::config::{BridgeConfig, ConfigError};

#[test]
fn load_full_config_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[mqtt]
broker_url = "mqtt://broker.plant.example:1883"
client_id_base = "plant-bridge"
username_env = "MQTT_USERNAME"
password_env = "MQTT_PASSWORD"
ack_timeout_secs = 20
"#
    )
    .unwrap();

    let config = BridgeConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.mqtt.broker_url, "mqtt://broker.plant.example:1883");
    assert_eq!(config.mqtt.client_id_base, "plant-bridge");
    assert_eq!(config.mqtt.ack_timeout_secs, 20);
    // Unspecified fields keep their defaults
    assert_eq!(config.mqtt.keep_alive_secs, 60);
    assert_eq!(config.mqtt.connect_timeout_secs, 10);
}

#[test]
fn invalid_toml_is_a_parse_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[mqtt\nbroker_url =").unwrap();

    let err = BridgeConfig::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::TomlParse(_)));
}

#[test]
fn missing_file_is_a_read_error() {
    let err =
        BridgeConfig::load_from_file(std::path::Path::new("/nonexistent/bridge.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::FileRead(_)));
}

#[test]
fn invalid_values_are_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[mqtt]\nconnect_timeout_secs = 0\n").unwrap();

    let err = BridgeConfig::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidConfig(_)));
}

#[test]
fn from_env_defaults_without_variables() {
    // The suite does not set MQTT_* variables, so defaults apply
    let config = BridgeConfig::from_env();
    assert!(config.mqtt.broker_url.starts_with("mqtt://"));
    assert_eq!(config.mqtt.connect_timeout_secs, 10);
    assert!(!config.mqtt.client_id_base.is_empty());
}
