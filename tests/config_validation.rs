//! Integration tests for configuration validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use net_dispatch::config::{
    ClientConfig, DispatchConfig, LoggingConfig, NetworkConfig, ServerConfig, TransportConfig,
};
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = NetworkConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_invalid_server_address() {
    let mut config = NetworkConfig::default();
    config.server.address = "not-an-ip".to_string();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Invalid server address")));
}

#[test]
fn test_empty_server_address() {
    let mut config = NetworkConfig::default();
    config.server.address = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_bad_service_paths() {
    for service in ["", "a/b", "has space"] {
        let config = ServerConfig {
            service: service.to_string(),
            ..Default::default()
        };
        assert!(
            config.validate().iter().any(|e| e.contains("ervice path")),
            "service {service:?} should be rejected"
        );
    }
}

#[test]
fn test_zero_max_connections() {
    let config = ServerConfig {
        max_connections: 0,
        ..Default::default()
    };
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("Max connections must be greater than 0")));
}

#[test]
fn test_timeouts_out_of_range() {
    let server = ServerConfig {
        handshake_timeout: Duration::from_millis(10),
        shutdown_timeout: Duration::from_secs(120),
        ..Default::default()
    };
    let errors = server.validate();
    assert!(errors.iter().any(|e| e.contains("Handshake timeout too short")));
    assert!(errors.iter().any(|e| e.contains("Shutdown timeout too long")));

    let client = ClientConfig {
        connection_timeout: Duration::from_millis(5),
        ..Default::default()
    };
    assert!(client
        .validate()
        .iter()
        .any(|e| e.contains("Connection timeout too short")));
}

#[test]
fn test_client_address_needs_port() {
    let client = ClientConfig {
        address: "127.0.0.1".to_string(),
        ..Default::default()
    };
    assert!(client
        .validate()
        .iter()
        .any(|e| e.contains("Invalid client address")));
}

#[test]
fn test_zero_max_pending_rejected() {
    let dispatch = DispatchConfig {
        max_pending: Some(0),
        ..Default::default()
    };
    assert_eq!(dispatch.validate().len(), 1);

    let unbounded = DispatchConfig::default();
    assert!(unbounded.validate().is_empty());
}

#[test]
fn test_frame_size_limits() {
    assert!(!TransportConfig { max_frame_size: 0 }.validate().is_empty());
    assert!(!TransportConfig { max_frame_size: 512 }.validate().is_empty());
    assert!(TransportConfig {
        max_frame_size: 64 * 1024
    }
    .validate()
    .is_empty());
}

#[test]
fn test_logging_requires_an_output() {
    let config = LoggingConfig {
        log_to_console: false,
        log_to_file: false,
        ..Default::default()
    };
    assert!(config
        .validate()
        .iter()
        .any(|e| e.contains("At least one logging output")));
}

#[test]
fn test_validate_strict_joins_errors() {
    let config = NetworkConfig::default_with_overrides(|c| {
        c.server.max_connections = 0;
        c.dispatch.max_pending = Some(0);
    });
    let err = config.validate_strict().unwrap_err().to_string();
    assert!(err.contains("Max connections"));
    assert!(err.contains("max_pending"));
}

#[test]
fn test_toml_round_trip() {
    let config = NetworkConfig::default_with_overrides(|c| {
        c.server.port = 7000;
        c.server.service = "Tracker".into();
        c.dispatch.max_pending = Some(4096);
        c.logging.log_level = Level::DEBUG;
    });
    let text = toml::to_string_pretty(&config).unwrap();
    let parsed = NetworkConfig::from_toml(&text).unwrap();

    assert_eq!(parsed.server.port, 7000);
    assert_eq!(parsed.server.service, "Tracker");
    assert_eq!(parsed.dispatch.max_pending, Some(4096));
    assert_eq!(parsed.logging.log_level, Level::DEBUG);
    assert_eq!(parsed.server.shutdown_timeout, config.server.shutdown_timeout);
}

#[test]
fn test_partial_toml_uses_defaults() {
    let parsed = NetworkConfig::from_toml(
        r#"
        [server]
        address = "127.0.0.1"
        port = 0
        service = "Echo"
        max_connections = 8
        handshake_timeout = 1000
        shutdown_timeout = 2000
        log_data = true
        "#,
    )
    .unwrap();

    assert_eq!(parsed.server.service, "Echo");
    assert!(parsed.server.log_data);
    assert_eq!(parsed.client.service, "Default");
    assert_eq!(parsed.dispatch.max_pending, None);
}

#[test]
fn test_example_config_parses() {
    let example = NetworkConfig::example_config();
    assert!(NetworkConfig::from_toml(&example).is_ok());
}

#[test]
fn test_invalid_toml_is_config_error() {
    let err = NetworkConfig::from_toml("[server]\nport = \"high\"").unwrap_err();
    assert!(err.to_string().contains("Failed to parse TOML"));
}
