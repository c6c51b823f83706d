//! # Configuration Management
//!
//! Centralized configuration for hosts, clients and the dispatch engine.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Direct instantiation with defaults
//! - Environment overrides (`NET_DISPATCH_*`) via `from_env()`
//!
//! ## Sections
//! - `server`: bind address, port and service path of a host
//! - `client`: target address and service path of a client
//! - `dispatch`: queue bound and pool retention
//! - `transport`: frame size limit
//! - `logging`: subscriber settings for [`crate::utils::logging`]

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default host port
pub const DEFAULT_PORT: u16 = 51365;

/// Default service path segment
pub const DEFAULT_SERVICE: &str = "Default";

/// Max allowed frame size (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Prefix shared by every environment override
pub const ENV_PREFIX: &str = "NET_DISPATCH_";

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetworkConfig {
    /// Host-specific configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Client-specific configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Dispatch queue and pool configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Transport configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetworkConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Defaults overridden by `NET_DISPATCH_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Apply overrides from an arbitrary variable source. Keys are given
    /// without the `NET_DISPATCH_` prefix.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("SERVER_ADDRESS") {
            config.server.address = addr;
        }
        if let Some(port) = lookup("SERVER_PORT") {
            config.server.port = parse_var("SERVER_PORT", &port)?;
        }
        if let Some(service) = lookup("SERVICE") {
            config.server.service = service.clone();
            config.client.service = service;
        }
        if let Some(addr) = lookup("CLIENT_ADDRESS") {
            config.client.address = addr;
        }
        if let Some(timeout) = lookup("CONNECTION_TIMEOUT_MS") {
            let millis: u64 = parse_var("CONNECTION_TIMEOUT_MS", &timeout)?;
            config.client.connection_timeout = Duration::from_millis(millis);
            config.server.handshake_timeout = Duration::from_millis(millis);
        }
        if let Some(max) = lookup("MAX_PENDING") {
            config.dispatch.max_pending = Some(parse_var("MAX_PENDING", &max)?);
        }
        if let Some(log_data) = lookup("LOG_DATA") {
            let flag: bool = parse_var("LOG_DATA", &log_data)?;
            config.server.log_data = flag;
            config.client.log_data = flag;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            config.logging.log_level = level
                .parse()
                .map_err(|_| ProtocolError::ConfigError(format!("Invalid log level: {level}")))?;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.client.validate());
        errors.extend(self.dispatch.validate());
        errors.extend(self.transport.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        ProtocolError::ConfigError(format!("Invalid value for {ENV_PREFIX}{key}: '{value}'"))
    })
}

fn validate_service(service: &str, errors: &mut Vec<String>) {
    if service.is_empty() {
        errors.push("Service path cannot be empty".to_string());
    } else if service.contains('/') || service.chars().any(char::is_whitespace) {
        errors.push(format!(
            "Invalid service path: '{service}' (no slashes or whitespace)"
        ));
    }
}

/// Host-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Bind ip (e.g. "0.0.0.0")
    pub address: String,

    /// Listen port. `0` picks a free port.
    pub port: u16,

    /// Service path clients must request
    pub service: String,

    /// Maximum number of concurrent sessions
    pub max_connections: usize,

    /// Time a new connection gets to send its service path
    #[serde(with = "duration_serde")]
    pub handshake_timeout: Duration,

    /// Timeout for graceful host shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// Trace every frame in and out
    pub log_data: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::from("0.0.0.0"),
            port: DEFAULT_PORT,
            service: String::from(DEFAULT_SERVICE),
            max_connections: 1000,
            handshake_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(10),
            log_data: false,
        }
    }
}

impl ServerConfig {
    /// Socket address to bind
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.address, self.port)
            .parse()
            .map_err(|e| ProtocolError::ConfigError(format!("Invalid bind address: {e}")))
    }

    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if self.address.parse::<std::net::IpAddr>().is_err() {
            errors.push(format!(
                "Invalid server address format: '{}' (expected an ip such as '0.0.0.0')",
                self.address
            ));
        }

        validate_service(&self.service, &mut errors);

        if self.max_connections == 0 {
            errors.push("Max connections must be greater than 0".to_string());
        } else if self.max_connections > 100_000 {
            errors.push(format!(
                "Max connections very high: {} (ensure system resources can support this)",
                self.max_connections
            ));
        }

        if self.handshake_timeout.as_millis() < 100 {
            errors.push("Handshake timeout too short (minimum: 100ms)".to_string());
        } else if self.handshake_timeout.as_secs() > 300 {
            errors.push("Handshake timeout too long (maximum: 300s)".to_string());
        }

        if self.shutdown_timeout.as_secs() < 1 {
            errors.push("Shutdown timeout too short (minimum: 1s)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Client-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Host address as `ip:port`
    pub address: String,

    /// Service path to request from the host
    pub service: String,

    /// Timeout for the connect and handshake
    #[serde(with = "duration_serde")]
    pub connection_timeout: Duration,

    /// Trace every frame in and out
    pub log_data: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{DEFAULT_PORT}"),
            service: String::from(DEFAULT_SERVICE),
            connection_timeout: Duration::from_secs(5),
            log_data: false,
        }
    }
}

impl ClientConfig {
    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Client address cannot be empty".to_string());
        } else if self.address.parse::<SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid client address format: '{}' (expected format: '127.0.0.1:51365')",
                self.address
            ));
        }

        validate_service(&self.service, &mut errors);

        if self.connection_timeout.as_millis() < 100 {
            errors.push("Connection timeout too short (minimum: 100ms)".to_string());
        }

        errors
    }
}

/// Dispatch queue and pool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatchConfig {
    /// Maximum queued messages before new ones are dropped. `None` is unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pending: Option<usize>,

    /// Idle instances each tag's pool keeps around
    pub max_idle_per_tag: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_pending: None,
            max_idle_per_tag: crate::utils::pool::DEFAULT_MAX_IDLE_PER_TAG,
        }
    }
}

impl DispatchConfig {
    /// Validate dispatch configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_pending == Some(0) {
            errors.push("max_pending must be greater than 0 (omit it for unbounded)".to_string());
        }

        if self.max_idle_per_tag > 1_000_000 {
            errors.push(format!(
                "max_idle_per_tag too large: {} (max recommended: 1,000,000)",
                self.max_idle_per_tag
            ));
        }

        errors
    }
}

/// Transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Maximum allowed frame payload in bytes
    pub max_frame_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl TransportConfig {
    /// Validate transport configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_frame_size == 0 {
            errors.push("Max frame size cannot be 0".to_string());
        } else if self.max_frame_size < 1024 {
            errors.push("Max frame size too small (minimum: 1 KB)".to_string());
        } else if self.max_frame_size > u32::MAX as usize {
            errors.push(format!(
                "Max frame size too large: {} bytes (length prefix is 32 bits)",
                self.max_frame_size
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("net-dispatch"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        match self.app_name.len() {
            0 => errors.push("Application name cannot be empty".to_string()),
            n if n > 64 => errors.push(format!("Application name is {n} characters (maximum: 64)")),
            _ => {}
        }

        match (self.log_to_file, self.log_file_path.as_deref().map(Path::new)) {
            (true, None) => errors.push("log_to_file requires log_file_path".to_string()),
            (true, Some(path)) => {
                let missing_dir = path
                    .parent()
                    .filter(|dir| !dir.as_os_str().is_empty() && !dir.exists());
                if let Some(dir) = missing_dir {
                    errors.push(format!("Log directory {} does not exist", dir.display()));
                }
            }
            (false, _) => {}
        }

        if !(self.log_to_console || self.log_to_file) {
            errors.push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Levels are stored as their lowercase names
mod log_level_serde {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use tracing::Level;

    pub fn serialize<S: Serializer>(level: &Level, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&level.as_str().to_ascii_lowercase())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Level, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse::<Level>()
            .map_err(|_| de::Error::custom(format!("Invalid log level: {name}")))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = NetworkConfig::default();
        assert!(config.validate().is_empty(), "{:?}", config.validate());
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.server.service, "Default");
        assert_eq!(config.dispatch.max_pending, None);
    }

    #[test]
    fn test_bind_addr() {
        let server = ServerConfig {
            address: "127.0.0.1".into(),
            port: 4000,
            ..Default::default()
        };
        assert_eq!(server.bind_addr().unwrap(), "127.0.0.1:4000".parse().unwrap());
    }

    #[test]
    fn test_from_vars_overrides() {
        let vars: HashMap<&str, &str> = [
            ("SERVER_PORT", "6000"),
            ("SERVICE", "Tracker"),
            ("MAX_PENDING", "128"),
            ("LOG_DATA", "true"),
            ("LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();
        let config = NetworkConfig::from_vars(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.server.port, 6000);
        assert_eq!(config.client.service, "Tracker");
        assert_eq!(config.dispatch.max_pending, Some(128));
        assert!(config.server.log_data && config.client.log_data);
        assert_eq!(config.logging.log_level, Level::DEBUG);
    }

    #[test]
    fn test_from_vars_rejects_garbage() {
        let result = NetworkConfig::from_vars(|k| (k == "SERVER_PORT").then(|| "nope".to_string()));
        assert!(matches!(result, Err(ProtocolError::ConfigError(_))));
    }
}
