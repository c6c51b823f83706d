//! # Logging
//!
//! Installs a `tracing` subscriber built from [`LoggingConfig`]: console
//! and/or file output, plain or JSON lines, filtered at the configured level.
//! `RUST_LOG` overrides the level when set.
//!
//! Calling [`init_logging`] when a global subscriber already exists (a second
//! call, or a test harness that installed its own) is not an error; it
//! reports `Ok(false)` and leaves the existing subscriber in place.

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber. Returns `Ok(true)` if this call installed it.
pub fn init_logging(config: &LoggingConfig) -> Result<bool> {
    let filter = EnvFilter::builder()
        .with_default_directive(config.log_level.into())
        .from_env_lossy();

    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.log_to_console {
        layers.push(console_layer(config.json_format));
    }

    if config.log_to_file {
        let path = config.log_file_path.as_deref().ok_or_else(|| {
            ProtocolError::ConfigError("log_file_path must be set when log_to_file is true".into())
        })?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open log file: {e}")))?;
        layers.push(file_layer(Mutex::new(file), config.json_format));
    }

    match Registry::default().with(layers).with(filter).try_init() {
        Ok(()) => {
            tracing::info!(app = %config.app_name, level = %config.log_level, "Logging initialised");
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}

fn console_layer(json: bool) -> BoxedLayer {
    if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    }
}

fn file_layer(file: Mutex<std::fs::File>, json: bool) -> BoxedLayer {
    if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(file)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file)
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn test_missing_file_path_is_config_error() {
        let config = LoggingConfig {
            log_to_file: true,
            log_file_path: None,
            ..Default::default()
        };
        assert!(matches!(
            init_logging(&config),
            Err(ProtocolError::ConfigError(_))
        ));
    }

    #[test]
    fn test_second_init_is_harmless() {
        let config = LoggingConfig::default();
        init_logging(&config).unwrap();
        assert!(!init_logging(&config).unwrap());
    }
}
