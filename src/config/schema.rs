//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the multiplexer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::push::envelope::DataEncoding;
use crate::push::interceptor::{DEFAULT_MAX_ENVELOPE_BYTES, DEFAULT_METADATA_PREFIX};
use crate::routing::selector::DEFAULT_PUSH_TOKEN;

/// Port value that lets the operating system pick a free port.
pub const EPHEMERAL_PORT: u16 = 0;

/// Root configuration for the multiplexer process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MuxConfig {
    /// Listener and shutdown settings.
    pub server: ServerConfig,

    /// Push-delivery classification and rewriting.
    pub push: PushConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host or IP to bind to. `None` binds every IPv4 interface.
    pub host: Option<String>,

    /// Port to bind to, `0` for an ephemeral port.
    pub port: u16,

    /// Upper bound on the graceful shutdown wait, in seconds.
    pub shutdown_timeout_secs: u64,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl ServerConfig {
    /// Shutdown timeout as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Host part of the bind address.
    pub fn bind_host(&self) -> &str {
        self.host.as_deref().unwrap_or("0.0.0.0")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: EPHEMERAL_PORT,
            shutdown_timeout_secs: 30,
            max_connections: 10_000,
        }
    }
}

/// Push-delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PushConfig {
    /// Token the push sender places in its `User-Agent`.
    pub user_agent_token: String,

    /// Header prefix under which envelope metadata is injected.
    pub metadata_prefix: String,

    /// Largest envelope body accepted, in bytes.
    pub max_envelope_bytes: usize,

    /// How message `data` is read: `base64` (push service) or `raw` text.
    pub data_encoding: DataEncoding,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            user_agent_token: DEFAULT_PUSH_TOKEN.to_string(),
            metadata_prefix: DEFAULT_METADATA_PREFIX.to_string(),
            // base64 inflates a 10MB message
            max_envelope_bytes: DEFAULT_MAX_ENVELOPE_BYTES,
            data_encoding: DataEncoding::Base64,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: MuxConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.port, EPHEMERAL_PORT);
        assert_eq!(config.server.shutdown_timeout(), Duration::from_secs(30));
        assert_eq!(config.push.user_agent_token, "APIs-Google");
        assert_eq!(config.push.data_encoding, DataEncoding::Base64);
        assert_eq!(config.server.bind_host(), "0.0.0.0");
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config: MuxConfig = toml::from_str(
            r#"
            [server]
            host = "localhost"
            port = 8080

            [push]
            metadata_prefix = "grpc-metadata-x-push"
            data_encoding = "raw"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.bind_host(), "localhost");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.max_connections, 10_000);
        assert_eq!(config.push.metadata_prefix, "grpc-metadata-x-push");
        assert_eq!(config.push.data_encoding, DataEncoding::Raw);
        assert_eq!(config.push.user_agent_token, "APIs-Google");
    }

    #[test]
    fn unknown_data_encoding_is_rejected() {
        let result: Result<MuxConfig, _> = toml::from_str("[push]\ndata_encoding = \"hex\"\n");
        assert!(result.is_err());
    }
}
