//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, connection limits > 0)
//! - Check that the metadata prefix can produce header names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MuxConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::HeaderName;
use std::net::SocketAddr;

use crate::config::schema::MuxConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("server.shutdown_timeout_secs must be greater than zero")]
    ZeroShutdownTimeout,

    #[error("server.max_connections must be greater than zero")]
    ZeroMaxConnections,

    #[error("push.user_agent_token must not be empty")]
    EmptyPushToken,

    #[error("push.metadata_prefix {0:?} is not a valid header name")]
    InvalidMetadataPrefix(String),

    #[error("push.max_envelope_bytes must be greater than zero")]
    ZeroEnvelopeLimit,

    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check a parsed configuration, collecting every problem.
pub fn validate_config(config: &MuxConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.shutdown_timeout_secs == 0 {
        errors.push(ValidationError::ZeroShutdownTimeout);
    }
    if config.server.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }
    if config.push.user_agent_token.is_empty() {
        errors.push(ValidationError::EmptyPushToken);
    }
    if HeaderName::from_bytes(config.push.metadata_prefix.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidMetadataPrefix(
            config.push.metadata_prefix.clone(),
        ));
    }
    if config.push.max_envelope_bytes == 0 {
        errors.push(ValidationError::ZeroEnvelopeLimit);
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
