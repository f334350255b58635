//! Push envelope wire types.
//!
//! A push delivery wraps the published message in a JSON document:
//!
//! ```json
//! {
//!   "message": {
//!     "data": "eyJ4IjoxfQ==",
//!     "attributes": {"encoding": "http"},
//!     "messageId": "2070443601311540",
//!     "publishTime": "2021-02-26T19:13:55.749Z",
//!     "orderingKey": ""
//!   },
//!   "subscription": "projects/p/subscriptions/s",
//!   "deliveryAttempt": 1
//! }
//! ```
//!
//! `data` is kept as sent. Turning it into payload bytes is decided by the
//! configured [`DataEncoding`], never by looking at the text. Unknown fields,
//! such as the snake_case duplicates some senders add, are ignored.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Message attribute that names the payload's encoding.
pub const ENCODING_ATTRIBUTE: &str = "encoding";

/// Errors raised while unwrapping a push delivery.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("failed to read push envelope: {0}")]
    Unreadable(#[source] axum::Error),

    #[error("malformed push envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("malformed push envelope: missing message")]
    MissingMessage,

    #[error("push metadata name {0:?} is not a valid header name")]
    InvalidHeaderName(String),

    #[error("push metadata {0:?} has a value that is not a valid header value")]
    InvalidHeaderValue(String),

    #[error("unsupported payload encoding {0:?}")]
    UnsupportedEncoding(String),

    #[error("no delegate registered for {0} payloads")]
    NoRoute(PayloadEncoding),

    #[error("payload of {0} bytes does not fit a single rpc frame")]
    PayloadTooLarge(usize),

    #[error("push message data is not valid base64: {0}")]
    InvalidData(#[source] base64::DecodeError),
}

/// How the `data` member of a message is turned into payload bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataEncoding {
    /// Standard base64, as the push service sends it.
    #[default]
    Base64,
    /// The text itself, for hand-posted deliveries.
    Raw,
}

impl DataEncoding {
    pub fn decode(self, data: &str) -> Result<Vec<u8>, EnvelopeError> {
        match self {
            Self::Base64 => STANDARD.decode(data).map_err(EnvelopeError::InvalidData),
            Self::Raw => Ok(data.as_bytes().to_vec()),
        }
    }
}

/// Outer wrapper of a push delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<PushMessage>,

    #[serde(default)]
    pub subscription: String,

    /// Present when the subscription has a dead-letter policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_attempt: Option<u32>,
}

impl PushEnvelope {
    /// Decode an envelope, requiring the `message` member.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let envelope: PushEnvelope = serde_json::from_slice(bytes)?;
        if envelope.message.is_none() {
            return Err(EnvelopeError::MissingMessage);
        }
        Ok(envelope)
    }
}

/// The published message carried inside an envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    /// Payload as sent; see [`PushMessage::payload`].
    #[serde(default)]
    pub data: String,

    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    #[serde(default)]
    pub message_id: String,

    #[serde(default)]
    pub publish_time: String,

    #[serde(default)]
    pub ordering_key: String,
}

impl PushMessage {
    /// Payload bytes, with `data` read as `encoding` says.
    pub fn payload(&self, encoding: DataEncoding) -> Result<Vec<u8>, EnvelopeError> {
        encoding.decode(&self.data)
    }

    /// Encoding declared by the publisher, `http` when absent.
    ///
    /// The declaration is trusted as-is; the payload bytes are not inspected.
    pub fn encoding(&self) -> Result<PayloadEncoding, EnvelopeError> {
        match self.attributes.get(ENCODING_ATTRIBUTE) {
            Some(value) => value.parse(),
            None => Ok(PayloadEncoding::Http),
        }
    }
}

/// How a push payload should be presented to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PayloadEncoding {
    /// Plain request body for a REST gateway.
    Http,
    /// Serialized RPC message for an RPC server.
    Rpc,
}

impl FromStr for PayloadEncoding {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "http" | "json" => Ok(Self::Http),
            "rpc" | "grpc" => Ok(Self::Rpc),
            _ => Err(EnvelopeError::UnsupportedEncoding(s.to_string())),
        }
    }
}

impl fmt::Display for PayloadEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => f.write_str("http"),
            Self::Rpc => f.write_str("rpc"),
        }
    }
}
