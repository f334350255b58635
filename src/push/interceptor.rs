//! Rewrites a push delivery into a direct call.
//!
//! The envelope body is replaced by the inner payload and the envelope
//! metadata moves into headers under a reserved prefix:
//!
//! ```text
//! <prefix>-subscription            envelope subscription
//! <prefix>-message-id              message id
//! <prefix>-message-publish-time    publish time
//! <prefix>-ordering-key            ordering key (when set)
//! <prefix>-delivery-attempt        delivery attempt (when set)
//! <prefix>-attr-<key>              one per message attribute
//! <prefix>-query-<param>           one per query parameter of the push URL
//! ```
//!
//! With the default `grpc-metadata-` prefix a REST gateway strips the
//! prefix, so the values reach the backend as call metadata.

use axum::body::Body;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, TE, TRANSFER_ENCODING};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, Version};
use bytes::{BufMut, Bytes, BytesMut};

use crate::config::PushConfig;
use crate::push::envelope::{DataEncoding, EnvelopeError, PayloadEncoding, PushEnvelope};
use crate::routing::selector::RPC_CONTENT_TYPE;

/// Default reserved metadata prefix.
pub const DEFAULT_METADATA_PREFIX: &str = "grpc-metadata-x-pubsub";

/// Default envelope body limit.
pub const DEFAULT_MAX_ENVELOPE_BYTES: usize = 16 * 1024 * 1024;

/// Unwraps push envelopes.
#[derive(Debug, Clone)]
pub struct EnvelopeInterceptor {
    prefix: String,
    max_body_bytes: usize,
    data_encoding: DataEncoding,
}

impl Default for EnvelopeInterceptor {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_METADATA_PREFIX.to_string(),
            max_body_bytes: DEFAULT_MAX_ENVELOPE_BYTES,
            data_encoding: DataEncoding::Base64,
        }
    }
}

impl EnvelopeInterceptor {
    /// Create an interceptor injecting metadata under `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn from_config(config: &PushConfig) -> Self {
        Self::new(config.metadata_prefix.clone())
            .with_body_limit(config.max_envelope_bytes)
            .with_data_encoding(config.data_encoding)
    }

    /// Bound the envelope body read.
    pub fn with_body_limit(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Read message `data` as `encoding` instead of base64.
    pub fn with_data_encoding(mut self, encoding: DataEncoding) -> Self {
        self.data_encoding = encoding;
        self
    }

    pub fn data_encoding(&self) -> DataEncoding {
        self.data_encoding
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Drain and decode the envelope, then rewrite the exchange.
    pub async fn intercept(&self, req: Request<Body>) -> Result<Intercepted, EnvelopeError> {
        let (parts, body) = req.into_parts();
        let bytes = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(EnvelopeError::Unreadable)?;
        let envelope = PushEnvelope::decode(&bytes)?;
        self.rewrite(parts, envelope)
    }

    /// Rewrite request parts around a decoded envelope.
    ///
    /// Metadata is appended, never replacing values already present. Nothing
    /// is applied unless every header can be built.
    pub fn rewrite(&self, mut parts: Parts, envelope: PushEnvelope) -> Result<Intercepted, EnvelopeError> {
        let message = envelope.message.ok_or(EnvelopeError::MissingMessage)?;
        let encoding = message.encoding()?;
        let payload = message.payload(self.data_encoding)?;

        let mut metadata = Vec::new();
        metadata.push(self.entry("subscription", &envelope.subscription)?);
        metadata.push(self.entry("message-id", &message.message_id)?);
        metadata.push(self.entry("message-publish-time", &message.publish_time)?);
        if !message.ordering_key.is_empty() {
            metadata.push(self.entry("ordering-key", &message.ordering_key)?);
        }
        if let Some(attempt) = envelope.delivery_attempt {
            metadata.push(self.entry("delivery-attempt", &attempt.to_string())?);
        }
        for (key, value) in &message.attributes {
            metadata.push(self.entry(&format!("attr-{key}"), value)?);
        }
        if let Some(query) = parts.uri.query() {
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                metadata.push(self.entry(&format!("query-{key}"), &value)?);
            }
        }

        for (name, value) in metadata {
            parts.headers.append(name, value);
        }

        Ok(Intercepted {
            parts,
            payload: Bytes::from(payload),
            encoding,
            message_id: message.message_id,
        })
    }

    fn entry(&self, suffix: &str, value: &str) -> Result<(HeaderName, HeaderValue), EnvelopeError> {
        let name = format!("{}-{}", self.prefix, suffix);
        let value = HeaderValue::from_str(value).map_err(|_| EnvelopeError::InvalidHeaderValue(name.clone()))?;
        let name = HeaderName::try_from(name.as_str()).map_err(|_| EnvelopeError::InvalidHeaderName(name.clone()))?;
        Ok((name, value))
    }
}

/// A push delivery after unwrapping, ready to be presented to a backend.
#[derive(Debug)]
pub struct Intercepted {
    parts: Parts,
    payload: Bytes,
    encoding: PayloadEncoding,
    message_id: String,
}

impl Intercepted {
    pub fn encoding(&self) -> PayloadEncoding {
        self.encoding
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// The exchange with the payload as its plain body.
    pub fn into_request(self) -> Request<Body> {
        let Intercepted { parts, payload, .. } = self;
        with_body(parts, payload)
    }

    /// The exchange as a unary RPC call carrying the payload as its message.
    pub fn into_rpc_request(self) -> Result<Request<Body>, EnvelopeError> {
        let Intercepted { mut parts, payload, .. } = self;
        let len = u32::try_from(payload.len()).map_err(|_| EnvelopeError::PayloadTooLarge(payload.len()))?;

        // uncompressed flag + big-endian length prefix
        let mut frame = BytesMut::with_capacity(payload.len() + 5);
        frame.put_u8(0);
        frame.put_u32(len);
        frame.extend_from_slice(&payload);

        parts.version = Version::HTTP_2;
        parts.headers.insert(CONTENT_TYPE, HeaderValue::from_static(RPC_CONTENT_TYPE));
        parts.headers.insert(TE, HeaderValue::from_static("trailers"));
        Ok(with_body(parts, frame.freeze()))
    }
}

fn with_body(mut parts: Parts, body: Bytes) -> Request<Body> {
    parts.headers.remove(TRANSFER_ENCODING);
    parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    Request::from_parts(parts, Body::from(body))
}
