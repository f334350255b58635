//! Push-delivery unwrapping.
//!
//! # Data Flow
//! ```text
//! POST from push sender (JSON envelope)
//!     → interceptor.rs (drain body, decode envelope)
//!     → envelope.rs (wire types, declared encoding)
//!     → rewritten exchange: body = payload, metadata in headers
//!     → http payloads: handed to the gateway as-is
//!     → rpc payloads: framed as a unary call, reply settled by rpc.rs
//! ```
//!
//! # Design Decisions
//! - Sender authenticity is not checked here; that belongs upstream
//! - The publisher's `encoding` attribute is trusted without inspecting bytes
//! - A malformed envelope is answered with 400 and never retried by another handler

pub mod envelope;
pub mod interceptor;
pub mod rpc;

pub use envelope::{DataEncoding, EnvelopeError, PayloadEncoding, PushEnvelope, PushMessage, ENCODING_ATTRIBUTE};
pub use interceptor::{EnvelopeInterceptor, Intercepted, DEFAULT_METADATA_PREFIX};
