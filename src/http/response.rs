//! Responses produced by the multiplexer itself.
//!
//! # Responsibilities
//! - Fixed answer when no handler claims an exchange
//! - Error answers for rejected push envelopes
//!
//! Everything else is written by a delegate.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Body of the answer to an exchange no handler claimed.
pub const NO_HANDLER_FULFILLED: &str = "no handler was fulfilled for your request";

/// Answer for an exchange that matched no handler.
pub fn no_handler_fulfilled() -> Response {
    (StatusCode::NOT_FOUND, NO_HANDLER_FULFILLED).into_response()
}

/// Answer with `status` and the error text as body.
pub fn error_text(status: StatusCode, err: &dyn std::error::Error) -> Response {
    (status, err.to_string()).into_response()
}
