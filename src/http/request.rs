//! Request correlation.
//!
//! # Responsibilities
//! - Pick up the caller's `x-request-id` when present
//! - Otherwise generate a UUID v4 for log correlation
//!
//! # Design Decisions
//! - The id lives only in the exchange span; the exchange itself is not
//!   modified, so RPC calls reach their backend untouched

use axum::http::Request;
use std::fmt;
use uuid::Uuid;

/// Header carrying the correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Correlation id of one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Use the caller's id if it sent a readable one.
    pub fn from_request<B>(req: &Request<B>) -> Self {
        req.headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| Self(v.to_string()))
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_caller_id() {
        let req = Request::builder().header(X_REQUEST_ID, "abc").body(()).unwrap();
        assert_eq!(RequestId::from_request(&req).as_str(), "abc");
    }

    #[test]
    fn generates_unique_ids() {
        let req = Request::new(());
        let a = RequestId::from_request(&req);
        let b = RequestId::from_request(&req);
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }
}
