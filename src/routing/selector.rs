//! Exchange classification.
//!
//! # Responsibilities
//! - Recognize RPC framing (HTTP/2 + gRPC content type)
//! - Recognize push deliveries (POST + push sender user agent)
//! - Recognize gRPC-Web calls and their CORS preflights
//! - Combine selectors with AND / OR semantics
//!
//! # Design Decisions
//! - Selectors only look at the request line and headers, never the body
//! - No allocation or I/O, so they can run any number of times
//! - Substring checks instead of full media-type parsing

use axum::body::Body;
use axum::http::{header, Method, Request, Version};
use std::fmt;
use std::sync::Arc;

/// Media marker every gRPC content type carries.
pub const RPC_CONTENT_TYPE: &str = "application/grpc";

/// Content type prefix of gRPC-Web calls.
pub const RPC_WEB_CONTENT_TYPE: &str = "application/grpc-web";

/// User agent token of the push sender.
pub const DEFAULT_PUSH_TOKEN: &str = "APIs-Google";

/// Trait for classifying exchanges.
pub trait Selector: Send + Sync + fmt::Debug {
    /// Returns true if the exchange carries this selector's signature.
    fn select(&self, req: &Request<Body>) -> bool;
}

impl<S: Selector + ?Sized> Selector for Arc<S> {
    fn select(&self, req: &Request<Body>) -> bool {
        (**self).select(req)
    }
}

impl<S: Selector + ?Sized> Selector for Box<S> {
    fn select(&self, req: &Request<Body>) -> bool {
        (**self).select(req)
    }
}

fn header_str<B>(req: &Request<B>, name: header::HeaderName) -> &str {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// True iff the exchange is HTTP/2 and declares a gRPC content type.
pub fn is_rpc_request<B>(req: &Request<B>) -> bool {
    req.version() == Version::HTTP_2 && header_str(req, header::CONTENT_TYPE).contains(RPC_CONTENT_TYPE)
}

/// True iff the exchange is a POST whose user agent carries `token`.
///
/// This is a heuristic only; the sender's signed token is not verified here.
pub fn is_push_request<B>(req: &Request<B>, token: &str) -> bool {
    req.method() == Method::POST && header_str(req, header::USER_AGENT).contains(token)
}

/// True iff the exchange declares a gRPC-Web content type.
pub fn is_rpc_web_request<B>(req: &Request<B>) -> bool {
    header_str(req, header::CONTENT_TYPE).starts_with(RPC_WEB_CONTENT_TYPE)
}

/// True iff the exchange is a CORS preflight for a gRPC-Web call.
pub fn is_rpc_web_preflight<B>(req: &Request<B>) -> bool {
    if req.method() != Method::OPTIONS || !req.headers().contains_key(header::ORIGIN) {
        return false;
    }
    header_str(req, header::ACCESS_CONTROL_REQUEST_HEADERS)
        .split(',')
        .map(str::trim)
        .any(|h| h.eq_ignore_ascii_case("x-grpc-web") || h.eq_ignore_ascii_case("content-type"))
}

/// Matches RPC exchanges.
#[derive(Debug, Clone, Copy, Default)]
pub struct RpcSelector;

impl Selector for RpcSelector {
    fn select(&self, req: &Request<Body>) -> bool {
        is_rpc_request(req)
    }
}

/// Matches push deliveries.
#[derive(Debug, Clone)]
pub struct PushSelector {
    token: String,
}

impl PushSelector {
    /// Create a push selector looking for `token` in the user agent.
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl Default for PushSelector {
    fn default() -> Self {
        Self::new(DEFAULT_PUSH_TOKEN)
    }
}

impl Selector for PushSelector {
    fn select(&self, req: &Request<Body>) -> bool {
        is_push_request(req, &self.token)
    }
}

/// Matches gRPC-Web calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct RpcWebSelector;

impl Selector for RpcWebSelector {
    fn select(&self, req: &Request<Body>) -> bool {
        is_rpc_web_request(req)
    }
}

/// Matches gRPC-Web CORS preflights.
#[derive(Debug, Clone, Copy, Default)]
pub struct RpcWebPreflightSelector;

impl Selector for RpcWebPreflightSelector {
    fn select(&self, req: &Request<Body>) -> bool {
        is_rpc_web_preflight(req)
    }
}

/// Combines selectors with OR semantics, stopping at the first hit.
#[derive(Debug)]
pub struct AnyOf {
    selectors: Vec<Box<dyn Selector>>,
}

impl AnyOf {
    pub fn new(selectors: Vec<Box<dyn Selector>>) -> Self {
        Self { selectors }
    }
}

impl Selector for AnyOf {
    fn select(&self, req: &Request<Body>) -> bool {
        self.selectors.iter().any(|s| s.select(req))
    }
}

/// Combines selectors with AND semantics, stopping at the first miss.
#[derive(Debug)]
pub struct AllOf {
    selectors: Vec<Box<dyn Selector>>,
}

impl AllOf {
    pub fn new(selectors: Vec<Box<dyn Selector>>) -> Self {
        Self { selectors }
    }
}

impl Selector for AllOf {
    fn select(&self, req: &Request<Body>) -> bool {
        self.selectors.iter().all(|s| s.select(req))
    }
}

/// Adapts a plain predicate into a [`Selector`].
pub struct FnSelector<F> {
    name: &'static str,
    predicate: F,
}

impl<F> FnSelector<F>
where
    F: Fn(&Request<Body>) -> bool + Send + Sync,
{
    pub fn new(name: &'static str, predicate: F) -> Self {
        Self { name, predicate }
    }
}

impl<F> fmt::Debug for FnSelector<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSelector").field("name", &self.name).finish()
    }
}

impl<F> Selector for FnSelector<F>
where
    F: Fn(&Request<Body>) -> bool + Send + Sync,
{
    fn select(&self, req: &Request<Body>) -> bool {
        (self.predicate)(req)
    }
}
