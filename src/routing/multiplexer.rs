//! Ordered, first-match-wins dispatch over handlers.
//!
//! # Responsibilities
//! - Offer each exchange to the handlers in registration order
//! - Stop at the first claim
//! - Answer unclaimed exchanges with a fixed 404
//! - Act as a tower service so hyper (or a test) can drive it
//!
//! # Design Decisions
//! - Handlers are frozen at construction; dispatch takes no locks
//! - No queueing or retries; concurrency comes from the connection layer
//! - One tracing span per exchange, carrying the request id

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use bytes::Bytes;
use futures_util::future::BoxFuture;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::Instrument;

use crate::http::request::RequestId;
use crate::http::response::no_handler_fulfilled;
use crate::routing::handler::{Handler, Outcome};

/// Dispatches exchanges across an ordered handler list.
///
/// Cloning is cheap; clones share the same handlers.
#[derive(Debug, Clone)]
pub struct Multiplexer {
    handlers: Arc<[Handler]>,
}

impl Multiplexer {
    /// Create a multiplexer. Order is the only tie-break between handlers.
    pub fn new(handlers: Vec<Handler>) -> Self {
        Self {
            handlers: handlers.into(),
        }
    }

    pub fn builder() -> MultiplexerBuilder {
        MultiplexerBuilder::default()
    }

    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    /// Answer one exchange.
    pub async fn dispatch(&self, req: Request<Body>) -> Response {
        let request_id = RequestId::from_request(&req);
        let span = tracing::info_span!(
            "exchange",
            request_id = %request_id,
            method = %req.method(),
            path = %req.uri().path(),
            version = ?req.version(),
        );

        self.dispatch_inner(req).instrument(span).await
    }

    async fn dispatch_inner(&self, mut req: Request<Body>) -> Response {
        for handler in self.handlers.iter() {
            match handler.try_handle(req).await {
                Outcome::Claimed(response) => {
                    tracing::debug!(handler = %handler.name(), status = %response.status(), "Exchange answered");
                    metrics::counter!("mux_exchanges_total", "handler" => handler.name().to_string()).increment(1);
                    return response;
                }
                Outcome::NotClaimed(unclaimed) => req = unclaimed,
            }
        }

        tracing::warn!("No handler fulfilled exchange");
        metrics::counter!("mux_unclaimed_exchanges_total").increment(1);
        no_handler_fulfilled()
    }
}

impl<B> tower::Service<Request<B>> for Multiplexer
where
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<axum::BoxError>,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let mux = self.clone();
        Box::pin(async move { Ok(mux.dispatch(req.map(Body::new)).await) })
    }
}

/// Collects handlers in evaluation order.
#[derive(Debug, Default)]
pub struct MultiplexerBuilder {
    handlers: Vec<Handler>,
}

impl MultiplexerBuilder {
    /// Append a handler after the ones already registered.
    pub fn handler(mut self, handler: Handler) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn build(self) -> Multiplexer {
        Multiplexer::new(self.handlers)
    }
}
