//! Handlers: selectors plus the delegate that answers what they select.
//!
//! # Responsibilities
//! - Evaluate required selectors in order, short-circuiting on a miss
//! - Hand selected exchanges to the delegate
//! - Unwrap push deliveries and route them by declared encoding
//!
//! # Design Decisions
//! - A miss returns the untouched exchange so the next handler can try it
//! - A claim always carries the written response; nothing runs afterwards
//! - Only the delegate path may consume or rewrite the exchange

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use std::borrow::Cow;
use std::collections::HashMap;

use crate::config::PushConfig;
use crate::http::response::error_text;
use crate::push::{EnvelopeError, EnvelopeInterceptor, PayloadEncoding};
use crate::routing::delegate::Delegate;
use crate::routing::selector::{
    AnyOf, PushSelector, RpcSelector, RpcWebPreflightSelector, RpcWebSelector, Selector,
};

/// Result of offering an exchange to a handler.
#[derive(Debug)]
pub enum Outcome {
    /// The handler answered the exchange.
    Claimed(Response),
    /// The handler's selectors did not pass; the exchange is handed back.
    NotClaimed(Request<Body>),
}

impl Outcome {
    pub fn is_claimed(&self) -> bool {
        matches!(self, Outcome::Claimed(_))
    }
}

/// Delegates for unwrapped push payloads, keyed by declared encoding.
#[derive(Debug, Clone, Default)]
pub struct PushRoutes {
    routes: HashMap<PayloadEncoding, Delegate>,
}

impl PushRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send payloads declared as `encoding` to `delegate`.
    pub fn route(mut self, encoding: PayloadEncoding, delegate: Delegate) -> Self {
        self.routes.insert(encoding, delegate);
        self
    }

    pub fn get(&self, encoding: PayloadEncoding) -> Option<&Delegate> {
        self.routes.get(&encoding)
    }
}

impl From<Delegate> for PushRoutes {
    /// Every payload goes to a single REST gateway.
    fn from(delegate: Delegate) -> Self {
        Self::new().route(PayloadEncoding::Http, delegate)
    }
}

#[derive(Debug)]
enum Action {
    Forward(Delegate),
    Push {
        interceptor: EnvelopeInterceptor,
        routes: PushRoutes,
    },
}

/// A classification rule and the backend that answers what it selects.
#[derive(Debug)]
pub struct Handler {
    name: Cow<'static, str>,
    selectors: Vec<Box<dyn Selector>>,
    action: Action,
}

impl Handler {
    /// Hand exchanges passing `selector` to `delegate`.
    pub fn new(name: impl Into<Cow<'static, str>>, selector: impl Selector + 'static, delegate: Delegate) -> Self {
        Self {
            name: name.into(),
            selectors: vec![Box::new(selector)],
            action: Action::Forward(delegate),
        }
    }

    /// RPC exchanges (HTTP/2 with a gRPC content type), forwarded unmodified.
    pub fn rpc(delegate: Delegate) -> Self {
        Self::new("rpc", RpcSelector, delegate)
    }

    /// gRPC-Web calls and their CORS preflights.
    pub fn rpc_web(delegate: Delegate) -> Self {
        let selector = AnyOf::new(vec![Box::new(RpcWebSelector), Box::new(RpcWebPreflightSelector)]);
        Self::new("rpc-web", selector, delegate)
    }

    /// Claims every exchange. Register last.
    pub fn http(delegate: Delegate) -> Self {
        Self {
            name: "http".into(),
            selectors: Vec::new(),
            action: Action::Forward(delegate),
        }
    }

    /// Push deliveries, unwrapped and routed by payload encoding.
    pub fn push(selector: PushSelector, interceptor: EnvelopeInterceptor, routes: impl Into<PushRoutes>) -> Self {
        Self {
            name: "push".into(),
            selectors: vec![Box::new(selector)],
            action: Action::Push {
                interceptor,
                routes: routes.into(),
            },
        }
    }

    /// Push handler built from the `push` configuration section.
    pub fn push_from_config(config: &PushConfig, routes: impl Into<PushRoutes>) -> Self {
        Self::push(
            PushSelector::new(config.user_agent_token.clone()),
            EnvelopeInterceptor::from_config(config),
            routes,
        )
    }

    /// Require an extra selector on top of the existing ones.
    pub fn with_selector(mut self, selector: impl Selector + 'static) -> Self {
        self.selectors.push(Box::new(selector));
        self
    }

    /// Rename the handler (logs and metrics).
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if every selector passes. Never touches the exchange.
    pub fn matches(&self, req: &Request<Body>) -> bool {
        self.selectors.iter().all(|s| s.select(req))
    }

    /// Offer the exchange to this handler.
    pub async fn try_handle(&self, req: Request<Body>) -> Outcome {
        if !self.matches(&req) {
            return Outcome::NotClaimed(req);
        }

        tracing::debug!(handler = %self.name, "Handler selected exchange");
        let response = match &self.action {
            Action::Forward(delegate) => delegate.answer(req).await,
            Action::Push { interceptor, routes } => answer_push(interceptor, routes, req).await,
        };
        Outcome::Claimed(response)
    }
}

async fn answer_push(interceptor: &EnvelopeInterceptor, routes: &PushRoutes, req: Request<Body>) -> Response {
    let intercepted = match interceptor.intercept(req).await {
        Ok(intercepted) => intercepted,
        Err(err) => return reject_push(err),
    };

    let encoding = intercepted.encoding();
    let Some(delegate) = routes.get(encoding) else {
        return reject_push(EnvelopeError::NoRoute(encoding));
    };

    tracing::info!(
        message_id = %intercepted.message_id(),
        encoding = %encoding,
        delegate = %delegate.name(),
        "Push delivery unwrapped"
    );
    metrics::counter!("mux_push_envelopes_total", "outcome" => encoding.to_string()).increment(1);

    match encoding {
        PayloadEncoding::Http => delegate.answer(intercepted.into_request()).await,
        PayloadEncoding::Rpc => match intercepted.into_rpc_request() {
            Ok(req) => crate::push::rpc::settle_reply(delegate.answer(req).await).await,
            Err(err) => reject_push(err),
        },
    }
}

fn reject_push(err: EnvelopeError) -> Response {
    tracing::warn!(error = %err, "Push delivery rejected");
    metrics::counter!("mux_push_envelopes_total", "outcome" => "rejected").increment(1);
    error_text(StatusCode::BAD_REQUEST, &err)
}
