//! Backends that fully answer a classified exchange.

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use std::borrow::Cow;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use tower::util::BoxCloneSyncService;
use tower::{Service, ServiceExt};

/// A backend capable of answering any exchange handed to it.
///
/// Wraps any infallible tower service (an axum `Router`, a tonic server, a
/// closure). Every call runs on a fresh clone, so the backend must be safe for
/// concurrent use on its own.
#[derive(Clone)]
pub struct Delegate {
    name: Cow<'static, str>,
    service: BoxCloneSyncService<Request<Body>, Response, Infallible>,
}

impl Delegate {
    /// Wrap a tower service.
    pub fn from_service<S>(name: impl Into<Cow<'static, str>>, service: S) -> Self
    where
        S: Service<Request<Body>, Error = Infallible> + Clone + Send + Sync + 'static,
        S::Response: IntoResponse,
        S::Future: Send + 'static,
    {
        Self {
            name: name.into(),
            service: BoxCloneSyncService::new(service.map_response(IntoResponse::into_response)),
        }
    }

    /// Wrap an async closure.
    pub fn from_fn<F, Fut, R>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(Request<Body>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        Self::from_service(
            name,
            tower::service_fn(move |req| {
                let fut = f(req);
                async move { Ok::<_, Infallible>(fut.await) }
            }),
        )
    }

    /// Name used in logs and metrics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hand the exchange to the backend and wait for its answer.
    pub async fn answer(&self, req: Request<Body>) -> Response {
        match self.service.clone().oneshot(req).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

impl fmt::Debug for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegate").field("name", &self.name).finish()
    }
}
