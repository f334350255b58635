//! Shared utilities for integration tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode};
use axum::response::IntoResponse;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use rpc_mux::config::ServerConfig;
use rpc_mux::http::{Server, ServerError, ServerState};
use rpc_mux::lifecycle::Shutdown;
use rpc_mux::routing::{Delegate, Multiplexer};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const PUSH_AGENT: &str = "APIs-Google; (+https://developers.google.com/webmasters/APIs-Google.html)";

/// Header every fake delegate stamps on its answer.
pub const SERVED_BY: &str = "x-served-by";

/// A multiplexer served on an ephemeral loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub state: watch::Receiver<ServerState>,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    pub async fn start(mux: Multiplexer) -> Self {
        Self::start_with(local_config(), mux).await
    }

    pub async fn start_with(config: ServerConfig, mux: Multiplexer) -> Self {
        rpc_mux::observability::init_test_logging();

        let server = Server::bind(&config).await.expect("bind test server");
        let addr = server.local_addr();
        let mut state = server.state();
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(server.serve(mux, shutdown.signaled()));
        state
            .wait_for(|s| *s == ServerState::Serving)
            .await
            .expect("server reaches serving");

        Self {
            addr,
            shutdown,
            state,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server's verdict.
    pub async fn stop(self) -> Result<(), ServerError> {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("server stops")
            .expect("server task completes")
    }
}

pub fn local_config() -> ServerConfig {
    ServerConfig {
        host: Some("127.0.0.1".into()),
        shutdown_timeout_secs: 2,
        ..ServerConfig::default()
    }
}

/// Client speaking cleartext HTTP/2 with prior knowledge.
pub fn h2c_client() -> reqwest::Client {
    reqwest::Client::builder()
        .http2_prior_knowledge()
        .build()
        .expect("h2c client")
}

/// Client speaking HTTP/1.1 only.
pub fn http1_client() -> reqwest::Client {
    reqwest::Client::builder().http1_only().build().expect("http1 client")
}

/// REST stand-in: echoes the body, copies the push metadata headers and
/// stamps its name.
pub fn gateway(name: &'static str) -> Delegate {
    Delegate::from_fn(name, move |req: Request<Body>| async move {
        let (parts, body) = req.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
        let mut response = (StatusCode::OK, body).into_response();
        copy_metadata(&parts.headers, response.headers_mut());
        response.headers_mut().insert(SERVED_BY, HeaderValue::from_static(name));
        response
    })
}

/// RPC stand-in: echoes the framed message and reports `status` in a header.
pub fn rpc_backend(name: &'static str, status: &'static str) -> Delegate {
    Delegate::from_fn(name, move |req: Request<Body>| async move {
        let version = format!("{:?}", req.version());
        let body = axum::body::to_bytes(req.into_body(), usize::MAX).await.unwrap_or_default();
        let mut response = (StatusCode::OK, body).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/grpc"));
        headers.insert("grpc-status", HeaderValue::from_static(status));
        headers.insert(SERVED_BY, HeaderValue::from_static(name));
        headers.insert("x-seen-version", HeaderValue::from_str(&version).unwrap());
        response
    })
}

/// Delegate that parks every exchange for `delay` before answering.
pub fn slow(name: &'static str, delay: Duration, entered: tokio::sync::mpsc::UnboundedSender<()>) -> Delegate {
    Delegate::from_fn(name, move |_req: Request<Body>| {
        let entered = entered.clone();
        async move {
            let _ = entered.send(());
            tokio::time::sleep(delay).await;
            (StatusCode::OK, name)
        }
    })
}

fn copy_metadata(from: &HeaderMap, to: &mut HeaderMap) {
    for (name, value) in from.iter() {
        if name.as_str().starts_with("grpc-metadata-") {
            to.append(HeaderName::clone(name), value.clone());
        }
    }
}

/// A push envelope as the push sender posts it.
pub fn envelope(payload: &[u8], attributes: serde_json::Value) -> String {
    serde_json::json!({
        "message": {
            "attributes": attributes,
            "data": STANDARD.encode(payload),
            "messageId": "2070443601311540",
            "message_id": "2070443601311540",
            "publishTime": "2021-02-26T19:13:55.749Z",
            "publish_time": "2021-02-26T19:13:55.749Z",
        },
        "subscription": "projects/myproject/subscriptions/mysubscription",
        "deliveryAttempt": 3,
    })
    .to_string()
}

/// Wrap `message` in the 5-byte RPC length prefix.
pub fn rpc_frame(message: &[u8]) -> Bytes {
    let mut frame = Vec::with_capacity(message.len() + 5);
    frame.push(0);
    frame.extend_from_slice(&(message.len() as u32).to_be_bytes());
    frame.extend_from_slice(message);
    Bytes::from(frame)
}

pub fn header_str<'a>(response: &'a reqwest::Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}
