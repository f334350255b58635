//! rpc-mux
//!
//! Serves RPC, a REST gateway and push deliveries on one port.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌───────────────────────────────────────────────────┐
//!                  │                      RPC-MUX                      │
//!                  │                                                   │
//!   h2c / HTTP/1.1 │  ┌──────────┐   ┌──────────┐   ┌──────────────┐   │
//!  ────────────────┼─▶│   net    │──▶│   http   │──▶│   routing    │   │
//!                  │  │ listener │   │  server  │   │ multiplexer  │   │
//!                  │  └──────────┘   └──────────┘   └──────┬───────┘   │
//!                  │                                       │           │
//!                  │             ┌─────────────┬───────────┼──────┐    │
//!                  │             ▼             ▼           ▼      ▼    │
//!                  │       ┌──────────┐  ┌─────────┐  ┌─────────┐ 404  │
//!                  │       │   push   │  │   rpc   │  │ gateway │      │
//!                  │       │ unwrap   │─▶│delegate │  │delegate │      │
//!                  │       └──────────┘  └─────────┘  └─────────┘      │
//!                  │                                                   │
//!                  │  config · lifecycle · observability               │
//!                  └───────────────────────────────────────────────────┘
//! ```
//!
//! The binary wires in-process echo backends; embedders build their own
//! [`Multiplexer`] from the library.

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use clap::Parser;
use std::path::PathBuf;
use tower_http::trace::TraceLayer;

use rpc_mux::config::{load_config, MuxConfig};
use rpc_mux::http::Server;
use rpc_mux::lifecycle::{signals, Shutdown};
use rpc_mux::observability;
use rpc_mux::push::PayloadEncoding;
use rpc_mux::routing::{Delegate, Handler, Multiplexer, PushRoutes};

#[derive(Debug, Parser)]
#[command(name = "rpc-mux", version, about = "Serve RPC, REST and push traffic on one port")]
struct Args {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind, overrides the config file.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (0 = ephemeral), overrides the config file.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => MuxConfig::default(),
    };
    if let Some(host) = args.host {
        config.server.host = Some(host);
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    observability::init_tracing(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rpc-mux starting");
    tracing::info!(
        host = %config.server.bind_host(),
        port = config.server.port,
        shutdown_timeout_secs = config.server.shutdown_timeout_secs,
        max_connections = config.server.max_connections,
        "Configuration loaded"
    );

    if let Err(err) = observability::init_from_config(&config.observability) {
        tracing::error!(error = %err, "Metrics disabled");
    }

    let mux = build_multiplexer(&config);
    let server = Server::bind(&config.server).await?;
    tracing::info!(address = %server.local_addr(), "Listening for connections");

    let shutdown = Shutdown::new();
    let _signals = signals::spawn_signal_handler(shutdown.clone());
    server.serve(mux, shutdown.signaled()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn build_multiplexer(config: &MuxConfig) -> Multiplexer {
    let gateway = Delegate::from_service("echo-gateway", echo_gateway());
    let rpc = Delegate::from_fn("echo-rpc", echo_rpc);
    let routes = PushRoutes::new()
        .route(PayloadEncoding::Http, gateway.clone())
        .route(PayloadEncoding::Rpc, rpc.clone());

    // rpc first: a real rpc call may carry the push sender's user agent
    Multiplexer::builder()
        .handler(Handler::rpc(rpc.clone()))
        .handler(Handler::push_from_config(&config.push, routes))
        .handler(Handler::rpc_web(rpc))
        .handler(Handler::http(gateway).named("gateway"))
        .build()
}

/// REST side: answers every path with the request body and its metadata headers.
fn echo_gateway() -> Router {
    Router::new()
        .fallback(echo_http)
        .layer(TraceLayer::new_for_http())
}

async fn echo_http(headers: HeaderMap, body: Bytes) -> Response {
    let mut response = (StatusCode::OK, body).into_response();
    for (name, value) in headers.iter() {
        if name.as_str().starts_with("grpc-metadata-") {
            response.headers_mut().append(name.clone(), value.clone());
        }
    }
    response
}

const GRPC_STATUS: header::HeaderName = header::HeaderName::from_static("grpc-status");

/// RPC side: returns the request message unchanged with an OK status.
async fn echo_rpc(req: Request<Body>) -> Response {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/grpc"));

    match axum::body::to_bytes(req.into_body(), usize::MAX).await {
        Ok(frame) => {
            let headers = [
                (header::CONTENT_TYPE, content_type),
                (GRPC_STATUS, HeaderValue::from_static("0")),
            ];
            (headers, frame).into_response()
        }
        Err(err) => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Version;

    #[tokio::test]
    async fn rpc_is_tried_before_push() {
        let mux = build_multiplexer(&MuxConfig::default());
        let names: Vec<_> = mux.handlers().iter().map(|h| h.name().to_string()).collect();
        assert_eq!(names, ["rpc", "push", "rpc-web", "gateway"]);

        let req = Request::post("/echo.Echo/Say")
            .version(Version::HTTP_2)
            .header(header::CONTENT_TYPE, "application/grpc")
            .header(header::USER_AGENT, "APIs-Google grpc-go/1.60")
            .body(Body::from(&b"\0\0\0\0\0"[..]))
            .unwrap();
        let response = mux.dispatch(req).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[GRPC_STATUS], "0");
    }

    #[tokio::test]
    async fn push_delivery_reaches_echo_gateway() {
        let mux = build_multiplexer(&MuxConfig::default());
        let req = Request::post("/v1/echo")
            .header(header::USER_AGENT, "APIs-Google")
            .body(Body::from(r#"{"message":{"data":"eyJ4IjoxfQ==","messageId":"m1"},"subscription":"s1"}"#))
            .unwrap();
        let response = mux.dispatch(req).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["grpc-metadata-x-pubsub-message-id"], "m1");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"x":1}"#);
    }
}
