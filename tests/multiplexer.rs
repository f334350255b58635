//! One port, every protocol: routing through a bound server.

use axum::http::StatusCode;
use rpc_mux::http::NO_HANDLER_FULFILLED;
use rpc_mux::push::{EnvelopeInterceptor, PayloadEncoding};
use rpc_mux::routing::{Handler, Multiplexer, PushRoutes, PushSelector};

mod common;

use common::{gateway, header_str, rpc_backend, TestServer, SERVED_BY};

fn full_stack() -> Multiplexer {
    let routes = PushRoutes::new()
        .route(PayloadEncoding::Http, gateway("push-gateway"))
        .route(PayloadEncoding::Rpc, rpc_backend("push-rpc", "0"));

    Multiplexer::builder()
        .handler(Handler::push(PushSelector::default(), EnvelopeInterceptor::default(), routes))
        .handler(Handler::rpc(rpc_backend("rpc", "0")))
        .handler(Handler::http(gateway("gateway")))
        .build()
}

#[tokio::test]
async fn rpc_over_h2c_reaches_rpc_delegate() {
    let server = TestServer::start(full_stack()).await;

    let frame = common::rpc_frame(b"hello");
    let response = common::h2c_client()
        .post(server.url("/echo.Echo/Say"))
        .header("content-type", "application/grpc+proto")
        .body(frame.clone())
        .send()
        .await
        .unwrap();

    assert_eq!(response.version(), reqwest::Version::HTTP_2);
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, SERVED_BY), Some("rpc"));
    assert_eq!(header_str(&response, "grpc-status"), Some("0"));
    assert_eq!(response.bytes().await.unwrap(), frame);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn rest_over_http1_reaches_gateway() {
    let server = TestServer::start(full_stack()).await;

    let response = common::http1_client()
        .post(server.url("/v1/echo"))
        .header("content-type", "application/json")
        .body(r#"{"value":"hi"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.version(), reqwest::Version::HTTP_11);
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, SERVED_BY), Some("gateway"));
    assert_eq!(response.text().await.unwrap(), r#"{"value":"hi"}"#);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn rest_over_h2c_is_not_mistaken_for_rpc() {
    let server = TestServer::start(full_stack()).await;

    let response = common::h2c_client()
        .get(server.url("/v1/echo"))
        .header("content-type", "application/json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.version(), reqwest::Version::HTTP_2);
    assert_eq!(header_str(&response, SERVED_BY), Some("gateway"));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn rpc_content_type_over_http1_is_not_rpc() {
    let server = TestServer::start(full_stack()).await;

    let response = common::http1_client()
        .post(server.url("/echo.Echo/Say"))
        .header("content-type", "application/grpc")
        .body("x")
        .send()
        .await
        .unwrap();

    assert_eq!(header_str(&response, SERVED_BY), Some("gateway"));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn unclaimed_exchange_gets_fixed_answer() {
    let mux = Multiplexer::builder().handler(Handler::rpc(rpc_backend("rpc", "0"))).build();
    let server = TestServer::start(mux).await;

    let response = common::http1_client()
        .get(server.url("/index.html"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.text().await.unwrap(), NO_HANDLER_FULFILLED);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn concurrent_exchanges_on_one_h2c_connection() {
    let server = TestServer::start(full_stack()).await;
    let client = common::h2c_client();

    let calls: Vec<_> = (0..16)
        .map(|i| {
            let client = client.clone();
            let url = server.url("/echo.Echo/Say");
            tokio::spawn(async move {
                let message = format!("message-{i}");
                let response = client
                    .post(url)
                    .header("content-type", "application/grpc")
                    .body(common::rpc_frame(message.as_bytes()))
                    .send()
                    .await
                    .unwrap();
                let body = response.bytes().await.unwrap();
                (message, body)
            })
        })
        .collect();

    for call in calls {
        let (message, body) = call.await.unwrap();
        assert_eq!(&body[5..], message.as_bytes());
    }

    server.stop().await.unwrap();
}
