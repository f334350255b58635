//! Settling RPC replies to push deliveries.
//!
//! An RPC server answers `200 OK` and reports failure in `grpc-status`,
//! usually as a trailer. The push sender only looks at the HTTP status, so a
//! failed call is turned into a `500` to make the sender redeliver.

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use http_body_util::BodyExt;

const GRPC_STATUS: &str = "grpc-status";
const GRPC_MESSAGE: &str = "grpc-message";

/// Buffer an RPC reply and map its `grpc-status` onto the HTTP status.
pub async fn settle_reply(response: Response) -> Response {
    let (parts, body) = response.into_parts();
    let collected = match body.collect().await {
        Ok(collected) => collected,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to read rpc reply");
            return (StatusCode::BAD_GATEWAY, format!("failed to read rpc reply: {err}")).into_response();
        }
    };
    let trailers = collected.trailers().cloned().unwrap_or_default();

    match rpc_status(&parts.headers, &trailers) {
        Some((code, message)) if code != "0" => {
            tracing::warn!(grpc_status = %code, grpc_message = %message, "Push delivery rejected by rpc backend");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("rpc call failed with status {code}: {message}"),
            )
                .into_response()
        }
        _ => Response::from_parts(parts, Body::from(collected.to_bytes())),
    }
}

fn rpc_status(headers: &HeaderMap, trailers: &HeaderMap) -> Option<(String, String)> {
    // trailers-only replies carry the status in the headers
    let source = if headers.contains_key(GRPC_STATUS) { headers } else { trailers };
    let code = source.get(GRPC_STATUS)?.to_str().ok()?.to_string();
    let message = source
        .get(GRPC_MESSAGE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    Some((code, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use bytes::Bytes;
    use http_body_util::{Full, StreamBody};
    use http_body::Frame;

    fn with_trailers(code: &'static str) -> Response {
        let mut trailers = HeaderMap::new();
        trailers.insert(GRPC_STATUS, HeaderValue::from_static(code));
        trailers.insert(GRPC_MESSAGE, HeaderValue::from_static("boom"));

        let frames = vec![
            Ok::<_, std::convert::Infallible>(Frame::data(Bytes::from_static(b"\0\0\0\0\0"))),
            Ok(Frame::trailers(trailers)),
        ];
        Response::new(Body::new(StreamBody::new(futures_util::stream::iter(frames))))
    }

    #[tokio::test]
    async fn ok_status_passes_through() {
        let response = settle_reply(with_trailers("0")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn failed_status_in_trailers_becomes_500() {
        let response = settle_reply(with_trailers("13")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"rpc call failed with status 13: boom");
    }

    #[tokio::test]
    async fn trailers_only_status_in_headers() {
        let mut response = Response::new(Body::new(Full::new(Bytes::new())));
        response.headers_mut().insert(GRPC_STATUS, HeaderValue::from_static("5"));
        let response = settle_reply(response).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn plain_reply_without_status() {
        let response = settle_reply((StatusCode::ACCEPTED, "ok").into_response()).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
