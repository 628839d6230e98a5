//! Axum request handler for the JSON-RPC endpoint.

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use simplerpc::{process_payload, HttpConfig, JsonRpcError, JsonRpcResponse, Outcome, RpcService};
use std::sync::Arc;
use tracing::{debug, error};

/// Written when the response itself cannot be encoded.
const ENCODE_FAILURE_BODY: &str =
    r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#;

/// Handle one POSTed JSON-RPC request.
///
/// The body is taken as raw bytes so that malformed JSON is answered with a
/// `ParseError` response instead of axum's own rejection.
///
/// - body unreadable (e.g. over the size limit), parse or validation
///   failure: 400 with the error response
/// - dispatched (including method errors): 200
/// - response could not be encoded: 500
pub async fn handle_rpc(
    State(service): State<Arc<dyn RpcService>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let (status, response) = match body {
        Ok(body) => {
            let (outcome, response) = process_payload(service.as_ref(), &body).await;
            let status = match outcome {
                Outcome::ParseError | Outcome::InvalidRequest => StatusCode::BAD_REQUEST,
                Outcome::Dispatched => StatusCode::OK,
            };
            (status, response)
        }
        Err(rejection) => {
            debug!("Rejecting unreadable body: {}", rejection.body_text());
            let error = JsonRpcError::parse_error().with_reason(rejection.body_text());
            (StatusCode::BAD_REQUEST, JsonRpcResponse::failure(None, error))
        }
    };

    match serde_json::to_vec(&response) {
        Ok(bytes) => json_response(status, bytes),
        Err(e) => {
            error!("Failed to encode response for id {:?}: {}", response.id, e);
            json_response(StatusCode::INTERNAL_SERVER_ERROR, ENCODE_FAILURE_BODY.as_bytes().to_vec())
        }
    }
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response {
    (status, [(header::CONTENT_TYPE, HttpConfig::CONTENT_TYPE)], body).into_response()
}

#[cfg(test)]
mod tests {
    use crate::HttpServerTransport;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};
    use simplerpc::{HttpConfig, JsonRpcError, Server};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tower::ServiceExt;

    #[derive(Deserialize)]
    struct AddArgs {
        #[serde(rename = "A")]
        a: i64,
        #[serde(rename = "B")]
        b: i64,
    }

    #[derive(Serialize)]
    struct AddResult {
        #[serde(rename = "C")]
        c: i64,
    }

    fn app() -> Router {
        let server = Server::new();
        server
            .register_sync("add", |args: AddArgs| {
                Ok::<_, String>(AddResult { c: args.a + args.b })
            })
            .unwrap();
        HttpServerTransport::new(SocketAddr::from(([127, 0, 0, 1], 0))).router(Arc::new(server))
    }

    async fn post(app: Router, body: &str) -> (StatusCode, Option<String>, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/rpc")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, content_type, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_dispatched_request() {
        let (status, content_type, body) = post(
            app(),
            r#"{"jsonrpc":"2.0","method":"add","params":{"A":1,"B":2},"id":1}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert_eq!(body, json!({"jsonrpc": "2.0", "id": 1, "result": {"C": 3}}));
    }

    #[tokio::test]
    async fn test_method_errors_are_200() {
        let (status, _, body) = post(
            app(),
            r#"{"jsonrpc":"2.0","method":"add1","params":{"A":1,"B":2},"id":2}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"]["code"], JsonRpcError::METHOD_NOT_FOUND);
        assert_eq!(body["id"], 2);
    }

    #[tokio::test]
    async fn test_parse_error_is_400() {
        let (status, _, body) = post(app(), r#"{"jsonrpc":"2.0","method":"#).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], JsonRpcError::PARSE_ERROR);
        assert_eq!(body["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_invalid_request_is_400() {
        let (status, _, body) = post(
            app(),
            r#"{"jsonrpc":"1.0","method":"add","params":{"A":1,"B":2},"id":3}"#,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], JsonRpcError::INVALID_REQUEST);
        assert_eq!(body["error"]["data"]["reason"], "invalid jsonrpc version");
        assert_eq!(body["id"], 3);
    }

    #[tokio::test]
    async fn test_oversized_body_is_json_parse_error() {
        let padding = "x".repeat(HttpConfig::MAX_BODY_BYTES * 2);
        let body = format!(
            r#"{{"jsonrpc":"2.0","method":"add","params":"{}","id":4}}"#,
            padding
        );
        let (status, content_type, body) = post(app(), &body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert_eq!(body["error"]["code"], JsonRpcError::PARSE_ERROR);
        assert_eq!(body["id"], Value::Null);
        assert!(body["error"]["data"]["reason"].is_string());
    }

    #[tokio::test]
    async fn test_only_post_is_routed() {
        let request = Request::builder()
            .method("GET")
            .uri("/rpc")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
