//! Integration tests for the HTTP binding.
//!
//! Each test starts a real server on an OS-assigned port and talks to it
//! over a socket, either with raw reqwest posts or with a `Client`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use simplerpc::{Client, JsonRpcError, RpcError, Server};
use simplerpc_http::{HttpClientTransport, HttpServerHandle, HttpServerTransport};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize)]
struct AddArgs {
    #[serde(rename = "A")]
    a: i64,
    #[serde(rename = "B")]
    b: i64,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct AddResult {
    #[serde(rename = "C")]
    c: i64,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("simplerpc=debug,simplerpc_http=debug")
        .with_test_writer()
        .try_init();
}

fn arith_server(at_most_once: bool) -> Server {
    let server = Server::builder().at_most_once(at_most_once).build();
    server
        .register_sync("add", |args: AddArgs| {
            Ok::<_, String>(AddResult { c: args.a + args.b })
        })
        .unwrap();
    server
        .register("err", |_: AddArgs| async {
            Err::<AddResult, _>(anyhow::anyhow!("error"))
        })
        .unwrap();
    server
}

async fn start(server: Server) -> HttpServerHandle {
    init_tracing();
    HttpServerTransport::new(SocketAddr::from(([127, 0, 0, 1], 0)))
        .start(Arc::new(server))
        .await
        .unwrap()
}

/// POST a raw body and return the status and decoded JSON payload.
async fn post_raw(url: &str, body: &str) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(url)
        .header("Content-Type", "application/json")
        .body(body.to_string())
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .unwrap();

    let status = response.status().as_u16();
    (status, response.json::<Value>().await.unwrap())
}

async fn rpc_call_raw(url: &str, method: &str, params: Value, id: i64) -> (u16, Value) {
    let body = json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": id
    });
    post_raw(url, &body.to_string()).await
}

#[tokio::test]
async fn test_add_over_http() {
    let handle = start(arith_server(false)).await;

    let (status, body) = rpc_call_raw(&handle.url(), "add", json!({"A": 1, "B": 2}), 1).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"jsonrpc": "2.0", "id": 1, "result": {"C": 3}}));
}

#[tokio::test]
async fn test_error_scenarios_over_http() {
    let handle = start(arith_server(false)).await;
    let url = handle.url();

    let (status, body) = rpc_call_raw(&url, "add1", json!({"A": 1, "B": 2}), 2).await;
    assert_eq!(status, 200);
    assert_eq!(body["error"]["code"], JsonRpcError::METHOD_NOT_FOUND);
    assert!(body.get("result").is_none());

    let (status, body) = rpc_call_raw(&url, "add", json!({"A": "foo"}), 3).await;
    assert_eq!(status, 200);
    assert_eq!(body["error"]["code"], JsonRpcError::INVALID_PARAMS);

    let (status, body) = rpc_call_raw(&url, "err", json!({"A": 1, "B": 2}), 4).await;
    assert_eq!(status, 200);
    assert_eq!(body["error"], json!({"code": -1, "message": "error"}));
    assert_eq!(body["id"], 4);
}

#[tokio::test]
async fn test_malformed_payloads_are_400() {
    let handle = start(arith_server(false)).await;
    let url = handle.url();

    let (status, body) = post_raw(&url, "this is not json").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], JsonRpcError::PARSE_ERROR);
    assert_eq!(body["id"], Value::Null);

    let (status, body) = post_raw(&url, r#"{"jsonrpc":"2.0","method":"add","params":{"A":1,"B":2}}"#).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], JsonRpcError::INVALID_REQUEST);
    assert_eq!(body["error"]["data"]["reason"], "id should not be nil");
}

#[tokio::test]
async fn test_client_over_http() {
    let handle = start(arith_server(false)).await;
    let client = Client::new(HttpClientTransport::new(handle.url()).unwrap());

    let result: AddResult = client.call("add", &AddArgs { a: 20, b: 22 }).await.unwrap();
    assert_eq!(result, AddResult { c: 42 });

    let err = client
        .call::<_, AddResult>("err", &AddArgs { a: 1, b: 2 })
        .await
        .unwrap_err();
    assert_eq!(err.as_remote().map(|e| e.message.as_str()), Some("error"));

    let err = client
        .call::<_, AddResult>("add1", &AddArgs { a: 1, b: 2 })
        .await
        .unwrap_err();
    assert_eq!(err.to_rpc_error_code(), JsonRpcError::METHOD_NOT_FOUND);

    let err = client
        .call::<_, AddResult>("add", &Option::<AddArgs>::None)
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::NullParams));
}

#[tokio::test]
async fn test_at_most_once_over_http() {
    let handle = start(arith_server(true)).await;
    let url = handle.url();

    let (_, first) = rpc_call_raw(&url, "add", json!({"A": 1, "B": 2}), 7).await;
    assert_eq!(first["result"], json!({"C": 3}));

    let (status, dup) = rpc_call_raw(&url, "add", json!({"A": 5, "B": 5}), 7).await;
    assert_eq!(status, 200);
    assert_eq!(dup["error"]["code"], JsonRpcError::AT_MOST_ONCE);
    assert_eq!(dup["id"], 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_ids_execute_once_under_load() {
    let server = Server::new().with_at_most_once();
    let executions = Arc::new(AtomicUsize::new(0));
    let counter = executions.clone();
    server
        .register_sync("touch", move |_: Value| {
            Ok::<_, String>(counter.fetch_add(1, Ordering::SeqCst))
        })
        .unwrap();

    let handle = start(server).await;
    let url = Arc::new(handle.url());

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let url = url.clone();
            tokio::spawn(async move { rpc_call_raw(&url, "touch", json!({}), 100).await })
        })
        .collect();

    let mut rejected = 0;
    for task in tasks {
        let (_, body) = task.await.unwrap();
        if body.get("error").is_some() {
            assert_eq!(body["error"]["code"], JsonRpcError::AT_MOST_ONCE);
            rejected += 1;
        }
    }

    assert_eq!(rejected, 15);
    assert_eq!(executions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_calls_fail_after_stop() {
    let handle = start(arith_server(false)).await;
    let url = handle.url();

    {
        let client = Client::new(HttpClientTransport::new(url.clone()).unwrap());
        let _: AddResult = client.call("add", &AddArgs { a: 1, b: 1 }).await.unwrap();
    }

    handle.stop().await.unwrap();

    let client = Client::new(HttpClientTransport::new(url).unwrap());
    let err = client
        .call::<_, AddResult>("add", &AddArgs { a: 1, b: 1 })
        .await
        .unwrap_err();
    assert!(err.is_transport());
}
