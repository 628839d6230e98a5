//! Transport contracts plus the shared payload pipeline.
//!
//! A server transport receives request bytes, hands them to
//! [`process_payload`] and writes back the response it returns. A client
//! transport delivers one request and returns the decoded response.
//! [`InProcessTransport`] connects the two inside a single process.

use crate::error::Result;
use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::server::RpcService;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Accepts requests from some medium and answers them through a service.
#[async_trait]
pub trait ServerTransport: Send + Sync {
    /// Serve requests until the transport shuts down.
    async fn serve(&self, service: Arc<dyn RpcService>) -> Result<()>;
}

/// Delivers a request to a server and waits for its response.
#[async_trait]
pub trait ClientTransport: Send + Sync {
    async fn send_and_receive(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse>;
}

#[async_trait]
impl<T: ClientTransport + ?Sized> ClientTransport for Arc<T> {
    async fn send_and_receive(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        (**self).send_and_receive(request).await
    }
}

/// How far a payload got through [`process_payload`].
///
/// Transports use this to pick a status for the response, e.g. HTTP 400 for
/// payloads that never reached a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The payload was not valid JSON.
    ParseError,
    /// The payload decoded but is not a valid request.
    InvalidRequest,
    /// The request was handed to the service.
    Dispatched,
}

/// Run raw request bytes through decode, validation and dispatch.
///
/// Never fails: every problem is turned into an error response. A response
/// produced by the service that is itself malformed is replaced with
/// `InternalError`.
pub async fn process_payload(
    service: &dyn RpcService,
    payload: &[u8],
) -> (Outcome, JsonRpcResponse) {
    let request: JsonRpcRequest = match serde_json::from_slice(payload) {
        Ok(request) => request,
        Err(e) => {
            debug!("Rejecting unparseable payload: {}", e);
            let error = JsonRpcError::parse_error().with_reason(e.to_string());
            return (Outcome::ParseError, JsonRpcResponse::failure(None, error));
        }
    };

    if let Err(error) = request.validate() {
        debug!("Rejecting invalid request: {}", error);
        return (
            Outcome::InvalidRequest,
            JsonRpcResponse::failure(request.id, error),
        );
    }

    let response = service.serve_rpc(&request).await;
    if let Err(error) = response.validate() {
        warn!(method = %request.method, "Service produced an invalid response: {}", error);
        return (
            Outcome::Dispatched,
            JsonRpcResponse::failure(request.id, error),
        );
    }

    (Outcome::Dispatched, response)
}

/// Client transport that calls a service directly, without a network.
///
/// Requests and responses still go through their JSON encoding so the
/// behavior matches a real transport byte for byte.
#[derive(Clone)]
pub struct InProcessTransport {
    service: Arc<dyn RpcService>,
}

impl InProcessTransport {
    pub fn new(service: Arc<dyn RpcService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ClientTransport for InProcessTransport {
    async fn send_and_receive(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        let payload = serde_json::to_vec(request)?;
        let (_, response) = process_payload(self.service.as_ref(), &payload).await;
        let encoded = serde_json::to_vec(&response)?;
        Ok(serde_json::from_slice(&encoded)?)
    }
}
