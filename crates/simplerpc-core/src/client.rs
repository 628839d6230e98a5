//! Client: turns a method name and an argument into a request, sends it and
//! unpacks the response.

use crate::config::RpcConfig;
use crate::error::{Result, RpcError};
use crate::protocol::{JsonRpcRequest, JsonRpcResponse, Opaque};
use crate::transport::ClientTransport;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::debug;

/// JSON-RPC 2.0 client over any [`ClientTransport`].
///
/// Request ids start at 1 and increase by one per call. A client can be
/// shared between tasks; concurrent calls never reuse an id.
#[derive(Debug)]
pub struct Client<T> {
    transport: T,
    next_id: AtomicI64,
}

impl<T: ClientTransport> Client<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            next_id: AtomicI64::new(RpcConfig::FIRST_REQUEST_ID),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Call `method` with `arg` and decode the result into `R`.
    ///
    /// Fails with:
    /// - [`RpcError::NullParams`] if `arg` serializes to `null`
    /// - [`RpcError::Json`] if `arg` cannot be serialized or the result does
    ///   not decode into `R`
    /// - [`RpcError::Transport`] if the transport fails or the response is
    ///   malformed
    /// - [`RpcError::Remote`] with the server's error object otherwise
    pub async fn call<A, R>(&self, method: &str, arg: &A) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.round_trip(method, arg).await?;
        match response.unmarshal_result() {
            Some(decoded) => Ok(decoded?),
            None => Err(RpcError::transport_msg("response carries no result")),
        }
    }

    /// Call `method` and discard whatever it returns on success.
    pub async fn call_ignoring_result<A>(&self, method: &str, arg: &A) -> Result<()>
    where
        A: Serialize + ?Sized,
    {
        self.round_trip(method, arg).await.map(|_| ())
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn round_trip<A>(&self, method: &str, arg: &A) -> Result<JsonRpcResponse>
    where
        A: Serialize + ?Sized,
    {
        let params = Opaque::from_value(arg)?;
        if params.is_null() {
            return Err(RpcError::NullParams);
        }

        let request = JsonRpcRequest::new(method, params, self.next_id());
        request.validate().map_err(|e| RpcError::InvalidRequest {
            reason: e.reason().unwrap_or(&e.message).to_string(),
        })?;

        debug!(method, id = ?request.id, "Sending request");
        let mut response = self.transport.send_and_receive(&request).await?;

        response
            .validate()
            .map_err(|e| RpcError::transport_msg(format!("malformed response: {}", e)))?;

        if let Some(error) = response.error.take() {
            debug!(method, id = ?request.id, code = error.code, "Request failed");
            return Err(RpcError::Remote(error));
        }

        if response.id != request.id {
            return Err(RpcError::transport_msg(format!(
                "response id {:?} does not match request id {:?}",
                response.id, request.id
            )));
        }

        Ok(response)
    }
}
