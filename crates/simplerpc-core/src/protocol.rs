//! JSON-RPC 2.0 wire types.
//!
//! Requests and responses carry `params` and `result` as [`Opaque`] values:
//! the raw JSON text is kept as received and only decoded once the consumer
//! knows the concrete type. Only the registry knows a method's argument type,
//! so the codec never interprets those payloads itself.
//!
//! ```text
//! {"jsonrpc":"2.0","method":"add","params":{"A":1,"B":2},"id":1}
//! {"jsonrpc":"2.0","id":1,"result":{"C":3}}
//! ```

use crate::config::RpcConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;
use std::fmt;

/// A JSON value kept in serialized form until it is decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Opaque(Box<RawValue>);

impl Opaque {
    /// Serialize `value` into an opaque payload.
    pub fn from_value<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Self> {
        serde_json::value::to_raw_value(value).map(Self)
    }

    /// Wrap JSON text, validating that it is well-formed.
    pub fn from_json(json: impl Into<String>) -> serde_json::Result<Self> {
        RawValue::from_string(json.into()).map(Self)
    }

    /// Decode the payload into the target shape.
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(self.0.get())
    }

    /// The raw JSON text.
    pub fn get(&self) -> &str {
        self.0.get()
    }

    /// Size of the raw JSON text in bytes.
    pub fn len(&self) -> usize {
        self.0.get().len()
    }

    /// Pairs with [`Opaque::len`]. Always `false` in practice: the payload
    /// is validated JSON, which is never empty text.
    pub fn is_empty(&self) -> bool {
        self.0.get().is_empty()
    }

    /// Whether the payload is the JSON literal `null`.
    pub fn is_null(&self) -> bool {
        self.0.get().trim() == "null"
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

impl Eq for Opaque {}

impl fmt::Display for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.get())
    }
}

/// Keeps an explicit `null` as `Some`, so only a missing key maps to `None`.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Opaque>, D::Error>
where
    D: Deserializer<'de>,
{
    Opaque::deserialize(deserializer).map(Some)
}

/// JSON-RPC 2.0 request.
///
/// Missing `jsonrpc`/`method` keys decode to empty strings so that they are
/// reported by [`JsonRpcRequest::validate`] as an invalid request rather than
/// as a parse error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub method: String,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub params: Option<Opaque>,
    #[serde(default)]
    pub id: Option<i64>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC 2.0 request.
    pub fn new(method: impl Into<String>, params: Opaque, id: i64) -> Self {
        Self {
            jsonrpc: RpcConfig::JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: Some(params),
            id: Some(id),
        }
    }

    /// Check the request against the JSON-RPC 2.0 contract.
    ///
    /// This runtime does not support notifications, so `id` is required.
    pub fn validate(&self) -> Result<(), JsonRpcError> {
        if self.jsonrpc != RpcConfig::JSONRPC_VERSION {
            return Err(JsonRpcError::invalid_request().with_reason("invalid jsonrpc version"));
        }
        if self.method.is_empty() {
            return Err(JsonRpcError::invalid_request().with_reason("method should not be empty"));
        }
        if self.id.is_none() {
            return Err(JsonRpcError::invalid_request().with_reason("id should not be nil"));
        }
        Ok(())
    }

    /// Decode `params` into the shape a method expects.
    ///
    /// Absent params are always rejected, even for shapes that would accept
    /// an empty object.
    pub fn unmarshal_params<T: DeserializeOwned>(&self) -> Result<T, JsonRpcError> {
        let params = self
            .params
            .as_ref()
            .ok_or_else(|| JsonRpcError::invalid_params().with_reason("params should not be nil"))?;

        params
            .decode()
            .map_err(|e| JsonRpcError::invalid_params().with_reason(e.to_string()))
    }
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: String,
    pub id: Option<i64>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Opaque>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Option<i64>, result: Opaque) -> Self {
        Self {
            jsonrpc: RpcConfig::JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn failure(id: Option<i64>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: RpcConfig::JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Check that exactly one of `result`/`error` is set.
    pub fn validate(&self) -> Result<(), JsonRpcError> {
        if self.jsonrpc != RpcConfig::JSONRPC_VERSION {
            return Err(JsonRpcError::internal_error().with_reason("invalid jsonrpc version"));
        }
        match (&self.result, &self.error) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            (None, None) => Err(JsonRpcError::internal_error()
                .with_reason("either result or error should be set")),
            (Some(_), Some(_)) => Err(JsonRpcError::internal_error()
                .with_reason("result and error must not both be set")),
        }
    }

    /// Decode `result` into the caller's type.
    pub fn unmarshal_result<T: DeserializeOwned>(&self) -> Option<serde_json::Result<T>> {
        self.result.as_ref().map(Opaque::decode)
    }
}

/// JSON-RPC 2.0 error object.
///
/// This is also the error a client hands back for a protocol-level failure,
/// so callers can inspect `code`, `message` and `data` directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    /// Invalid JSON was received by the server.
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid Request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method does not exist / is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameter(s).
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Start of the -32000..-32099 block reserved for implementation-defined
    /// server errors.
    pub const SERVER_ERROR: i32 = -32000;
    /// Duplicate request id under the at-most-once policy.
    pub const AT_MOST_ONCE: i32 = -31000;
    /// Error returned by the registered function itself.
    pub const APPLICATION: i32 = -1;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error() -> Self {
        Self::new(Self::PARSE_ERROR, "Parse error")
    }

    pub fn invalid_request() -> Self {
        Self::new(Self::INVALID_REQUEST, "Invalid Request")
    }

    pub fn method_not_found() -> Self {
        Self::new(Self::METHOD_NOT_FOUND, "Method not found")
    }

    pub fn invalid_params() -> Self {
        Self::new(Self::INVALID_PARAMS, "Invalid params")
    }

    pub fn internal_error() -> Self {
        Self::new(Self::INTERNAL_ERROR, "Internal error")
    }

    pub fn server_error() -> Self {
        Self::new(Self::SERVER_ERROR, "Server error")
    }

    pub fn at_most_once() -> Self {
        Self::new(Self::AT_MOST_ONCE, "Duplicate request id (at-most-once)")
    }

    /// A failure reported by the registered function.
    pub fn application(message: impl Into<String>) -> Self {
        Self::new(Self::APPLICATION, message)
    }

    /// Attach a `{"reason": ...}` payload to `data`.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.data = Some(serde_json::json!({ "reason": reason.into() }));
        self
    }

    /// The reason attached with [`JsonRpcError::with_reason`], if any.
    pub fn reason(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|data| data.get("reason"))
            .and_then(|reason| reason.as_str())
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "jsonrpc2 error {}: {}", self.code, self.message)?;
        if let Some(data) = &self.data {
            write!(f, " ({})", data)?;
        }
        Ok(())
    }
}

impl std::error::Error for JsonRpcError {}
