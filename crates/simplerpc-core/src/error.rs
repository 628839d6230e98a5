//! Error types for simplerpc.
//!
//! `RpcError` is what the local side of the runtime reports: registration
//! failures, client-side encode/validation failures, transport faults and
//! protocol errors returned by a remote server. The wire-level error object
//! lives in [`crate::protocol::JsonRpcError`].

use crate::protocol::JsonRpcError;
use thiserror::Error;

/// Boxed error used as the source of transport and I/O failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for simplerpc.
#[derive(Debug, Error)]
pub enum RpcError {
    // Registration errors
    #[error("multiple registrations for {name}")]
    DuplicateMethod { name: String },

    #[error("invalid method {name:?}: {reason}")]
    InvalidMethod { name: String, reason: String },

    // Client-side request errors
    #[error("params must not be null")]
    NullParams,

    #[error("Invalid Request: {reason}")]
    InvalidRequest { reason: String },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Transport errors
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // Protocol errors returned by the server
    #[error(transparent)]
    Remote(#[from] JsonRpcError),
}

/// Result type alias for simplerpc operations.
pub type Result<T> = std::result::Result<T, RpcError>;

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        RpcError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<std::io::Error> for RpcError {
    fn from(err: std::io::Error) -> Self {
        RpcError::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl RpcError {
    /// Create a transport error with an underlying cause.
    pub fn transport(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        RpcError::Transport {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a transport error without an underlying cause.
    pub fn transport_msg(message: impl Into<String>) -> Self {
        RpcError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Remote errors keep the code the server sent. Local errors map onto
    /// the closest standard code:
    /// - -32700: local JSON encode or decode failure, including an argument
    ///   that could not be serialized
    /// - -32600: request failed validation before sending
    /// - -32602: params were null
    /// - -32603: registration failures
    /// - -32000: transport or I/O failure
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            RpcError::Remote(err) => err.code,
            RpcError::Json { .. } => JsonRpcError::PARSE_ERROR,
            RpcError::InvalidRequest { .. } => JsonRpcError::INVALID_REQUEST,
            RpcError::NullParams => JsonRpcError::INVALID_PARAMS,
            RpcError::DuplicateMethod { .. } | RpcError::InvalidMethod { .. } => {
                JsonRpcError::INTERNAL_ERROR
            }
            RpcError::Transport { .. } | RpcError::Io { .. } => JsonRpcError::SERVER_ERROR,
        }
    }

    /// Check if this error came from the transport rather than the protocol.
    pub fn is_transport(&self) -> bool {
        matches!(self, RpcError::Transport { .. } | RpcError::Io { .. })
    }

    /// The remote protocol error, if the server answered with one.
    pub fn as_remote(&self) -> Option<&JsonRpcError> {
        match self {
            RpcError::Remote(err) => Some(err),
            _ => None,
        }
    }
}
