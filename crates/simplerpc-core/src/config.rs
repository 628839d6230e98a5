//! Centralized configuration for simplerpc.
//!
//! Protocol constants and the defaults used by the transports.

use std::time::Duration;

/// Protocol-level configuration.
pub struct RpcConfig;

impl RpcConfig {
    pub const JSONRPC_VERSION: &'static str = "2.0";
    /// First id handed out by a fresh client. Ids are never zero.
    pub const FIRST_REQUEST_ID: i64 = 1;
}

/// HTTP binding defaults.
pub struct HttpConfig;

impl HttpConfig {
    pub const DEFAULT_PATH: &'static str = "/rpc";
    pub const CONTENT_TYPE: &'static str = "application/json";
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const MAX_BODY_BYTES: usize = 1_048_576; // 1MB
    pub const USER_AGENT: &'static str = concat!("simplerpc/", env!("CARGO_PKG_VERSION"));
}
