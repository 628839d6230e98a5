//! simplerpc - JSON-RPC 2.0 runtime.
//!
//! Expose ordinary functions as remotely callable methods and call them by
//! name with structured arguments. The crate holds the transport-independent
//! core: wire types, the method registry and dispatcher, the client, and the
//! transport traits. The HTTP binding lives in `simplerpc-http`.
//!
//! # Example
//!
//! ```rust,ignore
//! use simplerpc::{Client, InProcessTransport, Server};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> simplerpc::Result<()> {
//!     let server = Server::new().with_at_most_once();
//!     server.register_sync("add", |(a, b): (i64, i64)| Ok::<_, String>(a + b))?;
//!
//!     let client = Client::new(InProcessTransport::new(Arc::new(server)));
//!     let sum: i64 = client.call("add", &(1, 2)).await?;
//!     assert_eq!(sum, 3);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod dedup;
pub mod error;
pub mod method;
pub mod protocol;
pub mod server;
pub mod transport;

// Re-export commonly used types
pub use client::Client;
pub use config::{HttpConfig, RpcConfig};
pub use dedup::AtMostOnceFilter;
pub use error::{Result, RpcError};
pub use method::{CallFailure, Method, MethodSignature};
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, Opaque};
pub use server::{RpcService, Server, ServerBuilder};
pub use transport::{process_payload, ClientTransport, InProcessTransport, Outcome, ServerTransport};
