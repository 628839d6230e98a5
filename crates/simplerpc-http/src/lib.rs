//! simplerpc-http - HTTP binding for simplerpc.
//!
//! One JSON-RPC request per HTTP POST, `application/json` both ways.
//!
//! ```rust,ignore
//! use simplerpc::{Client, Server};
//! use simplerpc_http::{HttpClientTransport, HttpServerTransport};
//! use std::sync::Arc;
//!
//! let server = Server::new();
//! server.register_sync("echo", |s: String| Ok::<_, String>(s))?;
//!
//! let handle = HttpServerTransport::new("127.0.0.1:0".parse()?)
//!     .start(Arc::new(server))
//!     .await?;
//!
//! let client = Client::new(HttpClientTransport::new(handle.url())?);
//! let reply: String = client.call("echo", "hi").await?;
//! ```

pub mod client;
pub mod handler;
pub mod server;

pub use client::HttpClientTransport;
pub use server::{HttpServerHandle, HttpServerTransport};
