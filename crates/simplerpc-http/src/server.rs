//! HTTP server transport using Axum.
//!
//! The transport is both a router factory and a serve entry point: mount
//! [`HttpServerTransport::router`] into an existing application, or let
//! [`HttpServerTransport::start`] bind and run it in the background.

use crate::handler::handle_rpc;
use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;
use simplerpc::{HttpConfig, Result, RpcError, RpcService, ServerTransport};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Serves JSON-RPC over HTTP POST on a single path.
#[derive(Debug, Clone)]
pub struct HttpServerTransport {
    addr: SocketAddr,
    path: String,
}

impl HttpServerTransport {
    /// Serve on `addr` at [`HttpConfig::DEFAULT_PATH`]. Port 0 picks a free port.
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            path: HttpConfig::DEFAULT_PATH.to_string(),
        }
    }

    /// Mount the endpoint at `path` instead of the default.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Build the router answering on the configured path.
    pub fn router(&self, service: Arc<dyn RpcService>) -> Router {
        Router::new()
            .route(&self.path, post(handle_rpc))
            .layer(DefaultBodyLimit::max(HttpConfig::MAX_BODY_BYTES))
            .layer(TraceLayer::new_for_http())
            .with_state(service)
    }

    /// Bind the listener and serve in a background task.
    ///
    /// Returns once the socket is bound, so the handle's address is usable
    /// immediately.
    pub async fn start(&self, service: Arc<dyn RpcService>) -> Result<HttpServerHandle> {
        let listener = self.bind().await?;
        let addr = listener.local_addr()?;
        let app = self.router(service);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task_handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            match &result {
                Ok(()) => info!("HTTP server on {} stopped", addr),
                Err(e) => error!("HTTP server on {} failed: {}", addr, e),
            }
            result
        });

        Ok(HttpServerHandle {
            addr,
            path: self.path.clone(),
            shutdown_tx: Some(shutdown_tx),
            task_handle: Some(task_handle),
        })
    }

    async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| RpcError::Io {
            message: format!("failed to bind {}: {}", self.addr, e),
            source: Some(e),
        })?;
        let local_addr = listener.local_addr()?;
        info!("JSON-RPC server listening on http://{}{}", local_addr, self.path);
        Ok(listener)
    }
}

#[async_trait::async_trait]
impl ServerTransport for HttpServerTransport {
    /// Bind and serve in the current task until the server fails.
    async fn serve(&self, service: Arc<dyn RpcService>) -> Result<()> {
        let listener = self.bind().await?;
        axum::serve(listener, self.router(service)).await?;
        Ok(())
    }
}

/// Handle to a running HTTP server. Dropping shuts down the server.
pub struct HttpServerHandle {
    addr: SocketAddr,
    path: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task_handle: Option<JoinHandle<std::io::Result<()>>>,
}

impl HttpServerHandle {
    /// Get the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Full URL of the JSON-RPC endpoint.
    pub fn url(&self) -> String {
        format!("http://{}{}", self.addr, self.path)
    }

    /// Stop accepting connections and let in-flight requests finish.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Shut down and wait for the server task to exit.
    pub async fn stop(mut self) -> Result<()> {
        self.shutdown();
        match self.task_handle.take() {
            Some(handle) => match handle.await {
                Ok(result) => result.map_err(RpcError::from),
                Err(e) => Err(RpcError::transport("HTTP server task failed", e)),
            },
            None => Ok(()),
        }
    }
}

impl Drop for HttpServerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}
