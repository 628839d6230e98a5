//! Server dispatcher: method registry plus per-request policy.
//!
//! For each request the server looks the method up, applies the optional
//! at-most-once filter and hands the request to the method's invoker.
//!
//! # Thread Safety
//!
//! The registry sits behind an `RwLock`: registration takes the write lock,
//! every lookup takes the read lock and releases it before the method runs,
//! so any number of requests can be served concurrently. The at-most-once
//! filter performs its check-and-mark atomically.

use crate::dedup::AtMostOnceFilter;
use crate::error::{Result, RpcError};
use crate::method::{Method, MethodSignature};
use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, Opaque};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, trace, warn};

/// Anything that turns a validated request into a response.
///
/// Implemented by [`Server`]; server transports only depend on this trait.
#[async_trait::async_trait]
pub trait RpcService: Send + Sync + 'static {
    /// Dispatch one request. Always returns a well-formed response.
    async fn serve_rpc(&self, request: &JsonRpcRequest) -> JsonRpcResponse;
}

/// JSON-RPC 2.0 server: registers methods and serves requests.
pub struct Server {
    methods: RwLock<HashMap<String, Arc<Method>>>,
    at_most_once: Option<AtMostOnceFilter>,
    verbose: bool,
}

impl Server {
    /// Create a server with no methods and at-most-once disabled.
    pub fn new() -> Self {
        Self {
            methods: RwLock::new(HashMap::new()),
            at_most_once: None,
            verbose: false,
        }
    }

    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Enable at-most-once dispatch with an unbounded id filter.
    ///
    /// ```rust,ignore
    /// let server = Server::new().with_at_most_once();
    /// server.register_sync("add", add)?;
    /// ```
    pub fn with_at_most_once(mut self) -> Self {
        self.at_most_once = Some(AtMostOnceFilter::unbounded());
        self
    }

    /// Whether duplicate request ids are rejected.
    pub fn is_at_most_once(&self) -> bool {
        self.at_most_once.is_some()
    }

    /// Register an async function under `name`.
    pub fn register<F, Fut, In, Out, E>(&self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(In) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Out, E>> + Send + 'static,
        In: DeserializeOwned + Send + 'static,
        Out: Serialize + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        self.register_method(Method::new(name, handler)?)
    }

    /// Register a synchronous function under `name`.
    pub fn register_sync<F, In, Out, E>(&self, name: &str, handler: F) -> Result<()>
    where
        F: Fn(In) -> std::result::Result<Out, E> + Send + Sync + 'static,
        In: DeserializeOwned + Send + 'static,
        Out: Serialize + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        self.register_method(Method::from_sync(name, handler)?)
    }

    /// Register an already built method. Names are never replaced.
    pub fn register_method(&self, method: Method) -> Result<()> {
        let mut methods = self.methods.write().unwrap_or_else(PoisonError::into_inner);

        match methods.entry(method.name().to_string()) {
            Entry::Occupied(entry) => Err(RpcError::DuplicateMethod {
                name: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                info!("Registered method {} as {}", method.name(), method.signature());
                entry.insert(Arc::new(method));
                Ok(())
            }
        }
    }

    /// Registered method names, sorted.
    pub fn method_names(&self) -> Vec<String> {
        let methods = self.methods.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = methods.keys().cloned().collect();
        names.sort();
        names
    }

    /// Signature captured when `name` was registered.
    pub fn signature(&self, name: &str) -> Option<MethodSignature> {
        self.lookup(name).map(|method| method.signature())
    }

    /// Dispatch a request to its method.
    ///
    /// Unknown methods get `MethodNotFound`. With at-most-once enabled, a
    /// request whose id was already seen gets an `AtMostOnce` error and the
    /// method is not run again.
    pub async fn serve_rpc(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let Some(method) = self.lookup(&request.method) else {
            debug!("Method not found: {}", request.method);
            return JsonRpcResponse::failure(request.id, JsonRpcError::method_not_found());
        };

        self.log_request(request);

        if let (Some(filter), Some(id)) = (&self.at_most_once, request.id) {
            if !filter.check_and_mark(id) {
                warn!("Rejecting duplicate request id {} for {}", id, request.method);
                return JsonRpcResponse::failure(request.id, JsonRpcError::at_most_once());
            }
        }

        let response = method.serve_request(request).await;
        self.log_response(&response);
        response
    }

    fn lookup(&self, name: &str) -> Option<Arc<Method>> {
        let methods = self.methods.read().unwrap_or_else(PoisonError::into_inner);
        methods.get(name).cloned()
    }

    fn log_request(&self, request: &JsonRpcRequest) {
        let params_bytes = request.params.as_ref().map_or(0, Opaque::len);
        if self.verbose {
            info!(method = %request.method, id = ?request.id, params_bytes, "ServeRPC request");
        } else {
            trace!(method = %request.method, id = ?request.id, params_bytes, "ServeRPC request");
        }
    }

    fn log_response(&self, response: &JsonRpcResponse) {
        let result = response.result.as_ref().map(Opaque::get);
        if self.verbose {
            info!(id = ?response.id, ?result, error = ?response.error, "ServeRPC response");
        } else {
            trace!(id = ?response.id, ?result, error = ?response.error, "ServeRPC response");
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("methods", &self.method_names())
            .field("at_most_once", &self.at_most_once.is_some())
            .field("verbose", &self.verbose)
            .finish()
    }
}

#[async_trait::async_trait]
impl RpcService for Server {
    async fn serve_rpc(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        Server::serve_rpc(self, request).await
    }
}

/// Builder for configuring a [`Server`].
///
/// # Example
///
/// ```rust,ignore
/// let server = Server::builder()
///     .at_most_once(true)
///     .dedup_capacity(NonZeroUsize::new(100_000).unwrap())
///     .verbose(true)
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct ServerBuilder {
    at_most_once: bool,
    dedup_capacity: Option<NonZeroUsize>,
    verbose: bool,
}

impl ServerBuilder {
    /// Reject requests whose id was already dispatched.
    ///
    /// Default: `false`
    pub fn at_most_once(mut self, enable: bool) -> Self {
        self.at_most_once = enable;
        self
    }

    /// Remember at most `capacity` ids for the at-most-once filter.
    ///
    /// Once the bound is reached the least recently seen id is forgotten and
    /// may be dispatched again if it reappears. Only meaningful together with
    /// [`ServerBuilder::at_most_once`].
    ///
    /// Default: unbounded
    pub fn dedup_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.dedup_capacity = Some(capacity);
        self
    }

    /// Log every request and response at `info` instead of `trace`.
    ///
    /// Default: `false`
    pub fn verbose(mut self, enable: bool) -> Self {
        self.verbose = enable;
        self
    }

    pub fn build(self) -> Server {
        let at_most_once = self.at_most_once.then(|| match self.dedup_capacity {
            Some(capacity) => AtMostOnceFilter::with_capacity(capacity),
            None => AtMostOnceFilter::unbounded(),
        });

        Server {
            methods: RwLock::new(HashMap::new()),
            at_most_once,
            verbose: self.verbose,
        }
    }
}
