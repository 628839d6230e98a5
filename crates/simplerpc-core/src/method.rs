//! Method invoker: adapts one registered function to the RPC call protocol.
//!
//! A method is any function taking exactly one argument and returning
//! `Result<Out, E>`. The argument is decoded from `params`, the success value
//! is encoded into `result`, and `E` is reported by its `Display` text. Both
//! async functions ([`Method::new`]) and plain closures ([`Method::from_sync`])
//! are accepted; each is wrapped into the same type-erased adapter at
//! registration time.
//!
//! # Failure handling
//!
//! A panic inside the function is caught at this boundary and reported as an
//! ordinary failure. [`Method::serve_request`] always produces a response.

use crate::error::{Result, RpcError};
use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, Opaque};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

type PendingCall = BoxFuture<'static, std::result::Result<Opaque, CallFailure>>;

type Invoke =
    dyn Fn(&JsonRpcRequest) -> std::result::Result<PendingCall, JsonRpcError> + Send + Sync;

/// The argument and success types captured when a method is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSignature {
    input: &'static str,
    output: &'static str,
}

impl MethodSignature {
    /// Signature of a method taking `In` and returning `Out` on success.
    pub fn of<In, Out>() -> Self {
        Self {
            input: type_name::<In>(),
            output: type_name::<Out>(),
        }
    }

    /// Type name of the single accepted argument.
    pub fn input(&self) -> &'static str {
        self.input
    }

    /// Type name of the success value.
    pub fn output(&self) -> &'static str {
        self.output
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn({}) -> {}", self.input, self.output)
    }
}

/// Why an invocation produced no result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallFailure {
    /// The function returned its error value.
    #[error("{0}")]
    Returned(String),

    /// The function panicked.
    #[error("panic: {0}")]
    Panicked(String),

    /// The success value could not be serialized.
    #[error("failed to encode result: {0}")]
    Encode(String),
}

/// A registered, remotely callable function.
pub struct Method {
    name: String,
    signature: MethodSignature,
    invoke: Box<Invoke>,
}

impl Method {
    /// Wrap an async function as a method.
    ///
    /// Fails if `name` is empty or if the argument type is `()`, which is
    /// the zero-argument shape.
    ///
    /// ```
    /// use simplerpc::Method;
    ///
    /// let echo = Method::new("echo", |s: String| async move { Ok::<_, String>(s) });
    /// assert!(echo.is_ok());
    /// ```
    ///
    /// The handler must return a future:
    ///
    /// ```compile_fail
    /// simplerpc::Method::new("echo", |s: String| s);
    /// ```
    ///
    /// and that future must resolve to a `Result`:
    ///
    /// ```compile_fail
    /// simplerpc::Method::new("echo", |s: String| async move { s });
    /// ```
    pub fn new<F, Fut, In, Out, E>(name: impl Into<String>, handler: F) -> Result<Self>
    where
        F: Fn(In) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Out, E>> + Send + 'static,
        In: DeserializeOwned + Send + 'static,
        Out: Serialize + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let name = name.into();
        check_shape::<In>(&name)?;

        let handler = Arc::new(handler);
        let invoke = move |request: &JsonRpcRequest| -> std::result::Result<PendingCall, JsonRpcError> {
            let arg: In = request.unmarshal_params()?;
            let handler = Arc::clone(&handler);
            Ok(async move {
                // The handler itself runs inside the guard so that a panic
                // while building its future is caught too.
                let out = call(async move { (*handler)(arg).await }).await?;
                Opaque::from_value(&out).map_err(|e| CallFailure::Encode(e.to_string()))
            }
            .boxed())
        };

        Ok(Self {
            name,
            signature: MethodSignature::of::<In, Out>(),
            invoke: Box::new(invoke),
        })
    }

    /// Wrap a synchronous function as a method.
    ///
    /// The function runs on the task serving the request, so it should not
    /// block. Several values are passed as one tuple argument:
    ///
    /// ```
    /// use simplerpc::Method;
    ///
    /// let add = Method::from_sync("add", |(a, b): (i64, i64)| Ok::<_, String>(a + b));
    /// assert!(add.is_ok());
    /// ```
    ///
    /// Anything else is rejected at compile time. A value that is not
    /// callable:
    ///
    /// ```compile_fail
    /// simplerpc::Method::from_sync("n", 5_i64);
    /// ```
    ///
    /// a function without an argument:
    ///
    /// ```compile_fail
    /// simplerpc::Method::from_sync("n", || Ok::<i64, String>(1));
    /// ```
    ///
    /// a function with two arguments:
    ///
    /// ```compile_fail
    /// simplerpc::Method::from_sync("n", |a: i64, b: i64| Ok::<i64, String>(a + b));
    /// ```
    ///
    /// a plain return value:
    ///
    /// ```compile_fail
    /// simplerpc::Method::from_sync("n", |a: i64| a + 1);
    /// ```
    ///
    /// and an error type that cannot be displayed:
    ///
    /// ```compile_fail
    /// simplerpc::Method::from_sync("n", |a: i64| Ok::<i64, ()>(a));
    /// ```
    pub fn from_sync<F, In, Out, E>(name: impl Into<String>, handler: F) -> Result<Self>
    where
        F: Fn(In) -> std::result::Result<Out, E> + Send + Sync + 'static,
        In: DeserializeOwned + Send + 'static,
        Out: Serialize + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let handler = Arc::new(handler);
        Self::new(name, move |arg: In| {
            let handler = Arc::clone(&handler);
            async move { (*handler)(arg) }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> MethodSignature {
        self.signature
    }

    /// Decode params, invoke the function and encode the outcome.
    ///
    /// - params missing or not matching the argument shape: `InvalidParams`
    /// - function error or panic: code -1 carrying the error text
    /// - result not serializable: `InternalError`
    /// - panic while decoding params or encoding the result: `InternalError`
    pub async fn serve_request(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id;

        let pending = match panic::catch_unwind(AssertUnwindSafe(|| (self.invoke)(request))) {
            Ok(Ok(pending)) => pending,
            Ok(Err(error)) => return JsonRpcResponse::failure(id, error),
            Err(payload) => return self.codec_panic(id, "decoding params", payload.as_ref()),
        };

        // The handler itself is guarded by `call`; this catches the encode step.
        let outcome = match AssertUnwindSafe(pending).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => return self.codec_panic(id, "encoding result", payload.as_ref()),
        };

        match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(panic @ CallFailure::Panicked(_)) => {
                error!(method = %self.name, "Recovered from method call: {}", panic);
                JsonRpcResponse::failure(id, JsonRpcError::application(panic.to_string()))
            }
            Err(CallFailure::Returned(message)) => {
                JsonRpcResponse::failure(id, JsonRpcError::application(message))
            }
            Err(CallFailure::Encode(reason)) => {
                JsonRpcResponse::failure(id, JsonRpcError::internal_error().with_reason(reason))
            }
        }
    }

    fn codec_panic(
        &self,
        id: Option<i64>,
        stage: &str,
        payload: &(dyn Any + Send),
    ) -> JsonRpcResponse {
        let message = panic_message(payload);
        error!(method = %self.name, "Recovered from panic while {}: {}", stage, message);
        JsonRpcResponse::failure(
            id,
            JsonRpcError::internal_error().with_reason(format!("panic while {}: {}", stage, message)),
        )
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

fn check_shape<In: 'static>(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RpcError::InvalidMethod {
            name: name.to_string(),
            reason: "method name should not be empty".to_string(),
        });
    }
    if TypeId::of::<In>() == TypeId::of::<()>() {
        return Err(RpcError::InvalidMethod {
            name: name.to_string(),
            reason: "exactly 1 parameter expected".to_string(),
        });
    }
    Ok(())
}

/// Await a handler future, converting its error value or a panic into a
/// [`CallFailure`].
pub async fn call<Fut, Out, E>(fut: Fut) -> std::result::Result<Out, CallFailure>
where
    Fut: Future<Output = std::result::Result<Out, E>>,
    E: fmt::Display,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(out)) => Ok(out),
        Ok(Err(e)) => Err(CallFailure::Returned(e.to_string())),
        Err(payload) => Err(CallFailure::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
