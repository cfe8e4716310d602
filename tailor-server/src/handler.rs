//! Handler traits and types for RPC methods
//!
//! A handler receives the per-request [`RequestContext`] and the request
//! parameters and produces either a JSON result or an error. The error type
//! is deliberately open ([`HandlerError`]): a handler may fail with an
//! [`RpcError`] to control the code and metadata the caller sees, or with
//! any other error, which the dispatch pipeline wraps as `internal`.
//!
//! # Creating Handlers
//!
//! 1. **from_fn**: Wrap an async closure that works with raw JSON values
//! 2. **from_typed_fn**: Wrap an async closure with automatic type conversion
//!
//! # Examples
//!
//! ```rust
//! use tailor_server::{from_fn, from_typed_fn};
//! use tailor_core::RpcError;
//! use serde::Deserialize;
//!
//! // Raw JSON handler
//! let ping = from_fn(|_ctx, _params| async move {
//!     Ok(serde_json::json!({"pong": true}))
//! });
//!
//! // Typed handler
//! #[derive(Deserialize)]
//! struct Size { inches: i32 }
//!
//! let make_hat = from_typed_fn(|_ctx, size: Size| async move {
//!     if size.inches <= 0 {
//!         return Err(RpcError::invalid_argument("inches", "must be positive").into());
//!     }
//!     Ok(size.inches)
//! });
//! ```

use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tailor_core::{RequestContext, RpcError};

/// Error a handler may fail with
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for handler functions
///
/// A pinned, boxed future so that handlers with different concrete future
/// types can share one registry.
pub type HandlerResult = Pin<Box<dyn Future<Output = Result<Value, HandlerError>> + Send>>;

/// Trait for RPC method handlers
///
/// Handlers are `Send + Sync` and are invoked concurrently for simultaneous
/// requests; any shared state they hold must be synchronized.
pub trait Handler: Send + Sync {
    /// Handle one request
    fn handle(&self, ctx: RequestContext, params: Option<Value>) -> HandlerResult;
}

/// Wrapper that adapts an async function into a Handler
pub struct AsyncHandler<F, Fut>
where
    F: Fn(RequestContext, Option<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    func: F,
}

impl<F, Fut> AsyncHandler<F, Fut>
where
    F: Fn(RequestContext, Option<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    /// Create a new async handler from a function
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F, Fut> Handler for AsyncHandler<F, Fut>
where
    F: Fn(RequestContext, Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    fn handle(&self, ctx: RequestContext, params: Option<Value>) -> HandlerResult {
        Box::pin((self.func)(ctx, params))
    }
}

/// Create a handler from an async function that works with raw JSON values
pub fn from_fn<F, Fut>(func: F) -> Box<dyn Handler>
where
    F: Fn(RequestContext, Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    Box::new(AsyncHandler::new(func))
}

/// Create a handler from an async function with automatic type conversion
///
/// - Params that don't deserialize into `P` fail with `invalid_argument`
/// - Results that don't serialize fail with `internal`
/// - Function errors are passed through unchanged
pub fn from_typed_fn<P, R, F, Fut>(func: F) -> Box<dyn Handler>
where
    P: serde::de::DeserializeOwned + Send + 'static,
    R: serde::Serialize + Send + 'static,
    F: Fn(RequestContext, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
{
    let func = Arc::new(func);

    from_fn(move |ctx: RequestContext, params: Option<Value>| {
        let func = Arc::clone(&func);
        async move {
            // Missing params decode from null, which works for unit and Option types
            let params: P = serde_json::from_value(params.unwrap_or(Value::Null))
                .map_err(|e| RpcError::invalid_argument("params", e.to_string()))?;

            let result = func(ctx, params).await?;

            let value = serde_json::to_value(result).map_err(|e| {
                RpcError::internal(format!("failed to encode result: {}", e))
            })?;
            Ok(value)
        }
    })
}
