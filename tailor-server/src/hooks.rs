//! Server hooks
//!
//! Hooks are callbacks invoked at fixed stages of request dispatch. They are
//! meant for cross-cutting concerns such as logging, tracing and metrics and
//! cannot alter the handler's outcome.
//!
//! # Stages
//!
//! - [`Stage::RequestReceived`]: a request arrived, before routing
//! - [`Stage::RequestRouted`]: the method resolved to a handler
//! - [`Stage::ResponseSent`]: the handler succeeded
//! - [`Stage::Error`]: the request failed
//!
//! Exactly one of `ResponseSent` and `Error` fires per request.
//!
//! A [`ServerHooks`] maps each stage to an ordered list of named callbacks,
//! invoked in registration order. Once handed to a server the set is shared
//! read-only across all concurrent requests, so callbacks must be
//! `Send + Sync` and synchronize any state they mutate.
//!
//! # Examples
//!
//! ```rust
//! use tailor_server::{ServerHooks, Stage};
//!
//! let hooks = ServerHooks::new()
//!     .on_request_routed("audit", |ctx, method| {
//!         tracing::info!(conn_id = ctx.conn_id, method, "routed");
//!     })
//!     .on_error("audit", |_ctx, err| {
//!         tracing::warn!(code = %err.code(), "failed");
//!     });
//!
//! assert_eq!(hooks.len(Stage::RequestRouted), 1);
//! assert_eq!(hooks.len(Stage::ResponseSent), 0);
//! ```

use crate::metrics::{ServerMetrics, OK_CODE};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tailor_core::{RequestContext, RpcError};

/// A pipeline stage at which hooks run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// A request arrived
    RequestReceived,
    /// The request was routed to a handler
    RequestRouted,
    /// The handler succeeded and the response is about to be sent
    ResponseSent,
    /// The request failed
    Error,
}

impl Stage {
    /// Stage name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::RequestReceived => "request_received",
            Stage::RequestRouted => "request_routed",
            Stage::ResponseSent => "response_sent",
            Stage::Error => "error",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type RequestReceivedFn = dyn Fn(&RequestContext) + Send + Sync;
type RequestRoutedFn = dyn Fn(&RequestContext, &str) + Send + Sync;
type ResponseSentFn = dyn Fn(&RequestContext, &Value) + Send + Sync;
type ErrorFn = dyn Fn(&RequestContext, &RpcError) + Send + Sync;

/// A callback for one stage
#[derive(Clone)]
pub enum HookFn {
    /// Called with the request context
    RequestReceived(Arc<RequestReceivedFn>),
    /// Called with the request context and the resolved method name
    RequestRouted(Arc<RequestRoutedFn>),
    /// Called with the request context and the handler's result
    ResponseSent(Arc<ResponseSentFn>),
    /// Called with the request context and the structured error
    Error(Arc<ErrorFn>),
}

impl HookFn {
    /// The stage this callback belongs to
    pub fn stage(&self) -> Stage {
        match self {
            HookFn::RequestReceived(_) => Stage::RequestReceived,
            HookFn::RequestRouted(_) => Stage::RequestRouted,
            HookFn::ResponseSent(_) => Stage::ResponseSent,
            HookFn::Error(_) => Stage::Error,
        }
    }
}

/// A named callback registered for a stage
#[derive(Clone)]
pub struct Hook {
    /// Name used in logs
    pub name: String,
    /// The callback
    pub func: HookFn,
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("name", &self.name)
            .field("stage", &self.func.stage())
            .finish()
    }
}

/// Ordered hook callbacks per stage
#[derive(Clone, Default)]
pub struct ServerHooks {
    hooks: BTreeMap<Stage, Vec<Hook>>,
}

impl ServerHooks {
    /// Create an empty hook set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback; it runs after those already registered for its stage
    pub fn register(mut self, name: impl Into<String>, func: HookFn) -> Self {
        self.hooks.entry(func.stage()).or_default().push(Hook {
            name: name.into(),
            func,
        });
        self
    }

    /// Register a request-received callback
    pub fn on_request_received<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&RequestContext) + Send + Sync + 'static,
    {
        self.register(name, HookFn::RequestReceived(Arc::new(f)))
    }

    /// Register a request-routed callback
    pub fn on_request_routed<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&RequestContext, &str) + Send + Sync + 'static,
    {
        self.register(name, HookFn::RequestRouted(Arc::new(f)))
    }

    /// Register a response-sent callback
    pub fn on_response_sent<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&RequestContext, &Value) + Send + Sync + 'static,
    {
        self.register(name, HookFn::ResponseSent(Arc::new(f)))
    }

    /// Register an error callback
    pub fn on_error<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&RequestContext, &RpcError) + Send + Sync + 'static,
    {
        self.register(name, HookFn::Error(Arc::new(f)))
    }

    /// Append every callback of `other` after this set's, stage by stage
    pub fn chain(mut self, other: ServerHooks) -> Self {
        for (stage, hooks) in other.hooks {
            self.hooks.entry(stage).or_default().extend(hooks);
        }
        self
    }

    /// Callbacks registered for a stage, in invocation order
    pub fn hooks(&self, stage: Stage) -> &[Hook] {
        self.hooks.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of callbacks registered for a stage
    pub fn len(&self, stage: Stage) -> usize {
        self.hooks(stage).len()
    }

    /// Check if no callbacks are registered at all
    pub fn is_empty(&self) -> bool {
        self.hooks.values().all(Vec::is_empty)
    }

    pub(crate) fn request_received(&self, ctx: &RequestContext) {
        for hook in self.hooks(Stage::RequestReceived) {
            if let HookFn::RequestReceived(f) = &hook.func {
                tracing::trace!(hook = %hook.name, "request_received hook");
                f(ctx);
            }
        }
    }

    pub(crate) fn request_routed(&self, ctx: &RequestContext, method: &str) {
        for hook in self.hooks(Stage::RequestRouted) {
            if let HookFn::RequestRouted(f) = &hook.func {
                tracing::trace!(hook = %hook.name, "request_routed hook");
                f(ctx, method);
            }
        }
    }

    pub(crate) fn response_sent(&self, ctx: &RequestContext, result: &Value) {
        for hook in self.hooks(Stage::ResponseSent) {
            if let HookFn::ResponseSent(f) = &hook.func {
                tracing::trace!(hook = %hook.name, "response_sent hook");
                f(ctx, result);
            }
        }
    }

    pub(crate) fn error(&self, ctx: &RequestContext, err: &RpcError) {
        for hook in self.hooks(Stage::Error) {
            if let HookFn::Error(f) = &hook.func {
                tracing::trace!(hook = %hook.name, "error hook");
                f(ctx, err);
            }
        }
    }
}

impl fmt::Debug for ServerHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.hooks.iter()).finish()
    }
}

/// Hooks that log every stage
///
/// Request arrival and routing are logged at debug level, successful
/// responses at info and failures at warn with the error code and metadata.
pub fn logging_hooks() -> ServerHooks {
    ServerHooks::new()
        .on_request_received("logging", |ctx| {
            let _enter = ctx.span.enter();
            tracing::debug!("Request received");
        })
        .on_request_routed("logging", |ctx, method| {
            let _enter = ctx.span.enter();
            tracing::debug!(method, "Request routed");
        })
        .on_response_sent("logging", |ctx, _result| {
            let _enter = ctx.span.enter();
            tracing::info!(
                elapsed_ms = ctx.elapsed().as_millis() as u64,
                "Request completed successfully"
            );
        })
        .on_error("logging", |ctx, err| {
            let _enter = ctx.span.enter();
            tracing::warn!(
                code = %err.code(),
                error = %err,
                meta = ?err.metadata(),
                elapsed_ms = ctx.elapsed().as_millis() as u64,
                "Request failed"
            );
        })
}

/// Hooks that record request metrics
pub fn metrics_hooks(metrics: Arc<ServerMetrics>) -> ServerHooks {
    let on_success = Arc::clone(&metrics);
    ServerHooks::new()
        .on_response_sent("metrics", move |ctx, _result| {
            on_success.record_request(&ctx.method, OK_CODE, ctx.elapsed().as_secs_f64());
        })
        .on_error("metrics", move |ctx, err| {
            metrics.record_request(&ctx.method, err.code().as_str(), ctx.elapsed().as_secs_f64());
        })
}
