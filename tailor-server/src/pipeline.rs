//! Request dispatch with hooks
//!
//! The [`DispatchPipeline`] runs one request through its handler, invoking
//! the server hooks around it in a fixed order:
//!
//! 1. request-received hooks
//! 2. request-routed hooks, with the method name
//! 3. the handler
//! 4. response-sent hooks on success, or error hooks on failure
//!
//! Exactly one of the response-sent and error stages runs per request.
//! Handler failures that are not already an [`RpcError`] are wrapped as
//! `internal`, keeping the original message both as the error message and
//! under the `cause` metadata key.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use tailor_core::{ErrorCode, RequestContext};
//! use tailor_server::{from_fn, DispatchPipeline, Router, ServerHooks};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let mut router = Router::new();
//! router.register("Boom/Explode", from_fn(|_ctx, _params| async {
//!     Err("boom".into())
//! }));
//!
//! let pipeline = DispatchPipeline::new(router, Arc::new(ServerHooks::new()));
//! let err = pipeline
//!     .dispatch(RequestContext::new("Boom/Explode", 1, 0), None)
//!     .await
//!     .unwrap_err();
//!
//! assert_eq!(err.code(), ErrorCode::Internal);
//! assert_eq!(err.message(), "boom");
//! # }
//! ```

use crate::handler::Handler;
use crate::hooks::ServerHooks;
use crate::router::Router;
use serde_json::Value;
use std::sync::Arc;
use tailor_core::{downcast_rpc_error, RequestContext, RpcError};
use tracing::Instrument;

/// Routes requests to handlers and runs the hooks around them
///
/// Cloning is cheap; every clone shares the same router and hooks.
#[derive(Clone, Debug)]
pub struct DispatchPipeline {
    router: Router,
    hooks: Arc<ServerHooks>,
}

impl DispatchPipeline {
    /// Create a pipeline from a router and a shared hook set
    pub fn new(router: Router, hooks: Arc<ServerHooks>) -> Self {
        Self { router, hooks }
    }

    /// The router requests are resolved against
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// The hooks run for every request
    pub fn hooks(&self) -> &ServerHooks {
        &self.hooks
    }

    /// Resolve `ctx.method` and run the request
    ///
    /// An unknown method runs the request-received hooks and then the error
    /// hooks with a `bad_route` error. The request-routed hooks do not run
    /// because nothing was routed.
    pub async fn dispatch(
        &self,
        ctx: RequestContext,
        params: Option<Value>,
    ) -> Result<Value, RpcError> {
        match self.router.get(&ctx.method) {
            Some(handler) => self.run(ctx, handler.as_ref(), params).await,
            None => {
                self.hooks.request_received(&ctx);
                let err = RpcError::bad_route(&ctx.method);
                self.hooks.error(&ctx, &err);
                Err(err)
            }
        }
    }

    /// Run one request through an already resolved handler
    pub async fn run(
        &self,
        ctx: RequestContext,
        handler: &dyn Handler,
        params: Option<Value>,
    ) -> Result<Value, RpcError> {
        self.hooks.request_received(&ctx);
        self.hooks.request_routed(&ctx, &ctx.method);

        let span = ctx.span.clone();
        let outcome = handler.handle(ctx.clone(), params).instrument(span).await;

        match outcome {
            Ok(value) => {
                self.hooks.response_sent(&ctx, &value);
                Ok(value)
            }
            Err(err) => {
                let rpc = match downcast_rpc_error(err.as_ref()) {
                    Some(rpc) => rpc.clone(),
                    None => RpcError::internal_with(err.as_ref()),
                };
                self.hooks.error(&ctx, &rpc);
                Err(rpc)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::from_fn;
    use std::sync::Mutex;
    use tailor_core::{ErrorCode, CAUSE_META_KEY};

    type Log = Arc<Mutex<Vec<String>>>;

    fn recording_hooks() -> (Log, Arc<ServerHooks>) {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let (a, b, c, d) = (log.clone(), log.clone(), log.clone(), log.clone());
        let hooks = ServerHooks::new()
            .on_request_received("rec", move |_| a.lock().unwrap().push("received".into()))
            .on_request_routed("rec", move |_, m| b.lock().unwrap().push(format!("routed:{}", m)))
            .on_response_sent("rec", move |_, v| c.lock().unwrap().push(format!("sent:{}", v)))
            .on_error("rec", move |_, e| {
                d.lock()
                    .unwrap()
                    .push(format!("error:{}:{}", e.code(), e.message()))
            });
        (log, Arc::new(hooks))
    }

    fn pipeline_with(method: &str, handler: Box<dyn Handler>) -> (Log, DispatchPipeline) {
        let mut router = Router::new();
        router.register(method, handler);
        let (log, hooks) = recording_hooks();
        (log, DispatchPipeline::new(router, hooks))
    }

    #[tokio::test]
    async fn test_success_order() {
        let (log, pipeline) = pipeline_with(
            "M",
            from_fn(|_ctx, _params| async { Ok(serde_json::json!(1)) }),
        );

        let result = pipeline.dispatch(RequestContext::new("M", 1, 0), None).await;
        assert_eq!(result.unwrap(), serde_json::json!(1));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["received", "routed:M", "sent:1"]
        );
    }

    #[tokio::test]
    async fn test_plain_error_wrapped_as_internal() {
        let (log, pipeline) = pipeline_with(
            "M",
            from_fn(|_ctx, _params| async { Err("boom".into()) }),
        );

        let err = pipeline
            .dispatch(RequestContext::new("M", 1, 0), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Internal);
        assert_eq!(err.message(), "boom");
        assert_eq!(err.meta(CAUSE_META_KEY), Some("boom"));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["received", "routed:M", "error:internal:boom"]
        );
    }

    #[tokio::test]
    async fn test_structured_error_passes_through() {
        let (log, pipeline) = pipeline_with(
            "M",
            from_fn(|_ctx, _params| async {
                Err(RpcError::retryable(ErrorCode::Unavailable, "busy").into())
            }),
        );

        let err = pipeline
            .dispatch(RequestContext::new("M", 1, 0), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unavailable);
        assert!(err.is_retryable());
        assert_eq!(err.meta(CAUSE_META_KEY), None);
        assert_eq!(log.lock().unwrap().last().unwrap(), "error:unavailable:busy");
    }

    #[tokio::test]
    async fn test_unknown_method_is_bad_route() {
        let (log, pipeline) = pipeline_with(
            "M",
            from_fn(|_ctx, _params| async { Ok(Value::Null) }),
        );

        let err = pipeline
            .dispatch(RequestContext::new("Other", 1, 0), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadRoute);

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0], "received");
        assert!(log[1].starts_with("error:bad_route:"));
    }

    #[tokio::test]
    async fn test_exactly_one_terminal_hook_per_request() {
        let (log, hooks) = recording_hooks();
        let mut router = Router::new();
        router.register(
            "Flip",
            from_fn(|ctx, _params| async move {
                if ctx.request_id % 2 == 0 {
                    Ok(Value::Null)
                } else {
                    Err("odd".into())
                }
            }),
        );
        let pipeline = DispatchPipeline::new(router, hooks);

        let mut tasks = Vec::new();
        for id in 0..20u64 {
            let pipeline = pipeline.clone();
            tasks.push(tokio::spawn(async move {
                pipeline.dispatch(RequestContext::new("Flip", id, 0), None).await
            }));
        }
        for task in tasks {
            let _ = task.await.unwrap();
        }

        let log = log.lock().unwrap();
        let sent = log.iter().filter(|l| l.starts_with("sent:")).count();
        let errors = log.iter().filter(|l| l.starts_with("error:")).count();
        assert_eq!(sent, 10);
        assert_eq!(errors, 10);
        assert_eq!(sent + errors, 20);
    }

    #[tokio::test]
    async fn test_run_with_resolved_handler() {
        let (log, hooks) = recording_hooks();
        let pipeline = DispatchPipeline::new(Router::new(), hooks);
        let handler = from_fn(|_ctx, params| async move { Ok(params.unwrap_or_default()) });

        let result = pipeline
            .run(
                RequestContext::new("Echo", 1, 0),
                handler.as_ref(),
                Some(serde_json::json!("hi")),
            )
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!("hi"));
        assert_eq!(log.lock().unwrap()[1], "routed:Echo");
    }
}
