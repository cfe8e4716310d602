//! Server builder
//!
//! Fluent configuration of a [`TailorServer`]: bind address, handlers, hooks
//! and metrics.
//!
//! # Examples
//!
//! ```rust,no_run
//! use tailor_server::{from_fn, logging_hooks, TailorServer};
//!
//! # async fn example() -> tailor_core::Result<()> {
//! let server = TailorServer::builder()
//!     .bind_str("127.0.0.1:8080")?
//!     .handler("Health/Ping", from_fn(|_ctx, _params| async {
//!         Ok(serde_json::json!({"pong": true}))
//!     }))
//!     .hooks(logging_hooks())
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::{
    hooks::metrics_hooks, DispatchPipeline, Handler, Router, ServerHooks, ServerMetrics,
    TailorServer,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tailor_core::{Error, Result};
use tokio::net::TcpListener;

/// Builder for [`TailorServer`]
#[derive(Default)]
pub struct ServerBuilder {
    addr: Option<SocketAddr>,
    router: Router,
    hooks: ServerHooks,
    metrics: Option<Arc<ServerMetrics>>,
}

impl ServerBuilder {
    /// Create a builder with no address, handlers or hooks
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address
    pub fn bind(mut self, addr: impl Into<SocketAddr>) -> Self {
        self.addr = Some(addr.into());
        self
    }

    /// Set the bind address from a string such as `"0.0.0.0:8080"`
    pub fn bind_str(mut self, addr: &str) -> Result<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::Internal(format!("invalid address {:?}: {}", addr, e)))?;
        self.addr = Some(addr);
        Ok(self)
    }

    /// Register a handler for a method
    pub fn handler(mut self, method: impl Into<String>, handler: Box<dyn Handler>) -> Self {
        self.router.register(method, handler);
        self
    }

    /// Replace the router, dropping handlers registered so far
    pub fn router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    /// Add hooks; they run after any added before
    pub fn hooks(mut self, hooks: ServerHooks) -> Self {
        self.hooks = self.hooks.chain(hooks);
        self
    }

    /// Record connection and request metrics
    ///
    /// Request metrics are recorded by hooks appended after all user hooks.
    pub fn with_metrics(mut self, metrics: Arc<ServerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Bind the listener and build the server
    pub async fn build(self) -> Result<TailorServer> {
        let addr = self
            .addr
            .ok_or_else(|| Error::Internal("no bind address specified".to_string()))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Io(e.to_string()))?;

        let hooks = match &self.metrics {
            Some(metrics) => self.hooks.chain(metrics_hooks(Arc::clone(metrics))),
            None => self.hooks,
        };

        tracing::info!(
            addr = %addr,
            methods = ?self.router.methods(),
            "Server listening"
        );

        Ok(TailorServer {
            listener,
            pipeline: DispatchPipeline::new(self.router, Arc::new(hooks)),
            metrics: self.metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{from_fn, Stage};

    #[test]
    fn test_bind_str_rejects_garbage() {
        assert!(ServerBuilder::new().bind_str("not an address").is_err());
        assert!(ServerBuilder::new().bind_str("127.0.0.1:0").is_ok());
    }

    #[tokio::test]
    async fn test_build_requires_address() {
        let result = ServerBuilder::new().build().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_build_wires_metrics_hooks_after_user_hooks() {
        let meter = opentelemetry::global::meter("test-builder");
        let server = ServerBuilder::new()
            .bind_str("127.0.0.1:0")
            .unwrap()
            .handler(
                "Health/Ping",
                from_fn(|_ctx, _params| async { Ok(serde_json::Value::Null) }),
            )
            .hooks(ServerHooks::new().on_error("user", |_, _| {}))
            .with_metrics(Arc::new(ServerMetrics::new(&meter)))
            .build()
            .await
            .unwrap();

        let hooks = server.pipeline().hooks();
        assert_eq!(hooks.len(Stage::Error), 2);
        assert_eq!(hooks.hooks(Stage::Error)[0].name, "user");
        assert_eq!(hooks.hooks(Stage::Error)[1].name, "metrics");
        assert!(server.pipeline().router().has_method("Health/Ping"));
    }
}
