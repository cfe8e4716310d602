//! Method routing
//!
//! The router maps fully qualified method names such as
//! `"Haberdasher/MakeHat"` to their handlers. Routing alone never runs
//! hooks; the [`DispatchPipeline`](crate::DispatchPipeline) wraps lookup and
//! invocation with them.
//!
//! Routers are cheaply cloneable (`Arc`-based) and shared by every
//! connection task.
//!
//! # Examples
//!
//! ```rust
//! use tailor_server::{from_fn, Router};
//!
//! let mut router = Router::new();
//! router.register("Health/Ping", from_fn(|_ctx, _params| async {
//!     Ok(serde_json::json!({"pong": true}))
//! }));
//!
//! assert!(router.has_method("Health/Ping"));
//! ```

use crate::handler::Handler;
use std::collections::HashMap;
use std::sync::Arc;

/// Method name to handler mapping
#[derive(Clone, Default)]
pub struct Router {
    handlers: Arc<HashMap<String, Arc<dyn Handler>>>,
}

impl Router {
    /// Create a new empty router
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a method, replacing any existing one
    pub fn register(&mut self, method: impl Into<String>, handler: Box<dyn Handler>) {
        let handlers = Arc::make_mut(&mut self.handlers);
        handlers.insert(method.into(), Arc::from(handler));
    }

    /// Get the handler for a method
    pub fn get(&self, method: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(method).cloned()
    }

    /// Check if a method is registered
    pub fn has_method(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Registered method names, sorted
    pub fn methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.handlers.keys().cloned().collect();
        methods.sort();
        methods
    }

    /// Number of registered methods
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if no methods are registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("methods", &self.methods())
            .finish()
    }
}

/// Builder for constructing a router
#[derive(Default)]
pub struct RouterBuilder {
    router: Router,
}

impl RouterBuilder {
    /// Create a new router builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler for a method
    pub fn handler(mut self, method: impl Into<String>, handler: Box<dyn Handler>) -> Self {
        self.router.register(method, handler);
        self
    }

    /// Build the router
    pub fn build(self) -> Router {
        self.router
    }
}
