//! Per-request context
//!
//! A [`RequestContext`] is created by the server for every incoming request
//! and handed to hooks and the handler. It carries the request identity, the
//! time the request arrived, an optional deadline supplied by the caller and
//! the tracing span the request runs under.
//!
//! The pipeline itself never enforces the deadline. Handlers that block on
//! downstream I/O should check [`RequestContext::remaining`] or race against
//! it.

use std::time::{Duration, Instant};

/// Context for one request
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The method being called
    pub method: String,
    /// Request id (for correlation)
    pub request_id: u64,
    /// Connection the request arrived on
    pub conn_id: u64,
    /// When the server received the request
    pub received_at: Instant,
    /// Point in time after which the caller stops waiting
    pub deadline: Option<Instant>,
    /// Span covering this request
    pub span: tracing::Span,
}

impl RequestContext {
    /// Create a context with no deadline
    pub fn new(method: impl Into<String>, request_id: u64, conn_id: u64) -> Self {
        let method = method.into();
        let span = tracing::info_span!(
            "rpc_request",
            method = %method,
            conn_id = conn_id,
            request_id = request_id,
        );
        Self {
            method,
            request_id,
            conn_id,
            received_at: Instant::now(),
            deadline: None,
            span,
        }
    }

    /// Set a deadline relative to when the request was received
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = self.received_at.checked_add(timeout);
        self
    }

    /// Time since the request was received
    pub fn elapsed(&self) -> Duration {
        self.received_at.elapsed()
    }

    /// Time left before the deadline, `None` when there is no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Whether the deadline has passed
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_without_deadline() {
        let ctx = RequestContext::new("Haberdasher/MakeHat", 1, 2);
        assert_eq!(ctx.method, "Haberdasher/MakeHat");
        assert_eq!(ctx.request_id, 1);
        assert_eq!(ctx.conn_id, 2);
        assert!(ctx.remaining().is_none());
        assert!(!ctx.is_expired());
    }

    #[test]
    fn test_context_with_deadline() {
        let ctx = RequestContext::new("m", 1, 0).with_timeout(Duration::from_secs(60));
        let remaining = ctx.remaining().unwrap();
        assert!(remaining <= Duration::from_secs(60));
        assert!(remaining > Duration::from_secs(50));
        assert!(!ctx.is_expired());
    }

    #[test]
    fn test_context_expired() {
        let ctx = RequestContext::new("m", 1, 0).with_timeout(Duration::ZERO);
        assert!(ctx.is_expired());
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }
}
