//! The haberdasher demo service
//!
//! One method, `Haberdasher/MakeHat`, makes a hat of the requested size in a
//! random color and style. The service can be told to fail a share of calls
//! with a retryable `unavailable` error, which is what the client's
//! [`RetryingInvoker`] is there to absorb.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tailor_client::{RetryingInvoker, RpcClient};
use tailor_core::{ErrorCode, RequestContext, Result, RpcError};
use tailor_server::{from_typed_fn, Router};

/// Fully qualified name of the MakeHat method
pub const MAKE_HAT: &str = "Haberdasher/MakeHat";

const COLORS: &[&str] = &["white", "black", "brown", "red", "blue"];
const NAMES: &[&str] = &["bowler", "baseball cap", "top hat", "derby"];

/// Size of a hat, in inches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    /// Head size in inches; must be positive
    pub inches: i32,
}

/// A hat made by the haberdasher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hat {
    /// Size in inches
    pub inches: i32,
    /// Anything but "invisible"
    pub color: String,
    /// Style, e.g. "bowler"
    pub name: String,
}

/// A service that makes hats
#[async_trait]
pub trait Haberdasher: Send + Sync {
    /// Make a hat of the given size
    async fn make_hat(&self, ctx: &RequestContext, size: Size) -> std::result::Result<Hat, RpcError>;
}

/// The demo haberdasher
#[derive(Debug, Clone, Default)]
pub struct HaberdasherService {
    failure_rate: f64,
}

impl HaberdasherService {
    /// A haberdasher that never fails transiently
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail this share of calls (0.0 to 1.0) with a retryable `unavailable`
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// The configured failure rate
    pub fn failure_rate(&self) -> f64 {
        self.failure_rate
    }
}

#[async_trait]
impl Haberdasher for HaberdasherService {
    async fn make_hat(&self, ctx: &RequestContext, size: Size) -> std::result::Result<Hat, RpcError> {
        if size.inches <= 0 {
            return Err(RpcError::invalid_argument(
                "inches",
                "I can't make a hat that small!",
            ));
        }

        let hat = {
            let mut rng = rand::thread_rng();
            if self.failure_rate > 0.0 && rng.gen_bool(self.failure_rate) {
                tracing::debug!(request_id = ctx.request_id, "Too busy to make a hat");
                return Err(RpcError::retryable(
                    ErrorCode::Unavailable,
                    "the haberdasher is busy, try again",
                ));
            }

            Hat {
                inches: size.inches,
                color: COLORS.choose(&mut rng).copied().unwrap_or("white").to_string(),
                name: NAMES.choose(&mut rng).copied().unwrap_or("bowler").to_string(),
            }
        };

        tracing::info!(inches = hat.inches, color = %hat.color, name = %hat.name, "Made a hat");
        Ok(hat)
    }
}

/// Register every haberdasher method on `router`
pub fn register(router: &mut Router, service: Arc<dyn Haberdasher>) {
    router.register(
        MAKE_HAT,
        from_typed_fn(move |ctx: RequestContext, size: Size| {
            let service = Arc::clone(&service);
            async move { Ok(service.make_hat(&ctx, size).await?) }
        }),
    );
}

/// Typed client for the haberdasher that retries transient failures
#[derive(Clone)]
pub struct HaberdasherClient {
    client: RpcClient,
    invoker: RetryingInvoker,
}

impl HaberdasherClient {
    /// Wrap a connected client
    pub fn new(client: RpcClient, invoker: RetryingInvoker) -> Self {
        Self { client, invoker }
    }

    /// Make a hat, retrying while the haberdasher reports a retryable error
    #[tracing::instrument(skip(self), name = "do MakeHat")]
    pub async fn make_hat(&self, size: Size) -> Result<Hat> {
        self.invoker
            .invoke(|| self.client.request(MAKE_HAT, size))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RequestContext {
        RequestContext::new(MAKE_HAT, 1, 0)
    }

    #[tokio::test]
    async fn test_make_hat() {
        let hat = HaberdasherService::new()
            .make_hat(&ctx(), Size { inches: 12 })
            .await
            .unwrap();

        assert_eq!(hat.inches, 12);
        assert!(COLORS.contains(&hat.color.as_str()));
        assert!(NAMES.contains(&hat.name.as_str()));
    }

    #[tokio::test]
    async fn test_too_small() {
        let err = HaberdasherService::new()
            .make_hat(&ctx(), Size { inches: 0 })
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        assert_eq!(err.meta("argument"), Some("inches"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_always_busy() {
        let service = HaberdasherService::new().with_failure_rate(1.0);
        let err = service.make_hat(&ctx(), Size { inches: 12 }).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::Unavailable);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_failure_rate_is_clamped() {
        assert_eq!(HaberdasherService::new().with_failure_rate(3.0).failure_rate(), 1.0);
        assert_eq!(HaberdasherService::new().with_failure_rate(-1.0).failure_rate(), 0.0);
    }

    #[tokio::test]
    async fn test_registered_handler() {
        let mut router = Router::new();
        register(&mut router, Arc::new(HaberdasherService::new()));
        assert!(router.has_method(MAKE_HAT));

        let handler = router.get(MAKE_HAT).unwrap();
        let value = handler
            .handle(ctx(), Some(serde_json::json!({"inches": 7})))
            .await
            .unwrap();
        let hat: Hat = serde_json::from_value(value).unwrap();
        assert_eq!(hat.inches, 7);
    }
}
