//! RPC client over WebSocket with retrying invocation
//!
//! - **[`RpcClient`]**: Sends requests and matches responses by id. Error
//!   responses keep their code and metadata as [`tailor_core::Error::Rpc`].
//! - **[`RetryingInvoker`]**: Repeats a call while it fails with a
//!   retryable structured error, up to a fixed number of attempts.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tailor_client::{RetryingInvoker, RpcClient};
//! use serde_json::{json, Value};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RpcClient::connect("ws://localhost:8080").await?;
//!     let invoker = RetryingInvoker::new();
//!
//!     let hat: Value = invoker
//!         .invoke(|| client.request("Haberdasher/MakeHat", json!({"inches": 12})))
//!         .await?;
//!     println!("{}", hat);
//!
//!     Ok(())
//! }
//! ```

mod client;
mod client_builder;
mod metrics;
mod request;
mod retry;

pub use client::RpcClient;
pub use client_builder::ClientBuilder;
pub use metrics::ClientMetrics;
pub use request::RequestManager;
pub use retry::{
    AttemptOutcome, Backoff, CallAttempt, ExponentialBackoff, FixedDelay, NoBackoff,
    RetryingInvoker, DEFAULT_MAX_ATTEMPTS,
};
