//! Tailor - RPC over WebSocket with retrying clients and hooked servers
//!
//! This is the convenience crate that re-exports the tailor sub-crates and
//! hosts the haberdasher demo service.
//!
//! # Architecture
//!
//! - **tailor-core**: Structured errors, wire types, codec, request context,
//!   telemetry setup
//! - **tailor-server**: Handlers, router, hooks, dispatch pipeline and the
//!   WebSocket server
//! - **tailor-client**: WebSocket client and the retrying invoker
//!
//! # Quick Start - Server
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tailor::haberdasher::{self, HaberdasherService};
//! use tailor::server::{logging_hooks, Router};
//! use tailor::TailorServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut router = Router::new();
//!     haberdasher::register(&mut router, Arc::new(HaberdasherService::new()));
//!
//!     let server = TailorServer::builder()
//!         .bind_str("127.0.0.1:8080")?
//!         .router(router)
//!         .hooks(logging_hooks())
//!         .build()
//!         .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Quick Start - Client
//!
//! ```rust,no_run
//! use tailor::haberdasher::{HaberdasherClient, Size};
//! use tailor::{RetryingInvoker, RpcClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RpcClient::connect("ws://127.0.0.1:8080").await?;
//!     let haberdasher = HaberdasherClient::new(client, RetryingInvoker::new());
//!
//!     let hat = haberdasher.make_hat(Size { inches: 12 }).await?;
//!     println!("{:?}", hat);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod haberdasher;

pub use tailor_client as client;
pub use tailor_core as core;
pub use tailor_server as server;

pub use tailor_client::{RetryingInvoker, RpcClient};
pub use tailor_core::{Error, ErrorCode, RequestContext, Result, RpcError};
pub use tailor_server::{DispatchPipeline, ServerHooks, TailorServer};
