//! RPC server over WebSocket with dispatch hooks
//!
//! Requests are routed by fully qualified method name to a [`Handler`]. A
//! [`DispatchPipeline`] wraps every call with [`ServerHooks`] that observe
//! arrival, routing, success and failure, which is where logging, tracing
//! and metrics plug in.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tailor_server::{from_typed_fn, logging_hooks, TailorServer};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Size { inches: i32 }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = TailorServer::builder()
//!         .bind_str("127.0.0.1:8080")?
//!         .handler("Haberdasher/MakeHat", from_typed_fn(|_ctx, size: Size| async move {
//!             Ok(serde_json::json!({"inches": size.inches, "color": "blue"}))
//!         }))
//!         .hooks(logging_hooks())
//!         .build()
//!         .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Main task**: Accepts incoming TCP connections
//! - **Connection tasks**: WebSocket upgrade, frame decoding and a single
//!   writer per connection
//! - **Request tasks**: Each request is dispatched in its own task
//!
//! A failing handler or a dropped connection affects only its own request or
//! connection.

mod builder;
mod connection;
mod handler;
mod hooks;
mod metrics;
mod pipeline;
mod router;

pub use builder::ServerBuilder;
pub use handler::{from_fn, from_typed_fn, AsyncHandler, Handler, HandlerError, HandlerResult};
pub use hooks::{logging_hooks, metrics_hooks, Hook, HookFn, ServerHooks, Stage};
pub use metrics::{ServerMetrics, OK_CODE};
pub use pipeline::DispatchPipeline;
pub use router::{Router, RouterBuilder};

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tailor_core::{Error, Result};
use tokio::net::TcpListener;

/// RPC server over WebSocket
///
/// Built with [`TailorServer::builder`]. Each accepted connection is served
/// by its own task, sharing one [`DispatchPipeline`].
pub struct TailorServer {
    pub(crate) listener: TcpListener,
    pub(crate) pipeline: DispatchPipeline,
    pub(crate) metrics: Option<Arc<ServerMetrics>>,
}

impl TailorServer {
    /// Create a new server builder
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// The pipeline every request goes through
    pub fn pipeline(&self) -> &DispatchPipeline {
        &self.pipeline
    }

    /// Accept connections until the listener fails
    ///
    /// This future does not complete in normal operation; run it in a task
    /// or race it against a shutdown signal.
    #[tracing::instrument(skip(self), name = "server.run")]
    pub async fn run(&self) -> Result<()> {
        tracing::info!("Starting tailor server");
        let conn_counter = AtomicU64::new(0);
        let active = Arc::new(AtomicI64::new(0));

        loop {
            let (stream, addr) = self
                .listener
                .accept()
                .await
                .map_err(|e| Error::Io(e.to_string()))?;
            let conn_id = conn_counter.fetch_add(1, Ordering::SeqCst);
            let pipeline = self.pipeline.clone();
            let metrics = self.metrics.clone();
            let active = Arc::clone(&active);

            tracing::info!(conn_id = conn_id, addr = %addr, "New connection accepted");

            let now_active = active.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(ref m) = metrics {
                m.record_connection(now_active);
            }

            tokio::spawn(async move {
                if let Err(e) = connection::handle_connection(stream, conn_id, pipeline).await {
                    tracing::error!(conn_id = conn_id, error = %e, "Connection error");
                }

                let now_active = active.fetch_sub(1, Ordering::SeqCst) - 1;
                if let Some(ref m) = metrics {
                    m.record_disconnection(now_active);
                }
            });
        }
    }

    /// Get the local address the server is bound to
    ///
    /// Useful with port 0, where the OS picks the port.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }
}
