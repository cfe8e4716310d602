//! Client builder
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tailor_client::{ClientBuilder, ClientMetrics};
//!
//! # async fn example() -> tailor_core::Result<()> {
//! let meter = tailor_core::Telemetry::disabled().meter("haberdasher-client");
//! let client = ClientBuilder::new("ws://127.0.0.1:8080")
//!     .with_timeout(Duration::from_secs(5))
//!     .with_metrics(Arc::new(ClientMetrics::new(&meter)))
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::{ClientMetrics, RpcClient};
use std::sync::Arc;
use std::time::Duration;
use tailor_core::Result;

/// Builder for [`RpcClient`]
pub struct ClientBuilder {
    url: String,
    default_timeout: Option<Duration>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl ClientBuilder {
    /// Create a builder for the given `ws://` URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            default_timeout: None,
            metrics: None,
        }
    }

    /// Apply this timeout to every request made with [`RpcClient::request`]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Record request metrics
    pub fn with_metrics(mut self, metrics: Arc<ClientMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Connect to the server
    pub async fn connect(self) -> Result<RpcClient> {
        RpcClient::connect_with(&self.url, self.default_timeout, self.metrics).await
    }
}
