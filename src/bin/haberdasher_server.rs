//! Haberdasher server
//!
//! ```bash
//! HABERDASHER_FAILURE_RATE=0.5 RUST_LOG=debug cargo run --bin haberdasher-server
//! ```

use std::sync::Arc;
use tailor::config::ServerConfig;
use tailor::haberdasher::{self, HaberdasherService};
use tailor::server::{logging_hooks, Router, ServerMetrics};
use tailor::TailorServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = ServerConfig::from_env()?;
    let telemetry = tailor::core::init_telemetry(&config.telemetry)?;

    let service = HaberdasherService::new().with_failure_rate(config.failure_rate);
    tracing::info!(failure_rate = service.failure_rate(), "Starting haberdasher");

    let mut router = Router::new();
    haberdasher::register(&mut router, Arc::new(service));

    let server = TailorServer::builder()
        .bind(config.addr)
        .router(router)
        .hooks(logging_hooks())
        .with_metrics(Arc::new(ServerMetrics::new(&telemetry.meter("haberdasher"))))
        .build()
        .await?;

    tracing::info!(addr = %server.local_addr()?, "Haberdasher ready");

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Server stopped");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    telemetry.shutdown();
    Ok(())
}
