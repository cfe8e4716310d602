//! Haberdasher client
//!
//! Asks for one 12 inch hat, retrying while the haberdasher is busy.
//!
//! ```bash
//! HABERDASHER_URL=ws://127.0.0.1:8080 cargo run --bin haberdasher-client
//! ```

use std::sync::Arc;
use tailor::client::ClientMetrics;
use tailor::config::ClientConfig;
use tailor::haberdasher::{HaberdasherClient, Size};
use tailor::{RetryingInvoker, RpcClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = ClientConfig::from_env()?;
    let telemetry = tailor::core::init_telemetry(&config.telemetry)?;
    let metrics = Arc::new(ClientMetrics::new(&telemetry.meter("haberdasher-client")));

    let client = RpcClient::builder(config.url.as_str())
        .with_metrics(Arc::clone(&metrics))
        .connect()
        .await?;
    let invoker = RetryingInvoker::new()
        .with_max_attempts(config.max_attempts)
        .with_metrics(metrics);
    let haberdasher = HaberdasherClient::new(client.clone(), invoker);

    let outcome = haberdasher.make_hat(Size { inches: 12 }).await;

    let _ = client.disconnect().await;
    telemetry.shutdown();

    let hat = outcome?;
    println!("{:?}", hat);
    Ok(())
}
