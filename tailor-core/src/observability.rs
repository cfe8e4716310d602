//! OpenTelemetry telemetry configuration and initialization
//!
//! Telemetry is configured once at process start from a [`TelemetryConfig`]
//! and produces a [`Telemetry`] handle that owns the tracer and meter
//! providers. Components that record metrics receive meters from that
//! handle; nothing in the library reaches for process-wide providers.
//!
//! The only process-wide piece is the `tracing` subscriber, which bridges
//! `tracing` spans and events to the OTLP exporter and to JSON logs on
//! stdout.
//!
//! # Usage Pattern
//!
//! ```rust,no_run
//! use tailor_core::TelemetryConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = TelemetryConfig::new("haberdasher")
//!         .with_endpoint("http://localhost:4317")
//!         .with_log_level("debug");
//!
//!     let telemetry = tailor_core::init_telemetry(&config).expect("Failed to init telemetry");
//!     let meter = telemetry.meter("haberdasher");
//!
//!     // ... run your application ...
//!
//!     telemetry.shutdown();
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: Collector endpoint
//! - `RUST_LOG`: Log level filter (e.g., "info", "debug")

use opentelemetry::metrics::{Meter, MeterProvider as _};
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Boxed error returned by telemetry setup
pub type TelemetryError = Box<dyn std::error::Error + Send + Sync>;

/// Telemetry configuration
///
/// # Defaults
///
/// - Service name: "tailor"
/// - Service version: Current crate version
/// - OTLP endpoint: `$OTEL_EXPORTER_OTLP_ENDPOINT` or "http://localhost:4317"
/// - Traces and metrics enabled
/// - Metrics export interval: 1 second
/// - Log level: `$RUST_LOG` or "info"
///
/// # Examples
///
/// ```rust
/// use tailor_core::TelemetryConfig;
///
/// let config = TelemetryConfig::new("haberdasher-client")
///     .with_endpoint("http://collector:4317")
///     .with_metrics(false);
/// assert!(!config.enable_metrics);
/// ```
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every span and metric
    pub service_name: String,
    /// Service version attached to every span and metric
    pub service_version: String,
    /// OTLP gRPC collector endpoint
    pub otlp_endpoint: String,
    /// Export spans
    pub enable_traces: bool,
    /// Export metrics
    pub enable_metrics: bool,
    /// How often metrics are pushed to the collector
    pub metrics_interval: Duration,
    /// Log level filter used when `RUST_LOG` is not set
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "tailor".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
            enable_traces: true,
            enable_metrics: true,
            metrics_interval: Duration::from_secs(1),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl TelemetryConfig {
    /// Create a new configuration with a custom service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set the OTLP collector endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = endpoint.into();
        self
    }

    /// Set the log level filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the service version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// Enable or disable span export
    pub fn with_traces(mut self, enable: bool) -> Self {
        self.enable_traces = enable;
        self
    }

    /// Enable or disable metrics export
    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    /// Set the metrics export interval
    pub fn with_metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = interval;
        self
    }

    fn resource(&self) -> Resource {
        Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                    self.service_name.clone(),
                ),
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                    self.service_version.clone(),
                ),
            ])
            .build()
    }
}

/// Owned telemetry providers
///
/// Returned by [`init_telemetry`]. Keep it alive for the lifetime of the
/// process and call [`Telemetry::shutdown`] before exiting so the last
/// batch of spans and metrics is flushed.
#[derive(Debug, Default)]
pub struct Telemetry {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl Telemetry {
    /// A handle with no exporters; meters from it record nothing
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Get a meter for recording metrics
    ///
    /// Without a configured meter provider this returns a no-op meter.
    pub fn meter(&self, name: &'static str) -> Meter {
        match &self.meter_provider {
            Some(provider) => provider.meter(name),
            None => opentelemetry::global::meter(name),
        }
    }

    /// Whether spans are exported
    pub fn traces_enabled(&self) -> bool {
        self.tracer_provider.is_some()
    }

    /// Whether metrics are exported
    pub fn metrics_enabled(&self) -> bool {
        self.meter_provider.is_some()
    }

    /// Flush and shut down the providers
    pub fn shutdown(self) {
        tracing::info!("Shutting down telemetry");

        if let Some(provider) = self.tracer_provider {
            if let Err(e) = provider.shutdown() {
                tracing::warn!(error = %e, "Tracer provider shutdown failed");
            }
        }
        if let Some(provider) = self.meter_provider {
            if let Err(e) = provider.shutdown() {
                tracing::warn!(error = %e, "Meter provider shutdown failed");
            }
        }
    }
}

/// Initialize telemetry with the given configuration
///
/// Builds the enabled providers and installs the `tracing` subscriber.
/// Call this once at process start.
///
/// # Errors
///
/// Fails if an exporter cannot be built, the log filter is invalid, or a
/// `tracing` subscriber is already installed.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<Telemetry, TelemetryError> {
    let tracer_provider = if config.enable_traces {
        Some(init_tracer_provider(config)?)
    } else {
        None
    };

    let meter_provider = if config.enable_metrics {
        Some(init_meter_provider(config)?)
    } else {
        None
    };

    init_tracing_subscriber(config, tracer_provider.as_ref())?;

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = %config.otlp_endpoint,
        traces = config.enable_traces,
        metrics = config.enable_metrics,
        "Telemetry initialized"
    );

    Ok(Telemetry {
        tracer_provider,
        meter_provider,
    })
}

/// Build the tracer provider
///
/// Spans are batched and exported over OTLP/gRPC. Every span is sampled,
/// matching the always-trace behaviour of the demo.
fn init_tracer_provider(config: &TelemetryConfig) -> Result<SdkTracerProvider, TelemetryError> {
    use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler};

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(config.resource())
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .build())
}

/// Build the meter provider with a periodic OTLP reader
fn init_meter_provider(config: &TelemetryConfig) -> Result<SdkMeterProvider, TelemetryError> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .build()?;

    let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
        .with_interval(config.metrics_interval)
        .build();

    Ok(SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build())
}

/// Install the `tracing` subscriber
///
/// Layers: an OpenTelemetry layer when a tracer provider exists, an
/// `EnvFilter` from `RUST_LOG` or the configured level, and a JSON fmt layer.
fn init_tracing_subscriber(
    config: &TelemetryConfig,
    tracer_provider: Option<&SdkTracerProvider>,
) -> Result<(), TelemetryError> {
    use opentelemetry::trace::TracerProvider as _;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .json();

    let telemetry_layer = tracer_provider.map(|provider| {
        let tracer = provider.tracer(config.service_name.clone());
        tracing_opentelemetry::layer().with_tracer(tracer)
    });

    tracing_subscriber::registry()
        .with(telemetry_layer)
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
