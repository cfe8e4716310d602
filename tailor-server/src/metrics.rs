//! Server metrics definitions
//!
//! OpenTelemetry instruments for monitoring the server. Instruments are built
//! from a [`Meter`] handed in by the caller, usually obtained from
//! [`tailor_core::Telemetry::meter`].
//!
//! # Metrics Collected
//!
//! - **connections_active**: Current number of open WebSocket connections (gauge)
//! - **connections_total**: Connections accepted since startup (counter)
//! - **requests_total**: Requests dispatched, by method and outcome code (counter)
//! - **request_duration**: Dispatch latency in seconds, by method and outcome code (histogram)
//! - **errors_total**: Failed requests, by method and error code (counter)
//!
//! A successful request is recorded with the code `"ok"`.
//!
//! # Examples
//!
//! ```rust
//! use tailor_server::ServerMetrics;
//!
//! let meter = tailor_core::Telemetry::disabled().meter("haberdasher");
//! let metrics = ServerMetrics::new(&meter);
//!
//! metrics.record_connection(1);
//! metrics.record_request("Haberdasher/MakeHat", "ok", 0.004);
//! metrics.record_request("Haberdasher/MakeHat", "unavailable", 0.001);
//! ```

use opentelemetry::{
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

/// Code recorded for successful requests
pub const OK_CODE: &str = "ok";

/// Server metrics for monitoring
///
/// All metrics are prefixed with `tailor.server.*`.
pub struct ServerMetrics {
    /// Number of open connections
    pub connections_active: Gauge<i64>,
    /// Total number of connections (cumulative)
    pub connections_total: Counter<u64>,
    /// Total number of requests dispatched
    pub requests_total: Counter<u64>,
    /// Request dispatch duration in seconds
    pub request_duration: Histogram<f64>,
    /// Total number of failed requests
    pub errors_total: Counter<u64>,
}

impl ServerMetrics {
    /// Create the instruments from a meter
    pub fn new(meter: &Meter) -> Self {
        Self {
            connections_active: meter
                .i64_gauge("tailor.server.connections.active")
                .with_description("Number of open WebSocket connections")
                .build(),
            connections_total: meter
                .u64_counter("tailor.server.connections.total")
                .with_description("Total number of connections accepted")
                .build(),
            requests_total: meter
                .u64_counter("tailor.server.requests.total")
                .with_description("Total number of requests dispatched")
                .build(),
            request_duration: meter
                .f64_histogram("tailor.server.request.duration")
                .with_description("Request dispatch duration in seconds")
                .with_unit("s")
                .build(),
            errors_total: meter
                .u64_counter("tailor.server.errors.total")
                .with_description("Total number of failed requests")
                .build(),
        }
    }

    /// Record a new connection
    pub fn record_connection(&self, active: i64) {
        self.connections_active.record(active, &[]);
        self.connections_total.add(1, &[]);
    }

    /// Record a disconnection
    pub fn record_disconnection(&self, active: i64) {
        self.connections_active.record(active, &[]);
    }

    /// Record a finished request
    ///
    /// `code` is [`OK_CODE`] on success, otherwise the wire name of the
    /// error code.
    pub fn record_request(&self, method: &str, code: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("code", code.to_string()),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);
        if code != OK_CODE {
            self.errors_total.add(1, attributes);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use opentelemetry::metrics::MeterProvider as _;
    use opentelemetry_sdk::metrics::data::{AggregatedMetrics, MetricData, ResourceMetrics};
    use opentelemetry_sdk::metrics::{InMemoryMetricExporter, PeriodicReader, SdkMeterProvider};

    /// Meter provider that keeps exported metrics in memory
    pub(crate) struct InMemoryMeter {
        provider: SdkMeterProvider,
        exporter: InMemoryMetricExporter,
    }

    impl InMemoryMeter {
        pub(crate) fn new() -> Self {
            let exporter = InMemoryMetricExporter::default();
            let provider = SdkMeterProvider::builder()
                .with_reader(PeriodicReader::builder(exporter.clone()).build())
                .build();
            Self { provider, exporter }
        }

        pub(crate) fn meter(&self) -> Meter {
            self.provider.meter("tailor-server-test")
        }

        fn latest(&self) -> Option<ResourceMetrics> {
            self.provider.force_flush().unwrap();
            self.exporter.get_finished_metrics().unwrap().pop()
        }

        /// Sum of the u64 counter's data points whose attributes include `filter`
        pub(crate) fn counter(&self, name: &str, filter: Option<(&str, &str)>) -> u64 {
            let Some(latest) = self.latest() else {
                return 0;
            };
            latest
                .scope_metrics()
                .flat_map(|scope| scope.metrics())
                .filter(|metric| metric.name() == name)
                .map(|metric| match metric.data() {
                    AggregatedMetrics::U64(MetricData::Sum(sum)) => sum
                        .data_points()
                        .filter(|point| match filter {
                            Some((key, value)) => point
                                .attributes()
                                .any(|attr| attr.key.as_str() == key && attr.value.as_str() == value),
                            None => true,
                        })
                        .map(|point| point.value())
                        .sum(),
                    _ => 0,
                })
                .sum()
        }

        fn gauge(&self, name: &str) -> Option<i64> {
            let latest = self.latest()?;
            let value = latest
                .scope_metrics()
                .flat_map(|scope| scope.metrics())
                .filter(|metric| metric.name() == name)
                .find_map(|metric| match metric.data() {
                    AggregatedMetrics::I64(MetricData::Gauge(gauge)) => {
                        gauge.data_points().next().map(|point| point.value())
                    }
                    _ => None,
                });
            value
        }
    }

    #[test]
    fn test_connection_metrics() {
        let recorded = InMemoryMeter::new();
        let metrics = ServerMetrics::new(&recorded.meter());

        metrics.record_connection(1);
        metrics.record_connection(2);
        metrics.record_disconnection(1);

        assert_eq!(recorded.counter("tailor.server.connections.total", None), 2);
        assert_eq!(recorded.gauge("tailor.server.connections.active"), Some(1));
    }

    #[test]
    fn test_request_metrics() {
        let recorded = InMemoryMeter::new();
        let metrics = ServerMetrics::new(&recorded.meter());

        metrics.record_request("Haberdasher/MakeHat", OK_CODE, 0.05);
        metrics.record_request("Haberdasher/MakeHat", "unavailable", 0.01);
        metrics.record_request("Nope/Missing", "bad_route", 0.0);

        assert_eq!(recorded.counter("tailor.server.requests.total", None), 3);
        assert_eq!(recorded.counter("tailor.server.errors.total", None), 2);
        assert_eq!(
            recorded.counter("tailor.server.errors.total", Some(("code", "unavailable"))),
            1
        );
    }
}
