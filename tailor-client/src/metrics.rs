//! Client metrics definitions
//!
//! OpenTelemetry instruments for monitoring calls made by the client and by
//! the [`RetryingInvoker`](crate::RetryingInvoker).
//!
//! # Metrics Collected
//!
//! - **requests_total**: Requests sent, by method and status (counter)
//! - **request_duration**: Round-trip time in seconds, by method and status (histogram)
//! - **attempts_total**: Invoker attempts, by outcome (counter)
//! - **retries_total**: Attempts that were retried (counter)
//! - **attempt_duration**: Time spent in each attempt in seconds (histogram)
//!
//! # Examples
//!
//! ```rust
//! use tailor_client::ClientMetrics;
//!
//! let meter = tailor_core::Telemetry::disabled().meter("haberdasher-client");
//! let metrics = ClientMetrics::new(&meter);
//! metrics.record_request("Haberdasher/MakeHat", "ok", 0.012);
//! ```

use crate::retry::{AttemptOutcome, CallAttempt};
use opentelemetry::{
    metrics::{Counter, Histogram, Meter},
    KeyValue,
};

/// Client metrics for monitoring
///
/// All metrics are prefixed with `tailor.client.*`.
pub struct ClientMetrics {
    /// Total number of requests sent
    pub requests_total: Counter<u64>,
    /// Request round-trip duration in seconds
    pub request_duration: Histogram<f64>,
    /// Total number of invoker attempts
    pub attempts_total: Counter<u64>,
    /// Total number of retried attempts
    pub retries_total: Counter<u64>,
    /// Duration of each invoker attempt in seconds
    pub attempt_duration: Histogram<f64>,
}

impl ClientMetrics {
    /// Create the instruments from a meter
    pub fn new(meter: &Meter) -> Self {
        Self {
            requests_total: meter
                .u64_counter("tailor.client.requests.total")
                .with_description("Total number of requests sent")
                .build(),
            request_duration: meter
                .f64_histogram("tailor.client.request.duration")
                .with_description("Request round-trip duration in seconds")
                .with_unit("s")
                .build(),
            attempts_total: meter
                .u64_counter("tailor.client.attempts.total")
                .with_description("Total number of call attempts")
                .build(),
            retries_total: meter
                .u64_counter("tailor.client.retries.total")
                .with_description("Total number of attempts followed by a retry")
                .build(),
            attempt_duration: meter
                .f64_histogram("tailor.client.attempt.duration")
                .with_description("Call attempt duration in seconds")
                .with_unit("s")
                .build(),
        }
    }

    /// Record a finished request
    ///
    /// `status` is `"ok"` or the error code of the failure.
    pub fn record_request(&self, method: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);
    }

    /// Record one invoker attempt
    pub fn record_attempt(&self, attempt: &CallAttempt) {
        let attributes = &[KeyValue::new("outcome", attempt.outcome.as_str())];
        self.attempts_total.add(1, attributes);
        self.attempt_duration
            .record(attempt.elapsed.as_secs_f64(), attributes);
        if attempt.outcome == AttemptOutcome::Retryable {
            self.retries_total.add(1, &[]);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use opentelemetry::metrics::MeterProvider as _;
    use opentelemetry_sdk::metrics::data::{AggregatedMetrics, MetricData};
    use opentelemetry_sdk::metrics::{InMemoryMetricExporter, PeriodicReader, SdkMeterProvider};
    use std::time::Duration;

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
            self.provider.meter("tailor-client-test")
        }

        /// Sum of all data points of a u64 counter
        pub(crate) fn counter(&self, name: &str) -> u64 {
            self.provider.force_flush().unwrap();
            let exported = self.exporter.get_finished_metrics().unwrap();
            let Some(latest) = exported.last() else {
                return 0;
            };
            latest
                .scope_metrics()
                .flat_map(|scope| scope.metrics())
                .filter(|metric| metric.name() == name)
                .map(|metric| match metric.data() {
                    AggregatedMetrics::U64(MetricData::Sum(sum)) => {
                        sum.data_points().map(|point| point.value()).sum()
                    }
                    _ => 0,
                })
                .sum()
        }
    }

    #[test]
    fn test_request_metrics() {
        let recorded = InMemoryMeter::new();
        let metrics = ClientMetrics::new(&recorded.meter());

        metrics.record_request("Haberdasher/MakeHat", "ok", 0.05);
        metrics.record_request("Haberdasher/MakeHat", "unavailable", 0.01);

        assert_eq!(recorded.counter("tailor.client.requests.total"), 2);
    }

    #[test]
    fn test_only_retried_attempts_count_as_retries() {
        let recorded = InMemoryMeter::new();
        let metrics = ClientMetrics::new(&recorded.meter());

        for (index, outcome) in [
            AttemptOutcome::Retryable,
            AttemptOutcome::Retryable,
            AttemptOutcome::Exhausted,
            AttemptOutcome::Fatal,
            AttemptOutcome::Success,
        ]
        .into_iter()
        .enumerate()
        {
            metrics.record_attempt(&CallAttempt {
                index: index as u32,
                elapsed: Duration::from_millis(3),
                outcome,
            });
        }

        assert_eq!(recorded.counter("tailor.client.attempts.total"), 5);
        assert_eq!(recorded.counter("tailor.client.retries.total"), 2);
    }
}
