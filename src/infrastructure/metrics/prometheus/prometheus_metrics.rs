//! Prometheus metrics implementation.
//!
//! Concrete implementation of the `Metrics` trait on top of the global
//! `metrics` crate registry. Counters are registered on first use by the
//! helpers in `counters.rs`; the handle kept by `recorder.rs` renders them
//! in Prometheus text format.

use crate::domain::Metrics;

/// Prometheus-based metrics implementation.
///
/// Carries no state of its own: counters live in the global registry and
/// the global `PrometheusHandle` renders them.
#[derive(Default)]
pub struct PrometheusMetrics {}

impl PrometheusMetrics {
    pub fn new() -> Self {
        tracing::info!("Creating Prometheus metrics");
        PrometheusMetrics {}
    }
}

impl Metrics for PrometheusMetrics {
    fn render(&self) -> String {
        super::render_metrics()
    }

    fn record_ceremony(&self, ceremony: &'static str, outcome: &'static str) {
        tracing::debug!("Recording {} ceremony outcome: {}", ceremony, outcome);
        super::increment_ceremony(ceremony, outcome);
    }

    fn record_counter_regression(&self) {
        super::increment_counter_regression();
    }

    fn record_session_event(&self, event: &'static str) {
        super::increment_session_event(event);
    }
}
