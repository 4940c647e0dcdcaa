use crate::domain::Metrics;

/// Metrics sink that records nothing.
#[derive(Default)]
pub struct NoopMetrics;

impl NoopMetrics {
    pub fn new() -> Self {
        NoopMetrics
    }
}

impl Metrics for NoopMetrics {
    // ---
    fn render(&self) -> String {
        String::new()
    }
    fn record_ceremony(&self, _: &'static str, _: &'static str) {}
    fn record_counter_regression(&self) {}
    fn record_session_event(&self, _: &'static str) {}
}
