use std::sync::Arc;

/// Abstraction for application metrics (counters).
pub trait Metrics: Send + Sync + 'static {
    // ---
    /// Render current metrics in Prometheus text format.
    fn render(&self) -> String;

    /// Record the terminal outcome of a passkey ceremony.
    ///
    /// `ceremony` is `"registration"` or `"login"`, `outcome` is `"completed"`
    /// or the failing error's label.
    fn record_ceremony(&self, ceremony: &'static str, outcome: &'static str);

    /// Record a sign-counter regression (possible cloned authenticator).
    fn record_counter_regression(&self);

    /// Record a session lifecycle event (`created`, `authenticated`, `revoked`, `rejected`).
    fn record_session_event(&self, event: &'static str);
}

/// Type alias for any backend that implements Metrics.
pub type MetricsPtr = Arc<dyn Metrics>;
