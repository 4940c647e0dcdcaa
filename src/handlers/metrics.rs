use crate::app_state::AppState;
use axum::{extract::State, http::header, response::IntoResponse};

const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// GET /metrics
///
/// Ceremony outcomes, counter regressions and session events in Prometheus
/// text format. With the no-op backend the body is empty.
pub async fn metrics_handler(State(app_state): State<AppState>) -> impl IntoResponse {
    // ---
    let metrics_text = app_state.metrics().render();

    ([(header::CONTENT_TYPE, PROMETHEUS_TEXT)], metrics_text)
}
