use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use redis::AsyncCommands;
use serde::Deserialize;

#[derive(serde::Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct HealthQuery {
    mode: Option<String>,
}

fn respond(status: StatusCode, text: &'static str) -> (StatusCode, Json<HealthResponse>) {
    (status, Json(HealthResponse { status: text }))
}

/// Responds with the health status of the server.
///
/// - By default (no query parameters), performs a light check to confirm the web server
///   is running.
///
/// - If `mode=full` is passed as a query parameter, also pings the Redis backend
///   when the service runs with one.
///
/// # Responses
/// - `200 OK` with `{ "status": "ok" }` if server (and Redis, in full mode) are healthy.
/// - `500 INTERNAL SERVER ERROR` with `{ "status": "error" }` if Redis connection or ping fails in full mode.
pub async fn health_check(
    State(state): State<AppState>,
    Query(params): Query<HealthQuery>,
) -> (StatusCode, Json<HealthResponse>) {
    // ---
    if params.mode.as_deref() != Some("full") {
        return respond(StatusCode::OK, "ok");
    }

    let mut conn = match state.get_conn().await {
        Ok(Some(conn)) => conn,
        Ok(None) => return respond(StatusCode::OK, "ok"),
        Err(_) => return respond(StatusCode::INTERNAL_SERVER_ERROR, "error"),
    };

    let ping_result: redis::RedisResult<String> = conn.ping().await;
    match ping_result {
        Ok(_) => respond(StatusCode::OK, "ok"),
        Err(e) => {
            tracing::error!("Redis ping failed: {}", e);
            respond(StatusCode::INTERNAL_SERVER_ERROR, "error")
        }
    }
}
