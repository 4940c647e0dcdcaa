//! Signed-in user routes: logout and the protected landing page.

use crate::app_state::AppState;
use crate::middleware::{redirect, RequestContext};
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ProtectedResponse {
    pub user_id: Uuid,
    pub username: String,
}

/// POST /user/logout
///
/// Revokes the current session, clears the cookie and sends the browser to
/// the login page. Logging out without a session is not an error.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    // ---
    let sessions = state.sessions();
    match sessions.remove_from_request(&headers).await {
        Ok(clearing) => redirect(sessions.login_path(), Some(clearing)),
        Err(e) => e.into_response(),
    }
}

/// GET /protected
///
/// Only for signed-in users; anyone else is redirected to the login page.
pub async fn protected(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
) -> Response {
    // ---
    match context.user {
        Some(user) => Json(ProtectedResponse {
            user_id: user.id,
            username: user.username,
        })
        .into_response(),
        None => redirect(state.sessions().login_path(), None),
    }
}
