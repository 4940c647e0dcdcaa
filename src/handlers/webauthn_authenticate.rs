//! WebAuthn authentication handlers.
//!
//! Implements the two-phase passkey login flow:
//! 1. `auth_start` - Issue a challenge and return credential request options
//! 2. `auth_finish` - Verify the assertion and start a fresh session

use crate::app_state::AppState;
use crate::domain::User;
use crate::error::{AuthError, AuthResult};
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::webauthn_register::{ceremony_failure, CeremonyResponse};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct AuthStartRequest {
    // ---
    /// Omitted for a usernameless (discoverable) login.
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthStartResponse {
    // ---
    pub options: Value,
}

#[derive(Debug, Deserialize)]
pub struct AuthFinishRequest {
    // ---
    #[serde(default)]
    pub username: Option<String>,
    /// Output of `navigator.credentials.get()`, JSON-encoded.
    pub credential: Value,
}

// ============================================================================
// Authentication Start Handler
// ============================================================================

/// POST /webauthn/auth/start
///
/// Issues a login challenge. With a username the options list that user's
/// credentials; otherwise the browser offers any passkey for this site.
pub async fn auth_start(
    State(state): State<AppState>,
    Json(req): Json<AuthStartRequest>,
) -> Result<Json<AuthStartResponse>, AuthError> {
    // ---
    let options = state.engine().start_login(req.username.as_deref()).await?;

    Ok(Json(AuthStartResponse { options }))
}

// ============================================================================
// Authentication Finish Handler
// ============================================================================

/// Starts a new session for `user`, retiring the one the browser came with.
async fn rotate_session(state: &AppState, headers: &HeaderMap, user: &User) -> AuthResult<HeaderValue> {
    // ---
    let sessions = state.sessions();
    let previous = sessions.session_id_from_request(headers);

    let (session, token) = sessions.create().await?;
    sessions.attach_user(&session.session_id, user.id).await?;

    if let Some(previous) = previous {
        sessions.remove(&previous).await?;
    }

    sessions.session_cookie(&token)
}

/// POST /webauthn/auth/finish
///
/// Verifies the assertion. On success responds `{ "success": true }` with the
/// new session cookie; every protocol failure is `{ "success": false }`.
pub async fn auth_finish(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AuthFinishRequest>,
) -> Response {
    // ---
    let user = match state
        .engine()
        .finish_login(req.username.as_deref(), &req.credential)
        .await
    {
        Ok(user) => user,
        Err(e) => return ceremony_failure(e),
    };

    let cookie = match rotate_session(&state, &headers, &user).await {
        Ok(cookie) => cookie,
        Err(e) => return e.into_response(),
    };

    (
        [(header::SET_COOKIE, cookie)],
        Json(CeremonyResponse { success: true }),
    )
        .into_response()
}
