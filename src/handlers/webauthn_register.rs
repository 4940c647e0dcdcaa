//! WebAuthn registration handlers.
//!
//! Implements the two-phase passkey registration flow:
//! 1. `register_start` - Issue a challenge and return credential creation options
//! 2. `register_finish` - Verify the attestation and create user + credential

use crate::app_state::AppState;
use crate::error::AuthError;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegistrationStartRequest {
    // ---
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct RegistrationStartResponse {
    // ---
    pub options: Value,
}

#[derive(Debug, Deserialize)]
pub struct RegistrationFinishRequest {
    // ---
    pub username: String,
    /// Output of `navigator.credentials.create()`, JSON-encoded.
    pub credential: Value,
}

#[derive(Debug, Serialize)]
pub struct CeremonyResponse {
    // ---
    pub success: bool,
}

/// Response for a failed finish step.
///
/// Protocol failures all look the same to the caller; username problems
/// and infrastructure errors keep their own status.
pub(super) fn ceremony_failure(err: AuthError) -> Response {
    // ---
    if err.is_ceremony_failure() {
        (
            StatusCode::UNAUTHORIZED,
            Json(CeremonyResponse { success: false }),
        )
            .into_response()
    } else {
        err.into_response()
    }
}

// ============================================================================
// Registration Start Handler
// ============================================================================

/// POST /webauthn/register/start
///
/// Initiates passkey registration for a new account.
///
/// # Request Body
/// ```json
/// { "username": "user@example.com" }
/// ```
///
/// # Response
/// `{ "options": ... }` for `navigator.credentials.create()`.
/// 400 for a malformed username, 409 if it is taken.
pub async fn register_start(
    State(state): State<AppState>,
    Json(req): Json<RegistrationStartRequest>,
) -> Result<Json<RegistrationStartResponse>, AuthError> {
    // ---
    let options = state.engine().start_registration(&req.username).await?;

    Ok(Json(RegistrationStartResponse { options }))
}

// ============================================================================
// Registration Finish Handler
// ============================================================================

/// POST /webauthn/register/finish
///
/// Completes passkey registration. The user and the credential are created
/// together; a lost race for the username is a 409.
pub async fn register_finish(
    State(state): State<AppState>,
    Json(req): Json<RegistrationFinishRequest>,
) -> Response {
    // ---
    let result = state
        .engine()
        .finish_registration(&req.username, &req.credential)
        .await;

    match result {
        Ok(_) => Json(CeremonyResponse { success: true }).into_response(),
        Err(e) => ceremony_failure(e),
    }
}
