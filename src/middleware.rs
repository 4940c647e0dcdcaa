//! Request authentication.
//!
//! Every request passes through [`authenticate`], which resolves the session
//! cookie and leaves a [`RequestContext`] in the request extensions for the
//! handlers.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::app_state::AppState;
use crate::domain::{Session, User};
use crate::error::AuthError;

/// Identity attached to a request by [`authenticate`].
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// The live session named by the cookie, if any.
    pub session: Option<Session>,
    /// The signed-in user, if the session carries one.
    pub user: Option<User>,
}

impl RequestContext {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// `302 Found` to `location`, optionally replacing the session cookie.
pub fn redirect(location: &str, set_cookie: Option<HeaderValue>) -> Response {
    // ---
    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(location) {
        Ok(value) => {
            headers.insert(header::LOCATION, value);
        }
        Err(e) => {
            tracing::error!("Invalid redirect location {:?}: {}", location, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }
    if let Some(cookie) = set_cookie {
        headers.insert(header::SET_COOKIE, cookie);
    }
    (StatusCode::FOUND, headers).into_response()
}

/// Resolves the session cookie before routing.
///
/// A cookie that no longer names a live session is not an error for the
/// browser: the session is revoked, the cookie cleared and the browser sent
/// to the login page. Storage failures are a 500.
pub async fn authenticate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    // ---
    let sessions = state.sessions();

    let session = match sessions.load(req.headers()).await {
        Ok(session) => session,
        Err(AuthError::Unauthenticated) => {
            return match sessions.remove_from_request(req.headers()).await {
                Ok(clearing) => redirect(sessions.login_path(), Some(clearing)),
                Err(e) => e.into_response(),
            };
        }
        Err(e) => return e.into_response(),
    };

    let user = match session.as_ref().and_then(|s| s.user_id) {
        Some(user_id) => match state.repository().get_user_by_id(user_id).await {
            Ok(user) => user,
            Err(e) => return e.into_response(),
        },
        None => None,
    };

    req.extensions_mut().insert(RequestContext { session, user });
    next.run(req).await
}
