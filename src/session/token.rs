//! Signed session tokens and the cookie that carries them.
//!
//! A token is `<session id>.<mac>`, the mac being base64url
//! HMAC-SHA256 of the id under the server secret.

use axum::http::{header, HeaderMap, HeaderValue};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::hmac;

use crate::error::{AuthError, AuthResult};

pub fn signing_key(secret: &[u8]) -> hmac::Key {
    hmac::Key::new(hmac::HMAC_SHA256, secret)
}

/// Token for `session_id`.
pub fn sign(key: &hmac::Key, session_id: &str) -> String {
    // ---
    let tag = hmac::sign(key, session_id.as_bytes());
    format!("{}.{}", session_id, URL_SAFE_NO_PAD.encode(tag.as_ref()))
}

/// The session id carried by `token`, if its signature checks out.
///
/// Comparison is constant time.
pub fn verify(key: &hmac::Key, token: &str) -> Option<String> {
    // ---
    let (session_id, mac) = token.rsplit_once('.')?;
    if session_id.is_empty() {
        return None;
    }
    let mac = URL_SAFE_NO_PAD.decode(mac).ok()?;
    hmac::verify(key, session_id.as_bytes(), &mac).ok()?;
    Some(session_id.to_string())
}

/// Value of cookie `name` from the request's `Cookie` headers.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    // ---
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

fn cookie_header(text: String) -> AuthResult<HeaderValue> {
    // ---
    HeaderValue::from_str(&text)
        .map_err(|e| AuthError::Internal(anyhow::anyhow!("invalid Set-Cookie value: {e}")))
}

/// `Set-Cookie` value establishing the session cookie.
pub fn set_cookie(name: &str, token: &str, max_age_secs: u64, secure: bool) -> AuthResult<HeaderValue> {
    // ---
    let secure = if secure { "; Secure" } else { "" };
    cookie_header(format!(
        "{name}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age_secs}{secure}"
    ))
}

/// `Set-Cookie` value removing the session cookie from the browser.
pub fn clear_cookie(name: &str, secure: bool) -> AuthResult<HeaderValue> {
    // ---
    let secure = if secure { "; Secure" } else { "" };
    cookie_header(format!(
        "{name}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0{secure}"
    ))
}
