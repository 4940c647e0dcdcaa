use axum::response::IntoResponse;

pub async fn root_handler() -> impl IntoResponse {
    let version = env!("CARGO_PKG_VERSION");
    format!(
        r#"Passkey Sessions 🔑
Version: {version}

Available endpoints:
  - POST   /webauthn/register/start   - Begin passkey registration
  - POST   /webauthn/register/finish  - Complete passkey registration
  - POST   /webauthn/auth/start       - Begin passkey login
  - POST   /webauthn/auth/finish      - Complete passkey login (sets session cookie)
  - POST   /user/logout               - End the current session
  - GET    /protected                 - Signed-in users only
  - GET    /health                    - Light health check
  - GET    /health?mode=full          - Full health check (includes Redis)
  - GET    /metrics                   - Prometheus metrics
"#
    )
}
