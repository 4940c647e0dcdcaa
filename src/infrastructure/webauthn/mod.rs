//! WebAuthn configuration, builder and the production verifier.
//!
//! `create_webauthn` builds the relying party identity; [`WebauthnVerifier`]
//! wraps it behind the `PasskeyVerifier` seam used by the protocol engine.

mod verifier;

use std::str::FromStr;
use std::sync::Arc;

use crate::config::WebAuthnConfig;
use crate::domain::VerifierPtr;
use anyhow::Result;
use reqwest::Url;
use webauthn_rs::{Webauthn, WebauthnBuilder};

pub use verifier::WebauthnVerifier;

/// Creates a configured WebAuthn instance from application config.
///
/// # Errors
/// Returns an error if the WebAuthn builder fails to construct a valid instance.
/// This typically happens if the origin URL or RP ID are malformed.
pub fn create_webauthn(config: &WebAuthnConfig) -> Result<Webauthn> {
    // ---
    tracing::debug!("Creating with config:{:?}", config);

    let url = Url::from_str(config.origin.as_str())?;
    let builder = WebauthnBuilder::new(&config.rp_id, &url)?;
    let webauthn = builder.rp_name(&config.rp_name).build()?;

    Ok(webauthn)
}

/// Creates the webauthn-rs backed verifier.
pub fn create_webauthn_verifier(config: &WebAuthnConfig) -> Result<VerifierPtr> {
    // ---
    Ok(Arc::new(WebauthnVerifier::new(create_webauthn(config)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(origin: &str) -> WebAuthnConfig {
        WebAuthnConfig {
            rp_id: "localhost".to_string(),
            rp_name: "Test App".to_string(),
            origin: origin.to_string(),
            challenge_ttl: Duration::from_secs(300),
            conceal_unknown_users: true,
        }
    }

    #[test]
    fn create_webauthn_success() {
        let result = create_webauthn(&config("http://localhost:8080"));
        assert!(result.is_ok());
    }

    #[test]
    fn create_webauthn_invalid_origin() {
        let result = create_webauthn(&config("not-a-valid-url"));
        assert!(result.is_err());
    }

    #[test]
    fn create_webauthn_verifier_success() {
        assert!(create_webauthn_verifier(&config("http://localhost:8080")).is_ok());
    }
}
