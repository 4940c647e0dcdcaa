use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use webauthn_rs::prelude::*;

use crate::domain::{
    Credential, PasskeyVerifier, PreparedCeremony, VerifiedAssertion, VerifiedCredential,
};
use crate::error::{AuthError, AuthResult};

/// Server-side state of a login ceremony, kept with its challenge.
#[derive(Serialize, Deserialize)]
enum LoginState {
    /// Login for a known user, restricted to their credentials.
    Scoped(PasskeyAuthentication),
    /// Usernameless login; the authenticator picks the credential.
    Discoverable(DiscoverableAuthentication),
}

/// `PasskeyVerifier` on top of webauthn-rs.
///
/// Stored credential key material is the serialized webauthn-rs `Passkey`.
pub struct WebauthnVerifier {
    // ---
    webauthn: Webauthn,
}

impl WebauthnVerifier {
    // ---
    pub fn new(webauthn: Webauthn) -> Self {
        // ---
        Self { webauthn }
    }
}

fn internal(context: &str, err: impl std::fmt::Display) -> AuthError {
    // ---
    AuthError::Internal(anyhow::anyhow!("{context}: {err}"))
}

fn decode_passkey(credential: &Credential) -> AuthResult<Passkey> {
    // ---
    serde_json::from_slice(&credential.public_key).map_err(|e| {
        tracing::error!(
            "Failed to deserialize passkey for credential {}: {:?}",
            hex::encode(&credential.id),
            e
        );
        AuthError::from(e)
    })
}

/// Reads the raw challenge bytes out of serialized ceremony options.
fn options_challenge(options: &Value) -> AuthResult<Vec<u8>> {
    // ---
    let text = options
        .pointer("/publicKey/challenge")
        .and_then(Value::as_str)
        .ok_or_else(|| internal("ceremony options", "no challenge"))?;

    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(text)
        .map_err(|e| internal("ceremony options challenge", e))
}

/// Passkeys here must be discoverable and user-verified.
fn require_resident_key(options: &mut Value) {
    // ---
    if let Some(selection) = options.pointer_mut("/publicKey/authenticatorSelection") {
        selection["residentKey"] = Value::from("required");
        selection["requireResidentKey"] = Value::from(true);
        selection["userVerification"] = Value::from("required");
    } else if let Some(public_key) = options.pointer_mut("/publicKey") {
        public_key["authenticatorSelection"] = serde_json::json!({
            "residentKey": "required",
            "requireResidentKey": true,
            "userVerification": "required",
        });
    }
}

fn prepared(options: Value, state: Vec<u8>) -> AuthResult<PreparedCeremony> {
    // ---
    let challenge = options_challenge(&options)?;
    Ok(PreparedCeremony {
        options,
        challenge,
        state,
    })
}

impl PasskeyVerifier for WebauthnVerifier {
    // ---
    fn start_registration(
        &self,
        user_handle: Uuid,
        username: &str,
        exclude: &[Credential],
    ) -> AuthResult<PreparedCeremony> {
        // ---
        let exclude: Vec<CredentialID> = exclude
            .iter()
            .map(|c| CredentialID::from(c.id.clone()))
            .collect();
        let exclude = (!exclude.is_empty()).then_some(exclude);

        let (options, state) = self
            .webauthn
            .start_passkey_registration(user_handle, username, username, exclude)
            .map_err(|e| internal("start registration", e))?;

        let mut options = serde_json::to_value(&options)?;
        require_resident_key(&mut options);

        prepared(options, serde_json::to_vec(&state)?)
    }

    fn finish_registration(&self, response: &Value, state: &[u8]) -> AuthResult<VerifiedCredential> {
        // ---
        let response: RegisterPublicKeyCredential = serde_json::from_value(response.clone())
            .map_err(|e| AuthError::AttestationInvalid(format!("malformed response: {e}")))?;
        let state: PasskeyRegistration = serde_json::from_slice(state)?;

        let passkey = self
            .webauthn
            .finish_passkey_registration(&response, &state)
            .map_err(|e| AuthError::AttestationInvalid(e.to_string()))?;

        // webauthn-rs keeps the registration counter inside the passkey and
        // enforces its own ordering; the stored counter starts at zero.
        Ok(VerifiedCredential {
            credential_id: passkey.cred_id().to_vec(),
            public_key: serde_json::to_vec(&passkey)?,
            sign_counter: 0,
        })
    }

    fn start_login(&self, allowed: &[Credential]) -> AuthResult<PreparedCeremony> {
        // ---
        let (options, state) = if allowed.is_empty() {
            let (options, state) = self
                .webauthn
                .start_discoverable_authentication()
                .map_err(|e| internal("start discoverable login", e))?;
            (options, LoginState::Discoverable(state))
        } else {
            let passkeys = allowed
                .iter()
                .map(decode_passkey)
                .collect::<AuthResult<Vec<Passkey>>>()?;
            let (options, state) = self
                .webauthn
                .start_passkey_authentication(&passkeys)
                .map_err(|e| internal("start login", e))?;
            (options, LoginState::Scoped(state))
        };

        let mut options = serde_json::to_value(&options)?;
        if let Some(public_key) = options.pointer_mut("/publicKey") {
            public_key["userVerification"] = Value::from("required");
        }

        prepared(options, serde_json::to_vec(&state)?)
    }

    fn finish_login(
        &self,
        response: &Value,
        state: &[u8],
        stored: &Credential,
    ) -> AuthResult<VerifiedAssertion> {
        // ---
        let response: PublicKeyCredential = serde_json::from_value(response.clone())
            .map_err(|e| AuthError::AssertionInvalid(format!("malformed response: {e}")))?;
        let state: LoginState = serde_json::from_slice(state)?;
        let mut passkey = decode_passkey(stored)?;

        let result = match state {
            LoginState::Scoped(state) => self
                .webauthn
                .finish_passkey_authentication(&response, &state),
            LoginState::Discoverable(state) => self.webauthn.finish_discoverable_authentication(
                &response,
                state,
                &[DiscoverableKey::from(&passkey)],
            ),
        }
        .map_err(|e| match e {
            WebauthnError::CredentialPossibleCompromise => AuthError::CounterRegression {
                stored: stored.sign_counter,
                presented: stored.sign_counter,
            },
            other => AuthError::AssertionInvalid(other.to_string()),
        })?;

        passkey.update_credential(&result);

        Ok(VerifiedAssertion {
            credential_id: result.cred_id().to_vec(),
            sign_counter: result.counter(),
            public_key: serde_json::to_vec(&passkey)?,
        })
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::config::WebAuthnConfig;
    use std::time::Duration;

    fn verifier() -> WebauthnVerifier {
        // ---
        let config = WebAuthnConfig {
            rp_id: "localhost".to_string(),
            rp_name: "Test App".to_string(),
            origin: "http://localhost:8080".to_string(),
            challenge_ttl: Duration::from_secs(300),
            conceal_unknown_users: true,
        };
        WebauthnVerifier::new(super::super::create_webauthn(&config).unwrap())
    }

    #[test]
    fn registration_options_require_resident_key_and_uv() {
        // ---
        let prepared = verifier()
            .start_registration(Uuid::new_v4(), "alice", &[])
            .unwrap();

        let selection = prepared
            .options
            .pointer("/publicKey/authenticatorSelection")
            .unwrap();
        assert_eq!(selection["residentKey"], "required");
        assert_eq!(selection["requireResidentKey"], true);
        assert_eq!(selection["userVerification"], "required");
        assert!(prepared.challenge.len() >= crate::domain::MIN_CHALLENGE_BYTES);
    }

    #[test]
    fn discoverable_login_has_no_allow_list() {
        // ---
        let prepared = verifier().start_login(&[]).unwrap();

        let allow = prepared.options.pointer("/publicKey/allowCredentials");
        assert!(allow.map_or(true, |v| v.as_array().map_or(true, Vec::is_empty)));
        assert_eq!(prepared.options["publicKey"]["userVerification"], "required");
    }

    #[test]
    fn garbage_attestation_is_rejected_as_invalid() {
        // ---
        let v = verifier();
        let prepared = v.start_registration(Uuid::new_v4(), "alice", &[]).unwrap();

        let err = v
            .finish_registration(&serde_json::json!({"id": "nope"}), &prepared.state)
            .unwrap_err();
        assert!(matches!(err, AuthError::AttestationInvalid(_)));
    }
}
