//! Passkey protocol engine.
//!
//! Runs the start/finish halves of registration and login. Challenge
//! bookkeeping goes through the challenge registry, credentials through the
//! repository, and all signature work through the injected verifier.

use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

use super::ceremony::{Ceremony, CeremonyEvent};
use crate::domain::{
    Challenge, ChallengePurpose, ChallengeRegistryPtr, ChallengeRequest, ClockPtr, Credential,
    MetricsPtr, RepositoryPtr, User, VerifierPtr,
};
use crate::error::{AuthError, AuthResult, ChallengeRejection};

static USERNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._@+\-]{1,64}$").expect("username pattern is valid")
});

/// Whether `username` has an acceptable shape.
pub fn is_valid_username(username: &str) -> bool {
    USERNAME.is_match(username)
}

fn validate_username(username: &str) -> AuthResult<()> {
    // ---
    if is_valid_username(username) {
        Ok(())
    } else {
        Err(AuthError::InvalidUsername)
    }
}

fn decode_base64(text: &str) -> Option<Vec<u8>> {
    // ---
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};

    URL_SAFE_NO_PAD
        .decode(text.trim_end_matches('='))
        .or_else(|_| STANDARD.decode(text))
        .ok()
}

/// The challenge value the browser signed, read from `response.clientDataJSON`.
pub fn client_challenge(response: &Value) -> AuthResult<String> {
    // ---
    let malformed = || AuthError::ChallengeInvalid(ChallengeRejection::Malformed);

    let encoded = response
        .pointer("/response/clientDataJSON")
        .and_then(Value::as_str)
        .ok_or_else(malformed)?;
    let client_data: Value = decode_base64(encoded)
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .ok_or_else(malformed)?;

    client_data
        .get("challenge")
        .and_then(Value::as_str)
        .map(|c| c.trim_end_matches('=').to_string())
        .ok_or_else(malformed)
}

/// The credential id the authenticator used, from `rawId` (or `id`).
pub fn asserted_credential_id(response: &Value) -> AuthResult<Vec<u8>> {
    // ---
    ["rawId", "id"]
        .iter()
        .filter_map(|field| response.get(*field).and_then(Value::as_str))
        .find_map(decode_base64)
        .ok_or_else(|| AuthError::AssertionInvalid("response carries no credential id".into()))
}

/// Start/finish for passkey registration and login.
pub struct PasskeyEngine {
    // ---
    repository: RepositoryPtr,
    challenges: ChallengeRegistryPtr,
    verifier: VerifierPtr,
    metrics: MetricsPtr,
    clock: ClockPtr,
    /// Answer unknown usernames at login start with ordinary options.
    conceal_unknown_users: bool,
}

impl PasskeyEngine {
    // ---
    pub fn new(
        repository: RepositoryPtr,
        challenges: ChallengeRegistryPtr,
        verifier: VerifierPtr,
        metrics: MetricsPtr,
        clock: ClockPtr,
        conceal_unknown_users: bool,
    ) -> Self {
        // ---
        Self {
            repository,
            challenges,
            verifier,
            metrics,
            clock,
            conceal_unknown_users,
        }
    }

    // ============================================================
    // Registration
    // ============================================================

    /// Begins registration of a new account named `username`.
    ///
    /// Returns the options for `navigator.credentials.create()`. The existence
    /// check here only spares the user a pointless ceremony; the atomic create
    /// at finish is what keeps usernames unique.
    #[tracing::instrument(skip(self))]
    pub async fn start_registration(&self, username: &str) -> AuthResult<Value> {
        // ---
        let mut ceremony = Ceremony::start(ChallengePurpose::Registration);
        validate_username(username)?;

        if self.repository.get_user_by_username(username).await?.is_some() {
            tracing::info!("Registration refused, username taken: {}", username);
            return Err(AuthError::UsernameTaken);
        }

        let user_handle = Uuid::new_v4();
        let prepared = self
            .verifier
            .start_registration(user_handle, username, &[])?;

        self.challenges
            .issue(ChallengeRequest {
                purpose: ChallengePurpose::Registration,
                username: Some(username.to_string()),
                user_handle: Some(user_handle),
                value: prepared.challenge,
                ceremony_state: prepared.state,
            })
            .await?;
        ceremony.advance(CeremonyEvent::ChallengeIssued);

        tracing::info!("Registration started for user: {}", username);
        Ok(prepared.options)
    }

    /// Completes registration: the user and their first credential are
    /// created together or not at all.
    #[tracing::instrument(skip(self, response))]
    pub async fn finish_registration(&self, username: &str, response: &Value) -> AuthResult<User> {
        // ---
        let mut ceremony = Ceremony::resume(ChallengePurpose::Registration);
        let result = self.complete_registration(&mut ceremony, username, response).await;
        self.conclude(&mut ceremony, &result);

        if let Ok(user) = &result {
            tracing::info!("Registration completed for user: {} ({})", user.username, user.id);
        }
        result
    }

    async fn complete_registration(
        &self,
        ceremony: &mut Ceremony,
        username: &str,
        response: &Value,
    ) -> AuthResult<User> {
        // ---
        validate_username(username)?;
        let challenge = self.take_challenge(ceremony, response).await?;

        if challenge.username.as_deref() != Some(username) {
            tracing::warn!("Registration challenge was issued for another username");
            return Err(AuthError::ChallengeInvalid(ChallengeRejection::BindingMismatch));
        }
        let user_handle = challenge.user_handle.ok_or_else(|| {
            AuthError::Internal(anyhow::anyhow!("registration challenge has no user handle"))
        })?;

        let verified = self
            .verifier
            .finish_registration(response, &challenge.ceremony_state)?;

        let now = self.clock.now();
        let user = User::with_id(user_handle, username.to_string(), now);
        let credential = Credential::new(
            verified.credential_id,
            user.id,
            verified.public_key,
            verified.sign_counter,
            now,
        );

        self.repository
            .create_user_with_credential(user, credential)
            .await
    }

    // ============================================================
    // Login
    // ============================================================

    /// Begins a login, scoped to `username` when one is given.
    ///
    /// Returns the options for `navigator.credentials.get()`.
    #[tracing::instrument(skip(self))]
    pub async fn start_login(&self, username: Option<&str>) -> AuthResult<Value> {
        // ---
        let mut ceremony = Ceremony::start(ChallengePurpose::Login);

        let allowed = match username {
            Some(name) => {
                validate_username(name)?;
                let credentials = self.repository.list_credentials_by_username(name).await?;
                if credentials.is_empty() {
                    if !self.conceal_unknown_users {
                        tracing::warn!("Login attempt for unknown user: {}", name);
                        return Err(AuthError::UnknownUser);
                    }
                    tracing::debug!("Unknown user at login start, answering with discoverable options");
                }
                credentials
            }
            None => Vec::new(),
        };

        let prepared = self.verifier.start_login(&allowed)?;

        self.challenges
            .issue(ChallengeRequest {
                purpose: ChallengePurpose::Login,
                username: username.map(str::to_string),
                user_handle: None,
                value: prepared.challenge,
                ceremony_state: prepared.state,
            })
            .await?;
        ceremony.advance(CeremonyEvent::ChallengeIssued);

        tracing::info!(
            "Login started ({} allowed credential(s))",
            allowed.len()
        );
        Ok(prepared.options)
    }

    /// Completes a login and returns the authenticated user.
    ///
    /// The counter presented by the authenticator must be strictly greater
    /// than the stored one, except on the credential's first use.
    #[tracing::instrument(skip(self, response))]
    pub async fn finish_login(&self, username: Option<&str>, response: &Value) -> AuthResult<User> {
        // ---
        let mut ceremony = Ceremony::resume(ChallengePurpose::Login);
        let result = self.complete_login(&mut ceremony, username, response).await;
        self.conclude(&mut ceremony, &result);

        if let Ok(user) = &result {
            tracing::info!("Login completed for user: {} ({})", user.username, user.id);
        }
        result
    }

    async fn complete_login(
        &self,
        ceremony: &mut Ceremony,
        username: Option<&str>,
        response: &Value,
    ) -> AuthResult<User> {
        // ---
        let challenge = self.take_challenge(ceremony, response).await?;

        let bound = match (challenge.username.as_deref(), username) {
            (Some(issued), Some(claimed)) if issued != claimed => {
                return Err(AuthError::ChallengeInvalid(ChallengeRejection::BindingMismatch));
            }
            (issued, claimed) => issued.or(claimed),
        };

        let credential_id = asserted_credential_id(response)?;
        let stored = self
            .repository
            .get_credential_by_id(&credential_id)
            .await?
            .ok_or(AuthError::CredentialUnknown)?;
        let user = self
            .repository
            .get_user_by_id(stored.user_id)
            .await?
            .ok_or(AuthError::CredentialUnknown)?;

        if let Some(expected) = bound {
            if user.username != expected {
                tracing::warn!(
                    "Credential {} does not belong to the login's user",
                    hex::encode(&stored.id)
                );
                return Err(AuthError::ChallengeInvalid(ChallengeRejection::BindingMismatch));
            }
        }

        let assertion = self
            .verifier
            .finish_login(response, &challenge.ceremony_state, &stored)
            .map_err(|e| self.flag_regression(&stored, e))?;

        if assertion.credential_id != stored.id {
            return Err(AuthError::AssertionInvalid(
                "assertion signed by another credential".into(),
            ));
        }

        if !stored.accepts_counter(assertion.sign_counter) {
            return Err(self.flag_regression(
                &stored,
                AuthError::CounterRegression {
                    stored: stored.sign_counter,
                    presented: assertion.sign_counter,
                },
            ));
        }

        // The conditional update settles races between concurrent logins
        // presenting the same counter.
        self.repository
            .update_sign_counter(
                &stored.id,
                assertion.sign_counter,
                &assertion.public_key,
                self.clock.now(),
            )
            .await
            .map_err(|e| self.flag_regression(&stored, e))?;

        Ok(user)
    }

    // ============================================================
    // Shared steps
    // ============================================================

    /// Consumes the challenge echoed in `response`, advancing `ceremony`.
    async fn take_challenge(
        &self,
        ceremony: &mut Ceremony,
        response: &Value,
    ) -> AuthResult<Challenge> {
        // ---
        let consumed = match client_challenge(response) {
            Ok(value) => self.challenges.consume(&value, ceremony.purpose()).await,
            Err(e) => Err(e),
        };

        match consumed {
            Ok(challenge) => {
                ceremony.advance(CeremonyEvent::ChallengeConsumed);
                Ok(challenge)
            }
            Err(AuthError::ChallengeInvalid(reason)) => {
                ceremony.advance(CeremonyEvent::ChallengeRejected(reason));
                tracing::warn!(
                    "{} challenge rejected: {}",
                    ceremony.purpose().as_str(),
                    reason
                );
                Err(AuthError::ChallengeInvalid(reason))
            }
            Err(e) => Err(e),
        }
    }

    /// Logs and counts a counter regression; other errors pass through.
    fn flag_regression(&self, stored: &Credential, err: AuthError) -> AuthError {
        // ---
        if let AuthError::CounterRegression { stored: s, presented } = &err {
            tracing::warn!(
                "Sign counter regression on credential {} (user {}): stored={}, presented={}; possible cloned authenticator",
                hex::encode(&stored.id),
                stored.user_id,
                s,
                presented
            );
            self.metrics.record_counter_regression();
        }
        err
    }

    fn conclude<T>(&self, ceremony: &mut Ceremony, result: &AuthResult<T>) {
        // ---
        let state = ceremony.settle(result.is_ok());
        let outcome = match result {
            Ok(_) => "completed",
            Err(e) => e.label(),
        };

        if let Err(e) = result {
            tracing::info!(
                "{} ceremony ended {:?}: {}",
                ceremony.purpose().as_str(),
                state,
                e
            );
        }
        self.metrics
            .record_ceremony(ceremony.purpose().as_str(), outcome);
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    fn client_data(challenge: &str) -> String {
        // ---
        let data = json!({ "type": "webauthn.get", "challenge": challenge, "origin": "https://example.com" });
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data.to_string())
    }

    #[test]
    fn username_shape() {
        // ---
        for good in ["alice", "bob.smith", "carol+test@example.com", "d_e-f", "x"] {
            assert!(is_valid_username(good), "{good}");
        }
        let too_long = "a".repeat(65);
        for bad in ["", "with space", "semi;colon", "tab\t", "ünïcode", too_long.as_str()] {
            assert!(!is_valid_username(bad), "{bad:?}");
        }
        assert!(is_valid_username(&"a".repeat(64)));
    }

    #[test]
    fn challenge_is_read_from_client_data() {
        // ---
        let response = json!({ "response": { "clientDataJSON": client_data("abc_-123") } });
        assert_eq!(client_challenge(&response).unwrap(), "abc_-123");
    }

    #[test]
    fn padded_standard_base64_client_data_is_accepted() {
        // ---
        let data = json!({ "type": "webauthn.get", "challenge": "xyz" }).to_string();
        let encoded = base64::engine::general_purpose::STANDARD.encode(data);
        let response = json!({ "response": { "clientDataJSON": encoded } });
        assert_eq!(client_challenge(&response).unwrap(), "xyz");
    }

    #[test]
    fn missing_or_garbled_client_data_is_malformed() {
        // ---
        for response in [
            json!({}),
            json!({ "response": { "clientDataJSON": "%%%" } }),
            json!({ "response": { "clientDataJSON": base64::engine::general_purpose::URL_SAFE_NO_PAD.encode("{}") } }),
        ] {
            assert!(matches!(
                client_challenge(&response),
                Err(AuthError::ChallengeInvalid(ChallengeRejection::Malformed))
            ));
        }
    }

    #[test]
    fn credential_id_prefers_raw_id() {
        // ---
        let response = json!({ "rawId": "AQID", "id": "BAUG" });
        assert_eq!(asserted_credential_id(&response).unwrap(), vec![1, 2, 3]);

        let response = json!({ "id": "BAUG" });
        assert_eq!(asserted_credential_id(&response).unwrap(), vec![4, 5, 6]);

        assert!(matches!(
            asserted_credential_id(&json!({})),
            Err(AuthError::AssertionInvalid(_))
        ));
    }
}
