use super::webauthn_models::Credential;
use crate::error::AuthResult;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Ceremony options produced by a verifier, plus what must be kept
/// server-side until the finish step.
#[derive(Debug, Clone)]
pub struct PreparedCeremony {
    /// JSON options for `navigator.credentials.create()` / `.get()`
    pub options: Value,
    /// Raw challenge bytes embedded in `options`
    pub challenge: Vec<u8>,
    /// Opaque verifier state
    pub state: Vec<u8>,
}

/// A credential whose attestation verified.
#[derive(Debug, Clone)]
pub struct VerifiedCredential {
    pub credential_id: Vec<u8>,
    pub public_key: Vec<u8>,
    pub sign_counter: u32,
}

/// An assertion whose signature verified.
#[derive(Debug, Clone)]
pub struct VerifiedAssertion {
    pub credential_id: Vec<u8>,
    pub sign_counter: u32,
    /// Key material to store back (may carry updated backend bookkeeping)
    pub public_key: Vec<u8>,
}

/// Cryptographic half of the WebAuthn protocol.
///
/// Challenge bookkeeping, counters and persistence stay in the protocol
/// engine; implementations only build options and check signatures.
pub trait PasskeyVerifier: Send + Sync {
    // ---
    /// Build creation options for a new credential.
    fn start_registration(
        &self,
        user_handle: Uuid,
        username: &str,
        exclude: &[Credential],
    ) -> AuthResult<PreparedCeremony>;

    /// Verify an attestation response. Failures are `AttestationInvalid`.
    fn finish_registration(&self, response: &Value, state: &[u8]) -> AuthResult<VerifiedCredential>;

    /// Build request options. An empty `allowed` slice means a discoverable
    /// (usernameless) ceremony.
    fn start_login(&self, allowed: &[Credential]) -> AuthResult<PreparedCeremony>;

    /// Verify an assertion against the stored credential. Failures are
    /// `AssertionInvalid` (or `CounterRegression` when the backend detects it).
    fn finish_login(
        &self,
        response: &Value,
        state: &[u8],
        stored: &Credential,
    ) -> AuthResult<VerifiedAssertion>;
}

pub type VerifierPtr = Arc<dyn PasskeyVerifier>;
