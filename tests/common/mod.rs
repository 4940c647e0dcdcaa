// Test helpers are intentionally partially used
#![allow(dead_code)]

use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use passkey_sessions::domain::{
    Clock, ClockPtr, Credential, PasskeyVerifier, PreparedCeremony, VerifiedAssertion,
    VerifiedCredential,
};
use passkey_sessions::{
    build_router, build_state, AppConfig, AppState, AuthError, AuthResult, SessionConfig,
    StorageBackend, WebAuthnConfig,
};
use reqwest::Client;
use ring::hmac;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use uuid::Uuid;

pub const CHALLENGE_TTL_SECS: u64 = 300;
pub const SESSION_TTL_SECS: u64 = 3600;
pub const LOGIN_PATH: &str = "/user/login";

// ============================================================================
// Clock
// ============================================================================

/// Clock that only moves when told to.
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    // ---
    pub fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(Utc::now())))
    }

    pub fn advance(&self, by: Duration) {
        // ---
        let mut now = self.0.lock();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock()
    }
}

// ============================================================================
// Deterministic verifier
// ============================================================================

fn b64(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

fn unb64(text: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(text).ok()
}

fn field<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

/// Checks `clientDataJSON` against the ceremony state; returns its raw bytes.
fn client_data(response: &Value, state: &[u8], kind: &str) -> Result<Vec<u8>, String> {
    // ---
    let expected: Value = serde_json::from_slice(state).map_err(|e| e.to_string())?;
    let raw = field(response, "/response/clientDataJSON")
        .and_then(unb64)
        .ok_or("no clientDataJSON")?;
    let data: Value = serde_json::from_slice(&raw).map_err(|e| e.to_string())?;

    if data["type"] != kind {
        return Err(format!("wrong client data type {}", data["type"]));
    }
    if data["challenge"] != expected["challenge"] {
        return Err("challenge does not match ceremony state".into());
    }
    Ok(raw)
}

/// Stand-in for webauthn-rs: the credential "public key" is an HMAC key and
/// an assertion is an HMAC over client data and the counter.
pub struct FakeVerifier;

impl FakeVerifier {
    // ---
    fn prepare(options: Value, challenge: [u8; 32]) -> PreparedCeremony {
        // ---
        PreparedCeremony {
            options,
            challenge: challenge.to_vec(),
            state: json!({ "challenge": b64(challenge) }).to_string().into_bytes(),
        }
    }
}

impl PasskeyVerifier for FakeVerifier {
    // ---
    fn start_registration(
        &self,
        user_handle: Uuid,
        username: &str,
        exclude: &[Credential],
    ) -> AuthResult<PreparedCeremony> {
        // ---
        let challenge: [u8; 32] = rand::random();
        let options = json!({
            "publicKey": {
                "challenge": b64(challenge),
                "rp": { "id": "localhost", "name": "Test App" },
                "user": { "id": b64(user_handle.as_bytes()), "name": username, "displayName": username },
                "pubKeyCredParams": [{ "type": "public-key", "alg": -7 }],
                "excludeCredentials": exclude.iter().map(|c| json!({ "type": "public-key", "id": b64(&c.id) })).collect::<Vec<_>>(),
                "authenticatorSelection": {
                    "residentKey": "required",
                    "requireResidentKey": true,
                    "userVerification": "required"
                }
            }
        });
        Ok(Self::prepare(options, challenge))
    }

    fn finish_registration(&self, response: &Value, state: &[u8]) -> AuthResult<VerifiedCredential> {
        // ---
        client_data(response, state, "webauthn.create").map_err(AuthError::AttestationInvalid)?;

        let credential_id = field(response, "/rawId")
            .and_then(unb64)
            .ok_or_else(|| AuthError::AttestationInvalid("no rawId".into()))?;
        let public_key = field(response, "/response/attestationObject")
            .and_then(unb64)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AuthError::AttestationInvalid("no key".into()))?;

        Ok(VerifiedCredential {
            credential_id,
            public_key,
            sign_counter: 0,
        })
    }

    fn start_login(&self, allowed: &[Credential]) -> AuthResult<PreparedCeremony> {
        // ---
        let challenge: [u8; 32] = rand::random();
        let options = json!({
            "publicKey": {
                "challenge": b64(challenge),
                "allowCredentials": allowed.iter().map(|c| json!({ "type": "public-key", "id": b64(&c.id) })).collect::<Vec<_>>(),
                "userVerification": "required"
            }
        });
        Ok(Self::prepare(options, challenge))
    }

    fn finish_login(
        &self,
        response: &Value,
        state: &[u8],
        stored: &Credential,
    ) -> AuthResult<VerifiedAssertion> {
        // ---
        let raw = client_data(response, state, "webauthn.get").map_err(AuthError::AssertionInvalid)?;

        let auth_data = field(response, "/response/authenticatorData")
            .and_then(unb64)
            .filter(|d| d.len() == 4)
            .ok_or_else(|| AuthError::AssertionInvalid("bad authenticator data".into()))?;
        let signature = field(response, "/response/signature")
            .and_then(unb64)
            .ok_or_else(|| AuthError::AssertionInvalid("no signature".into()))?;

        let key = hmac::Key::new(hmac::HMAC_SHA256, &stored.public_key);
        let signed = [raw.as_slice(), auth_data.as_slice()].concat();
        hmac::verify(&key, &signed, &signature)
            .map_err(|_| AuthError::AssertionInvalid("bad signature".into()))?;

        let credential_id = field(response, "/rawId").and_then(unb64).unwrap_or_default();
        let counter = u32::from_be_bytes([auth_data[0], auth_data[1], auth_data[2], auth_data[3]]);

        Ok(VerifiedAssertion {
            credential_id,
            sign_counter: counter,
            public_key: stored.public_key.clone(),
        })
    }
}

// ============================================================================
// Fake authenticator
// ============================================================================

/// A software passkey that answers [`FakeVerifier`] ceremonies.
#[derive(Clone)]
pub struct FakeAuthenticator {
    pub credential_id: Vec<u8>,
    key: Vec<u8>,
    pub counter: u32,
}

fn options_challenge(options: &Value) -> String {
    field(options, "/publicKey/challenge")
        .expect("options carry a challenge")
        .to_string()
}

fn encoded_client_data(kind: &str, challenge: &str) -> (String, Vec<u8>) {
    // ---
    let raw = json!({ "type": kind, "challenge": challenge, "origin": "http://localhost:8080" })
        .to_string()
        .into_bytes();
    (b64(&raw), raw)
}

impl FakeAuthenticator {
    // ---
    pub fn new() -> Self {
        // ---
        Self {
            credential_id: rand::random::<[u8; 16]>().to_vec(),
            key: rand::random::<[u8; 32]>().to_vec(),
            counter: 0,
        }
    }

    /// Response to `navigator.credentials.create()`.
    pub fn attest(&self, options: &Value) -> Value {
        // ---
        let (client_data, _) = encoded_client_data("webauthn.create", &options_challenge(options));
        json!({
            "id": b64(&self.credential_id),
            "rawId": b64(&self.credential_id),
            "type": "public-key",
            "response": {
                "clientDataJSON": client_data,
                "attestationObject": b64(&self.key)
            }
        })
    }

    /// Response to `navigator.credentials.get()`, bumping the counter.
    pub fn assert(&mut self, options: &Value) -> Value {
        // ---
        self.counter += 1;
        self.assert_with_counter(options, self.counter)
    }

    /// Response to `navigator.credentials.get()` reporting `counter`.
    pub fn assert_with_counter(&self, options: &Value, counter: u32) -> Value {
        // ---
        self.sign(options, counter, &self.key)
    }

    /// An assertion signed with the wrong key.
    pub fn forge(&self, options: &Value) -> Value {
        // ---
        self.sign(options, self.counter + 1, b"not the registered key at all!!!")
    }

    fn sign(&self, options: &Value, counter: u32, key: &[u8]) -> Value {
        // ---
        let (client_data, raw) = encoded_client_data("webauthn.get", &options_challenge(options));
        let auth_data = counter.to_be_bytes();
        let key = hmac::Key::new(hmac::HMAC_SHA256, key);
        let signature = hmac::sign(&key, &[raw.as_slice(), auth_data.as_slice()].concat());

        json!({
            "id": b64(&self.credential_id),
            "rawId": b64(&self.credential_id),
            "type": "public-key",
            "response": {
                "clientDataJSON": client_data,
                "authenticatorData": b64(auth_data),
                "signature": b64(signature.as_ref()),
                "userHandle": null
            }
        })
    }
}

// ============================================================================
// Test Setup
// ============================================================================

pub const SECRET: &[u8] = b"integration-test-secret-0123456789abcdef";

/// In-memory configuration with test-friendly cookie settings.
pub fn memory_config(conceal_unknown_users: bool, metrics_type: &str) -> AppConfig {
    // ---
    AppConfig {
        storage: StorageBackend::Memory,
        database: None,
        redis: None,
        webauthn: WebAuthnConfig {
            rp_id: "localhost".to_string(),
            rp_name: "Test App".to_string(),
            origin: "http://localhost:8080".to_string(),
            challenge_ttl: Duration::from_secs(CHALLENGE_TTL_SECS),
            conceal_unknown_users,
        },
        session: SessionConfig {
            secret: SECRET.to_vec(),
            cookie_name: "session_id".to_string(),
            ttl: Duration::from_secs(SESSION_TTL_SECS),
            cookie_secure: false,
            login_path: LOGIN_PATH.to_string(),
            actor_sweep_interval: Duration::from_secs(60),
        },
        metrics_type: metrics_type.to_string(),
    }
}

/// An assembled service on in-memory storage, a manual clock and the
/// deterministic verifier.
pub struct TestApp {
    pub state: AppState,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    // ---
    pub async fn new() -> Self {
        Self::with_config(memory_config(true, "noop")).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        // ---
        let clock = ManualClock::new();
        let clock_ptr: ClockPtr = clock.clone();
        let state = build_state(&config, Arc::new(FakeVerifier), clock_ptr)
            .await
            .expect("state should build");

        Self { state, clock }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Registers `username` with a fresh authenticator.
    pub async fn register(&self, username: &str) -> FakeAuthenticator {
        // ---
        let engine = self.state.engine();
        let authenticator = FakeAuthenticator::new();
        let options = engine
            .start_registration(username)
            .await
            .expect("registration start");
        engine
            .finish_registration(username, &authenticator.attest(&options))
            .await
            .expect("registration finish");
        authenticator
    }
}

/// A live HTTP server for the router, with a client that does not follow
/// redirects.
pub struct TestServer {
    pub addr: std::net::SocketAddr,
    pub client: Client,
    pub app: TestApp,
}

impl TestServer {
    // ---
    pub async fn new() -> Self {
        Self::with_app(TestApp::new().await).await
    }

    pub async fn with_app(app: TestApp) -> Self {
        // ---
        let router = app.router();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Spawn the server in the background
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        Self { addr, client, app }
    }

    pub fn url(&self, path: &str) -> String {
        // ---
        format!("http://{}{}", self.addr, path)
    }
}

/// The `name=value` pair from a `Set-Cookie` header, ready for a `Cookie` header.
pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap_or_default().trim().to_string()
}
