use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum entropy of a challenge value, in bytes.
pub const MIN_CHALLENGE_BYTES: usize = 16;

/// Represents a user in the WebAuthn system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    // ---
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    // ---
    /// Builds a user with a pre-allocated id (the WebAuthn user handle handed
    /// out when registration started).
    pub fn with_id(id: Uuid, username: String, created_at: DateTime<Utc>) -> Self {
        // ---
        Self {
            id,
            username,
            created_at,
        }
    }
}

/// Represents a WebAuthn credential (passkey) for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    // ---
    /// Unique credential ID (from authenticator)
    pub id: Vec<u8>,

    /// User this credential belongs to
    pub user_id: Uuid,

    /// Verification key material, as serialized by the verifier backend
    pub public_key: Vec<u8>,

    /// Authenticator signature counter (clone detection)
    pub sign_counter: u32,

    /// When this credential was created
    pub created_at: DateTime<Utc>,

    /// Last successful login with this credential; `None` until first use
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Credential {
    // ---
    pub fn new(
        id: Vec<u8>,
        user_id: Uuid,
        public_key: Vec<u8>,
        sign_counter: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        // ---
        Self {
            id,
            user_id,
            public_key,
            sign_counter,
            created_at,
            last_used_at: None,
        }
    }

    /// Whether `presented` is an acceptable next counter value.
    ///
    /// The counter must strictly increase, except on the very first login
    /// where the value recorded at registration may be presented again.
    ///
    /// Authenticators that never advance their counter (synced passkeys such
    /// as iCloud Keychain or Google Password Manager always report 0) can
    /// therefore sign in once; every later login is a `CounterRegression`.
    pub fn accepts_counter(&self, presented: u32) -> bool {
        // ---
        match self.last_used_at {
            None => presented >= self.sign_counter,
            Some(_) => presented > self.sign_counter,
        }
    }
}

/// The ceremony a challenge was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengePurpose {
    Registration,
    Login,
}

impl ChallengePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Login => "login",
        }
    }
}

/// What a caller asks the challenge registry to record.
#[derive(Debug, Clone)]
pub struct ChallengeRequest {
    // ---
    pub purpose: ChallengePurpose,
    pub username: Option<String>,
    /// User handle allocated for a registration ceremony
    pub user_handle: Option<Uuid>,
    /// Raw challenge bytes embedded in the ceremony options
    pub value: Vec<u8>,
    /// Opaque verifier state needed to finish the ceremony
    pub ceremony_state: Vec<u8>,
}

/// An issued, not yet consumed, single-use challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    // ---
    /// base64url (no padding) form of the challenge bytes, as echoed back in
    /// the browser's `clientDataJSON`
    pub value: String,
    pub purpose: ChallengePurpose,
    pub username: Option<String>,
    pub user_handle: Option<Uuid>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub ceremony_state: Vec<u8>,
}

impl Challenge {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
