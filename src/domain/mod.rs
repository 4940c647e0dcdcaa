mod challenge_registry;
mod clock;
mod metrics;
mod repository;
mod session_storage;
mod verifier;
mod webauthn_models;

// Publicly expose the Metrics abstraction
pub use metrics::{Metrics, MetricsPtr};

// Publicly expose WebAuthn abstractions
pub use challenge_registry::{ChallengeRegistry, ChallengeRegistryPtr};
pub use repository::{Repository, RepositoryPtr};
pub use verifier::{PasskeyVerifier, PreparedCeremony, VerifiedAssertion, VerifiedCredential, VerifierPtr};
pub use webauthn_models::{
    Challenge, ChallengePurpose, ChallengeRequest, Credential, User, MIN_CHALLENGE_BYTES,
};

// Session and environment bindings
pub use clock::{Clock, ClockPtr, SystemClock};
pub use session_storage::{Session, SessionStorage, SessionStoragePtr};
