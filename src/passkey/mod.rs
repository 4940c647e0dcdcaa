//! WebAuthn passkey protocol: ceremony lifecycle and the engine driving it.

mod ceremony;
mod engine;

pub use ceremony::{Ceremony, CeremonyEvent, CeremonyState};
pub use engine::{asserted_credential_id, client_challenge, is_valid_username, PasskeyEngine};
