//! Cryptographically secure randomness from the operating system.

use crate::error::{AuthError, AuthResult};
use base64::Engine;
use ring::rand::{SecureRandom, SystemRandom};

/// Generate a fixed-size random byte array.
///
/// # Errors
/// Returns `AuthError::Internal` if the system RNG fails.
pub fn random_bytes<const N: usize>() -> AuthResult<[u8; N]> {
    // ---
    let mut buf = [0u8; N];
    SystemRandom::new()
        .fill(&mut buf)
        .map_err(|_| AuthError::Internal(anyhow::anyhow!("system random source failed")))?;
    Ok(buf)
}

/// 256-bit random token in base64url without padding.
pub fn random_token() -> AuthResult<String> {
    // ---
    let bytes = random_bytes::<32>()?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}
