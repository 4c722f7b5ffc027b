//! Password hashing and credential-token generation.
//!
//! Uses Argon2id for password and OTP hashing; raw secrets are never stored.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Hash a password using Argon2id.
///
/// Returns the PHC-formatted hash string suitable for storage.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password (or OTP code) against a stored hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a secure random password-reset token.
///
/// Returns a URL-safe base64-encoded string.
pub fn generate_reset_token() -> String {
    use base64::Engine;
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes).expect("Failed to generate random bytes");
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a 6-digit phone OTP code.
pub fn generate_otp_code() -> String {
    let mut bytes = [0u8; 4];
    getrandom::fill(&mut bytes).expect("Failed to generate random bytes");
    let value = u32::from_le_bytes(bytes) % 1_000_000;
    format!("{value:06}")
}

/// Generate a throwaway password for freshly registered accounts. It is
/// never communicated anywhere; the user completes setup through the
/// password-reset flow.
pub fn generate_throwaway_password() -> String {
    generate_reset_token()
}
