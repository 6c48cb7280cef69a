//! Opaque one-time tokens and token digests.
//!
//! Password-reset and email-verification links carry a random token. The
//! plaintext goes to the user; only its SHA-256 digest is persisted, as with
//! session JWTs.

use chrono::Duration;
use gatehouse_core::hashing::sha256_hex;
use rand::Rng;

/// Lifetime of a password-reset token.
pub const RESET_TOKEN_TTL: Duration = Duration::hours(1);

/// Lifetime of an email-verification token.
pub const VERIFICATION_TOKEN_TTL: Duration = Duration::hours(24);

/// Byte length of an opaque token before hex encoding.
const OPAQUE_TOKEN_BYTES: usize = 32;

/// Compute the SHA-256 hex digest of a token.
///
/// Used for JWTs and opaque tokens alike; compare incoming tokens against
/// the stored digest with this.
pub fn hash_token(token: &str) -> String {
    sha256_hex(token.as_bytes())
}

/// Generate a random opaque token.
///
/// Returns `(plaintext, sha256_hex_hash)`.
pub fn generate_opaque_token() -> (String, String) {
    let mut bytes = [0u8; OPAQUE_TOKEN_BYTES];
    rand::rng().fill(&mut bytes);
    let plaintext: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    let hash = hash_token(&plaintext);
    (plaintext, hash)
}
