/// Verification invite tokens
///
/// An invite token is 32 random bytes, hex-encoded into a 64 character
/// string that is handed to the verifier exactly once. Only its SHA-256 hex
/// digest is stored, so a leaked database does not leak usable links.
///
/// # Example
///
/// ```
/// use repute_shared::auth::invite_token::{generate_invite_token, hash_invite_token, is_well_formed};
///
/// let (token, hash) = generate_invite_token();
/// assert_eq!(token.len(), 64);
/// assert!(is_well_formed(&token));
/// assert_eq!(hash_invite_token(&token), hash);
/// ```

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of random bytes in a token
const TOKEN_BYTES: usize = 32;

/// Length of the hex-encoded token
pub const INVITE_TOKEN_LENGTH: usize = TOKEN_BYTES * 2;

/// Generates a new invite token
///
/// # Returns
///
/// Tuple of (plaintext_token, sha256_hex)
pub fn generate_invite_token() -> (String, String) {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);

    let token = hex::encode(bytes);
    let hash = hash_invite_token(&token);

    (token, hash)
}

/// Hashes a plaintext token with SHA-256 into lowercase hex
pub fn hash_invite_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.trim().as_bytes());
    hex::encode(hasher.finalize())
}

/// Checks that a token has the shape produced by [`generate_invite_token`]
///
/// Callers use this to reject garbage before touching the database.
pub fn is_well_formed(token: &str) -> bool {
    token.len() == INVITE_TOKEN_LENGTH && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Verifies a plaintext token against a stored hash in constant time
pub fn verify_invite_token(token: &str, stored_hash: &str) -> bool {
    constant_time_compare(&hash_invite_token(token), stored_hash)
}

/// Compares two strings without short-circuiting on the first difference
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
