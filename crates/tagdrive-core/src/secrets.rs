//! Password hashing and random token generation.

use rand::distr::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of session tokens handed out on login.
pub const AUTH_TOKEN_LEN: usize = 30;
/// Length of share-link tokens.
pub const SHARE_TOKEN_LEN: usize = 20;

const PASSWORD_HASH_ROUNDS: usize = 11;

/// SHA-256 applied 11 times, hex-encoding the digest between rounds.
///
/// Clients submit the password already transformed this way, so the server only ever stores
/// and compares the final hex string.
pub fn hash_password(password: &str) -> String {
    let mut digest = Sha256::digest(password.as_bytes());
    for _ in 1..PASSWORD_HASH_ROUNDS {
        digest = Sha256::digest(hex::encode(digest).as_bytes());
    }
    hex::encode(digest)
}

/// Random string over `[0-9a-zA-Z]`.
pub fn generate_token(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_is_eleven_rounds() {
        let mut expected = Sha256::digest(b"qwerty");
        for _ in 0..10 {
            expected = Sha256::digest(hex::encode(expected).as_bytes());
        }
        assert_eq!(hash_password("qwerty"), hex::encode(expected));
        assert_eq!(hash_password("qwerty").len(), 64);
        assert_ne!(hash_password("qwerty"), hash_password("qwertz"));
    }

    #[test]
    fn test_generate_token() {
        let token = generate_token(AUTH_TOKEN_LEN);
        assert_eq!(token.len(), AUTH_TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(generate_token(SHARE_TOKEN_LEN), generate_token(SHARE_TOKEN_LEN));
    }
}
