//! Password reset tokens
//!
//! The raw token is 32 random bytes, hex encoded, and only ever leaves the
//! server inside the reset email. The user document stores its SHA-256
//! digest and an expiry.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// How long a reset token stays valid
pub const RESET_TOKEN_TTL_MINUTES: i64 = 10;

/// A freshly issued reset token
#[derive(Debug, Clone)]
pub struct ResetToken {
    /// Hex token sent to the user
    pub raw: String,
    /// Hex SHA-256 of `raw`, stored on the user
    pub digest: String,
    /// Instant after which the token is refused
    pub expires_at: DateTime<Utc>,
}

impl ResetToken {
    /// New random token expiring ten minutes from now
    pub fn issue() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        let raw = to_hex(&bytes);
        Self {
            digest: digest(&raw),
            raw,
            expires_at: Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
        }
    }
}

/// Hex SHA-256 of a raw token
pub fn digest(raw: &str) -> String {
    to_hex(&Sha256::digest(raw.as_bytes()))
}

/// Whether `presented` hashes to `stored_digest`, compared in constant time
pub fn matches(stored_digest: &str, presented: &str) -> bool {
    let presented = digest(presented);
    stored_digest.as_bytes().ct_eq(presented.as_bytes()).into()
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_shapes() {
        let token = ResetToken::issue();
        assert_eq!(token.raw.len(), 64);
        assert_eq!(token.digest.len(), 64);
        assert_ne!(token.raw, token.digest);
        assert!(token.expires_at > Utc::now() + Duration::minutes(9));
    }

    #[test]
    fn test_tokens_are_random() {
        assert_ne!(ResetToken::issue().raw, ResetToken::issue().raw);
    }

    #[test]
    fn test_matches_only_own_digest() {
        let token = ResetToken::issue();
        assert!(matches(&token.digest, &token.raw));
        assert!(!matches(&token.digest, &ResetToken::issue().raw));
        assert!(!matches(&token.digest, &token.digest));
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
