//! Password hashing using Argon2id
//!
//! Hashing is deliberately expensive, so request handlers call the async
//! wrappers, which move the work onto tokio's blocking pool.
//!
//! # Example
//!
//! ```rust,ignore
//! use natours::auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::new(&config.password)?;
//! let hash = hasher.hash_async("pass1234".to_string()).await?;
//! assert!(hasher.verify_async("pass1234".to_string(), hash).await?);
//! ```

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as Argon2Hasher, PasswordVerifier,
        SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

use crate::config::PasswordConfig;
use crate::error::{Error, Result};

/// Password hasher using Argon2id
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    min_password_length: usize,
}

impl PasswordHasher {
    /// Create a hasher from configuration
    ///
    /// Fails when the Argon2 parameters are out of range.
    pub fn new(config: &PasswordConfig) -> Result<Self> {
        let params = Params::new(
            config.memory_cost_kib,
            config.time_cost,
            config.parallelism,
            None,
        )
        .map_err(|e| Error::Auth(format!("Invalid Argon2 parameters: {}", e)))?;

        Ok(Self {
            params,
            min_password_length: config.min_password_length,
        })
    }

    /// Message for a password shorter than the configured minimum
    pub fn check_length(&self, password: &str) -> std::result::Result<(), String> {
        if password.chars().count() < self.min_password_length {
            Err(format!(
                "Password must be at least {} characters",
                self.min_password_length
            ))
        } else {
            Ok(())
        }
    }

    /// Hash a password into a PHC string
    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());

        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Auth(format!("Failed to hash password: {}", e)))?;

        Ok(hash.to_string())
    }

    /// Verify a password against a PHC string in constant time
    ///
    /// Returns `Ok(false)` on mismatch and an error only for a malformed hash.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| Error::Auth(format!("Invalid password hash format: {}", e)))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::Auth(format!("Password verification failed: {}", e))),
        }
    }

    /// [`hash`](Self::hash) on the blocking pool
    pub async fn hash_async(&self, password: String) -> Result<String> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| Error::Internal(format!("password hashing task failed: {}", e)))?
    }

    /// [`verify`](Self::verify) on the blocking pool
    pub async fn verify_async(&self, password: String, hash: String) -> Result<bool> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| Error::Internal(format!("password verification task failed: {}", e)))?
    }

    /// Get the minimum password length requirement
    pub fn min_password_length(&self) -> usize {
        self.min_password_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> PasswordHasher {
        PasswordHasher::new(&PasswordConfig {
            memory_cost_kib: 1024,
            time_cost: 1,
            parallelism: 1,
            min_password_length: 8,
        })
        .unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = cheap();
        let hash = hasher.hash("test_password_123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("test_password_123", &hash).unwrap());
        assert!(!hasher.verify("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_check_length() {
        let hasher = cheap();
        assert_eq!(
            hasher.check_length("short").unwrap_err(),
            "Password must be at least 8 characters"
        );
        assert!(hasher.check_length("long enough").is_ok());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let config = PasswordConfig {
            memory_cost_kib: 1,
            ..PasswordConfig::default()
        };
        assert!(PasswordHasher::new(&config).is_err());
    }

    #[test]
    fn test_invalid_hash_format() {
        assert!(cheap().verify("password", "not_a_valid_hash").is_err());
    }

    #[tokio::test]
    async fn test_async_wrappers() {
        let hasher = cheap();
        let hash = hasher.hash_async("pass1234".to_string()).await.unwrap();
        assert!(hasher.verify_async("pass1234".to_string(), hash.clone()).await.unwrap());
        assert!(!hasher.verify_async("pass12345".to_string(), hash).await.unwrap());
    }
}
