//! HS256 session tokens and the `jwt` cookie
//!
//! Tokens carry only `{sub, iat, exp}`. They are handed to the client twice:
//! in the JSON body and as an HttpOnly cookie. Requests may present either;
//! the `Authorization: Bearer` header wins when both are present.

use std::sync::Arc;

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;
use crate::error::{Error, Result};

/// Name of the session cookie
pub const COOKIE_NAME: &str = "jwt";

/// Value written over the cookie on logout
pub const LOGGED_OUT: &str = "loggedout";

/// Claims in a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Signing and verification keys plus cookie settings
#[derive(Clone)]
pub struct JwtKeys {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    validation: Validation,
    expires_in: Duration,
    cookie_days: i64,
    secure_cookie: bool,
}

impl JwtKeys {
    /// Build keys from configuration; `secure_cookie` is set in production
    pub fn new(config: &JwtConfig, secure_cookie: bool) -> Result<Self> {
        if config.secret.trim().is_empty() {
            return Err(Error::Config(Box::new(figment::Error::from(
                "jwt.secret must not be empty".to_string(),
            ))));
        }
        if config.expires_in_secs <= 0 {
            return Err(Error::Config(Box::new(figment::Error::from(
                "jwt.expires_in_secs must be positive".to_string(),
            ))));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Ok(Self {
            encoding_key: Arc::new(EncodingKey::from_secret(config.secret.as_bytes())),
            decoding_key: Arc::new(DecodingKey::from_secret(config.secret.as_bytes())),
            validation,
            expires_in: Duration::seconds(config.expires_in_secs),
            cookie_days: config.cookie_expires_in_days,
            secure_cookie,
        })
    }

    /// Sign a token for `user_id` issued now
    pub fn sign(&self, user_id: &str) -> Result<String> {
        self.sign_at(user_id, Utc::now())
    }

    /// Sign a token for `user_id` issued at `issued_at`
    pub fn sign_at(&self, user_id: &str, issued_at: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.expires_in).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    /// Check signature and expiry
    pub fn verify(&self, token: &str) -> std::result::Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding_key, &self.validation).map(|data| data.claims)
    }

    /// `Set-Cookie` value carrying a fresh token
    pub fn session_cookie(&self, token: &str) -> String {
        self.cookie(token, Duration::days(self.cookie_days))
    }

    /// `Set-Cookie` value overwriting the token, expiring in ten seconds
    pub fn logout_cookie(&self) -> String {
        self.cookie(LOGGED_OUT, Duration::seconds(10))
    }

    fn cookie(&self, value: &str, lifetime: Duration) -> String {
        let expires = (Utc::now() + lifetime).format("%a, %d %b %Y %H:%M:%S GMT");
        let mut cookie = format!(
            "{COOKIE_NAME}={value}; Path=/; Expires={expires}; Max-Age={}; HttpOnly; SameSite=Lax",
            lifetime.num_seconds()
        );
        if self.secure_cookie {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Token from `Authorization: Bearer`, falling back to the `jwt` cookie
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| cookie_token(headers))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == COOKIE_NAME)
        .map(|(_, value)| value.to_string())
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn keys() -> JwtKeys {
        JwtKeys::new(
            &JwtConfig {
                secret: "test-secret-with-enough-entropy".to_string(),
                expires_in_secs: 3600,
                cookie_expires_in_days: 90,
            },
            false,
        )
        .unwrap()
    }

    #[test]
    fn test_sign_and_verify() {
        let keys = keys();
        let token = keys.sign("user_01h455vb4pex5vsknk084sn02q").unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, "user_01h455vb4pex5vsknk084sn02q");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = keys();
        let token = keys.sign_at("user_x", Utc::now() - Duration::hours(2)).unwrap();
        let err = keys.verify(&token).unwrap_err();
        assert!(matches!(
            err.kind(),
            jsonwebtoken::errors::ErrorKind::ExpiredSignature
        ));
    }

    #[test]
    fn test_other_secret_rejected() {
        let token = keys().sign("user_x").unwrap();
        let other = JwtKeys::new(
            &JwtConfig {
                secret: "another-secret".to_string(),
                expires_in_secs: 3600,
                cookie_expires_in_days: 90,
            },
            false,
        )
        .unwrap();
        assert!(other.verify(&token).is_err());
        assert!(other.verify("garbage").is_err());
    }

    #[test]
    fn test_empty_secret_is_config_error() {
        let config = JwtConfig {
            secret: " ".to_string(),
            expires_in_secs: 3600,
            cookie_expires_in_days: 90,
        };
        assert!(matches!(JwtKeys::new(&config, false), Err(Error::Config(_))));
    }

    #[test]
    fn test_cookies() {
        let cookie = keys().session_cookie("abc");
        assert!(cookie.starts_with("jwt=abc; Path=/;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(!cookie.contains("Secure"));

        let mut secure = keys();
        secure.secure_cookie = true;
        let logout = secure.logout_cookie();
        assert!(logout.starts_with("jwt=loggedout;"));
        assert!(logout.contains("Max-Age=10"));
        assert!(logout.ends_with("; Secure"));
    }

    #[test]
    fn test_extract_prefers_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; jwt=from-cookie"));
        assert_eq!(extract_token(&headers).as_deref(), Some("from-cookie"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(extract_token(&headers).as_deref(), Some("from-header"));

        assert_eq!(extract_token(&HeaderMap::new()), None);
    }
}
