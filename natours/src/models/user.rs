//! User accounts and roles

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::repository::{FilterCondition, Model, ValidationErrors};

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid")
});

/// Prefix shared by every stored password hash
pub const PASSWORD_HASH_PREFIX: &str = "$argon2";

/// Account role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Regular customer, the only role signup grants
    #[default]
    User,
    /// Leads tours, may not review them
    Guide,
    /// Manages tours alongside admins
    LeadGuide,
    /// Full access
    Admin,
}

impl Role {
    /// Wire name
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Guide => "guide",
            Self::LeadGuide => "lead-guide",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "guide" => Ok(Self::Guide),
            "lead-guide" => Ok(Self::LeadGuide),
            "admin" => Ok(Self::Admin),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

fn default_photo() -> String {
    "default.jpg".to_string()
}

fn default_active() -> bool {
    true
}

/// A registered user
///
/// `password` always holds an argon2 PHC string; plaintext never reaches the
/// repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub name: String,
    pub email: String,
    #[serde(default = "default_photo")]
    pub photo: String,
    #[serde(default)]
    pub role: Role,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_changed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_expires: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl Model for User {
    const ENTITY: &'static str = "User";
    const ID_PREFIX: &'static str = "user";
    const REQUIRED: &'static [(&'static str, &'static str)] = &[
        ("name", "Please tell us your name!"),
        ("email", "Please provide your email"),
        ("password", "Please provide a password"),
    ];
    const UNIQUE: &'static [&'static str] = &["email"];
    const HIDDEN: &'static [&'static str] = &[
        "password",
        "passwordResetToken",
        "passwordResetExpires",
        "active",
    ];
    const FILTERABLE: Option<&'static [&'static str]> =
        Some(&["name", "email", "role", "photo", "createdAt"]);

    fn validate(&self, errors: &mut ValidationErrors) {
        if !EMAIL_REGEX.is_match(self.email.trim()) {
            errors.push("Please provide a valid email");
        }
        if !self.password.starts_with(PASSWORD_HASH_PREFIX) {
            errors.push("Passwords can only be changed through /updatePassword or /resetPassword");
        }
    }

    fn before_save(&mut self, _is_new: bool) {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
    }

    fn default_filters() -> Vec<FilterCondition> {
        vec![FilterCondition::ne("active", false)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{Document, ModelSchema, Schema};
    use serde_json::{json, Value};

    fn user(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::to_value(Role::LeadGuide).unwrap(), json!("lead-guide"));
        assert_eq!("lead-guide".parse::<Role>().unwrap(), Role::LeadGuide);
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::Admin.to_string(), "admin");
    }

    #[test]
    fn test_defaults_and_normalization() {
        let saved = ModelSchema::<User>::new()
            .validate(
                user(json!({
                    "name": " Leo ",
                    "email": "Leo@Example.COM ",
                    "password": "$argon2id$v=19$x",
                })),
                true,
            )
            .unwrap();
        assert_eq!(saved["email"], json!("leo@example.com"));
        assert_eq!(saved["role"], json!("user"));
        assert_eq!(saved["photo"], json!("default.jpg"));
        assert_eq!(saved["active"], json!(true));
    }

    #[test]
    fn test_invalid_email_and_plain_password() {
        let err = ModelSchema::<User>::new()
            .validate(user(json!({"name": "Leo", "email": "nope", "password": "pass1234"})), true)
            .unwrap_err();
        assert_eq!(err.messages().len(), 2);
        assert!(err.to_string().contains("Please provide a valid email"));
    }

    #[test]
    fn test_unknown_role_rejected() {
        let err = ModelSchema::<User>::new()
            .validate(
                user(json!({
                    "name": "Leo",
                    "email": "leo@example.com",
                    "password": "$argon2id$",
                    "role": "root",
                })),
                true,
            )
            .unwrap_err();
        assert!(err.to_string().contains("unknown variant"));
    }
}
