//! Authentication and account management
//!
//! - [`password`]: Argon2id hashing off the async runtime
//! - [`token`]: signed session tokens and the `jwt` cookie
//! - [`guard`]: the staged [`require_auth`] middleware and [`restrict_to`]
//! - [`reset`]: single-use password reset tokens
//! - [`email`]: welcome and reset messages behind the [`Mailer`] seam
//! - [`accounts`]: signup, login and the `/users` self-service routes
//!
//! # Example
//!
//! ```rust,ignore
//! use axum::{middleware, routing::delete, Router};
//! use natours::auth::{require_auth, restrict_to, RoleGuard};
//! use natours::models::Role;
//!
//! const ADMINS: RoleGuard = RoleGuard::new(&[Role::Admin, Role::LeadGuide]);
//!
//! let route = delete(delete_tour)
//!     .layer(middleware::from_fn_with_state(ADMINS, restrict_to))
//!     .layer(middleware::from_fn_with_state(state.authenticator().clone(), require_auth));
//! ```

pub mod accounts;
pub mod email;
pub mod guard;
pub mod password;
pub mod reset;
pub mod token;

pub use email::{EmailTemplate, Mailer, MemoryMailbox, OutgoingEmail, SmtpMailer};
pub use guard::{
    changed_password_after, require_auth, restrict_to, Authenticator, GuardStage, Principal,
    RoleGuard, NOT_LOGGED_IN, NO_PERMISSION,
};
pub use password::PasswordHasher;
pub use reset::{ResetToken, RESET_TOKEN_TTL_MINUTES};
pub use token::{extract_token, Claims, JwtKeys, COOKIE_NAME, LOGGED_OUT};
