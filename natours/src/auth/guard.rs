//! Staged request authentication and role restriction
//!
//! [`require_auth`] walks a request through the guard stages:
//!
//! ```text
//! Unauthenticated → TokenExtracted → TokenVerified → UserLoaded
//!     → PasswordFreshnessChecked → Authorized
//! ```
//!
//! Any stage that fails short-circuits with 401 and a message specific to the
//! stage. On success the [`Principal`] is placed in the request extensions,
//! where handlers extract it and [`restrict_to`] checks its role.

use std::fmt;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use serde_json::Value;

use super::token::{extract_token, JwtKeys};
use crate::handlers::ApiError;
use crate::models::Role;
use crate::repository::{
    parse_datetime, present, Document, MemoryRepository, Repository, RepositoryErrorKind,
};

/// Message for requests without a usable token
pub const NOT_LOGGED_IN: &str = "You are not logged in! Please log in to get access.";

/// Message for a role outside the allowed set
pub const NO_PERMISSION: &str = "You do not have permission to perform this action";

/// How far a request has progressed through authentication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardStage {
    /// Nothing checked yet
    Unauthenticated,
    /// A bearer header or `jwt` cookie supplied a token
    TokenExtracted,
    /// Signature and expiry are valid
    TokenVerified,
    /// The token's subject is an active user
    UserLoaded,
    /// The token was issued after the last password change
    PasswordFreshnessChecked,
    /// The caller is attached to the request as a [`Principal`]
    Authorized,
}

impl fmt::Display for GuardStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::TokenExtracted => "token_extracted",
            Self::TokenVerified => "token_verified",
            Self::UserLoaded => "user_loaded",
            Self::PasswordFreshnessChecked => "password_freshness_checked",
            Self::Authorized => "authorized",
        };
        f.write_str(name)
    }
}

/// The authenticated caller
#[derive(Debug, Clone)]
pub struct Principal {
    /// User id
    pub id: String,
    /// User role
    pub role: Role,
    /// Client-safe user document
    pub document: Document,
}

impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized(NOT_LOGGED_IN))
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<Principal>().cloned())
    }
}

/// Verifies tokens and loads their users
#[derive(Clone)]
pub struct Authenticator {
    keys: JwtKeys,
    users: MemoryRepository,
}

impl Authenticator {
    /// Guard over the given keys and user collection
    pub fn new(keys: JwtKeys, users: MemoryRepository) -> Self {
        Self { keys, users }
    }

    /// Token keys
    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    fn reject(stage: GuardStage, message: &'static str) -> ApiError {
        tracing::debug!(stage = %stage, reason = message, "authentication rejected");
        ApiError::unauthorized(message)
    }

    /// Run every stage against the request headers
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, ApiError> {
        let token = extract_token(headers)
            .ok_or_else(|| Self::reject(GuardStage::Unauthenticated, NOT_LOGGED_IN))?;

        let claims = self.keys.verify(&token).map_err(|e| match e.kind() {
            JwtErrorKind::ExpiredSignature => Self::reject(
                GuardStage::TokenExtracted,
                "Your token has expired! Please log in again.",
            ),
            _ => Self::reject(GuardStage::TokenExtracted, "Invalid token. Please log in again!"),
        })?;

        let user = match self.users.find_by_id(&claims.sub).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(user_gone(GuardStage::TokenVerified)),
            Err(e) if e.kind == RepositoryErrorKind::InvalidId => {
                return Err(user_gone(GuardStage::TokenVerified))
            }
            Err(e) => return Err(e.into()),
        };

        if changed_password_after(&user, claims.iat) {
            return Err(Self::reject(
                GuardStage::UserLoaded,
                "User recently changed password! Please log in again.",
            ));
        }

        let role = user
            .get("role")
            .cloned()
            .and_then(|role| serde_json::from_value::<Role>(role).ok())
            .unwrap_or_default();

        tracing::debug!(
            stage = %GuardStage::Authorized,
            user = %claims.sub,
            role = %role,
            "request authenticated"
        );
        Ok(Principal {
            id: claims.sub,
            role,
            document: present(self.users.schema(), user),
        })
    }
}

fn user_gone(stage: GuardStage) -> ApiError {
    Authenticator::reject(stage, "The user belonging to this token does no longer exist.")
}

/// Whether the password changed after a token issued at `issued_at`
pub fn changed_password_after(user: &Document, issued_at: i64) -> bool {
    user.get("passwordChangedAt")
        .and_then(Value::as_str)
        .and_then(parse_datetime)
        .is_some_and(|changed| changed.timestamp() > issued_at)
}

/// Middleware rejecting requests without a valid session
pub async fn require_auth(
    State(auth): State<Authenticator>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = auth.authenticate(request.headers()).await?;
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

/// Allowed roles for a route
#[derive(Debug, Clone, Copy)]
pub struct RoleGuard {
    roles: &'static [Role],
}

impl RoleGuard {
    /// Guard allowing only `roles`
    pub const fn new(roles: &'static [Role]) -> Self {
        Self { roles }
    }

    /// Whether `role` may pass
    pub fn allows(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// 403 unless the principal's role is allowed
    pub fn check(&self, principal: &Principal) -> Result<(), ApiError> {
        if self.allows(principal.role) {
            Ok(())
        } else {
            tracing::debug!(user = %principal.id, role = %principal.role, "role not permitted");
            Err(ApiError::forbidden(NO_PERMISSION))
        }
    }
}

/// Middleware applying a [`RoleGuard`]; must run after [`require_auth`]
pub async fn restrict_to(
    State(guard): State<RoleGuard>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = request
        .extensions()
        .get::<Principal>()
        .ok_or_else(|| ApiError::unauthorized(NOT_LOGGED_IN))?;
    guard.check(principal)?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::models::User;
    use crate::repository::ModelSchema;
    use axum::{
        body::{to_bytes, Body},
        http::{header, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use chrono::{Duration, Utc};
    use serde_json::json;
    use tower::ServiceExt;

    const FAKE_HASH: &str = "$argon2id$v=19$m=1024,t=1,p=1$c2FsdHNhbHQ$aGFzaA";

    fn keys() -> JwtKeys {
        JwtKeys::new(
            &JwtConfig {
                secret: "guard-test-secret".to_string(),
                expires_in_secs: 3600,
                cookie_expires_in_days: 1,
            },
            false,
        )
        .unwrap()
    }

    async fn setup(role: &str) -> (Authenticator, MemoryRepository, String) {
        let users = MemoryRepository::new(ModelSchema::<User>::new());
        let user = users
            .create(
                json!({
                    "name": "Test",
                    "email": format!("{role}@example.com"),
                    "role": role,
                    "password": FAKE_HASH,
                })
                .as_object()
                .cloned()
                .unwrap(),
            )
            .await
            .unwrap();
        let id = user["id"].as_str().unwrap().to_string();
        (Authenticator::new(keys(), users.clone()), users, id)
    }

    fn app(auth: Authenticator) -> Router {
        let admin_only = get(|principal: Principal| async move { principal.id })
            .layer(middleware::from_fn_with_state(RoleGuard::new(&[Role::Admin]), restrict_to));
        Router::new()
            .route("/me", get(|principal: Principal| async move { principal.id }))
            .route("/admin", admin_only)
            .layer(middleware::from_fn_with_state(auth, require_auth))
    }

    async fn call(
        app: Router,
        uri: &str,
        header: Option<(header::HeaderName, String)>,
    ) -> (StatusCode, String) {
        let mut request = Request::get(uri);
        if let Some((name, value)) = header {
            request = request.header(name, value);
        }
        let response = app.oneshot(request.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn bearer(token: &str) -> Option<(header::HeaderName, String)> {
        Some((header::AUTHORIZATION, format!("Bearer {token}")))
    }

    #[tokio::test]
    async fn test_missing_token() {
        let (auth, _, _) = setup("user").await;
        let (status, body) = call(app(auth), "/me", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("You are not logged in!"));
    }

    #[tokio::test]
    async fn test_bearer_and_cookie_accepted() {
        let (auth, _, id) = setup("user").await;
        let token = auth.keys().sign(&id).unwrap();

        let (status, body) = call(app(auth.clone()), "/me", bearer(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, id);

        let cookie = Some((header::COOKIE, format!("jwt={token}")));
        let (status, _) = call(app(auth), "/me", cookie).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_and_expired_tokens() {
        let (auth, _, id) = setup("user").await;
        let (status, body) = call(app(auth.clone()), "/me", bearer("not.a.token")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Invalid token"));

        let expired = auth.keys().sign_at(&id, Utc::now() - Duration::hours(2)).unwrap();
        let (status, body) = call(app(auth), "/me", bearer(&expired)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("expired"));
    }

    #[tokio::test]
    async fn test_deleted_or_inactive_user_rejected() {
        let (auth, users, id) = setup("user").await;
        let token = auth.keys().sign(&id).unwrap();

        users
            .patch_unchecked(&id, json!({"active": false}).as_object().cloned().unwrap())
            .await
            .unwrap();
        let (status, body) = call(app(auth.clone()), "/me", bearer(&token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("does no longer exist"));

        let stranger = auth.keys().sign("user_01h455vb4pex5vsknk084sn02q").unwrap();
        let (status, _) = call(app(auth.clone()), "/me", bearer(&stranger)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let malformed = auth.keys().sign("nobody").unwrap();
        let (status, _) = call(app(auth), "/me", bearer(&malformed)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_token_older_than_password_change_rejected() {
        let (auth, users, id) = setup("user").await;
        let token = auth.keys().sign_at(&id, Utc::now() - Duration::minutes(5)).unwrap();
        let changed = (Utc::now() - Duration::seconds(1)).to_rfc3339();
        let patch = json!({"passwordChangedAt": changed}).as_object().cloned().unwrap();
        users
            .patch_unchecked(&id, patch)
            .await
            .unwrap();

        let (status, body) = call(app(auth.clone()), "/me", bearer(&token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("recently changed password"));

        let fresh = auth.keys().sign(&id).unwrap();
        let (status, _) = call(app(auth), "/me", bearer(&fresh)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_role_guard() {
        let (auth, _, id) = setup("user").await;
        let token = auth.keys().sign(&id).unwrap();
        let (status, body) = call(app(auth), "/admin", bearer(&token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains(NO_PERMISSION));

        let (auth, _, id) = setup("admin").await;
        let token = auth.keys().sign(&id).unwrap();
        let (status, _) = call(app(auth), "/admin", bearer(&token)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn test_role_guard_allows() {
        let guard = RoleGuard::new(&[Role::Admin, Role::LeadGuide]);
        assert!(guard.allows(Role::LeadGuide));
        assert!(!guard.allows(Role::Guide));
    }
}
