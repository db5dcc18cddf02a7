//! REST surface under `/api/v1`
//!
//! Each resource module returns its own [`Router`] with the state it needs
//! already applied; this module nests them, puts the rate limiter in front of
//! the API prefix and adds `/health` and the catch-all 404.
//!
//! Guards attach per method: [`protect`] wraps a [`MethodRouter`] in
//! [`require_auth`], [`restrict`] adds a [`RoleGuard`] inside it.

use axum::{middleware, routing::get, routing::MethodRouter, Router};

use crate::auth::{require_auth, restrict_to, RoleGuard};
use crate::error::Result;
use crate::handlers::route_not_found;
use crate::health::health;
use crate::middleware::RateLimit;
use crate::models::Role;
use crate::state::AppState;

pub mod bookings;
pub mod reviews;
pub mod tours;
pub mod users;

/// Version prefix of every resource route
pub const API_PREFIX: &str = "/api/v1";

pub(crate) const ADMIN: RoleGuard = RoleGuard::new(&[Role::Admin]);
pub(crate) const ADMIN_OR_LEAD: RoleGuard = RoleGuard::new(&[Role::Admin, Role::LeadGuide]);
pub(crate) const REVIEWER: RoleGuard = RoleGuard::new(&[Role::User]);
pub(crate) const REVIEWER_OR_ADMIN: RoleGuard = RoleGuard::new(&[Role::User, Role::Admin]);

/// Require a valid session for `route`
pub fn protect<S>(route: MethodRouter<S>, state: &AppState) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    route.layer(middleware::from_fn_with_state(
        state.authenticator().clone(),
        require_auth,
    ))
}

/// Require a valid session and one of the roles in `guard`
pub fn restrict<S>(route: MethodRouter<S>, state: &AppState, guard: RoleGuard) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    protect(
        route.layer(middleware::from_fn_with_state(guard, restrict_to)),
        state,
    )
}

/// Every resource router nested under [`API_PREFIX`], rate limited when enabled
pub fn routes(state: &AppState) -> Result<Router> {
    let v1 = Router::new()
        .nest("/tours", tours::routes(state))
        .nest("/users", users::routes(state))
        .nest("/reviews", reviews::routes(state))
        .nest("/bookings", bookings::routes(state));

    let mut api = Router::new().nest(API_PREFIX, v1);
    let limits = &state.config().middleware.rate_limit;
    if limits.enabled {
        let limiter = RateLimit::new(limits)?;
        tracing::info!(
            max_requests = limiter.max_requests(),
            window_secs = limits.window_secs,
            "rate limiting /api"
        );
        api = api.layer(middleware::from_fn_with_state(limiter, RateLimit::middleware));
    }

    Ok(Router::new()
        .route("/health", get(health))
        .with_state(state.clone())
        .merge(api)
        .fallback(route_not_found))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{config, TestApp};
    use axum::http::{header, StatusCode};

    #[tokio::test]
    async fn test_health_outside_prefix() {
        let app = TestApp::new();
        let response = app.get("/health", None).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["status"], "ok");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404_with_path() {
        let app = TestApp::new();
        let response = app.get("/api/v1/nowhere", None).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.body["status"], "fail");
        assert_eq!(response.body["message"], "Can't find /api/v1/nowhere on this server!");
    }

    #[tokio::test]
    async fn test_rate_limit_applies_to_api_only() {
        let mut config = config();
        config.middleware.rate_limit.enabled = true;
        config.middleware.rate_limit.max_requests = 1;
        let app = TestApp::with_config(config);

        assert_eq!(app.get("/api/v1/tours", None).await.status, StatusCode::OK);
        let limited = app.get("/api/v1/tours", None).await;
        assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            limited.body["message"],
            "Too many requests from this IP, please try again in an hour!"
        );
        assert!(limited.headers.contains_key(header::RETRY_AFTER));

        assert_eq!(app.get("/health", None).await.status, StatusCode::OK);
    }
}
