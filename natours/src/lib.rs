//! # natours
//!
//! REST API for browsing, reviewing and booking tours.
//!
//! ## Features
//!
//! - **Query translation**: `?price[lt]=1000&sort=-ratingsAverage&fields=name&page=2`
//!   becomes a typed [`DocumentQuery`](repository::DocumentQuery)
//! - **Generic resource handlers**: one set of CRUD handlers serves tours, users,
//!   reviews and bookings, configured per resource with population rules
//! - **Staged authentication**: bearer or cookie JWT, account lookup,
//!   password-change check, then role restriction
//! - **Password lifecycle**: signup, login, forgot/reset with hashed one-time
//!   tokens, update
//! - **Error normalization**: verbose in development, terse in production
//!
//! ## Example
//!
//! ```rust,no_run
//! use natours::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let state = AppState::builder().config(config.clone()).build()?;
//!     let app = router(state)?;
//!
//!     Server::new(config).serve(app).await
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod health;
pub mod ids;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod payments;
pub mod repository;
pub mod seed;
pub mod server;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::api::{routes, API_PREFIX};
    pub use crate::auth::{
        require_auth, restrict_to, Authenticator, JwtKeys, Mailer, MemoryMailbox,
        PasswordHasher, Principal, RoleGuard, SmtpMailer,
    };
    pub use crate::config::{Config, RateLimitConfig};
    pub use crate::error::{Error, Result};
    pub use crate::handlers::{
        ApiError, ApiErrorKind, ApiOperation, ErrorMode, ItemResponse, ListResponse, Resource,
    };
    pub use crate::health::{health, HealthResponse};
    pub use crate::ids::{MakeTypedRequestId, RequestId};
    pub use crate::middleware::RateLimit;
    pub use crate::models::{Booking, Review, Role, Tour, User};
    pub use crate::observability::init_tracing;
    pub use crate::payments::{MockGateway, PaymentGateway, StripeGateway};
    pub use crate::repository::{
        Document, DocumentQuery, FilterCondition, MemoryRepository, Repository, RepositoryError,
        RepositoryErrorKind,
    };
    pub use crate::seed::{import_dir, SeedSummary};
    pub use crate::server::{router, Server};
    pub use crate::state::{AppState, AppStateBuilder, Collections};

    pub use axum::{
        extract::{Path, Query, State},
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Json, Response},
        Router,
    };

    pub use serde::{Deserialize, Serialize};
    pub use tracing::{debug, error, info, warn};
}
