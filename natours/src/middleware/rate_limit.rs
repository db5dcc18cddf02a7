//! Per-client rate limiting
//!
//! A `governor` keyed limiter counts requests per client address. The quota
//! allows `max_requests` at once and replenishes one request every
//! `window / max_requests`, so a client that spends its allowance waits
//! roughly one window for a full refill.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};

use crate::config::RateLimitConfig;
use crate::error::{Error, Result};
use crate::handlers::ApiError;

/// Rejection message for an exhausted client
pub const TOO_MANY_REQUESTS: &str = "Too many requests from this IP, please try again in an hour!";

/// Keyed limiter shared by every request on the router it guards
#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<DefaultKeyedRateLimiter<String>>,
    clock: DefaultClock,
    max_requests: u32,
}

impl RateLimit {
    /// Build the limiter from configuration
    pub fn new(config: &RateLimitConfig) -> Result<Self> {
        let max_requests = NonZeroU32::new(config.max_requests)
            .ok_or_else(|| Error::Config(Box::new(figment::Error::from(
                "middleware.rate_limit.max_requests must be greater than zero".to_string(),
            ))))?;
        let replenish = config.window() / max_requests.get();
        let quota = Quota::with_period(replenish)
            .ok_or_else(|| Error::Config(Box::new(figment::Error::from(
                "middleware.rate_limit.window_secs must be greater than zero".to_string(),
            ))))?
            .allow_burst(max_requests);

        Ok(Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            clock: DefaultClock::default(),
            max_requests: max_requests.get(),
        })
    }

    /// Requests a client may make before being throttled
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Record one request for `client`; `Err` carries the wait in seconds
    pub fn check(&self, client: &str) -> std::result::Result<(), u64> {
        match self.limiter.check_key(&client.to_string()) {
            Ok(()) => Ok(()),
            Err(not_until) => {
                let wait = not_until.wait_time_from(self.clock.now());
                Err(wait.as_secs().max(1))
            }
        }
    }

    /// Axum middleware enforcing the limit
    pub async fn middleware(State(limit): State<Self>, request: Request, next: Next) -> Response {
        let client = client_key(&request);
        match limit.check(&client) {
            Ok(()) => next.run(request).await,
            Err(retry_after) => {
                tracing::warn!(client = %client, retry_after, "rate limit exceeded");
                let mut response = ApiError::too_many_requests(TOO_MANY_REQUESTS).into_response();
                if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
                response
            }
        }
    }
}

/// The first `X-Forwarded-For` hop, else the peer address
fn client_key(request: &Request) -> String {
    forwarded_for(request.headers())
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
