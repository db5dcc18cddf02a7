//! Shared fixtures for HTTP-level tests

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::auth::MemoryMailbox;
use crate::config::{Config, PasswordConfig};
use crate::models::Role;
use crate::payments::MockGateway;
use crate::repository::{Document, Repository};
use crate::server;
use crate::state::AppState;

/// Password every fixture user gets
pub(crate) const PASSWORD: &str = "test1234";

/// Configuration with argon2 cheap enough for tests and no rate limit
pub(crate) fn config() -> Config {
    let mut config = Config::default();
    config.password = PasswordConfig {
        memory_cost_kib: 1024,
        time_cost: 1,
        parallelism: 1,
        min_password_length: 8,
    };
    config.middleware.rate_limit.enabled = false;
    config
}

/// The assembled application with handles on its fakes
pub(crate) struct TestApp {
    pub state: AppState,
    pub mailbox: MemoryMailbox,
    pub gateway: MockGateway,
    pub router: Router,
}

/// One decoded response
pub(crate) struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub(crate) fn new() -> Self {
        Self::with_config(config())
    }

    pub(crate) fn with_config(config: Config) -> Self {
        let mailbox = MemoryMailbox::new();
        let gateway = MockGateway::new();
        let state = AppState::builder()
            .config(config)
            .mailer(Arc::new(mailbox.clone()))
            .payments(Arc::new(gateway.clone()))
            .build()
            .unwrap();
        let router = server::router(state.clone()).unwrap();
        Self {
            state,
            mailbox,
            gateway,
            router,
        }
    }

    /// Send a request; `token` goes in a bearer header
    pub(crate) async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub(crate) async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::GET, uri, None, token).await
    }

    /// Store a user directly and sign a token for them
    pub(crate) async fn user(&self, name: &str, email: &str, role: Role) -> (String, String) {
        let hash = self.state.hasher().hash(PASSWORD).unwrap();
        let user = self
            .state
            .collections()
            .users
            .create(doc(json!({
                "name": name,
                "email": email,
                "role": role.as_str(),
                "password": hash,
            })))
            .await
            .unwrap();
        let id = user["id"].as_str().unwrap().to_string();
        let token = self.state.keys().sign(&id).unwrap();
        (id, token)
    }

    /// Store a tour built from [`tour_body`] with `overrides` applied
    pub(crate) async fn tour(&self, overrides: Value) -> Document {
        self.state
            .collections()
            .tours
            .create(tour_body(overrides))
            .await
            .unwrap()
    }
}

/// A valid tour body
pub(crate) fn tour_body(overrides: Value) -> Document {
    let mut base = doc(json!({
        "name": "The Forest Hiker",
        "duration": 5,
        "maxGroupSize": 25,
        "difficulty": "easy",
        "price": 397,
        "summary": "Breathtaking hike through the Canadian Banff National Park",
        "description": "Ut enim ad minim veniam, quis nostrud exercitation ullamco.",
        "imageCover": "tour-1-cover.jpg",
        "startDates": ["2021-04-25T09:00:00.000Z", "2021-07-20T09:00:00.000Z"],
        "startLocation": {
            "type": "Point",
            "coordinates": [-115.570154, 51.178456],
            "address": "224 Banff Ave, Banff, AB, Canada",
            "description": "Banff, CAN"
        }
    }));
    base.extend(doc(overrides));
    base
}

pub(crate) fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}
