//! API error type and the error normalizer
//!
//! Every handler failure becomes an [`ApiError`]. Its `message` is always
//! safe to show a client; `detail` holds internal context (store errors,
//! SMTP failures) that is logged and only rendered in verbose mode.
//!
//! Rendering has two modes chosen from the environment:
//!
//! - [`ErrorMode::Terse`] (production): `{"status": "fail", "message": "..."}`
//! - [`ErrorMode::Verbose`] (everything else): adds an `error` object with
//!   kind, code, status, operation and entity context, plus a `stack` field
//!   carrying the internal detail
//!
//! `ApiError::into_response` always renders tersely and stashes the error in
//! the response extensions; the [`render_errors`] middleware re-renders it
//! verbosely when the service is not in production.
//!
//! # Example
//!
//! ```rust
//! use natours::handlers::{ApiError, ApiErrorKind};
//!
//! let error = ApiError::not_found("Tour", "tour_01h455vb4pex5vsknk084sn02q");
//! assert!(matches!(error.kind, ApiErrorKind::NotFound));
//! assert_eq!(error.message, "No tour found with that ID");
//! ```

use std::fmt;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Request, State},
    http::{header, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};

use super::query::QueryError;
use crate::repository::{RepositoryError, RepositoryErrorKind, RepositoryOperation};

/// Message shown for unexpected failures in terse mode
pub const GENERIC_FAILURE: &str = "Something went wrong!";

/// Operation being performed when the API error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    /// Listing documents
    List,
    /// Getting a single document by ID
    Get,
    /// Creating a new document
    Create,
    /// Updating an existing document
    Update,
    /// Deleting a document
    Delete,
    /// Verifying who the caller is
    Authenticate,
    /// Checking what the caller may do
    Authorize,
    /// Signup, login and password lifecycle
    Account,
    /// Aggregate and geo queries
    Report,
    /// Payment checkout
    Checkout,
    /// Routing and request framing
    Request,
}

impl fmt::Display for ApiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => write!(f, "list"),
            Self::Get => write!(f, "get"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::Authenticate => write!(f, "authenticate"),
            Self::Authorize => write!(f, "authorize"),
            Self::Account => write!(f, "account"),
            Self::Report => write!(f, "report"),
            Self::Checkout => write!(f, "checkout"),
            Self::Request => write!(f, "request"),
        }
    }
}

/// Category of API error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// Document or route was not found
    NotFound,
    /// Body failed schema validation, duplicate unique value, malformed id
    ValidationFailed,
    /// Invalid request format or parameters
    BadRequest,
    /// Authentication required or failed
    Unauthorized,
    /// Authenticated but not allowed
    Forbidden,
    /// Request body over the configured limit
    PayloadTooLarge,
    /// Rate limit exceeded
    TooManyRequests,
    /// Unexpected server-side failure
    InternalError,
    /// A collaborator is down or not configured
    ServiceUnavailable,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::ValidationFailed => write!(f, "validation_failed"),
            Self::BadRequest => write!(f, "bad_request"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::PayloadTooLarge => write!(f, "payload_too_large"),
            Self::TooManyRequests => write!(f, "too_many_requests"),
            Self::InternalError => write!(f, "internal_error"),
            Self::ServiceUnavailable => write!(f, "service_unavailable"),
        }
    }
}

impl ApiErrorKind {
    /// Get the HTTP status code for this error kind
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::ValidationFailed | Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get the error code string for this error kind
    #[must_use]
    pub fn error_code(&self) -> String {
        format!("{}", self).to_uppercase()
    }
}

/// How much of an error reaches the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMode {
    /// Full context, for development
    Verbose,
    /// Status and message only, for production
    Terse,
}

impl ErrorMode {
    /// Terse in production, verbose otherwise
    pub fn for_environment(production: bool) -> Self {
        if production {
            Self::Terse
        } else {
            Self::Verbose
        }
    }
}

/// Structured API error with operation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// The operation being performed when the error occurred
    pub operation: ApiOperation,
    /// The category of error
    pub kind: ApiErrorKind,
    /// Client-facing message
    pub message: String,
    /// Internal context, never shown in terse mode
    pub detail: Option<String>,
    /// The type of entity involved (e.g., "Tour", "User")
    pub entity_type: Option<String>,
    /// The ID of the entity involved
    pub entity_id: Option<String>,
}

impl ApiError {
    /// Create a new API error
    pub fn new(operation: ApiOperation, kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            detail: None,
            entity_type: None,
            entity_id: None,
        }
    }

    /// Document lookup by id came back empty
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        let entity_type = entity_type.into();
        Self {
            operation: ApiOperation::Get,
            kind: ApiErrorKind::NotFound,
            message: format!("No {} found with that ID", entity_type.to_lowercase()),
            detail: None,
            entity_type: Some(entity_type),
            entity_id: Some(entity_id.into()),
        }
    }

    /// Create a validation failed error
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ApiOperation::Create, ApiErrorKind::ValidationFailed, message)
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ApiOperation::Request, ApiErrorKind::BadRequest, message)
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ApiOperation::Authenticate, ApiErrorKind::Unauthorized, message)
    }

    /// Create a forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ApiOperation::Authorize, ApiErrorKind::Forbidden, message)
    }

    /// Create a rate limit error
    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new(ApiOperation::Request, ApiErrorKind::TooManyRequests, message)
    }

    /// Unexpected failure; `detail` is logged, the client sees a generic message
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ApiOperation::Request, ApiErrorKind::InternalError, GENERIC_FAILURE)
            .with_detail(detail)
    }

    /// Create a service unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ApiOperation::Request, ApiErrorKind::ServiceUnavailable, message)
    }

    /// Unknown route
    pub fn route_not_found(path: &str) -> Self {
        Self::new(
            ApiOperation::Request,
            ApiErrorKind::NotFound,
            format!("Can't find {path} on this server!"),
        )
    }

    /// Add entity context to an existing error
    #[must_use]
    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: ApiOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Attach internal context
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// `fail` for client errors, `error` for server errors
    pub fn status_label(&self) -> &'static str {
        if self.kind.status_code().is_client_error() {
            "fail"
        } else {
            "error"
        }
    }

    /// JSON body for the given mode
    pub fn body(&self, mode: ErrorMode) -> Value {
        let mut body = Map::new();
        body.insert("status".to_string(), json!(self.status_label()));
        body.insert("message".to_string(), json!(self.message));

        if mode == ErrorMode::Verbose {
            let mut error = Map::new();
            error.insert("statusCode".to_string(), json!(self.kind.status_code().as_u16()));
            error.insert("kind".to_string(), json!(self.kind.to_string()));
            error.insert("code".to_string(), json!(self.kind.error_code()));
            error.insert("operation".to_string(), json!(self.operation.to_string()));
            if let Some(entity_type) = &self.entity_type {
                error.insert("entityType".to_string(), json!(entity_type));
            }
            if let Some(entity_id) = &self.entity_id {
                error.insert("entityId".to_string(), json!(entity_id));
            }
            body.insert("error".to_string(), Value::Object(error));
            body.insert(
                "stack".to_string(),
                json!(self.detail.clone().unwrap_or_else(|| self.to_string())),
            );
        }
        Value::Object(body)
    }

    fn log(&self) {
        if self.kind.status_code().is_server_error() {
            tracing::error!(
                operation = %self.operation,
                kind = %self.kind,
                entity_type = ?self.entity_type,
                entity_id = ?self.entity_id,
                detail = ?self.detail,
                "API error: {}", self.message
            );
        } else {
            tracing::warn!(
                operation = %self.operation,
                kind = %self.kind,
                entity_type = ?self.entity_type,
                entity_id = ?self.entity_id,
                "API error: {}", self.message
            );
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "API {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let (Some(entity_type), Some(entity_id)) = (&self.entity_type, &self.entity_id) {
            write!(f, " [{}: {}]", entity_type, entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        let mut response =
            (self.kind.status_code(), Json(self.body(ErrorMode::Terse))).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

/// Re-render handler errors verbosely outside production
///
/// Status and headers (such as `Retry-After`) are preserved; only the body
/// is replaced.
pub async fn render_errors(
    State(mode): State<ErrorMode>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if mode == ErrorMode::Terse {
        return response;
    }
    let Some(error) = response.extensions().get::<ApiError>().cloned() else {
        return response;
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    let body = error.body(mode).to_string();
    Response::from_parts(parts, Body::from(body))
}

/// Fallback for unmatched routes
pub async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::route_not_found(uri.path())
}

/// Convert RepositoryOperation to ApiOperation
fn repository_operation_to_api_operation(op: RepositoryOperation) -> ApiOperation {
    match op {
        RepositoryOperation::FindById | RepositoryOperation::FindOne => ApiOperation::Get,
        RepositoryOperation::FindAll | RepositoryOperation::Count => ApiOperation::List,
        RepositoryOperation::Create => ApiOperation::Create,
        RepositoryOperation::Update => ApiOperation::Update,
        RepositoryOperation::Delete => ApiOperation::Delete,
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        let operation = repository_operation_to_api_operation(err.operation);

        let (kind, message) = match err.kind {
            RepositoryErrorKind::NotFound => {
                let entity = err.entity_type.as_deref().unwrap_or("document").to_lowercase();
                (ApiErrorKind::NotFound, format!("No {entity} found with that ID"))
            }
            RepositoryErrorKind::AlreadyExists => (
                ApiErrorKind::ValidationFailed,
                format!(
                    "Duplicate field value: {}. Please use another value!",
                    err.entity_id.as_deref().unwrap_or_default()
                ),
            ),
            RepositoryErrorKind::ValidationFailed => (
                ApiErrorKind::ValidationFailed,
                format!("Invalid input data: {}", err.message),
            ),
            RepositoryErrorKind::InvalidId => (
                ApiErrorKind::ValidationFailed,
                format!("Invalid id: {}.", err.entity_id.as_deref().unwrap_or_default()),
            ),
            RepositoryErrorKind::SerializationError | RepositoryErrorKind::Other => {
                (ApiErrorKind::InternalError, GENERIC_FAILURE.to_string())
            }
        };

        Self {
            operation,
            kind,
            message,
            detail: Some(err.to_string()),
            entity_type: err.entity_type,
            entity_id: err.entity_id,
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        Self::new(ApiOperation::List, ApiErrorKind::BadRequest, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Self::new(
                ApiOperation::Request,
                ApiErrorKind::PayloadTooLarge,
                "Request body is too large",
            );
        }
        Self::bad_request(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<crate::error::Error> for ApiError {
    fn from(err: crate::error::Error) -> Self {
        Self::internal(err.to_string())
    }
}
