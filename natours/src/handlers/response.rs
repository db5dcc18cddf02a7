//! Success envelopes
//!
//! Every successful JSON response carries `"status": "success"`. Lists add a
//! `results` count and wrap documents under `data.documents`; single
//! documents sit under `data.document` unless a handler picks its own key
//! (`data.user`, `data.stats`).
//!
//! # Example
//!
//! ```rust
//! use natours::handlers::ListResponse;
//! use serde_json::json;
//!
//! let response = ListResponse::new(vec![json!({"name": "The Sea Explorer"})]);
//! assert_eq!(response.results, 1);
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// List response: `{status, results, data: {documents}}`
#[derive(Debug, Clone, Serialize)]
pub struct ListResponse<T> {
    /// Always `success`
    pub status: &'static str,
    /// Number of documents in this page
    pub results: usize,
    /// Wrapped documents
    pub data: ListData<T>,
}

/// Inner list payload
#[derive(Debug, Clone, Serialize)]
pub struct ListData<T> {
    /// Documents in this page
    pub documents: Vec<T>,
}

impl<T> ListResponse<T> {
    /// Wrap a page of documents
    pub fn new(documents: Vec<T>) -> Self {
        Self {
            status: "success",
            results: documents.len(),
            data: ListData { documents },
        }
    }
}

impl<T: Serialize> IntoResponse for ListResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Single-payload response: `{status, data: {<key>: value}}`
#[derive(Debug, Clone)]
pub struct ItemResponse {
    status_code: StatusCode,
    key: &'static str,
    value: Value,
}

impl ItemResponse {
    /// 200 with the payload under `data.document`
    pub fn new(value: impl Into<Value>) -> Self {
        Self::keyed("document", value)
    }

    /// 201 with the payload under `data.document`
    pub fn created(value: impl Into<Value>) -> Self {
        Self::new(value).with_status(StatusCode::CREATED)
    }

    /// 200 with the payload under `data.<key>`
    pub fn keyed(key: &'static str, value: impl Into<Value>) -> Self {
        Self {
            status_code: StatusCode::OK,
            key,
            value: value.into(),
        }
    }

    /// Override the status code
    #[must_use]
    pub fn with_status(mut self, status_code: StatusCode) -> Self {
        self.status_code = status_code;
        self
    }

    /// Response body
    pub fn body(&self) -> Value {
        let mut data = Map::new();
        data.insert(self.key.to_string(), self.value.clone());
        json!({"status": "success", "data": data})
    }
}

impl IntoResponse for ItemResponse {
    fn into_response(self) -> Response {
        let body = self.body();
        (self.status_code, Json(body)).into_response()
    }
}

/// Response with no body
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContent;

impl IntoResponse for NoContent {
    fn into_response(self) -> Response {
        StatusCode::NO_CONTENT.into_response()
    }
}

/// `{status: "success", message}` for actions with nothing to return
#[derive(Debug, Clone)]
pub struct MessageResponse(pub String);

impl IntoResponse for MessageResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            Json(json!({"status": "success", "message": self.0})),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_response_shape() {
        let response = ListResponse::new(vec![json!({"a": 1}), json!({"a": 2})]);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], json!("success"));
        assert_eq!(value["results"], json!(2));
        assert_eq!(value["data"]["documents"][1]["a"], json!(2));
    }

    #[test]
    fn test_item_response_keys_and_status() {
        let item = ItemResponse::created(json!({"name": "x"}));
        assert_eq!(item.status_code, StatusCode::CREATED);
        assert_eq!(item.body()["data"]["document"]["name"], json!("x"));

        let stats = ItemResponse::keyed("stats", json!([]));
        assert_eq!(stats.body(), json!({"status": "success", "data": {"stats": []}}));
    }

    #[test]
    fn test_no_content_status() {
        assert_eq!(NoContent.into_response().status(), StatusCode::NO_CONTENT);
    }
}
