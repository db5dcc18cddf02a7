//! Account lifecycle handlers
//!
//! Signup, login and logout, the password reset round trip and the
//! self-service routes under `/users`. Every route that logs a user in
//! answers with the same envelope: `{status, token, data: {user}}` plus a
//! `Set-Cookie` carrying the token.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use super::email::EmailTemplate;
use super::guard::Principal;
use super::reset::{self, ResetToken};
use crate::handlers::{
    ApiError, ApiOperation, ItemResponse, MessageResponse, NoContent, Resource,
};
use crate::repository::{present, Document, DocumentQuery, FilterCondition, Repository};
use crate::state::AppState;

/// `POST /users/signup` body
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

/// `POST /users/login` body
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// `POST /users/forgotPassword` body
#[derive(Debug, Default, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

/// `PATCH /users/resetPassword/{token}` body
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

/// `PATCH /users/updatePassword` body
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    /// Must match the stored hash
    pub password_current: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

/// Fields a user may change about themselves
const SELF_EDITABLE: [&str; 2] = ["name", "email"];

fn invalid(message: impl std::fmt::Display) -> ApiError {
    ApiError::validation_failed(format!("Invalid input data: {message}"))
        .with_operation(ApiOperation::Account)
}

fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Scheme and host the request arrived on
pub(crate) fn request_origin(headers: &HeaderMap, state: &AppState) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| format!("localhost:{}", state.config().service.port));
    format!("{scheme}://{host}")
}

/// Validate a new password and hash it
async fn new_password_hash(
    state: &AppState,
    password: Option<String>,
    confirm: Option<String>,
) -> Result<String, ApiError> {
    let password = password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| invalid("Please provide a password"))?;
    let confirm = confirm
        .filter(|p| !p.is_empty())
        .ok_or_else(|| invalid("Please confirm your password"))?;
    state.hasher().check_length(&password).map_err(invalid)?;
    if password != confirm {
        return Err(invalid("Passwords are not the same!"));
    }
    Ok(state.hasher().hash_async(password).await?)
}

/// `{status, token, data: {user}}` with the session cookie
fn send_token(state: &AppState, user: Document, status: StatusCode) -> Result<Response, ApiError> {
    let id = user
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::internal("user document has no id"))?;
    let token = state.keys().sign(id)?;
    let cookie = HeaderValue::from_str(&state.keys().session_cookie(&token))
        .map_err(|e| ApiError::internal(format!("invalid cookie header: {e}")))?;

    let user = present(state.collections().users.schema(), user);
    let body = json!({"status": "success", "token": token, "data": {"user": user}});
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

/// `POST /users/signup`
pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let password = new_password_hash(&state, request.password, request.password_confirm).await?;

    let mut user = Document::new();
    if let Some(name) = request.name {
        user.insert("name".to_string(), Value::from(name));
    }
    if let Some(email) = request.email {
        user.insert("email".to_string(), Value::from(email));
    }
    user.insert("password".to_string(), Value::from(password));

    let user = state
        .collections()
        .users
        .create(user)
        .await
        .map_err(|e| ApiError::from(e).with_operation(ApiOperation::Account))?;

    let welcome = EmailTemplate::Welcome {
        name: user.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
        email: user.get("email").and_then(Value::as_str).unwrap_or_default().to_string(),
        url: format!("{}/me", request_origin(&headers, &state)),
    };
    if let Err(e) = state.mailer().send(welcome.render()).await {
        tracing::warn!(error = %e, "welcome email could not be sent");
    }

    tracing::info!(user = ?user.get("id"), "user signed up");
    send_token(&state, user, StatusCode::CREATED)
}

/// `POST /users/login`
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let (Some(email), Some(password)) = (
        request.email.filter(|e| !e.is_empty()),
        request.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::bad_request("Please provide email and password!")
            .with_operation(ApiOperation::Account));
    };

    let incorrect = || {
        ApiError::unauthorized("Incorrect email or password").with_operation(ApiOperation::Account)
    };
    let user = state
        .collections()
        .users
        .find_one(&[FilterCondition::eq("email", email.trim().to_lowercase())])
        .await?
        .ok_or_else(incorrect)?;
    let hash = user
        .get("password")
        .and_then(Value::as_str)
        .ok_or_else(incorrect)?
        .to_string();
    if !state.hasher().verify_async(password, hash).await? {
        return Err(incorrect());
    }

    send_token(&state, user, StatusCode::OK)
}

/// `GET /users/logout`
pub async fn logout(State(state): State<AppState>) -> Result<Response, ApiError> {
    let cookie = HeaderValue::from_str(&state.keys().logout_cookie())
        .map_err(|e| ApiError::internal(format!("invalid cookie header: {e}")))?;
    let mut response = Json(json!({"status": "success"})).into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

/// `POST /users/forgotPassword`
pub async fn forgot_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<MessageResponse, ApiError> {
    let Json(request) = payload?;
    let users = &state.collections().users;
    let email = request.email.unwrap_or_default().trim().to_lowercase();

    let user = users
        .find_one(&[FilterCondition::eq("email", email.as_str())])
        .await?
        .ok_or_else(|| {
            ApiError::new(
                ApiOperation::Account,
                crate::handlers::ApiErrorKind::NotFound,
                "There is no user with email address.",
            )
        })?;
    let id = user
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let token = ResetToken::issue();
    users
        .patch_unchecked(
            &id,
            doc(json!({
                "passwordResetToken": token.digest,
                "passwordResetExpires":
                    token.expires_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            })),
        )
        .await?;

    let email = EmailTemplate::PasswordReset {
        name: user.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
        email,
        url: format!(
            "{}/api/v1/users/resetPassword/{}",
            request_origin(&headers, &state),
            token.raw
        ),
    };

    if let Err(e) = state.mailer().send(email.render()).await {
        users
            .patch_unchecked(
                &id,
                doc(json!({"passwordResetToken": null, "passwordResetExpires": null})),
            )
            .await?;
        return Err(ApiError::new(
            ApiOperation::Account,
            crate::handlers::ApiErrorKind::InternalError,
            "There was an error sending the email. Try again later!",
        )
        .with_detail(e.to_string()));
    }

    tracing::info!(user = %id, "password reset token issued");
    Ok(MessageResponse("Token sent to email!".to_string()))
}

/// `PATCH /users/resetPassword/{token}`
pub async fn reset_password(
    State(state): State<AppState>,
    Path(raw_token): Path<String>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let users = &state.collections().users;

    let unexpired = DocumentQuery::new().filter(FilterCondition::gt(
        "passwordResetExpires",
        now_rfc3339(),
    ));
    let user = users
        .find_all(&unexpired)
        .await?
        .into_iter()
        .find(|user| {
            user.get("passwordResetToken")
                .and_then(Value::as_str)
                .is_some_and(|stored| reset::matches(stored, &raw_token))
        })
        .ok_or_else(|| {
            ApiError::bad_request("Token is invalid or has expired")
                .with_operation(ApiOperation::Account)
        })?;
    let id = user
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let password = new_password_hash(&state, request.password, request.password_confirm).await?;
    let user = users
        .update(
            &id,
            doc(json!({
                "password": password,
                "passwordChangedAt": changed_at(),
                "passwordResetToken": null,
                "passwordResetExpires": null,
            })),
        )
        .await?;

    tracing::info!(user = %id, "password reset");
    send_token(&state, user, StatusCode::OK)
}

/// One second in the past, so a token issued right after still passes the
/// freshness check
fn changed_at() -> String {
    (Utc::now() - Duration::seconds(1)).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `PATCH /users/updatePassword`
pub async fn update_password(
    State(state): State<AppState>,
    principal: Principal,
    payload: Result<Json<UpdatePasswordRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let users = &state.collections().users;

    let user = users
        .find_by_id(&principal.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", principal.id.as_str()))?;
    let hash = user
        .get("password")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let current = request.password_current.unwrap_or_default();
    if current.is_empty() || !state.hasher().verify_async(current, hash).await? {
        return Err(ApiError::unauthorized("Your current password is wrong.")
            .with_operation(ApiOperation::Account));
    }

    let password = new_password_hash(&state, request.password, request.password_confirm).await?;
    let user = users
        .update(
            &principal.id,
            doc(json!({"password": password, "passwordChangedAt": changed_at()})),
        )
        .await?;

    tracing::info!(user = %principal.id, "password updated");
    send_token(&state, user, StatusCode::OK)
}

/// `PATCH /users/updateMe`
pub async fn update_me(
    State(state): State<AppState>,
    principal: Principal,
    payload: Result<Json<Document>, JsonRejection>,
) -> Result<ItemResponse, ApiError> {
    let Json(body) = payload?;
    if body.contains_key("password") || body.contains_key("passwordConfirm") {
        return Err(ApiError::bad_request(
            "This route is not for password updates. Please use /updatePassword.",
        )
        .with_operation(ApiOperation::Account));
    }

    let patch: Document = body
        .into_iter()
        .filter(|(key, value)| SELF_EDITABLE.contains(&key.as_str()) && !value.is_null())
        .collect();
    let users = &state.collections().users;
    let user = users.update(&principal.id, patch).await?;
    Ok(ItemResponse::keyed("user", present(users.schema(), user)))
}

/// `DELETE /users/deleteMe`
pub async fn delete_me(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<NoContent, ApiError> {
    state
        .collections()
        .users
        .patch_unchecked(&principal.id, doc(json!({"active": false})))
        .await?;
    tracing::info!(user = %principal.id, "account deactivated");
    Ok(NoContent)
}

/// `GET /users/me`
pub async fn get_me(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<ItemResponse, ApiError> {
    let users = Resource::new(state.collections().users.clone(), state.query_policy());
    Ok(ItemResponse::new(users.get(&principal.id).await?))
}

/// `POST /users`: accounts are only created through signup
pub async fn create_user_not_supported() -> ApiError {
    ApiError::bad_request("This route is not defined! Please use /signup instead")
        .with_operation(ApiOperation::Create)
}
