//! `/users`: account lifecycle, self-service and admin CRUD

use std::sync::Arc;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};

use super::{protect, restrict, ADMIN};
use crate::auth::accounts;
use crate::handlers::{delete_one, get_one, list_all, update_one, Resource};
use crate::repository::MemoryRepository;
use crate::state::AppState;

/// Router mounted at `/users`
pub fn routes(state: &AppState) -> Router {
    let accounts = Router::new()
        .route("/signup", post(accounts::signup))
        .route("/login", post(accounts::login))
        .route("/logout", get(accounts::logout))
        .route("/forgotPassword", post(accounts::forgot_password))
        .route("/resetPassword/{token}", patch(accounts::reset_password))
        .route(
            "/updatePassword",
            protect(patch(accounts::update_password), state),
        )
        .route("/updateMe", protect(patch(accounts::update_me), state))
        .route("/deleteMe", protect(delete(accounts::delete_me), state))
        .route("/me", protect(get(accounts::get_me), state))
        .with_state(state.clone());

    let users = Arc::new(Resource::new(
        state.collections().users.clone(),
        state.query_policy(),
    ));
    let admin = Router::new()
        .route(
            "/",
            restrict(
                get(list_all::<MemoryRepository>).post(accounts::create_user_not_supported),
                state,
                ADMIN,
            ),
        )
        .route(
            "/{id}",
            restrict(
                get(get_one::<MemoryRepository>)
                    .patch(update_one::<MemoryRepository>)
                    .delete(delete_one::<MemoryRepository>),
                state,
                ADMIN,
            ),
        )
        .with_state(users);

    accounts.merge(admin)
}

#[cfg(test)]
mod tests {
    use crate::auth::{COOKIE_NAME, LOGGED_OUT};
    use crate::models::Role;
    use crate::testing::{TestApp, PASSWORD};
    use axum::http::{header, Method, StatusCode};
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn signup_body() -> serde_json::Value {
        json!({
            "name": "Jonas Schmedtmann",
            "email": "Jonas@Example.com",
            "password": "pass1234",
            "passwordConfirm": "pass1234",
            "role": "admin"
        })
    }

    #[tokio::test]
    async fn test_signup_issues_token_and_ignores_role() {
        let app = TestApp::new();
        let response = app
            .send(Method::POST, "/api/v1/users/signup", Some(signup_body()), None)
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
        assert!(response.body["token"].as_str().is_some());
        let user = &response.body["data"]["user"];
        assert_eq!(user["email"], "jonas@example.com");
        assert_eq!(user["role"], "user");
        assert!(user.get("password").is_none());

        let cookie = response.headers[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with(&format!("{COOKIE_NAME}=")));
        assert!(cookie.contains("HttpOnly"));

        let welcome = app.mailbox.last_to("jonas@example.com").await.unwrap();
        assert!(welcome.subject.contains("Welcome"));
    }

    #[tokio::test]
    async fn test_signup_password_rules() {
        let app = TestApp::new();
        let mut body = signup_body();
        body["passwordConfirm"] = json!("pass9999");
        let mismatch = app.send(Method::POST, "/api/v1/users/signup", Some(body), None).await;
        assert_eq!(mismatch.status, StatusCode::BAD_REQUEST);
        assert_eq!(mismatch.body["message"], "Invalid input data: Passwords are not the same!");

        let mut body = signup_body();
        body["password"] = json!("short");
        body["passwordConfirm"] = json!("short");
        let short = app.send(Method::POST, "/api/v1/users/signup", Some(body), None).await;
        assert_eq!(short.status, StatusCode::BAD_REQUEST);

        app.send(Method::POST, "/api/v1/users/signup", Some(signup_body()), None)
            .await;
        let duplicate = app
            .send(Method::POST, "/api/v1/users/signup", Some(signup_body()), None)
            .await;
        assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            duplicate.body["message"],
            "Duplicate field value: jonas@example.com. Please use another value!"
        );
    }

    #[tokio::test]
    async fn test_login_outcomes() {
        let app = TestApp::new();
        app.user("Leo Gillespie", "leo@example.com", Role::User).await;

        let missing = app
            .send(
                Method::POST,
                "/api/v1/users/login",
                Some(json!({"email": "leo@example.com"})),
                None,
            )
            .await;
        assert_eq!(missing.status, StatusCode::BAD_REQUEST);
        assert_eq!(missing.body["message"], "Please provide email and password!");

        let wrong = app
            .send(
                Method::POST,
                "/api/v1/users/login",
                Some(json!({"email": "leo@example.com", "password": "wrong-pass"})),
                None,
            )
            .await;
        assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.body["message"], "Incorrect email or password");

        let ok = app
            .send(
                Method::POST,
                "/api/v1/users/login",
                Some(json!({"email": "LEO@example.com", "password": PASSWORD})),
                None,
            )
            .await;
        assert_eq!(ok.status, StatusCode::OK);
        let token = ok.body["token"].as_str().unwrap();
        let me = app.get("/api/v1/users/me", Some(token)).await;
        assert_eq!(me.body["data"]["document"]["name"], "Leo Gillespie");
    }

    #[tokio::test]
    async fn test_logout_overwrites_cookie() {
        let app = TestApp::new();
        let response = app.get("/api/v1/users/logout", None).await;
        assert_eq!(response.status, StatusCode::OK);
        let cookie = response.headers[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with(&format!("{COOKIE_NAME}={LOGGED_OUT}")));
        assert!(cookie.contains("Max-Age=10"));
    }

    #[tokio::test]
    async fn test_password_reset_round_trip() {
        let app = TestApp::new();
        let (id, _) = app.user("Kate Morrison", "kate@example.com", Role::User).await;
        let old_token = app
            .state
            .keys()
            .sign_at(&id, Utc::now() - Duration::hours(1))
            .unwrap();

        let unknown = app
            .send(
                Method::POST,
                "/api/v1/users/forgotPassword",
                Some(json!({"email": "nobody@example.com"})),
                None,
            )
            .await;
        assert_eq!(unknown.status, StatusCode::NOT_FOUND);
        assert_eq!(unknown.body["message"], "There is no user with email address.");

        let sent = app
            .send(
                Method::POST,
                "/api/v1/users/forgotPassword",
                Some(json!({"email": "kate@example.com"})),
                None,
            )
            .await;
        assert_eq!(sent.status, StatusCode::OK);
        assert_eq!(sent.body["message"], "Token sent to email!");

        let email = app.mailbox.last_to("kate@example.com").await.unwrap();
        let url = email
            .body
            .split_whitespace()
            .find(|word| word.contains("/resetPassword/"))
            .unwrap();
        let raw = url.rsplit('/').next().unwrap();
        let reset_uri = format!("/api/v1/users/resetPassword/{raw}");
        let body = json!({"password": "newpass123", "passwordConfirm": "newpass123"});

        let reset = app.send(Method::PATCH, &reset_uri, Some(body.clone()), None).await;
        assert_eq!(reset.status, StatusCode::OK);
        assert!(reset.body["token"].as_str().is_some());

        let reused = app.send(Method::PATCH, &reset_uri, Some(body), None).await;
        assert_eq!(reused.status, StatusCode::BAD_REQUEST);
        assert_eq!(reused.body["message"], "Token is invalid or has expired");

        // Issued before the password change
        let stale = app.get("/api/v1/users/me", Some(&old_token)).await;
        assert_eq!(stale.status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            stale.body["message"],
            "User recently changed password! Please log in again."
        );

        let login = app
            .send(
                Method::POST,
                "/api/v1/users/login",
                Some(json!({"email": "kate@example.com", "password": "newpass123"})),
                None,
            )
            .await;
        assert_eq!(login.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_expired_reset_token_rejected() {
        let app = TestApp::new();
        app.user("Kate Morrison", "kate@example.com", Role::User).await;
        app.send(
            Method::POST,
            "/api/v1/users/forgotPassword",
            Some(json!({"email": "kate@example.com"})),
            None,
        )
        .await;
        let email = app.mailbox.last_to("kate@example.com").await.unwrap();
        let raw = email
            .body
            .split_whitespace()
            .find(|word| word.contains("/resetPassword/"))
            .and_then(|url| url.rsplit('/').next())
            .unwrap()
            .to_string();

        let users = &app.state.collections().users;
        let user = crate::repository::Repository::find_one(
            users,
            &[crate::repository::FilterCondition::eq("email", "kate@example.com")],
        )
        .await
        .unwrap()
        .unwrap();
        let past = (Utc::now() - Duration::minutes(1)).to_rfc3339();
        crate::repository::Repository::patch_unchecked(
            users,
            user["id"].as_str().unwrap(),
            crate::testing::doc(json!({"passwordResetExpires": past})),
        )
        .await
        .unwrap();

        let response = app
            .send(
                Method::PATCH,
                &format!("/api/v1/users/resetPassword/{raw}"),
                Some(json!({"password": "newpass123", "passwordConfirm": "newpass123"})),
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_failed_reset_email_clears_token() {
        let app = TestApp::new();
        app.user("Kate Morrison", "kate@example.com", Role::User).await;
        app.mailbox.set_failing(true);
        let response = app
            .send(
                Method::POST,
                "/api/v1/users/forgotPassword",
                Some(json!({"email": "kate@example.com"})),
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.body["message"],
            "There was an error sending the email. Try again later!"
        );

        let user = crate::repository::Repository::find_one(
            &app.state.collections().users,
            &[crate::repository::FilterCondition::eq("email", "kate@example.com")],
        )
        .await
        .unwrap()
        .unwrap();
        assert!(user.get("passwordResetToken").is_none());
        assert!(user.get("passwordResetExpires").is_none());
    }

    #[tokio::test]
    async fn test_update_password_requires_current() {
        let app = TestApp::new();
        let (_, token) = app.user("Ben Hadley", "ben@example.com", Role::User).await;
        let wrong = app
            .send(
                Method::PATCH,
                "/api/v1/users/updatePassword",
                Some(json!({
                    "passwordCurrent": "not-it",
                    "password": "newpass123",
                    "passwordConfirm": "newpass123"
                })),
                Some(&token),
            )
            .await;
        assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.body["message"], "Your current password is wrong.");

        let ok = app
            .send(
                Method::PATCH,
                "/api/v1/users/updatePassword",
                Some(json!({
                    "passwordCurrent": PASSWORD,
                    "password": "newpass123",
                    "passwordConfirm": "newpass123"
                })),
                Some(&token),
            )
            .await;
        assert_eq!(ok.status, StatusCode::OK);
        let fresh = ok.body["token"].as_str().unwrap();
        assert_eq!(app.get("/api/v1/users/me", Some(fresh)).await.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_update_me_filters_fields() {
        let app = TestApp::new();
        let (_, token) = app.user("Ben Hadley", "ben@example.com", Role::User).await;

        let refused = app
            .send(
                Method::PATCH,
                "/api/v1/users/updateMe",
                Some(json!({"password": "newpass123"})),
                Some(&token),
            )
            .await;
        assert_eq!(refused.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            refused.body["message"],
            "This route is not for password updates. Please use /updatePassword."
        );

        let updated = app
            .send(
                Method::PATCH,
                "/api/v1/users/updateMe",
                Some(json!({"name": "Benjamin Hadley", "role": "admin"})),
                Some(&token),
            )
            .await;
        assert_eq!(updated.status, StatusCode::OK);
        assert_eq!(updated.body["data"]["user"]["name"], "Benjamin Hadley");
        assert_eq!(updated.body["data"]["user"]["role"], "user");
    }

    #[tokio::test]
    async fn test_delete_me_deactivates() {
        let app = TestApp::new();
        let (_, token) = app.user("Ben Hadley", "ben@example.com", Role::User).await;
        let (_, admin) = app.user("Admin", "admin@example.com", Role::Admin).await;

        let response = app
            .send(Method::DELETE, "/api/v1/users/deleteMe", None, Some(&token))
            .await;
        assert_eq!(response.status, StatusCode::NO_CONTENT);

        let gone = app.get("/api/v1/users/me", Some(&token)).await;
        assert_eq!(gone.status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            gone.body["message"],
            "The user belonging to this token does no longer exist."
        );

        let listed = app.get("/api/v1/users", Some(&admin)).await;
        assert_eq!(listed.body["results"], 1);
    }

    #[tokio::test]
    async fn test_admin_routes() {
        let app = TestApp::new();
        let (_, user) = app.user("Ben Hadley", "ben@example.com", Role::User).await;
        let (_, admin) = app.user("Admin", "admin@example.com", Role::Admin).await;

        assert_eq!(app.get("/api/v1/users", Some(&user)).await.status, StatusCode::FORBIDDEN);

        let create = app
            .send(Method::POST, "/api/v1/users", Some(json!({"name": "x"})), Some(&admin))
            .await;
        assert_eq!(create.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            create.body["message"],
            "This route is not defined! Please use /signup instead"
        );
    }
}
