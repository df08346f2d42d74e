//! HTTP-level tests for the auth API
//!
//! Runs the full router against an in-memory database, cookies and all.

use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use chrono::{Duration, Utc};

use atelier::api::{build_router, AppState};
use atelier::config::Config;
use atelier::db::repositories::{
    SessionRepository, SqlxSessionRepository, SqlxUserRepository, UserRepository,
};
use atelier::db::{create_test_pool, migrations};
use atelier::models::{Session, User, UserRole};
use atelier::services::{AuthService, EmailService};

struct App {
    server: TestServer,
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
}

async fn spawn_app() -> App {
    let pool = create_test_pool().await.expect("test pool");
    migrations::run_migrations(&pool).await.expect("migrations");

    let users = SqlxUserRepository::boxed(pool.clone());
    let sessions = SqlxSessionRepository::boxed(pool);

    let mut config = Config::default();
    config.session.cookie_secure = false;

    let auth_service = Arc::new(AuthService::new(
        users.clone(),
        sessions.clone(),
        config.session.clone(),
        config.proxy.clone(),
    ));
    let email_service = Arc::new(EmailService::new(
        config.email.clone(),
        config.site.clone(),
    ));

    let state = AppState {
        auth_service,
        email_service,
        config: Arc::new(config),
    };

    let server = TestServer::new(build_router(state)).expect("test server");
    App {
        server,
        users,
        sessions,
    }
}

fn set_cookies(response: &axum_test::TestResponse) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(String::from)
        .collect()
}

fn session_cookie_value(cookies: &[String]) -> Option<String> {
    cookies
        .iter()
        .filter_map(|c| c.split(';').next())
        .filter_map(|pair| pair.strip_prefix("session="))
        .find(|v| !v.is_empty())
        .map(String::from)
}

async fn signup_and_verify(app: &App, username: &str, email: &str, password: &str) {
    let response = app
        .server
        .post("/api/v1/auth/signup")
        .json(&serde_json::json!({
            "username": username,
            "email": email,
            "password": password,
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);

    let user = app
        .users
        .get_by_username(username)
        .await
        .expect("query")
        .expect("created");
    let token = user.email_verification_token.expect("token");

    let response = app
        .server
        .get(&format!("/auth/verify-email?token={}", token))
        .await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn signup_verify_login_me_flow() {
    let app = spawn_app().await;

    // Signup leaves the account unverified; login is refused with a
    // verification-specific 403
    let response = app
        .server
        .post("/api/v1/auth/signup")
        .json(&serde_json::json!({
            "username": "painter",
            "email": "p@example.com",
            "password": "password123",
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["username"], "painter");
    assert_eq!(body["email_verified"], false);
    assert!(body.get("password_hash").is_none());

    let response = app
        .server
        .post("/api/v1/auth/login")
        .json(&serde_json::json!({
            "identifier": "painter",
            "password": "password123",
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "EMAIL_NOT_VERIFIED");

    // Follow the verification link
    let user = app
        .users
        .get_by_username("painter")
        .await
        .expect("query")
        .expect("created");
    let token = user.email_verification_token.expect("token");

    let response = app
        .server
        .get(&format!("/auth/verify-email?token={}", token))
        .await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/login?verified=success"
    );

    // The token is single-use
    let response = app
        .server
        .get(&format!("/auth/verify-email?token={}", token))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    // Login now succeeds and sets the session cookie
    let response = app
        .server
        .post("/api/v1/auth/login")
        .json(&serde_json::json!({
            "identifier": "painter",
            "password": "password123",
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let cookies = set_cookies(&response);
    let session_id = session_cookie_value(&cookies).expect("session cookie");
    let cookie = cookies
        .iter()
        .find(|c| c.starts_with("session="))
        .expect("cookie");
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Expires="));

    // /me resolves the cookie to the account
    let response = app
        .server
        .get("/api/v1/auth/me")
        .add_header(
            header::COOKIE,
            HeaderValue::from_str(&format!("session={}", session_id)).unwrap(),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["username"], "painter");
}

#[tokio::test]
async fn me_without_session_is_unauthorized() {
    let app = spawn_app().await;
    let response = app.server.get("/api/v1/auth/me").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    // No cookie was presented, so none is cleared
    assert!(set_cookies(&response).is_empty());
}

#[tokio::test]
async fn stale_cookie_is_cleared_on_response() {
    let app = spawn_app().await;

    let response = app
        .server
        .get("/api/v1/auth/me")
        .add_header(
            header::COOKIE,
            HeaderValue::from_static("session=never-issued"),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let cookies = set_cookies(&response);
    let clearing = cookies
        .iter()
        .find(|c| c.starts_with("session=;"))
        .expect("clearing cookie");
    assert!(clearing.contains("Max-Age=0"));
}

#[tokio::test]
async fn login_with_stale_cookie_keeps_fresh_session() {
    let app = spawn_app().await;
    signup_and_verify(&app, "painter", "p@example.com", "password123").await;

    // A leftover cookie for a session that no longer exists would normally
    // earn a clearing Set-Cookie after the response; login's fresh cookie
    // must win, not be followed by the stale clear
    let response = app
        .server
        .post("/api/v1/auth/login")
        .add_header(
            header::COOKIE,
            HeaderValue::from_static("session=never-issued"),
        )
        .json(&serde_json::json!({
            "identifier": "painter",
            "password": "password123",
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let cookies = set_cookies(&response);
    let session_cookies: Vec<&String> = cookies
        .iter()
        .filter(|c| c.starts_with("session="))
        .collect();
    assert_eq!(session_cookies.len(), 1);
    assert!(!session_cookies[0].starts_with("session=;"));

    // The issued session actually works
    let session_id = session_cookie_value(&cookies).expect("session cookie");
    let response = app
        .server
        .get("/api/v1/auth/me")
        .add_header(
            header::COOKIE,
            HeaderValue::from_str(&format!("session={}", session_id)).unwrap(),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn account_page_redirects_anonymous_to_login() {
    let app = spawn_app().await;

    let response = app.server.get("/account").await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/login");

    // Signed in, the same page answers with the profile
    signup_and_verify(&app, "painter", "p@example.com", "password123").await;
    let response = app
        .server
        .post("/api/v1/auth/login")
        .json(&serde_json::json!({
            "identifier": "painter",
            "password": "password123",
        }))
        .await;
    let session_id = session_cookie_value(&set_cookies(&response)).expect("session cookie");

    let response = app
        .server
        .get("/account")
        .add_header(
            header::COOKIE,
            HeaderValue::from_str(&format!("session={}", session_id)).unwrap(),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["username"], "painter");
}

#[tokio::test]
async fn logout_clears_cookie_and_is_idempotent() {
    let app = spawn_app().await;
    signup_and_verify(&app, "painter", "p@example.com", "password123").await;

    let response = app
        .server
        .post("/api/v1/auth/login")
        .json(&serde_json::json!({
            "identifier": "p@example.com",
            "password": "password123",
        }))
        .await;
    let session_id = session_cookie_value(&set_cookies(&response)).expect("session cookie");

    let response = app
        .server
        .post("/api/v1/auth/logout")
        .add_header(
            header::COOKIE,
            HeaderValue::from_str(&format!("session={}", session_id)).unwrap(),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
    assert!(session_cookie_value(&set_cookies(&response)).is_none());

    // The session is gone; the same call again still answers 204
    let response = app
        .server
        .post("/api/v1/auth/logout")
        .add_header(
            header::COOKIE,
            HeaderValue::from_str(&format!("session={}", session_id)).unwrap(),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let response = app
        .server
        .get("/api/v1/auth/me")
        .add_header(
            header::COOKIE,
            HeaderValue::from_str(&format!("session={}", session_id)).unwrap(),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_signup_conflicts() {
    let app = spawn_app().await;
    signup_and_verify(&app, "painter", "p@example.com", "password123").await;

    let response = app
        .server
        .post("/api/v1/auth/signup")
        .json(&serde_json::json!({
            "username": "painter",
            "email": "other@example.com",
            "password": "password123",
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_errors_are_indistinguishable() {
    let app = spawn_app().await;
    signup_and_verify(&app, "painter", "p@example.com", "password123").await;

    let wrong_password = app
        .server
        .post("/api/v1/auth/login")
        .json(&serde_json::json!({
            "identifier": "painter",
            "password": "wrong",
        }))
        .await;
    let unknown_user = app
        .server
        .post("/api/v1/auth/login")
        .json(&serde_json::json!({
            "identifier": "stranger",
            "password": "wrong",
        }))
        .await;

    assert_eq!(wrong_password.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.text(), unknown_user.text());
}

#[tokio::test]
async fn admin_purge_is_gated_and_works() {
    let app = spawn_app().await;

    // One ordinary account, one admin created directly
    signup_and_verify(&app, "painter", "p@example.com", "password123").await;
    let mut admin = User::new(
        "curator".to_string(),
        "curator@example.com".to_string(),
        "unused".to_string(),
    );
    admin.role = UserRole::Admin;
    admin.email_verified_at = Some(Utc::now());
    admin.email_verification_token = None;
    app.users.create(&admin).await.expect("create admin");

    // Seed an expired session
    let now = Utc::now();
    let expired = Session {
        id: "expired-token".to_string(),
        user_id: "gone-user".to_string(),
        expires_at: now - Duration::days(1),
        created_at: now - Duration::days(31),
        fresh: false,
    };
    app.sessions.create(&expired).await.expect("seed session");

    // Anonymous and non-admin callers get a 403, not a redirect
    let response = app.server.post("/api/v1/admin/sessions/purge").await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = app
        .server
        .post("/api/v1/admin/sessions/purge")
        .add_header(
            HeaderName::from_static("x-auth-user-email"),
            HeaderValue::from_static("p@example.com"),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    // An admin asserted by the trusted proxy may purge
    let response = app
        .server
        .post("/api/v1/admin/sessions/purge")
        .add_header(
            HeaderName::from_static("x-auth-user-email"),
            HeaderValue::from_static("curator@example.com"),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["deleted"], 1);
    assert!(app
        .sessions
        .get_by_id("expired-token")
        .await
        .expect("query")
        .is_none());
}
