//! Authentication API endpoints
//!
//! Handles HTTP requests for account and session management:
//! - POST /api/v1/auth/signup - Account registration
//! - POST /api/v1/auth/login - Login (sets the session cookie)
//! - POST /api/v1/auth/logout - Logout (clears the session cookie)
//! - GET /api/v1/auth/me - Current identity
//! - GET /auth/verify-email - Email verification link landing

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{
    clear_session_cookie, session_cookie, ApiError, AppState,
};
use crate::models::AuthContext;
use crate::services::EmailVerification;

/// Request body for account registration
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Request body for login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

/// Query parameters of the verification link
#[derive(Debug, Deserialize)]
pub struct VerifyEmailQuery {
    #[serde(default)]
    pub token: String,
}

/// Response for user info
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub email_verified: bool,
    pub created_at: String,
}

impl From<crate::models::User> for UserResponse {
    fn from(user: crate::models::User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role.to_string(),
            email_verified: user.email_verified_at.is_some(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Build the auth router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

/// POST /api/v1/auth/signup - Account registration
///
/// Creates an unverified account and mails the verification link. Mail
/// delivery is best-effort: a send failure is logged and the signup still
/// succeeds, since the account already exists at that point.
async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .auth_service
        .signup(&body.username, &body.email, &body.password)
        .await?;

    if let Some(token) = user.email_verification_token.as_deref() {
        if state.email_service.is_configured() {
            if let Err(e) = state
                .email_service
                .send_verification_email(&user.email, token)
                .await
            {
                tracing::warn!(email = %user.email, "failed to send verification email: {e:#}");
            }
        } else {
            tracing::warn!(
                email = %user.email,
                link = %state.email_service.verification_link(token),
                "outbound mail not configured; verification link logged instead"
            );
        }
    }

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// POST /api/v1/auth/login - Login
///
/// On success sets the session cookie with the session's absolute
/// expiration. Unknown identifier and wrong password are answered
/// identically.
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, session) = state
        .auth_service
        .login(&body.identifier, &body.password)
        .await?;

    let cookie = session_cookie(&state.config.session, &session.id, session.expires_at);
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie)
            .map_err(|e| ApiError::internal_error(format!("Invalid cookie value: {}", e)))?,
    );

    Ok((headers, Json(UserResponse::from(user))))
}

/// POST /api/v1/auth/logout - Logout
///
/// Idempotent: clears the cookie whether or not a live session was behind
/// it.
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(session_id) = extract_session_cookie(&headers, &state.config.session.cookie_name) {
        state.auth_service.logout(&session_id).await?;
    }

    let clear = clear_session_cookie(&state.config.session);
    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&clear)
            .map_err(|e| ApiError::internal_error(format!("Invalid cookie value: {}", e)))?,
    );

    Ok((StatusCode::NO_CONTENT, response_headers))
}

/// GET /api/v1/auth/me - Current identity
pub(crate) async fn me(Extension(context): Extension<AuthContext>) -> Result<Json<UserResponse>, ApiError> {
    match context.user {
        Some(user) => Ok(Json(user.into())),
        None => Err(ApiError::unauthorized("Not logged in")),
    }
}

/// GET /auth/verify-email?token=... - Email verification link landing
///
/// Lands on the login page with a query flag describing the outcome, so the
/// front end can show the right banner. An unknown or consumed token is a
/// plain 400 rather than a redirect.
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Redirect, ApiError> {
    if query.token.is_empty() {
        return Err(ApiError::validation_error("Verification token is required"));
    }

    let outcome = state.auth_service.verify_email(&query.token).await?;
    let login_path = &state.config.site.login_path;

    let target = match outcome {
        EmailVerification::Verified => format!("{}?verified=success", login_path),
        EmailVerification::AlreadyVerified => format!("{}?verified=already", login_path),
    };

    Ok(Redirect::to(&target))
}

fn extract_session_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let prefix = format!("{}=", cookie_name);
    headers
        .get(header::COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| {
            s.split(';')
                .filter_map(|c| c.trim().strip_prefix(prefix.as_str()))
                .find(|v| !v.is_empty())
                .map(String::from)
        })
}
