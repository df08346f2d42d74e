//! API middleware
//!
//! Contains middleware for:
//! - Authentication (resolving each request to an `AuthContext`)
//! - Authorization (admin gating)
//!
//! Authentication never rejects a request; it attaches a context (possibly
//! anonymous) and defers any session-cookie rewrite until after the handler
//! has produced its response. Authorization middleware reads that context.

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{Config, SessionConfig};
use crate::models::{Access, AuthContext};
use crate::services::{AuthError, AuthService, CookieUpdate, EmailService};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub email_service: Arc<EmailService>,
    pub config: Arc<Config>,
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "EMAIL_NOT_VERIFIED" => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::unauthorized(err.to_string()),
            AuthError::EmailNotVerified => ApiError::new("EMAIL_NOT_VERIFIED", err.to_string()),
            AuthError::ValidationError(msg) => ApiError::validation_error(msg),
            AuthError::UserExists(msg) => ApiError::conflict(msg),
            AuthError::InvalidToken => ApiError::validation_error(err.to_string()),
            AuthError::InternalError(e) => {
                tracing::error!("internal error: {e:#}");
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

/// Authentication middleware.
///
/// Attaches the resolved [`AuthContext`] to the request extensions and, once
/// the handler has run, applies the deferred cookie update to the response.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let outcome = state.auth_service.authenticate(request.headers()).await;
    let cookie = outcome.cookie;
    request.extensions_mut().insert(outcome.context);

    let mut response = next.run(request).await;
    apply_cookie_update(&mut response, &cookie, &state.config.session);
    response
}

/// Apply a deferred session-cookie update to a response.
fn apply_cookie_update(response: &mut Response, update: &CookieUpdate, cfg: &SessionConfig) {
    let cookie = match update {
        CookieUpdate::Keep => return,
        CookieUpdate::Clear => clear_session_cookie(cfg),
        CookieUpdate::Renew {
            session_id,
            expires_at,
        } => session_cookie(cfg, session_id, *expires_at),
    };

    // A Set-Cookie for the session written by the handler (login's fresh
    // session, logout's clear) reflects a newer store state than the decision
    // made on the way in; the deferred update is stale and must not follow
    // it, or the browser would honor the stale one.
    let prefix = format!("{}=", cfg.cookie_name);
    let handler_set_session = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .any(|v| v.to_str().map(|s| s.starts_with(&prefix)).unwrap_or(false));
    if handler_set_session {
        return;
    }

    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            // Append rather than insert so unrelated handler cookies survive
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => {
            tracing::warn!("failed to build session cookie header: {}", e);
        }
    }
}

/// Signed-in gate for browser-facing pages. Anonymous visitors are sent to
/// the configured login page instead of receiving a bare error.
pub async fn require_user(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let context = request
        .extensions()
        .get::<AuthContext>()
        .cloned()
        .unwrap_or_else(AuthContext::anonymous);

    match context.require_user(&state.config.site.login_path) {
        Access::Continue => next.run(request).await,
        Access::RedirectTo(path) => Redirect::to(&path).into_response(),
        Access::Forbidden => ApiError::forbidden("Not allowed").into_response(),
    }
}

/// Admin authorization middleware. Answers 403, never a redirect, so an API
/// client sees the denial instead of a login page.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let context = request
        .extensions()
        .get::<AuthContext>()
        .cloned()
        .unwrap_or_else(AuthContext::anonymous);

    match context.require_admin() {
        Access::Continue => Ok(next.run(request).await),
        _ => Err(ApiError::forbidden("Admin privileges required")),
    }
}

/// Build the session cookie with an absolute expiration
pub fn session_cookie(cfg: &SessionConfig, session_id: &str, expires_at: DateTime<Utc>) -> String {
    format!(
        "{}={}; Path=/; HttpOnly;{} SameSite=Lax; Expires={}",
        cfg.cookie_name,
        session_id,
        if cfg.cookie_secure { " Secure;" } else { "" },
        expires_at.format("%a, %d %b %Y %H:%M:%S GMT")
    )
}

/// Build a cookie that removes the session cookie from the browser
pub fn clear_session_cookie(cfg: &SessionConfig) -> String {
    format!(
        "{}=; Path=/; HttpOnly;{} SameSite=Lax; Max-Age=0",
        cfg.cookie_name,
        if cfg.cookie_secure { " Secure;" } else { "" }
    )
}
