//! Authentication service
//!
//! Resolves every inbound request to an [`AuthContext`] and owns the
//! credential lifecycle: login, signup, logout and email verification.
//!
//! `authenticate` never fails a request. Malformed identity headers, missing
//! cookies, unknown or expired sessions and session-store outages all degrade
//! to an anonymous context; they are logged here and nowhere else. Callers
//! that need authorization check the context themselves.
//!
//! Session lifecycle: a session is created at login, extended once more than
//! half of its lifetime has elapsed at request time (to a fresh absolute
//! `now + lifetime`, so racing renewals are idempotent), and removed lazily
//! when a lookup finds it expired or orphaned, or eagerly at logout.

use crate::config::{ProxyConfig, SessionConfig};
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{AuthContext, Session, User};
use crate::services::password::{hash_password, verify_password};
use anyhow::{anyhow, Context, Result};
use axum::http::HeaderMap;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use std::sync::Arc;

/// Error types for credential operations.
///
/// `InvalidCredentials` is deliberately shared between "unknown identifier"
/// and "wrong password" so the login endpoint cannot be used as an account
/// oracle.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Login failed (wrong identifier or wrong password, indistinguishable)
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Login attempted before the email address was verified
    #[error("Please verify your email first")]
    EmailNotVerified,

    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Username or email already registered
    #[error("User already exists: {0}")]
    UserExists(String),

    /// Unknown or already-consumed verification token
    #[error("Invalid or expired verification token")]
    InvalidToken,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// What the middleware should do to the session cookie once the response
/// body has been produced. The cookie is never touched on the request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieUpdate {
    /// Leave the cookie alone
    Keep,
    /// Replace the cookie with an immediately-expired one
    Clear,
    /// Rewrite the cookie with a renewed expiration
    Renew {
        session_id: String,
        expires_at: DateTime<Utc>,
    },
}

/// Result of authenticating one request
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    /// The trust decision handlers read
    pub context: AuthContext,
    /// Deferred cookie side effect
    pub cookie: CookieUpdate,
    /// The validated session, when the identity came from the cookie. Carries
    /// the `fresh` flag after a renewal. Proxy-asserted identities have none.
    pub session: Option<Session>,
}

impl AuthOutcome {
    fn anonymous(cookie: CookieUpdate) -> Self {
        Self {
            context: AuthContext::anonymous(),
            cookie,
            session: None,
        }
    }
}

/// Outcome of following an email verification link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailVerification {
    /// The email was verified just now
    Verified,
    /// The email had already been verified earlier
    AlreadyVerified,
}

/// Authentication service
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
    session_cfg: SessionConfig,
    proxy_cfg: ProxyConfig,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        session_cfg: SessionConfig,
        proxy_cfg: ProxyConfig,
    ) -> Self {
        Self {
            users,
            sessions,
            session_cfg,
            proxy_cfg,
        }
    }

    /// Configured session lifetime
    pub fn lifetime(&self) -> Duration {
        Duration::days(self.session_cfg.lifetime_days)
    }

    fn store_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.session_cfg.store_timeout_ms)
    }

    /// Run one store call under the configured budget, so a hanging store
    /// degrades the request to anonymous instead of stalling it.
    async fn store_call<T>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.store_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!(
                "{} did not answer within {}ms",
                what,
                self.session_cfg.store_timeout_ms
            )),
        }
    }

    /// Resolve the request's identity.
    ///
    /// See [`authenticate_at`](Self::authenticate_at); this uses the current
    /// time.
    pub async fn authenticate(&self, headers: &HeaderMap) -> AuthOutcome {
        self.authenticate_at(headers, Utc::now()).await
    }

    /// Resolve the request's identity as of `now`.
    ///
    /// Order of resolution:
    /// 1. Trusted-proxy identity headers. A matching pre-existing account
    ///    wins outright and the session store is never consulted. Accounts
    ///    are never provisioned from a header.
    /// 2. The session cookie. Absent cookie means anonymous.
    /// 3. Session validation: unknown, expired and orphaned sessions are
    ///    removed and answered with a cookie clear; a valid session past its
    ///    half-life is extended and the cookie rewrite deferred to the
    ///    response phase.
    pub async fn authenticate_at(&self, headers: &HeaderMap, now: DateTime<Utc>) -> AuthOutcome {
        // Step 1: trusted-proxy bypass
        if let Some(email) = self.proxy_identity(headers) {
            match self
                .store_call("user lookup", self.users.get_by_email(&email))
                .await
            {
                Ok(Some(user)) => {
                    tracing::debug!(username = %user.username, "identity from trusted proxy");
                    return AuthOutcome {
                        context: AuthContext::for_user(user),
                        cookie: CookieUpdate::Keep,
                        session: None,
                    };
                }
                Ok(None) => {
                    tracing::debug!("proxy identity has no matching account");
                }
                Err(e) => {
                    tracing::warn!("user lookup for proxy identity failed: {e:#}");
                }
            }
        }

        // Step 2: session cookie
        let Some(session_id) = session_cookie_value(headers, &self.session_cfg.cookie_name) else {
            return AuthOutcome::anonymous(CookieUpdate::Keep);
        };

        // Step 3: session validation
        let session = match self
            .store_call("session lookup", self.sessions.get_by_id(&session_id))
            .await
        {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("session lookup failed: {e:#}");
                return AuthOutcome::anonymous(CookieUpdate::Keep);
            }
        };

        let Some(mut session) = session else {
            return AuthOutcome::anonymous(CookieUpdate::Clear);
        };

        if session.is_expired_at(now) {
            self.discard_session(&session.id).await;
            return AuthOutcome::anonymous(CookieUpdate::Clear);
        }

        let user = match self
            .store_call("user lookup", self.users.get_by_id(&session.user_id))
            .await
        {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!("user lookup for session failed: {e:#}");
                return AuthOutcome::anonymous(CookieUpdate::Keep);
            }
        };

        let Some(user) = user else {
            // Account deleted out from under the session
            self.discard_session(&session.id).await;
            return AuthOutcome::anonymous(CookieUpdate::Clear);
        };

        let mut cookie = CookieUpdate::Keep;
        if session.needs_renewal_at(now, self.lifetime()) {
            let new_expiry = now + self.lifetime();
            match self
                .store_call("session renewal", self.sessions.extend(&session.id, new_expiry))
                .await
            {
                Ok(()) => {
                    session.expires_at = new_expiry;
                    session.fresh = true;
                    cookie = CookieUpdate::Renew {
                        session_id: session.id.clone(),
                        expires_at: new_expiry,
                    };
                }
                Err(e) => {
                    // Renewal is best-effort; the session stays valid on its
                    // old expiration
                    tracing::warn!("session renewal failed: {e:#}");
                }
            }
        }

        AuthOutcome {
            context: AuthContext::for_user(user),
            cookie,
            session: Some(session),
        }
    }

    /// Best-effort removal of a dead session row
    async fn discard_session(&self, session_id: &str) {
        if let Err(e) = self
            .store_call("session delete", self.sessions.delete(session_id))
            .await
        {
            tracing::warn!("failed to remove dead session: {e:#}");
        }
    }

    /// Extract an asserted identity email from the trusted-proxy headers.
    ///
    /// The email header wins if present; otherwise the compact signed-token
    /// header is decoded (payload only, the upstream proxy already verified
    /// the signature). Decode failures are logged and treated as no identity.
    fn proxy_identity(&self, headers: &HeaderMap) -> Option<String> {
        if let Some(email) = headers
            .get(self.proxy_cfg.email_header.as_str())
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
        {
            return Some(email.to_string());
        }

        let token = headers
            .get(self.proxy_cfg.jwt_header.as_str())
            .and_then(|v| v.to_str().ok())?;

        match decode_token_email(token) {
            Ok(email) => Some(email),
            Err(e) => {
                tracing::warn!("failed to decode proxy identity token: {e:#}");
                None
            }
        }
    }

    /// Login with an identifier (username or email) and password.
    ///
    /// On success a new session is created. Unknown identifier and wrong
    /// password produce the same error; an unverified email is reported
    /// separately since the account holder already proved the credentials.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<(User, Session), AuthError> {
        if identifier.is_empty() || password.is_empty() {
            return Err(AuthError::ValidationError(
                "Identifier and password are required".to_string(),
            ));
        }

        let user = self
            .users
            .get_by_identifier(identifier)
            .await
            .context("Failed to look up user")?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_verified() {
            return Err(AuthError::EmailNotVerified);
        }

        let session = Session::new(&user.id, self.lifetime());
        let session = self
            .sessions
            .create(&session)
            .await
            .context("Failed to create session")?;

        tracing::info!(username = %user.username, "login");
        Ok((user, session))
    }

    /// Register a new, unverified account.
    ///
    /// The returned user carries the one-time verification token; the caller
    /// is responsible for mailing the link.
    pub async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        if username.trim().is_empty() || email.trim().is_empty() {
            return Err(AuthError::ValidationError(
                "All fields required".to_string(),
            ));
        }
        if !email.contains('@') {
            return Err(AuthError::ValidationError(
                "Invalid email address".to_string(),
            ));
        }
        if password.len() < 8 {
            return Err(AuthError::ValidationError(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        if self
            .users
            .get_by_username(username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(AuthError::UserExists(format!(
                "Username '{}' is already taken",
                username
            )));
        }

        if self
            .users
            .get_by_email(email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(AuthError::UserExists(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let password_hash = hash_password(password).context("Failed to hash password")?;
        let user = User::new(username.to_string(), email.to_string(), password_hash);

        let created = self
            .users
            .create(&user)
            .await
            .context("Failed to create user")?;

        tracing::info!(username = %created.username, "signup");
        Ok(created)
    }

    /// Consume an email verification token.
    pub async fn verify_email(&self, token: &str) -> Result<EmailVerification, AuthError> {
        let user = self
            .users
            .get_by_verification_token(token)
            .await
            .context("Failed to look up verification token")?
            .ok_or(AuthError::InvalidToken)?;

        if user.is_verified() {
            return Ok(EmailVerification::AlreadyVerified);
        }

        self.users
            .mark_email_verified(&user.id, Utc::now())
            .await
            .context("Failed to mark email verified")?;

        tracing::info!(email = %user.email, "email verified");
        Ok(EmailVerification::Verified)
    }

    /// Delete a session so a subsequent lookup with the same identifier
    /// finds nothing.
    pub async fn logout(&self, session_id: &str) -> Result<(), AuthError> {
        self.sessions
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Remove all expired session rows. Expiry detection is otherwise lazy;
    /// this exists for operational cleanup, not a background job.
    pub async fn purge_expired_sessions(&self) -> Result<i64, AuthError> {
        let deleted = self
            .sessions
            .delete_expired(Utc::now())
            .await
            .context("Failed to purge expired sessions")?;
        Ok(deleted)
    }
}

/// Read the session cookie out of the request headers.
fn session_cookie_value(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let prefix = format!("{}=", cookie_name);
    for header in headers.get_all(axum::http::header::COOKIE) {
        let Ok(cookie_str) = header.to_str() else {
            continue;
        };
        for cookie in cookie_str.split(';') {
            if let Some(value) = cookie.trim().strip_prefix(&prefix) {
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Decode the payload segment of a compact signed token and pull out the
/// `email` claim (falling back to `sub`). No signature check happens here.
fn decode_token_email(token: &str) -> Result<String> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| anyhow!("token has no payload segment"))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .context("token payload is not valid base64")?;

    let claims: serde_json::Value =
        serde_json::from_slice(&bytes).context("token payload is not valid JSON")?;

    claims
        .get("email")
        .and_then(|v| v.as_str())
        .or_else(|| claims.get("sub").and_then(|v| v.as_str()))
        .map(str::to_string)
        .ok_or_else(|| anyhow!("token payload has no email or sub claim"))
}
