//! Session model
//!
//! A session binds an opaque token to a user for a bounded time window. A
//! session past its expiration is treated as nonexistent; detection is lazy,
//! on the next lookup.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session entity for cookie-based authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session ID (unguessable opaque token)
    pub id: String,
    /// Associated user ID
    pub user_id: String,
    /// Absolute expiration timestamp
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Transient per-request flag: set when this lookup extended the
    /// expiration, so the cookie gets rewritten after the response. Never
    /// persisted.
    #[serde(skip)]
    pub fresh: bool,
}

impl Session {
    /// Create a new session for the given user, valid for `lifetime` from now.
    pub fn new(user_id: &str, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            expires_at: now + lifetime,
            created_at: now,
            fresh: false,
        }
    }

    /// Check if the session has expired as of `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Check whether more than half of the session lifetime has elapsed as of
    /// `now`, which is the trigger for extending the expiration.
    pub fn needs_renewal_at(&self, now: DateTime<Utc>, lifetime: Duration) -> bool {
        now >= self.expires_at - lifetime / 2
    }
}
