//! Per-request authentication context
//!
//! The authenticator resolves every inbound request to an `AuthContext` that
//! downstream handlers read from the request extensions. Handlers never see
//! exceptions from authentication; an unresolvable identity is simply
//! anonymous, and callers that require authorization must check the context
//! explicitly.

use crate::models::User;

/// The per-request trust decision: resolved identity plus admin flag.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    /// The resolved user, if any
    pub user: Option<User>,
    /// Whether the resolved user holds the administrator role
    pub is_admin: bool,
}

impl AuthContext {
    /// An unauthenticated context
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A context for a resolved user; the admin flag is derived from the role.
    pub fn for_user(user: User) -> Self {
        let is_admin = user.is_admin();
        Self {
            user: Some(user),
            is_admin,
        }
    }

    /// Whether a user was resolved
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Access decision for pages that require a signed-in user. Anonymous
    /// visitors are sent to the login page.
    pub fn require_user(&self, login_path: &str) -> Access {
        if self.is_authenticated() {
            Access::Continue
        } else {
            Access::RedirectTo(login_path.to_string())
        }
    }

    /// Access decision for operations that require the administrator role.
    /// Always answers Forbidden rather than a redirect, so protected
    /// resources do not leak their existence.
    pub fn require_admin(&self) -> Access {
        if self.is_admin {
            Access::Continue
        } else {
            Access::Forbidden
        }
    }
}

/// Outcome of a route-level access check. The caller dispatches on the
/// variant; no control flow happens through errors or thrown redirects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Proceed to the handler
    Continue,
    /// Send the visitor to another page
    RedirectTo(String),
    /// Refuse with a 403-class answer
    Forbidden,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;

    fn make_user(role: UserRole) -> User {
        let mut user = User::new(
            "painter".to_string(),
            "painter@example.com".to_string(),
            "hash".to_string(),
        );
        user.role = role;
        user
    }

    #[test]
    fn test_anonymous_context() {
        let ctx = AuthContext::anonymous();
        assert!(!ctx.is_authenticated());
        assert!(!ctx.is_admin);
        assert_eq!(ctx.require_admin(), Access::Forbidden);
        assert_eq!(
            ctx.require_user("/login"),
            Access::RedirectTo("/login".to_string())
        );
    }

    #[test]
    fn test_ordinary_user_context() {
        let ctx = AuthContext::for_user(make_user(UserRole::User));
        assert!(ctx.is_authenticated());
        assert!(!ctx.is_admin);
        assert_eq!(ctx.require_user("/login"), Access::Continue);
        assert_eq!(ctx.require_admin(), Access::Forbidden);
    }

    #[test]
    fn test_admin_context() {
        let ctx = AuthContext::for_user(make_user(UserRole::Admin));
        assert!(ctx.is_admin);
        assert_eq!(ctx.require_admin(), Access::Continue);
    }
}
