//! Business logic services

pub mod auth;
pub mod email;
pub mod password;

pub use auth::{AuthError, AuthOutcome, AuthService, CookieUpdate, EmailVerification};
pub use email::EmailService;
