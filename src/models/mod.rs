//! Data models for the Atelier backend

pub mod auth;
pub mod session;
pub mod user;

pub use auth::{Access, AuthContext};
pub use session::Session;
pub use user::{User, UserRole};
