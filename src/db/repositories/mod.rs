//! Repository layer
//!
//! Trait-based data access. Services depend on the traits (`Arc<dyn ...>`),
//! so tests can substitute fakes and the SQL stays in one place.

pub mod session;
pub mod user;

pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
