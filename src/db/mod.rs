//! Database layer
//!
//! SQLite access for the Atelier backend: pool creation, code-embedded
//! migrations and the repository implementations.
//!
//! # Usage
//!
//! ```ignore
//! use atelier::config::DatabaseConfig;
//! use atelier::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool, DbPool};
