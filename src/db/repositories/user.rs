//! User repository
//!
//! Database operations for user accounts.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite

use crate::db::DbPool;
use crate::models::{User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: &str) -> Result<Option<User>>;

    /// Get user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Get user by username
    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Get user by login identifier (username or email)
    async fn get_by_identifier(&self, identifier: &str) -> Result<Option<User>>;

    /// Get user by email verification token
    async fn get_by_verification_token(&self, token: &str) -> Result<Option<User>>;

    /// Record a successful email verification: set the timestamp and clear
    /// the one-time token
    async fn mark_email_verified(&self, id: &str, verified_at: DateTime<Utc>) -> Result<()>;

    /// Delete a user
    async fn delete(&self, id: &str) -> Result<()>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DbPool,
}

impl SqlxUserRepository {
    /// Create a new SQLx user repository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DbPool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, role,
                               email_verified_at, email_verification_token,
                               created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .bind(user.email_verified_at)
        .bind(&user.email_verification_token)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to create user")?;

        Ok(user.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        fetch_user(&self.pool, "id = ?", &[id]).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        fetch_user(&self.pool, "email = ?", &[email]).await
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        fetch_user(&self.pool, "username = ?", &[username]).await
    }

    async fn get_by_identifier(&self, identifier: &str) -> Result<Option<User>> {
        fetch_user(&self.pool, "email = ? OR username = ?", &[identifier, identifier]).await
    }

    async fn get_by_verification_token(&self, token: &str) -> Result<Option<User>> {
        fetch_user(&self.pool, "email_verification_token = ?", &[token]).await
    }

    async fn mark_email_verified(&self, id: &str, verified_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET email_verified_at = ?, email_verification_token = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(verified_at)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to mark email verified")?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete user")?;

        Ok(())
    }
}

async fn fetch_user(pool: &DbPool, predicate: &str, binds: &[&str]) -> Result<Option<User>> {
    let sql = format!(
        r#"
        SELECT id, username, email, password_hash, role,
               email_verified_at, email_verification_token, created_at, updated_at
        FROM users
        WHERE {}
        LIMIT 1
        "#,
        predicate
    );

    let mut query = sqlx::query(&sql);
    for bind in binds {
        query = query.bind(*bind);
    }

    let row = query
        .fetch_optional(pool)
        .await
        .context("Failed to fetch user")?;

    match row {
        Some(row) => Ok(Some(row_to_user(&row)?)),
        None => Ok(None),
    }
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let role: String = row.get("role");

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: UserRole::from_str(&role)?,
        email_verified_at: row.get("email_verified_at"),
        email_verification_token: row.get("email_verification_token"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
