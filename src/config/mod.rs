//! Configuration management
//!
//! This module handles loading and parsing configuration for the Atelier
//! backend. Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults. A missing or
//! unreachable database is *not* defaulted away: the pool factory fails the
//! boot instead.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Session configuration
    #[serde(default)]
    pub session: SessionConfig,
    /// Trusted-proxy identity header configuration
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// Outbound email (SMTP) configuration
    #[serde(default)]
    pub email: EmailConfig,
    /// Public site information used in links and mail copy
    #[serde(default)]
    pub site: SiteConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:5173".to_string()
}

/// Database configuration (SQLite)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path or connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/atelier.db".to_string()
}

/// Session lifecycle and cookie configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session lifetime in days; renewal happens once less than half of the
    /// lifetime remains
    #[serde(default = "default_lifetime_days")]
    pub lifetime_days: i64,
    /// Name of the session cookie
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Whether the session cookie carries the Secure attribute. Disable only
    /// for plain-HTTP local development.
    #[serde(default = "default_cookie_secure")]
    pub cookie_secure: bool,
    /// Budget for each session-store call made during request authentication,
    /// in milliseconds. A store that does not answer within this budget is
    /// treated as "no identity" for the request.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime_days: default_lifetime_days(),
            cookie_name: default_cookie_name(),
            cookie_secure: default_cookie_secure(),
            store_timeout_ms: default_store_timeout_ms(),
        }
    }
}

fn default_lifetime_days() -> i64 {
    30
}

fn default_cookie_name() -> String {
    "session".to_string()
}

fn default_cookie_secure() -> bool {
    true
}

fn default_store_timeout_ms() -> u64 {
    3000
}

/// Trusted-proxy identity headers.
///
/// These headers are injected by an upstream access-control layer that the
/// application trusts verbatim. They are consumed read-only and never set by
/// this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Header carrying an asserted email address
    #[serde(default = "default_email_header")]
    pub email_header: String,
    /// Header carrying a compact signed token whose payload exposes an email
    /// or subject claim
    #[serde(default = "default_jwt_header")]
    pub jwt_header: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            email_header: default_email_header(),
            jwt_header: default_jwt_header(),
        }
    }
}

fn default_email_header() -> String {
    "x-auth-user-email".to_string()
}

fn default_jwt_header() -> String {
    "x-auth-jwt-assertion".to_string()
}

/// SMTP configuration for outbound mail
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailConfig {
    /// SMTP relay host; empty disables outbound mail
    #[serde(default)]
    pub smtp_host: String,
    /// SMTP port
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// SMTP username
    #[serde(default)]
    pub smtp_username: String,
    /// SMTP password
    #[serde(default)]
    pub smtp_password: String,
    /// From address for outbound mail
    #[serde(default)]
    pub from_address: String,
    /// Display name for the From header
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_name() -> String {
    "Atelier".to_string()
}

/// Public site information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site display name
    #[serde(default = "default_site_name")]
    pub name: String,
    /// Public base URL, used to build verification links
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path of the front-end login page (verification redirects land here)
    #[serde(default = "default_login_path")]
    pub login_path: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: default_site_name(),
            base_url: default_base_url(),
            login_path: default_login_path(),
        }
    }
}

fn default_site_name() -> String {
    "Atelier".to_string()
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_login_path() -> String {
    "/login".to_string()
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
}

impl Config {
    /// Load configuration from file.
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides.
    ///
    /// Environment variables follow the pattern:
    /// - ATELIER_SERVER_HOST
    /// - ATELIER_SERVER_PORT
    /// - ATELIER_DATABASE_URL
    /// - ATELIER_SESSION_LIFETIME_DAYS
    /// - ATELIER_SESSION_COOKIE_SECURE
    /// - ATELIER_SMTP_HOST / ATELIER_SMTP_USERNAME / ATELIER_SMTP_PASSWORD
    /// - ATELIER_SITE_BASE_URL
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("ATELIER_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("ATELIER_SERVER_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(url) = std::env::var("ATELIER_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(days) = std::env::var("ATELIER_SESSION_LIFETIME_DAYS") {
            if let Ok(days) = days.parse() {
                self.session.lifetime_days = days;
            }
        }
        if let Ok(secure) = std::env::var("ATELIER_SESSION_COOKIE_SECURE") {
            self.session.cookie_secure = secure == "true" || secure == "1";
        }
        if let Ok(host) = std::env::var("ATELIER_SMTP_HOST") {
            self.email.smtp_host = host;
        }
        if let Ok(username) = std::env::var("ATELIER_SMTP_USERNAME") {
            self.email.smtp_username = username;
        }
        if let Ok(password) = std::env::var("ATELIER_SMTP_PASSWORD") {
            self.email.smtp_password = password;
        }
        if let Ok(url) = std::env::var("ATELIER_SITE_BASE_URL") {
            self.site.base_url = url;
        }
    }
}
