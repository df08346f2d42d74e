//! API layer - HTTP handlers and routing
//!
//! This module contains all HTTP API endpoints for the Atelier backend:
//! - Auth API endpoints (signup, login, logout, me)
//! - Email verification landing route
//! - Browser-facing account page (redirects anonymous visitors to login)
//! - Admin API endpoints

pub mod admin;
pub mod auth;
pub mod middleware;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState};

/// Build the versioned API router
pub fn build_api_router() -> Router<AppState> {
    // Admin routes (need admin role; denial is a 403, not a redirect)
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin));

    Router::new().nest("/auth", auth::router()).merge(admin_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    // CORS must allow credentials for cookie-based auth
    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .server
                .cors_origin
                .parse::<HeaderValue>()
                .unwrap_or_else(|_| HeaderValue::from_static("http://localhost:5173")),
        )
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    // Browser-facing account page; anonymous visitors are redirected to the
    // login page rather than answered with a bare 401
    let account_routes = Router::new()
        .route("/account", get(auth::me))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_user,
        ));

    Router::new()
        .nest("/api/v1", build_api_router())
        // Verification links from emails land here, outside the versioned API
        .route("/auth/verify-email", get(auth::verify_email))
        .merge(account_routes)
        // Every request gets an AuthContext; cookie rewrites happen on the
        // way out of this layer
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::authenticate,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
