//! Auth service for Vantage Admin.
//!
//! Issues paired access/refresh tokens, persists and revokes them, and
//! validates the bearer token presented on every protected request.
//! Refresh tokens are single-use: each refresh rotates the pair and
//! consumes the presented token atomically.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod store;

/// Shared state for the HTTP layer.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Session lifecycle service.
    pub auth: services::AuthService,
}

// Re-export key types for convenience
pub use config::AuthConfig;
pub use error::AuthError;
pub use services::{AuthService, Claims, TokenCodec, TokenKind, TokenPair};
pub use store::{TokenRecord, User, UserStatus};
