//! Core services: session lifecycle, token codec, password hashing.

pub mod auth;
pub mod password;
pub mod token;

pub use auth::{AuthService, TokenPair};
pub use password::PasswordHasher;
pub use token::{Claims, TokenCodec, TokenKind};
