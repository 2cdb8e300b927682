//! Persisted entity models.
//!
//! Both entities carry the shared audit columns (`created_at`, `updated_at`)
//! and the soft-delete sentinel (`deleted_at`, milliseconds, `0` = live) as
//! plain fields. There is no interceptor rewriting queries: every read in
//! the store filters `deleted_at = 0` explicitly, and deletion is an
//! explicit repository method, never an intercepted row delete.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::token::TokenKind;

/// Account status of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UserStatus {
    /// Account may authenticate.
    Active,
    /// Account exists but may not authenticate.
    Inactive,
    /// Account has been suspended by an administrator.
    Suspended,
}

/// A user credential record.
///
/// Owned by the user-management side of the system; the auth core reads it
/// and compares password hashes.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique identifier.
    pub id: String,
    /// Unique username.
    pub username: String,
    /// Unique email address.
    pub email: String,
    /// Argon2 PHC hash of the password.
    pub password_hash: String,
    /// Account status.
    pub status: UserStatus,
    /// Last successful login, if any.
    pub last_login_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete sentinel in milliseconds, `0` when live.
    pub deleted_at: i64,
}

impl User {
    /// Whether the account may authenticate.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// A persisted record of an issued token.
///
/// The token string is immutable once issued; only `is_revoked` and
/// `last_used_at` ever change. Rows are never physically deleted.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TokenRecord {
    /// Unique identifier.
    pub id: String,
    /// Owning user id.
    pub user_id: String,
    /// The signed token string.
    pub token: String,
    /// Token kind.
    pub kind: TokenKind,
    /// Expiry timestamp.
    pub expires_at: DateTime<Utc>,
    /// Whether the token has been revoked.
    pub is_revoked: bool,
    /// Last authenticated use, if any.
    pub last_used_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Soft-delete sentinel in milliseconds, `0` when live.
    pub deleted_at: i64,
}
