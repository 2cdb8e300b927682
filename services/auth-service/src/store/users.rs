//! User credential repository.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::error;
use uuid::Uuid;

use crate::error::AuthError;
use crate::store::models::{User, UserStatus};

/// Repository for user credential records.
#[derive(Debug, Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

impl UserStore {
    /// Create a store backed by the given pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an active user with the given credentials.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the insert fails (including uniqueness
    /// violations that slipped past the existence checks).
    pub async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, AuthError> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            status: UserStatus::Active,
            last_login_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: 0,
        };

        sqlx::query(
            "INSERT INTO users \
             (id, username, email, password_hash, status, last_login_at, created_at, updated_at, deleted_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.status)
        .bind(user.last_login_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, username, "user insert failed");
            AuthError::Storage(e)
        })?;

        Ok(user)
    }

    /// Look up a live user by email.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ? AND deleted_at = 0")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, email, "user lookup by email failed");
                AuthError::Storage(e)
            })
    }

    /// Look up a live user by id.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, AuthError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ? AND deleted_at = 0")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!(error = %e, user_id = %id, "user lookup by id failed");
                AuthError::Storage(e)
            })
    }

    /// Whether a live user with this username exists.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub async fn exists_by_username(&self, username: &str) -> Result<bool, AuthError> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ? AND deleted_at = 0)",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, username, "username existence check failed");
            AuthError::Storage(e)
        })?;
        Ok(exists != 0)
    }

    /// Whether a live user with this email exists.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub async fn exists_by_email(&self, email: &str) -> Result<bool, AuthError> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ? AND deleted_at = 0)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, email, "email existence check failed");
            AuthError::Storage(e)
        })?;
        Ok(exists != 0)
    }

    /// Stamp the last-login timestamp. Callers treat failure as non-fatal.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the update fails.
    pub async fn update_last_login(&self, user_id: &str) -> Result<(), AuthError> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE users SET last_login_at = ?, updated_at = ? WHERE id = ? AND deleted_at = 0",
        )
        .bind(now)
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user_id, "last-login update failed");
            AuthError::Storage(e)
        })?;
        Ok(())
    }

    /// Soft-delete a user by stamping the sentinel. Returns whether a live
    /// row was affected.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the update fails.
    pub async fn soft_delete(&self, user_id: &str) -> Result<bool, AuthError> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE users SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at = 0",
        )
        .bind(now.timestamp_millis())
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user_id, "user soft delete failed");
            AuthError::Storage(e)
        })?;
        Ok(result.rows_affected() > 0)
    }
}
