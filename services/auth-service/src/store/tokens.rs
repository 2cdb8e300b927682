//! Issued-token repository.
//!
//! Rows follow a soft lifecycle: they are created at issuance, flipped to
//! revoked on logout or rotation, and never physically deleted. Every
//! lookup carries the explicit `is_revoked = 0 AND deleted_at = 0`
//! predicate.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::error;
use uuid::Uuid;

use crate::error::AuthError;
use crate::services::token::TokenKind;
use crate::store::models::TokenRecord;

/// Repository for persisted token records.
#[derive(Debug, Clone)]
pub struct TokenStore {
    pool: SqlitePool,
}

impl TokenStore {
    /// Create a store backed by the given pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a token record on the given connection.
    ///
    /// Takes a connection rather than the pool so pair issuance can run both
    /// inserts inside one caller-owned transaction.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the insert fails.
    pub async fn create(
        &self,
        conn: &mut SqliteConnection,
        user_id: &str,
        token: &str,
        kind: TokenKind,
        expires_at: DateTime<Utc>,
    ) -> Result<TokenRecord, AuthError> {
        let now = Utc::now();
        let record = TokenRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            token: token.to_string(),
            kind,
            expires_at,
            is_revoked: false,
            last_used_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: 0,
        };

        sqlx::query(
            "INSERT INTO tokens \
             (id, user_id, token, kind, expires_at, is_revoked, last_used_at, created_at, updated_at, deleted_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.token)
        .bind(record.kind)
        .bind(record.expires_at)
        .bind(record.is_revoked)
        .bind(record.last_used_at)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.deleted_at)
        .execute(conn)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user_id, kind = %kind, "token insert failed");
            AuthError::Storage(e)
        })?;

        Ok(record)
    }

    /// Point lookup of a non-revoked token by value and kind.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub async fn find_active(
        &self,
        token: &str,
        kind: TokenKind,
    ) -> Result<Option<TokenRecord>, AuthError> {
        sqlx::query_as::<_, TokenRecord>(
            "SELECT * FROM tokens \
             WHERE token = ? AND kind = ? AND is_revoked = 0 AND deleted_at = 0",
        )
        .bind(token)
        .bind(kind)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, kind = %kind, "token lookup failed");
            AuthError::Storage(e)
        })
    }

    /// Conditionally revoke a token that is still active.
    ///
    /// The update is predicated on `is_revoked = 0`, so of two calls racing
    /// over the same token exactly one observes it active and flips it; the
    /// other sees no affected row. Returns whether this call flipped the
    /// flag.
    ///
    /// Generic over the executor so rotation can run inside the issuance
    /// transaction while logout uses the pool directly.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the update fails.
    pub async fn revoke_if_active<'e, E>(
        &self,
        executor: E,
        token: &str,
        kind: TokenKind,
    ) -> Result<bool, AuthError>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE tokens SET is_revoked = 1, updated_at = ? \
             WHERE token = ? AND kind = ? AND is_revoked = 0 AND deleted_at = 0",
        )
        .bind(Utc::now())
        .bind(token)
        .bind(kind)
        .execute(executor)
        .await
        .map_err(|e| {
            error!(error = %e, kind = %kind, "token revocation failed");
            AuthError::Storage(e)
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Revoke every non-revoked token of a kind belonging to a user.
    ///
    /// Returns the number of tokens revoked.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the update fails.
    pub async fn revoke_all_for_user(
        &self,
        user_id: &str,
        kind: TokenKind,
    ) -> Result<u64, AuthError> {
        let result = sqlx::query(
            "UPDATE tokens SET is_revoked = 1, updated_at = ? \
             WHERE user_id = ? AND kind = ? AND is_revoked = 0 AND deleted_at = 0",
        )
        .bind(Utc::now())
        .bind(user_id)
        .bind(kind)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user_id, kind = %kind, "bulk token revocation failed");
            AuthError::Storage(e)
        })?;

        Ok(result.rows_affected())
    }

    /// Stamp the last-used timestamp on a token record.
    ///
    /// Only ever called from the detached usage-tracking path; failures are
    /// the caller's to log.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the update fails.
    pub async fn touch_last_used(
        &self,
        record_id: &str,
        used_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        sqlx::query("UPDATE tokens SET last_used_at = ?, updated_at = ? WHERE id = ?")
            .bind(used_at)
            .bind(used_at)
            .bind(record_id)
            .execute(&self.pool)
            .await
            .map_err(AuthError::Storage)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::memory_pool;
    use crate::store::users::UserStore;
    use chrono::Duration;

    async fn seed_user(pool: &SqlitePool) -> String {
        UserStore::new(pool.clone())
            .create("alice", "a@x.com", "$hash$")
            .await
            .unwrap()
            .id
    }

    async fn insert_token(
        store: &TokenStore,
        pool: &SqlitePool,
        user_id: &str,
        token: &str,
        kind: TokenKind,
    ) -> TokenRecord {
        let mut conn = pool.acquire().await.unwrap();
        store
            .create(&mut conn, user_id, token, kind, Utc::now() + Duration::hours(1))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_find_active() {
        let pool = memory_pool().await;
        let user_id = seed_user(&pool).await;
        let store = TokenStore::new(pool.clone());

        let record = insert_token(&store, &pool, &user_id, "tok-1", TokenKind::Access).await;
        assert!(!record.is_revoked);

        let found = store
            .find_active("tok-1", TokenKind::Access)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, record.id);
        assert_eq!(found.kind, TokenKind::Access);

        // Wrong kind does not match.
        assert!(store
            .find_active("tok-1", TokenKind::Refresh)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_revoke_if_active_is_single_shot() {
        let pool = memory_pool().await;
        let user_id = seed_user(&pool).await;
        let store = TokenStore::new(pool.clone());
        insert_token(&store, &pool, &user_id, "tok-1", TokenKind::Refresh).await;

        assert!(store
            .revoke_if_active(&pool, "tok-1", TokenKind::Refresh)
            .await
            .unwrap());
        // Second attempt finds no active row.
        assert!(!store
            .revoke_if_active(&pool, "tok-1", TokenKind::Refresh)
            .await
            .unwrap());
        assert!(store
            .find_active("tok-1", TokenKind::Refresh)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_revoke_all_for_user_spares_other_kinds() {
        let pool = memory_pool().await;
        let user_id = seed_user(&pool).await;
        let store = TokenStore::new(pool.clone());

        insert_token(&store, &pool, &user_id, "access-1", TokenKind::Access).await;
        insert_token(&store, &pool, &user_id, "refresh-1", TokenKind::Refresh).await;
        insert_token(&store, &pool, &user_id, "refresh-2", TokenKind::Refresh).await;

        let revoked = store
            .revoke_all_for_user(&user_id, TokenKind::Refresh)
            .await
            .unwrap();
        assert_eq!(revoked, 2);

        assert!(store
            .find_active("refresh-1", TokenKind::Refresh)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_active("access-1", TokenKind::Access)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_touch_last_used() {
        let pool = memory_pool().await;
        let user_id = seed_user(&pool).await;
        let store = TokenStore::new(pool.clone());
        let record = insert_token(&store, &pool, &user_id, "tok-1", TokenKind::Access).await;

        store.touch_last_used(&record.id, Utc::now()).await.unwrap();

        let reloaded = store
            .find_active("tok-1", TokenKind::Access)
            .await
            .unwrap()
            .unwrap();
        assert!(reloaded.last_used_at.is_some());
    }
}
