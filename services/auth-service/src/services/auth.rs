//! Session lifecycle service.
//!
//! Orchestrates registration, login, token refresh, logout, and
//! request-time authentication over the password hasher, token codec, and
//! the user/token stores. The service holds no mutable in-memory state;
//! all coordination is pushed to the backing store's transactional
//! guarantees, so operations are safe to run concurrently.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, error, warn};

use crate::config::{JwtConfig, PasswordConfig};
use crate::error::AuthError;
use crate::services::password::PasswordHasher;
use crate::services::token::{TokenCodec, TokenKind};
use crate::store::{TokenRecord, TokenStore, User, UserStore};

/// Minimum accepted password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Budget for the detached last-used write, independent of the original
/// request's cancellation.
const LAST_USED_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// A freshly issued access/refresh token pair.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    /// Signed access token.
    pub access_token: String,
    /// Signed refresh token.
    pub refresh_token: String,
    /// Access token expiry, unix seconds.
    pub expires_at: i64,
}

/// The session lifecycle service.
#[derive(Debug, Clone)]
pub struct AuthService {
    pool: SqlitePool,
    users: UserStore,
    tokens: TokenStore,
    hasher: PasswordHasher,
    codec: TokenCodec,
}

impl AuthService {
    /// Build the service from its backing pool and configuration.
    ///
    /// Configuration is taken by value here and nowhere else; there is no
    /// ambient secret lookup at call time.
    #[must_use]
    pub fn new(pool: SqlitePool, jwt: &JwtConfig, password: &PasswordConfig) -> Self {
        Self {
            users: UserStore::new(pool.clone()),
            tokens: TokenStore::new(pool.clone()),
            hasher: PasswordHasher::from_config(password),
            codec: TokenCodec::new(jwt),
            pool,
        }
    }

    /// Register a new user and start their first session.
    ///
    /// # Errors
    ///
    /// Returns a validation error for short passwords, a conflict error for
    /// duplicate username/email, or a storage error.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<TokenPair, AuthError> {
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        if self.users.exists_by_email(email).await? {
            return Err(AuthError::Conflict("email already registered"));
        }
        if self.users.exists_by_username(username).await? {
            return Err(AuthError::Conflict("username already taken"));
        }

        let password_hash = self.hasher.hash(password)?;
        let user = self.users.create(username, email, &password_hash).await?;
        let pair = self.issue_token_pair(&user.id, None).await?;

        // Registration doubles as the first login; failure to stamp it must
        // not fail the registration.
        if let Err(e) = self.users.update_last_login(&user.id).await {
            warn!(error = %e, user_id = %user.id, "last-login update failed after registration");
        }

        debug!(user_id = %user.id, username, "user registered");
        Ok(pair)
    }

    /// Authenticate credentials and start a session.
    ///
    /// Unknown email and wrong password produce the identical unauthorized
    /// error, so callers cannot probe which emails exist.
    ///
    /// # Errors
    ///
    /// Returns unauthorized for bad credentials, forbidden for non-active
    /// accounts, or a storage error.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            warn!(email, "login failed: email not found");
            return Err(AuthError::unauthorized("email not found"));
        };

        Self::ensure_active(&user)?;

        if !self.hasher.verify(password, &user.password_hash) {
            warn!(user_id = %user.id, "login failed: wrong password");
            return Err(AuthError::unauthorized("wrong password"));
        }

        if let Err(e) = self.users.update_last_login(&user.id).await {
            warn!(error = %e, user_id = %user.id, "last-login update failed");
        }

        let pair = self.issue_token_pair(&user.id, None).await?;
        debug!(user_id = %user.id, "login succeeded");
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair, consuming it.
    ///
    /// Rotation is atomic with issuance: of two calls racing over the same
    /// refresh token, exactly one commits a new pair; the other observes
    /// the token already rotated and fails unauthorized.
    ///
    /// # Errors
    ///
    /// Returns unauthorized for invalid, expired, revoked, or already
    /// rotated tokens, forbidden for non-active accounts, or a storage
    /// error.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.codec.validate(refresh_token, TokenKind::Refresh)?;

        if self
            .tokens
            .find_active(refresh_token, TokenKind::Refresh)
            .await?
            .is_none()
        {
            warn!(user_id = %claims.sub, "refresh failed: token not found or revoked");
            return Err(AuthError::unauthorized("refresh token not found or revoked"));
        }

        let Some(user) = self.users.find_by_id(&claims.sub).await? else {
            warn!(user_id = %claims.sub, "refresh failed: token owner no longer exists");
            return Err(AuthError::unauthorized("user not found"));
        };
        Self::ensure_active(&user)?;

        let pair = self.issue_token_pair(&user.id, Some(refresh_token)).await?;
        debug!(user_id = %user.id, "refresh token rotated");
        Ok(pair)
    }

    /// End the session the access token belongs to.
    ///
    /// Revokes the presented access token and every outstanding refresh
    /// token of its owner, closing all refresh chains even though only one
    /// access token was presented.
    ///
    /// # Errors
    ///
    /// Returns unauthorized if the access token fails validation, or a
    /// storage error.
    pub async fn logout(&self, access_token: &str) -> Result<(), AuthError> {
        let claims = self.codec.validate(access_token, TokenKind::Access)?;

        let revoked = self
            .tokens
            .revoke_if_active(&self.pool, access_token, TokenKind::Access)
            .await?;
        if !revoked {
            debug!(user_id = %claims.sub, "access token was already revoked or never stored");
        }

        let refresh_revoked = self
            .tokens
            .revoke_all_for_user(&claims.sub, TokenKind::Refresh)
            .await?;

        debug!(user_id = %claims.sub, refresh_revoked, "logout complete");
        Ok(())
    }

    /// Resolve the identity behind an access token.
    ///
    /// Used by the request gate on every protected call. The caller is
    /// responsible for dispatching [`Self::touch_last_used_detached`] with
    /// the returned record; it must never block the request.
    ///
    /// # Errors
    ///
    /// Returns unauthorized for invalid, expired, revoked, or unknown
    /// tokens, forbidden for non-active accounts, or a storage error.
    pub async fn authenticate(&self, token: &str) -> Result<(User, TokenRecord), AuthError> {
        let claims = self.codec.validate(token, TokenKind::Access)?;

        let Some(record) = self.tokens.find_active(token, TokenKind::Access).await? else {
            warn!(user_id = %claims.sub, "authentication failed: token not found or revoked");
            return Err(AuthError::unauthorized("access token not found or revoked"));
        };

        let Some(user) = self.users.find_by_id(&claims.sub).await? else {
            warn!(user_id = %claims.sub, "authentication failed: user not found");
            return Err(AuthError::unauthorized("user not found"));
        };
        Self::ensure_active(&user)?;

        Ok((user, record))
    }

    /// Record token usage without blocking the request path.
    ///
    /// The write runs on its own task with its own timeout, so a cancelled
    /// or slow client request neither loses the tracking write nor waits
    /// for it. Failures are logged, never surfaced.
    pub fn touch_last_used_detached(&self, record: &TokenRecord) {
        let tokens = self.tokens.clone();
        let record_id = record.id.clone();
        let user_id = record.user_id.clone();
        let used_at = Utc::now();
        tokio::spawn(async move {
            match tokio::time::timeout(
                LAST_USED_WRITE_TIMEOUT,
                tokens.touch_last_used(&record_id, used_at),
            )
            .await
            {
                Ok(Ok(())) => debug!(token_id = %record_id, user_id = %user_id, "token usage recorded"),
                Ok(Err(e)) => warn!(error = %e, token_id = %record_id, "last-used update failed"),
                Err(_) => warn!(token_id = %record_id, "last-used update timed out"),
            }
        });
    }

    /// Sign and persist an access/refresh pair for a user.
    ///
    /// Both tokens are signed before the transaction opens; a signing
    /// failure never touches the store. Both inserts and, when rotating,
    /// the conditional revocation of the consumed refresh token commit
    /// atomically, so the store never holds half a pair and a refresh
    /// token can be consumed by at most one rotation.
    async fn issue_token_pair(
        &self,
        user_id: &str,
        rotate: Option<&str>,
    ) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let (access_token, access_expires) = self.codec.issue(user_id, TokenKind::Access, now)?;
        let (refresh_token, refresh_expires) =
            self.codec.issue(user_id, TokenKind::Refresh, now)?;

        let mut tx = self.pool.begin().await.map_err(|e| {
            error!(error = %e, user_id = %user_id, "failed to open issuance transaction");
            AuthError::Storage(e)
        })?;

        self.tokens
            .create(&mut tx, user_id, &access_token, TokenKind::Access, access_expires)
            .await?;
        self.tokens
            .create(&mut tx, user_id, &refresh_token, TokenKind::Refresh, refresh_expires)
            .await?;

        if let Some(consumed) = rotate {
            let rotated = self
                .tokens
                .revoke_if_active(&mut *tx, consumed, TokenKind::Refresh)
                .await?;
            if !rotated {
                if let Err(e) = tx.rollback().await {
                    warn!(error = %e, user_id = %user_id, "rollback after lost rotation race failed");
                }
                warn!(user_id = %user_id, "refresh token consumed by a concurrent rotation");
                return Err(AuthError::unauthorized("refresh token already rotated"));
            }
        }

        tx.commit().await.map_err(|e| {
            error!(error = %e, user_id = %user_id, "token pair commit failed");
            AuthError::Storage(e)
        })?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_at: access_expires.timestamp(),
        })
    }

    fn ensure_active(user: &User) -> Result<(), AuthError> {
        if user.is_active() {
            Ok(())
        } else {
            warn!(user_id = %user.id, status = ?user.status, "account is not active");
            Err(AuthError::Forbidden)
        }
    }
}
