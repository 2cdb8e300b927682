//! Signed token codec and validation pipeline.
//!
//! Tokens are compact HS256-signed claim sets. Validation is a fixed ordered
//! pipeline; the first failing step determines the error and every step must
//! pass for success. The pipeline is identical for access and refresh tokens
//! except for which configured lifetime bounds step 5.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::error::AuthError;

/// Tolerated clock skew in seconds for the issued-at plausibility check.
const CLOCK_SKEW_SECS: i64 = 60;

/// Slack in seconds added to the configured lifetime before a token is
/// considered implausibly long-lived.
const LIFETIME_TOLERANCE_SECS: i64 = 3600;

/// Kind of an issued token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived credential proving identity for a single request window.
    Access,
    /// Longer-lived, single-use credential for obtaining a new pair.
    Refresh,
}

impl TokenKind {
    /// String form stored in claims and token records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenKind {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(Self::Access),
            "refresh" => Ok(Self::Refresh),
            other => Err(AuthError::Validation(format!("invalid token kind: {other}"))),
        }
    }
}

/// Claims embedded in a signed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the owning user id.
    pub sub: String,
    /// Token kind.
    pub kind: TokenKind,
    /// Unique token id; keeps two tokens minted for the same user within
    /// the same second from colliding on the stored token value.
    pub jti: String,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Not-before, unix seconds.
    pub nbf: i64,
    /// Expires-at, unix seconds.
    pub exp: i64,
    /// Issuer.
    pub iss: String,
}

impl Claims {
    /// Build claims for a user. `nbf` equals `iat`; `exp` is `iat + ttl`, so
    /// `exp > iat` holds for any positive lifetime.
    #[must_use]
    pub fn new(
        user_id: &str,
        kind: TokenKind,
        issued_at: DateTime<Utc>,
        ttl: Duration,
        issuer: &str,
    ) -> Self {
        let iat = issued_at.timestamp();
        Self {
            sub: user_id.to_string(),
            kind,
            jti: Uuid::new_v4().to_string(),
            iat,
            nbf: iat,
            exp: (issued_at + ttl).timestamp(),
            iss: issuer.to_string(),
        }
    }

    /// Expiry as a UTC timestamp.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

/// Encodes and validates signed, time-bounded claim sets with a symmetric
/// secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Create a codec from token signing configuration.
    #[must_use]
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            access_ttl: Duration::seconds(
                i64::try_from(config.access_token_ttl_seconds).unwrap_or(i64::MAX),
            ),
            refresh_ttl: Duration::seconds(
                i64::try_from(config.refresh_token_ttl_seconds).unwrap_or(i64::MAX),
            ),
        }
    }

    /// Configured lifetime for a token kind.
    #[must_use]
    pub const fn lifetime(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    /// Build and sign a token of the given kind for a user.
    ///
    /// Returns the signed token string and its expiry.
    ///
    /// # Errors
    ///
    /// Returns an internal error if signing fails.
    pub fn issue(
        &self,
        user_id: &str,
        kind: TokenKind,
        issued_at: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), AuthError> {
        let claims = Claims::new(user_id, kind, issued_at, self.lifetime(kind), &self.issuer);
        let token = self.sign(&claims)?;
        Ok((token, claims.expires_at()))
    }

    /// Sign a prepared claim set.
    ///
    /// # Errors
    ///
    /// Returns an internal error if signing fails.
    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        jsonwebtoken::encode(&Header::default(), claims, &self.encoding_key).map_err(|e| {
            tracing::error!(error = %e, kind = %claims.kind, "token signing failed");
            AuthError::Internal("token signing failed")
        })
    }

    /// Pipeline step 1: verify the signature and decode the claims.
    ///
    /// Only HS256 signatures against the configured secret are accepted.
    /// Time-based checks are deliberately left to the later pipeline steps so
    /// each failure carries its own internal reason.
    ///
    /// # Errors
    ///
    /// Returns unauthorized for any malformed, forged, or wrongly-signed
    /// token.
    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims = std::collections::HashSet::new();

        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::warn!(error = %e, "token decode failed");
                AuthError::unauthorized("malformed or forged token")
            })
    }

    /// Run the full validation pipeline against the current time.
    ///
    /// # Errors
    ///
    /// Returns unauthorized naming the first failing pipeline step.
    pub fn validate(&self, token: &str, expected: TokenKind) -> Result<Claims, AuthError> {
        self.validate_at(token, expected, Utc::now())
    }

    /// Run the full validation pipeline against an explicit clock.
    ///
    /// Steps, in order: signature & decode, kind match, expiry, issued-at
    /// plausibility, lifetime plausibility.
    ///
    /// # Errors
    ///
    /// Returns unauthorized naming the first failing pipeline step.
    pub fn validate_at(
        &self,
        token: &str,
        expected: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<Claims, AuthError> {
        let claims = self.decode(token)?;

        if claims.kind != expected {
            tracing::warn!(
                expected = %expected,
                actual = %claims.kind,
                "token kind mismatch"
            );
            return Err(AuthError::unauthorized("wrong token type"));
        }

        if now.timestamp() >= claims.exp {
            tracing::warn!(sub = %claims.sub, kind = %claims.kind, "token expired");
            return Err(AuthError::unauthorized("token expired"));
        }

        if claims.iat > now.timestamp() + CLOCK_SKEW_SECS {
            tracing::warn!(sub = %claims.sub, kind = %claims.kind, "token issued in the future");
            return Err(AuthError::unauthorized("token issued-at anomaly"));
        }

        // Defends against a leaked secret being used to mint implausibly
        // long-lived tokens.
        let max_lifetime_secs = self.lifetime(expected).num_seconds() + LIFETIME_TOLERANCE_SECS;
        if claims.exp - claims.iat > max_lifetime_secs {
            tracing::warn!(sub = %claims.sub, kind = %claims.kind, "token lifetime too long");
            return Err(AuthError::unauthorized("token lifetime anomaly"));
        }

        Ok(claims)
    }
}
