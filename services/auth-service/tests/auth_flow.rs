//! End-to-end session lifecycle tests against an in-memory database.

use chrono::{Duration, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use auth_service::config::{JwtConfig, PasswordConfig};
use auth_service::{AuthError, AuthService, Claims, TokenCodec, TokenKind, TokenPair};

fn jwt_config() -> JwtConfig {
    JwtConfig {
        secret: "integration-test-secret-32-bytes!".to_string(),
        issuer: "vantage-test".to_string(),
        access_token_ttl_seconds: 900,
        refresh_token_ttl_seconds: 604_800,
    }
}

fn password_config() -> PasswordConfig {
    // Cheap parameters so hashing does not dominate the test run.
    PasswordConfig {
        memory_cost: 1024,
        time_cost: 1,
        parallelism: 1,
        hash_length: 32,
    }
}

async fn setup() -> (AuthService, SqlitePool) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("migrations apply cleanly");
    let service = AuthService::new(pool.clone(), &jwt_config(), &password_config());
    (service, pool)
}

async fn register_alice(service: &AuthService) -> TokenPair {
    service
        .register("alice", "a@x.com", "password123")
        .await
        .expect("registration succeeds")
}

async fn user_id_by_email(pool: &SqlitePool, email: &str) -> String {
    sqlx::query_scalar("SELECT id FROM users WHERE email = ? AND deleted_at = 0")
        .bind(email)
        .fetch_one(pool)
        .await
        .expect("user exists")
}

#[tokio::test]
async fn registration_issues_decodable_pair_for_the_new_user() {
    let (service, pool) = setup().await;
    let pair = register_alice(&service).await;

    let codec = TokenCodec::new(&jwt_config());
    let access = codec
        .validate(&pair.access_token, TokenKind::Access)
        .expect("access token validates");
    let refresh = codec
        .validate(&pair.refresh_token, TokenKind::Refresh)
        .expect("refresh token validates");

    let user_id = user_id_by_email(&pool, "a@x.com").await;
    assert_eq!(access.sub, user_id);
    assert_eq!(refresh.sub, user_id);
    assert_eq!(pair.expires_at, access.exp);
    assert!(pair.expires_at > Utc::now().timestamp());
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let (service, _pool) = setup().await;
    register_alice(&service).await;

    let same_email = service
        .register("someone-else", "a@x.com", "password123")
        .await
        .unwrap_err();
    assert!(matches!(same_email, AuthError::Conflict(_)));

    let same_username = service
        .register("alice", "other@x.com", "password123")
        .await
        .unwrap_err();
    assert!(matches!(same_username, AuthError::Conflict(_)));
}

#[tokio::test]
async fn short_password_is_a_validation_error() {
    let (service, _pool) = setup().await;
    let err = service
        .register("alice", "a@x.com", "short")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));
}

#[tokio::test]
async fn wrong_password_and_unknown_email_are_indistinguishable() {
    let (service, _pool) = setup().await;
    register_alice(&service).await;

    let wrong_password = service.login("a@x.com", "not-the-password").await.unwrap_err();
    let unknown_email = service.login("nobody@x.com", "password123").await.unwrap_err();

    assert!(matches!(wrong_password, AuthError::Unauthorized { .. }));
    assert!(matches!(unknown_email, AuthError::Unauthorized { .. }));
    assert_eq!(wrong_password.to_string(), unknown_email.to_string());
}

#[tokio::test]
async fn login_issues_a_fresh_pair_and_stamps_last_login() {
    let (service, pool) = setup().await;
    let registration_pair = register_alice(&service).await;

    let login_pair = service.login("a@x.com", "password123").await.unwrap();
    assert_ne!(login_pair.access_token, registration_pair.access_token);
    assert_ne!(login_pair.refresh_token, registration_pair.refresh_token);

    let last_login: Option<String> =
        sqlx::query_scalar("SELECT last_login_at FROM users WHERE email = 'a@x.com'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(last_login.is_some());
}

#[tokio::test]
async fn non_active_account_is_forbidden() {
    let (service, pool) = setup().await;
    let pair = register_alice(&service).await;

    sqlx::query("UPDATE users SET status = 'suspended' WHERE email = 'a@x.com'")
        .execute(&pool)
        .await
        .unwrap();

    assert!(matches!(
        service.login("a@x.com", "password123").await.unwrap_err(),
        AuthError::Forbidden
    ));
    assert!(matches!(
        service.authenticate(&pair.access_token).await.unwrap_err(),
        AuthError::Forbidden
    ));
    assert!(matches!(
        service.refresh_token(&pair.refresh_token).await.unwrap_err(),
        AuthError::Forbidden
    ));
}

#[tokio::test]
async fn authenticate_returns_user_and_token_record() {
    let (service, _pool) = setup().await;
    let pair = register_alice(&service).await;

    let (user, record) = service.authenticate(&pair.access_token).await.unwrap();
    assert_eq!(user.email, "a@x.com");
    assert_eq!(record.user_id, user.id);
    assert_eq!(record.kind, TokenKind::Access);
    assert!(!record.is_revoked);
}

#[tokio::test]
async fn refresh_rotates_and_consumes_the_token() {
    let (service, _pool) = setup().await;
    let pair = register_alice(&service).await;

    let rotated = service.refresh_token(&pair.refresh_token).await.unwrap();
    assert_ne!(rotated.refresh_token, pair.refresh_token);

    // The consumed token is single-use.
    let err = service.refresh_token(&pair.refresh_token).await.unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized { .. }));

    // The rotated pair works exactly once more.
    service.refresh_token(&rotated.refresh_token).await.unwrap();
    assert!(service
        .refresh_token(&rotated.refresh_token)
        .await
        .is_err());
}

#[tokio::test]
async fn concurrent_refreshes_have_exactly_one_winner() {
    let (service, _pool) = setup().await;
    let pair = register_alice(&service).await;

    let (first, second) = tokio::join!(
        service.refresh_token(&pair.refresh_token),
        service.refresh_token(&pair.refresh_token),
    );

    let successes = usize::from(first.is_ok()) + usize::from(second.is_ok());
    assert_eq!(successes, 1, "exactly one rotation may win");

    let loser = if first.is_err() { first } else { second };
    assert!(matches!(loser.unwrap_err(), AuthError::Unauthorized { .. }));
}

#[tokio::test]
async fn logout_revokes_access_token_and_every_refresh_token() {
    let (service, _pool) = setup().await;
    let first_session = register_alice(&service).await;
    let second_session = service.login("a@x.com", "password123").await.unwrap();

    service.authenticate(&second_session.access_token).await.unwrap();
    service.logout(&second_session.access_token).await.unwrap();

    // The presented access token is gone.
    let err = service
        .authenticate(&second_session.access_token)
        .await
        .unwrap_err();
    assert_eq!(err.reason(), Some("access token not found or revoked"));

    // Every refresh chain is closed, including the other session's.
    assert!(service
        .refresh_token(&second_session.refresh_token)
        .await
        .is_err());
    assert!(service
        .refresh_token(&first_session.refresh_token)
        .await
        .is_err());

    // Only the presented access token was revoked.
    service.authenticate(&first_session.access_token).await.unwrap();
}

#[tokio::test]
async fn expired_tokens_fail_with_the_expiry_reason() {
    let (service, pool) = setup().await;
    register_alice(&service).await;
    let user_id = user_id_by_email(&pool, "a@x.com").await;

    let codec = TokenCodec::new(&jwt_config());
    let stale_access = codec
        .sign(&Claims::new(
            &user_id,
            TokenKind::Access,
            Utc::now() - Duration::hours(2),
            Duration::minutes(15),
            "vantage-test",
        ))
        .unwrap();
    let stale_refresh = codec
        .sign(&Claims::new(
            &user_id,
            TokenKind::Refresh,
            Utc::now() - Duration::days(8),
            Duration::days(7),
            "vantage-test",
        ))
        .unwrap();

    let access_err = service.authenticate(&stale_access).await.unwrap_err();
    assert_eq!(access_err.reason(), Some("token expired"));

    let refresh_err = service.refresh_token(&stale_refresh).await.unwrap_err();
    assert_eq!(refresh_err.reason(), Some("token expired"));
}

#[tokio::test]
async fn tokens_of_the_wrong_kind_are_rejected() {
    let (service, _pool) = setup().await;
    let pair = register_alice(&service).await;

    let err = service.authenticate(&pair.refresh_token).await.unwrap_err();
    assert_eq!(err.reason(), Some("wrong token type"));

    let err = service.refresh_token(&pair.access_token).await.unwrap_err();
    assert_eq!(err.reason(), Some("wrong token type"));
}

#[tokio::test]
async fn forged_tokens_are_rejected() {
    let (service, pool) = setup().await;
    register_alice(&service).await;
    let user_id = user_id_by_email(&pool, "a@x.com").await;

    let forger = TokenCodec::new(&JwtConfig {
        secret: "some-other-secret-entirely-here!".to_string(),
        ..jwt_config()
    });
    let (forged, _) = forger.issue(&user_id, TokenKind::Access, Utc::now()).unwrap();

    let err = service.authenticate(&forged).await.unwrap_err();
    assert_eq!(err.reason(), Some("malformed or forged token"));
}

#[tokio::test]
async fn detached_last_used_update_lands_without_blocking() {
    let (service, pool) = setup().await;
    let pair = register_alice(&service).await;

    let (_user, record) = service.authenticate(&pair.access_token).await.unwrap();
    service.touch_last_used_detached(&record);

    // The write runs on its own task; poll briefly for it.
    let mut last_used: Option<String> = None;
    for _ in 0..50 {
        last_used =
            sqlx::query_scalar("SELECT last_used_at FROM tokens WHERE id = ?")
                .bind(&record.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        if last_used.is_some() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(last_used.is_some(), "last-used timestamp was recorded");
}

#[tokio::test]
async fn full_lifecycle_scenario() {
    let (service, _pool) = setup().await;

    // Register succeeds and returns a pair.
    let registration = register_alice(&service).await;

    // Registering the same email again conflicts.
    let err = service
        .register("alice2", "a@x.com", "password123")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Conflict(_)));

    // Login with the correct password returns a fresh pair.
    let login = service.login("a@x.com", "password123").await.unwrap();
    assert_ne!(login.access_token, registration.access_token);
    assert_ne!(login.refresh_token, registration.refresh_token);

    // Login with the wrong password is a generic unauthorized.
    let err = service.login("a@x.com", "wrong-password").await.unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized { .. }));
    assert_eq!(err.to_string(), "invalid credentials or token");

    // Logout with the login access token succeeds.
    service.logout(&login.access_token).await.unwrap();

    // That access token no longer authenticates.
    let err = service.authenticate(&login.access_token).await.unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized { .. }));
}
