//! Persistence layer: user credentials and issued tokens.

pub mod models;
pub mod tokens;
pub mod users;

pub use models::{TokenRecord, User, UserStatus};
pub use tokens::TokenStore;
pub use users::UserStore;

#[cfg(test)]
pub(crate) mod testing {
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    /// Fresh in-memory database with migrations applied.
    ///
    /// A single connection keeps the in-memory database alive and serializes
    /// writers the way the production store's row-level consistency does.
    pub(crate) async fn memory_pool() -> SqlitePool {
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
        pool
    }
}
