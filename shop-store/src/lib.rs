//! SQLite persistence for the shop backend.
//!
//! A single [`Store`] handle owns the connection pool and exposes the
//! catalog, cart, checkout and account operations. The schema is created
//! on connect.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

use std::str::FromStr;

use shop_core::Identity;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

pub mod attributes;
pub mod carts;
pub mod collections;
pub mod comments;
pub mod error;
pub mod orders;
pub mod password;
pub mod products;
mod schema;
pub mod tokens;
pub mod users;

pub use error::StoreError;
pub use tokens::{TokenPair, TokenSettings};

/// Handle to the shop database. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Connect to `database_url` (e.g. `sqlite://shop.db`), creating the
    /// file and tables when missing.
    ///
    /// In-memory URLs are served by a single long-lived connection so that
    /// every query sees the same database.
    ///
    /// # Errors
    /// Returns [`StoreError::Database`] if the URL is malformed, the
    /// database cannot be opened, or the schema cannot be applied.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(8)
        };

        let pool = pool_options.connect_with(options).await?;
        let store = Self { pool };
        store.migrate().await?;
        info!(url = %database_url, "store ready");
        Ok(store)
    }

    /// Open a fresh private in-memory database.
    ///
    /// # Errors
    /// Returns [`StoreError::Database`] if SQLite cannot be initialised.
    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::connect("sqlite::memory:").await
    }

    /// The underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for statement in schema::STATEMENTS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

/// Column values that select the rows owned by `identity`.
///
/// Used with `user_id IS ? AND session_key IS ?`, which matches exactly one
/// kind of owner because the other column is always `NULL`.
pub(crate) fn owner_binds(identity: &Identity) -> (Option<i64>, Option<String>) {
    match identity {
        Identity::User(id) => (Some(id.get()), None),
        Identity::Anonymous(key) => (None, Some(key.as_str().to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use shop_core::{SessionKey, UserId};

    use super::*;

    #[tokio::test]
    async fn in_memory_store_applies_schema_once_and_again() {
        let store = match Store::in_memory().await {
            Ok(s) => s,
            Err(e) => panic!("failed to open store: {e}"),
        };
        if let Err(e) = store.migrate().await {
            panic!("schema must be idempotent: {e}");
        }
        let tables: i64 = match sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('products', 'carts', 'orders')",
        )
        .fetch_one(store.pool())
        .await
        {
            Ok(n) => n,
            Err(e) => panic!("query failed: {e}"),
        };
        assert_eq!(tables, 3);
    }

    #[test]
    fn owner_binds_fill_exactly_one_column() {
        let (user, session) = owner_binds(&Identity::User(UserId::from(3)));
        assert_eq!(user, Some(3));
        assert!(session.is_none());

        let key = SessionKey::generate();
        let (user, session) = owner_binds(&Identity::Anonymous(key.clone()));
        assert!(user.is_none());
        assert_eq!(session.as_deref(), Some(key.as_str()));
    }
}
