//! Opaque bearer tokens for signed-in users.
//!
//! A login yields an access token and a refresh token. Only SHA-256
//! digests of tokens are stored; the raw values are returned once.

use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shop_core::UserId;
use tracing::debug;

use crate::error::StoreError;
use crate::Store;

const INVALID_TOKEN: &str = "Given token not valid for any token type";

/// Lifetimes of issued tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSettings {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            access_ttl: Duration::from_secs(30 * 60),
            refresh_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Tokens handed out on login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Clone, Copy)]
enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

fn new_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn expiry(ttl: Duration) -> i64 {
    let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    Utc::now().timestamp().saturating_add(ttl)
}

impl Store {
    async fn store_token(&self, user: UserId, kind: TokenKind, ttl: Duration) -> Result<String, StoreError> {
        let token = new_token();
        sqlx::query("INSERT INTO auth_tokens (token_hash, user_id, kind, expires_at) VALUES (?, ?, ?, ?)")
            .bind(digest(&token))
            .bind(user.get())
            .bind(kind.as_str())
            .bind(expiry(ttl))
            .execute(&self.pool)
            .await?;
        Ok(token)
    }

    async fn token_owner(&self, token: &str, kind: TokenKind) -> Result<UserId, StoreError> {
        let owner: Option<i64> = sqlx::query_scalar(
            "SELECT user_id FROM auth_tokens WHERE token_hash = ? AND kind = ? AND expires_at > ?",
        )
        .bind(digest(token))
        .bind(kind.as_str())
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await?;
        owner.map(UserId::from).ok_or(StoreError::Unauthorized(INVALID_TOKEN))
    }

    /// Issue a fresh access/refresh pair for `user`.
    ///
    /// # Errors
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn issue_tokens(&self, user: UserId, settings: &TokenSettings) -> Result<TokenPair, StoreError> {
        let access = self.store_token(user, TokenKind::Access, settings.access_ttl).await?;
        let refresh = self.store_token(user, TokenKind::Refresh, settings.refresh_ttl).await?;
        debug!(user_id = user.get(), "token pair issued");
        Ok(TokenPair { access, refresh })
    }

    /// Resolve an access token to its user.
    ///
    /// # Errors
    /// Returns [`StoreError::Unauthorized`] if the token is unknown, expired,
    /// or is a refresh token.
    pub async fn authenticate(&self, access: &str) -> Result<UserId, StoreError> {
        self.token_owner(access, TokenKind::Access).await
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// # Errors
    /// Returns [`StoreError::Unauthorized`] if the refresh token is unknown
    /// or expired.
    pub async fn refresh_access(&self, refresh: &str, settings: &TokenSettings) -> Result<String, StoreError> {
        let user = self.token_owner(refresh, TokenKind::Refresh).await?;
        self.store_token(user, TokenKind::Access, settings.access_ttl).await
    }

    /// Delete expired tokens. Returns how many were removed.
    ///
    /// # Errors
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn purge_expired_tokens(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE expires_at <= ?")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use shop_core::NewUser;

    use super::*;

    async fn store_with_user() -> (Store, UserId) {
        let store = match Store::in_memory().await {
            Ok(s) => s,
            Err(e) => panic!("failed to open store: {e}"),
        };
        let user = match store
            .create_user(NewUser {
                email: "bo@shop.test".to_owned(),
                password: "password-1".to_owned(),
                first_name: "Bo".to_owned(),
                last_name: String::new(),
                phone: None,
            })
            .await
        {
            Ok(u) => u,
            Err(e) => panic!("create user failed: {e}"),
        };
        (store, user.id)
    }

    #[tokio::test]
    async fn access_token_authenticates_and_refresh_token_does_not() {
        let (store, user) = store_with_user().await;
        let pair = match store.issue_tokens(user, &TokenSettings::default()).await {
            Ok(p) => p,
            Err(e) => panic!("issue failed: {e}"),
        };
        assert_ne!(pair.access, pair.refresh);
        assert_eq!(store.authenticate(&pair.access).await.ok(), Some(user));
        assert!(matches!(store.authenticate(&pair.refresh).await, Err(StoreError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn refresh_yields_a_working_access_token() {
        let (store, user) = store_with_user().await;
        let settings = TokenSettings::default();
        let pair = match store.issue_tokens(user, &settings).await {
            Ok(p) => p,
            Err(e) => panic!("issue failed: {e}"),
        };
        let access = match store.refresh_access(&pair.refresh, &settings).await {
            Ok(a) => a,
            Err(e) => panic!("refresh failed: {e}"),
        };
        assert_eq!(store.authenticate(&access).await.ok(), Some(user));
        assert!(store.refresh_access(&pair.access, &settings).await.is_err());
    }

    #[tokio::test]
    async fn expired_tokens_are_rejected_and_purged() {
        let (store, user) = store_with_user().await;
        let settings = TokenSettings { access_ttl: Duration::ZERO, refresh_ttl: Duration::ZERO };
        let pair = match store.issue_tokens(user, &settings).await {
            Ok(p) => p,
            Err(e) => panic!("issue failed: {e}"),
        };
        assert!(store.authenticate(&pair.access).await.is_err());
        assert_eq!(store.purge_expired_tokens().await.ok(), Some(2));
    }

    #[test]
    fn tokens_are_url_safe_and_unique() {
        let a = new_token();
        let b = new_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43, "32 bytes base64url without padding");
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
