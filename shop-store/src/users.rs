use chrono::Utc;
use shop_core::{NewUser, User, UserChanges, UserId};
use sqlx::SqliteConnection;
use tracing::info;

use crate::error::{conflict_as, StoreError};
use crate::password::{hash_password, verify_password};
use crate::Store;

const DUPLICATE_EMAIL: &str = "user with this email already exists.";
const BAD_CREDENTIALS: &str = "No active account found with the given credentials";

#[derive(sqlx::FromRow)]
struct UserEntity {
    id: i64,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    is_staff: bool,
}

impl From<UserEntity> for User {
    fn from(e: UserEntity) -> Self {
        Self {
            id: UserId::from(e.id),
            email: e.email,
            first_name: e.first_name,
            last_name: e.last_name,
            phone: e.phone,
            is_staff: e.is_staff,
        }
    }
}

const SELECT_USER: &str =
    "SELECT id, email, password_hash, first_name, last_name, phone, is_staff FROM users";

/// Lowercases the domain part of an address, keeping the local part as given.
fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.to_owned(),
    }
}

pub(crate) async fn fetch_user(conn: &mut SqliteConnection, id: UserId) -> Result<User, StoreError> {
    sqlx::query_as::<_, UserEntity>(&format!("{SELECT_USER} WHERE id = ?"))
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await?
        .map(User::from)
        .ok_or_else(|| StoreError::not_found("user", id.get()))
}

impl Store {
    /// Register a user. The password is hashed before storage.
    ///
    /// # Errors
    /// Returns [`StoreError::Conflict`] if the email is already registered.
    pub async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        self.insert_user(new, false).await
    }

    async fn insert_user(&self, new: NewUser, is_staff: bool) -> Result<User, StoreError> {
        let email = normalize_email(&new.email);
        let result = sqlx::query(
            "INSERT INTO users (email, password_hash, first_name, last_name, phone, is_staff, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&email)
        .bind(hash_password(&new.password))
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.phone)
        .bind(is_staff)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_as(e, || DUPLICATE_EMAIL.to_owned()))?;

        let id = result.last_insert_rowid();
        info!(user_id = id, is_staff, "user registered");
        Ok(User {
            id: UserId::from(id),
            email,
            first_name: new.first_name,
            last_name: new.last_name,
            phone: new.phone,
            is_staff,
        })
    }

    /// One user.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if no such user exists.
    pub async fn get_user(&self, id: UserId) -> Result<User, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_user(&mut conn, id).await
    }

    /// Apply a full or partial profile update. A new password is re-hashed.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the user does not exist, or
    /// [`StoreError::Conflict`] if the new email is taken.
    pub async fn update_user(&self, id: UserId, changes: UserChanges) -> Result<User, StoreError> {
        let email = changes.email.as_deref().map(normalize_email);
        let password_hash = changes.password.as_deref().map(hash_password);
        let result = sqlx::query(
            "UPDATE users SET \
                email = COALESCE(?, email), \
                password_hash = COALESCE(?, password_hash), \
                first_name = COALESCE(?, first_name), \
                last_name = COALESCE(?, last_name), \
                phone = CASE WHEN ? THEN ? ELSE phone END \
             WHERE id = ?",
        )
        .bind(email)
        .bind(password_hash)
        .bind(changes.first_name)
        .bind(changes.last_name)
        .bind(changes.phone.is_some())
        .bind(changes.phone.flatten())
        .bind(id.get())
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_as(e, || DUPLICATE_EMAIL.to_owned()))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("user", id.get()));
        }
        self.get_user(id).await
    }

    /// Look up a user by email and check the password.
    ///
    /// # Errors
    /// Returns [`StoreError::Unauthorized`] if the email is unknown or the
    /// password does not match.
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserEntity>(&format!("{SELECT_USER} WHERE email = ?"))
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) if verify_password(password, &row.password_hash) => Ok(row.into()),
            _ => Err(StoreError::Unauthorized(BAD_CREDENTIALS)),
        }
    }

    /// Make sure a staff account with these credentials exists.
    ///
    /// An existing account is promoted and its password reset; otherwise a
    /// new staff account is created.
    ///
    /// # Errors
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<User, StoreError> {
        let email = normalize_email(email);
        let result = sqlx::query("UPDATE users SET is_staff = 1, password_hash = ? WHERE email = ?")
            .bind(hash_password(password))
            .bind(&email)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() > 0 {
            let user = self.verify_credentials(&email, password).await?;
            info!(user_id = user.id.get(), "existing account promoted to staff");
            return Ok(user);
        }
        self.insert_user(
            NewUser {
                email,
                password: password.to_owned(),
                first_name: String::new(),
                last_name: String::new(),
                phone: None,
            },
            true,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> Store {
        match Store::in_memory().await {
            Ok(s) => s,
            Err(e) => panic!("failed to open store: {e}"),
        }
    }

    fn ann() -> NewUser {
        NewUser {
            email: "Ann@Example.COM".to_owned(),
            password: "s3cret-pass".to_owned(),
            first_name: "Ann".to_owned(),
            last_name: "Lee".to_owned(),
            phone: Some("+380501112233".to_owned()),
        }
    }

    #[test]
    fn normalize_email_lowercases_domain_only() {
        assert_eq!(normalize_email(" Ann@Example.COM "), "Ann@example.com");
        assert_eq!(normalize_email("no-at-sign"), "no-at-sign");
    }

    #[tokio::test]
    async fn registered_user_can_log_in_and_duplicates_conflict() {
        let store = store().await;
        let user = match store.create_user(ann()).await {
            Ok(u) => u,
            Err(e) => panic!("create failed: {e}"),
        };
        assert!(!user.is_staff);

        let logged_in = match store.verify_credentials("ann@example.com", "s3cret-pass").await {
            Ok(u) => u,
            Err(e) => panic!("login failed: {e}"),
        };
        assert_eq!(logged_in.id, user.id);

        assert!(matches!(
            store.verify_credentials("ann@example.com", "nope").await,
            Err(StoreError::Unauthorized(_))
        ));
        assert!(matches!(store.create_user(ann()).await, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn update_user_rehashes_password_and_clears_phone() {
        let store = store().await;
        let user = match store.create_user(ann()).await {
            Ok(u) => u,
            Err(e) => panic!("create failed: {e}"),
        };
        let changes = UserChanges {
            password: Some("another-pass".to_owned()),
            phone: Some(None),
            ..UserChanges::default()
        };
        let updated = match store.update_user(user.id, changes).await {
            Ok(u) => u,
            Err(e) => panic!("update failed: {e}"),
        };
        assert!(updated.phone.is_none());
        assert_eq!(updated.first_name, "Ann");
        assert!(store.verify_credentials(&user.email, "another-pass").await.is_ok());
        assert!(store.verify_credentials(&user.email, "s3cret-pass").await.is_err());
    }

    #[tokio::test]
    async fn ensure_admin_is_idempotent() {
        let store = store().await;
        let first = match store.ensure_admin("root@shop.test", "admin-pass").await {
            Ok(u) => u,
            Err(e) => panic!("bootstrap failed: {e}"),
        };
        let second = match store.ensure_admin("root@shop.test", "admin-pass").await {
            Ok(u) => u,
            Err(e) => panic!("bootstrap failed: {e}"),
        };
        assert!(first.is_staff && second.is_staff);
        assert_eq!(first.id, second.id);
    }
}
