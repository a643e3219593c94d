//! Product comments. Each product's `reviews` counter tracks its comments.

use chrono::{DateTime, Utc};
use shop_core::{Comment, CommentId, ProductId, User, UserId};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::StoreError;
use crate::products::product_exists;
use crate::Store;

#[derive(sqlx::FromRow)]
struct CommentEntity {
    id: i64,
    product_id: i64,
    user_id: i64,
    text: String,
    created_at: DateTime<Utc>,
}

impl From<CommentEntity> for Comment {
    fn from(e: CommentEntity) -> Self {
        Self {
            id: CommentId::from(e.id),
            product: ProductId::from(e.product_id),
            user: UserId::from(e.user_id),
            text: e.text,
            created_at: e.created_at,
        }
    }
}

const SELECT_COMMENT: &str = "SELECT id, product_id, user_id, text, created_at FROM comments";

async fn fetch_comment(conn: &mut SqliteConnection, id: CommentId) -> Result<Comment, StoreError> {
    sqlx::query_as::<_, CommentEntity>(&format!("{SELECT_COMMENT} WHERE id = ?"))
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await?
        .map(Comment::from)
        .ok_or_else(|| StoreError::not_found("comment", id.get()))
}

async fn recount_reviews(conn: &mut SqliteConnection, product: ProductId) -> Result<(), StoreError> {
    sqlx::query("UPDATE products SET reviews = (SELECT COUNT(*) FROM comments WHERE product_id = ?) WHERE id = ?")
        .bind(product.get())
        .bind(product.get())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

fn ensure_may_edit(comment: &Comment, caller: &User) -> Result<(), StoreError> {
    if comment.user == caller.id || caller.is_staff {
        Ok(())
    } else {
        Err(StoreError::Forbidden)
    }
}

impl Store {
    /// Comment on a product as `user`.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the product does not exist.
    pub async fn add_comment(&self, product: ProductId, user: UserId, text: &str) -> Result<Comment, StoreError> {
        let mut tx = self.pool.begin().await?;
        if !product_exists(&mut tx, product.get()).await? {
            return Err(StoreError::not_found("product", product.get()));
        }
        let result = sqlx::query("INSERT INTO comments (product_id, user_id, text, created_at) VALUES (?, ?, ?, ?)")
            .bind(product.get())
            .bind(user.get())
            .bind(text)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        recount_reviews(&mut tx, product).await?;
        let comment = fetch_comment(&mut tx, CommentId::from(result.last_insert_rowid())).await?;
        tx.commit().await?;
        debug!(product_id = product.get(), user_id = user.get(), "comment added");
        Ok(comment)
    }

    /// All comments, oldest first.
    ///
    /// # Errors
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn list_comments(&self) -> Result<Vec<Comment>, StoreError> {
        let rows = sqlx::query_as::<_, CommentEntity>(&format!("{SELECT_COMMENT} ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    /// One comment.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if no such comment exists.
    pub async fn get_comment(&self, id: CommentId) -> Result<Comment, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_comment(&mut conn, id).await
    }

    /// Replace a comment's text. Only its author or staff may do so.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if no such comment exists, or
    /// [`StoreError::Forbidden`] if `caller` may not edit it.
    pub async fn update_comment(&self, id: CommentId, caller: &User, text: &str) -> Result<Comment, StoreError> {
        let mut tx = self.pool.begin().await?;
        let comment = fetch_comment(&mut tx, id).await?;
        ensure_may_edit(&comment, caller)?;
        sqlx::query("UPDATE comments SET text = ? WHERE id = ?")
            .bind(text)
            .bind(id.get())
            .execute(&mut *tx)
            .await?;
        let comment = fetch_comment(&mut tx, id).await?;
        tx.commit().await?;
        Ok(comment)
    }

    /// Delete a comment. Only its author or staff may do so.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if no such comment exists, or
    /// [`StoreError::Forbidden`] if `caller` may not delete it.
    pub async fn delete_comment(&self, id: CommentId, caller: &User) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let comment = fetch_comment(&mut tx, id).await?;
        ensure_may_edit(&comment, caller)?;
        sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id.get())
            .execute(&mut *tx)
            .await?;
        recount_reviews(&mut tx, comment.product).await?;
        tx.commit().await?;
        debug!(comment_id = id.get(), user_id = caller.id.get(), "comment deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use shop_core::{NewProduct, NewUser, Price, ProductRelations};

    use super::*;

    async fn seeded() -> (Store, ProductId, User, User) {
        let store = match Store::in_memory().await {
            Ok(s) => s,
            Err(e) => panic!("failed to open store: {e}"),
        };
        let product = match store
            .create_product(NewProduct {
                title: "Night gown".to_owned(),
                description: String::new(),
                price: Price::ZERO,
                relations: ProductRelations::default(),
                images: vec![],
                is_sales: false,
                rating: None,
                code: None,
                available: true,
            })
            .await
        {
            Ok(p) => p,
            Err(e) => panic!("seed failed: {e}"),
        };
        let mut users = Vec::new();
        for email in ["one@shop.test", "two@shop.test"] {
            match store
                .create_user(NewUser {
                    email: email.to_owned(),
                    password: "password-1".to_owned(),
                    first_name: String::new(),
                    last_name: String::new(),
                    phone: None,
                })
                .await
            {
                Ok(u) => users.push(u),
                Err(e) => panic!("create user failed: {e}"),
            }
        }
        let second = users.pop();
        let first = users.pop();
        match (first, second) {
            (Some(a), Some(b)) => (store, product.id, a, b),
            _ => panic!("two users expected"),
        }
    }

    async fn reviews(store: &Store, product: ProductId) -> i64 {
        match store.get_product(product).await {
            Ok(p) => p.reviews,
            Err(e) => panic!("get_product failed: {e}"),
        }
    }

    #[tokio::test]
    async fn comments_keep_the_review_count_in_step() {
        let (store, product, author, _) = seeded().await;
        let first = match store.add_comment(product, author.id, "Lovely fabric").await {
            Ok(c) => c,
            Err(e) => panic!("add failed: {e}"),
        };
        assert!(store.add_comment(product, author.id, "Runs small").await.is_ok());
        assert_eq!(reviews(&store, product).await, 2);

        assert!(store.delete_comment(first.id, &author).await.is_ok());
        assert_eq!(reviews(&store, product).await, 1);
        assert_eq!(store.list_comments().await.map(|c| c.len()).ok(), Some(1));
    }

    #[tokio::test]
    async fn only_author_or_staff_may_edit() {
        let (store, product, author, stranger) = seeded().await;
        let comment = match store.add_comment(product, author.id, "Soft").await {
            Ok(c) => c,
            Err(e) => panic!("add failed: {e}"),
        };
        assert!(matches!(store.delete_comment(comment.id, &stranger).await, Err(StoreError::Forbidden)));
        assert!(matches!(store.update_comment(comment.id, &stranger, "x").await, Err(StoreError::Forbidden)));

        let staff = User { is_staff: true, ..stranger };
        let edited = match store.update_comment(comment.id, &staff, "Very soft").await {
            Ok(c) => c,
            Err(e) => panic!("update failed: {e}"),
        };
        assert_eq!(edited.text, "Very soft");
        assert_eq!(edited.user, author.id);
    }

    #[tokio::test]
    async fn commenting_on_a_missing_product_fails() {
        let (store, _, author, _) = seeded().await;
        let result = store.add_comment(ProductId::from(999), author.id, "?").await;
        assert!(matches!(result, Err(StoreError::NotFound { entity: "product", .. })));
    }
}
