use shop_core::{Collection, CollectionId};
use sqlx::SqliteConnection;

use crate::error::StoreError;
use crate::Store;

#[derive(sqlx::FromRow)]
struct CollectionEntity {
    id: i64,
    name: String,
    image: String,
}

impl From<CollectionEntity> for Collection {
    fn from(e: CollectionEntity) -> Self {
        Self { id: CollectionId::from(e.id), name: e.name, image: e.image }
    }
}

impl Store {
    /// All collections, ordered by id.
    ///
    /// # Errors
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn list_collections(&self) -> Result<Vec<Collection>, StoreError> {
        let rows = sqlx::query_as::<_, CollectionEntity>(
            "SELECT id, name, image FROM collections ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Collection::from).collect())
    }

    /// One collection.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if no such collection exists.
    pub async fn get_collection(&self, id: CollectionId) -> Result<Collection, StoreError> {
        sqlx::query_as::<_, CollectionEntity>("SELECT id, name, image FROM collections WHERE id = ?")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?
            .map(Collection::from)
            .ok_or_else(|| StoreError::not_found("collection", id.get()))
    }

    /// Insert a collection.
    ///
    /// # Errors
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn create_collection(&self, name: &str, image: &str) -> Result<Collection, StoreError> {
        let result = sqlx::query("INSERT INTO collections (name, image) VALUES (?, ?)")
            .bind(name)
            .bind(image)
            .execute(&self.pool)
            .await?;
        Ok(Collection {
            id: CollectionId::from(result.last_insert_rowid()),
            name: name.to_owned(),
            image: image.to_owned(),
        })
    }

    /// Update a collection's name and/or image; `None` keeps the current value.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if no such collection exists.
    pub async fn update_collection(
        &self,
        id: CollectionId,
        name: Option<&str>,
        image: Option<&str>,
    ) -> Result<Collection, StoreError> {
        let result = sqlx::query(
            "UPDATE collections SET name = COALESCE(?, name), image = COALESCE(?, image) WHERE id = ?",
        )
        .bind(name)
        .bind(image)
        .bind(id.get())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("collection", id.get()));
        }
        self.get_collection(id).await
    }
}

/// Resolves collection names to ids, failing on the first unknown name.
pub(crate) async fn resolve_names(
    conn: &mut SqliteConnection,
    names: &[String],
) -> Result<Vec<i64>, StoreError> {
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM collections WHERE name = ? ORDER BY id LIMIT 1")
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;
        let Some(id) = id else {
            return Err(StoreError::Validation(format!(
                "collection: object with name={name} does not exist."
            )));
        };
        ids.push(id);
    }
    Ok(ids)
}

/// Names of the collections a product belongs to, ordered by name.
pub(crate) async fn linked_names(
    conn: &mut SqliteConnection,
    product_id: i64,
) -> Result<Vec<String>, StoreError> {
    let names = sqlx::query_scalar(
        "SELECT c.name FROM collections c INNER JOIN product_collections pc ON pc.collection_id = c.id \
         WHERE pc.product_id = ? ORDER BY c.name",
    )
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(names)
}

/// Replaces the collection links of a product with `ids`.
pub(crate) async fn replace_links(
    conn: &mut SqliteConnection,
    product_id: i64,
    ids: &[i64],
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM product_collections WHERE product_id = ?")
        .bind(product_id)
        .execute(&mut *conn)
        .await?;
    for id in ids {
        sqlx::query("INSERT OR IGNORE INTO product_collections (product_id, collection_id) VALUES (?, ?)")
            .bind(product_id)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}
