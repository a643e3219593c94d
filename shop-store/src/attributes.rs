//! Colors, sizes, brands and categories.
//!
//! The four lookups share a shape, so one set of queries serves them all,
//! parameterised by [`AttributeKind`].

use shop_core::{Attribute, AttributeId, AttributeKind};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{conflict_as, StoreError};
use crate::Store;

/// Backing table of an attribute kind.
pub(crate) const fn table(kind: AttributeKind) -> &'static str {
    match kind {
        AttributeKind::Color => "colors",
        AttributeKind::Size => "sizes",
        AttributeKind::Brand => "brands",
        AttributeKind::Category => "categories",
    }
}

/// Product link table of an attribute kind.
pub(crate) const fn link_table(kind: AttributeKind) -> &'static str {
    match kind {
        AttributeKind::Color => "product_colors",
        AttributeKind::Size => "product_sizes",
        AttributeKind::Brand => "product_brands",
        AttributeKind::Category => "product_categories",
    }
}

#[derive(sqlx::FromRow)]
struct AttributeEntity {
    id: i64,
    name: String,
}

impl From<AttributeEntity> for Attribute {
    fn from(e: AttributeEntity) -> Self {
        Self { id: AttributeId::from(e.id), name: e.name }
    }
}

impl Store {
    /// All rows of `kind`, ordered by id.
    ///
    /// # Errors
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn list_attributes(&self, kind: AttributeKind) -> Result<Vec<Attribute>, StoreError> {
        let rows = sqlx::query_as::<_, AttributeEntity>(&format!(
            "SELECT id, name FROM {} ORDER BY id",
            table(kind)
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Attribute::from).collect())
    }

    /// One row of `kind`.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if no such row exists.
    pub async fn get_attribute(
        &self,
        kind: AttributeKind,
        id: AttributeId,
    ) -> Result<Attribute, StoreError> {
        sqlx::query_as::<_, AttributeEntity>(&format!(
            "SELECT id, name FROM {} WHERE id = ?",
            table(kind)
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?
        .map(Attribute::from)
        .ok_or_else(|| StoreError::not_found(kind.label(), id.get()))
    }

    /// Insert a new row of `kind`.
    ///
    /// # Errors
    /// Returns [`StoreError::Conflict`] if the name is already taken.
    pub async fn create_attribute(
        &self,
        kind: AttributeKind,
        name: &str,
    ) -> Result<Attribute, StoreError> {
        let result = sqlx::query(&format!("INSERT INTO {} (name) VALUES (?)", table(kind)))
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_as(e, || format!("{kind} with this name already exists.")))?;
        debug!(%kind, name, "attribute created");
        Ok(Attribute { id: AttributeId::from(result.last_insert_rowid()), name: name.to_owned() })
    }

    /// Rename a row of `kind`.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if no such row exists, or
    /// [`StoreError::Conflict`] if the new name is taken.
    pub async fn rename_attribute(
        &self,
        kind: AttributeKind,
        id: AttributeId,
        name: &str,
    ) -> Result<Attribute, StoreError> {
        let result = sqlx::query(&format!("UPDATE {} SET name = ? WHERE id = ?", table(kind)))
            .bind(name)
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_as(e, || format!("{kind} with this name already exists.")))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(kind.label(), id.get()));
        }
        Ok(Attribute { id, name: name.to_owned() })
    }

    /// Delete a row of `kind`. Product links to it are removed as well.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if no such row exists.
    pub async fn delete_attribute(&self, kind: AttributeKind, id: AttributeId) -> Result<(), StoreError> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", table(kind)))
            .bind(id.get())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(kind.label(), id.get()));
        }
        Ok(())
    }
}

/// Resolves attribute names to ids, failing on the first unknown name.
pub(crate) async fn resolve_names(
    conn: &mut SqliteConnection,
    kind: AttributeKind,
    names: &[String],
) -> Result<Vec<i64>, StoreError> {
    let sql = format!("SELECT id FROM {} WHERE name = ?", table(kind));
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        let id: Option<i64> = sqlx::query_scalar(&sql).bind(name).fetch_optional(&mut *conn).await?;
        match id {
            Some(id) => ids.push(id),
            None => {
                return Err(StoreError::Validation(format!(
                    "{kind}: object with name={name} does not exist."
                )))
            }
        }
    }
    Ok(ids)
}

/// Names of the `kind` rows linked to a product, ordered by name.
pub(crate) async fn linked_names(
    conn: &mut SqliteConnection,
    kind: AttributeKind,
    product_id: i64,
) -> Result<Vec<String>, StoreError> {
    let names = sqlx::query_scalar(&format!(
        "SELECT a.name FROM {} a INNER JOIN {} l ON l.attribute_id = a.id \
         WHERE l.product_id = ? ORDER BY a.name",
        table(kind),
        link_table(kind)
    ))
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(names)
}

/// Replaces the `kind` links of a product with `ids`.
pub(crate) async fn replace_links(
    conn: &mut SqliteConnection,
    kind: AttributeKind,
    product_id: i64,
    ids: &[i64],
) -> Result<(), StoreError> {
    sqlx::query(&format!("DELETE FROM {} WHERE product_id = ?", link_table(kind)))
        .bind(product_id)
        .execute(&mut *conn)
        .await?;
    let insert = format!(
        "INSERT OR IGNORE INTO {} (product_id, attribute_id) VALUES (?, ?)",
        link_table(kind)
    );
    for id in ids {
        sqlx::query(&insert).bind(product_id).bind(id).execute(&mut *conn).await?;
    }
    Ok(())
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

    #[tokio::test]
    async fn attribute_create_list_rename_delete_lifecycle() {
        let store = store().await;
        let red = match store.create_attribute(AttributeKind::Color, "red").await {
            Ok(a) => a,
            Err(e) => panic!("create failed: {e}"),
        };
        let listed = store.list_attributes(AttributeKind::Color).await.unwrap_or_default();
        assert_eq!(listed, vec![red.clone()]);

        let renamed = match store.rename_attribute(AttributeKind::Color, red.id, "crimson").await {
            Ok(a) => a,
            Err(e) => panic!("rename failed: {e}"),
        };
        assert_eq!(renamed.name, "crimson");

        assert!(store.delete_attribute(AttributeKind::Color, red.id).await.is_ok());
        assert!(matches!(
            store.get_attribute(AttributeKind::Color, red.id).await,
            Err(StoreError::NotFound { entity: "color", .. })
        ));
    }

    #[tokio::test]
    async fn duplicate_attribute_name_is_a_conflict() {
        let store = store().await;
        assert!(store.create_attribute(AttributeKind::Size, "M").await.is_ok());
        let err = store.create_attribute(AttributeKind::Size, "M").await;
        assert!(matches!(err, Err(StoreError::Conflict(msg)) if msg.contains("size")));
    }

    #[tokio::test]
    async fn kinds_are_stored_separately() {
        let store = store().await;
        assert!(store.create_attribute(AttributeKind::Brand, "Aurora").await.is_ok());
        assert!(store.create_attribute(AttributeKind::Category, "Aurora").await.is_ok());
        let brands = store.list_attributes(AttributeKind::Brand).await.unwrap_or_default();
        let sizes = store.list_attributes(AttributeKind::Size).await.unwrap_or_default();
        assert_eq!(brands.len(), 1);
        assert!(sizes.is_empty());
    }
}
