//! Products and their images.
//!
//! Relations (colors, sizes, brands, categories, collections) are written
//! by name and read back as sorted name lists.

use std::collections::HashMap;

use shop_core::{
    catalog::PRODUCT_CODE_MAX_LEN, generate_product_code, AttributeKind, ImageId, ImageInput,
    NewProduct, Price, Product, ProductChanges, ProductId, ProductImage, ProductSummary,
};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::error::{conflict_as, StoreError};
use crate::{attributes, collections, Store};

const DUPLICATE_PRODUCT: &str = "product with this title or code already exists.";

#[derive(sqlx::FromRow)]
struct ProductEntity {
    id: i64,
    title: String,
    description: String,
    price_cents: i64,
    reviews: i64,
    is_sales: bool,
    rating: Option<f64>,
    code: Option<String>,
    available: bool,
}

#[derive(sqlx::FromRow)]
struct SummaryEntity {
    id: i64,
    title: String,
    price_cents: i64,
}

#[derive(sqlx::FromRow)]
struct ImageEntity {
    id: i64,
    product_id: i64,
    image: String,
    is_main: bool,
}

impl From<ImageEntity> for ProductImage {
    fn from(e: ImageEntity) -> Self {
        Self {
            id: ImageId::from(e.id),
            product: ProductId::from(e.product_id),
            image: e.image,
            is_main: e.is_main,
        }
    }
}

fn check_code(code: &str) -> Result<(), StoreError> {
    if code.chars().count() > PRODUCT_CODE_MAX_LEN {
        return Err(StoreError::Validation(format!(
            "code: ensure this field has no more than {PRODUCT_CODE_MAX_LEN} characters."
        )));
    }
    Ok(())
}

pub(crate) async fn product_exists(conn: &mut SqliteConnection, id: i64) -> Result<bool, StoreError> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM products WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

async fn load_images(conn: &mut SqliteConnection, product_id: i64) -> Result<Vec<ProductImage>, StoreError> {
    let rows = sqlx::query_as::<_, ImageEntity>(
        "SELECT id, product_id, image, is_main FROM product_images WHERE product_id = ? ORDER BY id",
    )
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(ProductImage::from).collect())
}

async fn load_product(conn: &mut SqliteConnection, id: i64) -> Result<Product, StoreError> {
    let row = sqlx::query_as::<_, ProductEntity>(
        "SELECT id, title, description, price_cents, reviews, is_sales, rating, code, available \
         FROM products WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| StoreError::not_found("product", id))?;

    Ok(Product {
        id: ProductId::from(row.id),
        title: row.title,
        color: attributes::linked_names(conn, AttributeKind::Color, id).await?,
        brand: attributes::linked_names(conn, AttributeKind::Brand, id).await?,
        size: attributes::linked_names(conn, AttributeKind::Size, id).await?,
        collection: collections::linked_names(conn, id).await?,
        category: attributes::linked_names(conn, AttributeKind::Category, id).await?,
        description: row.description,
        price: Price::from_cents(row.price_cents)?,
        images: load_images(conn, id).await?,
        reviews: row.reviews,
        is_sales: row.is_sales,
        rating: row.rating,
        code: row.code.unwrap_or_default(),
        available: row.available,
    })
}

async fn insert_image(
    conn: &mut SqliteConnection,
    product_id: i64,
    image: &str,
    is_main: bool,
) -> Result<i64, StoreError> {
    let result = sqlx::query("INSERT INTO product_images (product_id, image, is_main) VALUES (?, ?, ?)")
        .bind(product_id)
        .bind(image)
        .bind(is_main)
        .execute(&mut *conn)
        .await?;
    Ok(result.last_insert_rowid())
}

/// Updates the image with the given id when it belongs to the product,
/// otherwise creates a new one.
async fn upsert_image(conn: &mut SqliteConnection, product_id: i64, input: &ImageInput) -> Result<(), StoreError> {
    if let Some(id) = input.id {
        let result = sqlx::query("UPDATE product_images SET image = ?, is_main = ? WHERE id = ? AND product_id = ?")
            .bind(&input.image)
            .bind(input.is_main)
            .bind(id.get())
            .bind(product_id)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() > 0 {
            return Ok(());
        }
    }
    insert_image(conn, product_id, &input.image, input.is_main).await?;
    Ok(())
}

async fn set_relation(
    conn: &mut SqliteConnection,
    product_id: i64,
    kind: AttributeKind,
    names: &[String],
) -> Result<(), StoreError> {
    let ids = attributes::resolve_names(conn, kind, names).await?;
    attributes::replace_links(conn, kind, product_id, &ids).await
}

async fn set_collections(conn: &mut SqliteConnection, product_id: i64, names: &[String]) -> Result<(), StoreError> {
    let ids = collections::resolve_names(conn, names).await?;
    collections::replace_links(conn, product_id, &ids).await
}

impl Store {
    /// All products in list shape, ordered by id.
    ///
    /// # Errors
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn list_products(&self) -> Result<Vec<ProductSummary>, StoreError> {
        let rows = sqlx::query_as::<_, SummaryEntity>("SELECT id, title, price_cents FROM products ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        let images = sqlx::query_as::<_, ImageEntity>(
            "SELECT id, product_id, image, is_main FROM product_images ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_product: HashMap<i64, Vec<ProductImage>> = HashMap::new();
        for image in images {
            by_product.entry(image.product_id).or_default().push(image.into());
        }

        rows.into_iter()
            .map(|row| -> Result<ProductSummary, StoreError> {
                Ok(ProductSummary {
                    id: ProductId::from(row.id),
                    title: row.title,
                    images: by_product.remove(&row.id).unwrap_or_default(),
                    price: Price::from_cents(row.price_cents)?,
                })
            })
            .collect()
    }

    /// Products flagged as on sale, in detail shape.
    ///
    /// # Errors
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn on_sale_products(&self) -> Result<Vec<Product>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM products WHERE is_sales = 1 ORDER BY id")
            .fetch_all(&mut *conn)
            .await?;
        let mut products = Vec::with_capacity(ids.len());
        for id in ids {
            products.push(load_product(&mut conn, id).await?);
        }
        Ok(products)
    }

    /// One product in detail shape.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if no such product exists.
    pub async fn get_product(&self, id: ProductId) -> Result<Product, StoreError> {
        let mut conn = self.pool.acquire().await?;
        load_product(&mut conn, id.get()).await
    }

    /// Insert a product with its relations and images.
    ///
    /// # Errors
    /// Returns [`StoreError::Validation`] if a relation name is unknown or
    /// the code is too long, and [`StoreError::Conflict`] if the title or
    /// code is taken. Nothing is written on error.
    pub async fn create_product(&self, new: NewProduct) -> Result<Product, StoreError> {
        let code = match new.code.filter(|c| !c.is_empty()) {
            Some(code) => code,
            None => generate_product_code(),
        };
        check_code(&code)?;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "INSERT INTO products (title, description, price_cents, is_sales, rating, code, available) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.price.cents())
        .bind(new.is_sales)
        .bind(new.rating)
        .bind(&code)
        .bind(new.available)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_as(e, || DUPLICATE_PRODUCT.to_owned()))?;
        let id = result.last_insert_rowid();

        let relations = &new.relations;
        set_relation(&mut tx, id, AttributeKind::Color, &relations.color).await?;
        set_relation(&mut tx, id, AttributeKind::Size, &relations.size).await?;
        set_relation(&mut tx, id, AttributeKind::Brand, &relations.brand).await?;
        set_relation(&mut tx, id, AttributeKind::Category, &relations.category).await?;
        set_collections(&mut tx, id, &relations.collection).await?;
        for image in &new.images {
            insert_image(&mut tx, id, &image.image, image.is_main).await?;
        }

        let product = load_product(&mut tx, id).await?;
        tx.commit().await?;
        info!(product_id = id, code = %product.code, "product created");
        Ok(product)
    }

    /// Apply a full or partial update to a product.
    ///
    /// Relation lists that are present replace the current links; images
    /// that are present are upserted by id.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the product does not exist, plus
    /// the validation and conflict errors of [`Store::create_product`].
    pub async fn update_product(&self, id: ProductId, mut changes: ProductChanges) -> Result<Product, StoreError> {
        // A blank code is replaced, never stored.
        if changes.code.as_deref() == Some("") {
            changes.code = Some(generate_product_code());
        }
        if let Some(code) = &changes.code {
            check_code(code)?;
        }
        let mut tx = self.pool.begin().await?;
        if !product_exists(&mut tx, id.get()).await? {
            return Err(StoreError::not_found("product", id.get()));
        }

        sqlx::query(
            "UPDATE products SET \
                title = COALESCE(?, title), \
                description = COALESCE(?, description), \
                price_cents = COALESCE(?, price_cents), \
                is_sales = COALESCE(?, is_sales), \
                rating = CASE WHEN ? THEN ? ELSE rating END, \
                code = COALESCE(?, code), \
                available = COALESCE(?, available) \
             WHERE id = ?",
        )
        .bind(changes.title.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.price.map(Price::cents))
        .bind(changes.is_sales)
        .bind(changes.rating.is_some())
        .bind(changes.rating.flatten())
        .bind(changes.code.as_deref())
        .bind(changes.available)
        .bind(id.get())
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_as(e, || DUPLICATE_PRODUCT.to_owned()))?;

        let relations = [
            (AttributeKind::Color, &changes.color),
            (AttributeKind::Size, &changes.size),
            (AttributeKind::Brand, &changes.brand),
            (AttributeKind::Category, &changes.category),
        ];
        for (kind, names) in relations {
            if let Some(names) = names {
                set_relation(&mut tx, id.get(), kind, names).await?;
            }
        }
        if let Some(names) = &changes.collection {
            set_collections(&mut tx, id.get(), names).await?;
        }
        for image in changes.images.iter().flatten() {
            upsert_image(&mut tx, id.get(), image).await?;
        }

        let product = load_product(&mut tx, id.get()).await?;
        tx.commit().await?;
        debug!(product_id = id.get(), "product updated");
        Ok(product)
    }

    /// All product images, ordered by id.
    ///
    /// # Errors
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn list_images(&self) -> Result<Vec<ProductImage>, StoreError> {
        let rows = sqlx::query_as::<_, ImageEntity>(
            "SELECT id, product_id, image, is_main FROM product_images ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ProductImage::from).collect())
    }

    /// One product image.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if no such image exists.
    pub async fn get_image(&self, id: ImageId) -> Result<ProductImage, StoreError> {
        sqlx::query_as::<_, ImageEntity>("SELECT id, product_id, image, is_main FROM product_images WHERE id = ?")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?
            .map(ProductImage::from)
            .ok_or_else(|| StoreError::not_found("product image", id.get()))
    }

    /// Attach a new image to a product.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the product does not exist.
    pub async fn create_image(&self, product: ProductId, image: &str, is_main: bool) -> Result<ProductImage, StoreError> {
        let mut conn = self.pool.acquire().await?;
        if !product_exists(&mut conn, product.get()).await? {
            return Err(StoreError::not_found("product", product.get()));
        }
        let id = insert_image(&mut conn, product.get(), image, is_main).await?;
        Ok(ProductImage { id: ImageId::from(id), product, image: image.to_owned(), is_main })
    }

    /// Update an image's path and/or main flag; `None` keeps the current value.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if no such image exists.
    pub async fn update_image(
        &self,
        id: ImageId,
        image: Option<&str>,
        is_main: Option<bool>,
    ) -> Result<ProductImage, StoreError> {
        let result = sqlx::query(
            "UPDATE product_images SET image = COALESCE(?, image), is_main = COALESCE(?, is_main) WHERE id = ?",
        )
        .bind(image)
        .bind(is_main)
        .bind(id.get())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("product image", id.get()));
        }
        self.get_image(id).await
    }

    /// Delete an image.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if no such image exists.
    pub async fn delete_image(&self, id: ImageId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM product_images WHERE id = ?")
            .bind(id.get())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("product image", id.get()));
        }
        Ok(())
    }
}
