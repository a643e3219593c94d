//! Shopping carts, one per identity.

use chrono::Utc;
use shop_core::{Cart, CartId, CartItemId, CartLine, Identity, Price, ProductId, Quantity};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{conflict_as, StoreError};
use crate::products::product_exists;
use crate::{owner_binds, Store};

#[derive(sqlx::FromRow)]
struct LineEntity {
    id: i64,
    product_id: i64,
    title: String,
    price_cents: i64,
    quantity: i64,
}

impl TryFrom<LineEntity> for CartLine {
    type Error = StoreError;

    fn try_from(e: LineEntity) -> Result<Self, Self::Error> {
        Ok(CartLine::new(
            CartItemId::from(e.id),
            ProductId::from(e.product_id),
            e.title,
            Price::from_cents(e.price_cents)?,
            Quantity::new(e.quantity)?,
        )?)
    }
}

/// Lines of a cart priced at the products' current prices.
pub(crate) async fn cart_lines(conn: &mut SqliteConnection, cart: CartId) -> Result<Vec<CartLine>, StoreError> {
    let rows = sqlx::query_as::<_, LineEntity>(
        "SELECT ci.id, ci.product_id, p.title, p.price_cents, ci.quantity \
         FROM cart_items ci INNER JOIN products p ON p.id = ci.product_id \
         WHERE ci.cart_id = ? ORDER BY ci.id",
    )
    .bind(cart.get())
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(CartLine::try_from).collect()
}

/// The cart owned by `identity`, if one exists.
pub(crate) async fn find_cart(conn: &mut SqliteConnection, identity: &Identity) -> Result<Option<CartId>, StoreError> {
    let (user_id, session_key) = owner_binds(identity);
    let id: Option<i64> = sqlx::query_scalar("SELECT id FROM carts WHERE user_id IS ? AND session_key IS ?")
        .bind(user_id)
        .bind(session_key)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(id.map(CartId::from))
}

async fn get_or_create_cart(conn: &mut SqliteConnection, identity: &Identity) -> Result<CartId, StoreError> {
    let (user_id, session_key) = owner_binds(identity);
    sqlx::query("INSERT OR IGNORE INTO carts (user_id, session_key, created_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(session_key)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    find_cart(conn, identity)
        .await?
        .ok_or_else(|| StoreError::Validation("cart could not be created".to_owned()))
}

async fn load_cart(conn: &mut SqliteConnection, id: CartId) -> Result<Cart, StoreError> {
    let lines = cart_lines(conn, id).await?;
    Ok(Cart::new(id, lines)?)
}

impl Store {
    /// The identity's cart, created empty on first access.
    ///
    /// # Errors
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn cart_for(&self, identity: &Identity) -> Result<Cart, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let id = get_or_create_cart(&mut conn, identity).await?;
        load_cart(&mut conn, id).await
    }

    /// Explicitly create the identity's cart.
    ///
    /// # Errors
    /// Returns [`StoreError::Conflict`] if the identity already has a cart.
    pub async fn create_cart(&self, identity: &Identity) -> Result<Cart, StoreError> {
        let (user_id, session_key) = owner_binds(identity);
        let result = sqlx::query("INSERT INTO carts (user_id, session_key, created_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(session_key)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_as(e, || "Cart already exists for this session.".to_owned()))?;
        Ok(Cart::new(CartId::from(result.last_insert_rowid()), Vec::new())?)
    }

    /// A cart by id, visible only to its owner.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the cart does not exist or belongs
    /// to another identity.
    pub async fn get_cart(&self, identity: &Identity, id: CartId) -> Result<Cart, StoreError> {
        let mut conn = self.pool.acquire().await?;
        match find_cart(&mut conn, identity).await? {
            Some(own) if own == id => load_cart(&mut conn, id).await,
            _ => Err(StoreError::not_found("cart", id.get())),
        }
    }

    /// Delete a cart and its lines, if owned by `identity`.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the cart does not exist or belongs
    /// to another identity.
    pub async fn delete_cart(&self, identity: &Identity, id: CartId) -> Result<(), StoreError> {
        let (user_id, session_key) = owner_binds(identity);
        let result = sqlx::query("DELETE FROM carts WHERE id = ? AND user_id IS ? AND session_key IS ?")
            .bind(id.get())
            .bind(user_id)
            .bind(session_key)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("cart", id.get()));
        }
        Ok(())
    }

    /// Add `quantity` units of a product to the identity's cart.
    ///
    /// A product already in the cart has its quantity increased; otherwise
    /// a new line is created with `quantity`.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the product does not exist, or
    /// [`StoreError::Core`] if the line would exceed its unit limit or the
    /// cart total would overflow. The cart is unchanged on error.
    pub async fn add_to_cart(
        &self,
        identity: &Identity,
        product: ProductId,
        quantity: Quantity,
    ) -> Result<Cart, StoreError> {
        let mut tx = self.pool.begin().await?;
        if !product_exists(&mut tx, product.get()).await? {
            return Err(StoreError::not_found("product", product.get()));
        }
        let cart = get_or_create_cart(&mut tx, identity).await?;
        let existing: Option<i64> =
            sqlx::query_scalar("SELECT quantity FROM cart_items WHERE cart_id = ? AND product_id = ?")
                .bind(cart.get())
                .bind(product.get())
                .fetch_optional(&mut *tx)
                .await?;
        let line_quantity = match existing {
            Some(current) => Quantity::new(current)?.checked_add(quantity)?,
            None => quantity,
        };
        sqlx::query(
            "INSERT INTO cart_items (cart_id, product_id, quantity) VALUES (?, ?, ?) \
             ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = excluded.quantity",
        )
        .bind(cart.get())
        .bind(product.get())
        .bind(i64::from(line_quantity))
        .execute(&mut *tx)
        .await?;
        let view = load_cart(&mut tx, cart).await?;
        tx.commit().await?;
        debug!(%identity, product_id = product.get(), quantity = quantity.get(), "added to cart");
        Ok(view)
    }

    /// Remove a product line from the identity's cart.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the product is not in the cart.
    pub async fn remove_from_cart(&self, identity: &Identity, product: ProductId) -> Result<Cart, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let cart = get_or_create_cart(&mut conn, identity).await?;
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = ? AND product_id = ?")
            .bind(cart.get())
            .bind(product.get())
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("cart item", product.get()));
        }
        load_cart(&mut conn, cart).await
    }
}
