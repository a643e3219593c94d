//! Orders and the cart-to-order checkout.

use chrono::{DateTime, Utc};
use shop_core::{
    checkout_total, subtotal, CheckoutRequest, ContactInfo, CoreError, DeliveryDetails,
    DeliveryMethod, Identity, Order, OrderId, OrderItem, OrderItemId, PaymentMethod, Price,
    PricedLine, ProductId, Quantity, UserId,
};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::carts::{cart_lines, find_cart};
use crate::error::StoreError;
use crate::users::fetch_user;
use crate::{owner_binds, Store};

#[derive(sqlx::FromRow)]
struct OrderEntity {
    id: i64,
    user_id: Option<i64>,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    delivery_cost_cents: i64,
    total_price_cents: i64,
    payment_method: Option<String>,
    delivery_method: Option<String>,
    delivery_city: Option<String>,
    delivery_address: Option<String>,
    delivery_postal_code: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemEntity {
    id: i64,
    product_id: i64,
    quantity: i64,
    price_cents: i64,
}

impl TryFrom<OrderItemEntity> for OrderItem {
    type Error = StoreError;

    fn try_from(e: OrderItemEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OrderItemId::from(e.id),
            product: ProductId::from(e.product_id),
            quantity: Quantity::new(e.quantity)?,
            price: Price::from_cents(e.price_cents)?,
        })
    }
}

const SELECT_ORDER: &str = "SELECT id, user_id, first_name, last_name, email, phone, \
     delivery_cost_cents, total_price_cents, payment_method, delivery_method, \
     delivery_city, delivery_address, delivery_postal_code, created_at FROM orders";

async fn load_items(conn: &mut SqliteConnection, order: i64) -> Result<Vec<OrderItem>, StoreError> {
    let rows = sqlx::query_as::<_, OrderItemEntity>(
        "SELECT id, product_id, quantity, price_cents FROM order_items WHERE order_id = ? ORDER BY id",
    )
    .bind(order)
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(OrderItem::try_from).collect()
}

async fn hydrate(conn: &mut SqliteConnection, row: OrderEntity) -> Result<Order, StoreError> {
    let delivery = match (row.delivery_method, row.delivery_city, row.delivery_address) {
        (Some(method), Some(city), Some(address)) => Some(DeliveryDetails {
            method: method.parse::<DeliveryMethod>()?,
            city,
            address,
            postal_code: row.delivery_postal_code,
        }),
        _ => None,
    };
    Ok(Order {
        id: OrderId::from(row.id),
        user: row.user_id.map(UserId::from),
        contact: ContactInfo {
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
        },
        delivery_cost: Price::from_cents(row.delivery_cost_cents)?,
        total_price: Price::from_cents(row.total_price_cents)?,
        payment_method: row.payment_method.as_deref().map(str::parse::<PaymentMethod>).transpose()?,
        delivery,
        items: load_items(conn, row.id).await?,
        created_at: row.created_at,
    })
}

async fn load_order(conn: &mut SqliteConnection, identity: &Identity, id: OrderId) -> Result<Order, StoreError> {
    let (user_id, session_key) = owner_binds(identity);
    let row = sqlx::query_as::<_, OrderEntity>(&format!(
        "{SELECT_ORDER} WHERE id = ? AND user_id IS ? AND session_key IS ?"
    ))
    .bind(id.get())
    .bind(user_id)
    .bind(session_key)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| StoreError::not_found("order", id.get()))?;
    hydrate(conn, row).await
}

async fn insert_order(
    conn: &mut SqliteConnection,
    identity: &Identity,
    contact: &ContactInfo,
    delivery_cost: Price,
    total: Price,
    payment_method: Option<PaymentMethod>,
    delivery: Option<&DeliveryDetails>,
) -> Result<i64, StoreError> {
    let (user_id, session_key) = owner_binds(identity);
    let result = sqlx::query(
        "INSERT INTO orders (user_id, session_key, first_name, last_name, email, phone, \
            delivery_cost_cents, total_price_cents, payment_method, delivery_method, \
            delivery_city, delivery_address, delivery_postal_code, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(session_key)
    .bind(&contact.first_name)
    .bind(&contact.last_name)
    .bind(&contact.email)
    .bind(&contact.phone)
    .bind(delivery_cost.cents())
    .bind(total.cents())
    .bind(payment_method.map(PaymentMethod::as_str))
    .bind(delivery.map(|d| d.method.as_str()))
    .bind(delivery.map(|d| d.city.as_str()))
    .bind(delivery.map(|d| d.address.as_str()))
    .bind(delivery.and_then(|d| d.postal_code.as_deref()))
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

impl Store {
    /// Convert the identity's cart into an order.
    ///
    /// Reads the cart lines, fails if there are none, totals unit price ×
    /// quantity plus the delivery cost, writes the order and one item per
    /// line (capturing the unit price), then empties the cart. All of it
    /// happens in one transaction: on any error nothing is written and the
    /// cart is left as it was.
    ///
    /// Signed-in users' contact fields come from their profile; anonymous
    /// checkouts use the contact fields of the request.
    ///
    /// # Errors
    /// Returns [`StoreError::Core`] with [`CoreError::EmptyCart`] if the
    /// identity has no cart or an empty one, or
    /// [`CoreError::AmountOverflow`] if the total is out of range.
    pub async fn checkout(&self, identity: &Identity, request: CheckoutRequest) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;

        let cart = find_cart(&mut tx, identity).await?.ok_or(CoreError::EmptyCart)?;
        let lines = cart_lines(&mut tx, cart).await?;
        let priced: Vec<PricedLine> = lines.iter().map(|line| line.priced()).collect();
        let total = checkout_total(&priced, request.delivery_cost)?;

        let contact = match identity {
            Identity::User(id) => fetch_user(&mut tx, *id).await?.contact(),
            Identity::Anonymous(_) => request.contact,
        };

        let order_id = insert_order(
            &mut tx,
            identity,
            &contact,
            request.delivery_cost,
            total,
            request.payment_method,
            request.delivery.as_ref(),
        )
        .await?;

        for line in &lines {
            sqlx::query("INSERT INTO order_items (order_id, product_id, quantity, price_cents) VALUES (?, ?, ?, ?)")
                .bind(order_id)
                .bind(line.product.get())
                .bind(i64::from(line.quantity))
                .bind(line.unit_price.cents())
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM cart_items WHERE cart_id = ?")
            .bind(cart.get())
            .execute(&mut *tx)
            .await?;

        let order = load_order(&mut tx, identity, OrderId::from(order_id)).await?;
        tx.commit().await?;

        info!(
            %identity,
            order_id,
            items = lines.len(),
            total = %total,
            "order placed"
        );
        Ok(order)
    }

    /// The identity's orders, newest first.
    ///
    /// # Errors
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn list_orders(&self, identity: &Identity) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let (user_id, session_key) = owner_binds(identity);
        let rows = sqlx::query_as::<_, OrderEntity>(&format!(
            "{SELECT_ORDER} WHERE user_id IS ? AND session_key IS ? ORDER BY id DESC"
        ))
        .bind(user_id)
        .bind(session_key)
        .fetch_all(&mut *conn)
        .await?;
        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(hydrate(&mut conn, row).await?);
        }
        Ok(orders)
    }

    /// One of the identity's orders.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the order does not exist or
    /// belongs to another identity.
    pub async fn get_order(&self, identity: &Identity, id: OrderId) -> Result<Order, StoreError> {
        let mut conn = self.pool.acquire().await?;
        load_order(&mut conn, identity, id).await
    }

    /// Delete one of the identity's orders.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the order does not exist or
    /// belongs to another identity.
    pub async fn delete_order(&self, identity: &Identity, id: OrderId) -> Result<(), StoreError> {
        let (user_id, session_key) = owner_binds(identity);
        let result = sqlx::query("DELETE FROM orders WHERE id = ? AND user_id IS ? AND session_key IS ?")
            .bind(id.get())
            .bind(user_id)
            .bind(session_key)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("order", id.get()));
        }
        Ok(())
    }

    /// Record how an order will be paid.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the order does not exist or
    /// belongs to another identity.
    pub async fn set_payment(
        &self,
        identity: &Identity,
        id: OrderId,
        method: PaymentMethod,
    ) -> Result<Order, StoreError> {
        let (user_id, session_key) = owner_binds(identity);
        let result = sqlx::query(
            "UPDATE orders SET payment_method = ? WHERE id = ? AND user_id IS ? AND session_key IS ?",
        )
        .bind(method.as_str())
        .bind(id.get())
        .bind(user_id)
        .bind(session_key)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("order", id.get()));
        }
        debug!(order_id = id.get(), %method, "payment method set");
        self.get_order(identity, id).await
    }

    /// Record delivery details. When `delivery_cost` is given, the total is
    /// recomputed as the items subtotal plus the new cost.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the order does not exist or
    /// belongs to another identity.
    pub async fn set_delivery(
        &self,
        identity: &Identity,
        id: OrderId,
        details: DeliveryDetails,
        delivery_cost: Option<Price>,
    ) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;
        let order = load_order(&mut tx, identity, id).await?;

        let (cost, total) = match delivery_cost {
            Some(cost) => (cost, subtotal(&order.priced_lines())?.checked_add(cost)?),
            None => (order.delivery_cost, order.total_price),
        };

        sqlx::query(
            "UPDATE orders SET delivery_method = ?, delivery_city = ?, delivery_address = ?, \
                delivery_postal_code = ?, delivery_cost_cents = ?, total_price_cents = ? \
             WHERE id = ?",
        )
        .bind(details.method.as_str())
        .bind(&details.city)
        .bind(&details.address)
        .bind(&details.postal_code)
        .bind(cost.cents())
        .bind(total.cents())
        .bind(id.get())
        .execute(&mut *tx)
        .await?;

        let order = load_order(&mut tx, identity, id).await?;
        tx.commit().await?;
        debug!(order_id = id.get(), total = %total, "delivery details set");
        Ok(order)
    }

    /// Open an order that carries only contact details. It has no items
    /// and a zero total.
    ///
    /// # Errors
    /// Returns [`StoreError::Database`] on query failure.
    pub async fn add_contact_info(&self, identity: &Identity, contact: ContactInfo) -> Result<OrderId, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let id = insert_order(&mut conn, identity, &contact, Price::ZERO, Price::ZERO, None, None).await?;
        debug!(%identity, order_id = id, "contact-only order opened");
        Ok(OrderId::from(id))
    }
}

#[cfg(test)]
mod tests {
    use shop_core::{NewProduct, NewUser, ProductRelations, SessionKey};

    use super::*;

    fn price(cents: i64) -> Price {
        match Price::from_cents(cents) {
            Ok(p) => p,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    fn qty(n: i64) -> Quantity {
        match Quantity::new(n) {
            Ok(q) => q,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    async fn seeded() -> (Store, ProductId, ProductId) {
        let store = match Store::in_memory().await {
            Ok(s) => s,
            Err(e) => panic!("failed to open store: {e}"),
        };
        let mut ids = Vec::new();
        for (title, cents) in [("Silk robe", 4_000), ("Lace briefs", 1_250)] {
            let product = match store
                .create_product(NewProduct {
                    title: title.to_owned(),
                    description: String::new(),
                    price: price(cents),
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
            ids.push(product.id);
        }
        (store, ids[0], ids[1])
    }

    #[tokio::test]
    async fn checkout_captures_prices_and_empties_the_cart() {
        let (store, robe, briefs) = seeded().await;
        let me = Identity::Anonymous(SessionKey::generate());
        assert!(store.add_to_cart(&me, robe, qty(1)).await.is_ok());
        assert!(store.add_to_cart(&me, briefs, qty(2)).await.is_ok());

        let request = CheckoutRequest {
            delivery_cost: price(300),
            contact: ContactInfo { email: Some("guest@shop.test".to_owned()), ..ContactInfo::default() },
            ..CheckoutRequest::default()
        };
        let order = match store.checkout(&me, request).await {
            Ok(o) => o,
            Err(e) => panic!("checkout failed: {e}"),
        };
        assert_eq!(order.total_price.to_string(), "68.00");
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.contact.email.as_deref(), Some("guest@shop.test"));
        assert!(order.user.is_none());

        let cart = match store.cart_for(&me).await {
            Ok(c) => c,
            Err(e) => panic!("cart_for failed: {e}"),
        };
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn empty_cart_cannot_be_checked_out() {
        let (store, _, _) = seeded().await;
        let me = Identity::Anonymous(SessionKey::generate());
        let result = store.checkout(&me, CheckoutRequest::default()).await;
        assert!(matches!(result, Err(StoreError::Core(CoreError::EmptyCart))));

        assert!(store.cart_for(&me).await.is_ok());
        let result = store.checkout(&me, CheckoutRequest::default()).await;
        assert!(matches!(result, Err(StoreError::Core(CoreError::EmptyCart))));
    }

    #[tokio::test]
    async fn signed_in_checkout_uses_profile_contact() {
        let (store, robe, _) = seeded().await;
        let user = match store
            .create_user(NewUser {
                email: "mia@shop.test".to_owned(),
                password: "pass-1234".to_owned(),
                first_name: "Mia".to_owned(),
                last_name: "Kos".to_owned(),
                phone: Some("555".to_owned()),
            })
            .await
        {
            Ok(u) => u,
            Err(e) => panic!("create user failed: {e}"),
        };
        let me = Identity::User(user.id);
        assert!(store.add_to_cart(&me, robe, qty(1)).await.is_ok());

        let request = CheckoutRequest {
            contact: ContactInfo { first_name: Some("Spoof".to_owned()), ..ContactInfo::default() },
            ..CheckoutRequest::default()
        };
        let order = match store.checkout(&me, request).await {
            Ok(o) => o,
            Err(e) => panic!("checkout failed: {e}"),
        };
        assert_eq!(order.user, Some(user.id));
        assert_eq!(order.contact.first_name.as_deref(), Some("Mia"));
        assert_eq!(order.contact.phone.as_deref(), Some("555"));
    }

    #[tokio::test]
    async fn orders_are_private_to_their_owner() {
        let (store, robe, _) = seeded().await;
        let alice = Identity::Anonymous(SessionKey::generate());
        let bob = Identity::Anonymous(SessionKey::generate());
        assert!(store.add_to_cart(&alice, robe, qty(1)).await.is_ok());
        let order = match store.checkout(&alice, CheckoutRequest::default()).await {
            Ok(o) => o,
            Err(e) => panic!("checkout failed: {e}"),
        };

        assert_eq!(store.list_orders(&alice).await.map(|o| o.len()).ok(), Some(1));
        assert_eq!(store.list_orders(&bob).await.map(|o| o.len()).ok(), Some(0));
        assert!(matches!(store.get_order(&bob, order.id).await, Err(StoreError::NotFound { .. })));
        assert!(matches!(store.delete_order(&bob, order.id).await, Err(StoreError::NotFound { .. })));
        assert!(store.delete_order(&alice, order.id).await.is_ok());
        assert!(store.get_order(&alice, order.id).await.is_err());
    }

    #[tokio::test]
    async fn payment_and_delivery_are_recorded() {
        let (store, robe, _) = seeded().await;
        let me = Identity::Anonymous(SessionKey::generate());
        assert!(store.add_to_cart(&me, robe, qty(2)).await.is_ok());
        let order = match store.checkout(&me, CheckoutRequest::default()).await {
            Ok(o) => o,
            Err(e) => panic!("checkout failed: {e}"),
        };
        assert_eq!(order.total_price.to_string(), "80.00");

        let paid = match store.set_payment(&me, order.id, PaymentMethod::Card).await {
            Ok(o) => o,
            Err(e) => panic!("set_payment failed: {e}"),
        };
        assert_eq!(paid.payment_method, Some(PaymentMethod::Card));

        let details = DeliveryDetails {
            method: DeliveryMethod::Courier,
            city: "Kyiv".to_owned(),
            address: "Khreshchatyk 1".to_owned(),
            postal_code: None,
        };
        let delivered = match store.set_delivery(&me, order.id, details.clone(), Some(price(450))).await {
            Ok(o) => o,
            Err(e) => panic!("set_delivery failed: {e}"),
        };
        assert_eq!(delivered.delivery, Some(details));
        assert_eq!(delivered.delivery_cost.to_string(), "4.50");
        assert_eq!(delivered.total_price.to_string(), "84.50");
    }

    #[tokio::test]
    async fn contact_only_order_has_zero_total() {
        let (store, _, _) = seeded().await;
        let me = Identity::Anonymous(SessionKey::generate());
        let contact = ContactInfo { phone: Some("+10001".to_owned()), ..ContactInfo::default() };
        let id = match store.add_contact_info(&me, contact).await {
            Ok(id) => id,
            Err(e) => panic!("add_contact_info failed: {e}"),
        };
        let order = match store.get_order(&me, id).await {
            Ok(o) => o,
            Err(e) => panic!("get_order failed: {e}"),
        };
        assert_eq!(order.total_price, Price::ZERO);
        assert!(order.items.is_empty());
        assert_eq!(order.contact.phone.as_deref(), Some("+10001"));
    }
}
