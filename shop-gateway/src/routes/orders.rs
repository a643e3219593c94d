//! Order endpoints: checkout, history, and post-checkout details.

use std::borrow::Cow;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use shop_core::{
    CheckoutRequest, ContactInfo, DeliveryDetails, DeliveryMethod, Identity, OrderId, PaymentMethod,
    Price,
};
use tracing::info;
use validator::{Validate, ValidationError, ValidationErrors};

use super::Detail;
use crate::{error::GatewayError, extract::ValidJson, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/order", get(list_orders).post(place_order))
        .route("/order/create", post(create_order))
        .route("/order/add-contact-info", post(add_contact_info))
        .route("/order/{id}", get(get_order).delete(delete_order))
        .route("/order/{id}/set-payment", post(set_payment))
        .route("/order/{id}/set-delivery", post(set_delivery))
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ContactBody {
    #[validate(length(max = 150))]
    pub first_name: Option<String>,
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
}

impl From<ContactBody> for ContactInfo {
    fn from(body: ContactBody) -> Self {
        Self {
            first_name: body.first_name,
            last_name: body.last_name,
            email: body.email,
            phone: body.phone,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct DeliveryBody {
    pub method: DeliveryMethod,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub city: String,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub address: String,
    pub postal_code: Option<String>,
    /// Replaces the order's delivery cost and recomputes its total.
    pub delivery_cost: Option<Price>,
}

impl DeliveryBody {
    fn into_parts(self) -> (DeliveryDetails, Option<Price>) {
        let details = DeliveryDetails {
            method: self.method,
            city: self.city,
            address: self.address,
            postal_code: self.postal_code,
        };
        (details, self.delivery_cost)
    }
}

/// Checkout input. Contact fields are used only for anonymous callers.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutBody {
    #[serde(default)]
    pub delivery_cost: Option<Price>,
    #[serde(flatten)]
    pub contact: ContactBody,
    pub payment_method: Option<PaymentMethod>,
    pub delivery: Option<DeliveryBody>,
}

// Contact fields are flattened into the body, so their errors are reported
// under their own names rather than nested.
impl Validate for CheckoutBody {
    fn validate(&self) -> Result<(), ValidationErrors> {
        self.contact.validate()?;
        if let Some(delivery) = &self.delivery {
            delivery.validate()?;
            if self.delivery_cost.is_some() && delivery.delivery_cost.is_some() {
                let mut errors = ValidationErrors::new();
                errors.add(
                    "delivery_cost",
                    ValidationError::new("ambiguous")
                        .with_message(Cow::from("Give the delivery cost either at the top level or inside delivery, not both.")),
                );
                return Err(errors);
            }
        }
        Ok(())
    }
}

/// The delivery cost may be sent at the top level or inside `delivery`.
impl From<CheckoutBody> for CheckoutRequest {
    fn from(body: CheckoutBody) -> Self {
        let (delivery, nested_cost) = match body.delivery.map(DeliveryBody::into_parts) {
            Some((details, cost)) => (Some(details), cost),
            None => (None, None),
        };
        Self {
            delivery_cost: body.delivery_cost.or(nested_cost).unwrap_or_default(),
            contact: body.contact.into(),
            payment_method: body.payment_method,
            delivery,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentBody {
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize)]
pub struct ContactAdded {
    pub detail: &'static str,
    pub order_id: OrderId,
}

async fn checkout(state: &AppState, identity: &Identity, body: CheckoutBody) -> Result<shop_core::Order, GatewayError> {
    let order = state.store.checkout(identity, body.into()).await?;
    info!(%identity, order_id = order.id.get(), total = %order.total_price, "checkout complete");
    Ok(order)
}

async fn list_orders(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.store.list_orders(&identity).await?))
}

/// `POST /order`: convert the cart into an order.
async fn place_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ValidJson(body): ValidJson<CheckoutBody>,
) -> Result<impl IntoResponse, GatewayError> {
    let order = checkout(&state, &identity, body).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// `POST /order/create`: same conversion, answered with 200.
async fn create_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ValidJson(body): ValidJson<CheckoutBody>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(checkout(&state, &identity, body).await?))
}

async fn add_contact_info(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ValidJson(body): ValidJson<ContactBody>,
) -> Result<impl IntoResponse, GatewayError> {
    let order_id = state.store.add_contact_info(&identity, body.into()).await?;
    Ok(Json(ContactAdded { detail: "Contact information added successfully", order_id }))
}

async fn get_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.store.get_order(&identity, OrderId::from(id)).await?))
}

async fn delete_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, GatewayError> {
    state.store.delete_order(&identity, OrderId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_payment(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    ValidJson(body): ValidJson<PaymentBody>,
) -> Result<impl IntoResponse, GatewayError> {
    state
        .store
        .set_payment(&identity, OrderId::from(id), body.payment_method)
        .await?;
    Ok(Json(Detail { detail: "Payment method updated successfully" }))
}

async fn set_delivery(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
    ValidJson(body): ValidJson<DeliveryBody>,
) -> Result<impl IntoResponse, GatewayError> {
    let (details, cost) = body.into_parts();
    state
        .store
        .set_delivery(&identity, OrderId::from(id), details, cost)
        .await?;
    Ok(Json(Detail { detail: "Delivery information updated successfully" }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::super::test_support::{app, json, seed_product, send, send_with_cookie, session_cookie};

    /// An anonymous session holding one unit of a product priced `price`.
    async fn session_with_item(app: &axum::Router, store: &shop_store::Store, price: &str) -> String {
        let product = seed_product(store, "Mesh bodysuit", price).await;
        let resp = send(app, "POST", "/api/v1/cart/add", None, Some(json!({"product_id": product}))).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        match session_cookie(&resp) {
            Some(cookie) => cookie,
            None => panic!("no session cookie issued"),
        }
    }

    #[tokio::test]
    async fn delivery_cost_inside_delivery_is_charged() {
        let (app, store) = app().await;
        let cookie = session_with_item(&app, &store, "10.00").await;
        let body = json!({
            "delivery": {"method": "courier", "city": "Kyiv", "address": "A 1", "delivery_cost": "5.00"},
        });
        let resp = send_with_cookie(&app, "POST", "/api/v1/order", &cookie, Some(body)).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let order = json(resp).await;
        assert_eq!(order["delivery_cost"], "5.00");
        assert_eq!(order["total_price"], "15.00");
        assert_eq!(order["delivery"]["city"], "Kyiv");
    }

    #[tokio::test]
    async fn delivery_cost_given_twice_is_rejected() {
        let (app, store) = app().await;
        let cookie = session_with_item(&app, &store, "10.00").await;
        let body = json!({
            "delivery_cost": "3.00",
            "delivery": {"method": "post", "city": "Lviv", "address": "B 2", "delivery_cost": "5.00"},
        });
        let resp = send_with_cookie(&app, "POST", "/api/v1/order", &cookie, Some(body)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(json(resp).await["errors"]["delivery_cost"].is_array());

        let cart = json(send_with_cookie(&app, "GET", "/api/v1/cart", &cookie, None).await).await;
        assert_eq!(cart["items"].as_array().map(Vec::len), Some(1), "cart must be untouched");
    }

    #[tokio::test]
    async fn payment_method_can_be_set_after_checkout() {
        let (app, store) = app().await;
        let cookie = session_with_item(&app, &store, "20.00").await;
        let resp = send_with_cookie(&app, "POST", "/api/v1/order", &cookie, Some(json!({}))).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let order = json(resp).await;
        assert!(order["payment_method"].is_null());
        let id = order["id"].as_i64().unwrap_or_default();

        let uri = format!("/api/v1/order/{id}/set-payment");
        let resp = send_with_cookie(&app, "POST", &uri, &cookie, Some(json!({"payment_method": "cash_on_delivery"}))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json(resp).await["detail"], "Payment method updated successfully");

        let order = json(send_with_cookie(&app, "GET", &format!("/api/v1/order/{id}"), &cookie, None).await).await;
        assert_eq!(order["payment_method"], "cash_on_delivery");

        let resp = send(&app, "POST", &uri, None, Some(json!({"payment_method": "card"}))).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "another session cannot touch the order");
    }

    #[tokio::test]
    async fn empty_cart_checkout_is_a_bad_request() {
        let (app, _) = app().await;
        let resp = send(&app, "POST", "/api/v1/order", None, Some(json!({}))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(resp).await["detail"], "Cart is empty. Cannot create an order.");
    }

    #[tokio::test]
    async fn invalid_contact_email_is_rejected() {
        let (app, _) = app().await;
        let resp = send(&app, "POST", "/api/v1/order/add-contact-info", None, Some(json!({"email": "nope"}))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(resp).await["errors"]["email"][0], "Enter a valid email address.");
    }

    #[tokio::test]
    async fn unknown_payment_method_is_rejected() {
        let (app, _) = app().await;
        let resp = send(&app, "POST", "/api/v1/order/1/set-payment", None, Some(json!({"payment_method": "barter"}))).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn contact_only_order_is_returned_by_id() {
        let (app, _) = app().await;
        let resp = send(
            &app,
            "POST",
            "/api/v1/order/add-contact-info",
            None,
            Some(json!({"first_name": "Iva", "phone": "+380"})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json(resp).await;
        assert_eq!(body["detail"], "Contact information added successfully");
        assert!(body["order_id"].is_i64());
    }
}
