//! Cart endpoints, scoped to the caller's identity.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use shop_core::{CartId, Identity, ProductId, Quantity};
use validator::Validate;

use super::Detail;
use crate::{error::GatewayError, extract::ValidJson, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cart", get(current_cart).post(create_cart))
        .route("/cart/add", post(add_to_cart))
        .route("/cart/remove", post(remove_from_cart))
        .route("/cart/{id}", get(get_cart).delete(delete_cart))
}

const fn one() -> i64 {
    1
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCartBody {
    pub product_id: i64,
    #[validate(range(min = 1, max = 4294967295_i64, message = "Ensure this value is between 1 and 4294967295."))]
    #[serde(default = "one")]
    pub quantity: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RemoveFromCartBody {
    pub product_id: i64,
}

/// `GET /cart`: the caller's cart, created empty on first access.
async fn current_cart(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.store.cart_for(&identity).await?))
}

/// `POST /cart`: create the caller's cart; 400 if one already exists.
async fn create_cart(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, GatewayError> {
    let cart = state.store.create_cart(&identity).await?;
    Ok((StatusCode::CREATED, Json(cart)))
}

/// `POST /cart/add`: add units of a product, merging with an existing line.
async fn add_to_cart(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ValidJson(body): ValidJson<AddToCartBody>,
) -> Result<impl IntoResponse, GatewayError> {
    let quantity = Quantity::new(body.quantity)?;
    state
        .store
        .add_to_cart(&identity, ProductId::from(body.product_id), quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(Detail { detail: "Product added to cart" })))
}

/// `POST /cart/remove`: drop a product line from the cart.
async fn remove_from_cart(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ValidJson(body): ValidJson<RemoveFromCartBody>,
) -> Result<impl IntoResponse, GatewayError> {
    let cart = state
        .store
        .remove_from_cart(&identity, ProductId::from(body.product_id))
        .await?;
    Ok(Json(cart))
}

async fn get_cart(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.store.get_cart(&identity, CartId::from(id)).await?))
}

async fn delete_cart(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, GatewayError> {
    state.store.delete_cart(&identity, CartId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
