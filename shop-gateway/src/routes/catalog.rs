//! Catalog endpoints: attributes, collections, products, images, comments.
//!
//! Everyone may read; writes need a staff account. Product images are
//! staff-only for reads too, and comments need any signed-in user.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use shop_core::{
    AttributeId, AttributeKind, CollectionId, CommentId, ImageId, ImageInput, NewProduct, Price,
    ProductChanges, ProductId, ProductRelations,
};
use tracing::info;
use validator::Validate;

use super::nullable;
use crate::{
    error::GatewayError,
    extract::{CurrentUser, StaffUser, ValidJson},
    state::AppState,
};

fn too_long(max: usize) -> String {
    format!("Ensure this field has no more than {max} characters.")
}

/// URL segment under which each attribute kind is served.
const fn segment(kind: AttributeKind) -> &'static str {
    match kind {
        AttributeKind::Color => "color",
        AttributeKind::Size => "size",
        AttributeKind::Brand => "brands",
        AttributeKind::Category => "categories",
    }
}

pub fn router() -> Router<AppState> {
    let mut router = Router::new();
    for kind in AttributeKind::ALL {
        router = router.merge(attribute_routes(kind));
    }
    router
        .route("/collections", get(list_collections).post(create_collection))
        .route(
            "/collections/{id}",
            get(get_collection).put(replace_collection).patch(patch_collection),
        )
        .route("/products", get(list_products).post(create_product))
        .route("/products/on-sales", get(on_sale_products))
        .route("/products/{id}", get(get_product).put(replace_product).patch(patch_product))
        .route("/products/{id}/add_comment", post(add_comment))
        .route("/comments", get(list_comments))
        .route(
            "/comments/{id}",
            get(get_comment).put(update_comment).patch(update_comment).delete(delete_comment),
        )
        .route("/product-images", get(list_images).post(create_image))
        .route(
            "/product-images/{id}",
            get(get_image).put(replace_image).patch(patch_image).delete(delete_image),
        )
}

// ── Attributes ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct AttributeBody {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AttributePatch {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub name: Option<String>,
}

fn check_attribute_name(kind: AttributeKind, name: &str) -> Result<(), GatewayError> {
    let max = kind.max_name_len();
    if name.chars().count() > max {
        return Err(GatewayError::field("name", too_long(max)));
    }
    Ok(())
}

fn attribute_routes(kind: AttributeKind) -> Router<AppState> {
    let base = format!("/{}", segment(kind));
    let item = format!("/{}/{{id}}", segment(kind));
    Router::new()
        .route(
            &base,
            get(move |state: State<AppState>| list_attributes(state, kind)).post(
                move |state: State<AppState>, staff: StaffUser, body: ValidJson<AttributeBody>| {
                    create_attribute(state, kind, staff, body)
                },
            ),
        )
        .route(
            &item,
            get(move |state: State<AppState>, id: Path<i64>| get_attribute(state, kind, id))
                .put(
                    move |state: State<AppState>,
                          staff: StaffUser,
                          id: Path<i64>,
                          body: ValidJson<AttributeBody>| {
                        rename_attribute(state, kind, staff, id, body)
                    },
                )
                .patch(
                    move |state: State<AppState>,
                          staff: StaffUser,
                          id: Path<i64>,
                          body: ValidJson<AttributePatch>| {
                        patch_attribute(state, kind, staff, id, body)
                    },
                )
                .delete(move |state: State<AppState>, staff: StaffUser, id: Path<i64>| {
                    delete_attribute(state, kind, staff, id)
                }),
        )
}

async fn list_attributes(State(state): State<AppState>, kind: AttributeKind) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.store.list_attributes(kind).await?))
}

async fn get_attribute(
    State(state): State<AppState>,
    kind: AttributeKind,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.store.get_attribute(kind, AttributeId::from(id)).await?))
}

async fn create_attribute(
    State(state): State<AppState>,
    kind: AttributeKind,
    StaffUser(_): StaffUser,
    ValidJson(body): ValidJson<AttributeBody>,
) -> Result<impl IntoResponse, GatewayError> {
    check_attribute_name(kind, &body.name)?;
    let attribute = state.store.create_attribute(kind, &body.name).await?;
    Ok((StatusCode::CREATED, Json(attribute)))
}

async fn rename_attribute(
    State(state): State<AppState>,
    kind: AttributeKind,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
    ValidJson(body): ValidJson<AttributeBody>,
) -> Result<impl IntoResponse, GatewayError> {
    check_attribute_name(kind, &body.name)?;
    Ok(Json(state.store.rename_attribute(kind, AttributeId::from(id), &body.name).await?))
}

async fn patch_attribute(
    State(state): State<AppState>,
    kind: AttributeKind,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
    ValidJson(body): ValidJson<AttributePatch>,
) -> Result<impl IntoResponse, GatewayError> {
    let id = AttributeId::from(id);
    let attribute = match body.name {
        Some(name) => {
            check_attribute_name(kind, &name)?;
            state.store.rename_attribute(kind, id, &name).await?
        }
        None => state.store.get_attribute(kind, id).await?,
    };
    Ok(Json(attribute))
}

async fn delete_attribute(
    State(state): State<AppState>,
    kind: AttributeKind,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, GatewayError> {
    state.store.delete_attribute(kind, AttributeId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Collections ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct CollectionBody {
    #[validate(length(min = 1, max = 255, message = "Ensure this field has 1 to 255 characters."))]
    pub name: String,
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CollectionPatch {
    #[validate(length(min = 1, max = 255, message = "Ensure this field has 1 to 255 characters."))]
    pub name: Option<String>,
    pub image: Option<String>,
}

async fn list_collections(State(state): State<AppState>) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.store.list_collections().await?))
}

async fn get_collection(State(state): State<AppState>, Path(id): Path<i64>) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.store.get_collection(CollectionId::from(id)).await?))
}

async fn create_collection(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    ValidJson(body): ValidJson<CollectionBody>,
) -> Result<impl IntoResponse, GatewayError> {
    let collection = state.store.create_collection(&body.name, &body.image).await?;
    Ok((StatusCode::CREATED, Json(collection)))
}

async fn replace_collection(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
    ValidJson(body): ValidJson<CollectionBody>,
) -> Result<impl IntoResponse, GatewayError> {
    let collection = state
        .store
        .update_collection(CollectionId::from(id), Some(&body.name), Some(&body.image))
        .await?;
    Ok(Json(collection))
}

async fn patch_collection(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
    ValidJson(body): ValidJson<CollectionPatch>,
) -> Result<impl IntoResponse, GatewayError> {
    let collection = state
        .store
        .update_collection(CollectionId::from(id), body.name.as_deref(), body.image.as_deref())
        .await?;
    Ok(Json(collection))
}

// ── Products ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ImageBody {
    #[serde(default)]
    pub id: Option<i64>,
    pub image: String,
    #[serde(default)]
    pub is_main: bool,
}

impl From<ImageBody> for ImageInput {
    fn from(body: ImageBody) -> Self {
        Self { id: body.id.map(ImageId::from), image: body.image, is_main: body.is_main }
    }
}

fn check_images(images: &[ImageBody]) -> Result<(), GatewayError> {
    if images.iter().any(|i| i.image.trim().is_empty()) {
        return Err(GatewayError::field("images", "Each image needs a non-blank path."));
    }
    Ok(())
}

fn default_true() -> bool {
    true
}

/// Full product representation accepted by create and replace.
#[derive(Debug, Deserialize, Validate)]
pub struct ProductBody {
    #[validate(length(min = 1, max = 150, message = "Ensure this field has 1 to 150 characters."))]
    pub title: String,
    #[serde(default)]
    pub color: Vec<String>,
    #[serde(default)]
    pub brand: Vec<String>,
    #[serde(default)]
    pub size: Vec<String>,
    #[serde(default)]
    pub collection: Vec<String>,
    #[serde(default)]
    pub category: Vec<String>,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub description: String,
    pub price: Price,
    #[serde(default)]
    pub images: Vec<ImageBody>,
    #[serde(default)]
    pub is_sales: bool,
    #[serde(default)]
    pub rating: Option<f64>,
    #[validate(length(max = 10, message = "Ensure this field has no more than 10 characters."))]
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default = "default_true")]
    pub available: bool,
}

impl From<ProductBody> for NewProduct {
    fn from(body: ProductBody) -> Self {
        Self {
            title: body.title,
            description: body.description,
            price: body.price,
            relations: ProductRelations {
                color: body.color,
                brand: body.brand,
                size: body.size,
                collection: body.collection,
                category: body.category,
            },
            images: body.images.into_iter().map(ImageInput::from).collect(),
            is_sales: body.is_sales,
            rating: body.rating,
            code: body.code,
            available: body.available,
        }
    }
}

impl From<ProductBody> for ProductChanges {
    fn from(body: ProductBody) -> Self {
        Self {
            title: Some(body.title),
            description: Some(body.description),
            price: Some(body.price),
            color: Some(body.color),
            brand: Some(body.brand),
            size: Some(body.size),
            collection: Some(body.collection),
            category: Some(body.category),
            images: Some(body.images.into_iter().map(ImageInput::from).collect()),
            is_sales: Some(body.is_sales),
            rating: Some(body.rating),
            code: body.code,
            available: Some(body.available),
        }
    }
}

/// Partial product update; absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProductPatch {
    #[validate(length(min = 1, max = 150, message = "Ensure this field has 1 to 150 characters."))]
    pub title: Option<String>,
    pub color: Option<Vec<String>>,
    pub brand: Option<Vec<String>>,
    pub size: Option<Vec<String>>,
    pub collection: Option<Vec<String>>,
    pub category: Option<Vec<String>>,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub description: Option<String>,
    pub price: Option<Price>,
    pub images: Option<Vec<ImageBody>>,
    pub is_sales: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub rating: Option<Option<f64>>,
    #[validate(length(max = 10, message = "Ensure this field has no more than 10 characters."))]
    pub code: Option<String>,
    pub available: Option<bool>,
}

impl From<ProductPatch> for ProductChanges {
    fn from(patch: ProductPatch) -> Self {
        Self {
            title: patch.title,
            description: patch.description,
            price: patch.price,
            color: patch.color,
            brand: patch.brand,
            size: patch.size,
            collection: patch.collection,
            category: patch.category,
            images: patch.images.map(|images| images.into_iter().map(ImageInput::from).collect()),
            is_sales: patch.is_sales,
            rating: patch.rating,
            code: patch.code,
            available: patch.available,
        }
    }
}

async fn list_products(State(state): State<AppState>) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.store.list_products().await?))
}

async fn on_sale_products(State(state): State<AppState>) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.store.on_sale_products().await?))
}

async fn get_product(State(state): State<AppState>, Path(id): Path<i64>) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.store.get_product(ProductId::from(id)).await?))
}

async fn create_product(
    State(state): State<AppState>,
    StaffUser(staff): StaffUser,
    ValidJson(body): ValidJson<ProductBody>,
) -> Result<impl IntoResponse, GatewayError> {
    check_images(&body.images)?;
    let product = state.store.create_product(body.into()).await?;
    info!(product_id = product.id.get(), staff_id = staff.id.get(), "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

async fn replace_product(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
    ValidJson(body): ValidJson<ProductBody>,
) -> Result<impl IntoResponse, GatewayError> {
    check_images(&body.images)?;
    Ok(Json(state.store.update_product(ProductId::from(id), body.into()).await?))
}

async fn patch_product(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
    ValidJson(body): ValidJson<ProductPatch>,
) -> Result<impl IntoResponse, GatewayError> {
    if let Some(images) = &body.images {
        check_images(images)?;
    }
    Ok(Json(state.store.update_product(ProductId::from(id), body.into()).await?))
}

// ── Comments ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct CommentBody {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub text: String,
}

async fn add_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    ValidJson(body): ValidJson<CommentBody>,
) -> Result<impl IntoResponse, GatewayError> {
    let comment = state.store.add_comment(ProductId::from(id), user.id, &body.text).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn list_comments(State(state): State<AppState>, CurrentUser(_): CurrentUser) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.store.list_comments().await?))
}

async fn get_comment(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.store.get_comment(CommentId::from(id)).await?))
}

async fn update_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    ValidJson(body): ValidJson<CommentBody>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.store.update_comment(CommentId::from(id), &user, &body.text).await?))
}

async fn delete_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, GatewayError> {
    state.store.delete_comment(CommentId::from(id), &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Product images ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct NewImageBody {
    pub product: i64,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub image: String,
    #[serde(default)]
    pub is_main: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ImagePatch {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub image: Option<String>,
    pub is_main: Option<bool>,
}

async fn list_images(State(state): State<AppState>, StaffUser(_): StaffUser) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.store.list_images().await?))
}

async fn get_image(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(state.store.get_image(ImageId::from(id)).await?))
}

async fn create_image(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    ValidJson(body): ValidJson<NewImageBody>,
) -> Result<impl IntoResponse, GatewayError> {
    let image = state
        .store
        .create_image(ProductId::from(body.product), &body.image, body.is_main)
        .await?;
    Ok((StatusCode::CREATED, Json(image)))
}

async fn replace_image(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
    ValidJson(body): ValidJson<NewImageBody>,
) -> Result<impl IntoResponse, GatewayError> {
    let current = state.store.get_image(ImageId::from(id)).await?;
    if current.product.get() != body.product {
        return Err(GatewayError::field("product", "An image cannot be moved to another product."));
    }
    let image = state
        .store
        .update_image(ImageId::from(id), Some(&body.image), Some(body.is_main))
        .await?;
    Ok(Json(image))
}

async fn patch_image(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
    ValidJson(body): ValidJson<ImagePatch>,
) -> Result<impl IntoResponse, GatewayError> {
    let image = state
        .store
        .update_image(ImageId::from(id), body.image.as_deref(), body.is_main)
        .await?;
    Ok(Json(image))
}

async fn delete_image(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, GatewayError> {
    state.store.delete_image(ImageId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
