use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::id::{AttributeId, CollectionId, CommentId, ImageId, ProductId, UserId};
use crate::money::Price;

/// Maximum length of a product code.
pub const PRODUCT_CODE_MAX_LEN: usize = 10;

/// The simple named lookups a product can be tagged with.
///
/// All four share one shape (`id`, unique `name`) and are managed through
/// the same code path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Color,
    Size,
    Brand,
    Category,
}

impl AttributeKind {
    /// Every attribute kind, in display order.
    pub const ALL: [Self; 4] = [Self::Color, Self::Size, Self::Brand, Self::Category];

    /// Maximum length of a name of this kind.
    #[must_use]
    pub const fn max_name_len(self) -> usize {
        match self {
            Self::Color => 50,
            Self::Size => 10,
            Self::Brand | Self::Category => 100,
        }
    }

    /// Singular label used in messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Color => "color",
            Self::Size => "size",
            Self::Brand => "brand",
            Self::Category => "category",
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A color, size, brand or category row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: AttributeId,
    pub name: String,
}

/// A named, illustrated group of products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
    /// Path or URL of the collection image.
    pub image: String,
}

/// A picture attached to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: ImageId,
    pub product: ProductId,
    /// Path or URL of the stored image.
    pub image: String,
    /// Whether this is the product's lead image.
    pub is_main: bool,
}

/// Full product representation returned by the detail endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub color: Vec<String>,
    pub brand: Vec<String>,
    pub size: Vec<String>,
    pub collection: Vec<String>,
    pub category: Vec<String>,
    pub description: String,
    pub price: Price,
    pub images: Vec<ProductImage>,
    /// Number of comments left on the product.
    pub reviews: i64,
    pub is_sales: bool,
    pub rating: Option<f64>,
    pub code: String,
    pub available: bool,
}

/// Compact product representation used in listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub title: String,
    pub images: Vec<ProductImage>,
    pub price: Price,
}

/// Relation names attached to a product, resolved by name on write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductRelations {
    pub color: Vec<String>,
    pub brand: Vec<String>,
    pub size: Vec<String>,
    pub collection: Vec<String>,
    pub category: Vec<String>,
}

/// Image data supplied inline with a product write.
///
/// When `id` is set on update, the matching image of the product is
/// updated in place; otherwise a new image is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub id: Option<ImageId>,
    pub image: String,
    pub is_main: bool,
}

/// Data for a new product.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub title: String,
    pub description: String,
    pub price: Price,
    pub relations: ProductRelations,
    pub images: Vec<ImageInput>,
    pub is_sales: bool,
    pub rating: Option<f64>,
    /// Generated with [`generate_product_code`] when absent.
    pub code: Option<String>,
    pub available: bool,
}

/// A full or partial product update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Price>,
    pub color: Option<Vec<String>>,
    pub brand: Option<Vec<String>>,
    pub size: Option<Vec<String>>,
    pub collection: Option<Vec<String>>,
    pub category: Option<Vec<String>>,
    pub images: Option<Vec<ImageInput>>,
    pub is_sales: Option<bool>,
    pub rating: Option<Option<f64>>,
    pub code: Option<String>,
    pub available: Option<bool>,
}

/// A customer comment on a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub product: ProductId,
    pub user: UserId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Generates a product code: the first 8 characters of a random UUID,
/// uppercased.
#[must_use]
pub fn generate_product_code() -> String {
    let mut code = Uuid::new_v4().to_string();
    code.truncate(8);
    code.to_uppercase()
}
