//! Core types for the shop backend.
//!
//! Defines the domain vocabulary shared by the store and the HTTP gateway:
//! identifiers, money, the catalog, carts, orders and users, plus the pure
//! arithmetic behind checkout.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod cart;
pub mod catalog;
pub mod error;
pub mod id;
pub mod money;
pub mod order;
pub mod user;

pub use cart::{Cart, CartLine};
pub use catalog::{
    generate_product_code, Attribute, AttributeKind, Collection, Comment, ImageInput, NewProduct,
    Product, ProductChanges, ProductImage, ProductRelations, ProductSummary,
};
pub use error::CoreError;
pub use id::{
    AttributeId, CartId, CartItemId, CollectionId, CommentId, Identity, ImageId, OrderId,
    OrderItemId, ProductId, SessionKey, UserId,
};
pub use money::{Price, Quantity};
pub use order::{
    checkout_total, subtotal, CheckoutRequest, ContactInfo, DeliveryDetails, DeliveryMethod,
    Order, OrderItem, PaymentMethod, PricedLine,
};
pub use user::{NewUser, User, UserChanges};
