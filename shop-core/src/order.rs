use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::{OrderId, OrderItemId, ProductId, UserId};
use crate::money::{Price, Quantity};

/// One priced line: a unit price and how many units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub unit_price: Price,
    pub quantity: Quantity,
}

impl PricedLine {
    /// Unit price × quantity.
    ///
    /// # Errors
    /// Returns [`CoreError::AmountOverflow`] if the total exceeds ten digits.
    pub fn total(self) -> Result<Price, CoreError> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// Sums the line totals. An empty slice sums to zero.
///
/// # Errors
/// Returns [`CoreError::AmountOverflow`] if any intermediate sum exceeds ten digits.
pub fn subtotal(lines: &[PricedLine]) -> Result<Price, CoreError> {
    lines
        .iter()
        .try_fold(Price::ZERO, |acc, line| acc.checked_add(line.total()?))
}

/// Computes an order total: Σ unit price × quantity, plus delivery.
///
/// # Errors
/// Returns [`CoreError::EmptyCart`] if `lines` is empty, or
/// [`CoreError::AmountOverflow`] if the total exceeds ten digits.
pub fn checkout_total(lines: &[PricedLine], delivery_cost: Price) -> Result<Price, CoreError> {
    if lines.is_empty() {
        return Err(CoreError::EmptyCart);
    }
    subtotal(lines)?.checked_add(delivery_cost)
}

/// How an order is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    CashOnDelivery,
}

impl PaymentMethod {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::CashOnDelivery => "cash_on_delivery",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(Self::Card),
            "cash_on_delivery" => Ok(Self::CashOnDelivery),
            other => Err(CoreError::UnknownVariant { kind: "payment method", value: other.to_owned() }),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an order reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    Courier,
    Pickup,
    Post,
}

impl DeliveryMethod {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Courier => "courier",
            Self::Pickup => "pickup",
            Self::Post => "post",
        }
    }
}

impl FromStr for DeliveryMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "courier" => Ok(Self::Courier),
            "pickup" => Ok(Self::Pickup),
            "post" => Ok(Self::Post),
            other => Err(CoreError::UnknownVariant { kind: "delivery method", value: other.to_owned() }),
        }
    }
}

/// Where and how an order is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryDetails {
    pub method: DeliveryMethod,
    pub city: String,
    pub address: String,
    pub postal_code: Option<String>,
}

/// Contact fields recorded on an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Input to the cart-to-order conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub delivery_cost: Price,
    /// Used for anonymous checkouts only; signed-in users' profile data wins.
    pub contact: ContactInfo,
    pub payment_method: Option<PaymentMethod>,
    pub delivery: Option<DeliveryDetails>,
}

/// A line of a placed order, with the unit price captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product: ProductId,
    pub quantity: Quantity,
    pub price: Price,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user: Option<UserId>,
    #[serde(flatten)]
    pub contact: ContactInfo,
    pub delivery_cost: Price,
    pub total_price: Price,
    pub payment_method: Option<PaymentMethod>,
    pub delivery: Option<DeliveryDetails>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Lines of this order as priced lines.
    #[must_use]
    pub fn priced_lines(&self) -> Vec<PricedLine> {
        self.items
            .iter()
            .map(|item| PricedLine { unit_price: item.price, quantity: item.quantity })
            .collect()
    }
}
