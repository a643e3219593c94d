/// Errors produced by the `shop-core` crate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum CoreError {
    /// A price string or number could not be accepted.
    #[error("invalid price '{value}': {reason}")]
    InvalidPrice { value: String, reason: &'static str },

    /// A cart or order quantity was below one or above the line limit.
    #[error("invalid quantity {value}: must be between 1 and 4294967295")]
    InvalidQuantity { value: i64 },

    /// Adding to a cart line would exceed the units one line can hold.
    #[error("a cart line cannot hold more than 4294967295 units")]
    QuantityOverflow,

    /// A session key did not have the expected 32-hex-digit shape.
    #[error("invalid session key")]
    InvalidSessionKey,

    /// Checkout was attempted with no cart lines.
    #[error("Cart is empty. Cannot create an order.")]
    EmptyCart,

    /// A monetary sum exceeded the representable range.
    #[error("amount exceeds the maximum of 10 digits")]
    AmountOverflow,

    /// A stored or submitted enum value was not recognised.
    #[error("unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },
}
