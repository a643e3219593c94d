use std::{fmt, str::FromStr};

use bigdecimal::{BigDecimal, ToPrimitive};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// A non-negative amount of money with two decimal places.
///
/// Stored as integer cents. Mirrors a `DECIMAL(10, 2)` column, so the
/// largest representable amount is `99999999.99`.
///
/// Serialized as a decimal string (`"12.50"`); deserialization also
/// accepts JSON numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(i64);

impl Price {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Largest amount in cents that fits ten decimal digits.
    pub const MAX_CENTS: i64 = 9_999_999_999;

    /// Creates a price from an amount in cents.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidPrice`] if `cents` is negative, or
    /// [`CoreError::AmountOverflow`] if it exceeds [`Price::MAX_CENTS`].
    pub fn from_cents(cents: i64) -> Result<Self, CoreError> {
        if cents < 0 {
            return Err(CoreError::InvalidPrice {
                value: cents.to_string(),
                reason: "must not be negative",
            });
        }
        if cents > Self::MAX_CENTS {
            return Err(CoreError::AmountOverflow);
        }
        Ok(Self(cents))
    }

    /// Returns the amount in cents.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Adds two prices.
    ///
    /// # Errors
    /// Returns [`CoreError::AmountOverflow`] if the sum exceeds ten digits.
    pub fn checked_add(self, other: Self) -> Result<Self, CoreError> {
        let sum = self.0.checked_add(other.0).ok_or(CoreError::AmountOverflow)?;
        Self::from_cents(sum)
    }

    /// Multiplies a unit price by a quantity.
    ///
    /// # Errors
    /// Returns [`CoreError::AmountOverflow`] if the product exceeds ten digits.
    pub fn checked_mul(self, quantity: Quantity) -> Result<Self, CoreError> {
        let total = self
            .0
            .checked_mul(i64::from(quantity.get()))
            .ok_or(CoreError::AmountOverflow)?;
        Self::from_cents(total)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Price {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| CoreError::InvalidPrice { value: s.to_owned(), reason };

        let decimal = BigDecimal::from_str(s.trim()).map_err(|_| invalid("not a decimal number"))?;
        if decimal < BigDecimal::from(0) {
            return Err(invalid("must not be negative"));
        }
        let (_, scale) = decimal.as_bigint_and_exponent();
        if scale > 2 {
            return Err(invalid("no more than 2 decimal places are allowed"));
        }
        // Exponent form like "1e900000000" would otherwise be expanded in full.
        if scale < -10 {
            return Err(CoreError::AmountOverflow);
        }
        let cents = (decimal * BigDecimal::from(100))
            .to_i64()
            .ok_or(CoreError::AmountOverflow)?;
        Self::from_cents(cents)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PriceVisitor;

        impl de::Visitor<'_> for PriceVisitor {
            type Value = Price;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a decimal amount with at most 2 decimal places")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Price, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Price, E> {
                v.to_string().parse().map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Price, E> {
                v.to_string().parse().map_err(E::custom)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Price, E> {
                v.to_string().parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(PriceVisitor)
    }
}

/// A positive number of units of one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quantity(u32);

impl Quantity {
    /// One unit.
    pub const ONE: Self = Self(1);

    /// Creates a quantity.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidQuantity`] if `value` is below one or
    /// does not fit in `u32`.
    pub fn new(value: i64) -> Result<Self, CoreError> {
        match u32::try_from(value) {
            Ok(v) if v >= 1 => Ok(Self(v)),
            _ => Err(CoreError::InvalidQuantity { value }),
        }
    }

    /// Returns the number of units.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Adds two quantities.
    ///
    /// # Errors
    /// Returns [`CoreError::QuantityOverflow`] if the sum exceeds `u32::MAX`.
    pub fn checked_add(self, other: Self) -> Result<Self, CoreError> {
        self.0.checked_add(other.0).map(Self).ok_or(CoreError::QuantityOverflow)
    }
}

impl TryFrom<i64> for Quantity {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for i64 {
    fn from(q: Quantity) -> Self {
        i64::from(q.0)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn price_parses_two_decimal_places() {
        let price: Price = match "12.50".parse() {
            Ok(p) => p,
            Err(e) => panic!("unexpected error: {e}"),
        };
        assert_eq!(price.cents(), 1250);
        assert_eq!(price.to_string(), "12.50");
    }

    #[test]
    fn price_parses_whole_numbers() {
        let price: Price = match "7".parse() {
            Ok(p) => p,
            Err(e) => panic!("unexpected error: {e}"),
        };
        assert_eq!(price.to_string(), "7.00");
    }

    #[test]
    fn price_rejects_negative_and_excess_precision() {
        assert!("-1.00".parse::<Price>().is_err(), "negative must be rejected");
        assert!("1.005".parse::<Price>().is_err(), "three decimals must be rejected");
        assert!("abc".parse::<Price>().is_err(), "garbage must be rejected");
    }

    #[test]
    fn price_rejects_more_than_ten_digits() {
        assert_eq!("100000000.00".parse::<Price>(), Err(CoreError::AmountOverflow));
        assert!("99999999.99".parse::<Price>().is_ok());
        assert_eq!("1e900000000".parse::<Price>(), Err(CoreError::AmountOverflow));
    }

    #[test]
    fn price_deserializes_from_string_and_number() {
        let from_str: Price = match serde_json::from_str("\"3.10\"") {
            Ok(p) => p,
            Err(e) => panic!("string form failed: {e}"),
        };
        let from_num: Price = match serde_json::from_str("3.1") {
            Ok(p) => p,
            Err(e) => panic!("number form failed: {e}"),
        };
        assert_eq!(from_str, from_num);
        assert_eq!(serde_json::to_string(&from_str).ok().as_deref(), Some("\"3.10\""));
    }

    #[test]
    fn quantity_rejects_zero_and_negative() {
        assert!(Quantity::new(0).is_err());
        assert!(Quantity::new(-3).is_err());
        assert_eq!(Quantity::new(2).map(Quantity::get), Ok(2));
    }

    #[test]
    fn quantity_sum_past_u32_is_an_overflow() {
        let max = Quantity::new(i64::from(u32::MAX)).unwrap_or(Quantity::ONE);
        assert_eq!(max.checked_add(Quantity::ONE), Err(CoreError::QuantityOverflow));
        assert_eq!(Quantity::ONE.checked_add(Quantity::ONE).map(Quantity::get), Ok(2));
        assert!(Quantity::new(5_000_000_000).is_err());
    }

    #[test]
    fn checked_mul_detects_overflow() {
        let price = match Price::from_cents(Price::MAX_CENTS) {
            Ok(p) => p,
            Err(e) => panic!("unexpected error: {e}"),
        };
        let two = match Quantity::new(2) {
            Ok(q) => q,
            Err(e) => panic!("unexpected error: {e}"),
        };
        assert_eq!(price.checked_mul(two), Err(CoreError::AmountOverflow));
    }

    proptest! {
        #[test]
        fn display_then_parse_preserves_cents(cents in 0_i64..=Price::MAX_CENTS) {
            let price = Price::from_cents(cents).map_err(|e| TestCaseError::fail(e.to_string()))?;
            let reparsed: Price = price.to_string().parse().map_err(|e: CoreError| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(reparsed, price);
        }

        #[test]
        fn line_total_matches_integer_arithmetic(cents in 0_i64..1_000_000, qty in 1_i64..1_000) {
            let price = Price::from_cents(cents).map_err(|e| TestCaseError::fail(e.to_string()))?;
            let quantity = Quantity::new(qty).map_err(|e| TestCaseError::fail(e.to_string()))?;
            let total = price.checked_mul(quantity).map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(total.cents(), cents * qty);
        }
    }
}
