//! Prices and discounts using decimal arithmetic.

use core::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize};

/// A catalog price in the store's currency.
///
/// The nursery sells in a single currency, so only the amount is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from an amount in cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// The raw decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// The price after applying `discount`, rounded half-up to cents.
    #[must_use]
    pub fn discounted(&self, discount: DiscountPercent) -> Self {
        if discount.is_zero() {
            return *self;
        }
        let remaining = Decimal::from(100 - u32::from(discount.get()));
        let amount = (self.0 * remaining / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        Self(amount)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

/// Errors that can occur when building a [`DiscountPercent`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscountPercentError {
    /// The value is above 100.
    #[error("discount must be between 0 and 100 (got {0})")]
    OutOfRange(u32),
}

/// A whole-number discount between 0 and 100 percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
#[serde(transparent)]
pub struct DiscountPercent(u8);

impl DiscountPercent {
    /// No discount.
    pub const NONE: Self = Self(0);

    /// Build a discount, rejecting values above 100.
    ///
    /// # Errors
    ///
    /// Returns `DiscountPercentError::OutOfRange` if `percent > 100`.
    pub fn new(percent: u32) -> Result<Self, DiscountPercentError> {
        u8::try_from(percent)
            .ok()
            .filter(|p| *p <= 100)
            .map(Self)
            .ok_or(DiscountPercentError::OutOfRange(percent))
    }

    /// The percentage value.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Whether this is a zero discount.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

/// Accepts `null` as no discount and rounds fractional percentages.
impl<'de> Deserialize<'de> for DiscountPercent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let Some(raw) = Option::<Decimal>::deserialize(deserializer)? else {
            return Ok(Self::NONE);
        };
        let whole = raw
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u32()
            .ok_or_else(|| serde::de::Error::custom(format!("invalid discount {raw}")))?;
        Self::new(whole).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_discounted_rounds_to_cents() {
        let price = Price::from_cents(1999);
        let sale = price.discounted(DiscountPercent::new(15).unwrap());
        // 19.99 * 0.85 = 16.9915
        assert_eq!(sale, Price::from_cents(1699));
    }

    #[test]
    fn test_zero_and_full_discount() {
        let price = Price::from_cents(1250);
        assert_eq!(price.discounted(DiscountPercent::NONE), price);
        assert_eq!(
            price.discounted(DiscountPercent::new(100).unwrap()),
            Price::from_cents(0)
        );
    }

    #[test]
    fn test_discount_range() {
        assert!(DiscountPercent::new(100).is_ok());
        assert_eq!(
            DiscountPercent::new(101),
            Err(DiscountPercentError::OutOfRange(101))
        );
        assert!(serde_json::from_str::<DiscountPercent>("250").is_err());
        assert!(serde_json::from_str::<DiscountPercent>("-5").is_err());
        assert_eq!(
            serde_json::from_str::<DiscountPercent>("20").unwrap().get(),
            20
        );
    }

    #[test]
    fn test_discount_null_and_fractional() {
        assert_eq!(
            serde_json::from_str::<DiscountPercent>("null").unwrap(),
            DiscountPercent::NONE
        );
        assert_eq!(
            serde_json::from_str::<DiscountPercent>("12.5").unwrap().get(),
            13
        );
    }

    #[test]
    fn test_price_from_json_number_and_display() {
        let price: Price = serde_json::from_str("24.5").unwrap();
        assert_eq!(price, Price::from_cents(2450));
        assert_eq!(price.to_string(), "$24.50");
    }
}
