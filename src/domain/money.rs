use crate::error::EngineError;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of decimal places kept for computed monetary values.
pub const MONEY_SCALE: u32 = 2;

/// A non-negative monetary value in the platform's single currency.
///
/// Wraps `rust_decimal::Decimal` so prices and discounts can never go below zero
/// and arithmetic stays exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

/// A strictly positive monetary amount, e.g. an order total a coupon is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, EngineError> {
        if value >= Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(EngineError::BadRequest(
                "Monetary values cannot be negative".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Subtracts `rhs`, flooring the result at zero.
    pub fn saturating_sub(self, rhs: Self) -> Self {
        if rhs.0 >= self.0 {
            Self::ZERO
        } else {
            Self(self.0 - rhs.0)
        }
    }

    /// Rounds half away from zero to [`MONEY_SCALE`] places.
    pub fn rounded(self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero),
        )
    }
}

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, EngineError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(EngineError::BadRequest(
                "Order total must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Money {
    type Error = EngineError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = EngineError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<Money> for Amount {
    type Error = EngineError;

    fn try_from(value: Money) -> Result<Self, Self::Error> {
        Self::new(value.0)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Money {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
