use super::ids::CouponId;
use super::money::{Amount, Money};
use crate::error::EngineError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

/// A named discount rule.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub discount_type: DiscountType,
    /// Percent (0, 100] for `Percentage`, flat amount for `Fixed`.
    pub discount_value: Decimal,
    #[serde(default)]
    pub min_order_amount: Option<Money>,
    #[serde(default)]
    pub max_discount_amount: Option<Money>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub usage_limit: Option<u32>,
    #[serde(default)]
    pub used_count: u32,
}

fn default_active() -> bool {
    true
}

/// Why a coupon cannot be applied. The display text is shown to the student.
#[derive(Debug, Error, PartialEq, Clone)]
pub enum CouponRejection {
    #[error("Coupon is not active")]
    Inactive,
    #[error("Coupon is not valid yet")]
    NotYetValid,
    #[error("Coupon has expired")]
    Expired,
    #[error("Coupon usage limit has been reached")]
    UsageLimitReached,
    #[error("Minimum order amount for this coupon is {0}")]
    BelowMinimum(Money),
    #[error("Order total is too large")]
    TotalTooLarge,
}

/// Outcome of a successful evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Discount {
    pub amount: Money,
    pub final_price: Money,
}

impl Coupon {
    /// Checks state, validity window and usage limit, in that order.
    pub fn check_usable(&self, now: DateTime<Utc>) -> Result<(), CouponRejection> {
        if !self.is_active {
            return Err(CouponRejection::Inactive);
        }
        if let Some(from) = self.valid_from
            && now < from
        {
            return Err(CouponRejection::NotYetValid);
        }
        if let Some(to) = self.valid_to
            && now > to
        {
            return Err(CouponRejection::Expired);
        }
        if let Some(limit) = self.usage_limit
            && self.used_count >= limit
        {
            return Err(CouponRejection::UsageLimitReached);
        }
        Ok(())
    }

    /// Decides whether the coupon applies to `order_total` and computes the discount.
    ///
    /// Pure: never touches `used_count`. Usage is recorded by the completion
    /// transaction once the order is paid.
    pub fn evaluate(
        &self,
        order_total: Amount,
        now: DateTime<Utc>,
    ) -> Result<Discount, CouponRejection> {
        self.check_usable(now)?;

        let total = Money::from(order_total);
        if let Some(minimum) = self.min_order_amount
            && total < minimum
        {
            return Err(CouponRejection::BelowMinimum(minimum));
        }

        let raw = match self.discount_type {
            DiscountType::Percentage => order_total
                .value()
                .checked_mul(self.discount_value)
                .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
                .ok_or(CouponRejection::TotalTooLarge)?,
            DiscountType::Fixed => self.discount_value.min(order_total.value()),
        };
        // A negative rule yields no discount.
        let mut amount = Money::new(raw).unwrap_or(Money::ZERO).rounded();
        if let Some(cap) = self.max_discount_amount {
            amount = amount.min(cap);
        }

        Ok(Discount {
            amount,
            final_price: total.saturating_sub(amount),
        })
    }

    /// Sanity checks applied when coupon definitions are loaded.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.code.trim().is_empty() {
            return Err(EngineError::BadRequest(
                "Coupon code cannot be empty".to_string(),
            ));
        }
        match self.discount_type {
            DiscountType::Percentage
                if self.discount_value <= Decimal::ZERO
                    || self.discount_value > Decimal::ONE_HUNDRED =>
            {
                return Err(EngineError::BadRequest(format!(
                    "Coupon {}: percentage must be within (0, 100]",
                    self.code
                )));
            }
            DiscountType::Fixed if self.discount_value <= Decimal::ZERO => {
                return Err(EngineError::BadRequest(format!(
                    "Coupon {}: fixed discount must be positive",
                    self.code
                )));
            }
            _ => {}
        }
        if let (Some(from), Some(to)) = (self.valid_from, self.valid_to)
            && from > to
        {
            return Err(EngineError::BadRequest(format!(
                "Coupon {}: valid_from is after valid_to",
                self.code
            )));
        }
        if let Some(limit) = self.usage_limit
            && self.used_count > limit
        {
            return Err(EngineError::BadRequest(format!(
                "Coupon {}: used_count exceeds usage_limit",
                self.code
            )));
        }
        Ok(())
    }

    /// Records one use. Refuses to go past the usage limit.
    pub fn record_use(&mut self) -> Result<(), CouponRejection> {
        if let Some(limit) = self.usage_limit
            && self.used_count >= limit
        {
            return Err(CouponRejection::UsageLimitReached);
        }
        self.used_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn coupon(discount_type: DiscountType, value: Decimal) -> Coupon {
        Coupon {
            id: CouponId(1),
            code: "SAVE20".to_string(),
            discount_type,
            discount_value: value,
            min_order_amount: None,
            max_discount_amount: None,
            is_active: true,
            valid_from: None,
            valid_to: None,
            usage_limit: None,
            used_count: 0,
        }
    }

    fn total(value: Decimal) -> Amount {
        Amount::new(value).unwrap()
    }

    #[test]
    fn test_percentage_without_cap() {
        let c = coupon(DiscountType::Percentage, dec!(20));
        let d = c.evaluate(total(dec!(100)), Utc::now()).unwrap();
        assert_eq!(d.amount.value(), dec!(20));
        assert_eq!(d.final_price.value(), dec!(80));
    }

    #[test]
    fn test_percentage_clamped_to_cap() {
        let mut c = coupon(DiscountType::Percentage, dec!(20));
        c.max_discount_amount = Some(Money::new(dec!(15)).unwrap());
        let d = c.evaluate(total(dec!(100)), Utc::now()).unwrap();
        assert_eq!(d.amount.value(), dec!(15));
        assert_eq!(d.final_price.value(), dec!(85));
    }

    #[test]
    fn test_fixed_never_exceeds_total() {
        let c = coupon(DiscountType::Fixed, dec!(50));
        let d = c.evaluate(total(dec!(30)), Utc::now()).unwrap();
        assert_eq!(d.amount.value(), dec!(30));
        assert_eq!(d.final_price, Money::ZERO);
    }

    #[test]
    fn test_oversized_total_is_rejected_not_panicking() {
        let c = coupon(DiscountType::Percentage, dec!(20));
        assert_eq!(
            c.evaluate(total(Decimal::MAX), Utc::now()),
            Err(CouponRejection::TotalTooLarge)
        );

        let fixed = coupon(DiscountType::Fixed, dec!(10));
        let d = fixed.evaluate(total(Decimal::MAX), Utc::now()).unwrap();
        assert_eq!(d.amount.value(), dec!(10));
    }

    #[test]
    fn test_cap_always_holds() {
        let cap = Money::new(dec!(7.5)).unwrap();
        for (kind, value) in [
            (DiscountType::Percentage, dec!(1)),
            (DiscountType::Percentage, dec!(50)),
            (DiscountType::Percentage, dec!(100)),
            (DiscountType::Fixed, dec!(5)),
            (DiscountType::Fixed, dec!(500)),
        ] {
            let mut c = coupon(kind, value);
            c.max_discount_amount = Some(cap);
            for t in [dec!(0.01), dec!(9.99), dec!(100), dec!(12345.67)] {
                let d = c.evaluate(total(t), Utc::now()).unwrap();
                assert!(d.amount <= cap, "{kind:?} {value} on {t} gave {}", d.amount);
                assert_eq!(d.final_price, Money::from(total(t)).saturating_sub(d.amount));
            }
        }
    }

    #[test]
    fn test_validity_checks_short_circuit_in_order() {
        let now = Utc::now();
        let mut c = coupon(DiscountType::Percentage, dec!(10));
        c.is_active = false;
        c.valid_to = Some(now - Duration::days(1));
        assert_eq!(c.check_usable(now), Err(CouponRejection::Inactive));

        c.is_active = true;
        assert_eq!(c.check_usable(now), Err(CouponRejection::Expired));

        c.valid_to = None;
        c.valid_from = Some(now + Duration::days(1));
        assert_eq!(c.check_usable(now), Err(CouponRejection::NotYetValid));
    }

    #[test]
    fn test_exhausted_coupon_rejected() {
        let mut c = coupon(DiscountType::Fixed, dec!(5));
        c.usage_limit = Some(3);
        c.used_count = 3;
        assert_eq!(
            c.evaluate(total(dec!(100)), Utc::now()),
            Err(CouponRejection::UsageLimitReached)
        );
    }

    #[test]
    fn test_minimum_order_amount() {
        let mut c = coupon(DiscountType::Fixed, dec!(5));
        c.min_order_amount = Some(Money::new(dec!(50)).unwrap());
        let err = c.evaluate(total(dec!(49.99)), Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "Minimum order amount for this coupon is 50.00");
        assert!(c.evaluate(total(dec!(50)), Utc::now()).is_ok());
    }

    #[test]
    fn test_evaluate_does_not_consume_usage() {
        let mut c = coupon(DiscountType::Fixed, dec!(5));
        c.usage_limit = Some(1);
        for _ in 0..3 {
            assert!(c.evaluate(total(dec!(10)), Utc::now()).is_ok());
        }
        assert_eq!(c.used_count, 0);
    }

    #[test]
    fn test_record_use_respects_limit() {
        let mut c = coupon(DiscountType::Fixed, dec!(5));
        c.usage_limit = Some(1);
        assert!(c.record_use().is_ok());
        assert_eq!(c.record_use(), Err(CouponRejection::UsageLimitReached));
        assert_eq!(c.used_count, 1);
    }

    #[test]
    fn test_validate_definitions() {
        assert!(coupon(DiscountType::Percentage, dec!(100)).validate().is_ok());
        assert!(coupon(DiscountType::Percentage, dec!(101)).validate().is_err());
        assert!(coupon(DiscountType::Fixed, dec!(0)).validate().is_err());

        let mut c = coupon(DiscountType::Fixed, dec!(5));
        c.valid_from = Some(Utc::now());
        c.valid_to = Some(Utc::now() - Duration::days(1));
        assert!(c.validate().is_err());
    }
}
