use super::ids::CourseId;
use super::money::Money;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

/// The slice of a catalog course the purchase engine needs.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    #[serde(default)]
    pub status: CourseStatus,
    /// Regular list price.
    pub price: Money,
    /// Optional promotional list price.
    #[serde(default)]
    pub discount_price: Option<Money>,
}

impl Course {
    pub fn is_purchasable(&self) -> bool {
        self.status == CourseStatus::Published
    }
}

/// Returns the price a student is charged for `course` before any coupon.
///
/// The promotional price wins only when it is strictly below the regular price.
/// Callers must check [`Course::is_purchasable`] first.
pub fn resolve_price(course: &Course) -> Money {
    match course.discount_price {
        Some(discount) if discount < course.price => discount,
        _ => course.price,
    }
}

/// Original price, discount and final price of one order.
///
/// `final_price == max(0, original_price - discount_amount)` holds by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub original_price: Money,
    pub discount_amount: Money,
    pub final_price: Money,
}

impl PriceBreakdown {
    pub fn new(original_price: Money, discount_amount: Money) -> Self {
        Self {
            original_price,
            discount_amount,
            final_price: original_price.saturating_sub(discount_amount),
        }
    }

    pub fn undiscounted(original_price: Money) -> Self {
        Self::new(original_price, Money::ZERO)
    }

    pub fn is_free(&self) -> bool {
        self.final_price.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn course(price: rust_decimal::Decimal, discount: Option<rust_decimal::Decimal>) -> Course {
        Course {
            id: CourseId(1),
            title: "Rust".to_string(),
            status: CourseStatus::Published,
            price: Money::new(price).unwrap(),
            discount_price: discount.map(|d| Money::new(d).unwrap()),
        }
    }

    #[test]
    fn test_discount_price_used_when_lower() {
        let c = course(dec!(100), Some(dec!(10)));
        assert_eq!(resolve_price(&c).value(), dec!(10));
    }

    #[test]
    fn test_regular_price_used_when_discount_not_lower() {
        assert_eq!(resolve_price(&course(dec!(100), Some(dec!(100)))).value(), dec!(100));
        assert_eq!(resolve_price(&course(dec!(100), Some(dec!(120)))).value(), dec!(100));
        assert_eq!(resolve_price(&course(dec!(100), None)).value(), dec!(100));
    }

    #[test]
    fn test_only_published_courses_are_purchasable() {
        let mut c = course(dec!(1), None);
        assert!(c.is_purchasable());
        c.status = CourseStatus::Draft;
        assert!(!c.is_purchasable());
        c.status = CourseStatus::Archived;
        assert!(!c.is_purchasable());
    }

    #[test]
    fn test_breakdown_floors_final_price() {
        let b = PriceBreakdown::new(
            Money::new(dec!(30)).unwrap(),
            Money::new(dec!(50)).unwrap(),
        );
        assert_eq!(b.final_price, Money::ZERO);
        assert!(b.is_free());
    }
}
