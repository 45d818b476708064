//! Read models returned by the engine to the request-handling layer.

use crate::domain::coupon::{Coupon, DiscountType};
use crate::domain::ids::{CourseId, OrderId, UserId};
use crate::domain::money::Money;
use crate::domain::order::{Order, OrderCode, PaymentStatus};
use crate::domain::pagination::{PaginationInfo, SortDirection};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

pub const MSG_PAYMENT_REQUIRED: &str = "Order created successfully. Please proceed to payment";
pub const MSG_FREE_ENROLLMENT: &str =
    "Congratulations! You have successfully enrolled in this free course";
pub const MSG_PAYMENT_SUCCESS: &str = "Payment successful! You have been enrolled in the course";
pub const MSG_ALREADY_PAID: &str = "Payment already recorded for this order";
pub const COURSE_NOT_FOUND_TITLE: &str = "Course not found";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub order_code: OrderCode,
    pub course_id: CourseId,
    pub course_title: String,
    pub original_price: Money,
    pub discount_amount: Money,
    pub final_price: Money,
    pub coupon_code: Option<String>,
    pub payment_status: PaymentStatus,
    pub requires_payment: bool,
    pub created_at: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentResult {
    pub order_id: OrderId,
    pub order_code: OrderCode,
    pub payment_status: PaymentStatus,
    pub payment_method: String,
    pub paid_at: DateTime<Utc>,
    /// Gateway reference; absent for replays of an already paid order.
    pub payment_reference: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderHistoryItem {
    pub id: OrderId,
    pub order_code: OrderCode,
    pub course_id: CourseId,
    pub course_title: String,
    pub original_price: Money,
    pub discount_amount: Money,
    pub final_price: Money,
    pub payment_status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OrderHistoryItem {
    pub fn new(order: Order, course_title: Option<String>) -> Self {
        Self {
            id: order.id,
            order_code: order.code,
            course_id: order.course_id,
            course_title: course_title.unwrap_or_else(|| COURSE_NOT_FOUND_TITLE.to_string()),
            original_price: order.original_price,
            discount_amount: order.discount_amount,
            final_price: order.final_price,
            payment_status: order.payment_status,
            paid_at: order.paid_at,
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderHistoryPage {
    pub items: Vec<OrderHistoryItem>,
    pub pagination: PaginationInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDetail {
    pub id: OrderId,
    pub order_code: OrderCode,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub course_title: String,
    pub original_price: Money,
    pub discount_amount: Money,
    pub final_price: Money,
    pub coupon_code: Option<String>,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Answer to a standalone "does my coupon work" check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CouponCheck {
    pub valid: bool,
    pub coupon_code: String,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<Decimal>,
    pub discount_amount: Money,
    pub final_price: Money,
    pub min_order_amount: Option<Money>,
    pub max_discount_amount: Option<Money>,
    pub message: String,
}

impl CouponCheck {
    pub fn rejected(code: &str, coupon: Option<&Coupon>, message: impl Into<String>) -> Self {
        Self {
            valid: false,
            coupon_code: code.to_string(),
            discount_type: coupon.map(|c| c.discount_type),
            discount_value: coupon.map(|c| c.discount_value),
            discount_amount: Money::ZERO,
            final_price: Money::ZERO,
            min_order_amount: coupon.and_then(|c| c.min_order_amount),
            max_discount_amount: coupon.and_then(|c| c.max_discount_amount),
            message: message.into(),
        }
    }
}

/// History query as received from the caller; `None` means "use the default".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub payment_status: Option<PaymentStatus>,
    pub sort: Option<SortDirection>,
}
