use super::course::PriceBreakdown;
use super::ids::{CouponId, CourseId, OrderId, UserId};
use super::money::Money;
use crate::error::EngineError;
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payment method recorded for orders that never reach the gateway.
pub const FREE_PAYMENT_METHOD: &str = "free";

const ORDER_CODE_TOKEN_LEN: usize = 8;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(EngineError::BadRequest(format!(
                "Unknown payment status: {other}"
            ))),
        }
    }
}

/// Human-readable order reference: `ORD-<8 alphanumerics>-<unix seconds>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderCode(String);

impl OrderCode {
    pub fn generate(now: DateTime<Utc>) -> Self {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(ORDER_CODE_TOKEN_LEN)
            .map(char::from)
            .collect();
        Self(format!("ORD-{}-{}", token.to_ascii_uppercase(), now.timestamp()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for OrderCode {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for OrderCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything needed to persist a new `pending` order; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub code: OrderCode,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub prices: PriceBreakdown,
    pub coupon_id: Option<CouponId>,
    pub created_at: DateTime<Utc>,
}

/// Result of moving an order to `paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaidTransition {
    Applied,
    AlreadyPaid,
}

/// One purchase intent for one course by one user.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Order {
    pub id: OrderId,
    pub code: OrderCode,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub original_price: Money,
    pub discount_amount: Money,
    pub final_price: Money,
    pub coupon_id: Option<CouponId>,
    pub payment_method: Option<String>,
    pub payment_status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn new(id: OrderId, new: NewOrder) -> Self {
        Self {
            id,
            code: new.code,
            user_id: new.user_id,
            course_id: new.course_id,
            original_price: new.prices.original_price,
            discount_amount: new.prices.discount_amount,
            final_price: new.prices.final_price,
            coupon_id: new.coupon_id,
            payment_method: None,
            payment_status: PaymentStatus::Pending,
            paid_at: None,
            created_at: new.created_at,
            updated_at: new.created_at,
            deleted_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.payment_status == PaymentStatus::Pending
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn belongs_to(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    /// Moves a pending order to `paid`. A second call on a paid order is a no-op.
    pub fn mark_paid(
        &mut self,
        method: &str,
        at: DateTime<Utc>,
    ) -> Result<PaidTransition, EngineError> {
        match self.payment_status {
            PaymentStatus::Pending => {
                self.payment_status = PaymentStatus::Paid;
                self.payment_method = Some(method.to_string());
                self.paid_at = Some(at);
                self.updated_at = at;
                Ok(PaidTransition::Applied)
            }
            PaymentStatus::Paid => Ok(PaidTransition::AlreadyPaid),
            status => Err(EngineError::BadRequest(format!(
                "Order {} is {status} and cannot be paid",
                self.code
            ))),
        }
    }

    /// Moves a pending order to `failed` (cancellation or declined payment).
    pub fn mark_failed(&mut self, at: DateTime<Utc>) -> Result<(), EngineError> {
        if !self.is_pending() {
            return Err(EngineError::BadRequest(
                "Order has already been processed".to_string(),
            ));
        }
        self.payment_status = PaymentStatus::Failed;
        self.updated_at = at;
        Ok(())
    }
}
