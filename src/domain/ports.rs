use super::coupon::Coupon;
use super::course::Course;
use super::enrollment::Enrollment;
use super::ids::{CouponId, CourseId, OrderId, UserId};
use super::money::Money;
use super::order::{NewOrder, Order, OrderCode};
use super::pagination::{OrderFilter, PageRequest};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Read-only view of the course catalog.
#[async_trait]
pub trait CourseCatalog: Send + Sync {
    async fn find_course(&self, id: CourseId) -> Result<Option<Course>>;
}

#[async_trait]
pub trait CouponStore: Send + Sync {
    /// Inserts or replaces a coupon definition.
    async fn store(&self, coupon: Coupon) -> Result<()>;
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>>;
    async fn find_by_id(&self, id: CouponId) -> Result<Option<Coupon>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new `pending` order and assigns its id.
    ///
    /// Must fail with `Conflict` when the user already has a pending order for the
    /// course or the order code is taken. The check and the insert are atomic.
    async fn create_pending(&self, order: NewOrder) -> Result<Order>;
    async fn get(&self, id: OrderId) -> Result<Option<Order>>;
    async fn get_by_code(&self, code: &OrderCode) -> Result<Option<Order>>;
    async fn find_pending(&self, user_id: UserId, course_id: CourseId) -> Result<Option<Order>>;
    /// One page of a user's orders plus the total number matching `filter`.
    async fn list_for_user(
        &self,
        user_id: UserId,
        filter: OrderFilter,
        page: PageRequest,
    ) -> Result<(Vec<Order>, u64)>;
    /// Moves a pending order to `failed` and frees its pending slot.
    async fn mark_failed(&self, id: OrderId, at: DateTime<Utc>) -> Result<Order>;
    /// Hides an order from every lookup while keeping it in storage.
    async fn soft_delete(&self, id: OrderId, at: DateTime<Utc>) -> Result<()>;
    async fn all_orders(&self) -> Result<Vec<Order>>;
}

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// The most recent enrollment of `user_id` in `course_id`, if any.
    async fn find_current(&self, user_id: UserId, course_id: CourseId)
    -> Result<Option<Enrollment>>;
    async fn list_enrollments(&self, user_id: UserId) -> Result<Vec<Enrollment>>;
}

/// Input of the completion transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub order_id: OrderId,
    pub payment_method: String,
    pub paid_at: DateTime<Utc>,
}

/// What happened to the coupon counter during a completion.
#[derive(Debug, Clone, PartialEq)]
pub enum CouponUsage {
    /// The order carried no coupon, or the order was already paid.
    NotApplicable,
    Recorded,
    /// The order and enrollment committed but the counter was left untouched.
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOutcome {
    pub order: Order,
    pub enrollment: Enrollment,
    /// True when the order was already paid and nothing was written.
    pub already_paid: bool,
    pub coupon_usage: CouponUsage,
}

/// The atomic "order paid + enrollment granted + coupon used" write.
///
/// Implementations commit the order transition and the enrollment together or not
/// at all. The coupon increment happens in the same write when possible; when it
/// cannot be applied the rest still commits and the reason is reported in
/// [`CouponUsage::Skipped`]. Completing an already paid order writes nothing.
#[async_trait]
pub trait PurchaseLedger: Send + Sync {
    async fn complete(&self, completion: Completion) -> Result<CompletionOutcome>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub order_code: OrderCode,
    pub user_id: UserId,
    pub amount: Money,
    pub method: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChargeOutcome {
    Approved { reference: String },
    Declined { reason: String },
}

/// External payment gateway. `Err` means the outcome is unknown (transport failure).
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &PaymentRequest) -> Result<ChargeOutcome>;
}

pub type CourseCatalogBox = Box<dyn CourseCatalog>;
pub type CouponStoreBox = Box<dyn CouponStore>;
pub type OrderStoreBox = Box<dyn OrderStore>;
pub type EnrollmentStoreBox = Box<dyn EnrollmentStore>;
pub type PurchaseLedgerBox = Box<dyn PurchaseLedger>;
pub type PaymentGatewayBox = Box<dyn PaymentGateway>;
