use crate::domain::coupon::Coupon;
use crate::domain::course::Course;
use crate::domain::enrollment::Enrollment;
use crate::domain::ids::{CouponId, CourseId, EnrollmentId, OrderId, UserId};
use crate::domain::order::{NewOrder, Order, OrderCode, PaidTransition};
use crate::domain::pagination::{OrderFilter, PageRequest, paginate_orders};
use crate::domain::ports::{
    Completion, CompletionOutcome, CouponStore, CouponUsage, CourseCatalog, EnrollmentStore,
    OrderStore, PurchaseLedger,
};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory course catalog.
#[derive(Default, Clone)]
pub struct InMemoryCourseCatalog {
    courses: Arc<RwLock<HashMap<CourseId, Course>>>,
}

impl InMemoryCourseCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_courses(courses: impl IntoIterator<Item = Course>) -> Self {
        let map = courses.into_iter().map(|c| (c.id, c)).collect();
        Self {
            courses: Arc::new(RwLock::new(map)),
        }
    }

    pub async fn insert(&self, course: Course) {
        self.courses.write().await.insert(course.id, course);
    }
}

#[async_trait]
impl CourseCatalog for InMemoryCourseCatalog {
    async fn find_course(&self, id: CourseId) -> Result<Option<Course>> {
        Ok(self.courses.read().await.get(&id).cloned())
    }
}

#[derive(Default)]
struct State {
    orders: BTreeMap<OrderId, Order>,
    order_codes: HashMap<OrderCode, OrderId>,
    pending: HashMap<(UserId, CourseId), OrderId>,
    coupons: HashMap<CouponId, Coupon>,
    coupon_codes: HashMap<String, CouponId>,
    enrollments: BTreeMap<EnrollmentId, Enrollment>,
    next_order_id: u64,
    next_enrollment_id: u64,
}

impl State {
    fn live_order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id).filter(|o| !o.is_deleted())
    }

    fn current_enrollment(&self, user_id: UserId, course_id: CourseId) -> Option<&Enrollment> {
        self.enrollments
            .values()
            .rev()
            .find(|e| e.user_id == user_id && e.course_id == course_id)
    }
}

/// A thread-safe in-memory store for orders, coupons and enrollments.
///
/// All three live behind one `RwLock`, so the pending-order check and the completion
/// transaction run under a single write guard. `Clone` shares the state, which lets
/// the same store back every port of the engine.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CouponStore for InMemoryStore {
    async fn store(&self, coupon: Coupon) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(previous) = state.coupons.get(&coupon.id).map(|c| c.code.clone()) {
            state.coupon_codes.remove(&previous);
        }
        state.coupon_codes.insert(coupon.code.clone(), coupon.id);
        state.coupons.insert(coupon.id, coupon);
        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>> {
        let state = self.state.read().await;
        Ok(state
            .coupon_codes
            .get(code)
            .and_then(|id| state.coupons.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: CouponId) -> Result<Option<Coupon>> {
        Ok(self.state.read().await.coupons.get(&id).cloned())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn create_pending(&self, new: NewOrder) -> Result<Order> {
        let mut state = self.state.write().await;
        let slot = (new.user_id, new.course_id);
        if state.pending.contains_key(&slot) {
            return Err(EngineError::Conflict(
                "You already have a pending order for this course".to_string(),
            ));
        }
        if state.order_codes.contains_key(&new.code) {
            return Err(EngineError::Conflict(format!(
                "Order code {} is already in use",
                new.code
            )));
        }

        state.next_order_id += 1;
        let order = Order::new(OrderId(state.next_order_id), new);
        state.pending.insert(slot, order.id);
        state.order_codes.insert(order.code.clone(), order.id);
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.live_order(id).cloned())
    }

    async fn get_by_code(&self, code: &OrderCode) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state
            .order_codes
            .get(code)
            .and_then(|id| state.live_order(*id))
            .cloned())
    }

    async fn find_pending(&self, user_id: UserId, course_id: CourseId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state
            .pending
            .get(&(user_id, course_id))
            .and_then(|id| state.live_order(*id))
            .cloned())
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        filter: OrderFilter,
        page: PageRequest,
    ) -> Result<(Vec<Order>, u64)> {
        let state = self.state.read().await;
        let owned = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned();
        Ok(paginate_orders(owned, &filter, page))
    }

    async fn mark_failed(&self, id: OrderId, at: DateTime<Utc>) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&id)
            .filter(|o| !o.is_deleted())
            .ok_or_else(|| EngineError::NotFound("Order not found".to_string()))?;
        order.mark_failed(at)?;
        let order = order.clone();
        state.pending.remove(&(order.user_id, order.course_id));
        Ok(order)
    }

    async fn soft_delete(&self, id: OrderId, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound("Order not found".to_string()))?;
        order.deleted_at.get_or_insert(at);
        let slot = (order.user_id, order.course_id);
        if state.pending.get(&slot) == Some(&id) {
            state.pending.remove(&slot);
        }
        Ok(())
    }

    async fn all_orders(&self) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .filter(|o| !o.is_deleted())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EnrollmentStore for InMemoryStore {
    async fn find_current(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>> {
        let state = self.state.read().await;
        Ok(state.current_enrollment(user_id, course_id).cloned())
    }

    async fn list_enrollments(&self, user_id: UserId) -> Result<Vec<Enrollment>> {
        let state = self.state.read().await;
        Ok(state
            .enrollments
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PurchaseLedger for InMemoryStore {
    async fn complete(&self, completion: Completion) -> Result<CompletionOutcome> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        // Work on a copy so nothing is visible until every write has succeeded.
        let mut order = state
            .live_order(completion.order_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound("Order not found".to_string()))?;

        if order.mark_paid(&completion.payment_method, completion.paid_at)?
            == PaidTransition::AlreadyPaid
        {
            let enrollment = state
                .current_enrollment(order.user_id, order.course_id)
                .cloned()
                .ok_or_else(|| {
                    EngineError::storage(
                        "Paid order has no enrollment",
                        format!("order {}", order.code),
                    )
                })?;
            return Ok(CompletionOutcome {
                order,
                enrollment,
                already_paid: true,
                coupon_usage: CouponUsage::NotApplicable,
            });
        }

        let enrollment = match state.current_enrollment(order.user_id, order.course_id) {
            Some(existing) if existing.is_active() => existing.clone(),
            _ => Enrollment::grant(
                EnrollmentId(state.next_enrollment_id + 1),
                order.user_id,
                order.course_id,
                completion.paid_at,
            ),
        };

        let coupon_usage = match order.coupon_id {
            None => CouponUsage::NotApplicable,
            Some(coupon_id) => match state.coupons.get_mut(&coupon_id) {
                None => CouponUsage::Skipped(format!("coupon {coupon_id} no longer exists")),
                Some(coupon) => match coupon.record_use() {
                    Ok(()) => CouponUsage::Recorded,
                    Err(reason) => CouponUsage::Skipped(reason.to_string()),
                },
            },
        };

        if !state.enrollments.contains_key(&enrollment.id) {
            state.next_enrollment_id = enrollment.id.value();
            state.enrollments.insert(enrollment.id, enrollment.clone());
        }
        state.pending.remove(&(order.user_id, order.course_id));
        state.orders.insert(order.id, order.clone());

        Ok(CompletionOutcome {
            order,
            enrollment,
            already_paid: false,
            coupon_usage,
        })
    }
}
