use super::config::EngineConfig;
use super::views::{
    COURSE_NOT_FOUND_TITLE, CouponCheck, HistoryQuery, MSG_ALREADY_PAID, MSG_FREE_ENROLLMENT,
    MSG_PAYMENT_REQUIRED, MSG_PAYMENT_SUCCESS, OrderDetail, OrderHistoryItem, OrderHistoryPage,
    OrderSummary, PaymentResult,
};
use crate::domain::course::{PriceBreakdown, resolve_price};
use crate::domain::ids::{CourseId, OrderId, UserId};
use crate::domain::money::Amount;
use crate::domain::order::{FREE_PAYMENT_METHOD, NewOrder, Order, OrderCode};
use crate::domain::pagination::{OrderFilter, PageRequest, PaginationInfo};
use crate::domain::ports::{
    ChargeOutcome, Completion, CompletionOutcome, CouponStore, CouponStoreBox, CouponUsage,
    CourseCatalog, CourseCatalogBox, EnrollmentStore, EnrollmentStoreBox, OrderStore,
    OrderStoreBox, PaymentGateway, PaymentGatewayBox, PaymentRequest, PurchaseLedger,
    PurchaseLedgerBox,
};
use crate::error::{EngineError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

/// The collaborators the engine talks to.
pub struct EnginePorts {
    pub courses: CourseCatalogBox,
    pub coupons: CouponStoreBox,
    pub orders: OrderStoreBox,
    pub enrollments: EnrollmentStoreBox,
    pub ledger: PurchaseLedgerBox,
    pub gateway: PaymentGatewayBox,
}

impl EnginePorts {
    /// Wires every storage port to one backend, which is what makes the
    /// completion transaction atomic.
    pub fn from_store<C, S, G>(courses: C, store: S, gateway: G) -> Self
    where
        C: CourseCatalog + 'static,
        S: CouponStore + OrderStore + EnrollmentStore + PurchaseLedger + Clone + 'static,
        G: PaymentGateway + 'static,
    {
        Self {
            courses: Box::new(courses),
            coupons: Box::new(store.clone()),
            orders: Box::new(store.clone()),
            enrollments: Box::new(store.clone()),
            ledger: Box::new(store),
            gateway: Box::new(gateway),
        }
    }
}

/// Order lifecycle controller.
///
/// `OrderEngine` creates orders, applies coupons and drives the completion
/// transaction. It keeps no state of its own between calls, so one instance can be
/// shared (`Arc<OrderEngine>`) across any number of concurrent request tasks.
pub struct OrderEngine {
    courses: CourseCatalogBox,
    coupons: CouponStoreBox,
    orders: OrderStoreBox,
    enrollments: EnrollmentStoreBox,
    ledger: PurchaseLedgerBox,
    gateway: PaymentGatewayBox,
    config: EngineConfig,
}

impl OrderEngine {
    pub fn new(ports: EnginePorts, config: EngineConfig) -> Self {
        Self {
            courses: ports.courses,
            coupons: ports.coupons,
            orders: ports.orders,
            enrollments: ports.enrollments,
            ledger: ports.ledger,
            gateway: ports.gateway,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn bounded<T, F>(&self, limit: Duration, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result.map_err(|e| e.context(operation)),
            Err(_) => {
                tracing::error!(operation, timeout_ms = limit.as_millis() as u64, "Call timed out");
                Err(EngineError::Timeout(operation.to_string()))
            }
        }
    }

    async fn storage<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.bounded(self.config.storage_timeout, operation, call)
            .await
    }

    /// Creates a purchase order for `course_id`, optionally discounted by a coupon.
    ///
    /// Zero-priced orders are completed immediately with the `free` payment method.
    pub async fn create_order(
        &self,
        user_id: UserId,
        course_id: CourseId,
        coupon_code: Option<&str>,
    ) -> Result<OrderSummary> {
        let now = Utc::now();

        let course = self
            .storage("find course", self.courses.find_course(course_id))
            .await?
            .ok_or_else(|| EngineError::NotFound("Course not found".to_string()))?;
        if !course.is_purchasable() {
            return Err(EngineError::BadRequest(
                "Course is not available for purchase".to_string(),
            ));
        }

        if let Some(enrollment) = self
            .storage(
                "check enrollment",
                self.enrollments.find_current(user_id, course_id),
            )
            .await?
            && enrollment.is_active()
        {
            return Err(EngineError::Conflict(
                "You already own this course".to_string(),
            ));
        }

        // Fast path only; `create_pending` enforces the same rule atomically.
        if self
            .storage("find pending order", self.orders.find_pending(user_id, course_id))
            .await?
            .is_some()
        {
            return Err(EngineError::Conflict(
                "You already have a pending order for this course. Please complete or cancel it first"
                    .to_string(),
            ));
        }

        let original_price = resolve_price(&course);
        let coupon_code = coupon_code.map(str::trim).filter(|c| !c.is_empty());
        let (prices, coupon) = match coupon_code {
            None => (PriceBreakdown::undiscounted(original_price), None),
            Some(code) => {
                let coupon = self
                    .storage("find coupon", self.coupons.find_by_code(code))
                    .await?
                    .ok_or_else(|| EngineError::BadRequest("Invalid coupon code".to_string()))?;
                let total = Amount::try_from(original_price).map_err(|_| {
                    EngineError::BadRequest(
                        "Coupons cannot be applied to a free course".to_string(),
                    )
                })?;
                let discount = coupon
                    .evaluate(total, now)
                    .map_err(|reason| EngineError::BadRequest(reason.to_string()))?;
                tracing::debug!(
                    coupon = %coupon.code,
                    discount = %discount.amount,
                    "Coupon accepted"
                );
                (PriceBreakdown::new(original_price, discount.amount), Some(coupon))
            }
        };

        let free = prices.is_free();
        let new_order = NewOrder {
            code: OrderCode::generate(now),
            user_id,
            course_id,
            prices,
            coupon_id: coupon.as_ref().map(|c| c.id),
            created_at: now,
        };
        let mut order = self
            .storage("create order", self.orders.create_pending(new_order))
            .await?;
        tracing::info!(
            order_code = %order.code,
            user_id = %user_id,
            course_id = %course_id,
            final_price = %order.final_price,
            "Order created"
        );

        let message = if free {
            order = self.complete_order(&order, FREE_PAYMENT_METHOD).await?.order;
            MSG_FREE_ENROLLMENT
        } else {
            MSG_PAYMENT_REQUIRED
        };

        Ok(OrderSummary {
            order_id: order.id,
            order_code: order.code.clone(),
            course_id: course.id,
            course_title: course.title,
            original_price: order.original_price,
            discount_amount: order.discount_amount,
            final_price: order.final_price,
            coupon_code: coupon.map(|c| c.code),
            payment_status: order.payment_status,
            requires_payment: order.is_pending(),
            created_at: order.created_at,
            message: message.to_string(),
        })
    }

    /// Charges a pending order through the payment gateway and completes it.
    ///
    /// A declined charge fails the order. A gateway timeout or error leaves it
    /// pending, so the caller may retry.
    pub async fn pay_order(
        &self,
        user_id: UserId,
        order_id: OrderId,
        payment_method: &str,
    ) -> Result<PaymentResult> {
        let method = checked_payment_method(payment_method)?;
        let order = self.owned_order(user_id, order_id).await?;
        if !order.is_pending() {
            return Err(EngineError::BadRequest(
                "Order has already been processed".to_string(),
            ));
        }
        if order.final_price.is_zero() {
            return Err(EngineError::BadRequest(
                "This is a free order, no payment required".to_string(),
            ));
        }

        let request = PaymentRequest {
            order_code: order.code.clone(),
            user_id,
            amount: order.final_price,
            method: method.to_string(),
        };
        let charge = self
            .bounded(
                self.config.payment_timeout,
                "payment gateway",
                self.gateway.charge(&request),
            )
            .await?;

        match charge {
            ChargeOutcome::Approved { reference } => {
                let outcome = self.complete_order(&order, method).await?;
                payment_result(outcome, Some(reference))
            }
            ChargeOutcome::Declined { reason } => {
                tracing::warn!(order_code = %order.code, %reason, "Payment declined");
                self.storage(
                    "mark order failed",
                    self.orders.mark_failed(order.id, Utc::now()),
                )
                .await?;
                Err(EngineError::PaymentDeclined(reason))
            }
        }
    }

    /// Consumes an external "payment succeeded" signal for `order_code`.
    ///
    /// Safe to deliver more than once: a paid order is reported as-is.
    pub async fn confirm_payment(
        &self,
        order_code: &OrderCode,
        payment_method: &str,
    ) -> Result<PaymentResult> {
        let method = checked_payment_method(payment_method)?;
        let order = self
            .storage("find order", self.orders.get_by_code(order_code))
            .await?
            .ok_or_else(|| EngineError::NotFound("Order not found".to_string()))?;
        let outcome = self.complete_order(&order, method).await?;
        payment_result(outcome, None)
    }

    /// Cancels a pending order owned by `user_id`.
    pub async fn cancel_order(&self, user_id: UserId, order_id: OrderId) -> Result<OrderDetail> {
        let order = self.owned_order(user_id, order_id).await?;
        if !order.is_pending() {
            return Err(EngineError::BadRequest(
                "Order has already been processed".to_string(),
            ));
        }
        let order = self
            .storage(
                "mark order failed",
                self.orders.mark_failed(order.id, Utc::now()),
            )
            .await?;
        tracing::info!(order_code = %order.code, "Order cancelled");
        self.detail(order).await
    }

    pub async fn get_order_history(
        &self,
        user_id: UserId,
        query: HistoryQuery,
    ) -> Result<OrderHistoryPage> {
        let page = PageRequest::new(
            query.page.unwrap_or(1),
            query.limit.unwrap_or(self.config.default_page_limit),
        )?;
        let filter = OrderFilter {
            payment_status: query.payment_status,
            sort: query.sort.unwrap_or_default(),
        };
        let (orders, total) = self
            .storage(
                "list orders",
                self.orders.list_for_user(user_id, filter, page),
            )
            .await?;

        let mut titles: HashMap<CourseId, Option<String>> = HashMap::new();
        let mut items = Vec::with_capacity(orders.len());
        for order in orders {
            let title = match titles.get(&order.course_id) {
                Some(title) => title.clone(),
                None => {
                    let title = self
                        .storage("find course", self.courses.find_course(order.course_id))
                        .await?
                        .map(|c| c.title);
                    titles.insert(order.course_id, title.clone());
                    title
                }
            };
            items.push(OrderHistoryItem::new(order, title));
        }

        Ok(OrderHistoryPage {
            items,
            pagination: PaginationInfo::new(page, total),
        })
    }

    pub async fn get_order_detail(&self, user_id: UserId, order_id: OrderId) -> Result<OrderDetail> {
        let order = self.owned_order(user_id, order_id).await?;
        self.detail(order).await
    }

    /// Checks a coupon against an order total without consuming it.
    ///
    /// Domain rejections come back as `valid: false`; only a non-positive total or
    /// an infrastructure failure is an error.
    pub async fn validate_coupon(
        &self,
        code: &str,
        course_id: CourseId,
        order_total: Decimal,
    ) -> Result<CouponCheck> {
        let total = Amount::new(order_total)?;
        let code = code.trim();
        let now = Utc::now();

        let Some(coupon) = self
            .storage("find coupon", self.coupons.find_by_code(code))
            .await?
        else {
            return Ok(CouponCheck::rejected(code, None, "Invalid coupon code"));
        };
        if let Err(reason) = coupon.check_usable(now) {
            return Ok(CouponCheck::rejected(code, Some(&coupon), reason.to_string()));
        }
        if self
            .storage("find course", self.courses.find_course(course_id))
            .await?
            .is_none()
        {
            return Ok(CouponCheck::rejected(
                code,
                Some(&coupon),
                COURSE_NOT_FOUND_TITLE,
            ));
        }

        match coupon.evaluate(total, now) {
            Err(reason) => Ok(CouponCheck::rejected(code, Some(&coupon), reason.to_string())),
            Ok(discount) => Ok(CouponCheck {
                valid: true,
                coupon_code: coupon.code.clone(),
                discount_type: Some(coupon.discount_type),
                discount_value: Some(coupon.discount_value),
                discount_amount: discount.amount,
                final_price: discount.final_price,
                min_order_amount: coupon.min_order_amount,
                max_discount_amount: coupon.max_discount_amount,
                message: format!("Coupon applied successfully! You save {}", discount.amount),
            }),
        }
    }

    /// Runs the completion transaction for `order`.
    async fn complete_order(&self, order: &Order, payment_method: &str) -> Result<CompletionOutcome> {
        let completion = Completion {
            order_id: order.id,
            payment_method: payment_method.to_string(),
            paid_at: Utc::now(),
        };
        let outcome = self
            .storage("complete order", self.ledger.complete(completion))
            .await?;

        if outcome.already_paid {
            tracing::info!(order_code = %outcome.order.code, "Order already paid, nothing to do");
        } else {
            tracing::info!(
                order_code = %outcome.order.code,
                enrollment_id = %outcome.enrollment.id,
                payment_method,
                "Order paid and enrollment granted"
            );
        }
        if let CouponUsage::Skipped(reason) = &outcome.coupon_usage {
            tracing::warn!(
                order_code = %outcome.order.code,
                coupon_id = ?outcome.order.coupon_id,
                %reason,
                "Coupon usage was not recorded"
            );
        }
        Ok(outcome)
    }

    async fn owned_order(&self, user_id: UserId, order_id: OrderId) -> Result<Order> {
        let order = self
            .storage("find order", self.orders.get(order_id))
            .await?
            .ok_or_else(|| EngineError::NotFound("Order not found".to_string()))?;
        if order.belongs_to(user_id) {
            Ok(order)
        } else if self.config.conceal_foreign_orders {
            Err(EngineError::NotFound("Order not found".to_string()))
        } else {
            Err(EngineError::Forbidden("Access denied".to_string()))
        }
    }

    async fn detail(&self, order: Order) -> Result<OrderDetail> {
        let course = self
            .storage("find course", self.courses.find_course(order.course_id))
            .await?
            .ok_or_else(|| EngineError::NotFound("Course not found".to_string()))?;
        let coupon_code = match order.coupon_id {
            Some(id) => self
                .storage("find coupon", self.coupons.find_by_id(id))
                .await?
                .map(|c| c.code),
            None => None,
        };

        Ok(OrderDetail {
            id: order.id,
            order_code: order.code,
            user_id: order.user_id,
            course_id: order.course_id,
            course_title: course.title,
            original_price: order.original_price,
            discount_amount: order.discount_amount,
            final_price: order.final_price,
            coupon_code,
            payment_status: order.payment_status,
            payment_method: order.payment_method,
            paid_at: order.paid_at,
            created_at: order.created_at,
            updated_at: order.updated_at,
        })
    }
}

fn checked_payment_method(method: &str) -> Result<&str> {
    let method = method.trim();
    if method.is_empty() {
        return Err(EngineError::BadRequest(
            "Payment method is required".to_string(),
        ));
    }
    if method.eq_ignore_ascii_case(FREE_PAYMENT_METHOD) {
        return Err(EngineError::BadRequest(
            "The free payment method is reserved for zero-priced orders".to_string(),
        ));
    }
    Ok(method)
}

fn payment_result(outcome: CompletionOutcome, reference: Option<String>) -> Result<PaymentResult> {
    let order = outcome.order;
    let paid_at = order.paid_at.ok_or_else(|| {
        EngineError::storage("Paid order has no paid_at", format!("order {}", order.code))
    })?;
    Ok(PaymentResult {
        order_id: order.id,
        order_code: order.code,
        payment_status: order.payment_status,
        payment_method: order.payment_method.unwrap_or_default(),
        paid_at,
        payment_reference: reference,
        message: if outcome.already_paid {
            MSG_ALREADY_PAID
        } else {
            MSG_PAYMENT_SUCCESS
        }
        .to_string(),
    })
}
