use crate::domain::coupon::Coupon;
use crate::domain::enrollment::Enrollment;
use crate::domain::ids::{CouponId, CourseId, EnrollmentId, OrderId, UserId};
use crate::domain::order::{NewOrder, Order, OrderCode, PaidTransition};
use crate::domain::pagination::{OrderFilter, PageRequest, paginate_orders};
use crate::domain::ports::{
    Completion, CompletionOutcome, CouponStore, CouponUsage, EnrollmentStore, OrderStore,
    PurchaseLedger,
};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for orders, keyed by order id.
pub const CF_ORDERS: &str = "orders";
/// Column Family for coupon definitions, keyed by coupon id.
pub const CF_COUPONS: &str = "coupons";
/// Column Family for enrollments, keyed by enrollment id.
pub const CF_ENROLLMENTS: &str = "enrollments";
/// Column Family for secondary indexes and id sequences.
pub const CF_INDEXES: &str = "indexes";

const SEQ_ORDERS: &str = "seq/orders";
const SEQ_ENROLLMENTS: &str = "seq/enrollments";

fn order_code_key(code: &OrderCode) -> String {
    format!("order_code/{code}")
}

fn pending_key(user_id: UserId, course_id: CourseId) -> String {
    format!("pending/{user_id}/{course_id}")
}

fn coupon_code_key(code: &str) -> String {
    format!("coupon_code/{code}")
}

fn enrollment_key(user_id: UserId, course_id: CourseId) -> String {
    format!("enrollment/{user_id}/{course_id}")
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| EngineError::storage("Serialization error", e))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| EngineError::storage("Deserialization error", e))
}

fn decode_id(bytes: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| EngineError::storage("Corrupted index entry", "expected 8 bytes"))?;
    Ok(u64::from_be_bytes(raw))
}

/// A persistent store implementation using RocksDB.
///
/// Orders, coupons and enrollments live in separate Column Families; secondary
/// indexes (order codes, pending slots, coupon codes, current enrollments) live in a
/// fourth one. Every mutation is a single `WriteBatch`, and mutations are serialized
/// by an async mutex so read-check-write sequences (pending-order uniqueness, the
/// completion transaction) cannot interleave.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_ORDERS, CF_COUPONS, CF_ENROLLMENTS, CF_INDEXES]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            EngineError::storage("Missing column family", format!("{name} not found"))
        })
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn index(&self, key: &str) -> Result<Option<u64>> {
        let cf = self.cf(CF_INDEXES)?;
        match self.db.get_cf(cf, key.as_bytes())? {
            Some(bytes) => Ok(Some(decode_id(&bytes)?)),
            None => Ok(None),
        }
    }

    fn next_id(&self, sequence: &str) -> Result<u64> {
        Ok(self.index(sequence)?.unwrap_or(0) + 1)
    }

    fn load_order(&self, id: OrderId) -> Result<Option<Order>> {
        self.get_json(CF_ORDERS, &id.value().to_be_bytes())
    }

    fn live_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.load_order(id)?.filter(|o| !o.is_deleted()))
    }

    fn current_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>> {
        match self.index(&enrollment_key(user_id, course_id))? {
            Some(id) => self.get_json(CF_ENROLLMENTS, &id.to_be_bytes()),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(decode(&value)?);
        }
        Ok(values)
    }

    fn put_order(&self, batch: &mut WriteBatch, order: &Order) -> Result<()> {
        batch.put_cf(
            self.cf(CF_ORDERS)?,
            order.id.value().to_be_bytes(),
            encode(order)?,
        );
        Ok(())
    }

    fn put_index(&self, batch: &mut WriteBatch, key: &str, id: u64) -> Result<()> {
        batch.put_cf(self.cf(CF_INDEXES)?, key.as_bytes(), id.to_be_bytes());
        Ok(())
    }

    fn release_pending_slot(&self, batch: &mut WriteBatch, order: &Order) -> Result<()> {
        let key = pending_key(order.user_id, order.course_id);
        if self.index(&key)? == Some(order.id.value()) {
            batch.delete_cf(self.cf(CF_INDEXES)?, key.as_bytes());
        }
        Ok(())
    }
}

#[async_trait]
impl CouponStore for RocksDBStore {
    async fn store(&self, coupon: Coupon) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        if let Some(previous) = self.get_json::<Coupon>(CF_COUPONS, &coupon.id.value().to_be_bytes())?
            && previous.code != coupon.code
        {
            batch.delete_cf(self.cf(CF_INDEXES)?, coupon_code_key(&previous.code).as_bytes());
        }
        self.put_index(&mut batch, &coupon_code_key(&coupon.code), coupon.id.value())?;
        batch.put_cf(
            self.cf(CF_COUPONS)?,
            coupon.id.value().to_be_bytes(),
            encode(&coupon)?,
        );
        self.db.write(batch)?;
        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>> {
        match self.index(&coupon_code_key(code))? {
            Some(id) => self.find_by_id(CouponId(id)).await,
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, id: CouponId) -> Result<Option<Coupon>> {
        self.get_json(CF_COUPONS, &id.value().to_be_bytes())
    }
}

#[async_trait]
impl OrderStore for RocksDBStore {
    async fn create_pending(&self, new: NewOrder) -> Result<Order> {
        let _guard = self.write_lock.lock().await;
        let slot = pending_key(new.user_id, new.course_id);
        if self.index(&slot)?.is_some() {
            return Err(EngineError::Conflict(
                "You already have a pending order for this course".to_string(),
            ));
        }
        let code_key = order_code_key(&new.code);
        if self.index(&code_key)?.is_some() {
            return Err(EngineError::Conflict(format!(
                "Order code {} is already in use",
                new.code
            )));
        }

        let id = self.next_id(SEQ_ORDERS)?;
        let order = Order::new(OrderId(id), new);
        let mut batch = WriteBatch::default();
        self.put_order(&mut batch, &order)?;
        self.put_index(&mut batch, &slot, id)?;
        self.put_index(&mut batch, &code_key, id)?;
        self.put_index(&mut batch, SEQ_ORDERS, id)?;
        self.db.write(batch)?;
        Ok(order)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        self.live_order(id)
    }

    async fn get_by_code(&self, code: &OrderCode) -> Result<Option<Order>> {
        match self.index(&order_code_key(code))? {
            Some(id) => self.live_order(OrderId(id)),
            None => Ok(None),
        }
    }

    async fn find_pending(&self, user_id: UserId, course_id: CourseId) -> Result<Option<Order>> {
        match self.index(&pending_key(user_id, course_id))? {
            Some(id) => self.live_order(OrderId(id)),
            None => Ok(None),
        }
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        filter: OrderFilter,
        page: PageRequest,
    ) -> Result<(Vec<Order>, u64)> {
        let owned = self
            .scan::<Order>(CF_ORDERS)?
            .into_iter()
            .filter(|o| o.user_id == user_id);
        Ok(paginate_orders(owned, &filter, page))
    }

    async fn mark_failed(&self, id: OrderId, at: DateTime<Utc>) -> Result<Order> {
        let _guard = self.write_lock.lock().await;
        let mut order = self
            .live_order(id)?
            .ok_or_else(|| EngineError::NotFound("Order not found".to_string()))?;
        order.mark_failed(at)?;

        let mut batch = WriteBatch::default();
        self.put_order(&mut batch, &order)?;
        self.release_pending_slot(&mut batch, &order)?;
        self.db.write(batch)?;
        Ok(order)
    }

    async fn soft_delete(&self, id: OrderId, at: DateTime<Utc>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut order = self
            .load_order(id)?
            .ok_or_else(|| EngineError::NotFound("Order not found".to_string()))?;
        order.deleted_at.get_or_insert(at);

        let mut batch = WriteBatch::default();
        self.put_order(&mut batch, &order)?;
        self.release_pending_slot(&mut batch, &order)?;
        self.db.write(batch)?;
        Ok(())
    }

    async fn all_orders(&self) -> Result<Vec<Order>> {
        Ok(self
            .scan::<Order>(CF_ORDERS)?
            .into_iter()
            .filter(|o| !o.is_deleted())
            .collect())
    }
}

#[async_trait]
impl EnrollmentStore for RocksDBStore {
    async fn find_current(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>> {
        self.current_enrollment(user_id, course_id)
    }

    async fn list_enrollments(&self, user_id: UserId) -> Result<Vec<Enrollment>> {
        Ok(self
            .scan::<Enrollment>(CF_ENROLLMENTS)?
            .into_iter()
            .filter(|e| e.user_id == user_id)
            .collect())
    }
}

#[async_trait]
impl PurchaseLedger for RocksDBStore {
    async fn complete(&self, completion: Completion) -> Result<CompletionOutcome> {
        let _guard = self.write_lock.lock().await;
        let mut order = self
            .live_order(completion.order_id)?
            .ok_or_else(|| EngineError::NotFound("Order not found".to_string()))?;

        if order.mark_paid(&completion.payment_method, completion.paid_at)?
            == PaidTransition::AlreadyPaid
        {
            let enrollment = self
                .current_enrollment(order.user_id, order.course_id)?
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

        let mut batch = WriteBatch::default();
        self.put_order(&mut batch, &order)?;
        self.release_pending_slot(&mut batch, &order)?;

        let enrollment = match self.current_enrollment(order.user_id, order.course_id)? {
            Some(existing) if existing.is_active() => existing,
            _ => {
                let id = self.next_id(SEQ_ENROLLMENTS)?;
                let enrollment = Enrollment::grant(
                    EnrollmentId(id),
                    order.user_id,
                    order.course_id,
                    completion.paid_at,
                );
                batch.put_cf(
                    self.cf(CF_ENROLLMENTS)?,
                    id.to_be_bytes(),
                    encode(&enrollment)?,
                );
                self.put_index(
                    &mut batch,
                    &enrollment_key(order.user_id, order.course_id),
                    id,
                )?;
                self.put_index(&mut batch, SEQ_ENROLLMENTS, id)?;
                enrollment
            }
        };

        let coupon_usage = match order.coupon_id {
            None => CouponUsage::NotApplicable,
            Some(coupon_id) => match self
                .get_json::<Coupon>(CF_COUPONS, &coupon_id.value().to_be_bytes())?
            {
                None => CouponUsage::Skipped(format!("coupon {coupon_id} no longer exists")),
                Some(mut coupon) => match coupon.record_use() {
                    Ok(()) => {
                        batch.put_cf(
                            self.cf(CF_COUPONS)?,
                            coupon_id.value().to_be_bytes(),
                            encode(&coupon)?,
                        );
                        CouponUsage::Recorded
                    }
                    Err(reason) => CouponUsage::Skipped(reason.to_string()),
                },
            },
        };

        self.db.write(batch)?;

        Ok(CompletionOutcome {
            order,
            enrollment,
            already_paid: false,
            coupon_usage,
        })
    }
}
