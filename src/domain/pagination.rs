use super::order::{Order, PaymentStatus};
use crate::error::EngineError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// A validated page window: `page >= 1`, `limit` within `1..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Result<Self, EngineError> {
        if page == 0 {
            return Err(EngineError::BadRequest("Page must be at least 1".to_string()));
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(EngineError::BadRequest(format!(
                "Limit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }
        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// Typed filter for a user's order listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderFilter {
    pub payment_status: Option<PaymentStatus>,
    pub sort: SortDirection,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        !order.is_deleted()
            && self
                .payment_status
                .is_none_or(|status| order.payment_status == status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationInfo {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginationInfo {
    pub fn new(request: PageRequest, total: u64) -> Self {
        let total_pages = total.div_ceil(request.limit as u64);
        Self {
            page: request.page,
            limit: request.limit,
            total,
            total_pages,
            has_next: (request.page as u64) < total_pages,
            has_prev: request.page > 1,
        }
    }
}

/// Filters, sorts by creation time (id breaks ties) and slices `orders`.
///
/// Returns the requested page and the number of orders matching the filter.
pub fn paginate_orders(
    orders: impl IntoIterator<Item = Order>,
    filter: &OrderFilter,
    page: PageRequest,
) -> (Vec<Order>, u64) {
    let mut matching: Vec<Order> = orders.into_iter().filter(|o| filter.matches(o)).collect();
    matching.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
    if filter.sort == SortDirection::Desc {
        matching.reverse();
    }
    let total = matching.len() as u64;
    let items = matching
        .into_iter()
        .skip(page.offset())
        .take(page.limit as usize)
        .collect();
    (items, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::course::PriceBreakdown;
    use crate::domain::ids::{CourseId, OrderId, UserId};
    use crate::domain::money::Money;
    use crate::domain::order::{NewOrder, OrderCode};
    use chrono::{Duration, Utc};

    fn orders(n: u64) -> Vec<Order> {
        let start = Utc::now();
        (1..=n)
            .map(|i| {
                let at = start + Duration::seconds(i as i64);
                Order::new(
                    OrderId(i),
                    NewOrder {
                        code: OrderCode::generate(at),
                        user_id: UserId(1),
                        course_id: CourseId(i),
                        prices: PriceBreakdown::undiscounted(Money::ZERO),
                        coupon_id: None,
                        created_at: at,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_page_request_bounds() {
        assert!(PageRequest::new(0, 10).is_err());
        assert!(PageRequest::new(1, 0).is_err());
        assert!(PageRequest::new(1, 101).is_err());
        assert!(PageRequest::new(3, 100).is_ok());
        assert_eq!(PageRequest::default().limit(), DEFAULT_PAGE_LIMIT);
    }

    #[test]
    fn test_pagination_info() {
        let info = PaginationInfo::new(PageRequest::new(2, 10).unwrap(), 25);
        assert_eq!(info.total_pages, 3);
        assert!(info.has_next);
        assert!(info.has_prev);

        let info = PaginationInfo::new(PageRequest::new(1, 10).unwrap(), 0);
        assert_eq!(info.total_pages, 0);
        assert!(!info.has_next);
        assert!(!info.has_prev);
    }

    #[test]
    fn test_paginate_defaults_to_newest_first() {
        let (items, total) = paginate_orders(
            orders(5),
            &OrderFilter::default(),
            PageRequest::new(1, 2).unwrap(),
        );
        assert_eq!(total, 5);
        let ids: Vec<u64> = items.iter().map(|o| o.id.value()).collect();
        assert_eq!(ids, vec![5, 4]);
    }

    #[test]
    fn test_paginate_ascending_last_page() {
        let filter = OrderFilter {
            payment_status: None,
            sort: SortDirection::Asc,
        };
        let (items, total) = paginate_orders(orders(5), &filter, PageRequest::new(3, 2).unwrap());
        assert_eq!(total, 5);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, OrderId(5));
    }

    #[test]
    fn test_filter_by_status_and_hide_deleted() {
        let mut all = orders(4);
        all[0].mark_failed(Utc::now()).unwrap();
        all[1].deleted_at = Some(Utc::now());
        let filter = OrderFilter {
            payment_status: Some(PaymentStatus::Pending),
            sort: SortDirection::Desc,
        };
        let (items, total) = paginate_orders(all, &filter, PageRequest::default());
        assert_eq!(total, 2);
        assert!(items.iter().all(|o| o.is_pending() && !o.is_deleted()));
    }
}
