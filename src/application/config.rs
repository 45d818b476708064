use crate::domain::pagination::DEFAULT_PAGE_LIMIT;
use std::time::Duration;

/// Runtime knobs of the [`OrderEngine`](super::engine::OrderEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound for any single storage or catalog call.
    pub storage_timeout: Duration,
    /// Upper bound for the payment gateway call.
    pub payment_timeout: Duration,
    /// Report orders owned by someone else as missing instead of forbidden.
    pub conceal_foreign_orders: bool,
    /// Page size used when a history query does not specify one.
    pub default_page_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_timeout: Duration::from_secs(2),
            payment_timeout: Duration::from_secs(5),
            conceal_foreign_orders: false,
            default_page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}
