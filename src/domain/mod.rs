//! Domain layer: entities, value objects and the pricing rules of a purchase.
//!
//! Nothing in here performs IO. Storage and payment collaborators are described
//! as async traits in [`ports`] and implemented under `crate::infrastructure`.

pub mod coupon;
pub mod course;
pub mod enrollment;
pub mod ids;
pub mod money;
pub mod order;
pub mod pagination;
pub mod ports;
