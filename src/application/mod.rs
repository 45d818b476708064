//! Application layer orchestrating the purchase flow.
//!
//! [`engine::OrderEngine`] is the entry point: it validates requests against the
//! catalog, prices orders and runs the completion transaction through the
//! storage ports. [`views`] holds the read models it hands back.

pub mod config;
pub mod engine;
pub mod views;
