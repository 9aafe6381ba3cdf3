//! Axum route handlers.
//!
//! - [`webhooks`]: Provider webhook intake
//! - [`timings`]: Internal timing statistics

pub mod timings;
pub mod webhooks;
