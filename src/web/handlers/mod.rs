//! # Web API Handlers
//!
//! Request handlers grouped by endpoint family.

pub mod analysis;
pub mod cache;
pub mod circuit_breakers;
pub mod health;
pub mod history;
pub mod metrics;
