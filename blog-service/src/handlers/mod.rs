//! HTTP handlers for blog-service.

pub mod generate;
pub mod health;
pub mod metrics;
