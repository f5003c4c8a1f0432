//! ERP connector adapter.

pub mod client;
pub mod models;

pub use client::{HttpConnectorFactory, HttpErpConnector, RateLimiter};
