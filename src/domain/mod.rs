//! Domain layer: core models, ports, and the error taxonomy.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
