//! Infrastructure adapters implementing the domain ports.

pub mod archive;
pub mod catalog;
pub mod erp;
pub mod sqlite;

pub use archive::FileArchiveStore;
pub use catalog::StaticCatalog;
pub use erp::{HttpConnectorFactory, HttpErpConnector};
