//! SQLite adapters for the authoritative store.

pub mod connection;
pub mod erp_repository;
pub mod invitation_repository;
pub mod migrations;
pub mod result_repository;
mod row;
pub mod session_repository;

pub use connection::{create_pool, create_test_pool, verify_connection, ConnectionError, PoolConfig};
pub use erp_repository::SqliteErpRepository;
pub use invitation_repository::SqliteInvitationRepository;
pub use migrations::{all_embedded_migrations, initial_schema_migration, Migration, MigrationError, Migrator};
pub use result_repository::SqliteResultRepository;
pub use session_repository::SqliteSessionRepository;
