//! SQLite persistence: connection pool, migrations and the identity & format registry

pub mod db;
pub mod migrations;
pub mod registry;

pub use db::{create_pool, get_connection, DbConnection, DbPool};
