use anyhow::{Context, Result};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::time::Duration;

use crate::storage::migrations;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Maximum connections held by the pool
const POOL_MAX_SIZE: u32 = 10;

/// Create a new database connection pool
///
/// Every connection runs in WAL mode with foreign keys on and a 30 second busy
/// timeout, so concurrent writers queue instead of failing. Schema migrations run
/// once on the first connection.
///
/// # Example
///
/// ```no_run
/// use vidrelay::storage::db;
///
/// let pool = db::create_pool("database.sqlite").unwrap();
/// let conn = db::get_connection(&pool).unwrap();
/// ```
pub fn create_pool(database_path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|c| {
        c.busy_timeout(Duration::from_secs(30))?;
        c.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
        c.execute_batch("PRAGMA foreign_keys = ON; PRAGMA synchronous = NORMAL;")
    });

    let pool = Pool::builder()
        .max_size(POOL_MAX_SIZE)
        .build(manager)
        .context("build SQLite pool")?;

    let mut conn = pool.get().context("open first SQLite connection")?;
    migrations::run_migrations(&mut conn)?;

    log::info!("Database ready at {}", database_path);
    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection returns to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_pool_runs_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.sqlite");
        let pool = create_pool(path.to_str().unwrap()).unwrap();

        let conn = get_connection(&pool).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('channels', 'videos', 'infos', 'files')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);

        let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0)).unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_create_pool_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.sqlite");
        create_pool(path.to_str().unwrap()).unwrap();
        create_pool(path.to_str().unwrap()).unwrap();
    }
}
