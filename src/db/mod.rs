pub mod migrations;
pub mod queries;

use anyhow::Context;
use rusqlite::Connection;

/// Timestamp layout used for every TEXT datetime column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Layout for rental dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {path}"))?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;")
        .context("failed to set database pragmas")?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}
