use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::util::now_utc_string;

pub const DB_SCHEMA_VERSION: &str = "0.1.0";

pub fn ensure_schema(connection: &Connection) -> Result<()> {
    // content_id and parent_id are left untyped: ids may be integers or text.
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS metadata (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS content_rows (
              source TEXT NOT NULL,
              version_id TEXT NOT NULL,
              content_id NOT NULL,
              parent_id,
              order_number REAL NOT NULL DEFAULT 0,
              section_display TEXT,
              heading TEXT,
              content_str TEXT,
              content_type TEXT NOT NULL DEFAULT 'section',
              PRIMARY KEY(source, version_id, content_id)
            );

            CREATE TABLE IF NOT EXISTS content_diffs (
              source TEXT NOT NULL,
              diff_version_id TEXT NOT NULL,
              content_id NOT NULL,
              heading TEXT,
              content_str TEXT,
              PRIMARY KEY(source, diff_version_id, content_id)
            );

            CREATE INDEX IF NOT EXISTS idx_content_rows_parent_order
              ON content_rows(source, version_id, parent_id, order_number);
            ",
        )
        .context("failed to create content schema")?;

    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now_utc_string()],
    )?;

    Ok(())
}
