use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};

use crate::content::{ContentNode, ContentRow, DiffOverlay, FieldPatch, NodeId};
use crate::util::now_utc_string;

mod schema;

#[cfg(test)]
mod tests;

pub use schema::{DB_SCHEMA_VERSION, ensure_schema};

impl ToSql for NodeId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Int(value) => ToSqlOutput::from(*value),
            Self::Text(value) => ToSqlOutput::from(value.as_str()),
        })
    }
}

impl FromSql for NodeId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(value) => Ok(Self::Int(value)),
            ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                .map(|text| Self::Text(text.to_string()))
                .map_err(|err| FromSqlError::Other(Box::new(err))),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSummary {
    pub source: String,
    pub version_id: String,
    pub rows: i64,
}

pub fn open_writable(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        crate::util::ensure_directory(parent)?;
    }

    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;
    ensure_schema(&connection)?;
    Ok(connection)
}

pub fn open_read_only(db_path: &Path) -> Result<Connection> {
    Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open database read-only: {}", db_path.display()))
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

/// Replaces every stored row of one version with `nodes`.
pub fn replace_version_rows(
    connection: &mut Connection,
    source: &str,
    version_id: &str,
    nodes: &[ContentNode],
) -> Result<usize> {
    let tx = connection.transaction()?;

    tx.execute(
        "DELETE FROM content_rows WHERE source = ?1 AND version_id = ?2",
        params![source, version_id],
    )?;

    let mut inserted = 0;
    {
        let mut statement = tx.prepare(
            "
            INSERT INTO content_rows(
              source, version_id, content_id, parent_id, order_number,
              section_display, heading, content_str, content_type
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )?;

        for node in nodes {
            inserted += statement
                .execute(params![
                    source,
                    version_id,
                    node.id,
                    node.parent_id,
                    node.order_number,
                    node.section_display,
                    node.heading_text,
                    node.body_text,
                    node.content_type,
                ])
                .with_context(|| format!("failed to insert content row {}", node.id))?;
        }
    }

    touch_updated_at(&tx)?;
    tx.commit()?;
    Ok(inserted)
}

/// Loads one version's rows ordered by parent id and order number, the
/// order the web application's content queries returned.
pub fn load_version_rows(
    connection: &Connection,
    source: &str,
    version_id: &str,
) -> Result<Vec<ContentRow>> {
    let mut statement = connection.prepare(
        "
        SELECT
          content_id,
          parent_id,
          order_number,
          section_display,
          heading,
          content_str,
          content_type
        FROM content_rows
        WHERE source = ?1 AND version_id = ?2
        ORDER BY parent_id, order_number, rowid
        ",
    )?;

    let mut rows = statement.query(params![source, version_id])?;
    let mut content = Vec::new();

    while let Some(row) = rows.next()? {
        content.push(ContentRow {
            id: row.get(0)?,
            parent_id: row.get(1)?,
            order_number: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
            section_display: row.get(3)?,
            heading_text: row.get(4)?,
            body_text: row.get(5)?,
            content_type: row.get(6)?,
        });
    }

    Ok(content)
}

pub fn replace_overlay(
    connection: &mut Connection,
    source: &str,
    diff_version_id: &str,
    overlay: &DiffOverlay,
) -> Result<usize> {
    let tx = connection.transaction()?;

    tx.execute(
        "DELETE FROM content_diffs WHERE source = ?1 AND diff_version_id = ?2",
        params![source, diff_version_id],
    )?;

    let mut inserted = 0;
    {
        let mut statement = tx.prepare(
            "
            INSERT INTO content_diffs(source, diff_version_id, content_id, heading, content_str)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )?;

        for (id, patch) in overlay.iter().filter(|(_, patch)| !patch.is_empty()) {
            inserted += statement
                .execute(params![
                    source,
                    diff_version_id,
                    id,
                    patch.heading_text,
                    patch.body_text,
                ])
                .with_context(|| format!("failed to insert diff for content row {id}"))?;
        }
    }

    touch_updated_at(&tx)?;
    tx.commit()?;
    Ok(inserted)
}

pub fn load_overlay(
    connection: &Connection,
    source: &str,
    diff_version_id: &str,
) -> Result<DiffOverlay> {
    let mut statement = connection.prepare(
        "
        SELECT content_id, heading, content_str
        FROM content_diffs
        WHERE source = ?1 AND diff_version_id = ?2
        ORDER BY content_id
        ",
    )?;

    let mut rows = statement.query(params![source, diff_version_id])?;
    let mut overlay = DiffOverlay::new();

    while let Some(row) = rows.next()? {
        let id: NodeId = row.get(0)?;
        overlay.insert(
            id,
            FieldPatch {
                heading_text: row.get(1)?,
                body_text: row.get(2)?,
            },
        );
    }

    Ok(overlay)
}

pub fn version_summaries(connection: &Connection) -> Result<Vec<VersionSummary>> {
    summarize(
        connection,
        "
        SELECT source, version_id, COUNT(*)
        FROM content_rows
        GROUP BY source, version_id
        ORDER BY source, version_id
        ",
    )
}

pub fn overlay_summaries(connection: &Connection) -> Result<Vec<VersionSummary>> {
    summarize(
        connection,
        "
        SELECT source, diff_version_id, COUNT(*)
        FROM content_diffs
        GROUP BY source, diff_version_id
        ORDER BY source, diff_version_id
        ",
    )
}

fn summarize(connection: &Connection, sql: &str) -> Result<Vec<VersionSummary>> {
    let mut statement = connection.prepare(sql)?;
    let summaries = statement
        .query_map([], |row| {
            Ok(VersionSummary {
                source: row.get(0)?,
                version_id: row.get(1)?,
                rows: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(summaries)
}

pub fn metadata_value(connection: &Connection, key: &str) -> Result<Option<String>> {
    let value = connection
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [key],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(value)
}

fn touch_updated_at(connection: &Connection) -> Result<()> {
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now_utc_string()],
    )?;
    Ok(())
}
