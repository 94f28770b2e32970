//! Comment Store
//!
//! SQLite has no column or table comments, so descriptions are kept in a
//! side-table keyed by `"<table>,<column>"`. The table-level comment uses an
//! empty column name.

use std::collections::BTreeMap;

use rusqlite::{params, Connection};

use crate::error::Result;

/// Name of the side-table. Catalog listings hide it.
pub const COMMENTS_TABLE: &str = "comments";

pub struct CommentStore<'a> {
    conn: &'a Connection,
}

impl<'a> CommentStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create the side-table if it does not exist yet.
    pub fn install(&self) -> Result<()> {
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (key TEXT, comment TEXT)",
            COMMENTS_TABLE
        ))?;
        Ok(())
    }

    /// Replace the comment for `(table, column)`. Last write wins.
    pub fn upsert(&self, table: &str, column: &str, comment: &str) -> Result<()> {
        let key = entry_key(table, column);
        tracing::debug!("Setting comment for {}: {}", key, comment);

        self.conn.execute(
            &format!("DELETE FROM {} WHERE key = ?1", COMMENTS_TABLE),
            params![key],
        )?;
        self.conn.execute(
            &format!("INSERT INTO {} VALUES (?1, ?2)", COMMENTS_TABLE),
            params![key, comment],
        )?;
        Ok(())
    }

    /// Drop the comment for `(table, column)`, if any.
    pub fn remove(&self, table: &str, column: &str) -> Result<()> {
        let key = entry_key(table, column);
        tracing::debug!("Removing comment for {}", key);

        self.conn.execute(
            &format!("DELETE FROM {} WHERE key = ?1", COMMENTS_TABLE),
            params![key],
        )?;
        Ok(())
    }

    /// All comments of `table`, keyed by column. The table-level comment is
    /// under `""`.
    pub fn lookup(&self, table: &str) -> Result<BTreeMap<String, String>> {
        let prefix = format!("{},", table);
        let pattern = format!("{}%", escape_like(&prefix));

        let mut stmt = self.conn.prepare(&format!(
            "SELECT key, comment FROM {} WHERE key LIKE ?1 ESCAPE '\\'",
            COMMENTS_TABLE
        ))?;
        let rows = stmt.query_map(params![pattern], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })?;

        let mut comments = BTreeMap::new();
        for row in rows {
            let (key, comment) = row?;
            // LIKE is case-insensitive for ASCII; keep exact prefix matches only
            let (Some(column), Some(comment)) = (key.strip_prefix(&prefix), comment) else {
                continue;
            };
            comments.insert(column.to_string(), comment);
        }
        Ok(comments)
    }
}

fn entry_key(table: &str, column: &str) -> String {
    format!("{},{}", table, column)
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
