//! Cursor
//!
//! Executes statements through the rewriter and hands rows back with
//! encoded payloads decoded.

use std::collections::VecDeque;

use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;

use crate::codec;
use crate::comments::CommentStore;
use crate::error::{Error, Result};
use crate::protocol::ColumnDescription;
use crate::session::Session;
use crate::sql_rewriter;
use crate::value::{Parameters, Value};

pub type Row = Vec<Value>;

pub struct Cursor<'s> {
    session: &'s mut Session,
    description: Vec<ColumnDescription>,
    row_count: i64,
    rows: VecDeque<Vec<SqlValue>>,
    arraysize: usize,
}

impl<'s> Cursor<'s> {
    pub(crate) fn new(session: &'s mut Session) -> Self {
        Self {
            session,
            description: Vec::new(),
            row_count: -1,
            rows: VecDeque::new(),
            arraysize: 1,
        }
    }

    /// Execute one BigQuery statement with named parameters.
    pub fn execute(&mut self, sql: &str, parameters: &Parameters) -> Result<()> {
        self.session.log.record(sql, parameters);
        self.description.clear();
        self.rows.clear();
        self.row_count = -1;

        let conn = &self.session.conn;
        let rewritten = sql_rewriter::rewrite(&CommentStore::new(conn), sql, parameters)?;
        if rewritten.statement.is_empty() {
            tracing::debug!("Statement handled without backend: {}", sql);
            return Ok(());
        }

        let text = rewritten.statement.text();
        tracing::debug!("Rewritten statement: {}", text);
        let operational = |e: rusqlite::Error| {
            let err = Error::operational(sql, text, e);
            tracing::error!("{}", err);
            err
        };

        let mut stmt = conn.prepare(text).map_err(operational)?;
        let bound = params_from_iter(rewritten.parameters.iter());

        if stmt.column_count() == 0 {
            let changes = stmt.execute(bound).map_err(operational)?;
            self.row_count = changes as i64;
            return Ok(());
        }

        self.description = stmt
            .columns()
            .iter()
            .map(|column| ColumnDescription {
                name: column.name().to_string(),
                declared_type: column.decl_type().map(str::to_string),
            })
            .collect();

        let width = self.description.len();
        let mut rows = stmt.query(bound).map_err(operational)?;
        while let Some(row) = rows.next().map_err(operational)? {
            let values = (0..width)
                .map(|i| row.get::<_, SqlValue>(i))
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(operational)?;
            self.rows.push_back(values);
        }

        Ok(())
    }

    /// Execute the same statement once per parameter set.
    pub fn execute_many<'p, I>(&mut self, sql: &str, parameter_sets: I) -> Result<()>
    where
        I: IntoIterator<Item = &'p Parameters>,
    {
        for parameters in parameter_sets {
            self.execute(sql, parameters)?;
        }
        Ok(())
    }

    /// Result columns of the last statement
    pub fn description(&self) -> &[ColumnDescription] {
        &self.description
    }

    /// Affected rows, or `-1` when the statement returned rows
    pub fn row_count(&self) -> i64 {
        self.row_count
    }

    pub fn arraysize(&self) -> usize {
        self.arraysize
    }

    pub fn set_arraysize(&mut self, size: usize) {
        self.arraysize = size;
        self.session.log.record_arraysize(size);
    }

    pub fn fetch_one(&mut self) -> Result<Option<Row>> {
        self.rows.pop_front().map(decode_row).transpose()
    }

    /// Up to `size` rows (`arraysize` when `None`).
    pub fn fetch_many(&mut self, size: Option<usize>) -> Result<Vec<Row>> {
        let size = size.unwrap_or(self.arraysize).min(self.rows.len());
        self.rows.drain(..size).map(decode_row).collect()
    }

    /// Drain the remaining rows. The iterator is single pass.
    pub fn fetch_all(&mut self) -> impl Iterator<Item = Result<Row>> + '_ {
        let rows = &mut self.rows;
        std::iter::from_fn(move || rows.pop_front().map(decode_row))
    }
}

fn decode_row(row: Vec<SqlValue>) -> Result<Row> {
    row.into_iter()
        .map(|value| codec::decode(Value::from(value)))
        .collect()
}
