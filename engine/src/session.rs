//! Session Management
//!
//! A session owns one SQLite connection with the comment side-table
//! installed, plus the configuration and an execution log.

use rusqlite::Connection;
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::comments::CommentStore;
use crate::config::SessionConfig;
use crate::cursor::Cursor;
use crate::overrides::CatalogOverrides;
use crate::value::Parameters;
use crate::Result;

/// One `execute` call as the caller made it
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedCall {
    pub sql: String,
    pub parameters: Parameters,
}

/// Calls made through the session's cursors, in order
#[derive(Debug, Clone, Default)]
pub struct ExecutionLog {
    calls: Vec<LoggedCall>,
    /// Last `arraysize` set on a cursor
    arraysize: Option<usize>,
}

impl ExecutionLog {
    pub fn record(&mut self, sql: &str, parameters: &Parameters) {
        self.calls.push(LoggedCall {
            sql: sql.to_string(),
            parameters: parameters.clone(),
        });
    }

    pub fn record_arraysize(&mut self, size: usize) {
        self.arraysize = Some(size);
    }

    pub fn calls(&self) -> &[LoggedCall] {
        &self.calls
    }

    pub fn last(&self) -> Option<&LoggedCall> {
        self.calls.last()
    }

    pub fn arraysize(&self) -> Option<usize> {
        self.arraysize
    }

    pub fn clear(&mut self) {
        self.calls.clear();
        self.arraysize = None;
    }
}

/// Session
pub struct Session {
    /// Session ID
    pub id: String,

    config: SessionConfig,

    pub(crate) conn: Connection,

    pub(crate) log: ExecutionLog,
}

impl Session {
    /// Open the configured database and install the comment side-table.
    pub fn open(config: SessionConfig) -> Result<Self> {
        let conn = Connection::open(&config.database)?;
        CommentStore::new(&conn).install()?;

        let id = Uuid::new_v4().to_string();
        tracing::info!(
            "Session {} opened on {} (sqlite {})",
            id,
            config.database,
            rusqlite::version()
        );

        Ok(Self {
            id,
            config,
            conn,
            log: ExecutionLog::default(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(SessionConfig::default())
    }

    /// New cursor. It borrows the session until dropped.
    pub fn cursor(&mut self) -> Cursor<'_> {
        Cursor::new(self)
    }

    pub fn catalog(&self) -> Catalog<'_> {
        Catalog::new(&self.conn, &self.config)
    }

    pub fn comments(&self) -> CommentStore<'_> {
        CommentStore::new(&self.conn)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn overrides_mut(&mut self) -> &mut CatalogOverrides {
        &mut self.config.overrides
    }

    pub fn log(&self) -> &ExecutionLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut ExecutionLog {
        &mut self.log
    }

    /// Underlying connection, for direct inspection
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
