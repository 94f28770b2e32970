//! BigQuery-on-SQLite Engine
//!
//! Runs BigQuery-dialect statements against SQLite: statements are
//! rewritten, non-native values are encoded into text payloads, and table
//! metadata is rebuilt from SQLite introspection.

pub mod catalog;
pub mod codec;
pub mod comments;
pub mod config;
pub mod cursor;
pub mod ddl;
pub mod error;
pub mod literal;
pub mod overrides;
pub mod protocol;
pub mod session;
pub mod sql_rewriter;
pub mod statement;
pub mod value;

pub use config::SessionConfig;
pub use cursor::Cursor;
pub use error::{Error, Result};
pub use session::Session;
pub use value::{Parameters, Value};
