//! Statements flowing through the rewrite pipeline

use std::cell::OnceCell;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    CreateTable,
    AlterTable,
    InsertValues,
    Other,
}

/// One unit of SQL text. Passes never mutate a statement; they build a new one.
#[derive(Debug, Clone)]
pub struct Statement {
    text: String,
    kind: OnceCell<StatementKind>,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: OnceCell::new(),
        }
    }

    /// The statement that tells the session to skip the backend.
    pub fn empty() -> Self {
        Self::new(String::new())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn kind(&self) -> StatementKind {
        *self.kind.get_or_init(|| classify(&self.text))
    }
}

impl PartialEq for Statement {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for Statement {
    fn from(text: &str) -> Self {
        Statement::new(text)
    }
}

fn classify(text: &str) -> StatementKind {
    static CREATE_TABLE_REGEX: OnceLock<Regex> = OnceLock::new();
    static ALTER_TABLE_REGEX: OnceLock<Regex> = OnceLock::new();
    static INSERT_VALUES_REGEX: OnceLock<Regex> = OnceLock::new();

    let create_re = CREATE_TABLE_REGEX.get_or_init(|| {
        Regex::new(r"(?i)^\s*create\s+(?:or\s+replace\s+)?table\s").expect("valid CREATE TABLE regex")
    });
    let alter_re = ALTER_TABLE_REGEX
        .get_or_init(|| Regex::new(r"(?i)^\s*alter\s+table\s").expect("valid ALTER TABLE regex"));
    let insert_re = INSERT_VALUES_REGEX.get_or_init(|| {
        Regex::new(r"(?is)^\s*insert\s+into\s+.+\s+values\s*\(").expect("valid INSERT VALUES regex")
    });

    if create_re.is_match(text) {
        StatementKind::CreateTable
    } else if alter_re.is_match(text) {
        StatementKind::AlterTable
    } else if insert_re.is_match(text) {
        StatementKind::InsertValues
    } else {
        StatementKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let cases = [
            ("CREATE TABLE `t` (`x` INT64)", StatementKind::CreateTable),
            ("  create or replace table t (x INT64)", StatementKind::CreateTable),
            ("ALTER TABLE `t` SET OPTIONS(description='x')", StatementKind::AlterTable),
            ("INSERT INTO `t` (`x`) VALUES (1)", StatementKind::InsertValues),
            ("INSERT INTO t SELECT * FROM u", StatementKind::Other),
            ("SELECT 1", StatementKind::Other),
            ("CREATE VIEW v AS SELECT 1", StatementKind::Other),
        ];
        for (sql, kind) in cases {
            assert_eq!(Statement::new(sql).kind(), kind, "{}", sql);
        }
    }

    #[test]
    fn test_empty() {
        assert!(Statement::empty().is_empty());
        assert!(Statement::new("  \n").is_empty());
        assert!(!Statement::new("SELECT 1").is_empty());
    }
}
