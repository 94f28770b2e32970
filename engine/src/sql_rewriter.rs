//! SQL Rewriter for BigQuery-specific syntax
//!
//! This module rewrites BigQuery-dialect statements into SQL that SQLite
//! accepts. The passes run in a fixed order and each one is a no-op unless
//! the statement has its trigger shape.
//!
//! ## Passes
//!
//! 1. Placeholders: `%(name)s` becomes `?` and the named value is bound
//!    positionally.
//! 2. Comments: `OPTIONS(description=...)` clauses move into the comment
//!    side-table.
//! 3. Generic types: `ARRAY<INT64>` becomes `ARRAY_INT64_`.
//! 4. Literal inserts: values SQLite cannot hold are replaced with encoded
//!    payloads.
//! 5. `UNNEST([ a, b ])` becomes `(a, b)`.
//! 6. `true` / `false` become `1` / `0`.
//!
//! ```sql
//! -- Original
//! INSERT INTO `t` (`d`, `ok`) VALUES (DATE '2021-02-03', true)
//!
//! -- Rewritten
//! INSERT INTO `t` (`d`, `ok`) VALUES ('8004...2E', 1)
//! ```
//!
//! Matches that start inside a quoted literal are left alone.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::codec;
use crate::comments::CommentStore;
use crate::ddl;
use crate::error::{Error, Result};
use crate::literal::{self, in_spans, quoted_spans, Literal};
use crate::statement::{Statement, StatementKind};
use crate::value::{Parameters, Value};

/// Output of the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct Rewritten {
    pub statement: Statement,
    /// Positional parameters, in bind-site order
    pub parameters: Vec<Value>,
}

/// Rewrite a BigQuery statement into a SQLite statement
pub fn rewrite(
    comments: &CommentStore<'_>,
    sql: &str,
    parameters: &Parameters,
) -> Result<Rewritten> {
    let statement = Statement::new(sql);

    let (statement, ordered) = convert_placeholders(statement, parameters)?;
    let statement = extract_comments(statement, comments)?;
    let statement = rewrite_generic_types(statement);
    let statement = rewrite_literal_insert(statement)?;
    let statement = flatten_unnest(statement)?;
    let statement = normalize_booleans(statement)?;

    Ok(Rewritten {
        statement,
        parameters: ordered,
    })
}

/// Replace regex matches that do not start inside a quoted literal.
fn replace_unquoted<F>(re: &Regex, sql: &str, mut replacer: F) -> Result<String>
where
    F: FnMut(&Captures) -> Result<String>,
{
    let spans = quoted_spans(sql);
    let mut out = String::with_capacity(sql.len());
    let mut cursor = 0;

    for caps in re.captures_iter(sql) {
        let Some(m) = caps.get(0) else {
            continue;
        };
        if in_spans(&spans, m.start()) {
            continue;
        }
        out.push_str(&sql[cursor..m.start()]);
        out.push_str(&replacer(&caps)?);
        cursor = m.end();
    }
    out.push_str(&sql[cursor..]);

    Ok(out)
}

/// Pass 1: `%(name)s` / `%(name:TYPE)s` to `?`
fn convert_placeholders(
    statement: Statement,
    parameters: &Parameters,
) -> Result<(Statement, Vec<Value>)> {
    static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();

    if parameters.is_empty() {
        let text = statement.text().replace("%%", "%");
        return Ok((Statement::new(text), Vec::new()));
    }

    let placeholder = PLACEHOLDER_REGEX.get_or_init(|| {
        Regex::new(r"%\((\w+)(?::[^)]*)?\)s").expect("valid placeholder regex")
    });

    let mut ordered = Vec::new();
    let text = replace_unquoted(placeholder, statement.text(), |caps| {
        let name = &caps[1];
        let value = parameters
            .get(name)
            .ok_or_else(|| Error::MissingParameter(name.to_string()))?;
        ordered.push(value.clone());
        Ok("?".to_string())
    })?;

    Ok((Statement::new(text), ordered))
}

/// Pass 2: move `OPTIONS(description=...)` into the comment store
fn extract_comments(statement: Statement, comments: &CommentStore<'_>) -> Result<Statement> {
    static ALTER_OPTIONS_REGEX: OnceLock<Regex> = OnceLock::new();

    match statement.kind() {
        StatementKind::CreateTable => {
            let sql = statement.text();
            let Some(create) = ddl::parse_create_table(sql) else {
                return Ok(statement);
            };

            let mut removed = Vec::new();
            for column in &create.columns {
                if let Some(clause) = ddl::find_options(sql, column.span.clone()) {
                    apply_description(comments, &create.table, &column.name, sql, &clause)?;
                    removed.push(clause.span);
                }
            }
            if let Some(clause) = ddl::find_options(sql, create.tail.clone()) {
                apply_description(comments, &create.table, "", sql, &clause)?;
                removed.push(clause.span);
            }

            if removed.is_empty() {
                Ok(statement)
            } else {
                Ok(Statement::new(ddl::remove_ranges(sql, removed)))
            }
        }
        StatementKind::AlterTable => {
            let alter = ALTER_OPTIONS_REGEX.get_or_init(|| {
                Regex::new(r"(?is)^\s*alter\s+table\s+(?:`([^`]+)`|(\w+))\s+set\b")
                    .expect("valid ALTER TABLE SET regex")
            });

            let sql = statement.text();
            let Some(caps) = alter.captures(sql) else {
                return Ok(statement);
            };
            let (Some(header), Some(table)) = (caps.get(0), caps.get(1).or_else(|| caps.get(2)))
            else {
                return Ok(statement);
            };

            // Only `SET OPTIONS(...)` with nothing else around it
            let Some(clause) = ddl::find_options(sql, header.end()..sql.len()) else {
                return Ok(statement);
            };
            let rest = sql[clause.span.end..].trim().trim_end_matches(';');
            if clause.span.start != header.end() || !rest.trim().is_empty() {
                return Ok(statement);
            }

            apply_description(comments, table.as_str(), "", sql, &clause)?;
            Ok(Statement::empty())
        }
        _ => Ok(statement),
    }
}

fn apply_description(
    comments: &CommentStore<'_>,
    table: &str,
    column: &str,
    sql: &str,
    clause: &ddl::OptionsClause,
) -> Result<()> {
    let description = ddl::option_pairs(sql, clause.body.clone())
        .into_iter()
        .find(|(name, _)| name == "description");

    let Some((_, text)) = description else {
        return Ok(());
    };

    match literal::parse_single(&text)? {
        Literal::Str(comment) => comments.upsert(table, column, &comment),
        Literal::Null => comments.remove(table, column),
        other => Err(Error::Internal(format!(
            "description of {}.{} is not a string literal: {:?}",
            table, column, other
        ))),
    }
}

/// Pass 3: `ARRAY<INT64>` to `ARRAY_INT64_` in column types
fn rewrite_generic_types(statement: Statement) -> Statement {
    if statement.kind() != StatementKind::CreateTable {
        return statement;
    }
    let sql = statement.text();
    let Some(create) = ddl::parse_create_table(sql) else {
        return statement;
    };

    let generic: Vec<_> = create
        .columns
        .iter()
        .filter_map(|column| column.generic_type.clone())
        .collect();
    if generic.is_empty() {
        return statement;
    }

    let mut text = sql.to_string();
    for range in generic.into_iter().rev() {
        let flattened: String = sql[range.clone()]
            .chars()
            .map(|c| {
                if c == '<' || c == '>' || c == ',' || c.is_whitespace() {
                    '_'
                } else {
                    c
                }
            })
            .collect();
        text.replace_range(range, &flattened);
    }

    Statement::new(text)
}

/// Pass 4: re-serialize literal tuples of `INSERT ... VALUES (...)`
fn rewrite_literal_insert(statement: Statement) -> Result<Statement> {
    static VALUES_KEYWORD_REGEX: OnceLock<Regex> = OnceLock::new();

    if statement.kind() != StatementKind::InsertValues {
        return Ok(statement);
    }

    let sql = statement.text();
    let spans = quoted_spans(sql);
    let has_placeholder = sql
        .match_indices('?')
        .any(|(pos, _)| !in_spans(&spans, pos));
    if has_placeholder {
        return Ok(statement);
    }

    let values_keyword = VALUES_KEYWORD_REGEX
        .get_or_init(|| Regex::new(r"(?i)\bvalues\s*\(").expect("valid VALUES regex"));
    let Some(keyword) = values_keyword
        .find_iter(sql)
        .find(|m| !in_spans(&spans, m.start()))
    else {
        return Ok(statement);
    };

    let open = keyword.end() - 1;
    let end = sql.trim_end().len();
    let prefix = &sql[..open];
    let tuple = &sql[open..end];

    // A single tuple only: the first unquoted ')' must close it.
    let first_close =
        (open..end).find(|&pos| sql.as_bytes()[pos] == b')' && !in_spans(&spans, pos));
    if first_close.is_none() || first_close != end.checked_sub(1) {
        return Ok(statement);
    }

    let rendered = literal::parse_tuple(tuple)?
        .into_iter()
        .map(render_literal)
        .collect::<Result<Vec<_>>>()?;

    Ok(Statement::new(format!("{}({})", prefix, rendered.join(", "))))
}

fn render_literal(literal: Literal) -> Result<String> {
    if let Literal::Ident(ident) = literal {
        return Ok(ident);
    }
    let value = literal.into_value()?.unwrap_or(Value::Null);

    let rendered = match value {
        Value::Bool(b) => if b { "1" } else { "0" }.to_string(),
        value if value.needs_literal_encoding() => quote_string(&codec::encode_hex(&value)?),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format!("{:?}", f),
        Value::Text(s) => quote_string(&s),
        _ => "NULL".to_string(),
    };
    Ok(rendered)
}

fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Pass 5: `UNNEST([ a, b ])` to `(a, b)`
fn flatten_unnest(statement: Statement) -> Result<Statement> {
    static UNNEST_REGEX: OnceLock<Regex> = OnceLock::new();

    let unnest = UNNEST_REGEX.get_or_init(|| {
        Regex::new(r"(?i)UNNEST\(\[ ([^\]]+)? \]\)").expect("valid UNNEST regex")
    });

    if !unnest.is_match(statement.text()) {
        return Ok(statement);
    }
    let text = replace_unquoted(unnest, statement.text(), |caps| {
        Ok(format!("({})", caps.get(1).map_or("", |m| m.as_str())))
    })?;
    Ok(Statement::new(text))
}

/// Pass 6: boolean keywords to integers
fn normalize_booleans(statement: Statement) -> Result<Statement> {
    static BOOLEAN_REGEX: OnceLock<Regex> = OnceLock::new();

    let boolean = BOOLEAN_REGEX
        .get_or_init(|| Regex::new(r"(?i)(\s)(true|false)\b").expect("valid boolean regex"));

    if !boolean.is_match(statement.text()) {
        return Ok(statement);
    }
    let text = replace_unquoted(boolean, statement.text(), |caps| {
        let digit = if caps[2].eq_ignore_ascii_case("true") { "1" } else { "0" };
        Ok(format!("{}{}", &caps[1], digit))
    })?;
    Ok(Statement::new(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rusqlite::Connection;

    fn with_store<T>(f: impl FnOnce(&CommentStore<'_>) -> T) -> T {
        let conn = Connection::open_in_memory().unwrap();
        let store = CommentStore::new(&conn);
        store.install().unwrap();
        f(&store)
    }

    fn rewrite_plain(sql: &str) -> String {
        with_store(|store| {
            rewrite(store, sql, &Parameters::new())
                .unwrap()
                .statement
                .into_text()
        })
    }

    #[test]
    fn test_no_rewrite() {
        let sql = "SELECT * FROM users";
        assert_eq!(rewrite_plain(sql), sql);
    }

    #[test]
    fn test_placeholders_are_positional() {
        with_store(|store| {
            let params = Parameters::new()
                .with("id", 1)
                .with("data", Value::array([1, 2, 3]));
            let out = rewrite(
                store,
                "SELECT * FROM t WHERE id = %(id)s AND data = %(data)s",
                &params,
            )
            .unwrap();

            assert_eq!(out.statement.text(), "SELECT * FROM t WHERE id = ? AND data = ?");
            assert_eq!(out.parameters, vec![Value::Int(1), Value::array([1, 2, 3])]);
        });
    }

    #[test]
    fn test_repeated_placeholder_gets_repeated_slot() {
        with_store(|store| {
            let params = Parameters::new().with("x", 5);
            let out = rewrite(store, "SELECT %(x)s, %(x:INT64)s", &params).unwrap();
            assert_eq!(out.statement.text(), "SELECT ?, ?");
            assert_eq!(out.parameters, vec![Value::Int(5), Value::Int(5)]);
        });
    }

    #[test]
    fn test_missing_parameter() {
        with_store(|store| {
            let params = Parameters::new().with("x", 5);
            let err = rewrite(store, "SELECT %(y)s", &params).unwrap_err();
            assert!(matches!(err, Error::MissingParameter(name) if name == "y"));
        });
    }

    #[test]
    fn test_percent_escape_without_parameters() {
        assert_eq!(
            rewrite_plain("SELECT * FROM t WHERE s LIKE 'a%%'"),
            "SELECT * FROM t WHERE s LIKE 'a%'"
        );
    }

    #[test]
    fn test_create_table_column_and_table_comments() {
        with_store(|store| {
            let sql = "CREATE TABLE `t` (\n\t`x` INT64 OPTIONS(description='the x'),\n\t`y` STRING\n) OPTIONS(description='the table')";
            let out = rewrite(store, sql, &Parameters::new()).unwrap();

            assert_eq!(
                out.statement.text(),
                "CREATE TABLE `t` (\n\t`x` INT64,\n\t`y` STRING\n)"
            );
            let comments = store.lookup("t").unwrap();
            assert_eq!(comments["x"], "the x");
            assert_eq!(comments[""], "the table");
        });
    }

    #[test]
    fn test_alter_table_set_options() {
        with_store(|store| {
            let out = rewrite(
                store,
                "ALTER TABLE t SET OPTIONS(description=\"hi\")",
                &Parameters::new(),
            )
            .unwrap();

            assert!(out.statement.is_empty());
            assert_eq!(store.lookup("t").unwrap()[""], "hi");
        });
    }

    #[test]
    fn test_alter_table_description_null_removes_comment() {
        with_store(|store| {
            store.upsert("t", "", "old").unwrap();
            let out = rewrite(
                store,
                "ALTER TABLE `t` SET OPTIONS(description=NULL)",
                &Parameters::new(),
            )
            .unwrap();

            assert!(out.statement.is_empty());
            assert!(store.lookup("t").unwrap().is_empty());
        });
    }

    #[test]
    fn test_alter_table_other_forms_untouched() {
        let sql = "ALTER TABLE t ADD COLUMN z INT64";
        assert_eq!(rewrite_plain(sql), sql);
    }

    #[test]
    fn test_generic_type_brackets() {
        assert_eq!(
            rewrite_plain("CREATE TABLE t (c ARRAY<INT64>)"),
            "CREATE TABLE t (c ARRAY_INT64_)"
        );
        assert_eq!(
            rewrite_plain("CREATE TABLE `t` (`a` INT64, `s` STRUCT<x INT64, y STRING>)"),
            "CREATE TABLE `t` (`a` INT64, `s` STRUCT_x_INT64__y_STRING_)"
        );
    }

    #[test]
    fn test_generic_type_only_in_create_table() {
        let sql = "SELECT CAST(x AS ARRAY<INT64>) FROM t";
        assert_eq!(rewrite_plain(sql), sql);
    }

    #[test]
    fn test_literal_insert_date_and_bool() {
        let out = rewrite_plain("INSERT INTO t VALUES (date '2021-02-03', true)");
        let date = Value::Date(NaiveDate::from_ymd_opt(2021, 2, 3).unwrap());
        let payload = codec::encode_hex(&date).unwrap();

        assert_eq!(out, format!("INSERT INTO t VALUES ('{}', 1)", payload));
    }

    #[test]
    fn test_literal_insert_keeps_native_values() {
        assert_eq!(
            rewrite_plain("INSERT INTO `t` (`a`, `b`, `c`, `d`) VALUES (42, 4.2, 'it''s', NULL)"),
            "INSERT INTO `t` (`a`, `b`, `c`, `d`) VALUES (42, 4.2, 'it''s', NULL)"
        );
    }

    #[test]
    fn test_literal_insert_bytes_are_encoded() {
        let out = rewrite_plain("INSERT INTO `t` (`b`) VALUES (b'myBINARY')");
        let payload = codec::encode_hex(&Value::bytes(b"myBINARY".to_vec())).unwrap();
        assert_eq!(out, format!("INSERT INTO `t` (`b`) VALUES ('{}')", payload));
    }

    #[test]
    fn test_literal_insert_values_word_in_string() {
        let out = rewrite_plain("INSERT INTO t (s, d) VALUES ('see values (x)', date '2021-02-03')");
        let date = Value::Date(NaiveDate::from_ymd_opt(2021, 2, 3).unwrap());
        let payload = codec::encode_hex(&date).unwrap();

        assert_eq!(
            out,
            format!("INSERT INTO t (s, d) VALUES ('see values (x)', '{}')", payload)
        );
    }

    #[test]
    fn test_literal_insert_skipped_with_placeholders() {
        with_store(|store| {
            let params = Parameters::new().with("d", 1);
            let out = rewrite(store, "INSERT INTO t VALUES (%(d)s, DATE '2021-02-03')", &params)
                .unwrap();
            assert_eq!(out.statement.text(), "INSERT INTO t VALUES (?, DATE '2021-02-03')");
        });
    }

    #[test]
    fn test_literal_insert_multi_row_untouched() {
        let sql = "INSERT INTO t VALUES (1), (2)";
        assert_eq!(rewrite_plain(sql), sql);
    }

    #[test]
    fn test_literal_insert_bad_token_fails_fast() {
        with_store(|store| {
            let err = rewrite(store, "INSERT INTO t VALUES (1 + 1)", &Parameters::new())
                .unwrap_err();
            assert!(matches!(err, Error::Internal(_)));
        });
    }

    #[test]
    fn test_unnest_flattening() {
        assert_eq!(
            rewrite_plain("SELECT x FROM t WHERE x IN UNNEST([ 1, 2, 3 ])"),
            "SELECT x FROM t WHERE x IN (1, 2, 3)"
        );
        assert_eq!(
            rewrite_plain("SELECT x FROM t WHERE x IN UNNEST([  ])"),
            "SELECT x FROM t WHERE x IN ()"
        );
    }

    #[test]
    fn test_boolean_normalization() {
        assert_eq!(
            rewrite_plain("SELECT * FROM t WHERE a = true AND b = false"),
            "SELECT * FROM t WHERE a = 1 AND b = 0"
        );
    }

    #[test]
    fn test_boolean_inside_string_untouched() {
        let sql = "SELECT * FROM t WHERE s = 'is true' AND a = true";
        assert_eq!(
            rewrite_plain(sql),
            "SELECT * FROM t WHERE s = 'is true' AND a = 1"
        );
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let statements = [
            "SELECT * FROM t WHERE a = true",
            "CREATE TABLE t (c ARRAY<INT64>, d STRING)",
            "INSERT INTO t VALUES (date '2021-02-03', true, 4.25, 'x', NULL)",
            "INSERT INTO t VALUES (datetime '2021-02-03 04:05:06.123456', time '04:05:06')",
            "SELECT x FROM t WHERE x IN UNNEST([ 'a', 'b' ])",
        ];
        for sql in statements {
            let once = rewrite_plain(sql);
            let twice = rewrite_plain(&once);
            assert_eq!(once, twice, "{}", sql);
        }
    }
}
