//! CREATE TABLE scanner
//!
//! Locates the table name, the column definitions and the trailing table
//! options of a `CREATE TABLE` statement without parsing the whole DDL
//! grammar. Commas and parentheses inside quoted literals, nested
//! parentheses and angle-bracket type parameters are all skipped over.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

use crate::literal::{in_spans, quoted_spans};

/// Structure of a `CREATE TABLE` statement (byte offsets into the text).
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub table: String,
    pub columns: Vec<ColumnDef>,
    /// Everything after the column list (or after the name when there is none)
    pub tail: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub span: Range<usize>,
    /// The column type, when it is a bracketed generic like `ARRAY<INT64>`
    pub generic_type: Option<Range<usize>>,
}

/// An `OPTIONS(...)` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionsClause {
    /// Whole clause, including the whitespace in front of it
    pub span: Range<usize>,
    /// Text between the parentheses
    pub body: Range<usize>,
}

pub fn parse_create_table(sql: &str) -> Option<CreateTable> {
    static HEADER_REGEX: OnceLock<Regex> = OnceLock::new();

    let header = HEADER_REGEX.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*create\s+(?:or\s+replace\s+)?table\s+(?:if\s+not\s+exists\s+)?(?:`([^`]+)`|(\w+))",
        )
        .expect("valid CREATE TABLE header regex")
    });

    let caps = header.captures(sql)?;
    let table = caps.get(1).or_else(|| caps.get(2))?.as_str().to_string();
    let after_name = caps.get(0)?.end();
    let spans = quoted_spans(sql);

    let open = after_name + leading_whitespace(&sql[after_name..]);
    if sql.as_bytes().get(open) != Some(&b'(') {
        return Some(CreateTable {
            table,
            columns: Vec::new(),
            tail: after_name..sql.len(),
        });
    }

    let close = matching_paren(sql, open, &spans)?;
    let columns = split_top_level(sql, open + 1..close, &spans)
        .into_iter()
        .filter_map(|span| column_def(sql, span))
        .collect();

    Some(CreateTable {
        table,
        columns,
        tail: close + 1..sql.len(),
    })
}

/// Find the first top-level `OPTIONS(...)` clause in `range`.
pub fn find_options(sql: &str, range: Range<usize>) -> Option<OptionsClause> {
    static OPTIONS_REGEX: OnceLock<Regex> = OnceLock::new();

    let options = OPTIONS_REGEX
        .get_or_init(|| Regex::new(r"(?i)\boptions\s*\(").expect("valid OPTIONS regex"));
    let spans = quoted_spans(sql);

    for m in options.find_iter(&sql[range.clone()]) {
        let start = range.start + m.start();
        if in_spans(&spans, start) || depth_at(sql, range.start..start, &spans) != 0 {
            continue;
        }
        let open = range.start + m.end() - 1;
        let close = matching_paren(sql, open, &spans)?;
        if close >= range.end {
            return None;
        }
        let ws = trailing_whitespace(&sql[range.start..start]);
        return Some(OptionsClause {
            span: start - ws..close + 1,
            body: open + 1..close,
        });
    }

    None
}

/// Split an options list body into `(name, value text)` pairs.
pub fn option_pairs(sql: &str, body: Range<usize>) -> Vec<(String, String)> {
    let spans = quoted_spans(sql);
    split_top_level(sql, body, &spans)
        .into_iter()
        .filter_map(|item| {
            let text = &sql[item];
            let (name, value) = text.split_once('=')?;
            Some((name.trim().to_ascii_lowercase(), value.trim().to_string()))
        })
        .collect()
}

/// Remove the given byte ranges from `sql`.
pub fn remove_ranges(sql: &str, mut ranges: Vec<Range<usize>>) -> String {
    ranges.sort_by_key(|r| r.start);
    let mut out = String::with_capacity(sql.len());
    let mut cursor = 0;
    for range in ranges {
        if range.start < cursor {
            continue;
        }
        out.push_str(&sql[cursor..range.start]);
        cursor = range.end;
    }
    out.push_str(&sql[cursor..]);
    out
}

fn column_def(sql: &str, span: Range<usize>) -> Option<ColumnDef> {
    static COLUMN_REGEX: OnceLock<Regex> = OnceLock::new();

    let column = COLUMN_REGEX.get_or_init(|| {
        Regex::new(r"^\s*(?:`([^`]+)`|(\w+))\s+(\w+)\s*(<)?").expect("valid column regex")
    });

    let text = &sql[span.clone()];
    let caps = column.captures(text)?;
    let name = caps.get(1).or_else(|| caps.get(2))?.as_str().to_string();

    let generic_type = match (caps.get(3), caps.get(4)) {
        (Some(word), Some(open)) => {
            let open = span.start + open.start();
            matching_angle(sql, open, span.end).map(|close| span.start + word.start()..close + 1)
        }
        _ => None,
    };

    Some(ColumnDef {
        name,
        span,
        generic_type,
    })
}

/// Split `range` at commas that sit outside quotes, parentheses and angle
/// brackets. Pieces are trimmed; empty pieces are dropped.
fn split_top_level(sql: &str, range: Range<usize>, spans: &[Range<usize>]) -> Vec<Range<usize>> {
    let bytes = sql.as_bytes();
    let mut pieces = Vec::new();
    let mut depth = 0i32;
    let mut start = range.start;

    for i in range.clone() {
        if in_spans(spans, i) {
            continue;
        }
        match bytes[i] {
            b'(' | b'<' | b'[' => depth += 1,
            b')' | b'>' | b']' => depth = (depth - 1).max(0),
            b',' if depth == 0 => {
                pieces.push(start..i);
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(start..range.end);

    pieces
        .into_iter()
        .map(|piece| trim_range(sql, piece))
        .filter(|piece| !piece.is_empty())
        .collect()
}

fn depth_at(sql: &str, range: Range<usize>, spans: &[Range<usize>]) -> i32 {
    let bytes = sql.as_bytes();
    let mut depth = 0i32;
    for i in range {
        if in_spans(spans, i) {
            continue;
        }
        match bytes[i] {
            b'(' | b'<' | b'[' => depth += 1,
            b')' | b'>' | b']' => depth = (depth - 1).max(0),
            _ => {}
        }
    }
    depth
}

fn matching_paren(sql: &str, open: usize, spans: &[Range<usize>]) -> Option<usize> {
    let bytes = sql.as_bytes();
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_spans(spans, i) {
            continue;
        }
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn matching_angle(sql: &str, open: usize, limit: usize) -> Option<usize> {
    let bytes = sql.as_bytes();
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().take(limit).skip(open) {
        match b {
            b'<' => depth += 1,
            b'>' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn trim_range(sql: &str, range: Range<usize>) -> Range<usize> {
    let text = &sql[range.clone()];
    let start = range.start + leading_whitespace(text);
    let end = range.end - trailing_whitespace(text);
    start..end.max(start)
}

fn leading_whitespace(text: &str) -> usize {
    text.len() - text.trim_start().len()
}

fn trailing_whitespace(text: &str) -> usize {
    text.len() - text.trim_end().len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_columns() {
        let sql = "CREATE TABLE `t` (\n\t`id` INT64 NOT NULL,\n\t`data` ARRAY<INT64>,\n\t`s` STRUCT<a INT64, b STRING>\n)";
        let ct = parse_create_table(sql).unwrap();
        assert_eq!(ct.table, "t");
        let names: Vec<_> = ct.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "data", "s"]);
        assert_eq!(ct.columns[0].generic_type, None);
        assert_eq!(
            &sql[ct.columns[1].generic_type.clone().unwrap()],
            "ARRAY<INT64>"
        );
        assert_eq!(
            &sql[ct.columns[2].generic_type.clone().unwrap()],
            "STRUCT<a INT64, b STRING>"
        );
        assert_eq!(&sql[ct.tail], "");
    }

    #[test]
    fn test_parse_without_backticks() {
        let ct = parse_create_table("create table t (c ARRAY<INT64>)").unwrap();
        assert_eq!(ct.table, "t");
        assert_eq!(ct.columns.len(), 1);
        assert_eq!(ct.columns[0].name, "c");
    }

    #[test]
    fn test_not_create_table() {
        assert!(parse_create_table("SELECT 1").is_none());
        assert!(parse_create_table("CREATE VIEW v AS SELECT 1").is_none());
    }

    #[test]
    fn test_find_column_and_table_options() {
        let sql = "CREATE TABLE `t` (`x` INT64 OPTIONS(description='a, (b)')) OPTIONS(description='tbl')";
        let ct = parse_create_table(sql).unwrap();

        let column = find_options(sql, ct.columns[0].span.clone()).unwrap();
        assert_eq!(&sql[column.body.clone()], "description='a, (b)'");
        assert_eq!(&sql[column.span.clone()], " OPTIONS(description='a, (b)')");

        let table = find_options(sql, ct.tail.clone()).unwrap();
        assert_eq!(&sql[table.body.clone()], "description='tbl'");

        let stripped = remove_ranges(sql, vec![table.span, column.span]);
        assert_eq!(stripped, "CREATE TABLE `t` (`x` INT64)");
    }

    #[test]
    fn test_options_inside_string_ignored() {
        let sql = "CREATE TABLE t (x STRING DEFAULT 'options(no)')";
        let ct = parse_create_table(sql).unwrap();
        assert!(find_options(sql, ct.columns[0].span.clone()).is_none());
    }

    #[test]
    fn test_option_pairs() {
        let sql = "description='x, y', labels=[('a', 'b')]";
        let pairs = option_pairs(sql, 0..sql.len());
        assert_eq!(
            pairs,
            vec![
                ("description".to_string(), "'x, y'".to_string()),
                ("labels".to_string(), "[('a', 'b')]".to_string()),
            ]
        );
    }
}
