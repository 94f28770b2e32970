//! Literal tuple parser
//!
//! Parses the value list of `INSERT ... VALUES (...)` and the values of
//! `OPTIONS(...)` lists. The grammar is deliberately small:
//!
//! ```text
//! tuple    := '(' literal (',' literal)* [','] ')'
//! literal  := number | string | bytes | ident | temporal
//! temporal := ('date' | 'datetime' | 'time' | 'timestamp') string
//! ```
//!
//! `true`, `false` and `null` are recognized among the identifiers. Nothing
//! is ever evaluated; anything outside the grammar is rejected.

use std::ops::Range;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{Error, Result};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(String),
    Str(String),
    Bytes(Vec<u8>),
    LParen,
    RParen,
    Comma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalKind {
    Date,
    DateTime,
    Time,
}

impl TemporalKind {
    /// Map a constructor keyword to its kind. `timestamp` is read as a
    /// naive datetime.
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "date" => Ok(TemporalKind::Date),
            "datetime" | "timestamp" => Ok(TemporalKind::DateTime),
            "time" => Ok(TemporalKind::Time),
            other => Err(Error::Internal(format!(
                "unrecognized temporal type tag: {}",
                other
            ))),
        }
    }

    /// Parse the quoted text of a constructor literal.
    pub fn parse(self, text: &str) -> Result<Value> {
        let parsed = match self {
            TemporalKind::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d").map(Value::Date),
            TemporalKind::DateTime => {
                let format = if text.contains('.') {
                    "%Y-%m-%d %H:%M:%S%.f"
                } else {
                    "%Y-%m-%d %H:%M:%S"
                };
                NaiveDateTime::parse_from_str(&text.replacen('T', " ", 1), format)
                    .map(Value::DateTime)
            }
            TemporalKind::Time => {
                let format = if text.contains('.') {
                    "%H:%M:%S%.f"
                } else {
                    "%H:%M:%S"
                };
                NaiveTime::parse_from_str(text, format).map(Value::Time)
            }
        };
        parsed.map_err(|e| Error::Internal(format!("bad {:?} literal '{}': {}", self, text, e)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Temporal(TemporalKind, String),
    /// Bare identifier, re-emitted verbatim
    Ident(String),
}

impl Literal {
    /// Convert to a value. Identifiers have no value of their own.
    pub fn into_value(self) -> Result<Option<Value>> {
        let value = match self {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(b),
            Literal::Int(i) => Value::Int(i),
            Literal::Float(f) => Value::Float(f),
            Literal::Str(s) => Value::Text(s),
            Literal::Bytes(b) => Value::Bytes(b),
            Literal::Temporal(kind, text) => kind.parse(&text)?,
            Literal::Ident(_) => return Ok(None),
        };
        Ok(Some(value))
    }
}

/// Parse a parenthesized literal tuple.
pub fn parse_tuple(input: &str) -> Result<Vec<Literal>> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };

    parser.expect(&Token::LParen)?;
    let mut items = Vec::new();
    loop {
        if parser.peek() == Some(&Token::RParen) && !items.is_empty() {
            parser.pos += 1;
            break;
        }
        items.push(parser.literal()?);
        match parser.next() {
            Some(Token::Comma) => continue,
            Some(Token::RParen) => break,
            other => {
                return Err(Error::Internal(format!(
                    "expected ',' or ')' in literal tuple, found {:?}",
                    other
                )))
            }
        }
    }
    parser.finish()?;
    Ok(items)
}

/// Parse a single literal that must make up the whole input.
pub fn parse_single(input: &str) -> Result<Literal> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let literal = parser.literal()?;
    parser.finish()?;
    Ok(literal)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        match self.next() {
            Some(ref token) if token == expected => Ok(()),
            other => Err(Error::Internal(format!(
                "expected {:?}, found {:?}",
                expected, other
            ))),
        }
    }

    fn finish(&self) -> Result<()> {
        match self.tokens.get(self.pos) {
            None => Ok(()),
            Some(token) => Err(Error::Internal(format!(
                "unexpected trailing token {:?}",
                token
            ))),
        }
    }

    fn literal(&mut self) -> Result<Literal> {
        match self.next() {
            Some(Token::Number(text)) => number(&text),
            Some(Token::Str(s)) => Ok(Literal::Str(s)),
            Some(Token::Bytes(b)) => Ok(Literal::Bytes(b)),
            Some(Token::Ident(ident)) => {
                let lower = ident.to_ascii_lowercase();
                match lower.as_str() {
                    "true" => Ok(Literal::Bool(true)),
                    "false" => Ok(Literal::Bool(false)),
                    "null" => Ok(Literal::Null),
                    "date" | "datetime" | "time" | "timestamp" => {
                        if let Some(Token::Str(text)) = self.peek().cloned() {
                            self.pos += 1;
                            Ok(Literal::Temporal(TemporalKind::from_tag(&lower)?, text))
                        } else {
                            Ok(Literal::Ident(ident))
                        }
                    }
                    _ => Ok(Literal::Ident(ident)),
                }
            }
            other => Err(Error::Internal(format!(
                "unsupported token in literal: {:?}",
                other
            ))),
        }
    }
}

fn number(text: &str) -> Result<Literal> {
    if text.contains(['.', 'e', 'E']) {
        text.parse::<f64>()
            .map(Literal::Float)
            .map_err(|e| Error::Internal(format!("bad number '{}': {}", text, e)))
    } else {
        text.parse::<i64>()
            .map(Literal::Int)
            .map_err(|e| Error::Internal(format!("bad integer '{}': {}", text, e)))
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '\'' | '"' => {
                let (text, next) = quoted(&chars, i, false)?;
                tokens.push(Token::Str(text));
                i = next;
            }
            '-' | '+' | '.' | '0'..='9' => {
                let start = i;
                if c == '-' || c == '+' {
                    i += 1;
                }
                let mut seen_digit = false;
                while i < chars.len() {
                    match chars[i] {
                        '0'..='9' => seen_digit = true,
                        '.' => {}
                        'e' | 'E' if seen_digit => {
                            if matches!(chars.get(i + 1), Some('-') | Some('+')) {
                                i += 1;
                            }
                        }
                        _ => break,
                    }
                    i += 1;
                }
                if !seen_digit {
                    return Err(Error::Internal(format!(
                        "unexpected character {:?} in literal",
                        c
                    )));
                }
                tokens.push(Token::Number(chars[start..i].iter().collect()));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let prefix = word.to_ascii_lowercase();
                let quote_follows = matches!(chars.get(i), Some('\'') | Some('"'));
                if quote_follows && matches!(prefix.as_str(), "b" | "r" | "br" | "rb") {
                    let (text, next) = quoted(&chars, i, prefix.contains('r'))?;
                    i = next;
                    if prefix.contains('b') {
                        tokens.push(Token::Bytes(latin1_bytes(&text)?));
                    } else {
                        tokens.push(Token::Str(text));
                    }
                } else {
                    tokens.push(Token::Ident(word));
                }
            }
            other => {
                return Err(Error::Internal(format!(
                    "unexpected character {:?} in literal",
                    other
                )))
            }
        }
    }

    Ok(tokens)
}

/// Read a quoted string starting at `start`; returns the unescaped text and
/// the index after the closing quote.
fn quoted(chars: &[char], start: usize, raw: bool) -> Result<(String, usize)> {
    let quote = chars[start];
    let mut text = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && !raw {
            let escaped = chars
                .get(i + 1)
                .ok_or_else(|| Error::Internal("dangling escape in string literal".to_string()))?;
            match escaped {
                'n' => text.push('\n'),
                't' => text.push('\t'),
                'r' => text.push('\r'),
                '0' => text.push('\0'),
                'x' => {
                    let digits: String = chars.get(i + 2..i + 4).unwrap_or(&[]).iter().collect();
                    let code = u8::from_str_radix(&digits, 16).map_err(|_| {
                        Error::Internal(format!("bad \\x escape in string literal: {}", digits))
                    })?;
                    text.push(char::from(code));
                    i += 2;
                }
                other => text.push(*other),
            }
            i += 2;
        } else if c == quote {
            if chars.get(i + 1) == Some(&quote) {
                text.push(quote);
                i += 2;
            } else {
                return Ok((text, i + 1));
            }
        } else {
            text.push(c);
            i += 1;
        }
    }

    Err(Error::Internal("unterminated string literal".to_string()))
}

fn latin1_bytes(text: &str) -> Result<Vec<u8>> {
    text.chars()
        .map(|c| {
            u8::try_from(u32::from(c))
                .map_err(|_| Error::Internal(format!("non-byte character {:?} in bytes literal", c)))
        })
        .collect()
}

/// Byte ranges of quoted regions: `'...'`, `"..."` and `` `...` ``.
///
/// Backslash escapes and doubled quotes stay inside the region. An
/// unterminated quote runs to the end of the text.
pub fn quoted_spans(sql: &str) -> Vec<Range<usize>> {
    let bytes = sql.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let quote = bytes[i];
        if quote != b'\'' && quote != b'"' && quote != b'`' {
            i += 1;
            continue;
        }
        let start = i;
        i += 1;
        loop {
            if i >= bytes.len() {
                break;
            }
            if bytes[i] == b'\\' && quote != b'`' {
                i += 2;
                continue;
            }
            if bytes[i] == quote {
                if bytes.get(i + 1) == Some(&quote) {
                    i += 2;
                    continue;
                }
                i += 1;
                break;
            }
            i += 1;
        }
        spans.push(start..i.min(bytes.len()));
    }

    spans
}

/// Whether byte offset `pos` falls inside one of `spans`.
pub fn in_spans(spans: &[Range<usize>], pos: usize) -> bool {
    spans.iter().any(|span| span.contains(&pos))
}
