//! Backend predicate strings
//!
//! The filter endpoint accepts a list of textual predicates:
//!
//! ```text
//! Name.Contains("cardio")
//! Department == "d1"
//! Department in ("d1", "d2")
//! ```
//!
//! Literals are double-quoted with `\` and `"` backslash-escaped.

use crate::naming::server_field_name;
use crate::RawId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A predicate in the backend's textual format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredicateString(String);

impl PredicateString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn parse(&self) -> Result<Predicate, PredicateParseError> {
        Predicate::parse(&self.0)
    }
}

impl fmt::Display for PredicateString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Predicate> for PredicateString {
    fn from(predicate: Predicate) -> Self {
        predicate.to_predicate_string()
    }
}

/// Structured form of a predicate string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Substring match
    Contains { field: String, literal: String },
    /// FK equality against a single raw id
    Equals { field: String, id: String },
    /// FK membership in a set of raw ids
    In { field: String, ids: Vec<String> },
}

impl Predicate {
    /// Substring predicate for an in-memory column key.
    pub fn contains(key: &str, literal: &str) -> Self {
        Predicate::Contains {
            field: server_field_name(key),
            literal: literal.to_string(),
        }
    }

    /// Equality or membership predicate over a raw FK column.
    ///
    /// Returns `None` for an empty id set; an empty membership cannot be
    /// expressed and means "no results" to the caller.
    pub fn membership<'a>(key: &str, ids: impl IntoIterator<Item = &'a RawId>) -> Option<Self> {
        let field = server_field_name(key);
        let mut ids: Vec<String> = ids.into_iter().map(|id| id.as_str().to_string()).collect();
        ids.sort();
        ids.dedup();
        match ids.len() {
            0 => None,
            1 => Some(Predicate::Equals {
                field,
                id: ids.remove(0),
            }),
            _ => Some(Predicate::In { field, ids }),
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Predicate::Contains { field, .. }
            | Predicate::Equals { field, .. }
            | Predicate::In { field, .. } => field,
        }
    }

    pub fn to_predicate_string(&self) -> PredicateString {
        let text = match self {
            Predicate::Contains { field, literal } => {
                format!("{field}.Contains(\"{}\")", escape_literal(literal))
            }
            Predicate::Equals { field, id } => format!("{field} == \"{}\"", escape_literal(id)),
            Predicate::In { field, ids } => {
                let quoted: Vec<String> = ids
                    .iter()
                    .map(|id| format!("\"{}\"", escape_literal(id)))
                    .collect();
                format!("{field} in ({})", quoted.join(", "))
            }
        };
        PredicateString(text)
    }

    /// Parse the textual format back into a predicate.
    pub fn parse(input: &str) -> Result<Self, PredicateParseError> {
        let input = input.trim();
        if let Some((field, rest)) = input.split_once(".Contains(") {
            let rest = rest
                .strip_suffix(')')
                .ok_or_else(|| PredicateParseError::new(input, "missing closing parenthesis"))?;
            let (literal, tail) =
                parse_quoted(rest).map_err(|r| PredicateParseError::new(input, r))?;
            if !tail.trim().is_empty() {
                return Err(PredicateParseError::new(input, "trailing input after literal"));
            }
            return Ok(Predicate::Contains {
                field: checked_field(input, field)?,
                literal,
            });
        }
        if let Some((field, rest)) = input.split_once(" == ") {
            let (id, tail) = parse_quoted(rest).map_err(|r| PredicateParseError::new(input, r))?;
            if !tail.trim().is_empty() {
                return Err(PredicateParseError::new(input, "trailing input after literal"));
            }
            return Ok(Predicate::Equals {
                field: checked_field(input, field)?,
                id,
            });
        }
        if let Some((field, rest)) = input.split_once(" in (") {
            let mut rest = rest
                .strip_suffix(')')
                .ok_or_else(|| PredicateParseError::new(input, "missing closing parenthesis"))?;
            let mut ids = Vec::new();
            loop {
                let (id, tail) =
                    parse_quoted(rest).map_err(|r| PredicateParseError::new(input, r))?;
                ids.push(id);
                let tail = tail.trim_start();
                if tail.is_empty() {
                    break;
                }
                rest = tail
                    .strip_prefix(',')
                    .ok_or_else(|| PredicateParseError::new(input, "expected ',' between ids"))?;
            }
            return Ok(Predicate::In {
                field: checked_field(input, field)?,
                ids,
            });
        }
        Err(PredicateParseError::new(input, "unrecognized predicate"))
    }
}

/// Predicate text that does not follow the backend format.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid predicate `{input}`: {reason}")]
pub struct PredicateParseError {
    pub input: String,
    pub reason: String,
}

impl PredicateParseError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

pub fn escape_literal(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn checked_field(input: &str, field: &str) -> Result<String, PredicateParseError> {
    let field = field.trim();
    if field.is_empty() || !field.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
        return Err(PredicateParseError::new(input, "invalid field name"));
    }
    Ok(field.to_string())
}

/// Parse one double-quoted, backslash-escaped literal; returns it and the
/// remaining input.
fn parse_quoted(input: &str) -> Result<(String, &str), &'static str> {
    let input = input.trim_start();
    let mut chars = input.char_indices();
    match chars.next() {
        Some((_, '"')) => {}
        _ => return Err("expected opening quote"),
    }
    let mut out = String::new();
    let mut escaped = false;
    for (i, c) in chars {
        if escaped {
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return Ok((out, &input[i + 1..]));
        } else {
            out.push(c);
        }
    }
    Err("unterminated literal")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_format() {
        let p = Predicate::contains("name", "cardio").to_predicate_string();
        assert_eq!(p.as_str(), "Name.Contains(\"cardio\")");
    }

    #[test]
    fn test_contains_escapes_quotes_and_backslashes() {
        let p = Predicate::contains("Reason", r#"say "hi" \ bye"#).to_predicate_string();
        assert_eq!(p.as_str(), r#"Reason.Contains("say \"hi\" \\ bye")"#);
    }

    #[test]
    fn test_membership_single_id_is_equality() {
        let ids = [RawId::new("d1")];
        let p = Predicate::membership("DepartmentId", &ids).unwrap();
        assert_eq!(p.to_predicate_string().as_str(), "Department == \"d1\"");
    }

    #[test]
    fn test_membership_many_ids_is_in() {
        let ids = [RawId::new("d2"), RawId::new("d1"), RawId::new("d2")];
        let p = Predicate::membership("DepartmentId", &ids).unwrap();
        assert_eq!(
            p.to_predicate_string().as_str(),
            "Department in (\"d1\", \"d2\")"
        );
    }

    #[test]
    fn test_membership_empty_is_none() {
        let ids: [RawId; 0] = [];
        assert!(Predicate::membership("DepartmentId", &ids).is_none());
    }

    #[test]
    fn test_parse_each_form() {
        for p in [
            Predicate::contains("Name", r#"a "quoted" \ name"#),
            Predicate::Equals {
                field: "Department".to_string(),
                id: "d1".to_string(),
            },
            Predicate::In {
                field: "Department".to_string(),
                ids: vec!["d1".to_string(), "d,2".to_string()],
            },
        ] {
            let text = p.to_predicate_string();
            assert_eq!(text.parse().unwrap(), p);
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Predicate::parse("Name LIKE 'x'").is_err());
        assert!(Predicate::parse("Name.Contains(\"open").is_err());
        assert!(Predicate::parse(" == \"d1\"").is_err());
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: any literal, including quotes and backslashes, survives
        /// escaping and parsing unchanged.
        #[test]
        fn prop_contains_literal_survives_escaping(literal in ".*") {
            let text = Predicate::contains("Name", &literal).to_predicate_string();
            let parsed = text.parse().unwrap();
            prop_assert_eq!(parsed, Predicate::Contains { field: "Name".to_string(), literal });
        }

        /// Property: escaped literals never contain an unescaped quote.
        #[test]
        fn prop_escaped_quotes_are_preceded_by_backslash(literal in ".*") {
            let escaped = escape_literal(&literal);
            let bytes = escaped.as_bytes();
            let mut backslashes = 0usize;
            for &b in bytes {
                if b == b'"' {
                    prop_assert!(backslashes % 2 == 1);
                }
                if b == b'\\' {
                    backslashes += 1;
                } else {
                    backslashes = 0;
                }
            }
        }
    }
}
