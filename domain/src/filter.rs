//! Row predicates and ordering shared by the store and the query builder.

use std::cmp::Ordering;

use serde_json::Value;

use crate::{Record, StoreError};

/// Column equality condition (`column = value`).
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub column: String,
    pub value: Value,
}

impl Condition {
    pub fn eq<C: Into<String>, V: Into<Value>>(column: C, value: V) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// The row must carry the column and hold an equal value.
    pub fn matches(&self, row: &Record) -> bool {
        row.get(&self.column)
            .is_some_and(|v| values_equal(v, &self.value))
    }
}

/// True when `row` satisfies every condition (logical AND).
pub fn matches_all(row: &Record, conditions: &[Condition]) -> bool {
    conditions.iter().all(|c| c.matches(row))
}

/// JSON equality where numbers compare by value (`5` == `5.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// Operator of one clause in an OR filter string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrOp {
    /// Case-insensitive substring match.
    ILike,
    /// Case-sensitive substring match.
    Like,
    /// Exact match on the value's text form.
    Eq,
}

impl OrOp {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ilike" => Some(OrOp::ILike),
            "like" => Some(OrOp::Like),
            "eq" => Some(OrOp::Eq),
            _ => None,
        }
    }
}

/// One `column.op.value` clause of an OR filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrClause {
    pub column: String,
    pub op: OrOp,
    /// Needle with `%` wildcards removed; lowercased for `ilike`.
    pub value: String,
}

impl OrClause {
    pub fn matches(&self, row: &Record) -> bool {
        let Some(field) = row.get(&self.column) else {
            return false;
        };
        match self.op {
            OrOp::ILike => field
                .as_str()
                .is_some_and(|s| s.to_lowercase().contains(&self.value)),
            OrOp::Like => field.as_str().is_some_and(|s| s.contains(&self.value)),
            OrOp::Eq => text_form(field).is_some_and(|s| s == self.value),
        }
    }
}

fn text_form(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse `"name.ilike.%foo%,description.ilike.%foo%"`.
///
/// Surrounding parentheses are accepted (`or=(a.eq.1,b.eq.2)` in query
/// strings). The value part keeps any further dots.
pub fn parse_or_filter(expr: &str) -> Result<Vec<OrClause>, StoreError> {
    let trimmed = expr.trim();
    let body = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(trimmed);

    let mut clauses = Vec::new();
    for raw in body.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let mut parts = raw.splitn(3, '.');
        let (Some(column), Some(op), Some(value)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(StoreError::InvalidFilter(format!(
                "expected column.op.value, got '{}'",
                raw
            )));
        };
        let op = OrOp::parse(op.trim())
            .ok_or_else(|| StoreError::InvalidFilter(format!("unsupported operator '{}'", op)))?;
        let needle = value.trim().replace('%', "");
        let needle = if op == OrOp::ILike {
            needle.to_lowercase()
        } else {
            needle
        };
        clauses.push(OrClause {
            column: column.trim().to_string(),
            op,
            value: needle,
        });
    }
    if clauses.is_empty() {
        return Err(StoreError::InvalidFilter("empty or filter".into()));
    }
    Ok(clauses)
}

/// Rows matching at least one clause, deduplicated, in their original order.
pub fn apply_or(rows: Vec<Record>, clauses: &[OrClause]) -> Vec<Record> {
    rows.into_iter()
        .filter(|row| clauses.iter().any(|c| c.matches(row)))
        .collect()
}

/// Rows whose `column` equals one of `values`.
pub fn apply_in(rows: Vec<Record>, column: &str, values: &[Value]) -> Vec<Record> {
    rows.into_iter()
        .filter(|row| {
            row.get(column)
                .is_some_and(|v| values.iter().any(|want| values_equal(v, want)))
        })
        .collect()
}

/// Ordering used by `order()`: missing/null first, then booleans, numbers,
/// strings, and anything else by its JSON text.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => match rank(a).cmp(&rank(b)) {
            Ordering::Equal if rank(a) == 4 => {
                let (x, y) = (a.map(Value::to_string), b.map(Value::to_string));
                x.cmp(&y)
            }
            other => other,
        },
    }
}

/// Stable sort of `rows` by `column`.
pub fn sort_rows(rows: &mut [Record], column: &str, ascending: bool) {
    rows.sort_by(|a, b| {
        let ord = compare_values(a.get(column), b.get(column));
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> Record {
        Record::try_from(v).unwrap()
    }

    #[test]
    fn condition_requires_column_presence() {
        let r = row(json!({"a": null}));
        assert!(Condition::eq("a", Value::Null).matches(&r));
        assert!(!Condition::eq("b", Value::Null).matches(&r));
    }

    #[test]
    fn numbers_compare_by_value() {
        assert!(values_equal(&json!(5), &json!(5.0)));
        assert!(!values_equal(&json!(5), &json!("5")));
    }

    #[test]
    fn or_filter_parses_parenthesized_and_dotted_values() {
        let clauses = parse_or_filter("(email.eq.a@b.com,name.ilike.%FOO%)").unwrap();
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].value, "a@b.com");
        assert_eq!(clauses[1].op, OrOp::ILike);
        assert_eq!(clauses[1].value, "foo");
    }

    #[test]
    fn or_filter_rejects_malformed_clauses() {
        assert!(parse_or_filter("name").is_err());
        assert!(parse_or_filter("name.gt.3").is_err());
        assert!(parse_or_filter("").is_err());
    }

    #[test]
    fn or_union_keeps_table_order_without_duplicates() {
        let rows = vec![
            row(json!({"id": "1", "name": "Foo", "description": "foo too"})),
            row(json!({"id": "2", "name": "bar", "description": "nothing"})),
            row(json!({"id": "3", "name": "baz", "description": "has FOO"})),
        ];
        let clauses = parse_or_filter("name.ilike.%foo%,description.ilike.%foo%").unwrap();
        let out = apply_or(rows, &clauses);
        let ids: Vec<_> = out.iter().filter_map(|r| r.id()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn like_is_case_sensitive() {
        let r = row(json!({"name": "Laptop"}));
        let like = parse_or_filter("name.like.lap").unwrap();
        assert!(!like[0].matches(&r));
        let ilike = parse_or_filter("name.ilike.lap").unwrap();
        assert!(ilike[0].matches(&r));
    }

    #[test]
    fn in_filter_matches_membership() {
        let rows = vec![
            row(json!({"id": "a", "q": 1})),
            row(json!({"id": "b", "q": 2})),
            row(json!({"id": "c"})),
        ];
        let out = apply_in(rows, "q", &[json!(2), json!(3)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id(), Some("b"));
    }

    #[test]
    fn sort_is_stable_and_puts_nulls_first() {
        let mut rows = vec![
            row(json!({"id": "a", "n": 2})),
            row(json!({"id": "b"})),
            row(json!({"id": "c", "n": 1})),
            row(json!({"id": "d", "n": 2})),
        ];
        sort_rows(&mut rows, "n", true);
        let ids: Vec<_> = rows.iter().filter_map(|r| r.id()).collect();
        assert_eq!(ids, vec!["b", "c", "a", "d"]);

        sort_rows(&mut rows, "n", false);
        let ids: Vec<_> = rows.iter().filter_map(|r| r.id()).collect();
        assert_eq!(ids, vec!["a", "d", "c", "b"]);
    }
}
