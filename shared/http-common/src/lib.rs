//! Shared HTTP utilities for the KonBase mock backend.
//!
//! Provides the JSON error body used by the dev server and parsers for the
//! PostgREST-shaped query strings its table routes accept.

use serde_json::Value;

// ============================================================================
// JSON Response Helpers (framework-agnostic)
// ============================================================================

/// Create a structured error JSON with a default message based on the code.
///
/// Returns: `{"error": {"code": "<code>", "message": "<default message>"}}`
pub fn json_err(code: &str) -> Value {
    let message = match code {
        "not_found" => "Resource not found",
        "bad_request" => "Bad request",
        "validation" => "Invalid record",
        "unauthorized" => "Authentication required",
        "forbidden" => "Access denied",
        "conflict" => "Request conflicts with existing data",
        "not_implemented" => "Not implemented in mock mode",
        "error" | "internal" => "Internal server error",
        _ => code,
    };
    serde_json::json!({"error": {"code": code, "message": message}})
}

/// Create a structured error JSON with a custom message.
///
/// Returns: `{"error": {"code": "<code>", "message": "<message>"}}`
pub fn json_error_with_message(code: &str, message: &str) -> Value {
    serde_json::json!({"error": {"code": code, "message": message}})
}

/// Error code for an HTTP status, as used in the error body.
pub fn code_for_status(status: u16) -> &'static str {
    match status {
        400 => "bad_request",
        401 => "unauthorized",
        403 => "forbidden",
        404 => "not_found",
        409 => "conflict",
        501 => "not_implemented",
        _ => "internal",
    }
}

// ============================================================================
// Query Parsing
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryParseError {
    #[error("invalid limit '{0}'")]
    InvalidLimit(String),
    #[error("invalid order '{0}', expected <column>.asc or <column>.desc")]
    InvalidOrder(String),
    #[error("unsupported filter '{0}', expected eq.<value> or in.(<values>)")]
    UnsupportedFilter(String),
    #[error("only one in.() filter is supported")]
    MultipleIn,
}

/// Query string of a table route, split into builder calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestQuery {
    pub select: Option<String>,
    /// `(column, ascending)`
    pub order: Option<(String, bool)>,
    pub limit: Option<usize>,
    pub or: Option<String>,
    /// Raw operands; typing them needs the table's column kinds.
    pub eq: Vec<(String, String)>,
    pub in_filter: Option<(String, Vec<String>)>,
    pub on_conflict: Option<String>,
}

/// Percent-decode one query component; `+` is a space.
pub fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(s) => s.into_owned(),
        Err(_) => spaced,
    }
}

/// Parse `select=`, `order=`, `limit=`, `or=`, `on_conflict=` and
/// `<column>=eq.<v>` / `<column>=in.(a,b)` pairs.
pub fn parse_rest_query(query: Option<&str>) -> Result<RestQuery, QueryParseError> {
    let mut out = RestQuery::default();
    let Some(q) = query else {
        return Ok(out);
    };
    for pair in q.split('&').filter(|p| !p.is_empty()) {
        let mut it = pair.splitn(2, '=');
        let key = decode_component(it.next().unwrap_or_default());
        let val = decode_component(it.next().unwrap_or_default());
        match key.as_str() {
            "select" => out.select = Some(val),
            "or" => out.or = Some(val),
            "on_conflict" => out.on_conflict = Some(val),
            "limit" => {
                let n = val
                    .parse::<usize>()
                    .map_err(|_| QueryParseError::InvalidLimit(val.clone()))?;
                out.limit = Some(n);
            }
            "order" => {
                let (column, dir) = val.rsplit_once('.').unwrap_or((val.as_str(), "asc"));
                let ascending = match dir {
                    "asc" => true,
                    "desc" => false,
                    _ => return Err(QueryParseError::InvalidOrder(val.clone())),
                };
                if column.is_empty() {
                    return Err(QueryParseError::InvalidOrder(val.clone()));
                }
                out.order = Some((column.to_string(), ascending));
            }
            column => {
                if let Some(v) = val.strip_prefix("eq.") {
                    out.eq.push((column.to_string(), v.to_string()));
                } else if let Some(list) = val.strip_prefix("in.") {
                    if out.in_filter.is_some() {
                        return Err(QueryParseError::MultipleIn);
                    }
                    let inner = list
                        .strip_prefix('(')
                        .and_then(|s| s.strip_suffix(')'))
                        .unwrap_or(list);
                    let values = inner
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect();
                    out.in_filter = Some((column.to_string(), values));
                } else {
                    return Err(QueryParseError::UnsupportedFilter(pair.to_string()));
                }
            }
        }
    }
    Ok(out)
}

/// Parse a named query parameter from a query string.
///
/// Returns `Some(value)` if the parameter is found, `None` otherwise.
/// URL-decodes the value.
pub fn parse_query_param(query: Option<&str>, name: &str) -> Option<String> {
    let q = query?;
    q.split('&').find_map(|pair| {
        let (key, val) = pair.split_once('=')?;
        (key == name).then(|| decode_component(val))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_err() {
        let err = json_err("not_found");
        assert_eq!(err, json!({"error": {"code": "not_found", "message": "Resource not found"}}));

        // Unknown code falls back to code as message
        let err = json_err("custom_error");
        assert_eq!(err, json!({"error": {"code": "custom_error", "message": "custom_error"}}));
    }

    #[test]
    fn test_json_error_with_message() {
        let err = json_error_with_message("conflict", "Cannot delete an active convention.");
        assert_eq!(
            err,
            json!({"error": {"code": "conflict", "message": "Cannot delete an active convention."}})
        );
        assert_eq!(code_for_status(409), "conflict");
        assert_eq!(code_for_status(500), "internal");
    }

    #[test]
    fn test_parse_rest_query() {
        let q = parse_rest_query(Some(
            "select=id,name&location_id=eq.loc-1&quantity=eq.5&order=name.desc&limit=10",
        ))
        .unwrap();
        assert_eq!(q.select.as_deref(), Some("id,name"));
        assert_eq!(
            q.eq,
            vec![
                ("location_id".to_string(), "loc-1".to_string()),
                ("quantity".to_string(), "5".to_string()),
            ]
        );
        assert_eq!(q.order, Some(("name".to_string(), false)));
        assert_eq!(q.limit, Some(10));
    }

    #[test]
    fn test_parse_rest_query_or_and_in() {
        let q = parse_rest_query(Some(
            "or=(name.ilike.%25lap%25,description.ilike.%25lap%25)&id=in.(item-1,item-2)",
        ))
        .unwrap();
        assert_eq!(
            q.or.as_deref(),
            Some("(name.ilike.%lap%,description.ilike.%lap%)")
        );
        assert_eq!(
            q.in_filter,
            Some(("id".to_string(), vec!["item-1".to_string(), "item-2".to_string()]))
        );
        assert_eq!(parse_rest_query(None).unwrap(), RestQuery::default());
    }

    #[test]
    fn test_parse_rest_query_errors() {
        assert!(matches!(
            parse_rest_query(Some("name=like.x")),
            Err(QueryParseError::UnsupportedFilter(_))
        ));
        assert!(matches!(
            parse_rest_query(Some("order=name.sideways")),
            Err(QueryParseError::InvalidOrder(_))
        ));
        assert!(matches!(
            parse_rest_query(Some("limit=abc")),
            Err(QueryParseError::InvalidLimit(_))
        ));
        assert!(matches!(
            parse_rest_query(Some("a=in.(1)&b=in.(2)")),
            Err(QueryParseError::MultipleIn)
        ));
    }


    #[test]
    fn test_parse_query_param() {
        assert_eq!(parse_query_param(Some("email=admin%40konbase.cfd"), "email"), Some("admin@konbase.cfd".to_string()));
        assert_eq!(parse_query_param(Some("name=Main+Hall"), "name"), Some("Main Hall".to_string()));
        assert_eq!(parse_query_param(Some("foo=bar"), "missing"), None);
        assert_eq!(parse_query_param(None, "foo"), None);
    }
}
