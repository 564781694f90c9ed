//! JSON helpers shared by the DataArts resources.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::error::ProviderError;

/// Evaluate a path expression against `value`.
///
/// Supported syntax:
///
/// - `data.value.records`: object keys separated by dots
/// - `[0]`, `records[0]`, `tables[0].table_id`: array indexes
/// - `errors|[0].error_code`: each `|` stage is applied to the previous result
///
/// Returns `None` when any step is missing. A JSON `null` at the end of the
/// path is returned as `None` too.
pub fn path_search<'a>(expr: &str, value: &'a Value) -> Option<&'a Value> {
    let mut current = value;
    for stage in expr.split('|') {
        current = eval_stage(stage.trim(), current)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// [`path_search`] returning a string; numbers are rendered.
pub fn path_search_string(expr: &str, value: &Value) -> Option<String> {
    match path_search(expr, value)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// [`path_search`] returning an array, or an empty slice.
pub fn path_search_array<'a>(expr: &str, value: &'a Value) -> &'a [Value] {
    path_search(expr, value)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn eval_stage<'a>(stage: &str, value: &'a Value) -> Option<&'a Value> {
    let mut current = value;
    if stage.is_empty() || stage == "@" {
        return Some(current);
    }
    for segment in stage.split('.') {
        let (key, indexes) = match segment.find('[') {
            Some(pos) => (&segment[..pos], &segment[pos..]),
            None => (segment, ""),
        };
        if !key.is_empty() {
            current = current.get(key)?;
        }
        let mut rest = indexes;
        while let Some(open) = rest.strip_prefix('[') {
            let close = open.find(']')?;
            let index: usize = open[..close].trim().parse().ok()?;
            current = current.get(index)?;
            rest = &open[close + 1..];
        }
    }
    Some(current)
}

/// Drop `null` members from objects and arrays, recursively.
pub fn remove_nil(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, remove_nil(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|v| !v.is_null())
                .map(remove_nil)
                .collect(),
        ),
        other => other,
    }
}

/// Whether `value` is the zero value of its type.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// `null` for a zero value (`""`, `0`, `false`, `[]`, `{}`), the value otherwise.
///
/// Request bodies are passed through [`remove_nil`] afterwards, so unset
/// optional fields are left out of the payload.
pub fn value_ignore_empty(value: Option<&Value>) -> Value {
    match value {
        Some(v) if !is_empty_value(v) => v.clone(),
        _ => Value::Null,
    }
}

/// Render epoch milliseconds as RFC 3339 in UTC, e.g. `2024-01-02T03:04:05Z`.
///
/// Out-of-range input yields an empty string.
pub fn format_timestamp_rfc3339(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

/// Like [`format_timestamp_rfc3339`] for a JSON number or numeric string.
/// Anything else becomes `null`.
pub fn timestamp_value(value: Option<&Value>) -> Value {
    let millis = match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.parse::<i64>().ok(),
        _ => None,
    };
    match millis {
        Some(ms) => Value::String(format_timestamp_rfc3339(ms)),
        None => Value::Null,
    }
}

/// Re-render a time string such as `2024-01-02T11:04:05.000+0800` as RFC 3339
/// in UTC. Empty input yields `null`; strings that do not parse are kept.
pub fn normalize_time(value: Option<&Value>) -> Value {
    let Some(raw) = value.and_then(Value::as_str).filter(|s| !s.is_empty()) else {
        return Value::Null;
    };
    let parsed = DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"));
    match parsed {
        Ok(t) => Value::String(t.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Secs, true)),
        Err(_) => Value::String(raw.to_string()),
    }
}

/// Split an import ID on `/`, requiring exactly `parts` non-empty pieces.
///
/// `format` describes the expected shape in the error message, e.g.
/// `<workspace_id>/<id>`.
pub fn parse_import_id<'a>(id: &'a str, parts: usize, format: &str) -> Result<Vec<&'a str>, ProviderError> {
    let pieces: Vec<&str> = id.splitn(parts, '/').collect();
    if pieces.len() != parts || pieces.iter().any(|p| p.is_empty()) || pieces[parts - 1].contains('/') {
        return Err(ProviderError::InvalidRequest(format!(
            "invalid format of import ID, want '{format}', but got '{id}'"
        )));
    }
    Ok(pieces)
}

/// Convert a 400 response carrying one of `codes` at `code_path` into
/// [`ProviderError::NotFound`].
///
/// DataArts answers requests for deleted objects with a 400 and a vendor
/// error code instead of a 404.
pub fn convert_expected_400_into_404(err: ProviderError, code_path: &str, codes: &[&str]) -> ProviderError {
    let ProviderError::Http { status: 400, body } = &err else {
        return err;
    };
    let parsed: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return err,
    };
    match path_search_string(code_path, &parsed) {
        Some(code) if codes.contains(&code.as_str()) => {
            tracing::debug!(code = %code, "treating error code as not found");
            ProviderError::NotFound(body.clone())
        },
        _ => err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_search_keys_and_indexes() {
        let body = json!({
            "data": {"value": {"records": [{"id": "a"}, {"id": "b"}], "total": 2}},
            "tables": [{"table_id": "t-1"}]
        });
        assert_eq!(path_search("data.value.total", &body), Some(&json!(2)));
        assert_eq!(path_search("data.value.records[1].id", &body), Some(&json!("b")));
        assert_eq!(path_search_string("tables[0].table_id", &body).as_deref(), Some("t-1"));
        assert_eq!(path_search("data.value.records[5]", &body), None);
        assert_eq!(path_search("data.missing", &body), None);
    }

    #[test]
    fn test_path_search_pipe() {
        let body = json!({"errors": [{"error_code": "DLG.6022", "error_msg": "gone"}]});
        assert_eq!(
            path_search_string("errors|[0].error_code", &body).as_deref(),
            Some("DLG.6022")
        );
        assert_eq!(path_search("errors|[1].error_code", &body), None);
    }

    #[test]
    fn test_path_search_null_is_none() {
        let body = json!({"datatable": null});
        assert_eq!(path_search("datatable", &body), None);
        assert!(path_search_array("records", &body).is_empty());
    }

    #[test]
    fn test_remove_nil() {
        let body = json!({"a": null, "b": {"c": null, "d": 1}, "e": [null, {"f": null}]});
        assert_eq!(remove_nil(body), json!({"b": {"d": 1}, "e": [{}]}));
    }

    #[test]
    fn test_value_ignore_empty() {
        for empty in [json!(""), json!(0), json!(false), json!([]), json!({}), Value::Null] {
            assert_eq!(value_ignore_empty(Some(&empty)), Value::Null);
        }
        assert_eq!(value_ignore_empty(None), Value::Null);
        assert_eq!(value_ignore_empty(Some(&json!("x"))), json!("x"));
        assert_eq!(value_ignore_empty(Some(&json!(3))), json!(3));
        assert_eq!(value_ignore_empty(Some(&json!(true))), json!(true));
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp_rfc3339(0), "1970-01-01T00:00:00Z");
        assert_eq!(format_timestamp_rfc3339(1_700_000_000_123), "2023-11-14T22:13:20Z");
        assert_eq!(timestamp_value(Some(&json!("1700000000000"))), json!("2023-11-14T22:13:20Z"));
        assert_eq!(timestamp_value(Some(&json!(null))), Value::Null);
    }

    #[test]
    fn test_normalize_time() {
        assert_eq!(normalize_time(Some(&json!("2024-01-02T11:04:05.000+0800"))), json!("2024-01-02T03:04:05Z"));
        assert_eq!(normalize_time(Some(&json!("2024-01-02T03:04:05Z"))), json!("2024-01-02T03:04:05Z"));
        assert_eq!(normalize_time(Some(&json!("yesterday"))), json!("yesterday"));
        assert_eq!(normalize_time(Some(&json!(""))), Value::Null);
    }

    #[test]
    fn test_parse_import_id() {
        assert_eq!(parse_import_id("ws/123", 2, "<workspace_id>/<id>").unwrap(), vec!["ws", "123"]);
        assert_eq!(parse_import_id("ws", 1, "<workspace_id>").unwrap(), vec!["ws"]);

        let err = parse_import_id("ws", 2, "<workspace_id>/<id>").unwrap_err();
        assert!(err.to_string().contains("<workspace_id>/<id>"));
        assert!(parse_import_id("ws/", 2, "<workspace_id>/<id>").is_err());
        assert!(parse_import_id("a/b/c", 2, "<workspace_id>/<id>").is_err());
    }

    #[test]
    fn test_convert_expected_400() {
        let body = json!({"errors": [{"error_code": "DLG.6022"}]}).to_string();
        let err = convert_expected_400_into_404(
            ProviderError::Http { status: 400, body },
            "errors|[0].error_code",
            &["DLG.6022"],
        );
        assert!(err.is_not_found());

        let body = json!({"error_code": "DLM.4000"}).to_string();
        let err = convert_expected_400_into_404(
            ProviderError::Http { status: 400, body },
            "error_code",
            &["DLM.4001", "DLM.4018"],
        );
        assert!(matches!(err, ProviderError::Http { status: 400, .. }));

        let err = convert_expected_400_into_404(
            ProviderError::Http {
                status: 500,
                body: json!({"error_code": "DLM.4001"}).to_string(),
            },
            "error_code",
            &["DLM.4001"],
        );
        assert!(matches!(err, ProviderError::Http { status: 500, .. }));

        let err = convert_expected_400_into_404(
            ProviderError::Http {
                status: 400,
                body: "not json".to_string(),
            },
            "error_code",
            &["DLM.4001"],
        );
        assert!(!err.is_not_found());
    }
}
