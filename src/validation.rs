//! Config validation against a [`Schema`].
//!
//! Used by `ValidateProviderConfig`, `ValidateResourceConfig` and
//! `ValidateDataSourceConfig` before anything is sent to DataArts.
//!
//! ```
//! use hemmer_provider_dataarts::schema::{Attribute, Schema};
//! use hemmer_provider_dataarts::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute("retry_times", Attribute::optional_int64());
//!
//! assert!(validate(&schema, &json!({"name": "job_a", "retry_times": 3})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "job_a", "retry_times": "3"}));
//! assert_eq!(diagnostics[0].attribute.as_deref(), Some("retry_times"));
//! ```

use crate::schema::{Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, NestedBlock, Schema};
use serde_json::Value;

/// Validate a JSON config against a schema.
///
/// - required attributes must be present and non-null
/// - computed-only attributes and computed blocks are skipped
/// - types are checked recursively
/// - nested blocks honour their min/max item counts
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// [`validate`] as a `Result`.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        other => {
            let mut diag =
                Diagnostic::error("Expected object").with_detail(format!("Got {}", type_name(other)));
            if !path.is_empty() {
                diag = diag.with_attribute(path);
            }
            diagnostics.push(diag);
            return;
        },
    };

    for (name, attr) in &block.attributes {
        validate_attribute(attr, obj.get(name), &join_path(path, name), diagnostics);
    }

    for (name, nested) in &block.blocks {
        if nested.computed {
            continue;
        }
        validate_nested_block(nested, obj.get(name), &join_path(path, name), diagnostics);
    }
}

fn validate_attribute(attr: &Attribute, value: Option<&Value>, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    if attr.flags.is_computed_only() {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required && attr.default.is_none() {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => validate_type(&attr.attr_type, v, path, diagnostics),
    }
}

fn validate_type(attr_type: &AttributeType, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let ok = match attr_type {
        AttributeType::String => value.is_string(),
        AttributeType::Int64 => is_int64(value),
        AttributeType::Bool => value.is_boolean(),
        AttributeType::List(element) | AttributeType::Set(element) => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    validate_type(element, item, &format!("{}.{}", path, i), diagnostics);
                }
                true
            },
            None => false,
        },
        AttributeType::Map(element) => match value.as_object() {
            Some(obj) => {
                for (key, item) in obj {
                    validate_type(element, item, &format!("{}.{}", path, key), diagnostics);
                }
                true
            },
            None => false,
        },
    };

    if !ok {
        diagnostics.push(
            Diagnostic::error(format!("Invalid type for attribute '{}'", path))
                .with_detail(format!("Expected {}, got {}", expected_name(attr_type), type_name(value)))
                .with_attribute(path),
        );
    }
}

fn validate_nested_block(nested: &NestedBlock, value: Option<&Value>, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let value = match value {
        None | Some(Value::Null) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s)",
                        path, nested.min_items
                    ))
                    .with_attribute(path),
                );
            }
            return;
        },
        Some(v) => v,
    };

    match (nested.nesting_mode, value) {
        (BlockNestingMode::Single, v) => validate_block(&nested.block, v, path, diagnostics),
        (BlockNestingMode::List | BlockNestingMode::Set, Value::Array(items)) => {
            check_item_count(nested, items.len(), path, diagnostics);
            for (i, item) in items.iter().enumerate() {
                validate_block(&nested.block, item, &format!("{}.{}", path, i), diagnostics);
            }
        },
        (BlockNestingMode::Map, Value::Object(items)) => {
            check_item_count(nested, items.len(), path, diagnostics);
            for (key, item) in items {
                validate_block(&nested.block, item, &format!("{}.{}", path, key), diagnostics);
            }
        },
        (mode, v) => {
            let expected = if mode == BlockNestingMode::Map { "map" } else { "list" };
            diagnostics.push(
                Diagnostic::error(format!("Expected {} for block '{}'", expected, path))
                    .with_detail(format!("Got {}", type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

fn check_item_count(nested: &NestedBlock, len: usize, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let len = len as u32;
    if len < nested.min_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' requires at least {} item(s), got {}",
                path, nested.min_items, len
            ))
            .with_attribute(path),
        );
    }
    if nested.max_items > 0 && len > nested.max_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' allows at most {} item(s), got {}",
                path, nested.max_items, len
            ))
            .with_attribute(path),
        );
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expected_name(attr_type: &AttributeType) -> &'static str {
    match attr_type {
        AttributeType::String => "string",
        AttributeType::Int64 => "int64",
        AttributeType::Bool => "bool",
        AttributeType::List(_) => "list",
        AttributeType::Set(_) => "set",
        AttributeType::Map(_) => "map",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => true,
        Value::Number(n) => n
            .as_f64()
            .map(|f| f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64)
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeFlags, Block, NestedBlock, Schema};
    use serde_json::json;

    fn job_schema() -> Schema {
        Schema::v0()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("process_type", Attribute::required_string())
            .with_attribute("id", Attribute::computed_string())
            .with_block(
                "nodes",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("name", Attribute::required_string())
                        .with_attribute("retry_times", Attribute::optional_int64())
                        .with_block(
                            "location",
                            NestedBlock::single(
                                Block::new()
                                    .with_attribute("x", Attribute::required_int64())
                                    .with_attribute("y", Attribute::required_int64()),
                            )
                            .required(),
                        ),
                )
                .with_min_items(1),
            )
            .with_block(
                "schedule",
                NestedBlock::single(Block::new().with_attribute("type", Attribute::required_string()))
                    .required(),
            )
    }

    fn valid_job() -> Value {
        json!({
            "name": "job_a",
            "process_type": "BATCH",
            "nodes": [{"name": "n1", "location": {"x": 1, "y": 2}}],
            "schedule": {"type": "EXECUTE_ONCE"}
        })
    }

    #[test]
    fn test_valid_job_config() {
        assert!(validate(&job_schema(), &valid_job()).is_empty());
    }

    #[test]
    fn test_missing_required_attribute() {
        let mut config = valid_job();
        config["process_type"] = Value::Null;
        let diagnostics = validate(&job_schema(), &config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("process_type"));
    }

    #[test]
    fn test_default_satisfies_required() {
        let schema = Schema::v0().with_attribute(
            "dlm_type",
            Attribute::required_string().with_default(json!("SHARED")),
        );
        assert!(validate(&schema, &json!({})).is_empty());
    }

    #[test]
    fn test_computed_only_skipped() {
        let schema = Schema::v0().with_attribute("created_at", Attribute::computed_string());
        assert!(validate(&schema, &json!({"created_at": 123})).is_empty());
    }

    #[test]
    fn test_computed_block_skipped() {
        let schema = Schema::v0().with_block(
            "hosts",
            NestedBlock::list(Block::new().with_attribute("instance_id", Attribute::required_string()))
                .with_min_items(1)
                .computed(),
        );
        assert!(validate(&schema, &json!({})).is_empty());
    }

    #[test]
    fn test_int64_accepts_whole_floats() {
        let schema = Schema::v0().with_attribute("priority", Attribute::required_int64());
        assert!(validate(&schema, &json!({"priority": 2})).is_empty());
        assert!(validate(&schema, &json!({"priority": 2.0})).is_empty());
        assert_eq!(validate(&schema, &json!({"priority": 2.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"priority": "2"})).len(), 1);
    }

    #[test]
    fn test_nested_paths() {
        let mut config = valid_job();
        config["nodes"][0]["location"]["x"] = json!("left");
        let diagnostics = validate(&job_schema(), &config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("nodes.0.location.x"));
    }

    #[test]
    fn test_block_counts() {
        let mut config = valid_job();
        config["nodes"] = json!([]);
        let diagnostics = validate(&job_schema(), &config);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at least 1"));

        let schema = Schema::v0().with_block(
            "values",
            NestedBlock::set(Block::new().with_attribute("fd_name", Attribute::required_string()))
                .with_max_items(1),
        );
        let diagnostics = validate(&schema, &json!({"values": [{"fd_name": "a"}, {"fd_name": "b"}]}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at most 1"));
    }

    #[test]
    fn test_missing_required_single_block() {
        let mut config = valid_job();
        if let Some(obj) = config.as_object_mut() {
            obj.remove("schedule");
        }
        let diagnostics = validate(&job_schema(), &config);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("schedule"));
    }

    #[test]
    fn test_list_block_rejects_object() {
        let mut config = valid_job();
        config["nodes"] = json!({"name": "n1"});
        let diagnostics = validate(&job_schema(), &config);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected list"));
    }

    #[test]
    fn test_map_and_list_attributes() {
        let schema = Schema::v0()
            .with_attribute("custom_fields", Attribute::string_map(AttributeFlags::optional()))
            .with_attribute("pre_node_name", Attribute::string_list(AttributeFlags::optional()));

        assert!(validate(
            &schema,
            &json!({"custom_fields": {"team": "data"}, "pre_node_name": ["a"]})
        )
        .is_empty());

        let diagnostics = validate(&schema, &json!({"custom_fields": {"team": 1}, "pre_node_name": [1]}));
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn test_helpers() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());
        assert!(is_valid(&schema, &json!({"name": "a"})));
        assert!(!is_valid(&schema, &json!({})));
        assert!(validate_result(&schema, &json!({"name": "a"})).is_ok());
        assert_eq!(validate_result(&schema, &json!({})).map_err(|d| d.len()), Err(1));
    }

    #[test]
    fn test_root_not_object() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());
        let diagnostics = validate(&schema, &json!("job_a"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
        assert!(diagnostics[0].attribute.is_none());
    }
}
