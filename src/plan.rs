//! Schema-driven planning.
//!
//! The planned state is built from the configuration. Computed values are
//! carried over from the prior state. When an optional+computed value is
//! left out of the configuration, the prior value is kept.

use serde_json::{Map, Value};

use crate::schema::{Attribute, AttributeType, Block, BlockNestingMode, NestedBlock, Schema};
use crate::types::{AttributeChange, PlanResult};

/// Plan a resource from its schema.
///
/// `prior` is `None` when the resource is being created. A null `proposed`
/// state plans a destroy.
pub fn plan_resource(schema: &Schema, prior: Option<&Value>, proposed: &Value, config: &Value) -> PlanResult {
    if proposed.is_null() {
        return PlanResult::destroy(prior.cloned().unwrap_or(Value::Null));
    }

    let config = if config.is_object() { config } else { proposed };
    let empty = Map::new();
    let prior_obj = prior.and_then(Value::as_object);
    let config_obj = config.as_object().unwrap_or(&empty);
    let creating = prior_obj.is_none();
    let prior_obj = prior_obj.unwrap_or(&empty);

    let mut planned = Map::new();
    let mut changes = Vec::new();
    let mut requires_replace = false;

    for (name, attr) in &schema.block.attributes {
        let before = non_null(prior_obj.get(name));
        let configured = non_null(config_obj.get(name));

        let after = if attr.flags.is_computed_only() {
            before.cloned()
        } else if let Some(v) = configured {
            Some(v.clone())
        } else if let Some(default) = &attr.default {
            Some(default.clone())
        } else if attr.flags.computed {
            before.cloned()
        } else {
            None
        };

        if !attr.flags.is_computed_only() {
            if let Some(change) = diff_attribute(name, attr, before, after.as_ref(), creating) {
                requires_replace |= attr.force_new && !creating;
                changes.push(change);
            }
        }
        planned.insert(name.clone(), after.unwrap_or(Value::Null));
    }

    for (name, nested) in &schema.block.blocks {
        let before = non_null(prior_obj.get(name));
        let configured = non_null(config_obj.get(name));

        if nested.computed || (nested.optional_computed && configured.is_none()) {
            planned.insert(name.clone(), before.cloned().unwrap_or(Value::Null));
            continue;
        }

        let changed = !nested_matches(nested, configured, before);
        if changed {
            if !creating && (nested.force_new || nested.block.has_force_new()) {
                requires_replace = true;
            }
            changes.push(AttributeChange::new(name.clone(), before.cloned(), configured.cloned()));
            planned.insert(name.clone(), configured.cloned().unwrap_or(Value::Null));
        } else {
            // Keep the prior value so computed members of the block survive.
            planned.insert(name.clone(), before.or(configured).cloned().unwrap_or(Value::Null));
        }
    }

    PlanResult::with_changes(Value::Object(planned), changes, requires_replace)
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// Inside blocks an empty list is the same as an unset one.
fn present(value: Option<&Value>) -> Option<&Value> {
    non_null(value).filter(|v| !v.as_array().is_some_and(Vec::is_empty))
}

fn diff_attribute(
    name: &str,
    attr: &Attribute,
    before: Option<&Value>,
    after: Option<&Value>,
    creating: bool,
) -> Option<AttributeChange> {
    match (before, after) {
        (_, Some(a)) if creating => Some(AttributeChange::added(name, a.clone())),
        (None, Some(a)) => Some(AttributeChange::added(name, a.clone())),
        (Some(b), None) => Some(AttributeChange::removed(name, b.clone())),
        (Some(b), Some(a)) if !values_equal(&attr.attr_type, b, a) => {
            Some(AttributeChange::modified(name, b.clone(), a.clone()))
        },
        _ => None,
    }
}

/// Compare two values of the same attribute type. Sets ignore order and
/// numbers compare by value.
fn values_equal(attr_type: &AttributeType, a: &Value, b: &Value) -> bool {
    match (attr_type, a, b) {
        (_, Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (AttributeType::Set(element), Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && match_unordered(xs, ys, |x, y| values_equal(element, x, y))
        },
        (AttributeType::List(element), Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(element, x, y))
        },
        (AttributeType::Map(element), Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(element, x, y)))
        },
        _ => a == b,
    }
}

/// Whether every item of `wanted` can be paired with a distinct item of `have`.
fn match_unordered(wanted: &[Value], have: &[Value], eq: impl Fn(&Value, &Value) -> bool) -> bool {
    let mut used = vec![false; have.len()];
    wanted.iter().all(|w| {
        match have.iter().enumerate().position(|(i, h)| !used[i] && eq(w, h)) {
            Some(i) => {
                used[i] = true;
                true
            },
            None => false,
        }
    })
}

/// Whether the configured block agrees with the prior one.
///
/// Computed members of the prior block are ignored. Optional+computed members
/// left out of the configuration match anything.
fn nested_matches(nested: &NestedBlock, configured: Option<&Value>, prior: Option<&Value>) -> bool {
    let empty_items = |v: Option<&Value>| match v {
        None => true,
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        _ => false,
    };
    if empty_items(configured) && empty_items(prior) {
        return true;
    }

    match (nested.nesting_mode, configured, prior) {
        (BlockNestingMode::Single, Some(c), Some(p)) => block_matches(&nested.block, c, p),
        (BlockNestingMode::List, Some(Value::Array(cs)), Some(Value::Array(ps))) => {
            cs.len() == ps.len() && cs.iter().zip(ps).all(|(c, p)| block_matches(&nested.block, c, p))
        },
        (BlockNestingMode::Set, Some(Value::Array(cs)), Some(Value::Array(ps))) => {
            cs.len() == ps.len() && match_unordered(cs, ps, |c, p| block_matches(&nested.block, c, p))
        },
        (BlockNestingMode::Map, Some(Value::Object(cs)), Some(Value::Object(ps))) => {
            cs.len() == ps.len()
                && cs
                    .iter()
                    .all(|(k, c)| ps.get(k).is_some_and(|p| block_matches(&nested.block, c, p)))
        },
        _ => false,
    }
}

fn block_matches(block: &Block, configured: &Value, prior: &Value) -> bool {
    let attrs_match = block.attributes.iter().all(|(name, attr)| {
        if attr.flags.is_computed_only() {
            return true;
        }
        let c = present(configured.get(name));
        let p = present(prior.get(name));
        match (c, p) {
            (None, _) if attr.flags.computed => true,
            (None, None) => true,
            (Some(c), Some(p)) => values_equal(&attr.attr_type, c, p),
            (None, Some(p)) => attr.default.as_ref().is_some_and(|d| values_equal(&attr.attr_type, d, p)),
            (Some(c), None) => attr.default.as_ref().is_some_and(|d| values_equal(&attr.attr_type, d, c)),
        }
    });
    attrs_match
        && block.blocks.iter().all(|(name, nested)| {
            let c = non_null(configured.get(name));
            nested.computed
                || (nested.optional_computed && c.is_none())
                || nested_matches(nested, c, non_null(prior.get(name)))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeFlags, Block, NestedBlock};
    use serde_json::json;

    fn schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("workspace_id", Attribute::required_string().with_force_new())
            .with_attribute("region", Attribute::optional_computed_string().with_force_new())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("dlm_type", Attribute::optional_string().with_default(json!("SHARED")))
            .with_attribute("tags", Attribute::string_set(AttributeFlags::optional()))
            .with_attribute("status", Attribute::computed_string())
            .with_block(
                "values",
                NestedBlock::set(
                    Block::new()
                        .with_attribute("fd_name", Attribute::required_string())
                        .with_attribute("fd_value", Attribute::optional_string())
                        .with_attribute("id", Attribute::computed_string()),
                ),
            )
    }

    fn prior() -> Value {
        json!({
            "id": "1",
            "workspace_id": "ws",
            "region": "cn-north-4",
            "name": "std",
            "description": null,
            "dlm_type": "SHARED",
            "tags": ["a", "b"],
            "status": "DRAFT",
            "values": [
                {"fd_name": "nameCh", "fd_value": "x", "id": "v1"},
                {"fd_name": "nameEn", "fd_value": "y", "id": "v2"}
            ]
        })
    }

    fn config() -> Value {
        json!({
            "workspace_id": "ws",
            "name": "std",
            "tags": ["b", "a"],
            "values": [
                {"fd_name": "nameEn", "fd_value": "y"},
                {"fd_name": "nameCh", "fd_value": "x"}
            ]
        })
    }

    #[test]
    fn test_create_marks_configured_attributes() {
        let result = plan_resource(&schema(), None, &config(), &config());
        assert!(!result.requires_replace);
        let paths: Vec<_> = result.changes.iter().map(|c| c.path.as_str()).collect();
        assert!(paths.contains(&"name"));
        assert!(paths.contains(&"workspace_id"));
        assert!(paths.contains(&"dlm_type"));
        assert!(paths.contains(&"values"));
        assert!(!paths.contains(&"id"));
        assert_eq!(result.planned_state["dlm_type"], "SHARED");
        assert!(result.planned_state["id"].is_null());
    }

    #[test]
    fn test_no_change_keeps_computed_values() {
        let prior = prior();
        let result = plan_resource(&schema(), Some(&prior), &config(), &config());
        assert!(result.changes.is_empty(), "unexpected changes: {:?}", result.changes);
        assert_eq!(result.planned_state["id"], "1");
        assert_eq!(result.planned_state["region"], "cn-north-4");
        assert_eq!(result.planned_state["status"], "DRAFT");
        assert_eq!(result.planned_state["values"][0]["id"], "v1");
    }

    #[test]
    fn test_update_detects_changes() {
        let prior = prior();
        let mut config = config();
        config["description"] = json!("new");
        config["values"][0]["fd_value"] = json!("z");
        let result = plan_resource(&schema(), Some(&prior), &config, &config);
        assert!(!result.requires_replace);
        let paths: Vec<_> = result.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths.len(), 2);
        assert!(paths.contains(&"description"));
        assert!(paths.contains(&"values"));
    }

    #[test]
    fn test_force_new_requires_replace() {
        let prior = prior();
        let mut config = config();
        config["workspace_id"] = json!("ws-2");
        let result = plan_resource(&schema(), Some(&prior), &config, &config);
        assert!(result.requires_replace);

        let mut config = self::config();
        config["region"] = json!("cn-south-1");
        let result = plan_resource(&schema(), Some(&prior), &config, &config);
        assert!(result.requires_replace);
    }

    #[test]
    fn test_nested_force_new_requires_replace() {
        let schema = Schema::v0().with_block(
            "datasource_config",
            NestedBlock::single(
                Block::new()
                    .with_attribute("type", Attribute::required_string().with_force_new())
                    .with_attribute("sql", Attribute::optional_string()),
            ),
        );
        let prior = json!({"datasource_config": {"type": "DLI", "sql": "a"}});
        let config = json!({"datasource_config": {"type": "DWS", "sql": "a"}});
        assert!(plan_resource(&schema, Some(&prior), &config, &config).requires_replace);
    }

    #[test]
    fn test_removed_optional_attribute() {
        let mut prior = prior();
        prior["description"] = json!("old");
        let result = plan_resource(&schema(), Some(&prior), &config(), &config());
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].path, "description");
        assert!(result.changes[0].after.is_none());
    }

    #[test]
    fn test_optional_computed_block_kept_when_unset() {
        let schema = Schema::v0().with_block(
            "optional_fields",
            NestedBlock::set(Block::new().with_attribute("fd_name", Attribute::required_string())).optional_computed(),
        );
        let prior = json!({"optional_fields": [{"fd_name": "dataLength"}]});
        let result = plan_resource(&schema, Some(&prior), &json!({}), &json!({}));
        assert!(result.changes.is_empty());
        assert_eq!(result.planned_state["optional_fields"][0]["fd_name"], "dataLength");

        let config = json!({"optional_fields": []});
        let result = plan_resource(&schema, Some(&prior), &config, &config);
        assert_eq!(result.changes.len(), 1);
    }

    #[test]
    fn test_destroy() {
        let prior = prior();
        let result = plan_resource(&schema(), Some(&prior), &Value::Null, &Value::Null);
        assert!(result.planned_state.is_null());
        assert_eq!(result.changes.len(), 1);
    }

    #[test]
    fn test_numbers_compare_by_value() {
        assert!(values_equal(&AttributeType::Int64, &json!(1), &json!(1.0)));
        assert!(!values_equal(
            &AttributeType::list(AttributeType::String),
            &json!(["a", "b"]),
            &json!(["b", "a"])
        ));
    }
}
