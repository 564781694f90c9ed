//! Plan, import and metadata types exchanged with the engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A change to a single attribute during a plan.
///
/// `before` is `None` for attributes being set for the first time, `after`
/// is `None` for attributes being removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub path: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl AttributeChange {
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, None, Some(value))
    }

    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, Some(value), None)
    }

    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

fn decode_optional(bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        None
    } else {
        serde_json::from_slice(bytes).ok()
    }
}

fn encode_optional(value: Option<Value>) -> Vec<u8> {
    value
        .and_then(|v| serde_json::to_vec(&v).ok())
        .unwrap_or_default()
}

impl From<crate::generated::AttributeChange> for AttributeChange {
    fn from(proto: crate::generated::AttributeChange) -> Self {
        Self {
            path: proto.path,
            before: decode_optional(&proto.before),
            after: decode_optional(&proto.after),
        }
    }
}

impl From<AttributeChange> for crate::generated::AttributeChange {
    fn from(change: AttributeChange) -> Self {
        Self {
            path: change.path,
            before: encode_optional(change.before),
            after: encode_optional(change.after),
        }
    }
}

/// The result of planning a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// State the resource is expected to have once applied. `null` for a destroy.
    pub planned_state: Value,
    pub changes: Vec<AttributeChange>,
    /// A force-new attribute changed; the engine must destroy then create.
    pub requires_replace: bool,
}

impl PlanResult {
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    pub fn with_changes(planned_state: Value, changes: Vec<AttributeChange>, requires_replace: bool) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Plan the removal of `prior_state` as a whole.
    pub fn destroy(prior_state: Value) -> Self {
        Self {
            planned_state: Value::Null,
            changes: vec![AttributeChange::removed("", prior_state)],
            requires_replace: false,
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// A resource produced by `ImportResourceState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    pub resource_type: String,
    pub state: Value,
}

impl ImportedResource {
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Provider metadata returned by `GetMetadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    pub resources: Vec<String>,
    pub data_sources: Vec<String>,
    pub capabilities: ServerCapabilities,
}

/// Server capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// The provider answers `Plan` with a null proposed state.
    pub plan_destroy: bool,
}

/// Protocol version written in the handshake line.
pub const PROTOCOL_VERSION: u32 = 1;

/// First field of the handshake line.
pub const HANDSHAKE_PREFIX: &str = "HEMMER_PROVIDER";

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_change_constructors() {
        let added = AttributeChange::added("name", json!("job_a"));
        assert!(added.before.is_none());
        assert_eq!(added.after, Some(json!("job_a")));

        let removed = AttributeChange::removed("description", json!("old"));
        assert!(removed.after.is_none());

        let modified = AttributeChange::modified("retry_times", json!(1), json!(2));
        assert_eq!(modified.before, Some(json!(1)));
        assert_eq!(modified.after, Some(json!(2)));
    }

    #[test]
    fn test_attribute_change_proto_conversion() {
        let change = AttributeChange::added("directory", json!("/etl"));
        let proto: crate::generated::AttributeChange = change.clone().into();
        assert!(proto.before.is_empty());
        assert_eq!(proto.after, br#""/etl""#.to_vec());

        let back: AttributeChange = proto.into();
        assert_eq!(back, change);
    }

    #[test]
    fn test_destroy_plan() {
        let plan = PlanResult::destroy(json!({"id": "job_a"}));
        assert!(plan.planned_state.is_null());
        assert!(plan.has_changes());
        assert_eq!(plan.changes[0].before, Some(json!({"id": "job_a"})));
        assert!(!PlanResult::no_change(json!({})).has_changes());
    }

    #[test]
    fn test_imported_resource() {
        let imported = ImportedResource::new("dataarts_factory_job", json!({"id": "job_a"}));
        assert_eq!(imported.resource_type, "dataarts_factory_job");
        assert_eq!(imported.state["id"], "job_a");
    }

    #[test]
    fn test_protocol_constants() {
        assert_eq!(format!("{}|{}", HANDSHAKE_PREFIX, PROTOCOL_VERSION), "HEMMER_PROVIDER|1");
    }
}
