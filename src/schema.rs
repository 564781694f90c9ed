//! Schema types describing the provider configuration, resources and data sources.
//!
//! Every DataArts resource builds its [`Schema`] with the builders here. The
//! schema drives config validation ([`crate::validation`]) and planning
//! ([`crate::plan`]), and is sent to the engine in `GetSchema`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Value type of an attribute, as carried in state JSON. Collections hold a
/// single element type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Int64,
    Bool,
    List(Box<AttributeType>),
    Set(Box<AttributeType>),
    Map(Box<AttributeType>),
}

impl AttributeType {
    pub fn list(element: AttributeType) -> Self {
        Self::List(Box::new(element))
    }

    pub fn set(element: AttributeType) -> Self {
        Self::Set(Box::new(element))
    }

    pub fn map(element: AttributeType) -> Self {
        Self::Map(Box::new(element))
    }
}

/// Who may set an attribute: the user (`required`/`optional`), the provider
/// (`computed`), or both (`optional` + `computed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    /// Redacted from logs and plan output.
    pub sensitive: bool,
}

impl AttributeFlags {
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Default::default()
        }
    }

    pub fn computed() -> Self {
        Self {
            computed: true,
            ..Default::default()
        }
    }

    /// Optional in config; when unset, the value reported by the API is kept.
    pub fn optional_computed() -> Self {
        Self {
            optional: true,
            computed: true,
            ..Default::default()
        }
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Whether the value can only come from the provider.
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    #[serde(flatten)]
    pub flags: AttributeFlags,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Changing this attribute replaces the remote object.
    #[serde(default)]
    pub force_new: bool,
    /// Value used when the attribute is absent from config.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl Attribute {
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
            default: None,
        }
    }

    pub fn required_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::required())
    }

    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional())
    }

    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::computed())
    }

    pub fn optional_computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional_computed())
    }

    pub fn required_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::required())
    }

    pub fn optional_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::optional())
    }

    pub fn computed_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::computed())
    }

    pub fn optional_computed_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::optional_computed())
    }

    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::optional())
    }

    pub fn computed_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::computed())
    }

    pub fn optional_computed_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::optional_computed())
    }

    /// A list of strings with the given flags.
    pub fn string_list(flags: AttributeFlags) -> Self {
        Self::new(AttributeType::list(AttributeType::String), flags)
    }

    /// A set of strings with the given flags.
    pub fn string_set(flags: AttributeFlags) -> Self {
        Self::new(AttributeType::set(AttributeType::String), flags)
    }

    /// A string-to-string map with the given flags.
    pub fn string_map(flags: AttributeFlags) -> Self {
        Self::new(AttributeType::map(AttributeType::String), flags)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }
}

/// How a nested block is represented in state.
///
/// `Single` blocks are JSON objects, `List` and `Set` blocks are arrays of
/// objects and `Map` blocks are objects of objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockNestingMode {
    #[default]
    Single,
    List,
    Set,
    Map,
}

/// A group of attributes and nested blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Block {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, Attribute>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub blocks: HashMap<String, NestedBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether any attribute in this block, or below it, forces replacement.
    pub fn has_force_new(&self) -> bool {
        self.attributes.values().any(|a| a.force_new)
            || self.blocks.values().any(|b| b.force_new || b.block.has_force_new())
    }
}

/// A nested block with its nesting mode and item constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    #[serde(flatten)]
    pub block: Block,
    #[serde(default)]
    pub nesting_mode: BlockNestingMode,
    #[serde(default)]
    pub min_items: u32,
    /// 0 means unlimited.
    #[serde(default)]
    pub max_items: u32,
    /// Changing the block as a whole replaces the remote object.
    #[serde(default)]
    pub force_new: bool,
    /// The provider fills the block from the API response.
    #[serde(default)]
    pub computed: bool,
    /// The block may be configured; when it is not, the remote value is kept.
    #[serde(default)]
    pub optional_computed: bool,
}

impl NestedBlock {
    fn with_mode(block: Block, nesting_mode: BlockNestingMode, max_items: u32) -> Self {
        Self {
            block,
            nesting_mode,
            min_items: 0,
            max_items,
            force_new: false,
            computed: false,
            optional_computed: false,
        }
    }

    /// At most one block, stored as an object.
    pub fn single(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::Single, 1)
    }

    pub fn list(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::List, 0)
    }

    pub fn set(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::Set, 0)
    }

    pub fn map(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::Map, 0)
    }

    pub fn with_min_items(mut self, min: u32) -> Self {
        self.min_items = min;
        self
    }

    pub fn with_max_items(mut self, max: u32) -> Self {
        self.max_items = max;
        self
    }

    /// A single block that must be present.
    pub fn required(mut self) -> Self {
        self.min_items = self.min_items.max(1);
        self
    }

    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Mark the block as filled in by the provider.
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn optional_computed(mut self) -> Self {
        self.optional_computed = true;
        self
    }
}

/// A versioned top-level block: the provider config, a resource or a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Version used by `UpgradeResourceState`.
    #[serde(default)]
    pub version: u64,
    #[serde(flatten)]
    pub block: Block,
}

impl Schema {
    pub fn new(version: u64) -> Self {
        Self {
            version,
            block: Block::new(),
        }
    }

    pub fn v0() -> Self {
        Self::new(0)
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block.attributes.insert(name.into(), attr);
        self
    }

    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.block.blocks.insert(name.into(), block);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.block.description = Some(description.into());
        self
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::v0()
    }
}

/// Provider configuration schema plus every resource and data source schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    #[serde(default)]
    pub provider: Schema,
    #[serde(default)]
    pub resources: HashMap<String, Schema>,
    #[serde(default)]
    pub data_sources: HashMap<String, Schema>,
}

impl ProviderSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider_config(mut self, schema: Schema) -> Self {
        self.provider = schema;
        self
    }

    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }

    pub fn with_data_source(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.data_sources.insert(name.into(), schema);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// A diagnostic reported back to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Dotted path of the offending attribute, e.g. `nodes.0.name`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_flags() {
        let required = AttributeFlags::required();
        assert!(required.required);
        assert!(!required.is_computed_only());

        let computed = AttributeFlags::computed();
        assert!(computed.is_computed_only());

        let optional_computed = AttributeFlags::optional_computed();
        assert!(optional_computed.optional);
        assert!(optional_computed.computed);
        assert!(!optional_computed.is_computed_only());

        assert!(AttributeFlags::required().sensitive().sensitive);
    }

    #[test]
    fn test_collection_attributes() {
        let attr = Attribute::string_list(AttributeFlags::optional());
        assert_eq!(attr.attr_type, AttributeType::list(AttributeType::String));

        let attr = Attribute::string_map(AttributeFlags::optional_computed());
        assert_eq!(attr.attr_type, AttributeType::map(AttributeType::String));
        assert!(attr.flags.computed);
    }

    #[test]
    fn test_job_like_schema() {
        let schema = Schema::v0()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("workspace_id", Attribute::optional_string().with_force_new())
            .with_block(
                "schedule",
                NestedBlock::single(Block::new().with_attribute("type", Attribute::required_string()))
                    .required(),
            );

        assert!(schema.block.attributes["workspace_id"].force_new);
        let schedule = &schema.block.blocks["schedule"];
        assert_eq!(schedule.nesting_mode, BlockNestingMode::Single);
        assert_eq!(schedule.min_items, 1);
        assert_eq!(schedule.max_items, 1);
        assert!(schema.block.has_force_new());
    }

    #[test]
    fn test_nested_force_new_detection() {
        let block = Block::new().with_block(
            "datasource_config",
            NestedBlock::single(
                Block::new().with_attribute("type", Attribute::required_string().with_force_new()),
            ),
        );
        assert!(block.has_force_new());
        assert!(!Block::new()
            .with_attribute("name", Attribute::required_string())
            .has_force_new());
    }

    #[test]
    fn test_provider_schema() {
        let provider_schema = ProviderSchema::new()
            .with_provider_config(
                Schema::v0().with_attribute("auth_token", Attribute::optional_string().sensitive()),
            )
            .with_resource(
                "dataarts_factory_job",
                Schema::v0().with_attribute("name", Attribute::required_string()),
            )
            .with_data_source(
                "dataarts_dataservice_apis",
                Schema::v0().with_attribute("name", Attribute::optional_string()),
            );

        assert!(provider_schema.provider.block.attributes["auth_token"].flags.sensitive);
        assert!(provider_schema.resources.contains_key("dataarts_factory_job"));
        assert!(provider_schema.data_sources.contains_key("dataarts_dataservice_apis"));
    }

    #[test]
    fn test_diagnostic() {
        let err = Diagnostic::error("Invalid configuration")
            .with_detail("region could not be resolved")
            .with_attribute("region");

        assert!(err.is_error());
        assert_eq!(err.attribute.as_deref(), Some("region"));
        assert!(!Diagnostic::warning("deprecated").is_error());
    }
}
