//! `dataarts_architecture_data_standard_template`
//!
//! A workspace has at most one data standard template. The template is a
//! list of fields: system defaults that are always active, preset optional
//! fields that can be switched on, and user-defined custom fields. The
//! resource ID is the workspace ID.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::common::{field, pick, resource_schema, service_client, workspace_opts};
use crate::client::{Client, ServiceClient};
use crate::config::PRODUCT_DATAARTS;
use crate::error::ProviderError;
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::services::Resource;
use crate::state::ResourceData;
use crate::utils::{parse_import_id, path_search, path_search_array, remove_nil, value_ignore_empty};

const TEMPLATES_PATH: &str = "v2/{project_id}/design/standards/templates";
const INIT_PATH: &str = "v2/{project_id}/design/standards/templates/action";

pub struct ArchitectureDataStandardTemplate;

fn field_block(custom: bool) -> Block {
    let mut block = Block::new()
        .with_attribute("fd_name", Attribute::required_string().with_description("The name of the field"))
        .with_attribute("required", Attribute::optional_bool())
        .with_attribute("searchable", Attribute::optional_bool());
    if custom {
        block = block.with_attribute("optional_values", Attribute::optional_string());
    }
    ["id", "created_by", "updated_by", "created_at", "updated_at"]
        .into_iter()
        .fold(block, |b, name| b.with_attribute(name, Attribute::computed_string()))
}

fn flatten_field(raw: &Value, custom: bool) -> Value {
    let mut fields = vec![
        ("fd_name", "fd_name"),
        ("required", "required"),
        ("searchable", "searchable"),
        ("id", "id"),
        ("created_by", "create_by"),
        ("updated_by", "update_by"),
        ("created_at", "create_time"),
        ("updated_at", "update_time"),
    ];
    if custom {
        fields.push(("optional_values", "optional_values"));
    }
    pick(raw, &fields)
}

/// Only activated optional fields are reported.
fn flatten_optional_fields(resp: &Value) -> Value {
    Value::Array(
        path_search_array("data.value.optional", resp)
            .iter()
            .filter(|v| v.get("actived").and_then(Value::as_bool).unwrap_or(false))
            .map(|v| flatten_field(v, false))
            .collect(),
    )
}

fn flatten_custom_fields(resp: &Value) -> Value {
    Value::Array(
        path_search_array("data.value.custom", resp)
            .iter()
            .map(|v| flatten_field(v, true))
            .collect(),
    )
}

fn fd_name(raw: &Value) -> &str {
    raw.get("fd_name").and_then(Value::as_str).unwrap_or_default()
}

/// Map field names to their IDs.
fn name_to_id(fields: &[Value]) -> HashMap<String, String> {
    fields
        .iter()
        .map(|v| {
            let id = v.get("id").and_then(Value::as_str).unwrap_or_default();
            (fd_name(v).to_string(), id.to_string())
        })
        .collect()
}

/// Preset fields sent on initialization. System defaults are active, the
/// optional presets are not.
fn preset_fields(fields: &[Value], system: bool) -> Vec<Value> {
    fields
        .iter()
        .map(|v| {
            json!({
                "fd_name": field(v, "fd_name"),
                "actived": system,
                "required": system,
                "searchable": system,
            })
        })
        .collect()
}

fn init_body(data: &ResourceData, template: &Value) -> Value {
    let mut fields = preset_fields(
        path_search_array("data.value.preFields_system_default", template),
        true,
    );
    fields.extend(preset_fields(path_search_array("data.value.preFields_optional", template), false));
    fields.extend(data.get_list("custom_fields").iter().map(|v| {
        json!({
            "fd_name": field(v, "fd_name"),
            "actived": true,
            "optional_values": value_ignore_empty(v.get("optional_values")),
            "required": value_ignore_empty(v.get("required")),
            "searchable": value_ignore_empty(v.get("searchable")),
        })
    }));
    json!({ "fields": fields })
}

/// Set members compared on their configurable fields only.
fn same_entry(a: &Value, b: &Value, custom: bool) -> bool {
    let keys: &[&str] = if custom {
        &["fd_name", "required", "searchable", "optional_values"]
    } else {
        &["fd_name", "required", "searchable"]
    };
    keys.iter().all(|k| {
        let x = a.get(*k).filter(|v| !v.is_null());
        let y = b.get(*k).filter(|v| !v.is_null());
        x == y
    })
}

/// Entries of `a` with no equal entry in `b`.
fn difference<'a>(a: &'a [Value], b: &[Value], custom: bool) -> Vec<&'a Value> {
    a.iter()
        .filter(|x| !b.iter().any(|y| same_entry(x, y, custom)))
        .collect()
}

fn lookup_id(ids: &HashMap<String, String>, raw: &Value) -> Value {
    ids.get(fd_name(raw))
        .map(|id| Value::String(id.clone()))
        .unwrap_or(Value::Null)
}

/// Activate added optional fields and deactivate removed ones. A field both
/// added and removed (i.e. changed) is only activated.
fn optional_field_updates(added: &[&Value], removed: &[&Value], ids: &HashMap<String, String>) -> Vec<Value> {
    let mut updates: Vec<Value> = added
        .iter()
        .map(|v| {
            json!({
                "fd_name": field(v, "fd_name"),
                "actived": true,
                "required": field(v, "required"),
                "searchable": field(v, "searchable"),
                "id": lookup_id(ids, v),
            })
        })
        .collect();
    updates.extend(
        removed
            .iter()
            .filter(|v| !added.iter().any(|a| fd_name(a) == fd_name(v)))
            .map(|v| {
                json!({
                    "fd_name": field(v, "fd_name"),
                    "actived": false,
                    "required": false,
                    "searchable": false,
                    "id": lookup_id(ids, v),
                })
            }),
    );
    updates
}

/// Custom fields to re-send and custom fields to delete.
fn custom_field_updates<'a>(
    added: &[&Value],
    removed: &[&'a Value],
    ids: &HashMap<String, String>,
) -> (Vec<Value>, Vec<&'a Value>) {
    let updates = added
        .iter()
        .map(|v| {
            json!({
                "fd_name": field(v, "fd_name"),
                "actived": true,
                "optional_values": field(v, "optional_values"),
                "required": field(v, "required"),
                "searchable": field(v, "searchable"),
                "id": lookup_id(ids, v),
            })
        })
        .collect();
    let deletes = removed
        .iter()
        .filter(|v| !added.iter().any(|a| fd_name(a) == fd_name(v)))
        .copied()
        .collect();
    (updates, deletes)
}

/// Comma separated IDs of the fields to delete, preferring the current ID
/// of a field with the same name.
fn delete_ids(fields: &[&Value], ids: &HashMap<String, String>) -> String {
    fields
        .iter()
        .filter_map(|v| {
            ids.get(fd_name(v))
                .map(String::as_str)
                .or_else(|| v.get("id").and_then(Value::as_str))
        })
        .filter(|id| !id.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

async fn get_template(svc: &ServiceClient, data: &ResourceData) -> Result<Value, ProviderError> {
    svc.get(TEMPLATES_PATH, workspace_opts(data)?)
        .await
        .map_err(|e| e.context("error retrieving DataArts Architecture data standard template"))
}

async fn init_template(svc: &ServiceClient, data: &ResourceData, body: Value) -> Result<Value, ProviderError> {
    svc.post(
        INIT_PATH,
        workspace_opts(data)?.query("action-id", "init").body(remove_nil(body)),
    )
    .await
    .map_err(|e| e.context("error initializing DataArts Architecture data standard template"))
}

async fn delete_fields(svc: &ServiceClient, data: &ResourceData, ids: String) -> Result<(), ProviderError> {
    if ids.is_empty() {
        return Ok(());
    }
    svc.delete(TEMPLATES_PATH, workspace_opts(data)?.query("ids", ids))
        .await
        .map_err(|e| e.context("error deleting DataArts Architecture data standard template"))?;
    Ok(())
}

fn has_template(resp: &Value) -> bool {
    path_search("data.value.hasTemplate", resp)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

#[async_trait]
impl Resource for ArchitectureDataStandardTemplate {
    fn type_name(&self) -> &'static str {
        "dataarts_architecture_data_standard_template"
    }

    fn schema(&self) -> Schema {
        resource_schema("Manages the data standard template of a DataArts Studio workspace")
            .with_attribute(
                "workspace_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("The ID of the DataArts Studio workspace"),
            )
            .with_block(
                "optional_fields",
                NestedBlock::set(field_block(false).with_description("Optional fields to activate"))
                    .optional_computed(),
            )
            .with_block(
                "custom_fields",
                NestedBlock::set(field_block(true).with_description("Custom fields to add")).optional_computed(),
            )
    }

    async fn create(&self, client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let template = get_template(&svc, data).await?;
        if has_template(&template) {
            return Err(ProviderError::AlreadyExists(
                "a DataArts Architecture data standard template already exists in this workspace".to_string(),
            ));
        }

        let resp = init_template(&svc, data, init_body(data, &template)).await?;
        let workspace_id = data.require_str("workspace_id")?.to_string();
        data.set_id(workspace_id);

        let optional = data.get_list("optional_fields");
        if !optional.is_empty() {
            let ids = name_to_id(path_search_array("data.value", &resp));
            let added: Vec<&Value> = optional.iter().collect();
            let updates = optional_field_updates(&added, &[], &ids);
            init_template(&svc, data, json!({ "fields": updates })).await?;
        }
        Ok(())
    }

    async fn read(&self, client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
        let region = super::common::region(client, data)?;
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let template = get_template(&svc, data).await?;
        if !has_template(&template) {
            return Err(ProviderError::NotFound(format!(
                "no data standard template in workspace {}",
                data.id()
            )));
        }

        data.set("region", Value::String(region));
        data.set("optional_fields", flatten_optional_fields(&template));
        data.set("custom_fields", flatten_custom_fields(&template));
        Ok(())
    }

    async fn update(
        &self,
        client: &Client,
        prior: &ResourceData,
        data: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let template = get_template(&svc, data).await?;
        let ids = name_to_id(path_search_array("data.value.allFields", &template));

        let (old_optional, new_optional) = (prior.get_list("optional_fields"), data.get_list("optional_fields"));
        let (old_custom, new_custom) = (prior.get_list("custom_fields"), data.get_list("custom_fields"));

        let optional = optional_field_updates(
            &difference(new_optional, old_optional, false),
            &difference(old_optional, new_optional, false),
            &ids,
        );
        let (custom, removed_custom) = custom_field_updates(
            &difference(new_custom, old_custom, true),
            &difference(old_custom, new_custom, true),
            &ids,
        );

        if !optional.is_empty() || !custom.is_empty() {
            let fields: Vec<Value> = optional.into_iter().chain(custom).collect();
            init_template(&svc, data, json!({ "fields": fields })).await?;
        }
        delete_fields(&svc, data, delete_ids(&removed_custom, &ids)).await
    }

    async fn delete(&self, client: &Client, data: &ResourceData) -> Result<(), ProviderError> {
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let template = get_template(&svc, data).await?;
        let all: Vec<&Value> = path_search_array("data.value.allFields", &template).iter().collect();
        delete_fields(&svc, data, delete_ids(&all, &HashMap::new())).await
    }

    fn import_format(&self) -> &'static str {
        "<workspace_id>"
    }

    async fn import(&self, _client: &Client, id: &str) -> Result<ResourceData, ProviderError> {
        let parts = parse_import_id(id, 1, self.import_format())?;
        let mut data = ResourceData::default();
        data.set("workspace_id", parts[0].into());
        data.set_id(parts[0]);
        Ok(data)
    }
}
