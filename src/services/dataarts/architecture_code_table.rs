//! `dataarts_architecture_code_table`

use async_trait::async_trait;
use serde_json::{json, Value};

use super::common::{
    field, service_client, set_fields, workspace_opts, workspace_resource_schema, WORKSPACE_HEADER,
};
use crate::client::{Client, RequestOpts, ServiceClient};
use crate::config::PRODUCT_DATAARTS;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema};
use crate::services::Resource;
use crate::state::ResourceData;
use crate::utils::{
    convert_expected_400_into_404, parse_import_id, path_search, path_search_array, remove_nil, value_ignore_empty,
};

const CODE_TABLES_PATH: &str = "v2/{project_id}/design/code-tables";
const VALUES_PAGE_LIMIT: usize = 50;
const NOT_FOUND_CODE_PATH: &str = "errors|[0].error_code";
const NOT_FOUND_CODES: &[&str] = &["DLG.6022"];

pub struct ArchitectureCodeTable;

/// A code table field as reported by the values API, with all its values.
#[derive(Debug, Default, Clone, PartialEq)]
struct CodeField {
    id: Value,
    ordinal: Value,
    table_id: Value,
    name: Value,
    code: Value,
    data_type: Value,
    description: Value,
    values: Vec<Value>,
    value_ids: Vec<Value>,
    value_ordinals: Vec<Value>,
}

impl CodeField {
    fn from_record(record: &Value) -> Self {
        Self {
            id: field(record, "id"),
            ordinal: field(record, "ordinal"),
            table_id: field(record, "code_table_id"),
            name: field(record, "name_ch"),
            code: field(record, "name_en"),
            data_type: field(record, "data_type"),
            description: field(record, "description"),
            ..Default::default()
        }
    }

    /// Append the values carried by one page record. Returns whether any
    /// value was added.
    fn absorb(&mut self, record: &Value) -> bool {
        let values = path_search_array("code_table_field_values", record);
        for v in values {
            self.values.push(field(v, "fd_value"));
            self.value_ids.push(field(v, "id"));
            self.value_ordinals.push(field(v, "ordinal"));
        }
        !values.is_empty()
    }

    fn to_state(&self) -> Value {
        json!({
            "id": self.id,
            "ordinal": self.ordinal,
            "table_id": self.table_id,
            "name": self.name,
            "code": self.code,
            "type": self.data_type,
            "description": self.description,
            "values": self.values,
        })
    }

    /// The `to_remove` entry dropping every value of this field.
    fn removal(&self) -> Option<Value> {
        if self.values.is_empty() {
            return None;
        }
        let values: Vec<Value> = self
            .value_ids
            .iter()
            .zip(&self.value_ordinals)
            .map(|(id, ordinal)| json!({"id": id, "ordinal": ordinal}))
            .collect();
        Some(json!({
            "id": self.id,
            "code_table_id": self.table_id,
            "name_ch": self.name,
            "name_en": self.code,
            "ordinal": self.ordinal,
            "data_type": self.data_type,
            "code_table_field_values": values,
        }))
    }
}

fn fields_block() -> Block {
    Block::new()
        .with_attribute("name", Attribute::required_string().with_description("The name of the field"))
        .with_attribute("code", Attribute::required_string().with_description("The code of the field"))
        .with_attribute("type", Attribute::required_string().with_description("The data type of the field"))
        .with_attribute("values", Attribute::string_list(AttributeFlags::optional()))
        .with_attribute("description", Attribute::optional_string())
        .with_attribute("ordinal", Attribute::computed_int64())
        .with_attribute("table_id", Attribute::computed_string())
        .with_attribute("id", Attribute::computed_string())
}

fn field_body(raw: &Value, index: usize) -> Value {
    json!({
        "ordinal": index + 1,
        "name_ch": field(raw, "name"),
        "name_en": field(raw, "code"),
        "data_type": field(raw, "type"),
        "description": value_ignore_empty(raw.get("description")),
    })
}

fn create_body(data: &ResourceData) -> Value {
    let fields: Vec<Value> = data
        .get_list("fields")
        .iter()
        .enumerate()
        .map(|(i, raw)| field_body(raw, i))
        .collect();
    remove_nil(json!({
        "name_ch": data.get("name"),
        "name_en": data.get("code"),
        "directory_id": data.get("directory_id"),
        "code_table_fields": value_ignore_empty(Some(&Value::Array(fields))),
        "description": value_ignore_empty(data.get("description")),
    }))
}

/// Field IDs are taken from the planned state, falling back to the prior
/// field at the same position.
fn update_body(data: &ResourceData, prior: &ResourceData) -> Value {
    let old = prior.get_list("fields");
    let fields: Vec<Value> = data
        .get_list("fields")
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let mut body = field_body(raw, i);
            let id = raw
                .get("id")
                .filter(|v| !v.is_null())
                .or_else(|| old.get(i).and_then(|f| f.get("id")))
                .cloned()
                .unwrap_or(Value::Null);
            body["id"] = id;
            body["code_table_id"] = Value::String(data.id().to_string());
            body
        })
        .collect();
    remove_nil(json!({
        "id": data.id(),
        "name_ch": data.get("name"),
        "name_en": data.get("code"),
        "directory_id": data.get("directory_id"),
        "code_table_fields": value_ignore_empty(Some(&Value::Array(fields))),
        "description": value_ignore_empty(data.get("description")),
    }))
}

/// The `to_add` body for the configured field values. `None` when no field
/// has values.
fn insert_values_body(data: &ResourceData, field_ids: &[Value]) -> Option<Value> {
    let fields: Vec<Value> = data
        .get_list("fields")
        .iter()
        .enumerate()
        .filter_map(|(i, raw)| {
            let values = raw.get("values").and_then(Value::as_array).filter(|v| !v.is_empty())?;
            let id = field_ids.get(i).cloned().unwrap_or(Value::Null);
            let cells: Vec<Value> = values
                .iter()
                .enumerate()
                .map(|(j, v)| json!({"ordinal": j + 1, "fd_id": id, "fd_value": v}))
                .collect();
            let mut body = field_body(raw, i);
            body["id"] = id;
            body["code_table_id"] = Value::String(data.id().to_string());
            body["code_table_field_values"] = Value::Array(cells);
            Some(body)
        })
        .collect();
    if fields.is_empty() {
        None
    } else {
        Some(remove_nil(json!({ "to_add": fields })))
    }
}

fn values_path(data: &ResourceData) -> String {
    format!("{}/{}/values", CODE_TABLES_PATH, data.id())
}

async fn get_code_table(svc: &ServiceClient, data: &ResourceData) -> Result<Value, ProviderError> {
    svc.get(&format!("{}/{}", CODE_TABLES_PATH, data.id()), workspace_opts(data)?)
        .await
        .map_err(|e| convert_expected_400_into_404(e, NOT_FOUND_CODE_PATH, NOT_FOUND_CODES))
}

/// Load the fields, then page through their values until a page adds none.
async fn get_fields_and_values(svc: &ServiceClient, data: &ResourceData) -> Result<Vec<CodeField>, ProviderError> {
    let path = values_path(data);
    let resp = svc
        .get(&path, workspace_opts(data)?)
        .await
        .map_err(|e| e.context("error retrieving DataArts Architecture code table fields"))?;
    let mut fields: Vec<CodeField> = path_search_array("data.value.records", &resp)
        .iter()
        .map(CodeField::from_record)
        .collect();

    let mut offset = 0;
    loop {
        let page = svc
            .get(
                &path,
                workspace_opts(data)?
                    .query("limit", VALUES_PAGE_LIMIT)
                    .query("offset", offset),
            )
            .await
            .map_err(|e| e.context("error retrieving DataArts Architecture code table fields"))?;

        let mut has_values = false;
        for record in path_search_array("data.value.records", &page) {
            let id = field(record, "id");
            for f in fields.iter_mut().filter(|f| f.id == id) {
                has_values |= f.absorb(record);
            }
        }
        if !has_values {
            break;
        }
        offset += VALUES_PAGE_LIMIT;
    }
    Ok(fields)
}

async fn insert_values(svc: &ServiceClient, data: &ResourceData) -> Result<(), ProviderError> {
    let detail = get_code_table(svc, data)
        .await
        .map_err(|e| e.context("error retrieving DataArts Architecture code table"))?;
    let field_ids: Vec<Value> = path_search_array("data.value.code_table_fields", &detail)
        .iter()
        .map(|f| field(f, "id"))
        .collect();
    let Some(body) = insert_values_body(data, &field_ids) else {
        return Ok(());
    };
    svc.put(&values_path(data), workspace_opts(data)?.body(body))
        .await
        .map_err(|e| e.context("error adding field values to DataArts Architecture code table"))?;
    Ok(())
}

async fn remove_values(svc: &ServiceClient, data: &ResourceData) -> Result<(), ProviderError> {
    let fields = get_fields_and_values(svc, data).await?;
    let removals: Vec<Value> = fields.iter().filter_map(CodeField::removal).collect();
    if removals.is_empty() {
        return Ok(());
    }
    svc.put(
        &values_path(data),
        workspace_opts(data)?.body(remove_nil(json!({ "to_remove": removals }))),
    )
    .await
    .map_err(|e| e.context("error deleting field values of DataArts Architecture code table"))?;
    Ok(())
}

#[async_trait]
impl Resource for ArchitectureCodeTable {
    fn type_name(&self) -> &'static str {
        "dataarts_architecture_code_table"
    }

    fn schema(&self) -> Schema {
        let schema = workspace_resource_schema("Manages a DataArts Architecture code table")
            .with_attribute("name", Attribute::required_string().with_description("The name of the code table"))
            .with_attribute("code", Attribute::required_string().with_description("The code of the code table"))
            .with_attribute("directory_id", Attribute::required_string())
            .with_attribute("description", Attribute::optional_string())
            .with_block("fields", NestedBlock::list(fields_block()).with_min_items(1));
        ["directory_path", "status", "created_by", "created_at", "updated_at"]
            .into_iter()
            .fold(schema, |s, name| s.with_attribute(name, Attribute::computed_string()))
    }

    async fn create(&self, client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let resp = svc
            .post(CODE_TABLES_PATH, workspace_opts(data)?.body(create_body(data)))
            .await
            .map_err(|e| e.context("error creating DataArts Architecture code table"))?;
        let id = path_search("data.value.id", &resp)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProviderError::Sdk(
                    "error creating DataArts Architecture code table: id is not found in API response".to_string(),
                )
            })?;
        data.set_id(id);

        insert_values(&svc, data).await
    }

    async fn read(&self, client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
        let region = super::common::region(client, data)?;
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let resp = get_code_table(&svc, data).await?;
        let fields = get_fields_and_values(&svc, data).await?;

        let table = field(&resp, "data.value");
        data.set("region", Value::String(region));
        set_fields(
            data,
            &table,
            &[
                ("name", "name_ch"),
                ("code", "name_en"),
                ("directory_id", "directory_id"),
                ("directory_path", "directory_path"),
                ("description", "description"),
                ("created_by", "create_by"),
                ("created_at", "create_time"),
                ("updated_at", "update_time"),
                ("status", "status"),
            ],
        );
        data.set("fields", Value::Array(fields.iter().map(CodeField::to_state).collect()));
        Ok(())
    }

    async fn update(
        &self,
        client: &Client,
        prior: &ResourceData,
        data: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        svc.put(
            &format!("{}/{}", CODE_TABLES_PATH, data.id()),
            workspace_opts(data)?.body(update_body(data, prior)),
        )
        .await
        .map_err(|e| e.context("error updating DataArts Architecture code table"))?;

        remove_values(&svc, data).await?;
        insert_values(&svc, data).await
    }

    async fn delete(&self, client: &Client, data: &ResourceData) -> Result<(), ProviderError> {
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        svc.delete(CODE_TABLES_PATH, workspace_opts(data)?.body(json!({"ids": [data.id()]})))
            .await
            .map_err(|e| e.context("error deleting DataArts Architecture code table"))?;

        match get_code_table(&svc, data).await {
            Ok(_) => Err(ProviderError::Sdk(format!(
                "error deleting DataArts Architecture code table: {} still exists",
                data.id()
            ))),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.context("error deleting DataArts Architecture code table")),
        }
    }

    fn import_format(&self) -> &'static str {
        "<workspace_id>/<name>"
    }

    async fn import(&self, client: &Client, id: &str) -> Result<ResourceData, ProviderError> {
        let parts = parse_import_id(id, 2, self.import_format())?;
        let (workspace_id, name) = (parts[0], parts[1]);

        let mut data = ResourceData::default();
        data.set("workspace_id", workspace_id.into());
        let svc = service_client(client, &data, PRODUCT_DATAARTS)?;
        let resp = svc
            .get(
                CODE_TABLES_PATH,
                RequestOpts::new()
                    .header(WORKSPACE_HEADER, workspace_id)
                    .query("name", name),
            )
            .await
            .map_err(|e| e.context("error querying DataArts Architecture code table"))?;

        let table_id = path_search_array("data.value.records", &resp)
            .iter()
            .find(|r| r.get("name_ch").and_then(Value::as_str) == Some(name))
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProviderError::NotFound(format!("code table '{name}' not found in workspace {workspace_id}"))
            })?;
        data.set_id(table_id);
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ResourceData {
        ResourceData::new(json!({
            "id": "ct-1",
            "workspace_id": "ws",
            "name": "colors",
            "code": "COLORS",
            "directory_id": "dir-1",
            "description": "",
            "fields": [
                {"name": "color", "code": "COLOR", "type": "STRING", "values": ["red", "blue"]},
                {"name": "rank", "code": "RANK", "type": "BIGINT", "values": []}
            ]
        }))
    }

    #[test]
    fn test_create_body_renames() {
        let body = create_body(&state());
        assert_eq!(body["name_ch"], "colors");
        assert_eq!(body["name_en"], "COLORS");
        assert!(body.get("description").is_none());
        assert_eq!(
            body["code_table_fields"][1],
            json!({"ordinal": 2, "name_ch": "rank", "name_en": "RANK", "data_type": "BIGINT"})
        );
    }

    #[test]
    fn test_insert_values_body_skips_empty_fields() {
        let body = insert_values_body(&state(), &[json!("f-1"), json!("f-2")]).unwrap();
        let fields = body["to_add"].as_array().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0]["id"], "f-1");
        assert_eq!(fields[0]["code_table_id"], "ct-1");
        assert_eq!(
            fields[0]["code_table_field_values"][1],
            json!({"ordinal": 2, "fd_id": "f-1", "fd_value": "blue"})
        );

        let mut data = state();
        data.set("fields", json!([{"name": "a", "code": "A", "type": "STRING"}]));
        assert!(insert_values_body(&data, &[]).is_none());
    }

    #[test]
    fn test_update_body_reuses_prior_field_ids() {
        let prior = ResourceData::new(json!({"fields": [{"id": "f-1"}, {"id": "f-2"}]}));
        let body = update_body(&state(), &prior);
        assert_eq!(body["id"], "ct-1");
        assert_eq!(body["code_table_fields"][0]["id"], "f-1");
        assert_eq!(body["code_table_fields"][1]["id"], "f-2");
        assert_eq!(body["code_table_fields"][1]["code_table_id"], "ct-1");
    }

    #[test]
    fn test_code_field_absorb_and_removal() {
        let record = json!({"id": "f-1", "ordinal": 1, "code_table_id": "ct-1", "name_ch": "color",
            "code_table_field_values": [{"id": "v-1", "fd_value": "red", "ordinal": 1}]});
        let mut f = CodeField::from_record(&record);
        assert!(f.removal().is_none());
        assert!(f.absorb(&record));
        assert!(!f.absorb(&json!({"id": "f-1"})));
        assert_eq!(f.to_state()["values"], json!(["red"]));
        assert_eq!(f.removal().unwrap()["code_table_field_values"], json!([{"id": "v-1", "ordinal": 1}]));
    }
}
