//! `dataarts_architecture_data_standard`

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::common::{field, flatten_array, pick, service_client, set_fields, workspace_opts, workspace_resource_schema};
use crate::client::{Client, ServiceClient};
use crate::config::PRODUCT_DATAARTS;
use crate::error::ProviderError;
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::services::Resource;
use crate::state::ResourceData;
use crate::utils::{path_search, path_search_array, remove_nil};

const STANDARDS_PATH: &str = "v2/{project_id}/design/standards";
const PAGE_LIMIT: usize = 100;

pub struct ArchitectureDataStandard;

fn value_block() -> Block {
    let mut block = Block::new()
        .with_attribute("fd_name", Attribute::required_string().with_description("The field name"))
        .with_attribute("fd_value", Attribute::optional_string().with_description("The field value"));
    for name in [
        "id",
        "fd_id",
        "directory_id",
        "row_id",
        "status",
        "created_by",
        "updated_by",
        "created_at",
        "updated_at",
    ] {
        block = block.with_attribute(name, Attribute::computed_string());
    }
    block
}

fn new_biz_block() -> Block {
    [
        "id",
        "biz_type",
        "biz_id",
        "biz_info",
        "status",
        "biz_version",
        "created_at",
        "updated_at",
    ]
    .into_iter()
    .fold(Block::new(), |b, name| b.with_attribute(name, Attribute::computed_string()))
}

fn flatten_values(standard: &Value) -> Value {
    flatten_array(standard, "values", |v| {
        pick(
            v,
            &[
                ("id", "id"),
                ("fd_id", "fd_id"),
                ("fd_name", "fd_name"),
                ("fd_value", "fd_value"),
                ("directory_id", "directory_id"),
                ("row_id", "row_id"),
                ("status", "status"),
                ("created_by", "create_by"),
                ("updated_by", "update_by"),
                ("created_at", "create_time"),
                ("updated_at", "update_time"),
            ],
        )
    })
}

fn flatten_new_biz(standard: &Value) -> Value {
    flatten_array(standard, "new_biz", |v| {
        pick(
            v,
            &[
                ("id", "id"),
                ("biz_type", "biz_type"),
                ("biz_id", "biz_id"),
                ("biz_info", "biz_info"),
                ("status", "status"),
                ("biz_version", "biz_version"),
                ("created_at", "create_time"),
                ("updated_at", "update_time"),
            ],
        )
    })
}

fn create_body(data: &ResourceData) -> Value {
    let values: Vec<Value> = data
        .get_list("values")
        .iter()
        .map(|v| json!({"fd_name": field(v, "fd_name"), "fd_value": field(v, "fd_value")}))
        .collect();
    remove_nil(json!({
        "directory_id": data.get("directory_id"),
        "values": if values.is_empty() { Value::Null } else { Value::Array(values) },
    }))
}

fn update_body(data: &ResourceData, ids_by_name: &HashMap<String, String>) -> Value {
    let directory_id = data.get("directory_id").cloned().unwrap_or(Value::Null);
    let values: Vec<Value> = data
        .get_list("values")
        .iter()
        .map(|v| {
            let name = v.get("fd_name").and_then(Value::as_str).unwrap_or_default();
            json!({
                "id": ids_by_name.get(name),
                "fd_name": field(v, "fd_name"),
                "fd_value": field(v, "fd_value"),
                "directory_id": directory_id,
            })
        })
        .collect();
    remove_nil(json!({
        "id": data.id(),
        "directory_id": directory_id,
        "values": if values.is_empty() { Value::Null } else { Value::Array(values) },
    }))
}

async fn get_detail(svc: &ServiceClient, data: &ResourceData) -> Result<Value, ProviderError> {
    svc.get(&format!("{}/{}", STANDARDS_PATH, data.id()), workspace_opts(data)?)
        .await
}

/// Walk the directory listing until the standard with `id` shows up.
async fn find_in_directory(svc: &ServiceClient, data: &ResourceData) -> Result<Value, ProviderError> {
    let directory_id = data.get_str("directory_id").unwrap_or_default();
    let mut offset = 0usize;
    loop {
        let resp = svc
            .get(
                STANDARDS_PATH,
                workspace_opts(data)?
                    .query("directory_id", directory_id)
                    .query("limit", PAGE_LIMIT)
                    .query("offset", offset),
            )
            .await?;
        let records = path_search_array("data.value.records", &resp);
        if let Some(found) = records
            .iter()
            .find(|r| r.get("id").and_then(Value::as_str) == Some(data.id()))
        {
            return Ok(found.clone());
        }
        let total = path_search("data.value.total", &resp)
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;
        offset += records.len();
        if records.is_empty() || offset >= total {
            return Err(ProviderError::NotFound(format!(
                "data standard {} not found in directory {}",
                data.id(),
                directory_id
            )));
        }
    }
}

#[async_trait]
impl Resource for ArchitectureDataStandard {
    fn type_name(&self) -> &'static str {
        "dataarts_architecture_data_standard"
    }

    fn schema(&self) -> Schema {
        let schema = workspace_resource_schema("Manages a DataArts Architecture data standard")
            .with_attribute(
                "directory_id",
                Attribute::required_string().with_description("The directory the standard belongs to"),
            )
            .with_block("values", NestedBlock::set(value_block()).with_min_items(1))
            .with_block("new_biz", NestedBlock::list(new_biz_block()).computed());
        ["directory_path", "status", "created_by", "updated_by", "created_at", "updated_at"]
            .into_iter()
            .fold(schema, |s, name| s.with_attribute(name, Attribute::computed_string()))
    }

    async fn create(&self, client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let resp = svc
            .post(STANDARDS_PATH, workspace_opts(data)?.body(create_body(data)))
            .await
            .map_err(|e| e.context("error creating DataArts Architecture data standard"))?;

        let id = path_search("data.value.id", &resp)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ProviderError::Sdk("unable to find the data standard ID from the API response".to_string())
            })?;
        data.set_id(id);
        Ok(())
    }

    async fn read(&self, client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
        let region = super::common::region(client, data)?;
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;

        // Imported standards carry no directory yet.
        if data.get_str("directory_id").is_none() {
            let detail = get_detail(&svc, data)
                .await
                .map_err(|e| e.context("error retrieving data standard"))?;
            data.set("directory_id", field(&detail, "data.value.directory_id"));
        }

        let standard = find_in_directory(&svc, data).await?;
        data.set("region", Value::String(region));
        set_fields(
            data,
            &standard,
            &[
                ("directory_id", "directory_id"),
                ("directory_path", "directory_path"),
                ("status", "status"),
                ("created_by", "create_by"),
                ("updated_by", "update_by"),
                ("created_at", "create_time"),
                ("updated_at", "update_time"),
            ],
        );
        data.set("values", flatten_values(&standard));
        data.set("new_biz", flatten_new_biz(&standard));
        Ok(())
    }

    async fn update(
        &self,
        client: &Client,
        prior: &ResourceData,
        data: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        if !data.has_change(prior, &["directory_id", "values"]) {
            return Ok(());
        }
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let detail = get_detail(&svc, data).await?;
        let ids_by_name: HashMap<String, String> = path_search_array("data.value.values", &detail)
            .iter()
            .filter_map(|v| {
                let name = v.get("fd_name")?.as_str()?;
                let id = v.get("id")?.as_str()?;
                Some((name.to_string(), id.to_string()))
            })
            .collect();

        svc.put(
            &format!("{}/{}", STANDARDS_PATH, data.id()),
            workspace_opts(data)?.body(update_body(data, &ids_by_name)),
        )
        .await
        .map_err(|e| e.context("error updating DataArts Architecture data standard"))?;
        Ok(())
    }

    async fn delete(&self, client: &Client, data: &ResourceData) -> Result<(), ProviderError> {
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        svc.delete(STANDARDS_PATH, workspace_opts(data)?.body(json!({"ids": [data.id()]})))
            .await
            .map_err(|e| e.context("error deleting DataArts Architecture data standard"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_body_maps_value_ids() {
        let data = ResourceData::new(json!({
            "id": "std-1",
            "directory_id": "dir-1",
            "values": [{"fd_name": "nameCh", "fd_value": "x"}, {"fd_name": "extra", "fd_value": null}]
        }));
        let ids = HashMap::from([("nameCh".to_string(), "v-1".to_string())]);
        let body = update_body(&data, &ids);
        assert_eq!(body["id"], "std-1");
        assert_eq!(body["values"][0], json!({"id": "v-1", "fd_name": "nameCh", "fd_value": "x", "directory_id": "dir-1"}));
        assert_eq!(body["values"][1], json!({"fd_name": "extra", "directory_id": "dir-1"}));
    }

    #[test]
    fn test_flatten_values_renames() {
        let standard = json!({"values": [{"id": "v1", "fd_name": "n", "create_by": "bob", "update_time": "t"}]});
        let flat = flatten_values(&standard);
        assert_eq!(flat[0]["created_by"], "bob");
        assert_eq!(flat[0]["updated_at"], "t");
        assert!(flat[0]["fd_value"].is_null());
    }

    #[test]
    fn test_create_body() {
        let data = ResourceData::new(json!({"directory_id": "dir-1", "values": [{"fd_name": "a", "fd_value": "b"}]}));
        assert_eq!(
            create_body(&data),
            json!({"directory_id": "dir-1", "values": [{"fd_name": "a", "fd_value": "b"}]})
        );
    }
}
