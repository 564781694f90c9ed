//! `dataarts_security_permission_set`

use async_trait::async_trait;
use serde_json::{json, Value};

use super::common::{service_client, set_fields, workspace_opts, workspace_resource_schema};
use crate::client::Client;
use crate::config::PRODUCT_DATAARTS;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::services::Resource;
use crate::state::ResourceData;
use crate::utils::{
    convert_expected_400_into_404, path_search, path_search_string, remove_nil, timestamp_value, value_ignore_empty,
};

const PERMISSION_SETS_PATH: &str = "v1/{project_id}/security/permission-sets";
const NOT_FOUND_CODE_PATH: &str = "error_code";
const NOT_FOUND_CODES: &[&str] = &["DLS.3027"];

const COMPUTED_FIELDS: &[(&str, &str)] = &[
    ("manager_name", "manager_name"),
    ("manager_type", "manager_type"),
    ("type", "type"),
    ("status", "sync_status"),
    ("created_by", "create_user"),
    ("updated_by", "update_user"),
];

pub struct SecurityPermissionSet;

fn permission_set_body(data: &ResourceData) -> Value {
    remove_nil(json!({
        "name": data.get("name"),
        "parent_id": data.get("parent_id"),
        "manager_id": data.get("manager_id"),
        "description": value_ignore_empty(data.get("description")),
    }))
}

fn permission_set_path(id: &str) -> String {
    format!("{}/{}", PERMISSION_SETS_PATH, id)
}

#[async_trait]
impl Resource for SecurityPermissionSet {
    fn type_name(&self) -> &'static str {
        "dataarts_security_permission_set"
    }

    fn schema(&self) -> Schema {
        let schema = workspace_resource_schema("Manages a DataArts Security permission set")
            .with_attribute("name", Attribute::required_string().with_description("The permission set name"))
            .with_attribute(
                "parent_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("The parent permission set, or 0 for a top-level set"),
            )
            .with_attribute("manager_id", Attribute::required_string())
            .with_attribute("description", Attribute::optional_string());
        COMPUTED_FIELDS
            .iter()
            .map(|(name, _)| *name)
            .chain(["created_at", "updated_at"])
            .fold(schema, |s, name| s.with_attribute(name, Attribute::computed_string()))
    }

    async fn create(&self, client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let resp = svc
            .post(PERMISSION_SETS_PATH, workspace_opts(data)?.body(permission_set_body(data)))
            .await
            .map_err(|e| e.context("error creating DataArts Security permission set"))?;
        let id = path_search_string("id", &resp)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ProviderError::Sdk("unable to find the permission set ID from the API response".to_string())
            })?;
        data.set_id(id);
        Ok(())
    }

    async fn read(&self, client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
        let region = super::common::region(client, data)?;
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let set = svc
            .get(&permission_set_path(data.id()), workspace_opts(data)?)
            .await
            .map_err(|e| convert_expected_400_into_404(e, NOT_FOUND_CODE_PATH, NOT_FOUND_CODES))?;

        data.set("region", Value::String(region));
        set_fields(
            data,
            &set,
            &[
                ("name", "name"),
                ("parent_id", "parent_id"),
                ("manager_id", "manager_id"),
                ("description", "description"),
            ],
        );
        set_fields(data, &set, COMPUTED_FIELDS);
        data.set("created_at", timestamp_value(path_search("create_time", &set)));
        data.set("updated_at", timestamp_value(path_search("update_time", &set)));
        Ok(())
    }

    async fn update(
        &self,
        client: &Client,
        prior: &ResourceData,
        data: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        if !data.has_change(prior, &["name", "manager_id", "description"]) {
            return Ok(());
        }
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let body = remove_nil(json!({
            "name": data.get("name"),
            "manager_id": data.get("manager_id"),
            "description": data.get("description").cloned().unwrap_or(Value::String(String::new())),
        }));
        svc.put(&permission_set_path(data.id()), workspace_opts(data)?.body(body))
            .await
            .map_err(|e| e.context("error updating DataArts Security permission set"))?;
        Ok(())
    }

    async fn delete(&self, client: &Client, data: &ResourceData) -> Result<(), ProviderError> {
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        svc.delete(&permission_set_path(data.id()), workspace_opts(data)?)
            .await
            .map_err(|e| convert_expected_400_into_404(e, NOT_FOUND_CODE_PATH, NOT_FOUND_CODES))?;
        Ok(())
    }
}
