//! `dataarts_architecture_business_metric`

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::common::{field, service_client, set_fields, workspace_opts, workspace_resource_schema};
use crate::client::{Client, ServiceClient};
use crate::config::PRODUCT_DATAARTS;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::services::Resource;
use crate::state::ResourceData;
use crate::utils::{convert_expected_400_into_404, path_search, remove_nil, value_ignore_empty};

const BIZ_METRICS_PATH: &str = "v2/{project_id}/design/biz-metrics";
const BATCH_PUBLISH_PATH: &str = "v2/{project_id}/design/approvals/batch-publish";
const NOT_FOUND_CODE_PATH: &str = "errors|[0].error_code";
const NOT_FOUND_CODES: &[&str] = &["DLG.0818"];

const REQUIRED_FIELDS: &[&str] = &[
    "name",
    "owner",
    "owner_department",
    "destination",
    "definition",
    "expression",
    "biz_catalog_id",
    "time_filters",
    "interval_type",
];

const OPTIONAL_FIELDS: &[&str] = &[
    "name_alias",
    "code",
    "apply_scenario",
    "technical_metric",
    "measure",
    "unit",
    "general_filters",
    "data_origin",
    "description",
];

pub struct ArchitectureBusinessMetric;

fn metric_body(data: &ResourceData) -> Value {
    let mut body = Map::new();
    for name in REQUIRED_FIELDS {
        body.insert(name.to_string(), data.get(name).cloned().unwrap_or(Value::Null));
    }
    for name in OPTIONAL_FIELDS {
        body.insert(name.to_string(), value_ignore_empty(data.get(name)));
    }
    remove_nil(Value::Object(body))
}

fn publish_body(data: &ResourceData) -> Value {
    remove_nil(json!({
        "biz_infos": [{"biz_id": data.id(), "biz_type": "BIZ_METRIC"}],
        "approver_user_id": value_ignore_empty(data.get("approver_user_id")),
        "approver_user_name": value_ignore_empty(data.get("approver_user_name")),
        "fast_approval": true,
    }))
}

/// Publishing is serialized per workspace.
async fn publish(client: &Client, svc: &ServiceClient, data: &ResourceData) -> Result<(), ProviderError> {
    let workspace_id = data.require_str("workspace_id")?;
    let _guard = client.mutex_kv().lock(workspace_id).await;
    svc.post(BATCH_PUBLISH_PATH, workspace_opts(data)?.body(publish_body(data)))
        .await
        .map_err(|e| e.context("error publishing DataArts Architecture business metric"))?;
    Ok(())
}

#[async_trait]
impl Resource for ArchitectureBusinessMetric {
    fn type_name(&self) -> &'static str {
        "dataarts_architecture_business_metric"
    }

    fn schema(&self) -> Schema {
        let mut schema = workspace_resource_schema("Manages a DataArts Architecture business metric");
        for name in REQUIRED_FIELDS {
            schema = schema.with_attribute(*name, Attribute::required_string());
        }
        for name in OPTIONAL_FIELDS {
            schema = schema.with_attribute(*name, Attribute::optional_string());
        }
        schema = schema
            .with_attribute(
                "publish",
                Attribute::optional_bool()
                    .with_default(json!(true))
                    .with_description("Whether to publish the metric after it is created or updated"),
            )
            .with_attribute("approver_user_id", Attribute::optional_string())
            .with_attribute("approver_user_name", Attribute::optional_string());
        for name in [
            "biz_catalog_path",
            "technical_metric_name",
            "technical_metric_type",
            "status",
            "summary_status",
            "created_by",
            "updated_by",
            "created_at",
            "updated_at",
        ] {
            schema = schema.with_attribute(name, Attribute::computed_string());
        }
        schema
    }

    async fn create(&self, client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let resp = svc
            .post(BIZ_METRICS_PATH, workspace_opts(data)?.body(metric_body(data)))
            .await
            .map_err(|e| e.context("error creating DataArts Architecture business metric"))?;
        let id = path_search("data.value.id", &resp)
            .and_then(|v| v.as_str().map(str::to_string).or_else(|| v.as_i64().map(|n| n.to_string())))
            .ok_or_else(|| {
                ProviderError::Sdk("unable to find the business metric ID from the API response".to_string())
            })?;
        data.set_id(id);

        if data.get_bool("publish").unwrap_or(true) {
            publish(client, &svc, data).await?;
        }
        Ok(())
    }

    async fn read(&self, client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
        let region = super::common::region(client, data)?;
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let resp = svc
            .get(&format!("{}/{}", BIZ_METRICS_PATH, data.id()), workspace_opts(data)?)
            .await
            .map_err(|e| convert_expected_400_into_404(e, NOT_FOUND_CODE_PATH, NOT_FOUND_CODES))?;
        let metric = field(&resp, "data.value");

        data.set("region", Value::String(region));
        let fields: Vec<(&str, &str)> = REQUIRED_FIELDS
            .iter()
            .chain(OPTIONAL_FIELDS)
            .map(|name| (*name, *name))
            .chain([
                ("biz_catalog_path", "biz_catalog_path"),
                ("technical_metric_name", "technical_metric_name"),
                ("technical_metric_type", "technical_metric_type"),
                ("status", "status"),
                ("summary_status", "summary_status"),
                ("created_by", "create_by"),
                ("updated_by", "update_by"),
                ("created_at", "create_time"),
                ("updated_at", "update_time"),
            ])
            .collect();
        set_fields(data, &metric, &fields);
        Ok(())
    }

    async fn update(
        &self,
        client: &Client,
        _prior: &ResourceData,
        data: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let mut body = metric_body(data);
        body["id"] = Value::String(data.id().to_string());
        svc.put(&format!("{}/{}", BIZ_METRICS_PATH, data.id()), workspace_opts(data)?.body(body))
            .await
            .map_err(|e| e.context("error updating DataArts Architecture business metric"))?;

        if data.get_bool("publish").unwrap_or(true) {
            publish(client, &svc, data).await?;
        }
        Ok(())
    }

    async fn delete(&self, client: &Client, data: &ResourceData) -> Result<(), ProviderError> {
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let workspace_id = data.require_str("workspace_id")?;
        let _guard = client.mutex_kv().lock(workspace_id).await;
        svc.delete(BIZ_METRICS_PATH, workspace_opts(data)?.body(json!({"ids": [data.id()]})))
            .await
            .map_err(|e| convert_expected_400_into_404(e, NOT_FOUND_CODE_PATH, NOT_FOUND_CODES))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_body() {
        let data = ResourceData::new(json!({
            "workspace_id": "ws",
            "name": "gmv",
            "owner": "alice",
            "unit": "",
            "measure": "sum(amount)",
            "publish": true
        }));
        let body = metric_body(&data);
        assert_eq!(body["name"], "gmv");
        assert_eq!(body["measure"], "sum(amount)");
        assert!(body.get("unit").is_none());
        assert!(body.get("publish").is_none());
        assert!(body.get("workspace_id").is_none());
    }

    #[test]
    fn test_publish_body() {
        let mut data = ResourceData::new(json!({"approver_user_id": "u-1"}));
        data.set_id("bm-1");
        assert_eq!(
            publish_body(&data),
            json!({
                "biz_infos": [{"biz_id": "bm-1", "biz_type": "BIZ_METRIC"}],
                "approver_user_id": "u-1",
                "fast_approval": true
            })
        );
    }
}
