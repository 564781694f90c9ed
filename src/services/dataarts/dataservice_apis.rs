//! `dataarts_dataservice_apis` data source.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::common::{data_source_schema, service_client};
use super::dataservice_api::{
    api_opts, backend_config_block, datasource_config_block, flatten_api, get_api, host_block, request_param_block,
    APIS_PATH, DEFAULT_DLM_TYPE, NOT_FOUND_CODE_PATH, READ_NOT_FOUND_CODES,
};
use crate::client::Client;
use crate::config::PRODUCT_DATAARTS;
use crate::error::ProviderError;
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::services::DataSource;
use crate::state::ResourceData;
use crate::utils::{convert_expected_400_into_404, path_search_array};

/// Query filters, `(attribute, query parameter)`.
const FILTERS: &[(&str, &str)] = &[
    ("name", "name"),
    ("type", "api_type"),
    ("description", "description"),
    ("create_user", "create_user"),
    ("datatable", "table_name"),
];

pub struct DataServiceApis;

fn api_block() -> Block {
    let block = [
        "id",
        "name",
        "type",
        "description",
        "protocol",
        "path",
        "request_type",
        "manager",
        "create_user",
        "created_at",
        "updated_at",
        "group_id",
        "status",
        "host",
    ]
    .into_iter()
    .fold(Block::new(), |b, name| b.with_attribute(name, Attribute::computed_string()));
    block
        .with_block("datasource_config", NestedBlock::single(datasource_config_block()).computed())
        .with_block("request_params", NestedBlock::list(request_param_block()).computed())
        .with_block("backend_config", NestedBlock::single(backend_config_block()).computed())
        .with_block("hosts", NestedBlock::list(host_block()).computed())
}

/// Keep only the record with `api_id`, when one is given.
fn filter_by_id<'a>(records: &'a [Value], api_id: Option<&str>) -> Vec<&'a Value> {
    records
        .iter()
        .filter(|r| match api_id {
            Some(id) => r.get("id").and_then(Value::as_str) == Some(id),
            None => true,
        })
        .collect()
}

#[async_trait]
impl DataSource for DataServiceApis {
    fn type_name(&self) -> &'static str {
        "dataarts_dataservice_apis"
    }

    fn schema(&self) -> Schema {
        let schema = data_source_schema("Lists DataArts DataService APIs")
            .with_attribute("dlm_type", Attribute::optional_string().with_default(DEFAULT_DLM_TYPE.into()))
            .with_attribute("api_id", Attribute::optional_string())
            .with_block("apis", NestedBlock::list(api_block()).computed());
        FILTERS
            .iter()
            .fold(schema, |s, (name, _)| s.with_attribute(*name, Attribute::optional_string()))
    }

    async fn read(&self, client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
        let region = super::common::region(client, data)?;
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let workspace_id = data.require_str("workspace_id")?.to_string();
        let dlm_type = data
            .get_str("dlm_type")
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_DLM_TYPE)
            .to_string();

        let mut opts = api_opts(&workspace_id, &dlm_type);
        for (name, param) in FILTERS {
            opts = opts.query_opt(*param, data.get_ok(name).and_then(Value::as_str));
        }
        let resp = svc
            .get(APIS_PATH, opts)
            .await
            .map_err(|e| convert_expected_400_into_404(e, NOT_FOUND_CODE_PATH, READ_NOT_FOUND_CODES))
            .map_err(|e| e.context("error querying DataArts DataService APIs"))?;

        let records = filter_by_id(path_search_array("records", &resp), data.get_str("api_id"));
        let mut apis = Vec::with_capacity(records.len());
        for record in records {
            let Some(id) = record.get("id").and_then(Value::as_str) else {
                continue;
            };
            let detail = match get_api(&svc, &workspace_id, &dlm_type, id).await {
                Ok(detail) => detail,
                Err(e) => {
                    tracing::warn!(api_id = %id, "error querying API configuration: {}", e);
                    continue;
                },
            };
            let mut api = Map::new();
            api.insert("id".to_string(), Value::String(id.to_string()));
            api.extend(flatten_api(&svc, &workspace_id, &detail).await);
            // The list record carries the creator even when the detail omits it.
            if let Some(user) = record.get("create_user").filter(|u| !u.is_null()) {
                api.insert("create_user".to_string(), user.clone());
            }
            apis.push(Value::Object(api));
        }

        data.set("region", Value::String(region));
        data.set("apis", Value::Array(apis));
        Ok(())
    }
}
