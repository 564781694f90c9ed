//! `dataarts_architecture_table_models` data source.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::architecture_table_model::{attribute_block, TABLE_MODEL_PATH};
use super::common::{data_source_schema, field, pick, service_client, workspace_opts};
use crate::client::Client;
use crate::config::PRODUCT_DATAARTS;
use crate::error::ProviderError;
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::services::DataSource;
use crate::state::ResourceData;
use crate::utils::{normalize_time, path_search_array};

const PAGE_LIMIT: usize = 100;

/// Query filters, `(attribute, query parameter)`.
const FILTERS: &[(&str, &str)] = &[
    ("name", "name"),
    ("subject_id", "biz_catalog_id"),
    ("status", "status"),
    ("created_by", "create_by"),
];

/// String fields of each table, `(attribute, response path)`.
const TABLE_FIELDS: &[(&str, &str)] = &[
    ("id", "id"),
    ("model_id", "model_id"),
    ("table_name", "logic_tb_name"),
    ("physical_table_name", "tb_name"),
    ("dw_id", "dw_id"),
    ("dw_type", "dw_type"),
    ("dw_name", "dw_name"),
    ("subject_id", "biz_catalog_id"),
    ("catalog_path", "catalog_path"),
    ("table_type", "table_type"),
    ("description", "description"),
    ("configs", "configs"),
    ("parent_table_id", "parent_table_id"),
    ("parent_table_name", "parent_table_name"),
    ("parent_table_code", "parent_table_code"),
    ("related_logic_table_model_id", "related_logic_table_id"),
    ("related_logic_table_model_name", "related_logic_table_name"),
    ("related_logic_model_id", "related_logic_table_model_id"),
    ("related_logic_model_name", "related_logic_table_model_name"),
    ("owner", "owner"),
    ("compression", "compression"),
    ("db_name", "db_name"),
    ("queue_name", "queue_name"),
    ("schema", "schema"),
    ("obs_location", "obs_location"),
    ("distribute", "distribute"),
    ("distribute_column", "distribute_column"),
    ("code", "code"),
    ("data_format", "data_format"),
    ("dlf_task_id", "dlf_task_id"),
    ("dirty_out_database", "dirty_out_database"),
    ("dirty_out_prefix", "dirty_out_prefix"),
    ("dirty_out_suffix", "dirty_out_suffix"),
    ("partition_conf", "partition_conf"),
    ("status", "status"),
    ("extend_info", "extend_info"),
    ("tb_guid", "tb_guid"),
    ("logic_tb_guid", "logic_tb_guid"),
    ("physical_table_status", "physical_table"),
    ("dev_physical_table_status", "dev_physical_table"),
    ("technical_asset_status", "technical_asset"),
    ("business_asset_status", "business_asset"),
    ("meta_data_link_status", "meta_data_link"),
    ("data_quality_status", "data_quality"),
    ("summary_status", "summary_status"),
    ("env_type", "env_type"),
    ("created_by", "create_by"),
    ("updated_by", "update_by"),
];

const TABLE_FLAGS: &[&str] = &[
    "use_recently_partition",
    "dirty_out_switch",
    "is_partition",
    "has_related_physical_table",
    "has_related_logic_table",
];

/// String fields of each table attribute, `(attribute, response path)`.
const ATTRIBUTE_FIELDS: &[(&str, &str)] = &[
    ("id", "id"),
    ("name", "name_ch"),
    ("name_en", "name_en"),
    ("data_type", "data_type"),
    ("data_type_extend", "data_type_extend"),
    ("domain_type", "domain_type"),
    ("description", "description"),
    ("stand_row_id", "stand_row_id"),
    ("code", "code"),
];

const ATTRIBUTE_FLAGS: &[&str] = &["extend_field", "is_foreign_key", "is_primary_key", "is_partition_key", "not_null"];

pub struct ArchitectureTableModels;

fn table_block() -> Block {
    let block = TABLE_FIELDS
        .iter()
        .map(|(name, _)| *name)
        .chain(["created_at", "updated_at"])
        .fold(Block::new(), |b, name| b.with_attribute(name, Attribute::computed_string()))
        .with_block("attributes", NestedBlock::list(attribute_block()).computed());
    TABLE_FLAGS
        .iter()
        .fold(block, |b, name| b.with_attribute(*name, Attribute::computed_bool()))
}

fn flatten_table(table: &Value) -> Value {
    let mut flat = pick(table, TABLE_FIELDS);
    for name in TABLE_FLAGS {
        flat[*name] = Value::Bool(field(table, name).as_bool().unwrap_or(false));
    }
    flat["attributes"] = Value::Array(path_search_array("attributes", table).iter().map(flatten_attribute).collect());
    flat["created_at"] = normalize_time(table.get("create_time"));
    flat["updated_at"] = normalize_time(table.get("update_time"));
    flat
}

/// Every attribute the API returns is listed, including those of related
/// tables, with the ordinal the API reports.
fn flatten_attribute(attr: &Value) -> Value {
    let mut flat = pick(attr, ATTRIBUTE_FIELDS);
    for name in ATTRIBUTE_FLAGS {
        flat[*name] = Value::Bool(field(attr, name).as_bool().unwrap_or(false));
    }
    flat["ordinal"] = json!(field(attr, "ordinal").as_i64().unwrap_or(0));
    flat["created_at"] = normalize_time(attr.get("create_time"));
    flat["updated_at"] = normalize_time(attr.get("update_time"));
    flat
}

#[async_trait]
impl DataSource for ArchitectureTableModels {
    fn type_name(&self) -> &'static str {
        "dataarts_architecture_table_models"
    }

    fn schema(&self) -> Schema {
        let schema = data_source_schema("Lists the table models of a DataArts Architecture model")
            .with_attribute(
                "model_id",
                Attribute::required_string().with_description("The model the tables belong to"),
            )
            .with_block("tables", NestedBlock::list(table_block()).computed());
        FILTERS
            .iter()
            .fold(schema, |s, (name, _)| s.with_attribute(*name, Attribute::optional_string()))
    }

    async fn read(&self, client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
        let region = super::common::region(client, data)?;
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let model_id = data.require_str("model_id")?;

        let mut tables = Vec::new();
        let mut offset = 0usize;
        loop {
            let mut opts = workspace_opts(data)?
                .query("limit", PAGE_LIMIT)
                .query("model_id", model_id)
                .query("offset", offset);
            for (name, param) in FILTERS {
                opts = opts.query_opt(*param, data.get_str(name));
            }
            let resp = svc
                .get(TABLE_MODEL_PATH, opts)
                .await
                .map_err(|e| e.context("error retrieving DataArts table models"))?;
            let page = path_search_array("data.value.records", &resp);
            if page.is_empty() {
                break;
            }
            offset += page.len();
            tables.extend(page.iter().map(flatten_table));
        }
        tracing::debug!(count = tables.len(), "listed table models");

        data.set("region", Value::String(region));
        data.set("tables", Value::Array(tables));
        Ok(())
    }
}
