//! `dataarts_architecture_table_model`

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::common::{field, pick, service_client, set_fields, workspace_opts, workspace_resource_schema};
use crate::client::{Client, ServiceClient};
use crate::config::PRODUCT_DATAARTS;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema};
use crate::services::Resource;
use crate::state::ResourceData;
use crate::utils::{convert_expected_400_into_404, path_search, path_search_array, remove_nil, value_ignore_empty};

pub(super) const TABLE_MODEL_PATH: &str = "v2/{project_id}/design/table-model";
const NOT_FOUND_CODE_PATH: &str = "errors|[0].error_code";
const NOT_FOUND_CODES: &[&str] = &[
    "DLG.0818", // workspace not found
    "DLG.6019", // resource not found
    "DLG.3902", // bad resource ID
];

/// Optional settings sent as-is, `(attribute, wire key)`.
const OPTIONAL_SETTINGS: &[(&str, &str)] = &[
    ("configs", "configs"),
    ("dw_id", "dw_id"),
    ("parent_table_id", "parent_table_id"),
    ("related_logic_table_model_id", "related_logic_table_id"),
    ("related_logic_model_id", "related_logic_table_model_id"),
    ("parent_table_name", "parent_table_name"),
    ("related_logic_table_model_name", "related_logic_table_name"),
    ("related_logic_model_name", "related_logic_table_model_name"),
    ("dw_name", "dw_name"),
    ("owner", "owner"),
    ("table_type", "table_type"),
    ("compression", "compression"),
    ("code", "code"),
    ("distribute", "distribute"),
    ("distribute_column", "distribute_column"),
    ("data_format", "data_format"),
    ("dlf_task_id", "dlf_task_id"),
    ("use_recently_partition", "use_recently_partition"),
    ("db_name", "db_name"),
    ("queue_name", "queue_name"),
    ("schema", "schema"),
    ("obs_location", "obs_location"),
    ("dirty_out_switch", "dirty_out_switch"),
    ("dirty_out_database", "dirty_out_database"),
    ("dirty_out_prefix", "dirty_out_prefix"),
    ("dirty_out_suffix", "dirty_out_suffix"),
    ("partition_conf", "partition_conf"),
];

/// Fields copied from the API into state, `(attribute, response path)`.
const READ_FIELDS: &[(&str, &str)] = &[
    ("model_id", "model_id"),
    ("dw_type", "dw_type"),
    ("subject_id", "biz_catalog_id"),
    ("physical_table_name", "tb_name"),
    ("table_name", "logic_tb_name"),
    ("description", "description"),
    ("configs", "configs"),
    ("dw_id", "dw_id"),
    ("parent_table_id", "parent_table_id"),
    ("related_logic_table_model_id", "related_logic_table_id"),
    ("related_logic_model_id", "related_logic_table_model_id"),
    ("owner", "owner"),
    ("table_type", "table_type"),
    ("compression", "compression"),
    ("code", "code"),
    ("distribute", "distribute"),
    ("distribute_column", "distribute_column"),
    ("parent_table_name", "parent_table_name"),
    ("parent_table_code", "parent_table_code"),
    ("related_logic_model_name", "related_logic_table_model_name"),
    ("related_logic_table_model_name", "related_logic_table_name"),
    ("data_format", "data_format"),
    ("dlf_task_id", "dlf_task_id"),
    ("db_name", "db_name"),
    ("queue_name", "queue_name"),
    ("schema", "schema"),
    ("obs_location", "obs_location"),
    ("dw_name", "dw_name"),
    ("dirty_out_database", "dirty_out_database"),
    ("dirty_out_prefix", "dirty_out_prefix"),
    ("dirty_out_suffix", "dirty_out_suffix"),
    ("partition_conf", "partition_conf"),
    ("extend_info", "extend_info"),
    ("tb_guid", "tb_guid"),
    ("logic_tb_guid", "logic_tb_guid"),
    ("status", "status"),
    ("catalog_path", "catalog_path"),
    ("created_at", "create_time"),
    ("updated_at", "update_time"),
    ("created_by", "create_by"),
    ("updated_by", "update_by"),
    ("physical_table_status", "physical_table"),
    ("dev_physical_table_status", "dev_physical_table"),
    ("technical_asset_status", "technical_asset"),
    ("business_asset_status", "business_asset"),
    ("meta_data_link_status", "meta_data_link"),
    ("data_quality_status", "data_quality"),
    ("summary_status", "summary_status"),
    ("env_type", "env_type"),
];

const READ_FLAGS: &[&str] = &[
    "use_recently_partition",
    "reversed",
    "dirty_out_switch",
    "has_related_physical_table",
    "has_related_logic_table",
    "is_partition",
];

const ATTRIBUTE_FLAGS: &[&str] = &[
    "is_primary_key",
    "is_partition_key",
    "is_foreign_key",
    "not_null",
    "extend_field",
];

pub struct ArchitectureTableModel;

/// Schema of one table model attribute (column).
pub(super) fn attribute_block() -> Block {
    let mut block = Block::new()
        .with_attribute("name", Attribute::required_string().with_description("The Chinese name of the attribute"))
        .with_attribute("name_en", Attribute::required_string())
        .with_attribute("data_type", Attribute::required_string())
        .with_attribute("data_type_extend", Attribute::optional_string())
        .with_attribute("description", Attribute::optional_string())
        .with_attribute("stand_row_id", Attribute::optional_string())
        .with_attribute("related_logic_attr_id", Attribute::optional_string());
    for name in ["stand_row_name", "related_logic_attr_name", "related_logic_attr_name_en", "code"] {
        block = block.with_attribute(name, Attribute::optional_computed_string());
    }
    for name in ATTRIBUTE_FLAGS {
        block = block.with_attribute(*name, Attribute::optional_computed_bool());
    }
    block
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("ordinal", Attribute::computed_int64())
        .with_attribute("domain_type", Attribute::computed_string())
        .with_attribute("created_at", Attribute::computed_string())
        .with_attribute("updated_at", Attribute::computed_string())
}

/// Flatten the attributes of a table model. Attributes carrying a
/// `table_model_id` belong to a related table and are skipped. Ordinals are
/// renumbered from 1.
fn flatten_attributes(model: &Value) -> Value {
    let own = path_search_array("attributes", model).iter().filter(|a| {
        a.get("table_model_id")
            .and_then(Value::as_str)
            .map_or(true, str::is_empty)
    });
    Value::Array(
        own.enumerate()
            .map(|(i, a)| {
                let mut flat = pick(
                    a,
                    &[
                        ("id", "id"),
                        ("name", "name_ch"),
                        ("name_en", "name_en"),
                        ("data_type", "data_type"),
                        ("data_type_extend", "data_type_extend"),
                        ("description", "description"),
                        ("stand_row_id", "stand_row_id"),
                        ("stand_row_name", "stand_row_name"),
                        ("related_logic_attr_id", "related_logic_attr_id"),
                        ("related_logic_attr_name", "related_logic_attr_name"),
                        ("related_logic_attr_name_en", "related_logic_attr_name_en"),
                        ("code", "code"),
                        ("domain_type", "domain_type"),
                        ("created_at", "create_time"),
                        ("updated_at", "update_time"),
                    ],
                );
                for name in ATTRIBUTE_FLAGS {
                    flat[*name] = Value::Bool(field(a, name).as_bool().unwrap_or(false));
                }
                flat["ordinal"] = json!(i + 1);
                flat
            })
            .collect(),
    )
}

fn relation_block() -> Block {
    let mapping = Block::new()
        .with_attribute("source_field_id", Attribute::optional_computed_string())
        .with_attribute("source_field_name", Attribute::optional_computed_string())
        .with_attribute("target_field_id", Attribute::optional_computed_string())
        .with_attribute("target_field_name", Attribute::optional_computed_string());
    let block = Block::new()
        .with_attribute("name", Attribute::required_string())
        .with_attribute("source_type", Attribute::required_string())
        .with_attribute("target_type", Attribute::required_string())
        .with_attribute("role", Attribute::optional_string())
        .with_attribute("source_table_id", Attribute::optional_computed_string())
        .with_attribute("source_table_name", Attribute::optional_computed_string())
        .with_attribute("target_table_id", Attribute::optional_computed_string())
        .with_attribute("target_table_name", Attribute::optional_computed_string())
        .with_block("mappings", NestedBlock::list(with_audit(mapping)).required());
    with_audit(block)
}

fn mapping_block() -> Block {
    let join_field = Block::new()
        .with_attribute("field1_id", Attribute::required_string())
        .with_attribute("field2_id", Attribute::required_string())
        .with_attribute("field1_name", Attribute::optional_computed_string())
        .with_attribute("field2_name", Attribute::optional_computed_string());
    let source_table = Block::new()
        .with_attribute("table1_id", Attribute::required_string())
        .with_attribute("table2_id", Attribute::optional_computed_string())
        .with_attribute("table1_name", Attribute::optional_computed_string())
        .with_attribute("table2_name", Attribute::optional_computed_string())
        .with_attribute("join_type", Attribute::optional_computed_string())
        .with_block("join_fields", NestedBlock::list(join_field));
    let source_field = Block::new()
        .with_attribute("field_ids", Attribute::optional_string())
        .with_attribute("field_names", Attribute::string_list(AttributeFlags::optional()))
        .with_attribute("target_field_name", Attribute::optional_string())
        .with_attribute("transform_expression", Attribute::optional_string())
        .with_attribute("changed", Attribute::computed_bool());
    let block = Block::new()
        .with_attribute("name", Attribute::required_string())
        .with_attribute("src_model_id", Attribute::optional_computed_string())
        .with_attribute("src_model_name", Attribute::optional_computed_string())
        .with_attribute("view_text", Attribute::optional_computed_string())
        .with_block("source_tables", NestedBlock::list(source_table).required())
        .with_block("source_fields", NestedBlock::list(source_field));
    with_audit(block)
}

/// Add the computed `id` and audit fields every relation and mapping carries.
fn with_audit(block: Block) -> Block {
    ["id", "created_at", "updated_at", "created_by", "updated_by"]
        .into_iter()
        .fold(block, |b, name| b.with_attribute(name, Attribute::computed_string()))
}

const AUDIT_FIELDS: &[(&str, &str)] = &[
    ("id", "id"),
    ("created_at", "create_time"),
    ("updated_at", "update_time"),
    ("created_by", "create_by"),
    ("updated_by", "update_by"),
];

fn pick_with_audit(source: &Value, fields: &[(&str, &str)]) -> Value {
    let mut out = pick(source, fields);
    if let (Value::Object(out), Value::Object(audit)) = (&mut out, pick(source, AUDIT_FIELDS)) {
        out.extend(audit);
    }
    out
}

fn flatten_relations(model: &Value) -> Value {
    Value::Array(
        path_search_array("relations", model)
            .iter()
            .map(|r| {
                let mut flat = pick_with_audit(
                    r,
                    &[
                        ("name", "name"),
                        ("source_type", "source_type"),
                        ("target_type", "target_type"),
                        ("role", "role"),
                        ("source_table_id", "source_table_id"),
                        ("source_table_name", "source_table_name"),
                        ("target_table_id", "target_table_id"),
                        ("target_table_name", "target_table_name"),
                    ],
                );
                flat["mappings"] = Value::Array(
                    path_search_array("mappings", r)
                        .iter()
                        .map(|m| {
                            pick_with_audit(
                                m,
                                &[
                                    ("source_field_id", "source_field_id"),
                                    ("source_field_name", "source_field_name"),
                                    ("target_field_id", "target_field_id"),
                                    ("target_field_name", "target_field_name"),
                                ],
                            )
                        })
                        .collect(),
                );
                flat
            })
            .collect(),
    )
}

fn flatten_mappings(model: &Value) -> Value {
    Value::Array(
        path_search_array("mappings", model)
            .iter()
            .map(|m| {
                let mut flat = pick_with_audit(
                    m,
                    &[
                        ("name", "name"),
                        ("src_model_id", "src_model_id"),
                        ("src_model_name", "src_model_name"),
                        ("view_text", "view_text"),
                    ],
                );
                flat["source_tables"] = Value::Array(
                    path_search_array("source_tables", m)
                        .iter()
                        .map(|t| {
                            let mut table = pick(
                                t,
                                &[
                                    ("table1_id", "table1_id"),
                                    ("table2_id", "table2_id"),
                                    ("table1_name", "table1_name"),
                                    ("table2_name", "table2_name"),
                                    ("join_type", "join_type"),
                                ],
                            );
                            table["join_fields"] = Value::Array(
                                path_search_array("join_fields", t)
                                    .iter()
                                    .map(|f| {
                                        pick(
                                            f,
                                            &[
                                                ("field1_id", "field1_id"),
                                                ("field2_id", "field2_id"),
                                                ("field1_name", "field1_name"),
                                                ("field2_name", "field2_name"),
                                            ],
                                        )
                                    })
                                    .collect(),
                            );
                            table
                        })
                        .collect(),
                );
                flat["source_fields"] = Value::Array(
                    path_search_array("source_fields", m)
                        .iter()
                        .map(|f| {
                            let mut source = pick(
                                f,
                                &[
                                    ("field_ids", "field_ids"),
                                    ("field_names", "field_names"),
                                    ("target_field_name", "target_field_name"),
                                    ("transform_expression", "transform_expression"),
                                ],
                            );
                            source["changed"] = Value::Bool(field(f, "changed").as_bool().unwrap_or(false));
                            source
                        })
                        .collect(),
                );
                flat
            })
            .collect(),
    )
}

/// Copy `keys` from `raw`, dropping zero values.
fn ignore_empty(raw: &Value, keys: &[(&str, &str)]) -> Map<String, Value> {
    keys.iter()
        .map(|(from, to)| (to.to_string(), value_ignore_empty(raw.get(*from))))
        .collect()
}

fn attributes_body(data: &ResourceData) -> Value {
    Value::Array(
        data.get_list("attributes")
            .iter()
            .enumerate()
            .map(|(i, a)| {
                let mut body = ignore_empty(
                    a,
                    &[
                        ("data_type_extend", "data_type_extend"),
                        ("description", "description"),
                        ("stand_row_id", "stand_row_id"),
                        ("stand_row_name", "stand_row_name"),
                        ("related_logic_attr_id", "related_logic_attr_id"),
                        ("related_logic_attr_name", "related_logic_attr_name"),
                        ("related_logic_attr_name_en", "related_logic_attr_name_en"),
                        ("is_partition_key", "is_partition_key"),
                        ("is_primary_key", "is_primary_key"),
                        ("is_foreign_key", "is_foreign_key"),
                        ("extend_field", "extend_field"),
                        ("not_null", "not_null"),
                        ("code", "code"),
                    ],
                );
                body.insert("name_ch".to_string(), field(a, "name"));
                body.insert("name_en".to_string(), field(a, "name_en"));
                body.insert("data_type".to_string(), field(a, "data_type"));
                body.insert("ordinal".to_string(), json!(i + 1));
                Value::Object(body)
            })
            .collect(),
    )
}

fn relations_body(data: &ResourceData) -> Value {
    Value::Array(
        data.get_list("relations")
            .iter()
            .map(|r| {
                let mut body = ignore_empty(
                    r,
                    &[
                        ("source_table_id", "source_table_id"),
                        ("source_table_name", "source_table_name"),
                        ("source_type", "source_type"),
                        ("target_table_id", "target_table_id"),
                        ("target_table_name", "target_table_name"),
                        ("target_type", "target_type"),
                        ("role", "role"),
                    ],
                );
                body.insert("name".to_string(), field(r, "name"));
                let mappings: Vec<Value> = path_search_array("mappings", r)
                    .iter()
                    .map(|m| {
                        Value::Object(ignore_empty(
                            m,
                            &[
                                ("source_field_id", "source_field_id"),
                                ("source_field_name", "source_field_name"),
                                ("target_field_id", "target_field_id"),
                                ("target_field_name", "target_field_name"),
                            ],
                        ))
                    })
                    .collect();
                body.insert("mappings".to_string(), value_ignore_empty(Some(&Value::Array(mappings))));
                Value::Object(body)
            })
            .collect(),
    )
}

fn mappings_body(data: &ResourceData) -> Value {
    Value::Array(
        data.get_list("mappings")
            .iter()
            .map(|m| {
                let mut body = ignore_empty(m, &[("src_model_name", "src_model_name"), ("view_text", "view_text")]);
                body.insert("name".to_string(), field(m, "name"));
                body.insert("src_model_id".to_string(), field(m, "src_model_id"));

                let tables: Vec<Value> = path_search_array("source_tables", m)
                    .iter()
                    .map(|t| {
                        let mut table = ignore_empty(
                            t,
                            &[
                                ("join_type", "join_type"),
                                ("table1_id", "table1_id"),
                                ("table2_id", "table2_id"),
                                ("table1_name", "table1_name"),
                                ("table2_name", "table2_name"),
                            ],
                        );
                        let joins: Vec<Value> = path_search_array("join_fields", t)
                            .iter()
                            .map(|f| {
                                Value::Object(ignore_empty(
                                    f,
                                    &[
                                        ("field1_id", "field1_id"),
                                        ("field2_id", "field2_id"),
                                        ("field1_name", "field1_name"),
                                        ("field2_name", "field2_name"),
                                    ],
                                ))
                            })
                            .collect();
                        table.insert("join_fields".to_string(), value_ignore_empty(Some(&Value::Array(joins))));
                        Value::Object(table)
                    })
                    .collect();
                body.insert("source_tables".to_string(), value_ignore_empty(Some(&Value::Array(tables))));

                let fields: Vec<Value> = path_search_array("source_fields", m)
                    .iter()
                    .map(|f| {
                        Value::Object(ignore_empty(
                            f,
                            &[
                                ("field_ids", "field_ids"),
                                ("field_names", "field_names"),
                                ("target_field_name", "target_field_name"),
                                ("transform_expression", "transform_expression"),
                            ],
                        ))
                    })
                    .collect();
                body.insert("source_fields".to_string(), value_ignore_empty(Some(&Value::Array(fields))));
                Value::Object(body)
            })
            .collect(),
    )
}

fn model_body(data: &ResourceData) -> Value {
    let mut body = Map::new();
    for (attr, key) in [
        ("model_id", "model_id"),
        ("dw_type", "dw_type"),
        ("subject_id", "biz_catalog_id"),
        ("physical_table_name", "tb_name"),
        ("table_name", "logic_tb_name"),
        ("description", "description"),
    ] {
        body.insert(key.to_string(), data.get(attr).cloned().unwrap_or(Value::Null));
    }
    for (attr, key) in OPTIONAL_SETTINGS {
        body.insert(key.to_string(), value_ignore_empty(data.get(attr)));
    }
    body.insert(
        "reversed".to_string(),
        Value::Bool(data.get_bool("reversed").unwrap_or(false)),
    );
    body.insert("attributes".to_string(), value_ignore_empty(Some(&attributes_body(data))));
    body.insert("relations".to_string(), value_ignore_empty(Some(&relations_body(data))));
    body.insert("mappings".to_string(), value_ignore_empty(Some(&mappings_body(data))));
    remove_nil(Value::Object(body))
}

async fn get_table_model(svc: &ServiceClient, data: &ResourceData) -> Result<Value, ProviderError> {
    svc.get(
        &format!("{}/{}", TABLE_MODEL_PATH, data.id()),
        workspace_opts(data)?.query("latest", "true"),
    )
    .await
    .map_err(|e| convert_expected_400_into_404(e, NOT_FOUND_CODE_PATH, NOT_FOUND_CODES))
}

#[async_trait]
impl Resource for ArchitectureTableModel {
    fn type_name(&self) -> &'static str {
        "dataarts_architecture_table_model"
    }

    fn schema(&self) -> Schema {
        let mut schema = workspace_resource_schema("Manages a DataArts Architecture table model")
            .with_attribute("model_id", Attribute::required_string().with_force_new())
            .with_attribute("dw_type", Attribute::required_string().with_force_new())
            .with_attribute("subject_id", Attribute::required_string())
            .with_attribute("physical_table_name", Attribute::required_string())
            .with_attribute("table_name", Attribute::required_string())
            .with_attribute("description", Attribute::required_string())
            .with_attribute("del_type", Attribute::optional_string())
            .with_block("attributes", NestedBlock::set(attribute_block()).required())
            .with_block("relations", NestedBlock::list(relation_block()))
            .with_block("mappings", NestedBlock::list(mapping_block()));
        for name in [
            "configs",
            "dw_id",
            "db_name",
            "queue_name",
            "schema",
            "obs_location",
            "parent_table_id",
            "related_logic_table_model_id",
            "related_logic_model_id",
            "owner",
            "dirty_out_database",
            "dirty_out_prefix",
            "dirty_out_suffix",
            "partition_conf",
        ] {
            schema = schema.with_attribute(name, Attribute::optional_string());
        }
        for name in [
            "table_type",
            "compression",
            "code",
            "distribute",
            "distribute_column",
            "data_format",
            "dlf_task_id",
            "parent_table_name",
            "related_logic_model_name",
            "related_logic_table_model_name",
            "dw_name",
        ] {
            schema = schema.with_attribute(name, Attribute::optional_computed_string());
        }
        for name in ["dirty_out_switch", "use_recently_partition", "reversed"] {
            schema = schema.with_attribute(name, Attribute::optional_computed_bool());
        }
        for name in [
            "parent_table_code",
            "extend_info",
            "tb_guid",
            "logic_tb_guid",
            "status",
            "catalog_path",
            "physical_table_status",
            "dev_physical_table_status",
            "technical_asset_status",
            "business_asset_status",
            "meta_data_link_status",
            "data_quality_status",
            "summary_status",
            "env_type",
            "created_by",
            "updated_by",
            "created_at",
            "updated_at",
        ] {
            schema = schema.with_attribute(name, Attribute::computed_string());
        }
        for name in ["is_partition", "has_related_physical_table", "has_related_logic_table"] {
            schema = schema.with_attribute(name, Attribute::computed_bool());
        }
        schema
    }

    async fn create(&self, client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let resp = svc
            .post(TABLE_MODEL_PATH, workspace_opts(data)?.body(model_body(data)))
            .await
            .map_err(|e| e.context("error creating DataArts Architecture table model"))?;
        let id = path_search("data.value.id", &resp)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ProviderError::Sdk("unable to find the table model ID from the API response".to_string())
            })?;
        data.set_id(id);
        Ok(())
    }

    async fn read(&self, client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
        let region = super::common::region(client, data)?;
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let resp = get_table_model(&svc, data).await?;
        let model = field(&resp, "data.value");

        data.set("region", Value::String(region));
        set_fields(data, &model, READ_FIELDS);
        for name in READ_FLAGS {
            data.set(*name, Value::Bool(field(&model, name).as_bool().unwrap_or(false)));
        }
        data.set("attributes", flatten_attributes(&model));
        data.set("relations", flatten_relations(&model));
        data.set("mappings", flatten_mappings(&model));
        Ok(())
    }

    async fn update(
        &self,
        client: &Client,
        _prior: &ResourceData,
        data: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let mut body = model_body(data);
        body["id"] = Value::String(data.id().to_string());
        svc.put(TABLE_MODEL_PATH, workspace_opts(data)?.body(body))
            .await
            .map_err(|e| e.context("error updating DataArts Architecture table model"))?;
        Ok(())
    }

    async fn delete(&self, client: &Client, data: &ResourceData) -> Result<(), ProviderError> {
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let body = remove_nil(json!({
            "ids": [data.id()],
            "del_type": value_ignore_empty(data.get("del_type")),
        }));
        let resp = svc
            .delete(TABLE_MODEL_PATH, workspace_opts(data)?.body(body))
            .await
            .map_err(|e| e.context("error deleting DataArts Architecture table model"))?;

        // The API answers 1 when the model was deleted and 0 when it was
        // already gone.
        if path_search("data.value", &resp).and_then(Value::as_i64) != Some(1) {
            tracing::debug!(id = %data.id(), "table model was already deleted");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ResourceData {
        ResourceData::new(json!({
            "id": "tm-1",
            "workspace_id": "ws",
            "model_id": "m-1",
            "dw_type": "DLI",
            "subject_id": "s-1",
            "physical_table_name": "t_orders",
            "table_name": "orders",
            "description": "orders table",
            "related_logic_model_id": "lm-1",
            "owner": "",
            "attributes": [
                {"name": "order id", "name_en": "order_id", "data_type": "BIGINT", "is_primary_key": true, "not_null": false},
                {"name": "amount", "name_en": "amount", "data_type": "DECIMAL", "description": ""}
            ],
            "relations": [],
            "mappings": [{
                "name": "m",
                "src_model_id": "src",
                "source_tables": [{"table1_id": "t1", "join_fields": []}],
                "source_fields": [{"field_ids": "f1", "field_names": ["a"], "target_field_name": "amount"}]
            }]
        }))
    }

    #[test]
    fn test_model_body_renames_and_drops_empty() {
        let body = model_body(&state());
        assert_eq!(body["biz_catalog_id"], "s-1");
        assert_eq!(body["tb_name"], "t_orders");
        assert_eq!(body["logic_tb_name"], "orders");
        assert_eq!(body["related_logic_table_model_id"], "lm-1");
        assert_eq!(body["reversed"], false);
        assert!(body.get("owner").is_none());
        assert!(body.get("relations").is_none());

        assert_eq!(
            body["attributes"][0],
            json!({"name_ch": "order id", "name_en": "order_id", "data_type": "BIGINT", "ordinal": 1, "is_primary_key": true})
        );
        assert_eq!(body["mappings"][0]["source_tables"], json!([{"table1_id": "t1"}]));
        assert_eq!(body["mappings"][0]["source_fields"][0]["field_names"], json!(["a"]));
    }

    #[test]
    fn test_flatten_attributes_skips_owned_by_a_table() {
        let model = json!({"attributes": [
            {"id": "a1", "name_ch": "x", "table_model_id": "other"},
            {"id": "a2", "name_ch": "y", "table_model_id": "tm-1"},
            {"id": "a3", "name_ch": "w", "table_model_id": "", "is_primary_key": true},
            {"id": "a4", "name_ch": "z", "create_time": "t"}
        ]});
        let flat = flatten_attributes(&model);
        let ids: Vec<_> = flat.as_array().unwrap().iter().map(|a| a["id"].clone()).collect();
        assert_eq!(ids, vec![json!("a3"), json!("a4")]);
        assert_eq!(flat[0]["ordinal"], 1);
        assert_eq!(flat[0]["is_primary_key"], true);
        assert_eq!(flat[1]["not_null"], false);
        assert_eq!(flat[1]["created_at"], "t");
    }

    #[test]
    fn test_flatten_relations_and_mappings() {
        let model = json!({
            "relations": [{"name": "r", "source_type": "ONE", "create_by": "bob",
                "mappings": [{"source_field_id": "f1", "id": "m1"}]}],
            "mappings": [{"name": "m", "source_tables": [{"table1_id": "t1",
                "join_fields": [{"field1_id": "a", "field2_id": "b"}]}],
                "source_fields": [{"field_ids": "x", "changed": true}]}]
        });
        let relations = flatten_relations(&model);
        assert_eq!(relations[0]["created_by"], "bob");
        assert_eq!(relations[0]["mappings"][0]["id"], "m1");

        let mappings = flatten_mappings(&model);
        assert_eq!(mappings[0]["source_tables"][0]["join_fields"][0]["field2_id"], "b");
        assert_eq!(mappings[0]["source_fields"][0]["changed"], true);
    }
}
