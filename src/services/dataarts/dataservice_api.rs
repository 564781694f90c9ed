//! `dataarts_dataservice_api`
//!
//! A DataService API publishes a query over a data connection. Besides the
//! `workspace` header every call carries `Dlm-Type`, which selects the
//! shared or exclusive DataService edition.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::common::{field, flatten_array, opt_str, pick, service_client, workspace_resource_schema, WORKSPACE_HEADER};
use crate::client::{Client, RequestOpts, ServiceClient};
use crate::config::PRODUCT_DATAARTS;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema};
use crate::services::Resource;
use crate::state::ResourceData;
use crate::utils::{
    convert_expected_400_into_404, path_search, path_search_array, path_search_string, remove_nil, timestamp_value,
    value_ignore_empty,
};

pub(super) const APIS_PATH: &str = "v1/{project_id}/service/apis";
const BATCH_DELETE_PATH: &str = "v1/{project_id}/service/apis/batch-delete";
const CONNECTIONS_PATH: &str = "v1/{project_id}/data-connections";
const DATATABLE_PAGE_LIMIT: usize = 16;

const DLM_TYPE_HEADER: &str = "Dlm-Type";
pub(super) const DEFAULT_DLM_TYPE: &str = "SHARED";

pub(super) const NOT_FOUND_CODE_PATH: &str = "error_code";
pub(super) const READ_NOT_FOUND_CODES: &[&str] = &[
    "DLM.4001", // workspace not found
    "DLM.4018", // API not found
];
const DELETE_NOT_FOUND_CODES: &[&str] = &[
    "DLM.4001", // workspace not found
    "DLM.4197", // API not found
];

pub struct DataServiceApi;

/// Request options for a workspace and DataService edition.
pub(super) fn api_opts(workspace_id: &str, dlm_type: &str) -> RequestOpts {
    RequestOpts::new()
        .header(WORKSPACE_HEADER, workspace_id)
        .header(DLM_TYPE_HEADER, dlm_type)
}

fn dlm_type(data: &ResourceData) -> &str {
    data.get_str("dlm_type")
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_DLM_TYPE)
}

fn opts(data: &ResourceData) -> Result<RequestOpts, ProviderError> {
    Ok(api_opts(data.require_str("workspace_id")?, dlm_type(data)))
}

pub(super) fn request_param_block() -> Block {
    Block::new()
        .with_attribute("name", Attribute::required_string().with_description("The parameter name"))
        .with_attribute("position", Attribute::required_string())
        .with_attribute("type", Attribute::required_string())
        .with_attribute("description", Attribute::optional_string())
        .with_attribute("necessary", Attribute::optional_bool().with_default(json!(false)))
        .with_attribute("example_value", Attribute::optional_string())
        .with_attribute("default_value", Attribute::optional_string())
}

pub(super) fn datasource_config_block() -> Block {
    let backend_param = Block::new()
        .with_attribute("name", Attribute::required_string())
        .with_attribute("mapping", Attribute::required_string())
        .with_attribute("condition", Attribute::optional_computed_string());
    let response_param = Block::new()
        .with_attribute("name", Attribute::required_string())
        .with_attribute("type", Attribute::required_string())
        .with_attribute("field", Attribute::required_string())
        .with_attribute("description", Attribute::optional_string())
        .with_attribute("example_value", Attribute::optional_string());
    let order_param = Block::new()
        .with_attribute("name", Attribute::required_string())
        .with_attribute("field", Attribute::required_string())
        .with_attribute("optional", Attribute::optional_computed_bool())
        .with_attribute("sort", Attribute::optional_computed_string())
        .with_attribute("order", Attribute::optional_computed_int64());
    Block::new()
        .with_attribute("type", Attribute::required_string().with_description("The data source type"))
        .with_attribute("connection_id", Attribute::optional_string())
        .with_attribute("database", Attribute::required_string())
        .with_attribute("datatable", Attribute::required_string())
        .with_attribute("queue", Attribute::optional_computed_string())
        .with_attribute("access_mode", Attribute::optional_computed_string())
        .with_attribute("sql", Attribute::optional_string())
        .with_attribute("connection_name", Attribute::optional_computed_string())
        .with_attribute("table_id", Attribute::optional_computed_string())
        .with_block("backend_params", NestedBlock::set(backend_param))
        .with_block("response_params", NestedBlock::set(response_param))
        .with_block("order_params", NestedBlock::set(order_param))
}

pub(super) fn backend_config_block() -> Block {
    let backend_param = Block::new()
        .with_attribute("name", Attribute::required_string())
        .with_attribute("position", Attribute::required_string())
        .with_attribute("backend_param_name", Attribute::required_string());
    let constant_param = Block::new()
        .with_attribute("name", Attribute::required_string())
        .with_attribute("type", Attribute::required_string())
        .with_attribute("position", Attribute::required_string())
        .with_attribute("value", Attribute::required_string())
        .with_attribute("description", Attribute::optional_computed_string());
    Block::new()
        .with_attribute("type", Attribute::required_string())
        .with_attribute("protocol", Attribute::required_string())
        .with_attribute("host", Attribute::required_string())
        .with_attribute("path", Attribute::required_string())
        .with_attribute("timeout", Attribute::optional_computed_int64())
        .with_block("backend_params", NestedBlock::set(backend_param))
        .with_block("constant_params", NestedBlock::set(constant_param))
}

pub(super) fn host_block() -> Block {
    ["instance_id", "instance_name", "intranet_host", "external_host"]
        .into_iter()
        .fold(Block::new(), |b, name| b.with_attribute(name, Attribute::computed_string()))
        .with_attribute("domains", Attribute::string_list(AttributeFlags::computed()))
}

/// Map each element of `items` through `f`, or `null` for an empty list.
fn params_body(items: Option<&Value>, f: impl Fn(&Value) -> Value) -> Value {
    match items.and_then(Value::as_array) {
        Some(items) if !items.is_empty() => Value::Array(items.iter().map(f).collect()),
        _ => Value::Null,
    }
}

fn request_params_body(data: &ResourceData) -> Value {
    params_body(data.get("request_params"), |p| {
        json!({
            "name": field(p, "name"),
            "position": field(p, "position"),
            "type": field(p, "type"),
            "description": field(p, "description"),
            "necessary": field(p, "necessary").as_bool().unwrap_or(false),
            "example_value": field(p, "example_value"),
            "default_value": field(p, "default_value"),
        })
    })
}

/// The data source part of the request body. `connection_name` and
/// `table_id` are passed through when known.
fn datasource_config_body(config: &Value) -> Value {
    json!({
        "type": field(config, "type"),
        "connection_id": field(config, "connection_id"),
        "connection_name": opt_str(config.get("connection_name")),
        "database": field(config, "database"),
        "datatable": field(config, "datatable"),
        "table_id": opt_str(config.get("table_id")),
        "queue": value_ignore_empty(config.get("queue")),
        "access_mode": value_ignore_empty(config.get("access_mode")),
        "pagination": "DEFAULT",
        "sql": value_ignore_empty(config.get("sql")),
        "backend_paras": params_body(config.get("backend_params"), |p| {
            pick(p, &[("name", "name"), ("mapping", "mapping"), ("condition", "condition")])
        }),
        "response_paras": params_body(config.get("response_params"), |p| {
            pick(
                p,
                &[
                    ("name", "name"),
                    ("type", "type"),
                    ("field", "field"),
                    ("description", "description"),
                    ("example_value", "example_value"),
                ],
            )
        }),
        "order_paras": params_body(config.get("order_params"), |p| {
            json!({
                "name": opt_str(p.get("name")),
                "field": opt_str(p.get("field")),
                "optional": field(p, "optional"),
                "sort": opt_str(p.get("sort")),
                "order": value_ignore_empty(p.get("order")),
            })
        }),
    })
}

fn backend_config_body(config: &Value) -> Value {
    json!({
        "type": opt_str(config.get("type")),
        "protocol": opt_str(config.get("protocol")),
        "host": opt_str(config.get("host")),
        "path": opt_str(config.get("path")),
        "timeout": value_ignore_empty(config.get("timeout")),
        "backend_paras": params_body(config.get("backend_params"), |p| {
            pick(p, &[("name", "name"), ("position", "position"), ("backend_para_name", "backend_param_name")])
        }),
        "constant_paras": params_body(config.get("constant_params"), |p| {
            pick(
                p,
                &[
                    ("name", "name"),
                    ("type", "type"),
                    ("position", "position"),
                    ("description", "description"),
                    ("value", "value"),
                ],
            )
        }),
    })
}

fn api_body(data: &ResourceData, datasource_config: Value) -> Value {
    remove_nil(json!({
        "catalog_id": data.get("catalog_id"),
        "name": data.get("name"),
        "api_type": data.get("type"),
        "auth_type": data.get("auth_type"),
        "protocol": data.get("protocol"),
        "path": data.get("path"),
        "request_type": data.get("request_type"),
        "manager": data.get("manager"),
        "datasource_config": datasource_config,
        "description": value_ignore_empty(data.get("description")),
        "visibility": value_ignore_empty(data.get("visibility")),
        "request_paras": request_params_body(data),
        "backend_config": data.get("backend_config").map(backend_config_body),
    }))
}

async fn get_connection(svc: &ServiceClient, workspace_id: &str, connection_id: &str) -> Result<Value, ProviderError> {
    svc.get(
        &format!("{}/{}", CONNECTIONS_PATH, connection_id),
        RequestOpts::new().header(WORKSPACE_HEADER, workspace_id),
    )
    .await
    .map_err(|e| e.context(format!("error querying DataArts Studio connection by its ID ({connection_id})")))
}

fn datatables_path(connection_id: &str) -> String {
    format!("v2/{{project_id}}/{}/datatables", connection_id)
}

async fn get_datatable_by_name(
    svc: &ServiceClient,
    workspace_id: &str,
    connection_id: &str,
    database: &str,
    table_name: &str,
) -> Result<Value, ProviderError> {
    let resp = svc
        .get(
            &datatables_path(connection_id),
            RequestOpts::new()
                .header(WORKSPACE_HEADER, workspace_id)
                .query("database_name", database)
                .query("table_name", table_name),
        )
        .await
        .map_err(|e| {
            e.context(format!("error querying data table by its name ({table_name}) under the database ({database})"))
        })?;
    Ok(field(&resp, "tables[0]"))
}

/// Page through the tables of a database looking for `table_id`.
async fn find_datatable_by_id(
    svc: &ServiceClient,
    workspace_id: &str,
    connection_id: &str,
    database: &str,
    table_id: &str,
) -> Result<Value, ProviderError> {
    let mut offset = 0usize;
    loop {
        let resp = svc
            .get(
                &datatables_path(connection_id),
                RequestOpts::new()
                    .header(WORKSPACE_HEADER, workspace_id)
                    .query("database_name", database)
                    .query("limit", DATATABLE_PAGE_LIMIT)
                    .query("offset", offset),
            )
            .await
            .map_err(|e| e.context(format!("error querying datatables ({table_id}) under the database ({database})")))?;
        let tables = path_search_array("tables", &resp);
        if tables.is_empty() {
            return Err(ProviderError::NotFound(format!("unable to find the datatable by its ID ({table_id})")));
        }
        if let Some(table) = tables
            .iter()
            .find(|t| t.get("table_id").and_then(Value::as_str) == Some(table_id))
        {
            return Ok(table.clone());
        }
        offset += tables.len();
    }
}

/// Build `datasource_config` for a request, looking up the connection name
/// and table ID when the configuration leaves them out. A failed lookup is
/// logged and the field is left unset.
async fn resolve_datasource_config(svc: &ServiceClient, workspace_id: &str, config: &Value) -> Value {
    let mut body = datasource_config_body(config);
    let connection_id = config.get("connection_id").and_then(Value::as_str).unwrap_or_default();

    if body["connection_name"].is_null() {
        match get_connection(svc, workspace_id, connection_id).await {
            Ok(connection) => body["connection_name"] = field(&connection, "dw_name"),
            Err(e) => tracing::error!("unable to build data source configuration: {}", e),
        }
    }
    if body["table_id"].is_null() {
        let database = config.get("database").and_then(Value::as_str).unwrap_or_default();
        let table_name = config.get("datatable").and_then(Value::as_str).unwrap_or_default();
        match get_datatable_by_name(svc, workspace_id, connection_id, database, table_name).await {
            Ok(table) => body["table_id"] = field(&table, "table_id"),
            Err(e) => tracing::error!("unable to build data source configuration: {}", e),
        }
    }
    body
}

/// Fetch an API by ID. Missing APIs come back as [`ProviderError::NotFound`].
pub(super) async fn get_api(
    svc: &ServiceClient,
    workspace_id: &str,
    dlm_type: &str,
    id: &str,
) -> Result<Value, ProviderError> {
    svc.get(&format!("{}/{}", APIS_PATH, id), api_opts(workspace_id, dlm_type))
        .await
        .map_err(|e| convert_expected_400_into_404(e, NOT_FOUND_CODE_PATH, READ_NOT_FOUND_CODES))
}

async fn flatten_datasource_config(svc: &ServiceClient, workspace_id: &str, config: &Value) -> Value {
    let mut flat = pick(
        config,
        &[
            ("type", "type"),
            ("connection_name", "connection_name"),
            ("connection_id", "connection_id"),
            ("database", "database"),
            ("datatable", "datatable"),
            ("table_id", "table_id"),
            ("queue", "queue"),
            ("access_mode", "access_mode"),
            ("sql", "sql"),
        ],
    );
    flat["backend_params"] = flatten_array(config, "backend_paras", |p| {
        pick(p, &[("name", "name"), ("mapping", "mapping"), ("condition", "condition")])
    });
    flat["response_params"] = flatten_array(config, "response_paras", |p| {
        pick(
            p,
            &[
                ("name", "name"),
                ("type", "type"),
                ("field", "field"),
                ("description", "description"),
                ("example_value", "example_value"),
            ],
        )
    });
    flat["order_params"] = flatten_array(config, "order_paras", |p| {
        pick(
            p,
            &[("name", "name"), ("field", "field"), ("optional", "optional"), ("sort", "sort"), ("order", "order")],
        )
    });

    // Older APIs only record the table ID.
    if flat["datatable"].as_str().map_or(true, str::is_empty) {
        let connection_id = path_search_string("connection_id", config).unwrap_or_default();
        let database = path_search_string("database", config).unwrap_or_default();
        let table_id = path_search_string("table_id", config).unwrap_or_default();
        match find_datatable_by_id(svc, workspace_id, &connection_id, &database, &table_id).await {
            Ok(table) => flat["datatable"] = field(&table, "table_name"),
            Err(e) => tracing::error!("error setting datatable name: {}", e),
        }
    }
    flat
}

fn flatten_backend_config(config: &Value) -> Value {
    let mut flat = pick(
        config,
        &[("type", "type"), ("protocol", "protocol"), ("host", "host"), ("timeout", "timeout"), ("path", "path")],
    );
    flat["backend_params"] = flatten_array(config, "backend_paras", |p| {
        pick(p, &[("name", "name"), ("position", "position"), ("backend_param_name", "backend_para_name")])
    });
    flat["constant_params"] = flatten_array(config, "constant_paras", |p| {
        pick(
            p,
            &[
                ("name", "name"),
                ("type", "type"),
                ("position", "position"),
                ("description", "description"),
                ("value", "value"),
            ],
        )
    });
    flat
}

fn flatten_request_params(api: &Value) -> Value {
    flatten_array(api, "request_paras", |p| {
        pick(
            p,
            &[
                ("name", "name"),
                ("position", "position"),
                ("type", "type"),
                ("description", "description"),
                ("necessary", "necessary"),
                ("example_value", "example_value"),
                ("default_value", "default_value"),
            ],
        )
    })
}

fn flatten_hosts(api: &Value) -> Value {
    flatten_array(api, "hosts", |h| {
        pick(
            h,
            &[
                ("instance_id", "instance_id"),
                ("instance_name", "instance_name"),
                ("intranet_host", "intranet_host"),
                ("external_host", "external_host"),
                ("domains", "domains"),
            ],
        )
    })
}

/// Flatten an API detail into its attribute values.
pub(super) async fn flatten_api(svc: &ServiceClient, workspace_id: &str, api: &Value) -> Map<String, Value> {
    let mut flat = Map::new();
    for name in ["name", "type", "description", "protocol", "path", "request_type", "manager"] {
        flat.insert(name.to_string(), field(api, name));
    }
    let datasource_config = match path_search("datasource_config", api) {
        Some(config) => flatten_datasource_config(svc, workspace_id, config).await,
        None => Value::Null,
    };
    flat.insert("datasource_config".to_string(), datasource_config);
    flat.insert("request_params".to_string(), flatten_request_params(api));
    flat.insert(
        "backend_config".to_string(),
        path_search("backend_config", api).map_or(Value::Null, flatten_backend_config),
    );
    flat.insert("create_user".to_string(), field(api, "create_user"));
    flat.insert("created_at".to_string(), timestamp_value(path_search("create_time", api)));
    flat.insert("updated_at".to_string(), timestamp_value(path_search("update_time", api)));
    for name in ["group_id", "status", "host"] {
        flat.insert(name.to_string(), field(api, name));
    }
    flat.insert("hosts".to_string(), flatten_hosts(api));
    flat
}

#[async_trait]
impl Resource for DataServiceApi {
    fn type_name(&self) -> &'static str {
        "dataarts_dataservice_api"
    }

    fn schema(&self) -> Schema {
        let mut schema = workspace_resource_schema("Manages a DataArts DataService API")
            .with_attribute(
                "dlm_type",
                Attribute::optional_string()
                    .with_default(json!(DEFAULT_DLM_TYPE))
                    .with_force_new()
                    .with_description("The DataService edition, SHARED or EXCLUSIVE"),
            )
            .with_block("datasource_config", NestedBlock::single(datasource_config_block()).required())
            .with_block("request_params", NestedBlock::set(request_param_block()))
            .with_block("backend_config", NestedBlock::single(backend_config_block()).optional_computed())
            .with_block("hosts", NestedBlock::list(host_block()).computed());
        for name in ["catalog_id", "name", "type", "auth_type", "protocol", "path", "request_type", "manager"] {
            schema = schema.with_attribute(name, Attribute::required_string());
        }
        for name in ["description", "visibility"] {
            schema = schema.with_attribute(name, Attribute::optional_string());
        }
        for name in ["create_user", "created_at", "updated_at", "group_id", "status", "host"] {
            schema = schema.with_attribute(name, Attribute::computed_string());
        }
        schema
    }

    async fn create(&self, client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let workspace_id = data.require_str("workspace_id")?;
        let datasource_config = match data.get("datasource_config") {
            Some(config) => resolve_datasource_config(&svc, workspace_id, config).await,
            None => Value::Null,
        };
        let resp = svc
            .post(APIS_PATH, opts(data)?.body(api_body(data, datasource_config)))
            .await
            .map_err(|e| e.context("error creating API"))?;

        let id = path_search("id", &resp)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ProviderError::Sdk("unable to find the DataArts DataService API ID from the API response".to_string())
            })?;
        data.set_id(id);
        Ok(())
    }

    async fn read(&self, client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
        let region = super::common::region(client, data)?;
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let workspace_id = data.require_str("workspace_id")?.to_string();
        let api = get_api(&svc, &workspace_id, dlm_type(data), data.id()).await?;

        data.set("region", Value::String(region));
        for (name, value) in flatten_api(&svc, &workspace_id, &api).await {
            data.set(name, value);
        }
        Ok(())
    }

    async fn update(
        &self,
        client: &Client,
        _prior: &ResourceData,
        data: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let workspace_id = data.require_str("workspace_id")?;
        let datasource_config = match data.get("datasource_config") {
            Some(config) => resolve_datasource_config(&svc, workspace_id, config).await,
            None => Value::Null,
        };
        svc.put(
            &format!("{}/{}", APIS_PATH, data.id()),
            opts(data)?
                .body(api_body(data, datasource_config))
                .ok_codes(&[204]),
        )
        .await
        .map_err(|e| e.context(format!("error updating API ({})", data.id())))?;
        Ok(())
    }

    async fn delete(&self, client: &Client, data: &ResourceData) -> Result<(), ProviderError> {
        let svc = service_client(client, data, PRODUCT_DATAARTS)?;
        let workspace_id = data.require_str("workspace_id")?;
        let _guard = client.mutex_kv().lock(workspace_id).await;
        svc.post(BATCH_DELETE_PATH, opts(data)?.body(json!([data.id()])).ok_codes(&[204]))
            .await
            .map_err(|e| convert_expected_400_into_404(e, NOT_FOUND_CODE_PATH, DELETE_NOT_FOUND_CODES))?;
        Ok(())
    }

    fn import_format(&self) -> &'static str {
        "<workspace_id>/<id>' or '<workspace_id>/<dlm_type>/<id>"
    }

    async fn import(&self, _client: &Client, id: &str) -> Result<ResourceData, ProviderError> {
        let parts: Vec<&str> = id.split('/').collect();
        let (workspace_id, dlm_type, api_id) = match parts.as_slice() {
            [ws, api] => (*ws, DEFAULT_DLM_TYPE, *api),
            [ws, dlm, api] => (*ws, *dlm, *api),
            _ => ("", "", ""),
        };
        if [workspace_id, dlm_type, api_id].iter().any(|p| p.is_empty()) {
            return Err(ProviderError::InvalidRequest(format!(
                "invalid format of import ID, want '{}', but got '{}'",
                self.import_format(),
                id
            )));
        }
        let mut data = ResourceData::default();
        data.set("workspace_id", workspace_id.into());
        data.set("dlm_type", dlm_type.into());
        data.set_id(api_id);
        Ok(data)
    }
}
