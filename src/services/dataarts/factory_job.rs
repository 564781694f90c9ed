//! `dataarts_factory_job`
//!
//! Jobs live on the DataArts Factory (`dataarts-dlf`) endpoint. The job
//! name doubles as the resource ID and the wire format uses camelCase keys,
//! so every block is described by an `(attribute, wire key)` table and
//! converted in both directions with [`to_wire`] and [`pick`].

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::common::{as_int, field, pick, resource_schema, service_client, WORKSPACE_HEADER};
use crate::client::{Client, RequestOpts};
use crate::config::PRODUCT_DATAARTS_DLF;
use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema};
use crate::services::Resource;
use crate::state::ResourceData;
use crate::utils::{convert_expected_400_into_404, path_search_array, remove_nil, value_ignore_empty};

const JOBS_PATH: &str = "v1/{project_id}/jobs";
const NOT_FOUND_CODE_PATH: &str = "error_code";
const NOT_FOUND_CODES: &[&str] = &["DLF.0100"];

const NODE_FIELDS: &[(&str, &str)] = &[
    ("name", "name"),
    ("type", "type"),
    ("pre_node_name", "preNodeName"),
    ("polling_interval", "pollingInterval"),
    ("max_execution_time", "maxExecutionTime"),
    ("retry_times", "retryTimes"),
    ("retry_interval", "retryInterval"),
    ("fail_policy", "failPolicy"),
];
const CONDITION_FIELDS: &[(&str, &str)] = &[("pre_node_name", "preNodeName"), ("expression", "expression")];
const PROPERTY_FIELDS: &[(&str, &str)] = &[("name", "name"), ("value", "value")];
const EVENT_FIELDS: &[(&str, &str)] = &[
    ("event_type", "eventType"),
    ("channel", "channel"),
    ("fail_policy", "failPolicy"),
    ("concurrent", "concurrent"),
    ("read_policy", "readPolicy"),
];
const CRON_TRIGGER_FIELDS: &[(&str, &str)] = &[
    ("start_time", "startTime"),
    ("end_time", "endTime"),
    ("expression", "expression"),
    ("expression_time_zone", "expressionTimeZone"),
    ("period", "period"),
    ("depend_pre_period", "dependPrePeriod"),
    ("concurrent", "concurrent"),
];
const SCHEDULE_CRON_FIELDS: &[(&str, &str)] = &[
    ("start_time", "startTime"),
    ("end_time", "endTime"),
    ("expression", "expression"),
    ("expression_time_zone", "expressionTimeZone"),
    ("depend_pre_period", "dependPrePeriod"),
];
const DEPEND_JOBS_FIELDS: &[(&str, &str)] = &[
    ("jobs", "jobs"),
    ("depend_period", "dependPeriod"),
    ("depend_fail_policy", "dependFailPolicy"),
];
const PARAM_FIELDS: &[(&str, &str)] = &[("name", "name"), ("value", "value"), ("type", "type")];
const BASIC_CONFIG_FIELDS: &[(&str, &str)] = &[
    ("owner", "owner"),
    ("priority", "priority"),
    ("execute_user", "executeUser"),
    ("instance_timeout", "instanceTimeout"),
    ("custom_fields", "customFields"),
];

/// Attributes whose change triggers a PUT.
const UPDATABLE: &[&str] = &[
    "name",
    "nodes",
    "schedule",
    "params",
    "directory",
    "process_type",
    "log_path",
    "basic_config",
];

pub struct FactoryJob;

fn depend_jobs_block() -> Block {
    Block::new()
        .with_attribute("jobs", Attribute::string_list(AttributeFlags::required()))
        .with_attribute("depend_period", Attribute::optional_computed_string())
        .with_attribute("depend_fail_policy", Attribute::optional_computed_string())
}

fn event_block() -> Block {
    Block::new()
        .with_attribute("event_type", Attribute::required_string())
        .with_attribute("channel", Attribute::required_string())
        .with_attribute("fail_policy", Attribute::optional_computed_string())
        .with_attribute("concurrent", Attribute::optional_computed_int64())
        .with_attribute("read_policy", Attribute::optional_computed_string())
}

fn cron_block() -> Block {
    Block::new()
        .with_attribute("start_time", Attribute::required_string().with_description("ISO 8601 start time"))
        .with_attribute("end_time", Attribute::optional_computed_string())
        .with_attribute("expression", Attribute::required_string())
        .with_attribute("expression_time_zone", Attribute::optional_computed_string())
        .with_attribute("depend_pre_period", Attribute::optional_computed_bool())
        .with_block("depend_jobs", NestedBlock::single(depend_jobs_block()).optional_computed())
}

fn node_block() -> Block {
    let location = Block::new()
        .with_attribute("x", Attribute::required_int64())
        .with_attribute("y", Attribute::required_int64());
    let condition = Block::new()
        .with_attribute("pre_node_name", Attribute::required_string())
        .with_attribute("expression", Attribute::required_string());
    let property = Block::new()
        .with_attribute("name", Attribute::optional_computed_string())
        .with_attribute("value", Attribute::optional_computed_string());
    let cron_trigger = cron_block()
        .with_attribute("period", Attribute::optional_computed_string())
        .with_attribute("concurrent", Attribute::optional_computed_int64());

    let mut block = Block::new()
        .with_attribute("name", Attribute::required_string().with_description("The node name"))
        .with_attribute("type", Attribute::required_string())
        .with_attribute("pre_node_name", Attribute::string_list(AttributeFlags::optional_computed()))
        .with_attribute("fail_policy", Attribute::optional_computed_string())
        .with_block("location", NestedBlock::single(location).required())
        .with_block("conditions", NestedBlock::list(condition).optional_computed())
        .with_block("properties", NestedBlock::list(property).required())
        .with_block("event_trigger", NestedBlock::single(event_block()).optional_computed())
        .with_block("cron_trigger", NestedBlock::single(cron_trigger).optional_computed());
    for name in ["polling_interval", "max_execution_time", "retry_times", "retry_interval"] {
        block = block.with_attribute(name, Attribute::optional_computed_int64());
    }
    block
}

fn schedule_block() -> Block {
    Block::new()
        .with_attribute("type", Attribute::required_string().with_description("EXECUTE_ONCE, CRON or EVENT"))
        .with_block("cron", NestedBlock::single(cron_block()).optional_computed())
        .with_block("event", NestedBlock::single(event_block()).optional_computed())
}

fn param_block() -> Block {
    Block::new()
        .with_attribute("name", Attribute::required_string())
        .with_attribute("value", Attribute::required_string())
        .with_attribute("type", Attribute::optional_computed_string())
}

fn basic_config_block() -> Block {
    Block::new()
        .with_attribute("owner", Attribute::optional_computed_string())
        .with_attribute("priority", Attribute::optional_computed_int64())
        .with_attribute("execute_user", Attribute::optional_computed_string())
        .with_attribute("instance_timeout", Attribute::optional_computed_int64())
        .with_attribute("custom_fields", Attribute::string_map(AttributeFlags::optional_computed()))
}

/// Convert an attribute object into its wire form. Zero values are dropped.
fn to_wire(source: &Value, fields: &[(&str, &str)]) -> Map<String, Value> {
    fields
        .iter()
        .map(|(attr, wire)| (wire.to_string(), value_ignore_empty(source.get(*attr))))
        .collect()
}

/// [`to_wire`] for an optional single block; absent or empty blocks are `null`.
fn single_to_wire(source: Option<&Value>, f: impl Fn(&Value) -> Map<String, Value>) -> Value {
    match source {
        Some(v) if v.as_object().is_some_and(|o| !o.is_empty()) => Value::Object(f(v)),
        _ => Value::Null,
    }
}

fn list_to_wire(source: Option<&Value>, f: impl Fn(&Value) -> Map<String, Value>) -> Value {
    match source.and_then(Value::as_array) {
        Some(items) if !items.is_empty() => Value::Array(items.iter().map(|v| Value::Object(f(v))).collect()),
        _ => Value::Null,
    }
}

fn depend_jobs_to_wire(v: &Value) -> Map<String, Value> {
    let mut wire = to_wire(v, DEPEND_JOBS_FIELDS);
    wire.insert("jobs".to_string(), field(v, "jobs"));
    wire
}

fn cron_to_wire(v: &Value, fields: &[(&str, &str)]) -> Map<String, Value> {
    let mut wire = to_wire(v, fields);
    wire.insert("dependJobs".to_string(), single_to_wire(v.get("depend_jobs"), depend_jobs_to_wire));
    wire
}

fn node_to_wire(v: &Value) -> Map<String, Value> {
    let mut wire = to_wire(v, NODE_FIELDS);
    wire.insert(
        "location".to_string(),
        single_to_wire(v.get("location"), |l| to_wire(l, &[("x", "x"), ("y", "y")])),
    );
    wire.insert("conditions".to_string(), list_to_wire(v.get("conditions"), |c| to_wire(c, CONDITION_FIELDS)));
    wire.insert("properties".to_string(), list_to_wire(v.get("properties"), |p| to_wire(p, PROPERTY_FIELDS)));
    wire.insert("eventTrigger".to_string(), single_to_wire(v.get("event_trigger"), |e| to_wire(e, EVENT_FIELDS)));
    wire.insert(
        "cronTrigger".to_string(),
        single_to_wire(v.get("cron_trigger"), |c| cron_to_wire(c, CRON_TRIGGER_FIELDS)),
    );
    wire
}

fn schedule_to_wire(v: &Value) -> Map<String, Value> {
    let mut wire = to_wire(v, &[("type", "type")]);
    wire.insert("cron".to_string(), single_to_wire(v.get("cron"), |c| cron_to_wire(c, SCHEDULE_CRON_FIELDS)));
    wire.insert("event".to_string(), single_to_wire(v.get("event"), |e| to_wire(e, EVENT_FIELDS)));
    wire
}

fn job_body(data: &ResourceData) -> Value {
    remove_nil(json!({
        "name": data.get("name"),
        "nodes": list_to_wire(data.get("nodes"), node_to_wire),
        "schedule": single_to_wire(data.get("schedule"), schedule_to_wire),
        "params": list_to_wire(data.get("params"), |p| to_wire(p, PARAM_FIELDS)),
        "directory": value_ignore_empty(data.get("directory")),
        "processType": data.get("process_type"),
        "logPath": value_ignore_empty(data.get("log_path")),
        "basicConfig": single_to_wire(data.get("basic_config"), |b| to_wire(b, BASIC_CONFIG_FIELDS)),
    }))
}

/// The object at `key`, or `None` when it is missing or empty.
fn object_at<'a>(source: &'a Value, key: &str) -> Option<&'a Value> {
    source.get(key).filter(|v| v.as_object().is_some_and(|o| !o.is_empty()))
}

fn single_from_wire(source: &Value, key: &str, f: impl Fn(&Value) -> Value) -> Value {
    object_at(source, key).map_or(Value::Null, f)
}

fn list_from_wire(source: &Value, key: &str, f: impl Fn(&Value) -> Value) -> Value {
    Value::Array(path_search_array(key, source).iter().map(f).collect())
}

fn cron_from_wire(v: &Value, fields: &[(&str, &str)]) -> Value {
    let mut flat = pick(v, fields);
    flat["depend_jobs"] = single_from_wire(v, "dependJobs", |d| pick(d, DEPEND_JOBS_FIELDS));
    flat
}

fn flatten_node(v: &Value) -> Value {
    let mut flat = pick(v, NODE_FIELDS);
    flat["location"] = single_from_wire(v, "location", |l| {
        json!({"x": as_int(&field(l, "x")), "y": as_int(&field(l, "y"))})
    });
    flat["conditions"] = list_from_wire(v, "conditions", |c| pick(c, CONDITION_FIELDS));
    flat["properties"] = list_from_wire(v, "properties", |p| pick(p, PROPERTY_FIELDS));
    flat["event_trigger"] = single_from_wire(v, "eventTrigger", |e| pick(e, EVENT_FIELDS));
    flat["cron_trigger"] = single_from_wire(v, "cronTrigger", |c| cron_from_wire(c, CRON_TRIGGER_FIELDS));
    flat
}

fn flatten_schedule(v: &Value) -> Value {
    let mut flat = pick(v, &[("type", "type")]);
    flat["cron"] = single_from_wire(v, "cron", |c| cron_from_wire(c, SCHEDULE_CRON_FIELDS));
    flat["event"] = single_from_wire(v, "event", |e| pick(e, EVENT_FIELDS));
    flat
}

/// Request options with the optional `workspace` header.
fn job_opts(data: &ResourceData) -> RequestOpts {
    match data.get_str("workspace_id").filter(|w| !w.is_empty()) {
        Some(workspace_id) => RequestOpts::new().header(WORKSPACE_HEADER, workspace_id),
        None => RequestOpts::new(),
    }
}

fn job_path(name: &str) -> String {
    format!("{}/{}", JOBS_PATH, name)
}

#[async_trait]
impl Resource for FactoryJob {
    fn type_name(&self) -> &'static str {
        "dataarts_factory_job"
    }

    fn schema(&self) -> Schema {
        resource_schema("Manages a DataArts Factory job")
            .with_attribute("name", Attribute::required_string().with_description("The job name"))
            .with_attribute(
                "process_type",
                Attribute::required_string().with_description("BATCH or REAL_TIME"),
            )
            .with_attribute(
                "workspace_id",
                Attribute::optional_computed_string()
                    .with_force_new()
                    .with_description("The workspace the job belongs to"),
            )
            .with_attribute("directory", Attribute::optional_computed_string())
            .with_attribute("log_path", Attribute::optional_computed_string())
            .with_block("nodes", NestedBlock::list(node_block()).required())
            .with_block("schedule", NestedBlock::single(schedule_block()).required())
            .with_block("params", NestedBlock::list(param_block()).optional_computed())
            .with_block("basic_config", NestedBlock::single(basic_config_block()).optional_computed())
    }

    async fn create(&self, client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
        let svc = service_client(client, data, PRODUCT_DATAARTS_DLF)?;
        svc.post(JOBS_PATH, job_opts(data).body(job_body(data)).ok_codes(&[204]))
            .await
            .map_err(|e| e.context("error creating DataArts Factory job"))?;
        let name = data.require_str("name")?.to_string();
        data.set_id(name);
        Ok(())
    }

    async fn read(&self, client: &Client, data: &mut ResourceData) -> Result<(), ProviderError> {
        let region = super::common::region(client, data)?;
        let svc = service_client(client, data, PRODUCT_DATAARTS_DLF)?;
        let job = svc
            .get(&job_path(data.id()), job_opts(data).ok_codes(&[200]))
            .await
            .map_err(|e| convert_expected_400_into_404(e, NOT_FOUND_CODE_PATH, NOT_FOUND_CODES))?;

        data.set("region", Value::String(region));
        data.set("name", field(&job, "name"));
        data.set("nodes", list_from_wire(&job, "nodes", flatten_node));
        data.set("schedule", single_from_wire(&job, "schedule", flatten_schedule));
        data.set("params", list_from_wire(&job, "params", |p| pick(p, PARAM_FIELDS)));
        data.set("directory", field(&job, "directory"));
        data.set("process_type", field(&job, "processType"));
        data.set("log_path", field(&job, "logPath"));
        data.set(
            "basic_config",
            single_from_wire(&job, "basicConfig", |b| pick(b, BASIC_CONFIG_FIELDS)),
        );
        Ok(())
    }

    async fn update(
        &self,
        client: &Client,
        prior: &ResourceData,
        data: &mut ResourceData,
    ) -> Result<(), ProviderError> {
        if !data.has_change(prior, UPDATABLE) {
            return Ok(());
        }
        let svc = service_client(client, data, PRODUCT_DATAARTS_DLF)?;
        svc.put(&job_path(data.id()), job_opts(data).body(job_body(data)).ok_codes(&[204]))
            .await
            .map_err(|e| e.context("error updating DataArts Factory job"))?;
        // The job is addressed by name, so a rename moves the ID with it.
        let name = data.require_str("name")?.to_string();
        data.set_id(name);
        Ok(())
    }

    async fn delete(&self, client: &Client, data: &ResourceData) -> Result<(), ProviderError> {
        let svc = service_client(client, data, PRODUCT_DATAARTS_DLF)?;
        svc.delete(&job_path(data.id()), job_opts(data).ok_codes(&[204]))
            .await
            .map_err(|e| convert_expected_400_into_404(e, NOT_FOUND_CODE_PATH, NOT_FOUND_CODES))?;
        Ok(())
    }

    fn import_format(&self) -> &'static str {
        "<workspace_id>/<name>"
    }
}
