//! Helpers shared by the DataArts resources.

use serde_json::{Map, Value};

use crate::client::{Client, RequestOpts, ServiceClient};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::state::ResourceData;
use crate::utils::path_search;

/// Header selecting the DataArts workspace an API call applies to.
pub const WORKSPACE_HEADER: &str = "workspace";

/// Region of a resource: its own `region`, or the provider region.
pub fn region(client: &Client, data: &ResourceData) -> Result<String, ProviderError> {
    match data.get_str("region").filter(|r| !r.is_empty()) {
        Some(r) => Ok(r.to_string()),
        None => client.region().map(str::to_string),
    }
}

/// A service client for `product` in the resource's region.
pub fn service_client(client: &Client, data: &ResourceData, product: &str) -> Result<ServiceClient, ProviderError> {
    let region = region(client, data)?;
    client
        .service_client(product, &region)
        .map_err(|e| e.context("error creating DataArts Studio client"))
}

/// Request options carrying the `workspace` header.
pub fn workspace_opts(data: &ResourceData) -> Result<RequestOpts, ProviderError> {
    Ok(RequestOpts::new().header(WORKSPACE_HEADER, data.require_str("workspace_id")?))
}

/// A schema with the `id` and `region` attributes every resource carries.
pub fn resource_schema(description: &str) -> Schema {
    Schema::v0()
        .with_description(description)
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "region",
            Attribute::optional_computed_string()
                .with_force_new()
                .with_description("The region in which to create the resource"),
        )
}

/// [`resource_schema`] plus a required, force-new `workspace_id`.
pub fn workspace_resource_schema(description: &str) -> Schema {
    resource_schema(description).with_attribute(
        "workspace_id",
        Attribute::required_string()
            .with_force_new()
            .with_description("The ID of the DataArts Studio workspace"),
    )
}

/// Schema base of the workspace-scoped data sources.
pub fn data_source_schema(description: &str) -> Schema {
    Schema::v0()
        .with_description(description)
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("region", Attribute::optional_computed_string())
        .with_attribute(
            "workspace_id",
            Attribute::required_string().with_description("The ID of the DataArts Studio workspace"),
        )
}

/// The value at `path`, or `null`.
pub fn field(value: &Value, path: &str) -> Value {
    path_search(path, value).cloned().unwrap_or(Value::Null)
}

/// Copy response fields into state. Each pair is `(attribute, response path)`.
pub fn set_fields(data: &mut ResourceData, resp: &Value, fields: &[(&str, &str)]) {
    for (attr, path) in fields {
        data.set(*attr, field(resp, path));
    }
}

/// Build a JSON object from `(output key, source path)` pairs read from
/// `source`, leaving absent values as `null`.
pub fn pick(source: &Value, fields: &[(&str, &str)]) -> Value {
    let mut out = Map::new();
    for (to, from) in fields {
        out.insert(to.to_string(), field(source, from));
    }
    Value::Object(out)
}

/// Map each element of the array at `path` through `f`.
pub fn flatten_array(value: &Value, path: &str, f: impl Fn(&Value) -> Value) -> Value {
    Value::Array(crate::utils::path_search_array(path, value).iter().map(f).collect())
}

/// Read a JSON value that may be a number or a numeric string as an integer.
pub fn as_int(value: &Value) -> Value {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(Value::from)
            .unwrap_or(Value::Null),
        Value::String(s) => s.trim().parse::<i64>().map(Value::from).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// A string in state as sent on the wire: empty strings are dropped.
pub fn opt_str(value: Option<&Value>) -> Value {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Value::String(s.clone()),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pick_and_set_fields() {
        let resp = json!({"create_by": "alice", "create_time": "2024-01-01T00:00:00Z", "extra": 1});
        let picked = pick(&resp, &[("created_by", "create_by"), ("owner", "owner")]);
        assert_eq!(picked, json!({"created_by": "alice", "owner": null}));

        let mut data = ResourceData::default();
        set_fields(&mut data, &resp, &[("created_at", "create_time")]);
        assert_eq!(data.get_str("created_at"), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_flatten_array() {
        let resp = json!({"values": [{"id": "1"}, {"id": "2"}]});
        let ids = flatten_array(&resp, "values", |v| field(v, "id"));
        assert_eq!(ids, json!(["1", "2"]));
        assert_eq!(flatten_array(&resp, "missing", |v| v.clone()), json!([]));
    }

    #[test]
    fn test_as_int() {
        assert_eq!(as_int(&json!("12")), json!(12));
        assert_eq!(as_int(&json!(12.0)), json!(12));
        assert_eq!(as_int(&json!("x")), Value::Null);
    }

    #[test]
    fn test_opt_str() {
        assert_eq!(opt_str(Some(&json!(""))), Value::Null);
        assert_eq!(opt_str(Some(&json!("a"))), json!("a"));
        assert_eq!(opt_str(None), Value::Null);
    }

    #[test]
    fn test_workspace_opts_requires_workspace() {
        assert!(workspace_opts(&ResourceData::default()).is_err());
        let data = ResourceData::new(json!({"workspace_id": "ws-1"}));
        let opts = workspace_opts(&data).unwrap();
        assert_eq!(opts.headers, vec![("workspace".to_string(), "ws-1".to_string())]);
    }
}
