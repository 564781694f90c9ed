mod common;

use common::{api_path, configured, WORKSPACE_ID};
use hemmer_provider_dataarts::ProviderError;
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate, Times};

const METRIC: &str = "dataarts_architecture_business_metric";
const TABLE_MODELS: &str = "dataarts_architecture_table_models";
const TABLE_MODEL: &str = "dataarts_architecture_table_model";
const STANDARD: &str = "dataarts_architecture_data_standard";
const TEMPLATE: &str = "dataarts_architecture_data_standard_template";
const CODE_TABLE: &str = "dataarts_architecture_code_table";

fn metric_config() -> Value {
    json!({
        "workspace_id": WORKSPACE_ID,
        "name": "daily_gmv",
        "owner": "alice",
        "owner_department": "sales",
        "destination": "track revenue",
        "definition": "sum of paid orders",
        "expression": "sum(amount)",
        "biz_catalog_id": "cat-1",
        "time_filters": "day",
        "interval_type": "DAY",
        "unit": "",
    })
}

fn metric_detail() -> Value {
    let mut metric = metric_config();
    metric["id"] = json!("m-1");
    metric["status"] = json!("PUBLISHED");
    metric["create_by"] = json!("alice");
    metric["create_time"] = json!("2024-01-02T03:04:05Z");
    json!({"data": {"value": metric}})
}

#[tokio::test]
async fn test_business_metric_is_published_after_create() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("v2", "design/biz-metrics")))
        .and(header("workspace", WORKSPACE_ID))
        .and(body_partial_json(json!({"name": "daily_gmv", "interval_type": "DAY"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"value": {"id": 1001}}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("v2", "design/approvals/batch-publish")))
        .and(body_json(json!({
            "biz_infos": [{"biz_id": "1001", "biz_type": "BIZ_METRIC"}],
            "fast_approval": true,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("v2", "design/biz-metrics/1001")))
        .respond_with(ResponseTemplate::new(200).set_body_json(metric_detail()))
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let state = assert_ok!(tester.apply(METRIC, metric_config()).await);
    assert_eq!(state["id"], "1001");
    assert_eq!(state["status"], "PUBLISHED");
    assert_eq!(state["created_by"], "alice");
    assert_eq!(state["publish"], true);
}

#[tokio::test]
async fn test_business_metric_skips_publish_when_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("v2", "design/biz-metrics")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"value": {"id": "m-1"}}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("v2", "design/approvals/batch-publish")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("v2", "design/biz-metrics/m-1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(metric_detail()))
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let mut config = metric_config();
    config["publish"] = json!(false);
    let state = assert_ok!(tester.apply(METRIC, config).await);
    assert_eq!(state["id"], "m-1");
}

#[tokio::test]
async fn test_business_metric_delete() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(api_path("v2", "design/biz-metrics")))
        .and(body_json(json!({"ids": ["m-1"]})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("v2", "design/biz-metrics/m-1")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [{"error_code": "DLG.0818", "error_msg": "metric not found"}],
        })))
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let mut state = metric_config();
    state["id"] = json!("m-1");
    assert_ok!(tester.delete(METRIC, state.clone()).await);
    assert_eq!(assert_ok!(tester.read(METRIC, state).await), Value::Null);
}

fn table(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "model_id": "model-1",
        "logic_tb_name": name,
        "tb_name": format!("dwd_{name}"),
        "biz_catalog_id": "subject-1",
        "is_partition": true,
        "create_time": "2024-01-02T11:04:05.000+0800",
        "attributes": [
            {
                "id": format!("{id}-a1"),
                "name_en": "order_id",
                "name_ch": "order id",
                "data_type": "STRING",
                "ordinal": 1,
                "is_primary_key": true,
            },
            {
                "id": format!("{id}-a2"),
                "table_model_id": "t-0",
                "name_en": "customer_id",
                "name_ch": "customer id",
                "data_type": "STRING",
                "ordinal": 2,
            },
        ],
    })
}

#[tokio::test]
async fn test_table_models_pages_until_empty() {
    let server = MockServer::start().await;
    let table_model_path = api_path("v2", "design/table-model");
    Mock::given(method("GET"))
        .and(path(table_model_path.clone()))
        .and(query_param("model_id", "model-1"))
        .and(query_param("limit", "100"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"value": {"records": [table("t-1", "orders"), table("t-2", "refunds")], "total": 2}},
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(table_model_path))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"value": {"records": []}}})))
        .expect(1)
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let result = assert_ok!(
        tester
            .read_data_source(TABLE_MODELS, json!({"workspace_id": WORKSPACE_ID, "model_id": "model-1"}))
            .await
    );

    let tables = result["tables"].as_array().expect("tables is a list");
    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0]["table_name"], "orders");
    assert_eq!(tables[0]["physical_table_name"], "dwd_orders");
    assert_eq!(tables[0]["is_partition"], true);
    assert_eq!(tables[0]["dirty_out_switch"], false);
    assert_eq!(tables[0]["created_at"], "2024-01-02T03:04:05Z");
    assert_eq!(tables[1]["id"], "t-2");
    assert_eq!(tables[1]["attributes"][0]["name"], "order id");
    assert_eq!(tables[1]["attributes"][0]["name_en"], "order_id");
    assert_eq!(tables[1]["attributes"][1]["name_en"], "customer_id");
    assert_eq!(tables[1]["attributes"][1]["ordinal"], 2);
}

#[tokio::test]
async fn test_table_model_delete_when_already_gone() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(api_path("v2", "design/table-model")))
        .and(header("workspace", WORKSPACE_ID))
        .and(body_json(json!({"ids": ["tm-1"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"value": 0}})))
        .expect(1)
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    assert_ok!(tester.delete(TABLE_MODEL, json!({"id": "tm-1", "workspace_id": WORKSPACE_ID})).await);
}

fn standard_state() -> Value {
    json!({"id": "std-2", "workspace_id": WORKSPACE_ID, "directory_id": "dir-1"})
}

async fn mount_standards_page(server: &MockServer, offset: &str, body: Value, times: u64) {
    Mock::given(method("GET"))
        .and(path(api_path("v2", "design/standards")))
        .and(header("workspace", WORKSPACE_ID))
        .and(query_param("directory_id", "dir-1"))
        .and(query_param("limit", "100"))
        .and(query_param("offset", offset))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_data_standard_found_on_second_directory_page() {
    let server = MockServer::start().await;
    mount_standards_page(
        &server,
        "0",
        json!({"data": {"value": {"records": [{"id": "std-0"}, {"id": "std-1"}], "total": 3}}}),
        1,
    )
    .await;
    mount_standards_page(
        &server,
        "2",
        json!({"data": {"value": {"records": [{
            "id": "std-2",
            "directory_id": "dir-1",
            "directory_path": "root/finance",
            "status": "PUBLISHED",
            "create_by": "alice",
            "values": [{"id": "v-1", "fd_name": "nameCh", "fd_value": "amount"}],
        }], "total": 3}}}),
        1,
    )
    .await;

    let tester = configured(&server).await;
    let state = assert_ok!(tester.read(STANDARD, standard_state()).await);
    assert_eq!(state["status"], "PUBLISHED");
    assert_eq!(state["directory_path"], "root/finance");
    assert_eq!(state["created_by"], "alice");
    assert_eq!(state["values"][0]["fd_value"], "amount");
}

#[tokio::test]
async fn test_data_standard_listing_stops_at_total() {
    let server = MockServer::start().await;
    mount_standards_page(
        &server,
        "0",
        json!({"data": {"value": {"records": [{"id": "std-0"}], "total": 1}}}),
        1,
    )
    .await;
    mount_standards_page(&server, "1", json!({"data": {"value": {"records": []}}}), 0).await;

    let tester = configured(&server).await;
    assert_eq!(assert_ok!(tester.read(STANDARD, standard_state()).await), Value::Null);
}

#[tokio::test]
async fn test_data_standard_listing_stops_at_empty_page() {
    let server = MockServer::start().await;
    mount_standards_page(
        &server,
        "0",
        json!({"data": {"value": {"records": [{"id": "std-0"}], "total": 5}}}),
        1,
    )
    .await;
    mount_standards_page(&server, "1", json!({"data": {"value": {"records": [], "total": 5}}}), 1).await;

    let tester = configured(&server).await;
    assert_eq!(assert_ok!(tester.read(STANDARD, standard_state()).await), Value::Null);
}

#[tokio::test]
async fn test_template_create_fails_when_workspace_has_one() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api_path("v2", "design/standards/templates")))
        .and(header("workspace", WORKSPACE_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"value": {"hasTemplate": true}}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("v2", "design/standards/templates/action")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let err = assert_err!(tester.create(TEMPLATE, json!({"workspace_id": WORKSPACE_ID})).await);
    assert!(matches!(err, ProviderError::AlreadyExists(_)));
}

const CODE_TABLE_ID: &str = "ct-1";

fn code_table_state() -> Value {
    json!({
        "id": CODE_TABLE_ID,
        "workspace_id": WORKSPACE_ID,
        "name": "levels",
        "code": "lvl",
        "directory_id": "dir-1",
        "fields": [{"id": "f-1", "name": "level", "code": "level", "type": "STRING", "values": ["low"]}],
    })
}

fn code_field(id: &str, name: &str, ordinal: u64, values: &[(&str, &str)]) -> Value {
    let values: Vec<Value> = values
        .iter()
        .enumerate()
        .map(|(i, (id, value))| json!({"id": id, "fd_value": value, "ordinal": i + 1}))
        .collect();
    json!({
        "id": id,
        "code_table_id": CODE_TABLE_ID,
        "name_ch": name,
        "name_en": name,
        "ordinal": ordinal,
        "data_type": "STRING",
        "code_table_field_values": values,
    })
}

/// Mount the code table detail and its field list. Value pages are mounted
/// by each test.
async fn mount_code_table(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(api_path("v2", "design/code-tables/ct-1")))
        .and(header("workspace", WORKSPACE_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"value": {
            "id": CODE_TABLE_ID,
            "name_ch": "levels",
            "name_en": "lvl",
            "directory_id": "dir-1",
            "status": "DRAFT",
            "code_table_fields": [{"id": "f-1"}, {"id": "f-2"}],
        }}})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("v2", "design/code-tables/ct-1/values")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"value": {"records": [
            code_field("f-1", "level", 1, &[]),
            code_field("f-2", "color", 2, &[]),
        ]}}})))
        .with_priority(10)
        .mount(server)
        .await;
}

async fn mount_values_page(server: &MockServer, offset: &str, records: Value, times: impl Into<Times>) {
    Mock::given(method("GET"))
        .and(path(api_path("v2", "design/code-tables/ct-1/values")))
        .and(query_param("limit", "50"))
        .and(query_param("offset", offset))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"value": {"records": records}}})))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_code_table_values_page_until_nothing_added() {
    let server = MockServer::start().await;
    mount_code_table(&server).await;
    mount_values_page(
        &server,
        "0",
        json!([code_field("f-1", "level", 1, &[("v-1", "low"), ("v-2", "high")])]),
        1,
    )
    .await;
    mount_values_page(&server, "50", json!([code_field("f-2", "color", 2, &[("v-3", "red")])]), 1).await;
    mount_values_page(&server, "100", json!([code_field("f-1", "level", 1, &[])]), 1).await;
    mount_values_page(&server, "150", json!([]), 0).await;

    let tester = configured(&server).await;
    let state = assert_ok!(tester.read(CODE_TABLE, code_table_state()).await);
    assert_eq!(state["status"], "DRAFT");
    assert_eq!(state["fields"][0]["values"], json!(["low", "high"]));
    assert_eq!(state["fields"][1]["values"], json!(["red"]));
    assert_eq!(state["fields"][1]["table_id"], CODE_TABLE_ID);
}

#[tokio::test]
async fn test_code_table_read_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api_path("v2", "design/code-tables/ct-1")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [{"error_code": "DLG.6022", "error_msg": "code table does not exist"}],
        })))
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    assert_eq!(assert_ok!(tester.read(CODE_TABLE, code_table_state()).await), Value::Null);
}

#[tokio::test]
async fn test_code_table_update_removes_then_inserts_values() {
    let server = MockServer::start().await;
    mount_code_table(&server).await;
    mount_values_page(&server, "0", json!([code_field("f-1", "level", 1, &[("v-1", "low")])]), 1..).await;
    mount_values_page(&server, "50", json!([]), 1..).await;
    Mock::given(method("PUT"))
        .and(path(api_path("v2", "design/code-tables/ct-1")))
        .and(body_partial_json(json!({"id": CODE_TABLE_ID, "name_ch": "levels"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(api_path("v2", "design/code-tables/ct-1/values")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(2)
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let mut planned = code_table_state();
    planned["fields"][0]["values"] = json!(["low", "high"]);
    assert_ok!(tester.update(CODE_TABLE, code_table_state(), planned).await);

    let requests = server.received_requests().await.expect("requests are recorded");
    let value_puts: Vec<Value> = requests
        .iter()
        .filter(|r| r.method.as_str() == "PUT" && r.url.path().ends_with("/values"))
        .map(|r| r.body_json().expect("JSON body"))
        .collect();
    assert_eq!(value_puts.len(), 2);
    assert_eq!(value_puts[0]["to_remove"][0]["id"], "f-1");
    assert_eq!(
        value_puts[0]["to_remove"][0]["code_table_field_values"],
        json!([{"id": "v-1", "ordinal": 1}])
    );
    assert!(value_puts[0].get("to_add").is_none());
    assert_eq!(value_puts[1]["to_add"][0]["id"], "f-1");
    assert_eq!(
        value_puts[1]["to_add"][0]["code_table_field_values"],
        json!([
            {"ordinal": 1, "fd_id": "f-1", "fd_value": "low"},
            {"ordinal": 2, "fd_id": "f-1", "fd_value": "high"},
        ])
    );
}
