mod common;

use common::{api_path, configured, WORKSPACE_ID};
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API: &str = "dataarts_dataservice_api";
const APIS: &str = "dataarts_dataservice_apis";

fn config() -> Value {
    json!({
        "workspace_id": WORKSPACE_ID,
        "catalog_id": "cat-1",
        "name": "orders_by_id",
        "type": "API_SPECIFIC_TYPE_CONFIGURATION",
        "auth_type": "APP",
        "protocol": "PROTOCOL_TYPE_HTTPS",
        "path": "/orders/{id}",
        "request_type": "REQUEST_TYPE_GET",
        "manager": "alice",
        "request_params": [{"name": "id", "position": "REQUEST_PARAMETER_POSITION_PATH", "type": "REQUEST_PARAMETER_TYPE_STRING"}],
        "datasource_config": {
            "type": "DLI",
            "connection_id": "conn-1",
            "database": "sales",
            "datatable": "orders",
            "backend_params": [{"name": "id", "mapping": "order_id", "condition": "CONDITION_TYPE_EQ"}],
            "response_params": [{"name": "amount", "type": "REQUEST_PARAMETER_TYPE_NUMBER", "field": "amount"}],
        },
    })
}

fn detail(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "type": "API_SPECIFIC_TYPE_CONFIGURATION",
        "protocol": "PROTOCOL_TYPE_HTTPS",
        "path": "/orders/{id}",
        "request_type": "REQUEST_TYPE_GET",
        "manager": "alice",
        "status": "API_STATUS_CREATED",
        "group_id": "g-1",
        "create_time": 1704164645000i64,
        "update_time": 1704164645000i64,
        "request_paras": [{"name": "id", "position": "REQUEST_PARAMETER_POSITION_PATH", "type": "REQUEST_PARAMETER_TYPE_STRING", "necessary": false}],
        "datasource_config": {
            "type": "DLI",
            "connection_id": "conn-1",
            "connection_name": "dli_conn",
            "database": "sales",
            "datatable": "orders",
            "table_id": "t-1",
            "backend_paras": [{"name": "id", "mapping": "order_id", "condition": "CONDITION_TYPE_EQ"}],
            "response_paras": [{"name": "amount", "type": "REQUEST_PARAMETER_TYPE_NUMBER", "field": "amount"}],
        },
        "hosts": [{"instance_id": "i-1", "instance_name": "shared", "domains": ["orders.example.com"]}],
    })
}

fn api_detail_path(id: &str) -> String {
    api_path("v1", &format!("service/apis/{id}"))
}

fn state(id: &str) -> Value {
    let mut state = config();
    state["id"] = json!(id);
    state["dlm_type"] = json!("SHARED");
    state
}

#[tokio::test]
async fn test_create_resolves_connection_and_table() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api_path("v1", "data-connections/conn-1")))
        .and(header("workspace", WORKSPACE_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"dw_name": "dli_conn"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("v2", "conn-1/datatables")))
        .and(query_param("database_name", "sales"))
        .and(query_param("table_name", "orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tables": [{"table_id": "t-1"}]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("v1", "service/apis")))
        .and(header("Dlm-Type", "SHARED"))
        .and(body_partial_json(json!({
            "catalog_id": "cat-1",
            "api_type": "API_SPECIFIC_TYPE_CONFIGURATION",
            "datasource_config": {
                "connection_name": "dli_conn",
                "table_id": "t-1",
                "pagination": "DEFAULT",
                "backend_paras": [{"mapping": "order_id"}],
            },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "api-1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_detail_path("api-1")))
        .and(header("Dlm-Type", "SHARED"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail("api-1", "orders_by_id")))
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let state = assert_ok!(tester.apply(API, config()).await);

    assert_eq!(state["id"], "api-1");
    assert_eq!(state["dlm_type"], "SHARED");
    assert_eq!(state["status"], "API_STATUS_CREATED");
    assert_eq!(state["created_at"], "2024-01-02T03:04:05Z");
    assert_eq!(state["datasource_config"]["connection_name"], "dli_conn");
    assert_eq!(state["datasource_config"]["backend_params"][0]["mapping"], "order_id");
    assert_eq!(state["hosts"][0]["domains"], json!(["orders.example.com"]));
}

#[tokio::test]
async fn test_delete_uses_batch_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("v1", "service/apis/batch-delete")))
        .and(header("workspace", WORKSPACE_ID))
        .and(header("Dlm-Type", "EXCLUSIVE"))
        .and(body_json(json!(["api-1"])))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let mut state = state("api-1");
    state["dlm_type"] = json!("EXCLUSIVE");
    assert_ok!(tester.delete(API, state).await);
}

#[tokio::test]
async fn test_delete_of_missing_api_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("v1", "service/apis/batch-delete")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error_code": "DLM.4197"})))
        .expect(1)
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    assert_ok!(tester.delete(API, state("api-1")).await);
}

#[tokio::test]
async fn test_read_missing_api() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api_detail_path("api-1")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error_code": "DLM.4018"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_detail_path("api-2")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error_code": "DLM.4197"})))
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let refreshed = assert_ok!(tester.read(API, state("api-1")).await);
    assert_eq!(refreshed, Value::Null);

    // DLM.4197 only marks a missing API on delete.
    assert_err!(tester.read(API, state("api-2")).await);
}

#[tokio::test]
async fn test_data_source_skips_unreadable_apis() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api_path("v1", "service/apis")))
        .and(query_param("name", "orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [
                {"id": "api-1", "name": "orders", "create_user": "bob"},
                {"id": "api-2", "name": "orders_v2"},
            ],
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_detail_path("api-1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail("api-1", "orders")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_detail_path("api-2")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let result = assert_ok!(
        tester
            .read_data_source(APIS, json!({"workspace_id": WORKSPACE_ID, "name": "orders"}))
            .await
    );

    let apis = result["apis"].as_array().expect("apis is a list");
    assert_eq!(apis.len(), 1);
    assert_eq!(apis[0]["id"], "api-1");
    assert_eq!(apis[0]["create_user"], "bob");
    assert_eq!(apis[0]["datasource_config"]["table_id"], "t-1");
    assert!(uuid::Uuid::parse_str(result["id"].as_str().expect("id is set")).is_ok());
}
