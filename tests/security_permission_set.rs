mod common;

use common::{api_path, configured, TOKEN, WORKSPACE_ID};
use hemmer_provider_dataarts::ProviderError;
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PERMISSION_SET: &str = "dataarts_security_permission_set";

fn set_path() -> String {
    api_path("v1", "security/permission-sets/ps-1")
}

fn remote(name: &str) -> Value {
    json!({
        "id": "ps-1",
        "name": name,
        "parent_id": "0",
        "manager_id": "u-1",
        "manager_name": "alice",
        "manager_type": "USER",
        "type": "ROOT",
        "sync_status": "SYNCED",
        "create_user": "alice",
        "update_user": "bob",
        "create_time": 1704164645000i64,
        "update_time": 1704164645000i64,
        "description": "",
    })
}

fn config(name: &str) -> Value {
    json!({
        "workspace_id": WORKSPACE_ID,
        "name": name,
        "parent_id": "0",
        "manager_id": "u-1",
    })
}

fn not_found() -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({
        "error_code": "DLS.3027",
        "error_msg": "The permission set does not exist",
    }))
}

#[tokio::test]
async fn test_create_update_delete() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(api_path("v1", "security/permission-sets")))
        .and(header("workspace", WORKSPACE_ID))
        .and(header("x-auth-token", TOKEN))
        .and(body_json(json!({"name": "readers", "parent_id": "0", "manager_id": "u-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "ps-1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(set_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(remote("readers")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(set_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(remote("writers")))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(set_path()))
        .and(body_json(json!({"name": "writers", "manager_id": "u-1", "description": ""})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(set_path()))
        .and(header("workspace", WORKSPACE_ID))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let created = assert_ok!(tester.apply(PERMISSION_SET, config("readers")).await);
    assert_eq!(created["id"], "ps-1");
    assert_eq!(created["region"], "cn-north-4");
    assert_eq!(created["status"], "SYNCED");
    assert_eq!(created["created_by"], "alice");
    assert_eq!(created["created_at"], "2024-01-02T03:04:05Z");

    let updated = assert_ok!(tester.apply_update(PERMISSION_SET, created, config("writers")).await);
    assert_eq!(updated["name"], "writers");
    assert_eq!(updated["id"], "ps-1");

    assert_ok!(tester.delete(PERMISSION_SET, updated).await);
}

#[tokio::test]
async fn test_read_removes_missing_set() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(set_path()))
        .respond_with(not_found())
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let mut state = config("readers");
    state["id"] = json!("ps-1");
    let refreshed = assert_ok!(tester.read(PERMISSION_SET, state).await);
    assert_eq!(refreshed, Value::Null);
}

#[tokio::test]
async fn test_delete_of_missing_set_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(set_path()))
        .respond_with(not_found())
        .expect(1)
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let mut state = config("readers");
    state["id"] = json!("ps-1");
    assert_ok!(tester.delete(PERMISSION_SET, state).await);
}

#[tokio::test]
async fn test_other_errors_are_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(set_path()))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error_code": "DLS.1000"})))
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let mut state = config("readers");
    state["id"] = json!("ps-1");
    let err = assert_err!(tester.read(PERMISSION_SET, state).await);
    assert!(matches!(err, ProviderError::Http { status: 400, .. }));
}

#[tokio::test]
async fn test_import() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(set_path()))
        .and(header("workspace", WORKSPACE_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(remote("readers")))
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let imported = assert_ok!(tester.import(PERMISSION_SET, "ws-1/ps-1").await);
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].resource_type, PERMISSION_SET);
    assert_eq!(imported[0].state["workspace_id"], WORKSPACE_ID);
    assert_eq!(imported[0].state["name"], "readers");

    let err = assert_err!(tester.import(PERMISSION_SET, "ps-1").await);
    assert!(err.to_string().contains("<workspace_id>/<id>"));
}
