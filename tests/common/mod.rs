//! Shared setup for the wiremock-backed integration tests.

#![allow(dead_code)]

use hemmer_provider_dataarts::testing::ProviderTester;
use hemmer_provider_dataarts::DataArtsProvider;
use serde_json::{json, Value};
use wiremock::MockServer;

pub const PROJECT_ID: &str = "p1";
pub const WORKSPACE_ID: &str = "ws-1";
pub const TOKEN: &str = "token";

/// Provider configuration pointing both DataArts endpoints at `server`.
pub fn provider_config(server: &MockServer) -> Value {
    json!({
        "region": "cn-north-4",
        "project_id": PROJECT_ID,
        "auth_token": TOKEN,
        "endpoints": {
            "dataarts": server.uri(),
            "dataarts-dlf": server.uri(),
        },
    })
}

pub async fn configured(server: &MockServer) -> ProviderTester<DataArtsProvider> {
    let tester = ProviderTester::new(DataArtsProvider::new());
    tester
        .configure(provider_config(server))
        .await
        .expect("provider configuration is valid");
    tester
}

/// Path of a project-scoped API, e.g. `api_path("v1", "jobs")`.
pub fn api_path(version: &str, rest: &str) -> String {
    format!("/{version}/{PROJECT_ID}/{rest}")
}
