//! The DataArts Studio provider.
//!
//! [`DataArtsProvider`] implements [`ProviderService`] by dispatching each
//! request to the [`Resource`] or [`DataSource`] registered under the
//! requested type name.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::plan::plan_resource;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::services::{data_sources, resources, DataSource, Resource};
use crate::state::ResourceData;
use crate::types::{ImportedResource, PlanResult};
use crate::validation::validate;

pub struct DataArtsProvider {
    resources: BTreeMap<&'static str, Box<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Box<dyn DataSource>>,
    client: RwLock<Option<Arc<Client>>>,
}

impl Default for DataArtsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DataArtsProvider {
    pub fn new() -> Self {
        Self {
            resources: resources().into_iter().map(|r| (r.type_name(), r)).collect(),
            data_sources: data_sources().into_iter().map(|d| (d.type_name(), d)).collect(),
            client: RwLock::new(None),
        }
    }

    fn resource(&self, resource_type: &str) -> Result<&dyn Resource, ProviderError> {
        match self.resources.get(resource_type) {
            Some(found) => Ok(&**found),
            None => Err(ProviderError::UnknownResource(resource_type.to_string())),
        }
    }

    fn data_source(&self, data_source_type: &str) -> Result<&dyn DataSource, ProviderError> {
        match self.data_sources.get(data_source_type) {
            Some(found) => Ok(&**found),
            None => Err(ProviderError::UnknownResource(data_source_type.to_string())),
        }
    }

    /// The client built by the last successful `configure`.
    async fn client(&self) -> Result<Arc<Client>, ProviderError> {
        self.client
            .read()
            .await
            .clone()
            .ok_or_else(|| ProviderError::FailedPrecondition("the provider has not been configured".to_string()))
    }

    fn load_config(config: &Value) -> Result<ProviderConfig, ProviderError> {
        Ok(ProviderConfig::from_value(config)?.with_env_fallbacks())
    }
}

#[async_trait::async_trait]
impl ProviderService for DataArtsProvider {
    fn schema(&self) -> ProviderSchema {
        let schema = self
            .resources
            .values()
            .fold(ProviderSchema::new().with_provider_config(ProviderConfig::schema()), |s, r| {
                s.with_resource(r.type_name(), r.schema())
            });
        self.data_sources
            .values()
            .fold(schema, |s, d| s.with_data_source(d.type_name(), d.schema()))
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validate(&ProviderConfig::schema(), &config);
        match Self::load_config(&config) {
            Ok(parsed) => diagnostics.extend(parsed.check()),
            Err(e) => diagnostics.push(Diagnostic::error(e.to_string())),
        }
        Ok(diagnostics)
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let config = Self::load_config(&config)?;
        let diagnostics = config.check();
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Ok(diagnostics);
        }
        info!(region = ?config.region, endpoints = config.endpoints.len(), "configuring DataArts client");
        let client = Client::new(config)?;
        *self.client.write().await = Some(Arc::new(client));
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        self.client.write().await.take();
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&self.resource(resource_type)?.schema(), &config))
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let schema = self.resource(resource_type)?.schema();
        Ok(plan_resource(&schema, prior_state.as_ref(), &proposed_state, &config))
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        let mut data = ResourceData::new(planned_state);
        resource.create(&client, &mut data).await?;
        info!(resource_type, id = data.id(), "resource created");
        resource.read(&client, &mut data).await?;
        Ok(data.into_value())
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        let mut data = ResourceData::new(current_state);
        match resource.read(&client, &mut data).await {
            Ok(()) => Ok(data.into_value()),
            Err(e) if e.is_not_found() => {
                warn!(resource_type, id = data.id(), "resource is gone, removing it from state: {}", e);
                Ok(Value::Null)
            },
            Err(e) => Err(e),
        }
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        let prior = ResourceData::new(prior_state);
        let mut data = ResourceData::new(planned_state);
        if data.id().is_empty() {
            data.set_id(prior.id());
        }
        resource.update(&client, &prior, &mut data).await?;
        resource.read(&client, &mut data).await?;
        Ok(data.into_value())
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        let data = ResourceData::new(current_state);
        match resource.delete(&client, &data).await {
            Err(e) if e.is_not_found() => {
                debug!(resource_type, id = data.id(), "resource already deleted");
                Ok(())
            },
            other => other,
        }
    }

    async fn import_resource(&self, resource_type: &str, id: &str) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        let mut data = resource.import(&client, id).await?;
        resource
            .read(&client, &mut data)
            .await
            .map_err(|e| e.context(format!("error importing {resource_type} '{id}'")))?;
        Ok(vec![ImportedResource::new(resource_type, data.into_value())])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&self.data_source(data_source_type)?.schema(), &config))
    }

    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let client = self.client().await?;
        let mut data = ResourceData::new(config);
        data_source.read(&client, &mut data).await?;
        data.set_id(uuid::Uuid::new_v4().to_string());
        Ok(data.into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> Value {
        json!({
            "region": "cn-north-4",
            "project_id": "0970dd7a1300f5672ff2c003c60ae115",
            "auth_token": "token",
        })
    }

    #[test]
    fn test_schema_lists_every_type() {
        let schema = DataArtsProvider::new().schema();
        assert_eq!(schema.resources.len(), 8);
        assert_eq!(schema.data_sources.len(), 2);
        assert!(schema.provider.block.attributes["auth_token"].flags.sensitive);
        assert!(schema.resources.contains_key("dataarts_factory_job"));
    }

    #[tokio::test]
    async fn test_unknown_type() {
        let provider = DataArtsProvider::new();
        let err = provider.validate_resource_config("dataarts_nope", json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
        let err = provider.read_data_source("dataarts_nope", json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_requires_configure() {
        let provider = DataArtsProvider::new();
        let err = provider
            .read("dataarts_security_permission_set", json!({"id": "ps-1", "workspace_id": "ws"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn test_configure_and_stop() {
        let provider = DataArtsProvider::new();
        let diagnostics = provider.configure(config()).await.unwrap();
        assert!(diagnostics.is_empty());
        assert!(provider.client().await.is_ok());

        provider.stop().await.unwrap();
        assert!(provider.client().await.is_err());
    }

    #[tokio::test]
    async fn test_validate_provider_config_reports_bad_endpoint() {
        let provider = DataArtsProvider::new();
        let mut bad = config();
        bad["endpoints"] = json!({"dataarts": "dayu.local"});
        let diagnostics = provider.validate_provider_config(bad).await.unwrap();
        assert!(diagnostics
            .iter()
            .any(|d| d.is_error() && d.attribute.as_deref() == Some("endpoints.dataarts")));
    }

    #[tokio::test]
    async fn test_validate_resource_config_missing_required() {
        let provider = DataArtsProvider::new();
        let diagnostics = provider
            .validate_resource_config("dataarts_security_permission_set", json!({"workspace_id": "ws"}))
            .await
            .unwrap();
        let attrs: Vec<_> = diagnostics.iter().filter_map(|d| d.attribute.as_deref()).collect();
        assert!(attrs.contains(&"name"));
        assert!(attrs.contains(&"parent_id"));
    }

    #[tokio::test]
    async fn test_plan_replaces_on_workspace_change() {
        let provider = DataArtsProvider::new();
        let prior = json!({
            "id": "ps-1", "region": "cn-north-4", "workspace_id": "ws-1",
            "name": "readers", "parent_id": "0", "manager_id": "u-1",
        });
        let mut proposed = prior.clone();
        proposed["workspace_id"] = json!("ws-2");
        let plan = provider
            .plan("dataarts_security_permission_set", Some(prior), proposed.clone(), proposed)
            .await
            .unwrap();
        assert!(plan.requires_replace);
        assert_eq!(plan.planned_state["id"], "ps-1");
    }
}
