//! Drive a [`ProviderService`] in tests without a gRPC server.
//!
//! ```ignore
//! use hemmer_provider_dataarts::testing::ProviderTester;
//! use hemmer_provider_dataarts::DataArtsProvider;
//! use serde_json::json;
//!
//! let tester = ProviderTester::new(DataArtsProvider::new());
//! tester.configure(json!({"region": "cn-north-4", "project_id": "p", "auth_token": "t"})).await?;
//! let state = tester.apply("dataarts_security_permission_set", config).await?;
//! ```

use serde_json::Value;
use thiserror::Error;

use crate::error::ProviderError;
use crate::schema::Diagnostic;
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// A failed tester call: either error diagnostics or a provider error.
#[derive(Debug, Error)]
pub enum TestError {
    #[error("{}", format_diagnostics(.0))]
    Diagnostics(Vec<Diagnostic>),
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| {
            let mut line = d.summary.clone();
            if let Some(detail) = &d.detail {
                line.push_str(": ");
                line.push_str(detail);
            }
            if let Some(attr) = &d.attribute {
                line.push_str(&format!(" (at {attr})"));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn errors_only(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Configure the provider; error diagnostics become [`TestError::Diagnostics`].
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        errors_only(self.provider.configure(config).await?)
    }

    pub async fn validate_resource_config(&self, resource_type: &str, config: Value) -> Result<(), TestError> {
        errors_only(self.provider.validate_resource_config(resource_type, config).await?)
    }

    pub async fn validate_data_source_config(&self, data_source_type: &str, config: Value) -> Result<(), TestError> {
        errors_only(self.provider.validate_data_source_config(data_source_type, config).await?)
    }

    pub async fn plan_create(&self, resource_type: &str, config: Value) -> Result<PlanResult, ProviderError> {
        self.provider.plan(resource_type, None, config.clone(), config).await
    }

    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), config.clone(), config)
            .await
    }

    pub async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    pub async fn read(&self, resource_type: &str, state: Value) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, state).await
    }

    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.update(resource_type, prior_state, planned_state).await
    }

    pub async fn delete(&self, resource_type: &str, state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, state).await
    }

    pub async fn import(&self, resource_type: &str, id: &str) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    pub async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        self.provider.read_data_source(data_source_type, config).await
    }

    /// Validate, plan and create a resource from `config`.
    pub async fn apply(&self, resource_type: &str, config: Value) -> Result<Value, TestError> {
        self.validate_resource_config(resource_type, config.clone()).await?;
        let plan = self.plan_create(resource_type, config).await?;
        Ok(self.create(resource_type, plan.planned_state).await?)
    }

    /// Plan `config` against `prior_state` and apply the update.
    pub async fn apply_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<Value, TestError> {
        let plan = self.plan_update(resource_type, prior_state.clone(), config).await?;
        if plan.requires_replace {
            return Err(TestError::Diagnostics(vec![Diagnostic::error(format!(
                "{resource_type} update requires replacement"
            ))]));
        }
        Ok(self.update(resource_type, prior_state, plan.planned_state).await?)
    }
}

/// # Panics
///
/// Panics unless the plan creates without replacing.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(!plan.changes.is_empty(), "expected a create plan, got no changes");
    assert!(!plan.requires_replace, "expected a create plan, got a replacement");
}

pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "expected no changes, got {:?}",
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(plan.requires_replace, "expected the plan to require replacement");
}

pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(plan.has_changes(), "expected an update, got no changes");
    assert!(!plan.requires_replace, "expected an in-place update, got a replacement");
}

pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "expected a change to '{}', changed: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

pub fn assert_plan_does_not_change_attribute(plan: &PlanResult, path: &str) {
    assert!(
        !plan.changes.iter().any(|c| c.path == path),
        "expected '{}' to stay unchanged",
        path
    );
}

pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).map(|d| &d.summary).collect();
    assert!(errors.is_empty(), "expected no errors, got {:?}", errors);
}

pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    assert!(
        diagnostics.iter().any(|d| d.is_error() && d.summary.contains(substring)),
        "expected an error containing '{}', got {:?}",
        substring,
        diagnostics.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}
