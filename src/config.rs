//! Provider configuration block.
//!
//! Values set in the configuration win; anything left unset falls back to the
//! `HW_*` environment variables.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, Diagnostic, Schema};

pub const ENV_REGION: &str = "HW_REGION_NAME";
pub const ENV_PROJECT_ID: &str = "HW_PROJECT_ID";
pub const ENV_AUTH_TOKEN: &str = "HW_AUTH_TOKEN";

/// Seconds allowed for a single REST call when `request_timeout` is unset.
pub const DEFAULT_REQUEST_TIMEOUT: u64 = 60;

/// Product serving the architecture, data-service and security APIs.
pub const PRODUCT_DATAARTS: &str = "dataarts";
/// Product serving the factory (job orchestration) APIs.
pub const PRODUCT_DATAARTS_DLF: &str = "dataarts-dlf";

const ENDPOINT_TEMPLATES: &[(&str, &str)] = &[
    (PRODUCT_DATAARTS, "https://dayu.{region}.myhuaweicloud.com/"),
    (PRODUCT_DATAARTS_DLF, "https://dayu-dlf.{region}.myhuaweicloud.com/"),
];

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT
}

#[derive(Clone, Default, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Per-product endpoint overrides, keyed by product name.
    #[serde(default)]
    pub endpoints: HashMap<String, String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("region", &self.region)
            .field("project_id", &self.project_id)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("endpoints", &self.endpoints)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ProviderConfig {
    /// The schema of the `provider` configuration block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description("Connection settings for DataArts Studio")
            .with_attribute(
                "region",
                Attribute::optional_string().with_description(format!(
                    "Region of the DataArts Studio instance. Falls back to {ENV_REGION}."
                )),
            )
            .with_attribute(
                "project_id",
                Attribute::optional_string()
                    .with_description(format!("Project ID. Falls back to {ENV_PROJECT_ID}.")),
            )
            .with_attribute(
                "auth_token",
                Attribute::optional_string()
                    .sensitive()
                    .with_description(format!("IAM token sent as X-Auth-Token. Falls back to {ENV_AUTH_TOKEN}.")),
            )
            .with_attribute(
                "endpoints",
                Attribute::string_map(AttributeFlags::optional())
                    .with_description("Endpoint overrides keyed by product (dataarts, dataarts-dlf)"),
            )
            .with_attribute(
                "request_timeout",
                Attribute::optional_int64()
                    .with_default(Value::from(DEFAULT_REQUEST_TIMEOUT))
                    .with_description("Timeout of a single API call, in seconds"),
            )
    }

    /// Parse the raw configuration. A `null` config yields the defaults.
    pub fn from_value(value: &Value) -> Result<Self, ProviderError> {
        if value.is_null() {
            return Ok(Self {
                request_timeout: DEFAULT_REQUEST_TIMEOUT,
                ..Default::default()
            });
        }
        // Null entries are dropped so that serde defaults apply to them.
        let cleaned = crate::utils::remove_nil(value.clone());
        serde_json::from_value(cleaned)
            .map_err(|e| ProviderError::Configuration(format!("invalid provider configuration: {e}")))
    }

    /// Fill unset values from the process environment.
    pub fn with_env_fallbacks(self) -> Self {
        self.with_fallbacks(|key| std::env::var(key).ok())
    }

    pub(crate) fn with_fallbacks(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let pick = |current: Option<String>, key: &str| {
            current
                .filter(|v| !v.is_empty())
                .or_else(|| lookup(key).filter(|v| !v.is_empty()))
        };
        self.region = pick(self.region.take(), ENV_REGION);
        self.project_id = pick(self.project_id.take(), ENV_PROJECT_ID);
        self.auth_token = pick(self.auth_token.take(), ENV_AUTH_TOKEN);
        self
    }

    /// Diagnostics for a configuration that cannot be used.
    pub fn check(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if self.region.is_none() {
            diagnostics.push(
                Diagnostic::error("region is not configured")
                    .with_detail(format!("Set `region` in the provider block or {ENV_REGION}"))
                    .with_attribute("region"),
            );
        }
        if self.project_id.is_none() {
            diagnostics.push(
                Diagnostic::error("project_id is not configured")
                    .with_detail(format!("Set `project_id` in the provider block or {ENV_PROJECT_ID}"))
                    .with_attribute("project_id"),
            );
        }
        if self.auth_token.is_none() {
            diagnostics.push(
                Diagnostic::warning("auth_token is not configured")
                    .with_detail(format!("Requests are sent without X-Auth-Token; set {ENV_AUTH_TOKEN}"))
                    .with_attribute("auth_token"),
            );
        }
        if self.request_timeout == 0 {
            diagnostics.push(
                Diagnostic::error("request_timeout must be greater than zero").with_attribute("request_timeout"),
            );
        }
        for (product, endpoint) in &self.endpoints {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                diagnostics.push(
                    Diagnostic::error(format!("invalid endpoint for {product}"))
                        .with_detail(format!("`{endpoint}` is not an http(s) URL"))
                        .with_attribute(format!("endpoints.{product}")),
                );
            }
        }
        diagnostics
    }

    pub fn region(&self) -> Result<&str, ProviderError> {
        self.region
            .as_deref()
            .ok_or_else(|| ProviderError::Configuration("region is not configured".to_string()))
    }

    pub fn project_id(&self) -> Result<&str, ProviderError> {
        self.project_id
            .as_deref()
            .ok_or_else(|| ProviderError::Configuration("project_id is not configured".to_string()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Base URL of `product` in `region`, always ending in `/`.
    pub fn endpoint(&self, product: &str, region: &str) -> Result<String, ProviderError> {
        let raw = match self.endpoints.get(product) {
            Some(custom) => custom.clone(),
            None => ENDPOINT_TEMPLATES
                .iter()
                .find(|(name, _)| *name == product)
                .map(|(_, template)| template.replace("{region}", region))
                .ok_or_else(|| ProviderError::Configuration(format!("unknown product: {product}")))?,
        };
        Ok(if raw.ends_with('/') { raw } else { format!("{raw}/") })
    }
}
