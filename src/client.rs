//! REST client for the DataArts Studio APIs.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::mutexkv::MutexKV;

/// Maximum number of characters of a response body written to the log.
const MAX_LOG_BODY_LENGTH: usize = 200;

const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Truncate a response body and strip control characters before logging it.
fn sanitize_for_log(body: &str) -> String {
    let total = body.chars().count();
    let truncated: String = if total > MAX_LOG_BODY_LENGTH {
        let head: String = body.chars().take(MAX_LOG_BODY_LENGTH).collect();
        format!("{}... [truncated, {} chars total]", head, total)
    } else {
        body.to_string()
    };
    truncated.replace(|c: char| c.is_control(), "")
}

/// Shared client built once in `Configure`.
#[derive(Debug)]
pub struct Client {
    http: reqwest::Client,
    config: ProviderConfig,
    mutex_kv: Arc<MutexKV>,
}

impl Client {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("hemmer-provider-dataarts/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http,
            config,
            mutex_kv: Arc::new(MutexKV::new()),
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// The provider-level region.
    pub fn region(&self) -> Result<&str, ProviderError> {
        self.config.region()
    }

    pub fn mutex_kv(&self) -> &MutexKV {
        &self.mutex_kv
    }

    /// A client bound to the endpoint of `product` in `region`.
    pub fn service_client(&self, product: &str, region: &str) -> Result<ServiceClient, ProviderError> {
        Ok(ServiceClient {
            http: self.http.clone(),
            endpoint: self.config.endpoint(product, region)?,
            project_id: self.config.project_id()?.to_string(),
            token: self.config.auth_token.clone(),
        })
    }
}

/// Extra request settings.
#[derive(Debug, Clone, Default)]
pub struct RequestOpts {
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Accepted statuses. Empty means any 2xx.
    pub ok_codes: Vec<u16>,
}

impl RequestOpts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// Add a query parameter only when `value` is set and non-empty.
    pub fn query_opt(self, name: impl Into<String>, value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() => self.query(name, v),
            _ => self,
        }
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn ok_codes(mut self, codes: &[u16]) -> Self {
        self.ok_codes = codes.to_vec();
        self
    }

    fn accepts(&self, status: u16) -> bool {
        if self.ok_codes.is_empty() {
            (200..300).contains(&status)
        } else {
            self.ok_codes.contains(&status)
        }
    }
}

/// A client bound to one product endpoint.
#[derive(Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    endpoint: String,
    project_id: String,
    token: Option<String>,
}

impl ServiceClient {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Resolve a relative API path, substituting `{project_id}`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path.replace("{project_id}", &self.project_id))
    }

    /// Send a request and parse the JSON response. An empty body yields `null`.
    pub async fn request(&self, method: Method, path: &str, opts: RequestOpts) -> Result<Value, ProviderError> {
        let url = self.url(path);
        tracing::debug!("{} {}", method, url);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.token {
            headers.insert(AUTH_TOKEN_HEADER, header_value(token)?);
        }
        for (name, value) in &opts.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ProviderError::InvalidRequest(format!("invalid header name {name}: {e}")))?;
            headers.insert(name, header_value(value)?);
        }

        let mut request = self.http.request(method, &url).headers(headers);
        if !opts.query.is_empty() {
            request = request.query(&opts.query);
        }
        if let Some(body) = &opts.body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        if !opts.accepts(status) {
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(ProviderError::from_status(status, body));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn get(&self, path: &str, opts: RequestOpts) -> Result<Value, ProviderError> {
        self.request(Method::GET, path, opts).await
    }

    pub async fn post(&self, path: &str, opts: RequestOpts) -> Result<Value, ProviderError> {
        self.request(Method::POST, path, opts).await
    }

    pub async fn put(&self, path: &str, opts: RequestOpts) -> Result<Value, ProviderError> {
        self.request(Method::PUT, path, opts).await
    }

    pub async fn delete(&self, path: &str, opts: RequestOpts) -> Result<Value, ProviderError> {
        self.request(Method::DELETE, path, opts).await
    }
}

fn header_value(value: &str) -> Result<HeaderValue, ProviderError> {
    HeaderValue::from_str(value).map_err(|e| ProviderError::InvalidRequest(format!("invalid header value: {e}")))
}
