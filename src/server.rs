//! gRPC plumbing for the provider process.
//!
//! [`ProviderService`] is the JSON-level interface the provider implements.
//! The private `ProviderGrpcService` adapts it to the generated
//! `hemmer.provider.v1.Provider` service: payloads are decoded from and
//! encoded to JSON bytes, and provider errors come back as error diagnostics.
//!
//! [`serve`] binds a local port, prints the handshake line on stdout and
//! serves until SIGTERM or SIGINT. After the signal, in-flight requests get
//! [`ServeOptions::shutdown_timeout`] to finish before
//! [`ProviderService::stop`] runs.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderError;
use crate::generated as pb;
use crate::schema::{Block, BlockNestingMode, Diagnostic, DiagnosticSeverity, ProviderSchema, Schema};
use crate::types::{ImportedResource, PlanResult, ProviderMetadata, HANDSHAKE_PREFIX, PROTOCOL_VERSION};

/// Operations a provider answers, expressed over `serde_json::Value`.
///
/// Methods with a reasonable fallback have default bodies.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    fn schema(&self) -> ProviderSchema;

    /// Type names served by the provider. Derived from [`Self::schema`].
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        ProviderMetadata {
            resources: schema.resources.keys().cloned().collect(),
            data_sources: schema.data_sources.keys().cloned().collect(),
            capabilities: Default::default(),
        }
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Apply the provider block. Error diagnostics leave the provider unconfigured.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Every schema is at version 0, so states pass through unchanged.
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (resource_type, version);
        Ok(state)
    }

    /// `prior_state` is `None` on create; a null `proposed_state` plans a destroy.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    /// Refresh a state. `Value::Null` means the remote object no longer exists.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError>;

    async fn update(&self, resource_type: &str, prior_state: Value, planned_state: Value)
        -> Result<Value, ProviderError>;

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    async fn import_resource(&self, resource_type: &str, id: &str) -> Result<Vec<ImportedResource>, ProviderError> {
        let _ = id;
        Err(ProviderError::Unimplemented(format!("{resource_type} does not support import")))
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (data_source_type, config);
        Ok(vec![])
    }

    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        let _ = config;
        Err(ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

/// Decode a JSON payload. An empty or malformed payload reads as `null`.
fn decode(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes).unwrap_or_else(|e| {
        warn!(error = %e, "discarding malformed JSON payload");
        Value::Null
    })
}

/// Encode a JSON payload. `null` is sent as an empty payload.
fn encode(value: &Value) -> Vec<u8> {
    if value.is_null() {
        return Vec::new();
    }
    serde_json::to_vec(value).unwrap_or_default()
}

fn diagnostic_to_proto(d: Diagnostic) -> pb::Diagnostic {
    let severity = match d.severity {
        DiagnosticSeverity::Error => pb::diagnostic::Severity::Error,
        DiagnosticSeverity::Warning => pb::diagnostic::Severity::Warning,
    };
    pb::Diagnostic {
        severity: severity as i32,
        summary: d.summary,
        detail: d.detail.unwrap_or_default(),
        attribute: d.attribute.unwrap_or_default(),
    }
}

fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<pb::Diagnostic> {
    diagnostics.into_iter().map(diagnostic_to_proto).collect()
}

fn error_to_diagnostics(err: &ProviderError) -> Vec<pb::Diagnostic> {
    let detail = match err {
        ProviderError::Http { status, .. } => format!("HTTP status {status}"),
        _ => String::new(),
    };
    vec![pb::Diagnostic {
        severity: pb::diagnostic::Severity::Error as i32,
        summary: err.to_string(),
        detail,
        attribute: String::new(),
    }]
}

/// Log the outcome of a validation-style RPC and convert it.
fn validation_outcome(
    rpc: &str,
    type_name: &str,
    result: Result<Vec<Diagnostic>, ProviderError>,
) -> Vec<pb::Diagnostic> {
    match result {
        Ok(diagnostics) => {
            let errors = diagnostics.iter().filter(|d| d.is_error()).count();
            if errors > 0 {
                warn!(type_name, errors, "{rpc} reported errors");
            } else {
                debug!(type_name, warnings = diagnostics.len(), "{rpc} passed");
            }
            diagnostics_to_proto(diagnostics)
        },
        Err(e) => {
            error!(type_name, error = %e, "{rpc} failed");
            error_to_diagnostics(&e)
        },
    }
}

fn schema_to_proto(schema: &Schema) -> pb::Schema {
    pb::Schema {
        version: schema.version as i64,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn block_to_proto(block: &Block) -> pb::Block {
    let attributes = block
        .attributes
        .iter()
        .map(|(name, attr)| pb::Attribute {
            name: name.clone(),
            r#type: serde_json::to_vec(&attr.attr_type).unwrap_or_default(),
            required: attr.flags.required,
            optional: attr.flags.optional,
            computed: attr.flags.computed,
            sensitive: attr.flags.sensitive,
            description: attr.description.clone().unwrap_or_default(),
            force_new: attr.force_new,
            default_value: attr.default.as_ref().map(encode).unwrap_or_default(),
        })
        .collect();
    let block_types = block
        .blocks
        .iter()
        .map(|(name, nested)| {
            let mode = match nested.nesting_mode {
                BlockNestingMode::Single => pb::nested_block::NestingMode::Single,
                BlockNestingMode::List => pb::nested_block::NestingMode::List,
                BlockNestingMode::Set => pb::nested_block::NestingMode::Set,
                BlockNestingMode::Map => pb::nested_block::NestingMode::Map,
            };
            pb::NestedBlock {
                type_name: name.clone(),
                block: Some(block_to_proto(&nested.block)),
                nesting_mode: mode as i32,
                min_items: nested.min_items as i32,
                max_items: nested.max_items as i32,
            }
        })
        .collect();
    pb::Block {
        attributes,
        block_types,
        description: block.description.clone().unwrap_or_default(),
    }
}

/// Adapts a [`ProviderService`] to the generated gRPC trait.
struct ProviderGrpcService<P: ProviderService> {
    provider: Arc<P>,
}

#[tonic::async_trait]
impl<P: ProviderService> pb::provider_server::Provider for ProviderGrpcService<P> {
    #[instrument(skip_all, name = "grpc.get_metadata")]
    async fn get_metadata(
        &self,
        _request: Request<pb::GetMetadataRequest>,
    ) -> Result<Response<pb::GetMetadataResponse>, Status> {
        let metadata = self.provider.metadata();
        debug!(
            resources = metadata.resources.len(),
            data_sources = metadata.data_sources.len(),
            "metadata served"
        );
        Ok(Response::new(pb::GetMetadataResponse {
            server_capabilities: Some(pb::ServerCapabilities {
                plan_destroy: metadata.capabilities.plan_destroy,
            }),
            resources: metadata.resources,
            data_sources: metadata.data_sources,
            diagnostics: vec![],
        }))
    }

    #[instrument(skip_all, name = "grpc.get_schema")]
    async fn get_schema(
        &self,
        _request: Request<pb::GetSchemaRequest>,
    ) -> Result<Response<pb::GetSchemaResponse>, Status> {
        let schema = self.provider.schema();
        let convert = |schemas: &std::collections::HashMap<String, Schema>| {
            schemas
                .iter()
                .map(|(name, s)| (name.clone(), schema_to_proto(s)))
                .collect()
        };
        Ok(Response::new(pb::GetSchemaResponse {
            provider: Some(schema_to_proto(&schema.provider)),
            resources: convert(&schema.resources),
            data_sources: convert(&schema.data_sources),
            diagnostics: vec![],
        }))
    }

    #[instrument(skip_all, name = "grpc.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        request: Request<pb::ValidateProviderConfigRequest>,
    ) -> Result<Response<pb::ValidateProviderConfigResponse>, Status> {
        let config = decode(&request.into_inner().config);
        let result = self.provider.validate_provider_config(config).await;
        Ok(Response::new(pb::ValidateProviderConfigResponse {
            diagnostics: validation_outcome("ValidateProviderConfig", "provider", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.configure")]
    async fn configure(
        &self,
        request: Request<pb::ConfigureRequest>,
    ) -> Result<Response<pb::ConfigureResponse>, Status> {
        let config = decode(&request.into_inner().config);
        let result = self.provider.configure(config).await;
        if matches!(&result, Ok(d) if !d.iter().any(Diagnostic::is_error)) {
            info!("provider configured");
        }
        Ok(Response::new(pb::ConfigureResponse {
            diagnostics: validation_outcome("Configure", "provider", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.stop")]
    async fn stop(&self, _request: Request<pb::StopRequest>) -> Result<Response<pb::StopResponse>, Status> {
        let error = match self.provider.stop().await {
            Ok(()) => String::new(),
            Err(e) => {
                error!(error = %e, "stop failed");
                e.to_string()
            },
        };
        Ok(Response::new(pb::StopResponse { error }))
    }

    #[instrument(skip_all, name = "grpc.validate_resource_config", fields(resource_type = tracing::field::Empty))]
    async fn validate_resource_config(
        &self,
        request: Request<pb::ValidateResourceConfigRequest>,
    ) -> Result<Response<pb::ValidateResourceConfigResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let result = self
            .provider
            .validate_resource_config(&req.resource_type, decode(&req.config))
            .await;
        Ok(Response::new(pb::ValidateResourceConfigResponse {
            diagnostics: validation_outcome("ValidateResourceConfig", &req.resource_type, result),
        }))
    }

    #[instrument(skip_all, name = "grpc.upgrade_resource_state", fields(resource_type = tracing::field::Empty))]
    async fn upgrade_resource_state(
        &self,
        request: Request<pb::UpgradeResourceStateRequest>,
    ) -> Result<Response<pb::UpgradeResourceStateResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let state = decode(&req.raw_state);
        let response = match self
            .provider
            .upgrade_resource_state(&req.resource_type, req.version, state)
            .await
        {
            Ok(upgraded) => pb::UpgradeResourceStateResponse {
                upgraded_state: encode(&upgraded),
                diagnostics: vec![],
            },
            Err(e) => {
                error!(version = req.version, error = %e, "state upgrade failed");
                pb::UpgradeResourceStateResponse {
                    upgraded_state: vec![],
                    diagnostics: error_to_diagnostics(&e),
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.plan", fields(resource_type = tracing::field::Empty))]
    async fn plan(&self, request: Request<pb::PlanRequest>) -> Result<Response<pb::PlanResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let prior = Some(decode(&req.prior_state)).filter(|v| !v.is_null());
        let proposed = decode(&req.proposed_state);
        let config = decode(&req.config);

        let response = match self.provider.plan(&req.resource_type, prior, proposed, config).await {
            Ok(plan) => {
                debug!(
                    changes = plan.changes.len(),
                    requires_replace = plan.requires_replace,
                    "plan computed"
                );
                pb::PlanResponse {
                    planned_state: encode(&plan.planned_state),
                    changes: plan.changes.into_iter().map(Into::into).collect(),
                    requires_replace: plan.requires_replace,
                    diagnostics: vec![],
                }
            },
            Err(e) => {
                error!(error = %e, "plan failed");
                pb::PlanResponse {
                    diagnostics: error_to_diagnostics(&e),
                    ..Default::default()
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.create", fields(resource_type = tracing::field::Empty))]
    async fn create(&self, request: Request<pb::CreateRequest>) -> Result<Response<pb::CreateResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let response = match self.provider.create(&req.resource_type, decode(&req.planned_state)).await {
            Ok(state) => pb::CreateResponse {
                state: encode(&state),
                diagnostics: vec![],
            },
            Err(e) => {
                error!(error = %e, "create failed");
                pb::CreateResponse {
                    state: vec![],
                    diagnostics: error_to_diagnostics(&e),
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.read", fields(resource_type = tracing::field::Empty))]
    async fn read(&self, request: Request<pb::ReadRequest>) -> Result<Response<pb::ReadResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let response = match self.provider.read(&req.resource_type, decode(&req.current_state)).await {
            Ok(state) => pb::ReadResponse {
                state: encode(&state),
                diagnostics: vec![],
            },
            Err(e) => {
                error!(error = %e, "read failed");
                pb::ReadResponse {
                    state: vec![],
                    diagnostics: error_to_diagnostics(&e),
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.update", fields(resource_type = tracing::field::Empty))]
    async fn update(&self, request: Request<pb::UpdateRequest>) -> Result<Response<pb::UpdateResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let prior = decode(&req.prior_state);
        let planned = decode(&req.planned_state);
        let response = match self.provider.update(&req.resource_type, prior, planned).await {
            Ok(state) => pb::UpdateResponse {
                state: encode(&state),
                diagnostics: vec![],
            },
            Err(e) => {
                error!(error = %e, "update failed");
                pb::UpdateResponse {
                    state: vec![],
                    diagnostics: error_to_diagnostics(&e),
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.delete", fields(resource_type = tracing::field::Empty))]
    async fn delete(&self, request: Request<pb::DeleteRequest>) -> Result<Response<pb::DeleteResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let diagnostics = match self.provider.delete(&req.resource_type, decode(&req.current_state)).await {
            Ok(()) => vec![],
            Err(e) => {
                error!(error = %e, "delete failed");
                error_to_diagnostics(&e)
            },
        };
        Ok(Response::new(pb::DeleteResponse { diagnostics }))
    }

    #[instrument(
        skip_all,
        name = "grpc.import_resource_state",
        fields(resource_type = tracing::field::Empty, id = tracing::field::Empty)
    )]
    async fn import_resource_state(
        &self,
        request: Request<pb::ImportResourceStateRequest>,
    ) -> Result<Response<pb::ImportResourceStateResponse>, Status> {
        let req = request.into_inner();
        let span = tracing::Span::current();
        span.record("resource_type", req.resource_type.as_str());
        span.record("id", req.id.as_str());
        let response = match self.provider.import_resource(&req.resource_type, &req.id).await {
            Ok(imported) => {
                info!(count = imported.len(), "import completed");
                pb::ImportResourceStateResponse {
                    imported: imported
                        .into_iter()
                        .map(|r| pb::ImportedResource {
                            resource_type: r.resource_type,
                            state: encode(&r.state),
                        })
                        .collect(),
                    diagnostics: vec![],
                }
            },
            Err(e) => {
                error!(error = %e, "import failed");
                pb::ImportResourceStateResponse {
                    imported: vec![],
                    diagnostics: error_to_diagnostics(&e),
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.validate_data_source_config", fields(data_source_type = tracing::field::Empty))]
    async fn validate_data_source_config(
        &self,
        request: Request<pb::ValidateDataSourceConfigRequest>,
    ) -> Result<Response<pb::ValidateDataSourceConfigResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("data_source_type", req.data_source_type.as_str());
        let result = self
            .provider
            .validate_data_source_config(&req.data_source_type, decode(&req.config))
            .await;
        Ok(Response::new(pb::ValidateDataSourceConfigResponse {
            diagnostics: validation_outcome("ValidateDataSourceConfig", &req.data_source_type, result),
        }))
    }

    #[instrument(skip_all, name = "grpc.read_data_source", fields(data_source_type = tracing::field::Empty))]
    async fn read_data_source(
        &self,
        request: Request<pb::ReadDataSourceRequest>,
    ) -> Result<Response<pb::ReadDataSourceResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("data_source_type", req.data_source_type.as_str());
        let response = match self
            .provider
            .read_data_source(&req.data_source_type, decode(&req.config))
            .await
        {
            Ok(state) => pb::ReadDataSourceResponse {
                state: encode(&state),
                diagnostics: vec![],
            },
            Err(e) => {
                error!(error = %e, "data source read failed");
                pb::ReadDataSourceResponse {
                    state: vec![],
                    diagnostics: error_to_diagnostics(&e),
                }
            },
        };
        Ok(Response::new(response))
    }
}

/// Settings for [`serve_with_options`] and [`serve_on_with_options`].
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// How long in-flight requests may run once a shutdown signal arrives.
    pub shutdown_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Resolves on SIGTERM or SIGINT (CTRL+C on Windows).
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("received SIGTERM"),
                    _ = sigint.recv() => info!("received SIGINT"),
                }
                return;
            },
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "unable to install signal handlers, falling back to CTRL+C");
            },
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received CTRL+C"),
        Err(e) => {
            warn!(error = %e, "unable to listen for CTRL+C, serving until the process is killed");
            std::future::pending::<()>().await;
        },
    }
}

/// Serve `provider` on a free local port.
///
/// Prints `HEMMER_PROVIDER|<protocol version>|<address>` on stdout once the
/// listener is bound, then serves until a shutdown signal.
pub async fn serve<P: ProviderService>(provider: P) -> Result<(), Box<dyn std::error::Error>> {
    serve_with_options(provider, ServeOptions::default()).await
}

pub async fn serve_with_options<P: ProviderService>(
    provider: P,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    serve_on_with_options(provider, SocketAddr::from(([127, 0, 0, 1], 0)), options).await
}

/// Like [`serve`], on a fixed address.
pub async fn serve_on<P: ProviderService>(provider: P, addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    serve_on_with_options(provider, addr, ServeOptions::default()).await
}

pub async fn serve_on_with_options<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    run(Arc::new(provider), listener, options, wait_for_shutdown_signal()).await
}

async fn run<P, F>(
    provider: Arc<P>,
    listener: TcpListener,
    options: ServeOptions,
    shutdown_signal: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    P: ProviderService,
    F: std::future::Future<Output = ()>,
{
    let addr = listener.local_addr()?;
    println!("{}|{}|{}", HANDSHAKE_PREFIX, PROTOCOL_VERSION, addr);
    info!(address = %addr, "provider listening");

    let service = pb::provider_server::ProviderServer::new(ProviderGrpcService {
        provider: Arc::clone(&provider),
    });
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = Server::builder().add_service(service).serve_with_incoming_shutdown(
        tokio_stream::wrappers::TcpListenerStream::new(listener),
        async {
            let _ = stop_rx.await;
        },
    );
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => result?,
        () = shutdown_signal => {
            let _ = stop_tx.send(());
            // The grace period starts once the signal is in.
            match tokio::time::timeout(options.shutdown_timeout, &mut server).await {
                Ok(Ok(())) => info!("in-flight requests drained"),
                Ok(Err(e)) => {
                    error!(error = %e, "server error during shutdown");
                    return Err(e.into());
                },
                Err(_) => {
                    warn!(timeout = ?options.shutdown_timeout, "shutdown timeout exceeded, dropping open requests");
                },
            }
        },
    }

    if let Err(e) = provider.stop().await {
        warn!(error = %e, "provider stop failed");
    }
    info!("provider stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, NestedBlock};
    use serde_json::json;

    #[test]
    fn test_decode_and_encode_null() {
        assert_eq!(decode(b""), Value::Null);
        assert_eq!(decode(b"not json"), Value::Null);
        assert_eq!(decode(br#"{"id":"a"}"#), json!({"id": "a"}));
        assert!(encode(&Value::Null).is_empty());
        assert_eq!(encode(&json!({"id": "a"})), br#"{"id":"a"}"#.to_vec());
    }

    #[test]
    fn test_error_to_diagnostics() {
        let diagnostics = error_to_diagnostics(&ProviderError::Http {
            status: 500,
            body: "boom".to_string(),
        });
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, pb::diagnostic::Severity::Error as i32);
        assert!(diagnostics[0].summary.contains("boom"));
        assert_eq!(diagnostics[0].detail, "HTTP status 500");
    }

    #[test]
    fn test_diagnostic_to_proto() {
        let warning = Diagnostic::warning("auth_token is not configured").with_attribute("auth_token");
        let proto = diagnostic_to_proto(warning);
        assert_eq!(proto.severity, pb::diagnostic::Severity::Warning as i32);
        assert_eq!(proto.attribute, "auth_token");
        assert!(proto.detail.is_empty());
    }

    #[test]
    fn test_block_to_proto() {
        let block = Block::new()
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute("dlm_type", Attribute::optional_string().with_default(json!("SHARED")))
            .with_block(
                "nodes",
                NestedBlock::list(Block::new().with_attribute("name", Attribute::required_string())).with_min_items(1),
            );
        let proto = block_to_proto(&block);
        let name = proto.attributes.iter().find(|a| a.name == "name").unwrap();
        assert!(name.required && name.force_new);
        let dlm_type = proto.attributes.iter().find(|a| a.name == "dlm_type").unwrap();
        assert_eq!(dlm_type.default_value, br#""SHARED""#.to_vec());
        assert_eq!(proto.block_types[0].type_name, "nodes");
        assert_eq!(proto.block_types[0].nesting_mode, pb::nested_block::NestingMode::List as i32);
        assert_eq!(proto.block_types[0].min_items, 1);
    }
}
