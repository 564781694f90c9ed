//! Hemmer provider for DataArts Studio.
//!
//! The provider manages DataArts Studio objects through the Hemmer provider
//! protocol:
//!
//! - **Architecture**: data standards, the data standard template, code
//!   tables, table models and business metrics
//! - **DataService**: APIs exposed over data connections
//! - **Factory**: orchestration jobs
//! - **Security**: permission sets
//!
//! and two data sources listing table models and DataService APIs.
//!
//! # Running
//!
//! The `hemmer-provider-dataarts` binary serves [`DataArtsProvider`] over
//! gRPC. On start it prints the handshake line
//!
//! ```text
//! HEMMER_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! and Hemmer connects to the address it names.
//!
//! # Layout
//!
//! - [`server`], [`schema`], [`validation`], [`plan`] and [`types`]: the
//!   provider protocol and the schema-driven plumbing around it
//! - [`config`] and [`client`]: the provider block and the REST client built
//!   from it
//! - [`services`]: one module per resource or data source type
//! - [`provider`]: dispatch from type names to [`services`]

#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod mutexkv;
pub mod plan;
pub mod provider;
pub mod schema;
pub mod server;
pub mod services;
pub mod state;
pub mod testing;
pub mod types;
pub mod utils;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use client::Client;
pub use config::ProviderConfig;
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::DataArtsProvider;
pub use schema::ProviderSchema;
pub use server::{serve, serve_on, serve_on_with_options, serve_with_options, ProviderService, ServeOptions};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities, HANDSHAKE_PREFIX,
    PROTOCOL_VERSION,
};
pub use validation::{is_valid, validate, validate_result};
