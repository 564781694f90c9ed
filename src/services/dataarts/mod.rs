//! DataArts Studio resources and data sources.

mod common;

mod architecture_business_metric;
mod architecture_code_table;
mod architecture_data_standard;
mod architecture_data_standard_template;
mod architecture_table_model;
mod architecture_table_models;
mod dataservice_api;
mod dataservice_apis;
mod factory_job;
mod security_permission_set;

pub use architecture_business_metric::ArchitectureBusinessMetric;
pub use architecture_code_table::ArchitectureCodeTable;
pub use architecture_data_standard::ArchitectureDataStandard;
pub use architecture_data_standard_template::ArchitectureDataStandardTemplate;
pub use architecture_table_model::ArchitectureTableModel;
pub use architecture_table_models::ArchitectureTableModels;
pub use dataservice_api::DataServiceApi;
pub use dataservice_apis::DataServiceApis;
pub use factory_job::FactoryJob;
pub use security_permission_set::SecurityPermissionSet;
pub use common::WORKSPACE_HEADER;
