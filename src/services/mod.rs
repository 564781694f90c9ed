//! Resource and data source implementations.
//!
//! Each resource owns its schema and CRUD handlers; the provider only
//! dispatches by type name.

use async_trait::async_trait;

use crate::client::Client;
use crate::error::ProviderError;
use crate::schema::Schema;
use crate::state::ResourceData;
use crate::utils::parse_import_id;

pub mod dataarts;

/// A managed resource type.
///
/// Handlers work on a [`ResourceData`] holding the planned (or current)
/// state. After `create`, `update` and `import` the provider calls `read`,
/// so those handlers only need to leave the ID and the identifying
/// attributes in place.
#[async_trait]
pub trait Resource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    async fn create(&self, client: &Client, data: &mut ResourceData) -> Result<(), ProviderError>;

    /// Refresh `data` from the API. Returns [`ProviderError::NotFound`] when
    /// the remote object is gone.
    async fn read(&self, client: &Client, data: &mut ResourceData) -> Result<(), ProviderError>;

    async fn update(&self, client: &Client, prior: &ResourceData, data: &mut ResourceData)
        -> Result<(), ProviderError>;

    /// Remove the remote object. A [`ProviderError::NotFound`] is treated as
    /// success by the caller.
    async fn delete(&self, client: &Client, data: &ResourceData) -> Result<(), ProviderError>;

    /// Shape of the import ID, used in error messages.
    fn import_format(&self) -> &'static str {
        "<workspace_id>/<id>"
    }

    /// Seed a state from an import ID.
    async fn import(&self, _client: &Client, id: &str) -> Result<ResourceData, ProviderError> {
        let parts = parse_import_id(id, 2, self.import_format())?;
        let mut data = ResourceData::default();
        data.set("workspace_id", parts[0].into());
        data.set_id(parts[1]);
        Ok(data)
    }
}

/// A read-only data source type.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// Fill the computed attributes of `data` from the API.
    async fn read(&self, client: &Client, data: &mut ResourceData) -> Result<(), ProviderError>;
}

/// Every resource type served by the provider.
pub fn resources() -> Vec<Box<dyn Resource>> {
    use dataarts::*;
    vec![
        Box::new(ArchitectureDataStandard),
        Box::new(ArchitectureDataStandardTemplate),
        Box::new(ArchitectureCodeTable),
        Box::new(ArchitectureTableModel),
        Box::new(ArchitectureBusinessMetric),
        Box::new(DataServiceApi),
        Box::new(FactoryJob),
        Box::new(SecurityPermissionSet),
    ]
}

/// Every data source type served by the provider.
pub fn data_sources() -> Vec<Box<dyn DataSource>> {
    use dataarts::*;
    vec![Box::new(ArchitectureTableModels), Box::new(DataServiceApis)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_type_names_are_unique() {
        let names: Vec<_> = resources().iter().map(|r| r.type_name()).collect();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(names.len(), unique.len());
        assert_eq!(names.len(), 8);
        assert!(names.iter().all(|n| n.starts_with("dataarts_")));

        let ds: Vec<_> = data_sources().iter().map(|d| d.type_name()).collect();
        assert_eq!(ds, vec!["dataarts_architecture_table_models", "dataarts_dataservice_apis"]);
    }

    #[test]
    fn test_every_resource_has_id_and_region() {
        for resource in resources() {
            let schema = resource.schema();
            let id = &schema.block.attributes["id"];
            assert!(id.flags.is_computed_only(), "{}", resource.type_name());
            let region = &schema.block.attributes["region"];
            assert!(region.flags.optional && region.flags.computed && region.force_new);
        }
    }
}
