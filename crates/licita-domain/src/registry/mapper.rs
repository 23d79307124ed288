//! Data Mapper registry (spec C2): one [`crate::ports::mapper::DataMapper`]
//! per provider adapter, selected by provider name.

use std::collections::HashMap;

/// Configuration handed to a [`crate::ports::mapper::DataMapper`]
/// constructor.
#[derive(Debug, Clone, Default)]
pub struct MapperConfig {
    pub provider: String,
    pub extra: HashMap<String, String>,
}

crate::impl_registry!(
    provider_trait: crate::ports::mapper::DataMapper,
    config_type: MapperConfig,
    entry_type: MapperRegistryEntry,
    slice_name: DATA_MAPPERS,
    resolve_fn: resolve_data_mapper,
    list_fn: list_data_mappers
);
