// Adapters layer: concrete implementations for external systems (database, http, files)

pub mod catalog;
pub mod csv_source;
pub mod provider_api;
pub mod storage;
