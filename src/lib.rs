pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::{CliConfig, Command};

pub use adapters::catalog::Catalog;
pub use adapters::csv_source::CsvSource;
pub use adapters::provider_api::ProviderApiSource;
pub use adapters::storage::LocalStorage;
pub use config::ImportSettings;
pub use core::importer::{BatchImporter, ImportOptions, ImportRequest};
pub use domain::model::{AdjustmentKind, AdjustmentPolicy, ImportResult, SourceKind};
pub use utils::error::{ImportError, Result};
