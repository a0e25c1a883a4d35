pub mod importer;
pub mod normalizer;
pub mod price;
pub mod report;

pub use crate::domain::model::{ImportResult, ServiceRecord};
pub use crate::domain::ports::{RecordSource, Storage};
pub use crate::utils::error::Result;
