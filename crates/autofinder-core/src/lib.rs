pub mod catalog;
pub mod config;
pub mod error;
pub mod types;

pub use catalog::{load_catalog, CatalogSignature};
pub use config::AutoFinderConfig;
pub use error::{AutoFinderError, Result};
pub use types::*;
