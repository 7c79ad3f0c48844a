//! AutoFinder vector crate - embedding services, constraint filters, the
//! in-memory vector index, and the catalog index built on top of them.
//!
//! Provides brute-force cosine search restricted by a constraint-derived
//! filter, persistence keyed by a catalog signature, and a lazily initialized
//! [`CatalogIndex`] shared across requests.

pub mod catalog_index;
pub mod embedding;
pub mod filter;
pub mod index;

pub use catalog_index::{reset_index, CatalogIndex, WarmupReport};
pub use embedding::{DynEmbeddingService, EmbeddingService, HashEmbedding, OnnxEmbeddingService};
pub use filter::{CatalogFilter, Condition};
pub use index::{IndexModel, SearchHit, VectorIndex};
