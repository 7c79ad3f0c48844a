//! Catalog index: lazy build-or-reuse of the embedded catalog, and
//! constraint-restricted retrieval over it.
//!
//! The index directory holds `index.json` (vectors, texts, metadata and the
//! embedding model identity) and `catalog.sig` (the catalog signature recorded
//! at build time). At first use the current catalog signature is compared to
//! the recorded one: on match the persisted index is reused unmodified, on
//! mismatch the directory is discarded and every record is re-embedded.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use autofinder_core::catalog::{load_catalog, CatalogSignature};
use autofinder_core::error::{AutoFinderError, Result};
use autofinder_core::types::{ConstraintSet, VehicleRecord};

use crate::embedding::DynEmbeddingService;
use crate::filter::{vehicle_metadata, CatalogFilter};
use crate::index::{IndexModel, VectorIndex};

/// File name of the persisted vector index inside the index directory.
pub const INDEX_FILE: &str = "index.json";
/// File name of the recorded catalog signature inside the index directory.
pub const SIGNATURE_FILE: &str = "catalog.sig";

/// Outcome of bringing the index online.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmupReport {
    /// Entries available for retrieval.
    pub entries: usize,
    /// True when the index was rebuilt from the catalog, false when reused.
    pub rebuilt: bool,
    pub elapsed_ms: u128,
}

struct LoadedIndex {
    index: VectorIndex,
    report: WarmupReport,
}

/// Shared handle over the catalog's vector index.
///
/// Construct once at startup and share behind an `Arc`. The first call to
/// [`warmup`](Self::warmup) or [`retrieve`](Self::retrieve) initializes the
/// index; concurrent callers wait on that single initialization. A failed
/// initialization leaves the handle uninitialized so a later call retries.
pub struct CatalogIndex {
    catalog_path: PathBuf,
    index_dir: PathBuf,
    embedder: Arc<dyn DynEmbeddingService>,
    state: OnceCell<LoadedIndex>,
}

impl CatalogIndex {
    pub fn new(
        catalog_path: impl Into<PathBuf>,
        index_dir: impl Into<PathBuf>,
        embedder: Arc<dyn DynEmbeddingService>,
    ) -> Self {
        Self {
            catalog_path: catalog_path.into(),
            index_dir: index_dir.into(),
            embedder,
            state: OnceCell::new(),
        }
    }

    /// Fail with `CatalogMissing` unless the catalog file exists. Does not
    /// load or index anything.
    pub fn check_catalog(&self) -> Result<CatalogSignature> {
        CatalogSignature::of_file(&self.catalog_path)
    }

    /// True once the index has been loaded or built.
    pub fn is_ready(&self) -> bool {
        self.state.initialized()
    }

    /// Load or build the index now, outside the request path.
    pub async fn warmup(&self) -> Result<WarmupReport> {
        Ok(self.loaded().await?.report)
    }

    /// Return at most `k` catalog records satisfying `constraints`, most
    /// similar to `query` first.
    ///
    /// A blank query skips embedding; eligible records then come back in ID
    /// order.
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        constraints: &ConstraintSet,
    ) -> Result<Vec<VehicleRecord>> {
        let loaded = self.loaded().await?;
        let filter = CatalogFilter::from_constraints(constraints);

        let vector = if query.trim().is_empty() {
            vec![0.0; self.embedder.dimensions()]
        } else {
            self.embedder.embed_boxed(query).await?
        };

        let hits = loaded.index.query(&vector, k, &filter)?;

        let mut vehicles = Vec::with_capacity(hits.len());
        for hit in hits {
            match serde_json::from_value::<VehicleRecord>(Value::Object(hit.metadata)) {
                Ok(vehicle) => vehicles.push(vehicle),
                Err(e) => warn!(id = hit.id, error = %e, "Index entry metadata is not a vehicle"),
            }
        }

        info!(
            query,
            filter = %filter,
            k,
            returned = vehicles.len(),
            "Catalog retrieval"
        );
        Ok(vehicles)
    }

    async fn loaded(&self) -> Result<&LoadedIndex> {
        self.state.get_or_try_init(|| self.open()).await
    }

    async fn open(&self) -> Result<LoadedIndex> {
        let start = Instant::now();
        let signature = CatalogSignature::of_file(&self.catalog_path)?;
        let recorded = CatalogSignature::read_from(&self.index_dir.join(SIGNATURE_FILE));

        if recorded == Some(signature) {
            match self.reuse() {
                Ok(index) => {
                    let report = WarmupReport {
                        entries: index.len(),
                        rebuilt: false,
                        elapsed_ms: start.elapsed().as_millis(),
                    };
                    info!(
                        entries = report.entries,
                        elapsed_ms = report.elapsed_ms as u64,
                        "Catalog unchanged, reusing index"
                    );
                    return Ok(LoadedIndex { index, report });
                }
                Err(e) => warn!(error = %e, "Persisted index unusable, rebuilding"),
            }
        } else {
            info!(
                current = %signature,
                recorded = ?recorded.map(|s| s.to_string()),
                "Catalog signature changed, rebuilding index"
            );
        }

        let index = self.rebuild(signature).await?;
        let report = WarmupReport {
            entries: index.len(),
            rebuilt: true,
            elapsed_ms: start.elapsed().as_millis(),
        };
        info!(
            entries = report.entries,
            elapsed_ms = report.elapsed_ms as u64,
            "Catalog index rebuilt"
        );
        Ok(LoadedIndex { index, report })
    }

    fn reuse(&self) -> Result<VectorIndex> {
        let (index, model) = VectorIndex::load(&self.index_dir.join(INDEX_FILE))?;
        let expected = self.model();
        if model != expected {
            return Err(AutoFinderError::Index(format!(
                "index built with {} ({} dims), embedder is {} ({} dims)",
                model.name, model.dimensions, expected.name, expected.dimensions
            )));
        }
        Ok(index)
    }

    async fn rebuild(&self, signature: CatalogSignature) -> Result<VectorIndex> {
        if self.index_dir.exists() {
            std::fs::remove_dir_all(&self.index_dir)?;
        }

        let vehicles = load_catalog(&self.catalog_path)?;
        let index = VectorIndex::new();
        let embed_start = Instant::now();

        for vehicle in &vehicles {
            let text = vehicle.description();
            let embedding = self.embedder.embed_boxed(&text).await?;
            index.upsert(vehicle.id, embedding, text, vehicle_metadata(vehicle))?;
        }

        debug!(
            embedded = vehicles.len(),
            embed_ms = embed_start.elapsed().as_millis() as u64,
            "Catalog descriptions embedded"
        );

        index.save(&self.index_dir.join(INDEX_FILE), &self.model())?;
        // Recorded last so an interrupted build is never mistaken for a valid one.
        signature.write_to(&self.index_dir.join(SIGNATURE_FILE))?;
        Ok(index)
    }

    fn model(&self) -> IndexModel {
        IndexModel {
            name: self.embedder.model_name().to_string(),
            dimensions: self.embedder.dimensions(),
        }
    }
}

/// Remove a persisted index directory. Returns false when there was nothing
/// to remove.
pub fn reset_index(index_dir: &Path) -> Result<bool> {
    if !index_dir.exists() {
        info!(dir = %index_dir.display(), "No index to remove");
        return Ok(false);
    }
    std::fs::remove_dir_all(index_dir)?;
    info!(dir = %index_dir.display(), "Index removed");
    Ok(true)
}
