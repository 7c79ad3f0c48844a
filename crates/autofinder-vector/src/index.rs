//! In-memory vector index with brute-force cosine similarity search.
//!
//! Queries apply a [`CatalogFilter`] to entry metadata before ranking, so the
//! top-k is taken from eligible entries only. The index can be persisted to a
//! single JSON file and reloaded as-is.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use autofinder_core::error::AutoFinderError;

use crate::filter::CatalogFilter;

/// A single hit returned from a vector search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// The ID of the matching entry.
    pub id: u64,
    /// Cosine similarity score.
    pub score: f64,
    /// Text that was embedded for this entry.
    pub text: String,
    /// Metadata associated with the entry.
    pub metadata: Map<String, Value>,
}

/// An entry stored in the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorEntry {
    id: u64,
    embedding: Vec<f32>,
    text: String,
    metadata: Map<String, Value>,
}

/// On-disk layout of a persisted index.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedIndex {
    model: String,
    dimensions: usize,
    entries: Vec<VectorEntry>,
}

/// Model identity recorded with a persisted index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexModel {
    pub name: String,
    pub dimensions: usize,
}

/// Catalog embeddings keyed by vehicle ID, shared behind an `RwLock`.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    entries: Arc<RwLock<HashMap<u64, VectorEntry>>>,
}

impl VectorIndex {
    /// Empty index.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert or replace the entry with the given ID.
    pub fn upsert(
        &self,
        id: u64,
        embedding: Vec<f32>,
        text: String,
        metadata: Map<String, Value>,
    ) -> Result<(), AutoFinderError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| AutoFinderError::Index(format!("Lock poisoned: {}", e)))?;
        entries.insert(
            id,
            VectorEntry {
                id,
                embedding,
                text,
                metadata,
            },
        );
        Ok(())
    }

    /// Return the `k` entries most similar to `query` among those whose
    /// metadata satisfies `filter`.
    ///
    /// Results are sorted by descending similarity; equal scores are ordered
    /// by ascending ID so that repeated queries return the same sequence.
    pub fn query(
        &self,
        query: &[f32],
        k: usize,
        filter: &CatalogFilter,
    ) -> Result<Vec<SearchHit>, AutoFinderError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| AutoFinderError::Index(format!("Lock poisoned: {}", e)))?;

        let mut scored: Vec<SearchHit> = entries
            .values()
            .filter(|entry| filter.matches_metadata(&entry.metadata))
            .map(|entry| SearchHit {
                id: entry.id,
                score: cosine_similarity(query, &entry.embedding),
                text: entry.text.clone(),
                metadata: entry.metadata.clone(),
            })
            .collect();

        debug!(eligible = scored.len(), total = entries.len(), "Filtered index entries");

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(k);

        Ok(scored)
    }

    /// Number of stored entries; 0 if the lock is poisoned.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// True when nothing has been indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write every entry to `path` together with the model identity.
    pub fn save(&self, path: &Path, model: &IndexModel) -> Result<(), AutoFinderError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| AutoFinderError::Index(format!("Lock poisoned: {}", e)))?;

        let mut sorted: Vec<VectorEntry> = entries.values().cloned().collect();
        sorted.sort_by_key(|e| e.id);

        let persisted = PersistedIndex {
            model: model.name.clone(),
            dimensions: model.dimensions,
            entries: sorted,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::io::BufWriter::new(std::fs::File::create(path)?);
        serde_json::to_writer(file, &persisted)?;
        Ok(())
    }

    /// Load an index written by [`VectorIndex::save`].
    pub fn load(path: &Path) -> Result<(Self, IndexModel), AutoFinderError> {
        let file = std::fs::File::open(path).map_err(|e| {
            AutoFinderError::Index(format!("Cannot open index {}: {}", path.display(), e))
        })?;
        let persisted: PersistedIndex = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| {
                AutoFinderError::Index(format!("Corrupt index {}: {}", path.display(), e))
            })?;

        if let Some(bad) = persisted
            .entries
            .iter()
            .find(|e| e.embedding.len() != persisted.dimensions)
        {
            return Err(AutoFinderError::Index(format!(
                "Entry {} has {} dimensions, expected {}",
                bad.id,
                bad.embedding.len(),
                persisted.dimensions
            )));
        }

        let model = IndexModel {
            name: persisted.model,
            dimensions: persisted.dimensions,
        };
        let entries = persisted.entries.into_iter().map(|e| (e.id, e)).collect();

        Ok((
            Self {
                entries: Arc::new(RwLock::new(entries)),
            },
            model,
        ))
    }
}

impl Default for VectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Cosine of the angle between `a` and `b`, accumulated in f64.
///
/// Mismatched lengths and zero-norm inputs score 0.0.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b).fold((0.0f64, 0.0f64, 0.0f64), |acc, (&x, &y)| {
        let (x, y) = (f64::from(x), f64::from(y));
        (acc.0 + x * y, acc.1 + x * x, acc.2 + y * y)
    });

    let denom = (norm_a * norm_b).sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
