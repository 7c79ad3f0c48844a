//! Catalog loading and change detection.
//!
//! The catalog is a JSON array of vehicle objects produced by an offline
//! conversion step. Rows that do not fit the typed schema are rejected here,
//! at load time, so that filtering never has to deal with malformed values.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::UNIX_EPOCH;

use serde_json::Value;
use tracing::{info, warn};

use crate::error::{AutoFinderError, Result};
use crate::types::VehicleRecord;

/// Load every valid vehicle from a catalog file.
///
/// A missing file is fatal. Individual rows that fail to deserialize, or that
/// reuse an id already seen, are skipped with a warning.
pub fn load_catalog(path: &Path) -> Result<Vec<VehicleRecord>> {
    if !path.is_file() {
        return Err(AutoFinderError::CatalogMissing(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    let raw: Value = serde_json::from_str(&content)?;
    let Value::Array(rows) = raw else {
        return Err(AutoFinderError::Catalog(format!(
            "{} must contain a JSON array of vehicles",
            path.display()
        )));
    };

    let total = rows.len();
    let mut seen = HashSet::with_capacity(total);
    let mut vehicles = Vec::with_capacity(total);

    for (position, row) in rows.into_iter().enumerate() {
        match serde_json::from_value::<VehicleRecord>(row) {
            Ok(vehicle) => {
                if !seen.insert(vehicle.id) {
                    warn!(position, id = vehicle.id, "Skipping catalog row with duplicate id");
                    continue;
                }
                vehicles.push(vehicle);
            }
            Err(e) => {
                warn!(position, error = %e, "Skipping malformed catalog row");
            }
        }
    }

    info!(
        path = %path.display(),
        loaded = vehicles.len(),
        rejected = total - vehicles.len(),
        "Catalog loaded"
    );
    Ok(vehicles)
}

/// Cheap content signature of the catalog file: modification time and size.
///
/// The index is rebuilt whenever the signature recorded at build time differs
/// from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogSignature {
    pub modified_secs: u64,
    pub size_bytes: u64,
}

impl CatalogSignature {
    /// Compute the signature of the file at `path`.
    pub fn of_file(path: &Path) -> Result<Self> {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AutoFinderError::CatalogMissing(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let modified_secs = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Ok(Self {
            modified_secs,
            size_bytes: metadata.len(),
        })
    }

    /// Read a previously persisted signature. Returns `None` when the file is
    /// absent, empty, or unparseable.
    pub fn read_from(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        content.trim().parse().ok()
    }

    /// Persist the signature, creating parent directories as needed.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_string())?;
        Ok(())
    }
}

impl fmt::Display for CatalogSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.modified_secs, self.size_bytes)
    }
}

impl FromStr for CatalogSignature {
    type Err = AutoFinderError;

    fn from_str(s: &str) -> Result<Self> {
        let (modified, size) = s
            .split_once(':')
            .ok_or_else(|| AutoFinderError::Index(format!("malformed catalog signature: {s}")))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<u64>()
                .map_err(|e| AutoFinderError::Index(format!("malformed catalog signature: {e}")))
        };
        Ok(Self {
            modified_secs: parse(modified)?,
            size_bytes: parse(size)?,
        })
    }
}
