//! Hard post-filter between retrieval and prompt rendering.

use tracing::warn;

use autofinder_core::types::{ConstraintSet, VehicleRecord};
use autofinder_vector::filter::CatalogFilter;

/// Re-applies the constraint filter to retrieved candidates.
///
/// Uses the exact condition semantics of the index-side filter, so a
/// correct index makes this a no-op; anything the index let through by
/// mistake is dropped here, not reported as an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterValidator;

impl FilterValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(
        &self,
        candidates: Vec<VehicleRecord>,
        constraints: &ConstraintSet,
    ) -> Vec<VehicleRecord> {
        let filter = CatalogFilter::from_constraints(constraints);
        if filter.is_empty() {
            return candidates;
        }

        let before = candidates.len();
        let kept: Vec<VehicleRecord> = candidates.into_iter().filter(|v| filter.matches(v)).collect();
        if kept.len() < before {
            warn!(
                dropped = before - kept.len(),
                filter = %filter,
                "Retrieval returned out-of-filter vehicles"
            );
        }
        kept
    }
}
