//! Tolerance-gated face identification against the reference catalog.

use crate::catalog::FaceCatalog;
use crate::types::Detection;

/// Default maximum distance for a match. Lower is stricter.
pub const DEFAULT_TOLERANCE: f32 = 0.5;

/// Result of matching one detected face.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Identified { name: String, distance: f32 },
    Unknown,
}

/// Matches detected feature vectors against every reference vector of every
/// enrolled identity.
#[derive(Debug, Clone, Copy)]
pub struct FaceMatcher {
    tolerance: f32,
}

impl FaceMatcher {
    pub fn new(tolerance: f32) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    /// One outcome per detection, in detection order.
    pub fn identify(&self, catalog: &FaceCatalog, detections: &[Detection]) -> Vec<MatchOutcome> {
        detections
            .iter()
            .map(|d| self.identify_one(catalog, d))
            .collect()
    }

    /// Scan the whole catalog for the globally nearest reference vector.
    /// The identity owning it wins if it passes tolerance; a single best
    /// match per detected face, not per reference image. An empty catalog
    /// yields `Unknown`.
    fn identify_one(&self, catalog: &FaceCatalog, detection: &Detection) -> MatchOutcome {
        let mut best: Option<(&str, f32)> = None;

        for (name, references) in catalog.iter() {
            for reference in references {
                let distance = detection.feature.distance(reference);
                if best.map_or(true, |(_, d)| distance < d) {
                    best = Some((name, distance));
                }
            }
        }

        match best {
            Some((name, distance)) if distance <= self.tolerance => MatchOutcome::Identified {
                name: name.to_string(),
                distance,
            },
            _ => MatchOutcome::Unknown,
        }
    }
}

impl Default for FaceMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}
