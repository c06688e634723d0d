//! Reference catalog built from enrollment images on disk.
//!
//! Layout: one subdirectory per identity under the dataset directory, any
//! number of images inside. Unusable images are skipped with a log line;
//! an identity with no usable images is silently absent from the catalog.
//! Only a missing or unreadable dataset directory is fatal.

use crate::engine::FeatureExtractor;
use crate::types::FeatureVector;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("enrollment directory unreadable: {path}: {source}")]
    DirUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Identity → ordered reference feature vectors. Built once at startup,
/// immutable thereafter. BTreeMap keeps matching ties deterministic.
#[derive(Debug, Default, Clone)]
pub struct FaceCatalog {
    identities: BTreeMap<String, Vec<FeatureVector>>,
}

impl FaceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a reference vector for an identity, creating it if new.
    pub fn insert(&mut self, name: &str, reference: FeatureVector) {
        self.identities
            .entry(name.to_string())
            .or_default()
            .push(reference);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[FeatureVector])> {
        self.identities
            .iter()
            .map(|(name, refs)| (name.as_str(), refs.as_slice()))
    }

    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    pub fn reference_count(&self) -> usize {
        self.identities.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Build the catalog from a dataset directory of per-identity subfolders.
    pub fn load_from_dir(
        dir: &Path,
        extractor: &mut dyn FeatureExtractor,
    ) -> Result<Self, CatalogError> {
        let entries = std::fs::read_dir(dir).map_err(|source| CatalogError::DirUnreadable {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut catalog = Self::new();

        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let references = load_identity(&path, extractor);
            if references.is_empty() {
                tracing::warn!(identity = %name, "no usable enrollment images; identity omitted");
                continue;
            }
            tracing::debug!(identity = %name, references = references.len(), "identity enrolled");
            catalog.identities.insert(name, references);
        }

        tracing::info!(
            dir = %dir.display(),
            identities = catalog.identity_count(),
            references = catalog.reference_count(),
            "reference catalog loaded"
        );

        Ok(catalog)
    }
}

/// Extract one reference vector per usable image in an identity folder.
fn load_identity(dir: &Path, extractor: &mut dyn FeatureExtractor) -> Vec<FeatureVector> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    let mut references = Vec::new();
    for path in paths {
        let image = match image::open(&path) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable image; skipped");
                continue;
            }
        };
        match extractor.extract(&image) {
            // Detections arrive best-first; enroll the most confident face.
            Ok(detections) => match detections.into_iter().next() {
                Some(d) => references.push(d.feature),
                None => {
                    tracing::warn!(path = %path.display(), "no face found; image skipped");
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "face analysis failed; image skipped");
            }
        }
    }
    references
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineError;
    use crate::types::{BoundingBox, Detection};
    use image::RgbImage;

    /// Pretends any image at least 4px wide contains exactly one face.
    struct StubExtractor;

    impl FeatureExtractor for StubExtractor {
        fn extract(&mut self, image: &RgbImage) -> Result<Vec<Detection>, EngineError> {
            if image.width() < 4 {
                return Ok(Vec::new());
            }
            Ok(vec![Detection {
                bbox: BoundingBox {
                    x: 0.0,
                    y: 0.0,
                    width: image.width() as f32,
                    height: image.height() as f32,
                    confidence: 0.9,
                },
                feature: FeatureVector::new(vec![image.width() as f32]),
            }])
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rollcall-catalog-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_image(path: &Path, width: u32) {
        RgbImage::from_pixel(width, width.max(1), image::Rgb([120, 130, 140]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_missing_dir_is_fatal() {
        let missing = std::env::temp_dir().join("rollcall-catalog-definitely-missing");
        let result = FaceCatalog::load_from_dir(&missing, &mut StubExtractor);
        assert!(matches!(result, Err(CatalogError::DirUnreadable { .. })));
    }

    #[test]
    fn test_load_skips_faceless_images_and_empty_identities() {
        let root = scratch_dir("load");

        // alice: one usable image, one too small for the stub to "detect".
        let alice = root.join("alice");
        std::fs::create_dir(&alice).unwrap();
        write_image(&alice.join("a.png"), 16);
        write_image(&alice.join("b.png"), 2);

        // bob: nothing usable → omitted entirely.
        let bob = root.join("bob");
        std::fs::create_dir(&bob).unwrap();
        write_image(&bob.join("tiny.png"), 2);

        // Stray top-level file is ignored.
        std::fs::write(root.join("notes.txt"), "not an identity").unwrap();

        let catalog = FaceCatalog::load_from_dir(&root, &mut StubExtractor).unwrap();
        assert_eq!(catalog.identity_count(), 1);
        assert_eq!(catalog.reference_count(), 1);
        let (name, refs) = catalog.iter().next().unwrap();
        assert_eq!(name, "alice");
        assert_eq!(refs.len(), 1);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_iteration_order_is_sorted() {
        let mut catalog = FaceCatalog::new();
        catalog.insert("zoe", FeatureVector::new(vec![1.0]));
        catalog.insert("adam", FeatureVector::new(vec![2.0]));
        let names: Vec<&str> = catalog.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["adam", "zoe"]);
    }
}
