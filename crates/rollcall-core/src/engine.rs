//! The face-analysis capability: one RGB frame in, detected faces with
//! feature vectors out.

use crate::detector::ScrfdDetector;
use crate::embedder::ArcFaceEmbedder;
use crate::types::Detection;
use image::RgbImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// SCRFD detection model filename within the model directory.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
/// ArcFace embedding model filename within the model directory.
pub const EMBEDDER_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("model file not found: {0} — download from insightface and place in the model dir")]
    ModelNotFound(PathBuf),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Produces zero or more detected faces from one frame.
///
/// Input frames are RGB. Implementations return detections ordered by
/// detector confidence, best first.
pub trait FeatureExtractor {
    fn extract(&mut self, image: &RgbImage) -> Result<Vec<Detection>, EngineError>;
}

/// Detector + embedder pipeline backed by ONNX Runtime.
pub struct FaceEngine {
    detector: ScrfdDetector,
    embedder: ArcFaceEmbedder,
}

impl FaceEngine {
    /// Load both models from `model_dir`. Fails fast if either is missing.
    pub fn load(model_dir: &Path) -> Result<Self, EngineError> {
        let detector = ScrfdDetector::load(&model_dir.join(DETECTOR_MODEL_FILE))?;
        let embedder = ArcFaceEmbedder::load(&model_dir.join(EMBEDDER_MODEL_FILE))?;
        tracing::info!(dir = %model_dir.display(), "face engine ready");
        Ok(Self { detector, embedder })
    }
}

impl FeatureExtractor for FaceEngine {
    fn extract(&mut self, image: &RgbImage) -> Result<Vec<Detection>, EngineError> {
        let faces = self.detector.detect(image)?;
        let mut detections = Vec::with_capacity(faces.len());
        for bbox in faces {
            let feature = self.embedder.embed(image, &bbox)?;
            detections.push(Detection { bbox, feature });
        }
        Ok(detections)
    }
}
