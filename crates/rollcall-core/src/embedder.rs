//! ArcFace face embedder via ONNX Runtime.
//!
//! Produces L2-normalised 512-dimensional embeddings from a margin-expanded
//! square crop around the detected box, resized to 112×112. No landmark
//! alignment; the matching tolerance absorbs the looser crop.

use crate::engine::EngineError;
use crate::types::{BoundingBox, FeatureVector};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const ARCFACE_INPUT_SIZE: u32 = 112;
const ARCFACE_MEAN: f32 = 127.5;
const ARCFACE_STD: f32 = 127.5; // symmetric normalisation, unlike SCRFD
const ARCFACE_EMBEDDING_DIM: usize = 512;
/// Crop side relative to the larger box side, to include chin and hairline.
const CROP_MARGIN: f32 = 1.2;

/// ArcFace-based face embedder.
pub struct ArcFaceEmbedder {
    session: Session,
}

impl ArcFaceEmbedder {
    /// Load the ArcFace ONNX model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, EngineError> {
        if !model_path.exists() {
            return Err(EngineError::ModelNotFound(model_path.to_path_buf()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = %model_path.display(), "loaded ArcFace model");

        Ok(Self { session })
    }

    /// Extract an embedding for one detected face in an RGB frame.
    pub fn embed(
        &mut self,
        image: &RgbImage,
        face: &BoundingBox,
    ) -> Result<FeatureVector, EngineError> {
        let crop = square_crop(image, face);
        let input = preprocess(&crop);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EngineError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != ARCFACE_EMBEDDING_DIM {
            return Err(EngineError::InferenceFailed(format!(
                "expected {ARCFACE_EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(FeatureVector::new(l2_normalize(raw.to_vec())))
    }
}

/// Square crop centered on the box, expanded by `CROP_MARGIN` and clamped to
/// the frame, resized to the ArcFace input size.
fn square_crop(image: &RgbImage, face: &BoundingBox) -> RgbImage {
    let (iw, ih) = image.dimensions();
    let side = (face.width.max(face.height) * CROP_MARGIN).round().max(1.0) as u32;
    let side = side.min(iw).min(ih).max(1);

    let cx = face.x + face.width / 2.0;
    let cy = face.y + face.height / 2.0;
    let half = side as f32 / 2.0;
    let x0 = (cx - half).round().clamp(0.0, (iw - side) as f32) as u32;
    let y0 = (cy - half).round().clamp(0.0, (ih - side) as f32) as u32;

    let crop = imageops::crop_imm(image, x0, y0, side, side).to_image();
    imageops::resize(&crop, ARCFACE_INPUT_SIZE, ARCFACE_INPUT_SIZE, FilterType::Triangle)
}

/// Pack a 112×112 RGB crop into an NCHW float tensor.
fn preprocess(crop: &RgbImage) -> Array4<f32> {
    let size = ARCFACE_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

    for (x, y, pixel) in crop.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 - ARCFACE_MEAN) / ARCFACE_STD;
        }
    }

    tensor
}

/// Scale a vector to unit L2 norm. A zero vector is returned unchanged.
fn l2_normalize(values: Vec<f32>) -> Vec<f32> {
    let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        values.iter().map(|x| x / norm).collect()
    } else {
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_shape_and_channels() {
        let crop = RgbImage::from_pixel(
            ARCFACE_INPUT_SIZE,
            ARCFACE_INPUT_SIZE,
            image::Rgb([255, 0, 128]),
        );
        let tensor = preprocess(&crop);
        assert_eq!(tensor.shape(), &[1, 3, 112, 112]);

        // Channels are packed R, G, B — not replicated.
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 0, 0]] + 1.0).abs() < 1e-6);
        let b = (128.0 - ARCFACE_MEAN) / ARCFACE_STD;
        assert!((tensor[[0, 2, 0, 0]] - b).abs() < 1e-6);
    }

    #[test]
    fn test_square_crop_is_input_sized() {
        let image = RgbImage::from_pixel(200, 200, image::Rgb([10, 20, 30]));
        let face = BoundingBox {
            x: 50.0,
            y: 60.0,
            width: 40.0,
            height: 50.0,
            confidence: 0.9,
        };
        let crop = square_crop(&image, &face);
        assert_eq!(crop.dimensions(), (ARCFACE_INPUT_SIZE, ARCFACE_INPUT_SIZE));
    }

    #[test]
    fn test_square_crop_clamped_at_frame_edge() {
        // Box hanging off the top-left corner must not underflow.
        let image = RgbImage::from_pixel(100, 80, image::Rgb([0, 0, 0]));
        let face = BoundingBox {
            x: -10.0,
            y: -5.0,
            width: 40.0,
            height: 40.0,
            confidence: 0.9,
        };
        let crop = square_crop(&image, &face);
        assert_eq!(crop.dimensions(), (ARCFACE_INPUT_SIZE, ARCFACE_INPUT_SIZE));
    }

    #[test]
    fn test_square_crop_larger_than_frame() {
        let image = RgbImage::from_pixel(64, 48, image::Rgb([0, 0, 0]));
        let face = BoundingBox {
            x: 0.0,
            y: 0.0,
            width: 500.0,
            height: 500.0,
            confidence: 0.9,
        };
        // Side clamps to the smaller frame dimension; no panic.
        let crop = square_crop(&image, &face);
        assert_eq!(crop.dimensions(), (ARCFACE_INPUT_SIZE, ARCFACE_INPUT_SIZE));
    }

    #[test]
    fn test_l2_normalize_unit_norm() {
        let values = l2_normalize(vec![3.0, 4.0]);
        let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((values[0] - 0.6).abs() < 1e-6);
        assert!((values[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector_unchanged() {
        assert_eq!(l2_normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }
}
