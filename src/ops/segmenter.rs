// ============================================================================
// SEGMENTER SEAM
// ============================================================================
//
// The subject-segmentation model (person matting) runs outside this crate;
// the host hands auto-crop an implementation of the Segmenter trait and the
// core never touches model files or inference runtimes itself.
// ============================================================================

use image::{GrayImage, RgbaImage};
use serde::{Deserialize, Serialize};

/// Settings passed through to the segmentation backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SegmenterOptions {
    /// Foreground probability threshold (0.0–1.0). Pixels with probability
    /// below this are considered background. Default: 0.5.
    pub threshold: f32,
    /// Mirror the input horizontally before inference, for front-camera
    /// frames. Default: false.
    pub flip_horizontal: bool,
}

impl Default for SegmenterOptions {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            flip_horizontal: false,
        }
    }
}

/// Errors a segmentation backend can report.
#[derive(Debug)]
pub enum SegmentError {
    /// The backend is missing or failed to initialise.
    ModelUnavailable(String),
    /// The backend loaded but inference failed.
    Inference(String),
}

impl std::fmt::Display for SegmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SegmentError::ModelUnavailable(e) => {
                write!(f, "Segmentation model unavailable: {}", e)
            }
            SegmentError::Inference(e) => write!(f, "Segmentation inference failed: {}", e),
        }
    }
}

/// A subject-segmentation backend.
///
/// Contract: the returned mask has exactly the input image's dimensions;
/// `0` marks background and any nonzero value marks subject.  Takes
/// `&mut self` because real backends keep a lazily-initialised session.
pub trait Segmenter {
    fn segment(
        &mut self,
        image: &RgbaImage,
        options: &SegmenterOptions,
    ) -> Result<GrayImage, SegmentError>;
}
