// ============================================================================
// OPS MODULE — Pixel-processing operations for the PhotoFE editor core
// ============================================================================
//
// Architecture:
//   analysis.rs  — channel/luminance histograms + exposure analysis
//   sharpen.rs   — convolution sharpening (3 methods) + sharpness scoring
//   palette.rs   — K-means++ dominant-color extraction
//   segmenter.rs — subject-segmentation seam (trait, options, errors)
//   autocrop.rs  — mask-driven crop: bounding box, padding, application
//
// Every operation is a pure input → output transform over flat RGBA buffers;
// the host owns all state, history and rendering.
// ============================================================================

pub mod analysis;
pub mod autocrop;
pub mod palette;
pub mod segmenter;
pub mod sharpen;
