//! Pixel-processing core for the PhotoFE photo editor.
//!
//! The host frontend owns the canvas, panels, history and export; it calls
//! into this crate with flat RGBA buffers (`image::RgbaImage`) and gets
//! freshly allocated buffers or analysis reports back.  Component groups:
//!
//! * [`ops::analysis`] — channel/luminance histograms + exposure analysis
//! * [`ops::sharpen`] — convolution sharpening + sharpness scoring
//! * [`ops::palette`] — K-means++ dominant-color extraction
//! * [`ops::autocrop`] — segmentation-mask driven cropping
//!
//! Every operation is a pure input → output transform: inputs are read
//! immutably and nothing is cached between calls.  Hosts that want session
//! diagnostics call [`logger::init`] once at startup.

pub mod logger;
pub mod ops;
pub mod pixel;

pub use ops::analysis::{ExposureAnalysis, Histograms, analyze_exposure, compute_histograms};
pub use ops::autocrop::{
    AutoCropResult, CropError, CropOptions, Rect, apply_crop, auto_crop, compute_crop,
    mask_bounding_box,
};
pub use ops::palette::{
    ColorSample, Lcg, PaletteError, PaletteOptions, PaletteResult, RandomSource,
    extract_palette, extract_palette_with_rng,
};
pub use ops::segmenter::{SegmentError, Segmenter, SegmenterOptions};
pub use ops::sharpen::{SharpenMethod, SharpenOptions, analyze_sharpness, sharpen};
