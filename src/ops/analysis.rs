// ============================================================================
// HISTOGRAM + EXPOSURE ANALYSIS
// ============================================================================
//
// Computes per-channel histograms (for the Levels-style panel) and a derived
// exposure report with suggested brightness / contrast / saturation
// corrections on the host UI's slider scales.
//
// Fully transparent pixels (alpha == 0) carry no color information and are
// excluded from every statistic.
// ============================================================================

use crate::pixel;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Target mean luminance for a "well exposed" image (mid-gray).
const TARGET_LUMINANCE: f32 = 128.0;
/// Target tonal-range fraction after outlier clipping.
const TARGET_CONTRAST: f32 = 0.8;
/// Target mean saturation.
const TARGET_SATURATION: f32 = 0.4;
/// No saturation suggestion inside this band around the target.
const SATURATION_DEAD_ZONE: f32 = 0.05;

/// Per-channel frequency histograms, 256 bins each.
#[derive(Clone, Debug)]
pub struct Histograms {
    pub red: [u32; 256],
    pub green: [u32; 256],
    pub blue: [u32; 256],
    pub luminance: [u32; 256],
}

impl Histograms {
    pub fn new() -> Self {
        Self {
            red: [0u32; 256],
            green: [0u32; 256],
            blue: [0u32; 256],
            luminance: [0u32; 256],
        }
    }
}

impl Default for Histograms {
    fn default() -> Self {
        Self::new()
    }
}

/// Exposure report with suggested corrections.
/// `recommended_*` values are on the UI slider scales:
/// brightness -80..80, contrast -20..50, saturation -20..40.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ExposureAnalysis {
    /// Mean Rec. 601 luminance over counted pixels, 0..255.
    pub average_luminance: f32,
    /// Clipped tonal range as a fraction of full scale, 0..1.
    pub contrast_level: f32,
    /// Mean per-pixel saturation `(max - min) / max`, 0..1.
    pub saturation_level: f32,
    pub recommended_brightness: f32,
    pub recommended_contrast: f32,
    pub recommended_saturation: f32,
}

/// Compute per-channel histograms (R, G, B, Luminance).
/// Each histogram has 256 bins with counts.  Fully transparent pixels are
/// skipped.
pub fn compute_histograms(flat: &RgbaImage) -> Histograms {
    let mut hist = Histograms::new();
    let src_raw = flat.as_raw();
    let w = flat.width() as usize;
    let h = flat.height() as usize;

    for y in 0..h {
        for x in 0..w {
            let pi = (y * w + x) * 4;
            let r = src_raw[pi];
            let g = src_raw[pi + 1];
            let b = src_raw[pi + 2];
            let a = src_raw[pi + 3];
            if a == 0 { continue; }
            let lum = pixel::luminance(r, g, b).round() as usize;
            hist.red[r as usize] += 1;
            hist.green[g as usize] += 1;
            hist.blue[b as usize] += 1;
            hist.luminance[lum.min(255)] += 1;
        }
    }

    hist
}

/// Analyze exposure and derive slider suggestions.
///
/// Contrast is measured between the darkest and brightest luminance bins
/// whose cumulative count from each end exceeds 1% of the counted pixels, so
/// a handful of outlier pixels cannot fake a full tonal range.
///
/// An image with no counted pixels yields an all-zero report.
pub fn analyze_exposure(flat: &RgbaImage) -> ExposureAnalysis {
    let src_raw = flat.as_raw();
    let w = flat.width() as usize;
    let h = flat.height() as usize;

    let mut hist_l = [0u32; 256];
    let mut lum_sum = 0.0f64;
    let mut sat_sum = 0.0f64;
    let mut count = 0u64;

    for y in 0..h {
        for x in 0..w {
            let pi = (y * w + x) * 4;
            let r = src_raw[pi];
            let g = src_raw[pi + 1];
            let b = src_raw[pi + 2];
            let a = src_raw[pi + 3];
            if a == 0 { continue; }

            let lum = pixel::luminance(r, g, b);
            hist_l[(lum.round() as usize).min(255)] += 1;
            lum_sum += lum as f64;

            let max = r.max(g).max(b);
            let min = r.min(g).min(b);
            if max > 0 {
                sat_sum += (max - min) as f64 / max as f64;
            }
            count += 1;
        }
    }

    if count == 0 {
        return ExposureAnalysis::default();
    }

    let average_luminance = (lum_sum / count as f64) as f32;
    let saturation_level = (sat_sum / count as f64) as f32;

    // Tonal range with 1% outlier clip from both ends
    let clip = count as f64 * 0.01;
    let mut low = 0usize;
    let mut cum = 0u64;
    for (i, &n) in hist_l.iter().enumerate() {
        cum += n as u64;
        if cum as f64 > clip {
            low = i;
            break;
        }
    }
    let mut high = 255usize;
    cum = 0;
    for (i, &n) in hist_l.iter().enumerate().rev() {
        cum += n as u64;
        if cum as f64 > clip {
            high = i;
            break;
        }
    }
    let contrast_level = (high.saturating_sub(low)) as f32 / 255.0;

    let recommended_brightness =
        ((TARGET_LUMINANCE - average_luminance) * 0.8).clamp(-80.0, 80.0);

    let recommended_contrast = if contrast_level < TARGET_CONTRAST {
        ((TARGET_CONTRAST - contrast_level) * 100.0).min(50.0)
    } else {
        (-(contrast_level - TARGET_CONTRAST) * 50.0).max(-20.0)
    };

    let sat_delta = TARGET_SATURATION - saturation_level;
    let recommended_saturation = if sat_delta.abs() <= SATURATION_DEAD_ZONE {
        0.0
    } else if sat_delta > 0.0 {
        (sat_delta * 100.0).min(40.0)
    } else {
        (sat_delta * 50.0).max(-20.0)
    };

    ExposureAnalysis {
        average_luminance,
        contrast_level,
        saturation_level,
        recommended_brightness,
        recommended_contrast,
        recommended_saturation,
    }
}
