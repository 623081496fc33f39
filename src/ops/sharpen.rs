// ============================================================================
// CONVOLUTION SHARPENER
// ============================================================================
//
// 3x3 convolution sharpening over the image interior, three methods:
//   Unsharp     — gentle: orig + intensity * (orig - gaussian_blur)
//   Laplacian   — kernel [0,-1,0, -1,5,-1, 0,-1,0], scaled toward orig
//   EdgeEnhance — Sobel gradient magnitude added per channel (aggressive)
//
// Kernels read neighbours, so only the interior [1, w-2] x [1, h-2] is
// processed; the 1-pixel border ring passes through unchanged and alpha is
// never modified.  Rows are processed in parallel.
// ============================================================================

use crate::pixel;
use image::RgbaImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SharpenMethod {
    Unsharp,
    Laplacian,
    EdgeEnhance,
}

impl SharpenMethod {
    pub fn label(&self) -> &'static str {
        match self {
            SharpenMethod::Unsharp => "Unsharp Mask",
            SharpenMethod::Laplacian => "Laplacian",
            SharpenMethod::EdgeEnhance => "Edge Enhance",
        }
    }
    pub fn all() -> &'static [SharpenMethod] {
        &[
            SharpenMethod::Unsharp,
            SharpenMethod::Laplacian,
            SharpenMethod::EdgeEnhance,
        ]
    }
}

impl Default for SharpenMethod {
    fn default() -> Self {
        SharpenMethod::Unsharp
    }
}

/// Settings for the Sharpen operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SharpenOptions {
    /// Effect strength multiplier. Default: 1.5.
    pub intensity: f32,
    pub method: SharpenMethod,
}

impl Default for SharpenOptions {
    fn default() -> Self {
        Self {
            intensity: 1.5,
            method: SharpenMethod::Unsharp,
        }
    }
}

/// Sharpen an image with the selected method.
///
/// Returns a new buffer; the input is untouched.  Images with no interior
/// (width or height under 3) come back as an unmodified copy.
pub fn sharpen(flat: &RgbaImage, options: &SharpenOptions) -> RgbaImage {
    let w = flat.width() as usize;
    let h = flat.height() as usize;
    if w < 3 || h < 3 {
        return flat.clone();
    }

    let src_raw = flat.as_raw();
    let stride = w * 4;
    let intensity = options.intensity;
    let at = |x: usize, y: usize, c: usize| src_raw[y * stride + x * 4 + c] as f32;

    match options.method {
        SharpenMethod::Unsharp => convolve_interior(flat, |x, y, c| {
            // 3x3 gaussian [1,2,1, 2,4,2, 1,2,1] / 16, kept in f32 so the
            // blur estimate is never quantized before the subtraction
            let blur = (at(x - 1, y - 1, c)
                + 2.0 * at(x, y - 1, c)
                + at(x + 1, y - 1, c)
                + 2.0 * at(x - 1, y, c)
                + 4.0 * at(x, y, c)
                + 2.0 * at(x + 1, y, c)
                + at(x - 1, y + 1, c)
                + 2.0 * at(x, y + 1, c)
                + at(x + 1, y + 1, c))
                / 16.0;
            let s = at(x, y, c);
            s + intensity * (s - blur)
        }),
        SharpenMethod::Laplacian => convolve_interior(flat, |x, y, c| {
            let conv = 5.0 * at(x, y, c)
                - at(x, y - 1, c)
                - at(x - 1, y, c)
                - at(x + 1, y, c)
                - at(x, y + 1, c);
            let s = at(x, y, c);
            s + (conv - s) * intensity * 0.3
        }),
        SharpenMethod::EdgeEnhance => convolve_interior(flat, |x, y, c| {
            let gx = -at(x - 1, y - 1, c) + at(x + 1, y - 1, c)
                - 2.0 * at(x - 1, y, c)
                + 2.0 * at(x + 1, y, c)
                - at(x - 1, y + 1, c)
                + at(x + 1, y + 1, c);
            let gy = -at(x - 1, y - 1, c)
                - 2.0 * at(x, y - 1, c)
                - at(x + 1, y - 1, c)
                + at(x - 1, y + 1, c)
                + 2.0 * at(x, y + 1, c)
                + at(x + 1, y + 1, c);
            at(x, y, c) + (gx * gx + gy * gy).sqrt() * intensity * 0.2
        }),
    }
}

/// Row-parallel interior convolution.  `kernel_at(x, y, channel)` returns the
/// new value for one color channel; results are rounded and saturated into
/// 0..255.  The output starts as a full copy of the input, which is what
/// leaves the border ring and every alpha byte untouched.
fn convolve_interior<F>(flat: &RgbaImage, kernel_at: F) -> RgbaImage
where
    F: Fn(usize, usize, usize) -> f32 + Sync,
{
    let w = flat.width() as usize;
    let h = flat.height() as usize;
    let stride = w * 4;
    let mut dst_raw = flat.as_raw().clone();

    dst_raw
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row_out)| {
            if y == 0 || y == h - 1 {
                return;
            }
            for x in 1..w - 1 {
                let pi = x * 4;
                for c in 0..3 {
                    let v = kernel_at(x, y, c);
                    row_out[pi + c] = v.round().clamp(0.0, 255.0) as u8;
                }
            }
        });

    RgbaImage::from_raw(w as u32, h as u32, dst_raw).unwrap()
}

/// Estimate how sharp an image already is, as a 0..100 score.
///
/// Mean Sobel gradient magnitude over the grayscale interior, divided by 3
/// and clamped.  Pixels with alpha below [`pixel::ALPHA_SOLID`] are skipped
/// so transparent padding cannot drag the score down.  Returns 0.0 when no
/// pixel qualifies.  Typical photos land in the 3..25 range; a low score is
/// the host's cue to suggest a stronger intensity.
pub fn analyze_sharpness(flat: &RgbaImage) -> f32 {
    let w = flat.width() as usize;
    let h = flat.height() as usize;
    if w < 3 || h < 3 {
        return 0.0;
    }
    let src_raw = flat.as_raw();

    // Grayscale pass first so Sobel runs on luma rather than per channel
    let mut gray = vec![0.0f32; w * h];
    for (i, g) in gray.iter_mut().enumerate() {
        let pi = i * 4;
        *g = pixel::luminance(src_raw[pi], src_raw[pi + 1], src_raw[pi + 2]);
    }

    let mut total = 0.0f64;
    let mut count = 0u64;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            if src_raw[i * 4 + 3] < pixel::ALPHA_SOLID {
                continue;
            }
            let gx = -gray[i - w - 1] + gray[i - w + 1] - 2.0 * gray[i - 1]
                + 2.0 * gray[i + 1]
                - gray[i + w - 1]
                + gray[i + w + 1];
            let gy = -gray[i - w - 1] - 2.0 * gray[i - w] - gray[i - w + 1]
                + gray[i + w - 1]
                + 2.0 * gray[i + w]
                + gray[i + w + 1];
            total += (gx * gx + gy * gy).sqrt() as f64;
            count += 1;
        }
    }

    if count == 0 {
        return 0.0;
    }
    ((total / count as f64) / 3.0).clamp(0.0, 100.0) as f32
}
