//! Shared pixel math used across the ops modules.
//!
//! Everything here operates on plain channel values so the ops code can work
//! directly on raw RGBA buffers without constructing pixel structs in inner
//! loops.

/// Alpha threshold separating "counts as content" from "effectively
/// transparent" for the sampling-based analyses (palette extraction,
/// sharpness scoring).  Histogram statistics use the stricter rule of
/// excluding only fully transparent pixels (`alpha == 0`).
pub const ALPHA_SOLID: u8 = 128;

/// Rec. 601 luma of an 8-bit RGB triple, on the 0..255 scale.
///
/// This is the luminance definition shared by the histogram analyzer and the
/// sharpness scorer, so the two always agree on what "brightness" means.
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> f32 {
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

/// RGB (0..1) → HSL (H: 0..1, S: 0..1, L: 0..1)
pub fn rgb_to_hsl(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() < 1e-6 {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };

    let h = if (max - r).abs() < 1e-6 {
        let mut h = (g - b) / d;
        if h < 0.0 { h += 6.0; }
        h / 6.0
    } else if (max - g).abs() < 1e-6 {
        ((b - r) / d + 2.0) / 6.0
    } else {
        ((r - g) / d + 4.0) / 6.0
    };

    (h, s, l)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luminance_weights_sum_to_full_scale() {
        // White must map to 255 exactly (the weights sum to 1.0).
        let white = luminance(255, 255, 255);
        assert!((white - 255.0).abs() < 1e-3, "white luma = {}", white);
        assert_eq!(luminance(0, 0, 0), 0.0);
    }

    #[test]
    fn luminance_orders_channels_by_weight() {
        let g = luminance(0, 255, 0);
        let r = luminance(255, 0, 0);
        let b = luminance(0, 0, 255);
        assert!(g > r && r > b);
    }

    #[test]
    fn hsl_of_gray_has_zero_saturation() {
        let (h, s, l) = rgb_to_hsl(0.5, 0.5, 0.5);
        assert_eq!(h, 0.0);
        assert_eq!(s, 0.0);
        assert!((l - 0.5).abs() < 1e-6);
    }

    #[test]
    fn hsl_of_pure_red() {
        let (h, s, l) = rgb_to_hsl(1.0, 0.0, 0.0);
        assert!(h.abs() < 1e-6);
        assert!((s - 1.0).abs() < 1e-6);
        assert!((l - 0.5).abs() < 1e-6);
    }
}
