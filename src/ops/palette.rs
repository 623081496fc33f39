// ============================================================================
// COLOR QUANTIZER — K-means++ dominant-color extraction
// ============================================================================
//
// Samples a bounded working set from the image (index-stride subsampling,
// skipping transparent and near-black / near-white pixels), clusters it with
// K-means++ and returns the centroids ordered most-vibrant-first for palette
// swatch display.
//
// All randomness flows through the RandomSource trait; production callers get
// a time-seeded LCG via `extract_palette`, tests inject fixed seeds via
// `extract_palette_with_rng`.
// ============================================================================

use crate::pixel;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Centroids are considered settled once none moves further than this
/// (Euclidean RGB distance) in one iteration.
const CONVERGENCE_THRESHOLD: f32 = 1.0;

/// Pixels darker than this HSL lightness are treated as shadow noise and
/// excluded from the working set.
const MIN_LIGHTNESS: f32 = 0.05;
/// Pixels brighter than this are treated as highlight noise and excluded.
const MAX_LIGHTNESS: f32 = 0.95;

// ============================================================================
// RANDOM SOURCE
// ============================================================================

/// Source of uniform randomness for centroid seeding and dead-cluster
/// reseeding.
pub trait RandomSource {
    /// Next uniform value in `[0, 1)`.
    fn next_f32(&mut self) -> f32;
}

/// Small linear congruential generator.  Not statistically strong, but
/// centroid seeding only needs cheap, seedable uniformity and the fixed
/// constants make test sequences reproducible.
#[derive(Clone, Debug)]
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }
}

impl RandomSource for Lcg {
    fn next_f32(&mut self) -> f32 {
        self.state = self.state.wrapping_mul(1664525).wrapping_add(1013904223);
        ((self.state >> 8) & 0xFFFFFF) as f32 / 16777216.0
    }
}

// ============================================================================
// OPTIONS / RESULT TYPES
// ============================================================================

/// Settings for palette extraction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaletteOptions {
    /// Number of colors to extract. Default: 5.
    pub k: usize,
    /// Iteration cap for the clustering loop. Default: 50.
    pub max_iterations: usize,
    /// Upper bound on the sampled working set (the stride is derived from
    /// this, so the actual count can run slightly over). Default: 5000.
    pub max_samples: usize,
}

impl Default for PaletteOptions {
    fn default() -> Self {
        Self {
            k: 5,
            max_iterations: 50,
            max_samples: 5000,
        }
    }
}

/// One extracted palette color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorSample {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl ColorSample {
    /// CSS hex form, e.g. `#3fa2c8`.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Palette extraction output with sampling metadata for the host UI.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaletteResult {
    /// Extracted colors, most vibrant first.
    pub colors: Vec<ColorSample>,
    pub processing_time_ms: f64,
    /// Size of the working set that was actually clustered.
    pub total_pixels_analyzed: usize,
    /// Working-set size as a fraction of all pixels, 0..1.
    pub sampling_rate: f32,
}

/// Errors from palette extraction.
#[derive(Debug)]
pub enum PaletteError {
    /// Fewer usable samples than requested clusters.  The image is too small
    /// or too transparent/blown-out to support `k` colors.
    InsufficientSamples { found: usize, needed: usize },
}

impl std::fmt::Display for PaletteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaletteError::InsufficientSamples { found, needed } => write!(
                f,
                "Not enough usable pixels for palette extraction: found {}, need at least {}",
                found, needed
            ),
        }
    }
}

// ============================================================================
// EXTRACTION
// ============================================================================

/// Extract the dominant color palette with a time-seeded generator.
/// Successive calls on the same image may order ties differently; use
/// [`extract_palette_with_rng`] when reproducibility matters.
pub fn extract_palette(
    flat: &RgbaImage,
    options: &PaletteOptions,
) -> Result<PaletteResult, PaletteError> {
    let seed = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_nanos() as u64,
        Err(_) => 0,
    };
    extract_palette_with_rng(flat, options, &mut Lcg::new(seed))
}

/// Extract the dominant color palette using the supplied random source.
pub fn extract_palette_with_rng<R: RandomSource>(
    flat: &RgbaImage,
    options: &PaletteOptions,
    rng: &mut R,
) -> Result<PaletteResult, PaletteError> {
    let start = Instant::now();
    let total = (flat.width() as usize) * (flat.height() as usize);

    let samples = collect_samples(flat, options.max_samples);
    let sampling_rate = if total == 0 {
        0.0
    } else {
        samples.len() as f32 / total as f32
    };

    if options.k == 0 {
        // Zero clusters requested: nothing to do, not an error
        return Ok(PaletteResult {
            colors: Vec::new(),
            processing_time_ms: start.elapsed().as_secs_f64() * 1000.0,
            total_pixels_analyzed: samples.len(),
            sampling_rate,
        });
    }
    if samples.len() < options.k {
        return Err(PaletteError::InsufficientSamples {
            found: samples.len(),
            needed: options.k,
        });
    }

    let mut centroids = seed_centroids(&samples, options.k, rng);
    let mut assignments = vec![0usize; samples.len()];
    let mut iterations_run = 0usize;
    let mut converged = false;

    for _ in 0..options.max_iterations {
        iterations_run += 1;

        for (slot, s) in assignments.iter_mut().zip(samples.iter()) {
            *slot = nearest_centroid(*s, &centroids);
        }

        let mut sums = vec![[0u64; 3]; centroids.len()];
        let mut counts = vec![0u64; centroids.len()];
        for (s, &ci) in samples.iter().zip(assignments.iter()) {
            sums[ci][0] += s.r as u64;
            sums[ci][1] += s.g as u64;
            sums[ci][2] += s.b as u64;
            counts[ci] += 1;
        }

        let mut max_shift_sq = 0.0f32;
        for ci in 0..centroids.len() {
            let old = centroids[ci];
            let new = if counts[ci] == 0 {
                // Dead cluster: restart it from a random sample
                samples[pick_index(rng, samples.len())]
            } else {
                ColorSample {
                    r: (sums[ci][0] as f64 / counts[ci] as f64).round() as u8,
                    g: (sums[ci][1] as f64 / counts[ci] as f64).round() as u8,
                    b: (sums[ci][2] as f64 / counts[ci] as f64).round() as u8,
                }
            };
            max_shift_sq = max_shift_sq.max(dist_sq(old, new));
            centroids[ci] = new;
        }

        if max_shift_sq <= CONVERGENCE_THRESHOLD * CONVERGENCE_THRESHOLD {
            converged = true;
            break;
        }
    }

    centroids.sort_by(|a, b| {
        vibrancy(*b)
            .partial_cmp(&vibrancy(*a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let processing_time_ms = start.elapsed().as_secs_f64() * 1000.0;
    if converged {
        crate::log_info!(
            "Palette extraction: {} colors from {} samples, converged after {} iterations ({:.1} ms)",
            centroids.len(),
            samples.len(),
            iterations_run,
            processing_time_ms
        );
    } else {
        crate::log_info!(
            "Palette extraction: {} colors from {} samples, iteration cap {} reached ({:.1} ms)",
            centroids.len(),
            samples.len(),
            iterations_run,
            processing_time_ms
        );
    }

    Ok(PaletteResult {
        colors: centroids,
        processing_time_ms,
        total_pixels_analyzed: samples.len(),
        sampling_rate,
    })
}

// ============================================================================
// INTERNALS
// ============================================================================

/// Build the working set: every `stride`-th pixel that is solid enough and
/// neither near-black nor near-white.
fn collect_samples(flat: &RgbaImage, max_samples: usize) -> Vec<ColorSample> {
    let total = (flat.width() as usize) * (flat.height() as usize);
    if total == 0 || max_samples == 0 {
        return Vec::new();
    }
    let src_raw = flat.as_raw();
    let stride = (total / max_samples).max(1);

    let mut samples = Vec::with_capacity(total.div_ceil(stride).min(max_samples + 1));
    let mut i = 0;
    while i < total {
        let pi = i * 4;
        let r = src_raw[pi];
        let g = src_raw[pi + 1];
        let b = src_raw[pi + 2];
        let a = src_raw[pi + 3];
        i += stride;

        if a < pixel::ALPHA_SOLID {
            continue;
        }
        let (_h, _s, l) =
            pixel::rgb_to_hsl(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
        if l < MIN_LIGHTNESS || l > MAX_LIGHTNESS {
            continue;
        }
        samples.push(ColorSample { r, g, b });
    }
    samples
}

/// K-means++ seeding: first centroid uniform, every further centroid drawn
/// with probability proportional to its squared distance from the nearest
/// centroid chosen so far.
fn seed_centroids<R: RandomSource>(
    samples: &[ColorSample],
    k: usize,
    rng: &mut R,
) -> Vec<ColorSample> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(samples[pick_index(rng, samples.len())]);

    while centroids.len() < k {
        let dists: Vec<f32> = samples
            .iter()
            .map(|s| {
                centroids
                    .iter()
                    .map(|c| dist_sq(*s, *c))
                    .fold(f32::MAX, f32::min)
            })
            .collect();
        let total: f32 = dists.iter().sum();

        let next = if total > 0.0 {
            let threshold = rng.next_f32() * total;
            let mut cum = 0.0f32;
            let mut chosen = samples.len() - 1;
            for (i, d) in dists.iter().enumerate() {
                cum += d;
                if cum > threshold {
                    chosen = i;
                    break;
                }
            }
            chosen
        } else {
            // Every sample coincides with a centroid already; any pick works
            pick_index(rng, samples.len())
        };
        centroids.push(samples[next]);
    }
    centroids
}

/// Index of the closest centroid; ties resolve to the lowest index.
fn nearest_centroid(s: ColorSample, centroids: &[ColorSample]) -> usize {
    let mut best = 0usize;
    let mut best_d = f32::MAX;
    for (i, c) in centroids.iter().enumerate() {
        let d = dist_sq(s, *c);
        if d < best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

fn dist_sq(a: ColorSample, b: ColorSample) -> f32 {
    let dr = a.r as f32 - b.r as f32;
    let dg = a.g as f32 - b.g as f32;
    let db = a.b as f32 - b.b as f32;
    dr * dr + dg * dg + db * db
}

fn pick_index<R: RandomSource>(rng: &mut R, len: usize) -> usize {
    ((rng.next_f32() * len as f32) as usize).min(len - 1)
}

/// Display-ordering key: saturated mid-lightness colors score near 1, muddy
/// or washed-out colors near 0.
fn vibrancy(c: ColorSample) -> f32 {
    let (_h, s, l) =
        pixel::rgb_to_hsl(c.r as f32 / 255.0, c.g as f32 / 255.0, c.b as f32 / 255.0);
    s * (1.0 - (l * 100.0 - 50.0).abs() / 50.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// Three equal horizontal bands of flat color.
    fn banded(colors: [[u8; 3]; 3]) -> RgbaImage {
        RgbaImage::from_fn(30, 30, |_, y| {
            let c = colors[(y / 10) as usize];
            Rgba([c[0], c[1], c[2], 255])
        })
    }

    fn nearest_of(c: ColorSample, targets: &[[u8; 3]]) -> usize {
        let mut best = 0;
        let mut best_d = f32::MAX;
        for (i, t) in targets.iter().enumerate() {
            let d = dist_sq(c, ColorSample { r: t[0], g: t[1], b: t[2] });
            if d < best_d {
                best_d = d;
                best = i;
            }
        }
        best
    }

    #[test]
    fn lcg_is_deterministic_and_in_range() {
        let mut a = Lcg::new(42);
        let mut b = Lcg::new(42);
        for _ in 0..1000 {
            let va = a.next_f32();
            assert_eq!(va, b.next_f32());
            assert!((0.0..1.0).contains(&va), "out of range: {}", va);
        }
        let mut c = Lcg::new(43);
        assert_ne!(Lcg::new(42).next_f32(), c.next_f32());
    }

    #[test]
    fn recovers_flat_band_colors_across_seeds() {
        let bands = [[200, 40, 40], [40, 200, 40], [40, 40, 200]];
        let img = banded(bands);
        let opts = PaletteOptions { k: 3, ..Default::default() };

        for seed in [1u64, 7, 99, 123456] {
            let result =
                extract_palette_with_rng(&img, &opts, &mut Lcg::new(seed)).unwrap();
            assert_eq!(result.colors.len(), 3, "seed {}", seed);

            // Every band color must be hit by exactly one centroid, within
            // a 2/channel tolerance
            let mut hit = [false; 3];
            for c in &result.colors {
                let i = nearest_of(*c, &bands);
                assert!(!hit[i], "seed {}: band {} claimed twice", seed, i);
                hit[i] = true;
                assert!(
                    (c.r as i32 - bands[i][0] as i32).abs() <= 2
                        && (c.g as i32 - bands[i][1] as i32).abs() <= 2
                        && (c.b as i32 - bands[i][2] as i32).abs() <= 2,
                    "seed {}: centroid {:?} vs band {:?}",
                    seed,
                    c,
                    bands[i]
                );
            }
        }
    }

    #[test]
    fn insufficient_samples_is_a_hard_error() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([128, 128, 128, 255]));
        let opts = PaletteOptions { k: 5, ..Default::default() };
        match extract_palette_with_rng(&img, &opts, &mut Lcg::new(1)) {
            Err(PaletteError::InsufficientSamples { found, needed }) => {
                assert_eq!(found, 4);
                assert_eq!(needed, 5);
            }
            other => panic!("expected InsufficientSamples, got {:?}", other),
        }
    }

    #[test]
    fn filters_transparent_and_extreme_lightness() {
        // Top row pure white (lightness 1.0), middle row transparent,
        // bottom row a real color: only the bottom row may be sampled
        let img = RgbaImage::from_fn(10, 3, |_, y| match y {
            0 => Rgba([255, 255, 255, 255]),
            1 => Rgba([90, 90, 90, 0]),
            _ => Rgba([100, 150, 200, 255]),
        });
        let opts = PaletteOptions { k: 1, ..Default::default() };
        let result = extract_palette_with_rng(&img, &opts, &mut Lcg::new(5)).unwrap();
        assert_eq!(result.total_pixels_analyzed, 10);
        assert_eq!(result.colors[0], ColorSample { r: 100, g: 150, b: 200 });
    }

    #[test]
    fn sampling_metadata() {
        let img = RgbaImage::from_pixel(100, 100, Rgba([128, 64, 64, 255]));
        let opts = PaletteOptions { k: 1, max_samples: 1000, ..Default::default() };
        let result = extract_palette_with_rng(&img, &opts, &mut Lcg::new(9)).unwrap();
        // 10_000 pixels at stride 10
        assert_eq!(result.total_pixels_analyzed, 1000);
        assert!((result.sampling_rate - 0.1).abs() < 1e-6);
        assert!(result.processing_time_ms >= 0.0);
    }

    #[test]
    fn vibrant_colors_order_first() {
        let img = RgbaImage::from_fn(20, 20, |_, y| {
            if y < 10 {
                Rgba([230, 20, 20, 255])
            } else {
                Rgba([128, 128, 128, 255])
            }
        });
        let opts = PaletteOptions { k: 2, ..Default::default() };
        let result = extract_palette_with_rng(&img, &opts, &mut Lcg::new(3)).unwrap();
        assert_eq!(result.colors.len(), 2);
        // The saturated red must sort ahead of the neutral gray
        assert!(result.colors[0].r > 200, "got {:?}", result.colors);
        assert_eq!(result.colors[1], ColorSample { r: 128, g: 128, b: 128 });
    }

    #[test]
    fn zero_k_yields_empty_palette() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([128, 128, 128, 255]));
        let opts = PaletteOptions { k: 0, ..Default::default() };
        let result = extract_palette_with_rng(&img, &opts, &mut Lcg::new(1)).unwrap();
        assert!(result.colors.is_empty());
        assert_eq!(result.total_pixels_analyzed, 16);
    }

    #[test]
    fn hex_formatting() {
        assert_eq!(ColorSample { r: 255, g: 0, b: 17 }.to_hex(), "#ff0011");
        assert_eq!(ColorSample { r: 0, g: 0, b: 0 }.to_hex(), "#000000");
        assert_eq!(ColorSample { r: 63, g: 162, b: 200 }.to_hex(), "#3fa2c8");
    }

    #[test]
    fn default_entry_point_runs() {
        let img = banded([[200, 40, 40], [40, 200, 40], [40, 40, 200]]);
        let result = extract_palette(&img, &PaletteOptions { k: 3, ..Default::default() })
            .unwrap();
        assert_eq!(result.colors.len(), 3);
    }
}
