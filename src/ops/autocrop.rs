// ============================================================================
// MASK-DRIVEN CROPPER
// ============================================================================
//
// Turns a segmentation mask into a final crop rectangle and applies it:
//
//   1. tightest bounding box over the mask's nonzero pixels
//   2. enforce a minimum crop size (uniform scale about the box center)
//   3. pad by a fraction of the box's own size, clamped into the image
//   4. collapse extreme aspect ratios to a centered square
//   5. round to an in-bounds integer Rect
//
// An empty mask degrades to a centered square over 80% of the short image
// side instead of failing; a rectangle that does not fit its buffer is a
// programming error upstream and fails loudly.
// ============================================================================

use crate::ops::segmenter::{SegmentError, Segmenter, SegmenterOptions};
use image::{GrayImage, RgbaImage};
use serde::{Deserialize, Serialize};

/// Fallback square side as a fraction of the short image dimension.
const FALLBACK_FRACTION: f32 = 0.8;
/// Width/height ratios beyond this (or under its inverse) collapse to a
/// centered square.
const MAX_ASPECT_RATIO: f32 = 3.0;

/// Axis-aligned crop rectangle.  Always lies fully inside the image it was
/// computed for: `x + width <= image_width`, `y + height <= image_height`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Settings for crop computation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CropOptions {
    /// Margin added on each side, as a fraction of the subject box's own
    /// width/height. Default: 0.15.
    pub padding_percentage: f32,
    /// Minimum subject-box dimension in pixels, enforced before padding.
    /// Default: 100.
    pub min_crop_size: u32,
}

impl Default for CropOptions {
    fn default() -> Self {
        Self {
            padding_percentage: 0.15,
            min_crop_size: 100,
        }
    }
}

/// Errors from crop application and the auto-crop pipeline.
#[derive(Debug)]
pub enum CropError {
    /// The rectangle is empty or reaches outside the buffer.
    OutOfBounds {
        rect: Rect,
        image_width: u32,
        image_height: u32,
    },
    /// The segmentation mask's dimensions do not match the image.
    MaskSizeMismatch {
        mask_width: u32,
        mask_height: u32,
        image_width: u32,
        image_height: u32,
    },
    /// The segmentation backend failed.
    Segmentation(SegmentError),
}

impl std::fmt::Display for CropError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CropError::OutOfBounds { rect, image_width, image_height } => write!(
                f,
                "Crop rectangle {}x{} at ({}, {}) does not fit a {}x{} image",
                rect.width, rect.height, rect.x, rect.y, image_width, image_height
            ),
            CropError::MaskSizeMismatch {
                mask_width,
                mask_height,
                image_width,
                image_height,
            } => write!(
                f,
                "Segmentation mask is {}x{} but the image is {}x{}",
                mask_width, mask_height, image_width, image_height
            ),
            CropError::Segmentation(e) => write!(f, "Segmentation failed: {}", e),
        }
    }
}

impl From<SegmentError> for CropError {
    fn from(e: SegmentError) -> Self {
        CropError::Segmentation(e)
    }
}

/// Output of the full auto-crop pipeline.
#[derive(Clone, Debug)]
pub struct AutoCropResult {
    pub image: RgbaImage,
    /// The rectangle that was cut, in source-image coordinates.
    pub rect: Rect,
    /// True when the mask was empty and the centered-square fallback ran.
    pub used_fallback: bool,
}

// ============================================================================
// CROP COMPUTATION
// ============================================================================

/// Tightest rectangle around the mask's nonzero pixels, or `None` when the
/// mask has no foreground at all.
pub fn mask_bounding_box(mask: &GrayImage) -> Option<Rect> {
    let (mw, mh) = (mask.width(), mask.height());
    // A 0x0 mask would leave min_x == max_x == 0 below and read as a
    // 1x1 hit; bail out before the scan
    if mw == 0 || mh == 0 {
        return None;
    }
    let mask_raw = mask.as_raw();

    let mut min_x = mw;
    let mut min_y = mh;
    let mut max_x = 0u32;
    let mut max_y = 0u32;
    for y in 0..mh {
        let row = y as usize * mw as usize;
        for x in 0..mw {
            if mask_raw[row + x as usize] > 0 {
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
    }

    if min_x > max_x || min_y > max_y {
        return None;
    }
    Some(Rect {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

/// Compute the crop rectangle for a mask over a `image_width` x
/// `image_height` buffer.
///
/// Returns `None` only for zero-area images.  An empty mask yields the
/// centered-square fallback rather than a failure, so the host always gets a
/// usable rectangle back.  The mask must have the image's dimensions.
pub fn compute_crop(
    mask: &GrayImage,
    image_width: u32,
    image_height: u32,
    options: &CropOptions,
) -> Option<Rect> {
    if image_width == 0 || image_height == 0 {
        return None;
    }
    debug_assert_eq!(mask.width(), image_width, "mask/image width mismatch");
    debug_assert_eq!(mask.height(), image_height, "mask/image height mismatch");

    let bbox = match mask_bounding_box(mask) {
        Some(b) => b,
        None => {
            crate::log_warn!(
                "Auto-crop: empty mask on {}x{} image, using centered fallback",
                image_width,
                image_height
            );
            let side = ((FALLBACK_FRACTION * image_width.min(image_height) as f32).round()
                as u32)
                .max(1);
            return Some(Rect {
                x: (image_width - side) / 2,
                y: (image_height - side) / 2,
                width: side,
                height: side,
            });
        }
    };

    let iw = image_width as f32;
    let ih = image_height as f32;
    let (mut x, mut y, mut w, mut h) = (
        bbox.x as f32,
        bbox.y as f32,
        bbox.width as f32,
        bbox.height as f32,
    );

    // 2) Minimum size: scale uniformly about the box center, keep in bounds
    let min_size = options.min_crop_size as f32;
    if w < min_size || h < min_size {
        let scale = (min_size / w).max(min_size / h);
        let cx = x + w / 2.0;
        let cy = y + h / 2.0;
        w = (w * scale).min(iw);
        h = (h * scale).min(ih);
        x = (cx - w / 2.0).clamp(0.0, iw - w);
        y = (cy - h / 2.0).clamp(0.0, ih - h);
    }

    // 3) Padding, proportional to the box's own size.  Left/top clamp to the
    // image edge; width/height then trim to the far edge without shifting
    // back, so a subject near an edge keeps a smaller margin on that side
    let pad_x = w * options.padding_percentage;
    let pad_y = h * options.padding_percentage;
    let new_x = (x - pad_x).max(0.0);
    let new_y = (y - pad_y).max(0.0);
    let new_w = (w + 2.0 * pad_x).min(iw - new_x);
    let new_h = (h + 2.0 * pad_y).min(ih - new_y);

    // 4) Collapse extreme aspect ratios to a centered square
    let (mut fx, mut fy, mut fw, mut fh) = (new_x, new_y, new_w, new_h);
    let ratio = fw / fh;
    if ratio > MAX_ASPECT_RATIO || ratio < 1.0 / MAX_ASPECT_RATIO {
        let side = fw.min(fh);
        fx = (fx + (fw - side) / 2.0).clamp(0.0, iw - side);
        fy = (fy + (fh - side) / 2.0).clamp(0.0, ih - side);
        fw = side;
        fh = side;
    }

    // 5) Integer rounding, re-clamped so the rect is always legal
    let rx = (fx.round() as u32).min(image_width - 1);
    let ry = (fy.round() as u32).min(image_height - 1);
    let rw = (fw.round() as u32).clamp(1, image_width - rx);
    let rh = (fh.round() as u32).clamp(1, image_height - ry);

    Some(Rect { x: rx, y: ry, width: rw, height: rh })
}

/// Cut `rect` out of the image with a row-by-row block copy, no resampling.
/// An empty or out-of-bounds rectangle is an upstream programming error and
/// fails loudly.
pub fn apply_crop(flat: &RgbaImage, rect: &Rect) -> Result<RgbaImage, CropError> {
    let (iw, ih) = (flat.width(), flat.height());
    let fits_x = rect.x.checked_add(rect.width).is_some_and(|r| r <= iw);
    let fits_y = rect.y.checked_add(rect.height).is_some_and(|b| b <= ih);
    if rect.width == 0 || rect.height == 0 || !fits_x || !fits_y {
        crate::log_err!(
            "apply_crop: rect {}x{} at ({}, {}) rejected for {}x{} buffer",
            rect.width,
            rect.height,
            rect.x,
            rect.y,
            iw,
            ih
        );
        return Err(CropError::OutOfBounds {
            rect: *rect,
            image_width: iw,
            image_height: ih,
        });
    }

    let src_raw = flat.as_raw();
    let src_stride = iw as usize * 4;
    let out_stride = rect.width as usize * 4;
    let mut dst_raw = vec![0u8; rect.height as usize * out_stride];

    for row in 0..rect.height as usize {
        let si = (rect.y as usize + row) * src_stride + rect.x as usize * 4;
        let di = row * out_stride;
        dst_raw[di..di + out_stride].copy_from_slice(&src_raw[si..si + out_stride]);
    }

    Ok(RgbaImage::from_raw(rect.width, rect.height, dst_raw).unwrap())
}

/// Full auto-crop: segment the subject, compute the crop, cut it out.
///
/// This is the core's "Auto-Crop to Subject" command; the host only supplies
/// the segmentation backend.
pub fn auto_crop<S: Segmenter + ?Sized>(
    flat: &RgbaImage,
    segmenter: &mut S,
    seg_options: &SegmenterOptions,
    crop_options: &CropOptions,
) -> Result<AutoCropResult, CropError> {
    let mask = segmenter.segment(flat, seg_options)?;

    if mask.width() != flat.width() || mask.height() != flat.height() {
        crate::log_err!(
            "Auto-crop: segmenter returned {}x{} mask for {}x{} image",
            mask.width(),
            mask.height(),
            flat.width(),
            flat.height()
        );
        return Err(CropError::MaskSizeMismatch {
            mask_width: mask.width(),
            mask_height: mask.height(),
            image_width: flat.width(),
            image_height: flat.height(),
        });
    }

    let used_fallback = mask_bounding_box(&mask).is_none();
    let rect = match compute_crop(&mask, flat.width(), flat.height(), crop_options) {
        Some(r) => r,
        // compute_crop only declines zero-area images
        None => {
            return Err(CropError::OutOfBounds {
                rect: Rect { x: 0, y: 0, width: 0, height: 0 },
                image_width: flat.width(),
                image_height: flat.height(),
            });
        }
    };
    let image = apply_crop(flat, &rect)?;

    crate::log_info!(
        "Auto-crop: {}x{} image -> {}x{} at ({}, {}){}",
        flat.width(),
        flat.height(),
        rect.width,
        rect.height,
        rect.x,
        rect.y,
        if used_fallback { " [fallback]" } else { "" }
    );
    Ok(AutoCropResult { image, rect, used_fallback })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgba};

    fn rect_mask(w: u32, h: u32, fx: u32, fy: u32, fw: u32, fh: u32) -> GrayImage {
        let mut mask = GrayImage::new(w, h);
        for y in fy..fy + fh {
            for x in fx..fx + fw {
                mask.put_pixel(x, y, Luma([1]));
            }
        }
        mask
    }

    fn patterned(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            Rgba([x as u8, y as u8, (x * 7 + y * 13) as u8, 255])
        })
    }

    #[test]
    fn bounding_box_of_rect_mask() {
        let mask = rect_mask(20, 10, 3, 2, 5, 4);
        assert_eq!(
            mask_bounding_box(&mask),
            Some(Rect { x: 3, y: 2, width: 5, height: 4 })
        );
    }

    #[test]
    fn bounding_box_of_empty_mask() {
        assert_eq!(mask_bounding_box(&GrayImage::new(16, 16)), None);
    }

    #[test]
    fn bounding_box_of_zero_area_mask() {
        assert_eq!(mask_bounding_box(&GrayImage::new(0, 0)), None);
        assert_eq!(mask_bounding_box(&GrayImage::new(0, 4)), None);
        assert_eq!(mask_bounding_box(&GrayImage::new(4, 0)), None);
    }

    #[test]
    fn bounding_box_single_pixel() {
        let mut mask = GrayImage::new(8, 8);
        mask.put_pixel(5, 6, Luma([255]));
        assert_eq!(
            mask_bounding_box(&mask),
            Some(Rect { x: 5, y: 6, width: 1, height: 1 })
        );
    }

    #[test]
    fn no_padding_no_min_size_returns_exact_bbox() {
        let mask = rect_mask(40, 30, 5, 4, 15, 10);
        let opts = CropOptions { padding_percentage: 0.0, min_crop_size: 1 };
        assert_eq!(
            compute_crop(&mask, 40, 30, &opts),
            Some(Rect { x: 5, y: 4, width: 15, height: 10 })
        );
    }

    #[test]
    fn empty_mask_falls_back_to_centered_square() {
        let mask = GrayImage::new(100, 60);
        let rect = compute_crop(&mask, 100, 60, &CropOptions::default()).unwrap();
        // 0.8 * 60 = 48, centered
        assert_eq!(rect, Rect { x: 26, y: 6, width: 48, height: 48 });
    }

    #[test]
    fn small_subject_is_scaled_to_min_size_then_padded() {
        let mask = rect_mask(200, 200, 50, 60, 10, 20);
        let opts = CropOptions { padding_percentage: 0.15, min_crop_size: 100 };
        // Scale x10 about center (55, 70) -> 100x200 clamped to (5, 0);
        // padding 15/30 clamps top-left to (0, 0) and trims to fit
        assert_eq!(
            compute_crop(&mask, 200, 200, &opts),
            Some(Rect { x: 0, y: 0, width: 130, height: 200 })
        );
    }

    #[test]
    fn padding_trims_at_the_far_edge_without_shifting() {
        let mask = rect_mask(100, 100, 80, 40, 20, 20);
        let opts = CropOptions { padding_percentage: 0.25, min_crop_size: 1 };
        let rect = compute_crop(&mask, 100, 100, &opts).unwrap();
        // Left edge keeps its 5px margin; the right margin is simply cut off
        assert_eq!(rect, Rect { x: 75, y: 35, width: 25, height: 30 });
        assert_eq!(rect.x + rect.width, 100);
    }

    #[test]
    fn extreme_aspect_collapses_to_centered_square() {
        let mask = rect_mask(300, 300, 50, 100, 200, 10);
        let opts = CropOptions { padding_percentage: 0.0, min_crop_size: 1 };
        assert_eq!(
            compute_crop(&mask, 300, 300, &opts),
            Some(Rect { x: 145, y: 100, width: 10, height: 10 })
        );
    }

    #[test]
    fn zero_area_image_yields_none() {
        assert_eq!(
            compute_crop(&GrayImage::new(0, 0), 0, 0, &CropOptions::default()),
            None
        );
    }

    #[test]
    fn apply_crop_extracts_the_right_pixels() {
        let img = patterned(10, 10);
        let rect = Rect { x: 2, y: 3, width: 4, height: 5 };
        let out = apply_crop(&img, &rect).unwrap();
        assert_eq!(out.width(), 4);
        assert_eq!(out.height(), 5);
        assert_eq!(out.get_pixel(0, 0), img.get_pixel(2, 3));
        assert_eq!(out.get_pixel(3, 4), img.get_pixel(5, 7));
    }

    #[test]
    fn apply_crop_rejects_out_of_bounds() {
        let img = patterned(10, 10);
        let r = apply_crop(&img, &Rect { x: 8, y: 8, width: 5, height: 5 });
        assert!(matches!(r, Err(CropError::OutOfBounds { .. })));

        let r = apply_crop(&img, &Rect { x: 0, y: 0, width: 0, height: 3 });
        assert!(matches!(r, Err(CropError::OutOfBounds { .. })));
    }

    #[test]
    fn composed_crops_equal_one_absolute_crop() {
        let img = patterned(20, 20);
        let first = Rect { x: 4, y: 3, width: 12, height: 10 };
        let second = Rect { x: 2, y: 5, width: 6, height: 4 };

        let step1 = apply_crop(&img, &first).unwrap();
        let step2 = apply_crop(&step1, &second).unwrap();

        let absolute = Rect {
            x: first.x + second.x,
            y: first.y + second.y,
            width: second.width,
            height: second.height,
        };
        let direct = apply_crop(&img, &absolute).unwrap();
        assert_eq!(step2.as_raw(), direct.as_raw());
    }

    // --- auto_crop orchestration ---

    struct FakeSegmenter {
        mask: GrayImage,
    }

    impl Segmenter for FakeSegmenter {
        fn segment(
            &mut self,
            _image: &RgbaImage,
            _options: &SegmenterOptions,
        ) -> Result<GrayImage, SegmentError> {
            Ok(self.mask.clone())
        }
    }

    struct FailingSegmenter;

    impl Segmenter for FailingSegmenter {
        fn segment(
            &mut self,
            _image: &RgbaImage,
            _options: &SegmenterOptions,
        ) -> Result<GrayImage, SegmentError> {
            Err(SegmentError::ModelUnavailable("model file missing".to_string()))
        }
    }

    #[test]
    fn auto_crop_cuts_the_subject() {
        let img = patterned(120, 120);
        let mut seg = FakeSegmenter { mask: rect_mask(120, 120, 30, 40, 20, 20) };
        let opts = CropOptions { padding_percentage: 0.0, min_crop_size: 1 };
        let result =
            auto_crop(&img, &mut seg, &SegmenterOptions::default(), &opts).unwrap();

        assert!(!result.used_fallback);
        assert_eq!(result.rect, Rect { x: 30, y: 40, width: 20, height: 20 });
        assert_eq!(result.image.width(), 20);
        assert_eq!(result.image.get_pixel(0, 0), img.get_pixel(30, 40));
    }

    #[test]
    fn auto_crop_reports_fallback() {
        let img = patterned(100, 100);
        let mut seg = FakeSegmenter { mask: GrayImage::new(100, 100) };
        let result = auto_crop(
            &img,
            &mut seg,
            &SegmenterOptions::default(),
            &CropOptions::default(),
        )
        .unwrap();

        assert!(result.used_fallback);
        assert_eq!(result.rect, Rect { x: 10, y: 10, width: 80, height: 80 });
    }

    #[test]
    fn auto_crop_rejects_mismatched_mask() {
        let img = patterned(50, 50);
        let mut seg = FakeSegmenter { mask: GrayImage::new(49, 50) };
        let r = auto_crop(
            &img,
            &mut seg,
            &SegmenterOptions::default(),
            &CropOptions::default(),
        );
        assert!(matches!(r, Err(CropError::MaskSizeMismatch { .. })));
    }

    #[test]
    fn auto_crop_propagates_segmenter_failure() {
        let img = patterned(50, 50);
        let r = auto_crop(
            &img,
            &mut FailingSegmenter,
            &SegmenterOptions::default(),
            &CropOptions::default(),
        );
        match r {
            Err(CropError::Segmentation(SegmentError::ModelUnavailable(msg))) => {
                assert!(msg.contains("missing"));
            }
            other => panic!("expected segmentation error, got {:?}", other),
        }
    }
}
