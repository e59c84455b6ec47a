//! Projective warp of the detected card into an upright rectangle.

use super::{DetectedQuadrilateral, PerspectiveRectifier};
use crate::error::{Result, ScanError};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

/// Output edges shorter than this are treated as a failed warp.
const MIN_OUTPUT_EDGE: f32 = 16.0;

#[derive(Debug, Default, Clone, Copy)]
pub struct ProjectiveRectifier;

impl ProjectiveRectifier {
    pub fn new() -> Self {
        Self
    }
}

impl PerspectiveRectifier for ProjectiveRectifier {
    fn rectify(&self, image: &DynamicImage, quad: &DetectedQuadrilateral) -> Result<DynamicImage> {
        let start = std::time::Instant::now();
        let (w, h) = (image.width(), image.height());
        let src = quad.to_pixels(w, h);
        let (out_w, out_h) = quad.pixel_size(w, h);

        if !out_w.is_finite() || !out_h.is_finite() || out_w < MIN_OUTPUT_EDGE || out_h < MIN_OUTPUT_EDGE {
            return Err(ScanError::CroppingFailed {
                reason: format!("degenerate output size {:.0}x{:.0}", out_w, out_h),
            });
        }
        let (out_w, out_h) = (out_w.round() as u32, out_h.round() as u32);

        let dest = [
            (0.0, 0.0),
            (out_w as f32, 0.0),
            (out_w as f32, out_h as f32),
            (0.0, out_h as f32),
        ];

        let projection = Projection::from_control_points(src, dest).ok_or_else(|| {
            ScanError::CroppingFailed {
                reason: "corners do not define a projective transform".to_string(),
            }
        })?;

        let input = image.to_rgb8();
        let mut output = RgbImage::new(out_w, out_h);
        warp_into(
            &input,
            &projection,
            Interpolation::Bilinear,
            Rgb([255, 255, 255]),
            &mut output,
        );

        log::info!(
            "[RECTIFY] Warped to {}x{} in {}ms",
            out_w,
            out_h,
            start.elapsed().as_millis()
        );
        Ok(DynamicImage::ImageRgb8(output))
    }
}
