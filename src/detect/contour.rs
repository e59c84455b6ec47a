//! Contour-based card detector.
//!
//! 1. Downscale to a working size, convert to histogram-equalised grayscale
//! 2. Gaussian blur, Canny edges, one dilation pass to close gaps
//! 3. Trace contours and approximate each as a polygon
//! 4. Keep convex quadrilaterals that are card-shaped and large enough
//! 5. Score by corner squareness, relative size and centrality

use super::{distance, shoelace_area, DetectedQuadrilateral, RectangleDetector};
use crate::config::DetectorConfig;
use crate::error::{Result, ScanError};
use image::imageops::FilterType;
use image::DynamicImage;
use imageproc::contours::find_contours;
use imageproc::contrast::equalize_histogram;
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::morphology::dilate;
use imageproc::point::Point;

/// Weight of corner squareness in the confidence score.
const SQUARENESS_WEIGHT: f32 = 0.5;
/// Weight of relative area in the confidence score.
const AREA_WEIGHT: f32 = 0.3;
/// Weight of centrality in the confidence score.
const CENTRALITY_WEIGHT: f32 = 0.2;
/// Area fraction at which the area term saturates.
const AREA_SATURATION: f32 = 0.5;
/// Contours shorter than this (in working pixels) are noise.
const MIN_CONTOUR_POINTS: usize = 20;

pub struct ContourDetector {
    config: DetectorConfig,
}

impl ContourDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// All candidates clearing the thresholds, best first, capped.
    pub fn candidates(&self, image: &DynamicImage) -> Vec<DetectedQuadrilateral> {
        let longest = image.width().max(image.height());
        let working = if longest > self.config.working_dimension {
            image.resize(
                self.config.working_dimension,
                self.config.working_dimension,
                FilterType::Triangle,
            )
        } else {
            image.clone()
        };
        let (w, h) = (working.width(), working.height());

        let gray = equalize_histogram(&working.to_luma8());
        let blurred = gaussian_blur_f32(&gray, self.config.blur_sigma);
        let edges = canny(&blurred, self.config.canny_low, self.config.canny_high);
        let closed = dilate(&edges, Norm::LInf, 1);

        let contours = find_contours::<i32>(&closed);
        log::debug!("[DETECT] {} contours traced at {}x{}", contours.len(), w, h);

        let mut found: Vec<DetectedQuadrilateral> = contours
            .iter()
            .filter(|c| c.points.len() >= MIN_CONTOUR_POINTS)
            .filter_map(|c| self.evaluate(&c.points, w, h))
            .collect();

        found.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        found.dedup_by(|a, b| same_quad(a, b));
        found.truncate(self.config.max_candidates);
        found
    }

    /// Turn one traced contour into a scored candidate, if it qualifies.
    fn evaluate(&self, points: &[Point<i32>], w: u32, h: u32) -> Option<DetectedQuadrilateral> {
        let perimeter = arc_length(points, true);
        let polygon = approximate_polygon_dp(points, perimeter * self.config.poly_epsilon, true);
        if polygon.len() != 4 {
            return None;
        }

        let corners = [
            (polygon[0].x as f32, polygon[0].y as f32),
            (polygon[1].x as f32, polygon[1].y as f32),
            (polygon[2].x as f32, polygon[2].y as f32),
            (polygon[3].x as f32, polygon[3].y as f32),
        ];
        let quad = DetectedQuadrilateral::from_pixel_corners(corners, w, h, 0.0);
        let ordered = quad.to_pixels(w, h);
        if !is_convex(&ordered) {
            return None;
        }

        let area = quad.area_fraction();
        if area < self.config.min_size {
            return None;
        }

        let aspect = quad.aspect_ratio(w, h);
        if aspect < self.config.min_aspect_ratio || aspect > self.config.max_aspect_ratio {
            log::debug!("[DETECT] Rejected quad: aspect {:.2}", aspect);
            return None;
        }

        let confidence = SQUARENESS_WEIGHT * squareness(&ordered)
            + AREA_WEIGHT * (area / AREA_SATURATION).min(1.0)
            + CENTRALITY_WEIGHT * centrality(&quad);
        if confidence < self.config.min_confidence {
            return None;
        }

        Some(DetectedQuadrilateral { confidence, ..quad })
    }
}

impl RectangleDetector for ContourDetector {
    fn detect(&self, image: &DynamicImage) -> Result<DetectedQuadrilateral> {
        let start = std::time::Instant::now();
        let candidates = self.candidates(image);
        let ms = start.elapsed().as_millis();

        match candidates.into_iter().next() {
            Some(best) => {
                log::info!(
                    "[DETECT] Card found in {}ms: confidence={:.2}, area={:.2}",
                    ms,
                    best.confidence,
                    best.area_fraction()
                );
                Ok(best)
            }
            None => {
                log::info!("[DETECT] No card-shaped quadrilateral in {}ms", ms);
                Err(ScanError::RectangleNotFound {
                    reason: format!(
                        "no quadrilateral with aspect in [{}, {}], area >= {} and confidence >= {}",
                        self.config.min_aspect_ratio,
                        self.config.max_aspect_ratio,
                        self.config.min_size,
                        self.config.min_confidence
                    ),
                })
            }
        }
    }
}

/// 1.0 for right angles at every corner, falling towards 0 as they skew.
fn squareness(c: &[(f32, f32); 4]) -> f32 {
    let mut total = 0.0;
    for i in 0..4 {
        let prev = c[(i + 3) % 4];
        let cur = c[i];
        let next = c[(i + 1) % 4];
        let v1 = (prev.0 - cur.0, prev.1 - cur.1);
        let v2 = (next.0 - cur.0, next.1 - cur.1);
        let len = distance(prev, cur) * distance(next, cur);
        if len <= f32::EPSILON {
            return 0.0;
        }
        let cos = (v1.0 * v2.0 + v1.1 * v2.1) / len;
        total += cos.abs();
    }
    (1.0 - total / 4.0).clamp(0.0, 1.0)
}

/// 1.0 when the quad's centroid sits at the image centre.
fn centrality(q: &DetectedQuadrilateral) -> f32 {
    let cx = (q.top_left.x + q.top_right.x + q.bottom_left.x + q.bottom_right.x) / 4.0;
    let cy = (q.top_left.y + q.top_right.y + q.bottom_left.y + q.bottom_right.y) / 4.0;
    let off = distance((cx, cy), (0.5, 0.5));
    (1.0 - off / std::f32::consts::FRAC_1_SQRT_2).clamp(0.0, 1.0)
}

fn is_convex(c: &[(f32, f32); 4]) -> bool {
    let mut sign = 0.0f32;
    for i in 0..4 {
        let a = c[i];
        let b = c[(i + 1) % 4];
        let d = c[(i + 2) % 4];
        let cross = (b.0 - a.0) * (d.1 - b.1) - (b.1 - a.1) * (d.0 - b.0);
        if cross.abs() <= f32::EPSILON {
            return false;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    shoelace_area(c) > 0.0
}

/// Inner and outer borders of the same dilated edge ring trace almost the
/// same quad; keep only the better one.
fn same_quad(a: &DetectedQuadrilateral, b: &DetectedQuadrilateral) -> bool {
    const TOL: f32 = 0.03;
    let close = |p: super::NormalizedPoint, q: super::NormalizedPoint| {
        (p.x - q.x).abs() < TOL && (p.y - q.y).abs() < TOL
    };
    close(a.top_left, b.top_left)
        && close(a.top_right, b.top_right)
        && close(a.bottom_left, b.bottom_left)
        && close(a.bottom_right, b.bottom_right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// Dark table with a light card-sized rectangle on it.
    fn card_photo(w: u32, h: u32, card: (u32, u32, u32, u32)) -> DynamicImage {
        let mut img = RgbImage::from_pixel(w, h, Rgb([30, 30, 35]));
        let (x0, y0, x1, y1) = card;
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, Rgb([235, 235, 230]));
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn finds_card_on_dark_background() {
        let photo = card_photo(800, 600, (150, 150, 650, 450));
        let detector = ContourDetector::new(DetectorConfig::default());
        let quad = detector.detect(&photo).unwrap();

        assert!(quad.confidence >= 0.5);
        assert!((quad.top_left.x - 150.0 / 800.0).abs() < 0.03);
        assert!((quad.top_left.y - 150.0 / 600.0).abs() < 0.03);
        assert!((quad.bottom_right.x - 650.0 / 800.0).abs() < 0.03);
        assert!((quad.bottom_right.y - 450.0 / 600.0).abs() < 0.03);
    }

    #[test]
    fn blank_image_has_no_card() {
        let blank = DynamicImage::ImageRgb8(RgbImage::from_pixel(400, 300, Rgb([128, 128, 128])));
        let detector = ContourDetector::new(DetectorConfig::default());
        let err = detector.detect(&blank).unwrap_err();
        assert!(matches!(err, ScanError::RectangleNotFound { .. }));
    }

    #[test]
    fn tiny_rectangle_is_rejected() {
        let photo = card_photo(800, 600, (380, 280, 460, 330));
        let detector = ContourDetector::new(DetectorConfig::default());
        assert!(detector.detect(&photo).is_err());
    }

    #[test]
    fn square_is_not_card_shaped() {
        let photo = card_photo(800, 800, (150, 150, 650, 650));
        let detector = ContourDetector::new(DetectorConfig::default());
        assert!(detector.detect(&photo).is_err());
    }

    #[test]
    fn candidates_are_capped() {
        let photo = card_photo(800, 600, (150, 150, 650, 450));
        let mut config = DetectorConfig::default();
        config.max_candidates = 1;
        let detector = ContourDetector::new(config);
        assert!(detector.candidates(&photo).len() <= 1);
    }

    #[test]
    fn right_angles_are_square() {
        let rect = [(0.0, 0.0), (10.0, 0.0), (10.0, 5.0), (0.0, 5.0)];
        assert!((squareness(&rect) - 1.0).abs() < 1e-5);
        assert!(is_convex(&rect));
    }
}
