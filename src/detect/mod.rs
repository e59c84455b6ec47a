//! Card boundary detection and perspective correction.
//!
//! Coordinates crossing this module boundary are normalized to the unit
//! square with a top-left origin. Detector and rectifier both go through
//! `DetectedQuadrilateral::to_pixels`, so neither side ever flips an axis.

mod contour;
mod rectify;

pub use contour::ContourDetector;
pub use rectify::ProjectiveRectifier;

use crate::error::Result;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// A point in normalized image space, both axes in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f32,
    pub y: f32,
}

impl NormalizedPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x: x.clamp(0.0, 1.0),
            y: y.clamp(0.0, 1.0),
        }
    }
}

/// Four consistently ordered card corners plus detector confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedQuadrilateral {
    pub top_left: NormalizedPoint,
    pub top_right: NormalizedPoint,
    pub bottom_left: NormalizedPoint,
    pub bottom_right: NormalizedPoint,
    pub confidence: f32,
}

impl DetectedQuadrilateral {
    /// Build from four pixel-space corners in any order.
    pub fn from_pixel_corners(
        corners: [(f32, f32); 4],
        width: u32,
        height: u32,
        confidence: f32,
    ) -> Self {
        let [tl, tr, br, bl] = order_corners(corners);
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        let norm = |(x, y): (f32, f32)| NormalizedPoint::new(x / w, y / h);
        Self {
            top_left: norm(tl),
            top_right: norm(tr),
            bottom_left: norm(bl),
            bottom_right: norm(br),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Pixel corners for an image of the given size, in
    /// top-left, top-right, bottom-right, bottom-left order.
    pub fn to_pixels(&self, width: u32, height: u32) -> [(f32, f32); 4] {
        let (w, h) = (width as f32, height as f32);
        let px = |p: NormalizedPoint| (p.x * w, p.y * h);
        [
            px(self.top_left),
            px(self.top_right),
            px(self.bottom_right),
            px(self.bottom_left),
        ]
    }

    /// Upright output size in pixels: mean of opposite edge lengths.
    pub fn pixel_size(&self, width: u32, height: u32) -> (f32, f32) {
        let [tl, tr, br, bl] = self.to_pixels(width, height);
        let out_w = (distance(tl, tr) + distance(bl, br)) / 2.0;
        let out_h = (distance(tl, bl) + distance(tr, br)) / 2.0;
        (out_w, out_h)
    }

    /// Short side over long side of the upright output, in (0, 1].
    pub fn aspect_ratio(&self, width: u32, height: u32) -> f32 {
        let (w, h) = self.pixel_size(width, height);
        let (short, long) = if w < h { (w, h) } else { (h, w) };
        if long <= f32::EPSILON {
            0.0
        } else {
            short / long
        }
    }

    /// Area as a fraction of the full image.
    pub fn area_fraction(&self) -> f32 {
        shoelace_area(&[
            (self.top_left.x, self.top_left.y),
            (self.top_right.x, self.top_right.y),
            (self.bottom_right.x, self.bottom_right.y),
            (self.bottom_left.x, self.bottom_left.y),
        ])
    }
}

/// Finds the card boundary in a photo.
pub trait RectangleDetector: Send + Sync {
    /// Best candidate clearing every threshold, or `RectangleNotFound`.
    fn detect(&self, image: &DynamicImage) -> Result<DetectedQuadrilateral>;
}

/// Warps a detected quadrilateral into an upright rectangle.
pub trait PerspectiveRectifier: Send + Sync {
    fn rectify(&self, image: &DynamicImage, quad: &DetectedQuadrilateral) -> Result<DynamicImage>;
}

pub(crate) fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

/// Polygon area via the shoelace formula (vertices in order).
pub(crate) fn shoelace_area(points: &[(f32, f32)]) -> f32 {
    let n = points.len();
    let mut sum = 0.0;
    for i in 0..n {
        let (x1, y1) = points[i];
        let (x2, y2) = points[(i + 1) % n];
        sum += x1 * y2 - x2 * y1;
    }
    sum.abs() / 2.0
}

/// Order corners as top-left, top-right, bottom-right, bottom-left.
///
/// Top-left has the smallest x+y, bottom-right the largest; top-right the
/// smallest y-x, bottom-left the largest.
pub(crate) fn order_corners(corners: [(f32, f32); 4]) -> [(f32, f32); 4] {
    let by = |key: fn(&(f32, f32)) -> f32, max: bool| {
        let mut best = corners[0];
        for c in &corners[1..] {
            let better = if max { key(c) > key(&best) } else { key(c) < key(&best) };
            if better {
                best = *c;
            }
        }
        best
    };
    let tl = by(|p| p.0 + p.1, false);
    let br = by(|p| p.0 + p.1, true);
    let tr = by(|p| p.1 - p.0, false);
    let bl = by(|p| p.1 - p.0, true);
    [tl, tr, br, bl]
}
