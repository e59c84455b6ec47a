//! Capture domain: decoding the submitted photo.
//!
//! A `RawCapture` is the bitmap exactly as the camera or picker handed it
//! over, plus its orientation metadata. It is consumed once: the pipeline
//! bakes the orientation in and works on the upright image from then on.

mod preprocess;

pub use preprocess::ImagePreprocessor;

use crate::error::{Result, ScanError};
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;
use std::path::Path;

/// Bitmap plus orientation, straight from the capture collaborator.
#[derive(Debug, Clone)]
pub struct RawCapture {
    image: DynamicImage,
    orientation: Orientation,
}

impl RawCapture {
    pub fn new(image: DynamicImage, orientation: Orientation) -> Self {
        Self { image, orientation }
    }

    /// Wrap an already-upright bitmap.
    pub fn upright_image(image: DynamicImage) -> Self {
        Self::new(image, Orientation::NoTransforms)
    }

    /// Decode encoded bytes (JPEG, PNG, ...) and read their EXIF orientation.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ScanError::image_invalid("unrecognised image format", e))?;
        let mut decoder = reader
            .into_decoder()
            .map_err(|e| ScanError::image_invalid("no decoder for image", e))?;
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        let image = DynamicImage::from_decoder(decoder)
            .map_err(|e| ScanError::image_invalid("image data is corrupt", e))?;

        if image.width() == 0 || image.height() == 0 {
            return Err(ScanError::ImageInvalid {
                message: "image has zero area".to_string(),
                source: None,
            });
        }

        log::info!(
            "[CAPTURE] Decoded {}x{} ({} bytes), orientation={:?}",
            image.width(),
            image.height(),
            bytes.len(),
            orientation
        );
        Ok(Self { image, orientation })
    }

    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            ScanError::image_invalid(format!("cannot read {}", path.display()), e)
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// Consume the capture and return the bitmap with orientation applied.
    pub fn into_upright(self) -> DynamicImage {
        let mut image = self.image;
        if self.orientation != Orientation::NoTransforms {
            image.apply_orientation(self.orientation);
            log::info!(
                "[CAPTURE] Applied {:?} → {}x{}",
                self.orientation,
                image.width(),
                image.height()
            );
        }
        image
    }
}

/// Encode a bitmap to PNG in memory, for AI uploads and the
/// persisted photo.
pub fn to_png_bytes(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png_bytes), image::ImageFormat::Png)
        .map_err(|e| ScanError::image_invalid("PNG encode failed", e))?;
    Ok(png_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 200, 200]));
        to_png_bytes(&DynamicImage::ImageRgb8(img)).unwrap()
    }

    #[test]
    fn decodes_png_without_orientation() {
        let capture = RawCapture::from_bytes(&sample_png(40, 20)).unwrap();
        assert_eq!(capture.dimensions(), (40, 20));
        assert_eq!(capture.orientation(), Orientation::NoTransforms);
    }

    #[test]
    fn garbage_bytes_are_image_invalid() {
        let err = RawCapture::from_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ScanError::ImageInvalid { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn rotation_is_baked_in() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(40, 20));
        let upright = RawCapture::new(img, Orientation::Rotate90).into_upright();
        assert_eq!((upright.width(), upright.height()), (20, 40));
    }
}
