//! Resize and contrast-enhance the upright bitmap before detection and OCR.

use crate::config::PreprocessConfig;
use image::imageops::FilterType;
use image::DynamicImage;

pub struct ImagePreprocessor {
    config: PreprocessConfig,
}

impl ImagePreprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Bring the image into the size band the recognizer works best in and
    /// lift the contrast a little.
    pub fn prepare(&self, image: &DynamicImage) -> DynamicImage {
        let start = std::time::Instant::now();
        let (w, h) = (image.width(), image.height());
        let longest = w.max(h);
        let shortest = w.min(h).max(1);

        let resized = if longest > self.config.max_dimension {
            image.resize(
                self.config.max_dimension,
                self.config.max_dimension,
                FilterType::Triangle,
            )
        } else if shortest < self.config.min_dimension {
            let scale = self.config.min_dimension as f32 / shortest as f32;
            // Never blow past the max edge while upscaling.
            let scale = scale.min(self.config.max_dimension as f32 / longest as f32);
            let nw = ((w as f32) * scale).round().max(1.0) as u32;
            let nh = ((h as f32) * scale).round().max(1.0) as u32;
            image.resize_exact(nw, nh, FilterType::CatmullRom)
        } else {
            image.clone()
        };

        let out = if self.config.contrast != 0.0 {
            resized.adjust_contrast(self.config.contrast)
        } else {
            resized
        };

        log::info!(
            "[CAPTURE] Preprocessed {}x{} → {}x{} in {}ms",
            w,
            h,
            out.width(),
            out.height(),
            start.elapsed().as_millis()
        );
        out
    }
}
