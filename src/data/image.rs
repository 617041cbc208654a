// ============================================================
// Layer 4 — Image Transform
// ============================================================
// Turns an image file into the flat CHW float buffer the
// encoder expects:
//
//   decode -> resize to (width, height) -> RGB
//          -> scale to [0, 1] -> subtract mean / divide std
//
// Mean and std are the ImageNet statistics the pretrained VGG16
// weights were trained with.

use std::path::Path;

use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage};

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD:  [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageTransform {
    pub height: u32,
    pub width:  u32,
}

impl ImageTransform {
    pub fn new(height: usize, width: usize) -> Self {
        Self { height: height as u32, width: width as u32 }
    }

    /// Length of the buffer produced for one image: 3 * height * width
    pub fn pixel_count(&self) -> usize {
        3 * self.height as usize * self.width as usize
    }

    /// Decode and transform the image at `path`.
    pub fn load(&self, path: &Path) -> Result<Vec<f32>> {
        let img = image::open(path)
            .with_context(|| format!("Cannot decode image '{}'", path.display()))?;
        Ok(self.apply(&img))
    }

    pub fn apply(&self, img: &DynamicImage) -> Vec<f32> {
        let rgb = img
            .resize_exact(self.width, self.height, FilterType::Triangle)
            .to_rgb8();

        let plane = (self.width * self.height) as usize;
        let mut out = vec![0.0f32; 3 * plane];
        for (x, y, pixel) in rgb.enumerate_pixels() {
            let offset = (y * self.width + x) as usize;
            for c in 0..3 {
                let value = pixel[c] as f32 / 255.0;
                out[c * plane + offset] = (value - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_output_is_chw_and_normalised() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 0, 0])));
        let t = ImageTransform::new(2, 2);
        let out = t.apply(&img);

        assert_eq!(out.len(), t.pixel_count());
        let red   = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let green = (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
        // plane 0 is red, plane 1 is green
        assert!((out[0] - red).abs() < 1e-5);
        assert!((out[3] - red).abs() < 1e-5);
        assert!((out[4] - green).abs() < 1e-5);
    }

    #[test]
    fn test_load_reads_png_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.png");
        RgbImage::from_pixel(8, 6, Rgb([10, 20, 30])).save(&path).unwrap();

        let out = ImageTransform::new(4, 4).load(&path).unwrap();
        assert_eq!(out.len(), 48);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let t = ImageTransform::new(4, 4);
        assert!(t.load(Path::new("/definitely/not/here.png")).is_err());
    }
}
