use std::path::PathBuf;

use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::data::image::ImageTransform;

/// One encoded training pair: an image path and its caption as
/// `<start> w1 .. wn <end>` vocabulary indices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionSample {
    /// Resolved path of the image; decoded only when the sample is fetched
    pub image: PathBuf,

    /// Caption ids including <start> and <end>, unpadded
    pub token_ids: Vec<u32>,
}

/// What the DataLoader hands to the batcher: decoded pixels plus tokens.
#[derive(Debug, Clone)]
pub struct CaptionItem {
    /// Normalised CHW pixels, 3 * height * width values
    pub pixels: Vec<f32>,

    /// Same ids as the source CaptionSample
    pub token_ids: Vec<u32>,
}

/// Images are decoded lazily in `get`, so only the current batch
/// lives in memory.
pub struct CaptionDataset {
    samples:   Vec<CaptionSample>,
    transform: ImageTransform,
}

impl CaptionDataset {
    pub fn new(samples: Vec<CaptionSample>, transform: ImageTransform) -> Self {
        Self { samples, transform }
    }

    /// Number of (image, caption) pairs
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Longest caption in tokens, including <start> and <end>
    pub fn longest_caption(&self) -> usize {
        self.samples.iter().map(|s| s.token_ids.len()).max().unwrap_or(0)
    }
}

impl Dataset<CaptionItem> for CaptionDataset {
    fn get(&self, index: usize) -> Option<CaptionItem> {
        let sample = self.samples.get(index)?;
        let pixels = match self.transform.load(&sample.image) {
            Ok(pixels) => pixels,
            Err(e) => {
                tracing::warn!("{e:#}; substituting a blank image");
                vec![0.0; self.transform.pixel_count()]
            }
        };
        Some(CaptionItem { pixels, token_ids: sample.token_ids.clone() })
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_get_decodes_image_and_keeps_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.png");
        RgbImage::from_pixel(5, 5, Rgb([1, 2, 3])).save(&path).unwrap();

        let ds = CaptionDataset::new(
            vec![CaptionSample { image: path, token_ids: vec![2, 7, 8, 3] }],
            ImageTransform::new(4, 4),
        );
        let item = ds.get(0).unwrap();
        assert_eq!(item.pixels.len(), 48);
        assert_eq!(item.token_ids, vec![2, 7, 8, 3]);
        assert!(ds.get(1).is_none());
        assert_eq!(ds.longest_caption(), 4);
    }

    #[test]
    fn test_unreadable_image_becomes_blank() {
        let ds = CaptionDataset::new(
            vec![CaptionSample { image: PathBuf::from("/nope.png"), token_ids: vec![2, 3] }],
            ImageTransform::new(2, 2),
        );
        let item = ds.get(0).unwrap();
        assert_eq!(item.pixels, vec![0.0; 12]);
        assert_eq!(ds.get(0).map(|i| i.token_ids.len()), Some(2));
    }
}
