// ============================================================
// Layer 3 — Caption Record
// ============================================================
// One (image, caption) pair as read from a dataset manifest.
// An image with five reference captions becomes five records.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::error::CaptionError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionRecord {
    /// Path of the image on disk
    pub image: PathBuf,

    /// Raw caption text, before cleaning
    pub caption: String,
}

impl CaptionRecord {
    pub fn new(image: impl Into<PathBuf>, caption: impl Into<String>) -> Self {
        Self { image: image.into(), caption: caption.into() }
    }

    /// Reject records that cannot produce a training sample.
    pub fn validate(&self) -> Result<(), CaptionError> {
        if self.image.as_os_str().is_empty() {
            return Err(CaptionError::MissingImage);
        }
        if self.caption.trim().is_empty() {
            return Err(CaptionError::EmptyCaption { image: self.image.clone() });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_record() {
        let r = CaptionRecord::new("img/1.jpg", "A dog runs on the beach");
        assert!(r.validate().is_ok());
    }

    #[test]
    fn test_blank_caption_rejected() {
        let r = CaptionRecord::new("img/1.jpg", "   ");
        assert_eq!(
            r.validate(),
            Err(CaptionError::EmptyCaption { image: PathBuf::from("img/1.jpg") })
        );
    }

    #[test]
    fn test_missing_image_rejected() {
        let r = CaptionRecord::new("", "a cat");
        assert_eq!(r.validate(), Err(CaptionError::MissingImage));
    }
}
