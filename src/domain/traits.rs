// ============================================================
// Layer 3 — Core Traits
// ============================================================
// The application layer talks to these abstractions rather
// than to concrete loaders or models:
//   - ManifestLoader implements CaptionSource
//   - CaptionUseCase implements ImageCaptioner

use std::path::Path;

use anyhow::Result;

use crate::domain::caption::CaptionRecord;

// ─── CaptionSource ────────────────────────────────────────────────────────────
/// Anything that can produce captioned images for training.
pub trait CaptionSource {
    /// Load every usable (image, caption) pair.
    fn load_all(&self) -> Result<Vec<CaptionRecord>>;
}

// ─── ImageCaptioner ───────────────────────────────────────────────────────────
/// Anything that can describe an image in words.
pub trait ImageCaptioner {
    /// Return the caption for the image stored at `image`.
    fn caption(&self, image: &Path) -> Result<String>;
}
