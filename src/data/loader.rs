// ============================================================
// Layer 4 — Caption Manifest Loader
// ============================================================
// Reads a JSON manifest describing a captioned image dataset:
//
//   [
//     { "image": "images/1000268201.jpg",
//       "captions": ["A child in a pink dress ...", "A girl going ..."] },
//     ...
//   ]
//
// Relative image paths are resolved against the dataset root.
// Each (image, caption) pair becomes one CaptionRecord. Entries
// whose image is missing, or whose caption is blank, are skipped
// with a warning so one bad row never aborts a long run.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::{caption::CaptionRecord, traits::CaptionSource};

/// One manifest row
#[derive(Debug, Deserialize)]
struct ManifestEntry {
    image: PathBuf,
    #[serde(default)]
    captions: Vec<String>,
}

pub struct ManifestLoader {
    root:     PathBuf,
    manifest: String,
}

impl ManifestLoader {
    pub fn new(root: impl Into<PathBuf>, manifest: impl Into<String>) -> Self {
        Self { root: root.into(), manifest: manifest.into() }
    }

    fn resolve(&self, image: &Path) -> PathBuf {
        if image.is_absolute() {
            image.to_path_buf()
        } else {
            self.root.join(image)
        }
    }
}

impl CaptionSource for ManifestLoader {
    fn load_all(&self) -> Result<Vec<CaptionRecord>> {
        let path = self.root.join(&self.manifest);

        if !path.exists() {
            tracing::warn!("Manifest '{}' does not exist, returning no captions", path.display());
            return Ok(Vec::new());
        }

        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read manifest '{}'", path.display()))?;
        let entries: Vec<ManifestEntry> = serde_json::from_str(&json)
            .with_context(|| format!("Manifest '{}' is not a valid caption list", path.display()))?;

        let mut records = Vec::new();
        let mut skipped = 0usize;

        for entry in entries {
            let image = self.resolve(&entry.image);
            if !image.is_file() {
                tracing::warn!("Skipping '{}': image not found", image.display());
                skipped += entry.captions.len().max(1);
                continue;
            }

            for caption in entry.captions {
                let record = CaptionRecord::new(image.clone(), caption);
                match record.validate() {
                    Ok(()) => records.push(record),
                    Err(e) => {
                        tracing::warn!("Skipping caption: {e}");
                        skipped += 1;
                    }
                }
            }
        }

        tracing::info!(
            "Loaded {} captions from '{}' ({} skipped)",
            records.len(),
            path.display(),
            skipped
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_and_expands_captions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.png"), b"not decoded here").unwrap();
        fs::write(
            dir.path().join("captions.json"),
            r#"[
                {"image": "a.png", "captions": ["A cat.", "A sleepy cat"]},
                {"image": "missing.png", "captions": ["Never loaded"]},
                {"image": "a.png", "captions": ["   "]}
            ]"#,
        )
        .unwrap();

        let loader = ManifestLoader::new(dir.path(), "captions.json");
        let records = loader.load_all().unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].image, dir.path().join("a.png"));
        assert_eq!(records[1].caption, "A sleepy cat");
    }

    #[test]
    fn test_missing_manifest_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ManifestLoader::new(dir.path(), "captions.json");
        assert!(loader.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_manifest_is_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("captions.json"), "{ not a list").unwrap();
        let loader = ManifestLoader::new(dir.path(), "captions.json");
        assert!(loader.load_all().is_err());
    }
}
