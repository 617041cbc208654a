// ============================================================
// Layer 6 — Pretrained Backbone Weights
// ============================================================
// Fetches ImageNet VGG16 weights and loads them into the
// encoder's convolution list.
//
// Source, in order of preference:
//   1. a local PyTorch file (--pretrained-path)
//   2. the Hugging Face Hub (default timm/vgg16.tv_in1k,
//      pytorch_model.bin), cached under ~/.cache/huggingface
//
// torchvision names the convolutions by their position in the
// `features` Sequential, where ReLUs and pools also take slots:
//
//   features.0  features.2  | pool 4 |  features.5  features.7 | ...
//
// Those indices are remapped onto `convs.{n}` so Burn's
// PyTorchFileRecorder can fill VggBackboneRecord directly.
// Classifier keys are ignored.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, Recorder},
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};

use crate::ml::encoder::{VggBackbone, VggBackboneRecord, VGG16_BLOCKS};

pub const DEFAULT_PRETRAINED_REPO: &str = "timm/vgg16.tv_in1k";
pub const DEFAULT_PRETRAINED_FILE: &str = "pytorch_model.bin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PretrainedSource {
    Hub { repo: String, file: String },
    Local(PathBuf),
}

impl PretrainedSource {
    /// Local path of the weights, downloading them first if needed.
    pub fn resolve(&self) -> Result<PathBuf> {
        match self {
            PretrainedSource::Local(path) => {
                anyhow::ensure!(path.is_file(), "Pretrained weights '{}' not found", path.display());
                Ok(path.clone())
            }
            PretrainedSource::Hub { repo, file } => {
                tracing::info!("Fetching '{}' from Hugging Face repo '{}'", file, repo);
                let api = hf_hub::api::sync::Api::new()
                    .context("Cannot initialise the Hugging Face Hub client")?;
                api.model(repo.clone())
                    .get(file)
                    .with_context(|| format!("Cannot download '{file}' from '{repo}'"))
            }
        }
    }
}

/// Position of every convolution in torchvision's `features` list.
pub fn torchvision_conv_indices() -> Vec<usize> {
    let mut indices = Vec::new();
    let mut slot = 0;
    for &count in VGG16_BLOCKS.iter() {
        for _ in 0..count {
            indices.push(slot);
            // conv + relu
            slot += 2;
        }
        // max pool
        slot += 1;
    }
    indices
}

/// Regex remaps from torchvision key names to backbone record names.
pub fn key_remaps() -> Vec<(String, String)> {
    torchvision_conv_indices()
        .into_iter()
        .enumerate()
        .map(|(conv, slot)| (format!(r"^features\.{slot}\.(weight|bias)$"), format!("convs.{conv}.$1")))
        .collect()
}

/// Replace the backbone's convolution weights with those in `path`.
pub fn load_backbone<B: Backend>(
    backbone: VggBackbone<B>,
    path:     &Path,
    device:   &B::Device,
) -> Result<VggBackbone<B>> {
    let args = key_remaps()
        .iter()
        .fold(LoadArgs::new(path.to_path_buf()), |args, (from, to)| args.with_key_remap(from, to));

    let record: VggBackboneRecord<B> = PyTorchFileRecorder::<FullPrecisionSettings>::default()
        .load(args, device)
        .with_context(|| format!("Cannot read VGG16 weights from '{}'", path.display()))?;

    tracing::info!("Loaded pretrained VGG16 backbone from '{}'", path.display());
    Ok(backbone.load_record(record))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_torchvision_indices() {
        assert_eq!(
            torchvision_conv_indices(),
            vec![0, 2, 5, 7, 10, 12, 14, 17, 19, 21, 24, 26, 28]
        );
    }

    #[test]
    fn test_key_remaps_cover_every_conv() {
        let remaps = key_remaps();
        assert_eq!(remaps.len(), 13);
        assert_eq!(remaps[2].0, r"^features\.5\.(weight|bias)$");
        assert_eq!(remaps[2].1, "convs.2.$1");
    }

    #[test]
    fn test_missing_local_file_is_error() {
        let source = PretrainedSource::Local(PathBuf::from("/no/such/vgg16.pth"));
        assert!(source.resolve().is_err());
    }
}
