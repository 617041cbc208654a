// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Rebuilds the network from train_config.json, loads the latest
// checkpoint and captions one image at a time with beam search.
// Runs on InnerBackend: no gradients are tracked.

use std::path::Path;

use anyhow::Result;
use burn::{prelude::*, tensor::TensorData};

use crate::data::image::ImageTransform;
use crate::domain::vocabulary::Vocabulary;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    beam::{BeamSearchConfig, Hypothesis},
    model::{CaptionModel, CaptionModelConfig},
    InnerBackend,
};

/// Optional overrides of the search settings stored with the checkpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOverrides {
    pub beam_width: Option<usize>,
    pub max_steps:  Option<usize>,
}

pub struct Inferencer {
    model:     CaptionModel<InnerBackend>,
    transform: ImageTransform,
    search:    BeamSearchConfig,
    device:    <InnerBackend as Backend>::Device,
}

impl Inferencer {
    pub fn from_checkpoint(
        ckpt_manager: &CheckpointManager,
        vocab:        &Vocabulary,
        overrides:    SearchOverrides,
    ) -> Result<Self> {
        let device = <InnerBackend as Backend>::Device::default();
        let cfg    = ckpt_manager.load_config()?;
        anyhow::ensure!(
            cfg.vocab_size == vocab.len(),
            "Checkpoint was trained with {} vocabulary entries but tokenizer.json has {}",
            cfg.vocab_size,
            vocab.len()
        );

        let model: CaptionModel<InnerBackend> = CaptionModelConfig::from(&cfg).init(&device);
        let model = ckpt_manager.load_model(model, &device)?;
        tracing::info!("Model loaded from checkpoint");

        let search = BeamSearchConfig {
            beam_width:  overrides.beam_width.unwrap_or(cfg.beam_width).max(1),
            start_token: vocab.start_id(),
            end_token:   vocab.end_id(),
            max_steps:   overrides.max_steps.unwrap_or_else(|| cfg.max_decode_steps()),
        };
        tracing::debug!("Beam search settings: {:?}", search);

        Ok(Self {
            model,
            transform: ImageTransform::new(cfg.image_height, cfg.image_width),
            search,
            device,
        })
    }

    /// Best hypothesis for the image at `path`.
    pub fn predict(&self, path: &Path) -> Result<Hypothesis> {
        let pixels = self.transform.load(path)?;
        let (h, w) = (self.transform.height as usize, self.transform.width as usize);
        let image = Tensor::<InnerBackend, 4>::from_data(TensorData::new(pixels, [1, 3, h, w]), &self.device);

        let best = self.model.beam_search(image, &self.search)?;
        tracing::debug!(
            "'{}': {} tokens, log_prob={:.4}, finished={}",
            path.display(),
            best.tokens.len(),
            best.log_prob,
            best.finished
        );
        Ok(best)
    }
}
