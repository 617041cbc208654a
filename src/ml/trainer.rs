// ============================================================
// Layer 5 — Training Loop
// ============================================================
// CaptionTrainer owns the model and the Adam state and exposes
// the single-batch entry point:
//
//   partial_fit(batch) -> loss
//     forward with scheduled sampling
//     masked sequence loss
//     backward
//     clip global gradient norm
//     Adam step
//
// run_training drives it over epochs, validating on the inner
// backend with pure teacher forcing after every epoch.
//
//   - Training uses TrainBackend (Autodiff<InnerBackend>)
//   - model.valid() returns the model on InnerBackend
//   - Validation batcher must therefore use InnerBackend

use anyhow::Result;
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{CaptionBatch, CaptionBatcher},
    dataset::CaptionDataset,
};
use crate::domain::error::CaptionError;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
    pretrained::load_backbone,
};
use crate::ml::{
    grad_clip::clip_by_global_norm,
    model::{token_accuracy, CaptionModel, CaptionModelConfig},
    InnerBackend, TrainBackend,
};

impl From<&TrainConfig> for CaptionModelConfig {
    fn from(cfg: &TrainConfig) -> Self {
        CaptionModelConfig::new(cfg.vocab_size, cfg.image_height, cfg.image_width)
            .with_embedding_dim(cfg.embedding_dim)
            .with_rnn_size(cfg.rnn_size)
            .with_num_layers(cfg.num_layers)
            .with_backbone_width(cfg.backbone_width)
    }
}

/// Hyperparameters applied on every optimisation step.
#[derive(Debug, Clone, Copy)]
pub struct StepSettings {
    /// Adam learning rate
    pub lr: f64,

    /// Gradients are rescaled when their global norm exceeds this
    pub grad_clip: f64,

    /// Chance of replacing a ground-truth input with a sampled token
    pub sampling_probability: f64,
}

impl From<&TrainConfig> for StepSettings {
    fn from(cfg: &TrainConfig) -> Self {
        Self {
            lr:                   cfg.lr,
            grad_clip:            cfg.grad_clip,
            sampling_probability: cfg.sampling_probability(),
        }
    }
}

pub struct CaptionTrainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<CaptionModel<B>, B>,
{
    model:          CaptionModel<B>,
    optim:          O,
    settings:       StepSettings,
    last_grad_norm: f64,
}

impl<B, O> CaptionTrainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<CaptionModel<B>, B>,
{
    pub fn new(model: CaptionModel<B>, optim: O, settings: StepSettings) -> Self {
        Self { model, optim, settings, last_grad_norm: 0.0 }
    }

    /// One optimisation step on `batch`. Returns the loss before the update.
    pub fn partial_fit(&mut self, batch: CaptionBatch<B>) -> Result<f64> {
        if let Some(&len) = batch.lengths.iter().find(|&&len| len < 2) {
            return Err(CaptionError::CaptionTooShort { len }.into());
        }

        let (loss, _) = self.model.forward_loss(
            batch.images,
            batch.captions,
            &batch.lengths,
            self.settings.sampling_probability,
        );
        let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();

        let grads = GradientsParams::from_grads(loss.backward(), &self.model);
        let (grads, norm) = clip_by_global_norm::<B, _>(&self.model, grads, self.settings.grad_clip);
        self.last_grad_norm = norm;
        tracing::trace!("loss={:.4} grad_norm={:.4}", loss_val, norm);

        self.model = self.optim.step(self.settings.lr, self.model.clone(), grads);
        Ok(loss_val)
    }

    pub fn model(&self) -> &CaptionModel<B> {
        &self.model
    }

    /// Global gradient norm of the last step, before clipping
    pub fn last_grad_norm(&self) -> f64 {
        self.last_grad_norm
    }

    #[cfg(test)]
    pub fn into_model(self) -> CaptionModel<B> {
        self.model
    }
}

/// Initialise the network for `cfg`, loading pretrained backbone
/// weights when configured, then freeze the leading convolutions.
pub fn build_model<B: Backend>(cfg: &TrainConfig, device: &B::Device) -> Result<CaptionModel<B>> {
    let mut model: CaptionModel<B> = CaptionModelConfig::from(cfg).init(device);

    if let Some(source) = cfg.pretrained_source() {
        let path = source.resolve()?;
        model.encoder.backbone = load_backbone(model.encoder.backbone, &path, device)?;
    } else {
        tracing::warn!("Pretrained weights disabled, backbone starts from random init");
    }

    Ok(model.freeze_backbone(cfg.frozen_convs))
}

/// Mean masked loss and token accuracy over a loader.
pub fn evaluate<B: Backend>(
    model:  &CaptionModel<B>,
    loader: &dyn DataLoader<CaptionBatch<B>>,
) -> (f64, f64) {
    let mut loss_sum = 0.0f64;
    let mut batches  = 0usize;
    let mut hits     = 0.0f64;
    let mut counted  = 0.0f64;

    for batch in loader.iter() {
        if batch.lengths.iter().any(|&len| len < 2) {
            continue;
        }
        let (loss, output) = model.forward_loss(batch.images, batch.captions, &batch.lengths, 0.0);
        loss_sum += loss.into_scalar().elem::<f64>();
        batches  += 1;

        let (h, c) = token_accuracy(&output);
        hits    += h;
        counted += c;
    }

    let avg_loss = if batches > 0 { loss_sum / batches as f64 } else { f64::NAN };
    let accuracy = if counted > 0.0 { hits / counted } else { 0.0 };
    (avg_loss, accuracy)
}

pub fn run_training(
    cfg:           &TrainConfig,
    train_dataset: CaptionDataset,
    val_dataset:   CaptionDataset,
    ckpt_manager:  &CheckpointManager,
    pad_id:        u32,
) -> Result<()> {
    let device = <TrainBackend as Backend>::Device::default();
    tracing::info!("Using device: {:?}", device);
    TrainBackend::seed(cfg.seed);

    // ── Build model ───────────────────────────────────────────────────────────
    let model: CaptionModel<TrainBackend> = build_model(cfg, &device)?;
    tracing::info!(
        "Model ready: vocab={}, rnn_size={}, layers={}, frozen convs={}",
        cfg.vocab_size, cfg.rnn_size, cfg.num_layers, cfg.frozen_convs
    );

    // ── Adam optimiser ────────────────────────────────────────────────────────
    let optim = AdamConfig::new().with_epsilon(1e-8).init();
    let mut trainer = CaptionTrainer::new(model, optim, StepSettings::from(cfg));

    // ── Data loaders ──────────────────────────────────────────────────────────
    let train_loader = DataLoaderBuilder::new(CaptionBatcher::<TrainBackend>::new(
        device.clone(), pad_id, cfg.image_height, cfg.image_width,
    ))
    .batch_size(cfg.batch_size)
    .shuffle(cfg.seed)
    .num_workers(cfg.num_workers)
    .build(train_dataset);

    let val_loader = DataLoaderBuilder::new(CaptionBatcher::<InnerBackend>::new(
        device.clone(), pad_id, cfg.image_height, cfg.image_width,
    ))
    .batch_size(cfg.batch_size)
    .num_workers(cfg.num_workers)
    .build(val_dataset);

    let metrics = MetricsLogger::new(ckpt_manager.dir().to_string_lossy())?;
    let mut best_val_loss = f64::INFINITY;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {
        let mut loss_sum = 0.0f64;
        let mut norm_sum = 0.0f64;
        let mut batches  = 0usize;

        for batch in train_loader.iter() {
            loss_sum += trainer.partial_fit(batch)?;
            norm_sum += trainer.last_grad_norm();
            batches  += 1;
        }

        let train_loss = if batches > 0 { loss_sum / batches as f64 } else { f64::NAN };
        let grad_norm  = if batches > 0 { norm_sum / batches as f64 } else { 0.0 };

        let (val_loss, val_token_acc) = evaluate(&trainer.model().valid(), &*val_loader);

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | token_acc={:.1}% | grad_norm={:.2}",
            epoch, cfg.epochs, train_loss, val_loss, val_token_acc * 100.0, grad_norm,
        );

        let row = EpochMetrics { epoch, train_loss, val_loss, val_token_acc, grad_norm };
        if row.is_improvement(best_val_loss) {
            best_val_loss = row.val_loss;
            tracing::info!("New best validation loss {:.4} at epoch {}", best_val_loss, epoch);
        }
        metrics.log(&row)?;

        ckpt_manager.save_model(trainer.model(), epoch)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch);
    }

    tracing::info!("Training complete! Metrics written to '{}'", metrics.csv_path().display());
    Ok(())
}
