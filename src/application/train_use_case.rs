// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load the caption manifest   (Layer 4 - data)
//   Step 2: Clean the captions          (Layer 4 - data)
//   Step 3: Build / load vocabulary     (Layer 6 - infra)
//   Step 4: Encode captions             (Layer 6 - infra)
//   Step 5: Split train/validation      (Layer 4 - data)
//   Step 6: Build datasets              (Layer 4 - data)
//   Step 7: Save config                 (Layer 6 - infra)
//   Step 8: Run training loop           (Layer 5 - ml)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::{CaptionDataset, CaptionSample},
    image::ImageTransform,
    loader::ManifestLoader,
    preprocessor::Preprocessor,
    splitter::split_train_val,
};
use crate::domain::{error::CaptionError, traits::CaptionSource};
use crate::infra::{
    checkpoint::CheckpointManager,
    pretrained::{PretrainedSource, DEFAULT_PRETRAINED_FILE, DEFAULT_PRETRAINED_REPO},
    vocab_store::{encode_caption, vocabulary_of, VocabStore},
};
use crate::ml::{
    encoder::{BACKBONE_STRIDE, VGG16_CONVS},
    trainer::run_training,
};

/// Channel width of the ImageNet VGG16 checkpoints.
const PRETRAINED_WIDTH: usize = 64;

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run. Saved next to the
// checkpoints so inference can rebuild the exact architecture.
// `vocab_size` and `longest_caption` are filled in during data
// preparation, not by the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Root of the image dataset; relative image paths resolve here
    pub dataset_dir: String,

    /// JSON manifest inside `dataset_dir`
    pub manifest: String,

    /// Checkpoints, tokenizer.json and metrics.csv are written here
    pub checkpoint_dir: String,

    /// Input size fed to the backbone. Both must be multiples of 32,
    /// giving (height / 32) * (width / 32) attention slots
    pub image_height: usize,
    pub image_width:  usize,

    pub batch_size: usize,
    pub epochs:     usize,

    /// Adam learning rate
    pub lr: f64,

    /// Word embedding width
    pub embedding_dim: usize,

    /// Hidden size of every LSTM layer and of the attention output
    pub rnn_size: usize,

    /// Number of stacked LSTM layers
    pub num_layers: usize,

    /// Channels of the first VGG block; 64 matches ImageNet weights
    pub backbone_width: usize,

    /// Upper bound on the global gradient norm
    pub grad_clip: f64,

    /// Probability of feeding the ground-truth token at each step.
    /// 1.0 is pure teacher forcing
    pub teacher_forcing_ratio: f64,

    /// Leading backbone convolutions that receive no gradient
    pub frozen_convs: usize,

    /// Words seen fewer times than this map to <unk>
    pub min_word_count: usize,

    /// Vocabulary cap, the four reserved tokens included
    pub max_vocab_size: usize,

    /// Captions are truncated to this many ids, <start> and <end> included
    pub max_caption_len: usize,

    /// Share of samples used for training; the rest validates
    pub train_fraction: f64,

    /// Seeds the split, the DataLoader shuffle and the backend RNG
    pub seed: u64,

    /// DataLoader worker threads
    pub num_workers: usize,

    /// Default beam width used by `caption`
    pub beam_width: usize,

    /// Load ImageNet VGG16 weights before training
    pub use_pretrained: bool,

    /// Hugging Face repo and file holding the weights
    pub pretrained_repo: String,
    pub pretrained_file: String,

    /// Local PyTorch file; takes precedence over the Hub
    pub pretrained_path: Option<String>,

    /// Size of the output projection, recorded from the vocabulary
    #[serde(default)]
    pub vocab_size: usize,

    /// Longest training caption in ids, recorded from the data
    #[serde(default)]
    pub longest_caption: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            dataset_dir:           "data".to_string(),
            manifest:              "captions.json".to_string(),
            checkpoint_dir:        "checkpoints".to_string(),
            image_height:          224,
            image_width:           224,
            batch_size:            16,
            epochs:                10,
            lr:                    1e-3,
            embedding_dim:         256,
            rnn_size:              256,
            num_layers:            2,
            backbone_width:        PRETRAINED_WIDTH,
            grad_clip:             5.0,
            teacher_forcing_ratio: 0.8,
            frozen_convs:          7,
            min_word_count:        1,
            max_vocab_size:        10_000,
            max_caption_len:       40,
            train_fraction:        0.9,
            seed:                  42,
            num_workers:           1,
            beam_width:            5,
            use_pretrained:        true,
            pretrained_repo:       DEFAULT_PRETRAINED_REPO.to_string(),
            pretrained_file:       DEFAULT_PRETRAINED_FILE.to_string(),
            pretrained_path:       None,
            vocab_size:            0,
            longest_caption:       0,
        }
    }
}

impl TrainConfig {
    /// Reject inconsistent hyperparameters before any work starts.
    pub fn validate(&self) -> Result<(), CaptionError> {
        let invalid = |msg: String| Err(CaptionError::InvalidConfig(msg));

        if self.image_height == 0
            || self.image_width == 0
            || self.image_height % BACKBONE_STRIDE != 0
            || self.image_width % BACKBONE_STRIDE != 0
        {
            return invalid(format!(
                "image size {}x{} must be a positive multiple of {BACKBONE_STRIDE}",
                self.image_height, self.image_width
            ));
        }
        if !(0.0..=1.0).contains(&self.teacher_forcing_ratio) {
            return invalid(format!("teacher_forcing_ratio {} is outside [0, 1]", self.teacher_forcing_ratio));
        }
        if !(0.0..=1.0).contains(&self.train_fraction) {
            return invalid(format!("train_fraction {} is outside [0, 1]", self.train_fraction));
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be at least 1".to_string());
        }
        if self.beam_width == 0 {
            return invalid("beam_width must be at least 1".to_string());
        }
        if self.num_layers == 0 || self.rnn_size == 0 || self.embedding_dim == 0 || self.backbone_width == 0 {
            return invalid("network dimensions must be non-zero".to_string());
        }
        if self.frozen_convs > VGG16_CONVS {
            return invalid(format!(
                "cannot freeze {} convolutions, the backbone has {VGG16_CONVS}",
                self.frozen_convs
            ));
        }
        if self.max_caption_len < 2 {
            return invalid("max_caption_len must leave room for <start> and <end>".to_string());
        }
        if self.use_pretrained && self.backbone_width != PRETRAINED_WIDTH {
            return invalid(format!(
                "pretrained weights need backbone_width {PRETRAINED_WIDTH}, got {}",
                self.backbone_width
            ));
        }
        Ok(())
    }

    /// Probability of feeding back a sampled token instead of the
    /// ground truth during training.
    pub fn sampling_probability(&self) -> f64 {
        1.0 - self.teacher_forcing_ratio
    }

    /// Where pretrained backbone weights come from, if enabled.
    pub fn pretrained_source(&self) -> Option<PretrainedSource> {
        if !self.use_pretrained {
            return None;
        }
        Some(match &self.pretrained_path {
            Some(path) => PretrainedSource::Local(PathBuf::from(path)),
            None => PretrainedSource::Hub {
                repo: self.pretrained_repo.clone(),
                file: self.pretrained_file.clone(),
            },
        })
    }

    /// Default beam search length bound: twice the longest training
    /// caption's decoding steps.
    pub fn max_decode_steps(&self) -> usize {
        (2 * self.longest_caption.saturating_sub(1)).max(1)
    }

    /// Fill in the sizes that come from the data rather than the user.
    /// The decoding bound follows the training split only.
    pub fn record_data_sizes(&mut self, vocab_size: usize, train: &CaptionDataset) {
        self.vocab_size      = vocab_size;
        self.longest_caption = train.longest_caption();
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<()> {
        self.config.validate()?;
        let mut cfg = self.config.clone();

        // ── Step 1: Load the manifest ─────────────────────────────────────────
        tracing::info!("Loading captions from '{}/{}'", cfg.dataset_dir, cfg.manifest);
        let loader  = ManifestLoader::new(&cfg.dataset_dir, cfg.manifest.as_str());
        let records = loader.load_all()?;
        anyhow::ensure!(
            !records.is_empty(),
            "No captioned images found in '{}/{}'",
            cfg.dataset_dir,
            cfg.manifest
        );
        tracing::info!("Loaded {} image-caption pairs", records.len());

        // ── Step 2: Clean captions ────────────────────────────────────────────
        let preprocessor = Preprocessor::new();
        let cleaned: Vec<(PathBuf, String)> = records
            .into_iter()
            .map(|r| {
                let text = preprocessor.clean(&r.caption);
                (r.image, text)
            })
            .collect();

        // ── Step 3: Build / load vocabulary ───────────────────────────────────
        let vocab_store = VocabStore::new(cfg.checkpoint_dir.as_str());
        let texts: Vec<String> = cleaned.iter().map(|(_, t)| t.clone()).collect();
        let tokenizer = vocab_store.load_or_build(&texts, cfg.min_word_count, cfg.max_vocab_size)?;
        let vocab = vocabulary_of(&tokenizer)?;
        tracing::info!("Vocabulary size: {}", vocab.len());

        // ── Step 4: Encode captions ───────────────────────────────────────────
        let mut samples = Vec::with_capacity(cleaned.len());
        for (image, text) in cleaned {
            let token_ids = encode_caption(&tokenizer, &vocab, &text, cfg.max_caption_len)?;
            samples.push(CaptionSample { image, token_ids });
        }
        let unknown = samples
            .iter()
            .flat_map(|s| &s.token_ids)
            .filter(|&&id| id == vocab.unk_id())
            .count();
        tracing::info!("Encoded {} captions, {} words map to <unk>", samples.len(), unknown);

        // ── Step 5: Train / validation split ──────────────────────────────────
        let (train_samples, val_samples) = split_train_val(samples, cfg.train_fraction, cfg.seed);

        // ── Step 6: Build Burn datasets ───────────────────────────────────────
        let transform     = ImageTransform::new(cfg.image_height, cfg.image_width);
        let train_dataset = CaptionDataset::new(train_samples, transform);
        let val_dataset   = CaptionDataset::new(val_samples, transform);
        tracing::info!(
            "Split: {} train, {} validation",
            train_dataset.sample_count(),
            val_dataset.sample_count()
        );

        // ── Step 7: Record data-derived sizes and save config ─────────────────
        cfg.record_data_sizes(vocab.len(), &train_dataset);
        let ckpt_manager = CheckpointManager::new(cfg.checkpoint_dir.as_str());
        ckpt_manager.save_config(&cfg)?;

        // ── Step 8: Run training loop (Layer 5) ───────────────────────────────
        run_training(&cfg, train_dataset, val_dataset, &ckpt_manager, vocab.pad_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline() -> TrainConfig {
        TrainConfig { use_pretrained: false, ..TrainConfig::default() }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(TrainConfig::default().validate().is_ok());
        assert!((TrainConfig::default().sampling_probability() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cases = [
            TrainConfig { image_height: 100, ..offline() },
            TrainConfig { teacher_forcing_ratio: 1.5, ..offline() },
            TrainConfig { batch_size: 0, ..offline() },
            TrainConfig { beam_width: 0, ..offline() },
            TrainConfig { frozen_convs: 14, ..offline() },
            TrainConfig { backbone_width: 8, use_pretrained: true, ..offline() },
        ];
        for cfg in cases {
            assert!(matches!(cfg.validate(), Err(CaptionError::InvalidConfig(_))));
        }
        assert!(TrainConfig { backbone_width: 8, ..offline() }.validate().is_ok());
    }

    #[test]
    fn test_pretrained_source_selection() {
        assert_eq!(offline().pretrained_source(), None);

        let hub = TrainConfig::default().pretrained_source();
        assert_eq!(
            hub,
            Some(PretrainedSource::Hub {
                repo: DEFAULT_PRETRAINED_REPO.to_string(),
                file: DEFAULT_PRETRAINED_FILE.to_string(),
            })
        );

        let local = TrainConfig { pretrained_path: Some("vgg.pth".into()), ..TrainConfig::default() };
        assert_eq!(local.pretrained_source(), Some(PretrainedSource::Local(PathBuf::from("vgg.pth"))));
    }

    #[test]
    fn test_max_decode_steps() {
        let cfg = TrainConfig { longest_caption: 12, ..TrainConfig::default() };
        assert_eq!(cfg.max_decode_steps(), 22);
    }

    #[test]
    fn test_decode_bound_ignores_validation_captions() {
        let transform = ImageTransform::new(32, 32);
        let sample = |len: usize| CaptionSample { image: PathBuf::from("x.png"), token_ids: vec![4; len] };
        let train = CaptionDataset::new(vec![sample(5), sample(7)], transform);
        let val = CaptionDataset::new(vec![sample(12)], transform);

        let mut cfg = TrainConfig::default();
        cfg.record_data_sizes(30, &train);

        assert_eq!(cfg.vocab_size, 30);
        assert_eq!(cfg.longest_caption, 7);
        assert!(val.longest_caption() > cfg.longest_caption);
        assert_eq!(cfg.max_decode_steps(), 12);
    }

    #[test]
    fn test_empty_dataset_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig {
            dataset_dir: dir.path().to_string_lossy().into_owned(),
            checkpoint_dir: dir.path().join("ckpt").to_string_lossy().into_owned(),
            ..offline()
        };
        let err = TrainUseCase::new(cfg).execute().unwrap_err();
        assert!(err.to_string().contains("No captioned images"));
    }
}
