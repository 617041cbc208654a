// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `caption`
// and all their configurable flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;
use crate::infra::pretrained::{DEFAULT_PRETRAINED_FILE, DEFAULT_PRETRAINED_REPO};
use crate::ml::inferencer::SearchOverrides;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the captioning model on a manifest of captioned images
    Train(TrainArgs),

    /// Caption an image using a trained checkpoint
    Caption(CaptionArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Root directory of the image dataset
    #[arg(long, default_value = "data")]
    pub dataset_dir: String,

    /// JSON manifest inside the dataset directory
    #[arg(long, default_value = "captions.json")]
    pub manifest: String,

    /// Directory to save checkpoints, vocabulary and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Input height; must be a multiple of 32
    #[arg(long, default_value_t = 224)]
    pub image_height: usize,

    /// Input width; must be a multiple of 32
    #[arg(long, default_value_t = 224)]
    pub image_width: usize,

    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Size of the word embedding vectors
    #[arg(long, default_value_t = 256)]
    pub embedding_dim: usize,

    /// Hidden size of every LSTM layer
    #[arg(long, default_value_t = 256)]
    pub rnn_size: usize,

    /// Number of stacked LSTM layers in the decoder
    #[arg(long, default_value_t = 2)]
    pub num_layers: usize,

    /// Channels of the first VGG block (64 for pretrained weights)
    #[arg(long, default_value_t = 64)]
    pub backbone_width: usize,

    /// Upper bound on the global gradient norm
    #[arg(long, default_value_t = 5.0)]
    pub grad_clip: f64,

    /// Probability of feeding the ground-truth token at each step
    #[arg(long, default_value_t = 0.8)]
    pub teacher_forcing_ratio: f64,

    /// Leading backbone convolutions excluded from training
    #[arg(long, default_value_t = 7)]
    pub frozen_convs: usize,

    /// Words seen fewer times map to <unk>
    #[arg(long, default_value_t = 1)]
    pub min_word_count: usize,

    /// Vocabulary cap, special tokens included
    #[arg(long, default_value_t = 10_000)]
    pub max_vocab_size: usize,

    /// Captions are truncated to this many tokens, <start> and <end> included
    #[arg(long, default_value_t = 40)]
    pub max_caption_len: usize,

    /// Share of samples used for training; the rest validates
    #[arg(long, default_value_t = 0.9)]
    pub train_fraction: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// DataLoader worker threads
    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,

    /// Default beam width stored for inference
    #[arg(long, default_value_t = 5)]
    pub beam_width: usize,

    /// Hugging Face repo holding VGG16 weights
    #[arg(long, default_value = DEFAULT_PRETRAINED_REPO)]
    pub pretrained_repo: String,

    #[arg(long, default_value = DEFAULT_PRETRAINED_FILE)]
    pub pretrained_file: String,

    /// Local PyTorch weights file; skips the Hub download
    #[arg(long)]
    pub pretrained_path: Option<String>,

    /// Start the backbone from random weights
    #[arg(long)]
    pub no_pretrained: bool,
}

/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            dataset_dir:           a.dataset_dir,
            manifest:              a.manifest,
            checkpoint_dir:        a.checkpoint_dir,
            image_height:          a.image_height,
            image_width:           a.image_width,
            batch_size:            a.batch_size,
            epochs:                a.epochs,
            lr:                    a.lr,
            embedding_dim:         a.embedding_dim,
            rnn_size:              a.rnn_size,
            num_layers:            a.num_layers,
            backbone_width:        a.backbone_width,
            grad_clip:             a.grad_clip,
            teacher_forcing_ratio: a.teacher_forcing_ratio,
            frozen_convs:          a.frozen_convs,
            min_word_count:        a.min_word_count,
            max_vocab_size:        a.max_vocab_size,
            max_caption_len:       a.max_caption_len,
            train_fraction:        a.train_fraction,
            seed:                  a.seed,
            num_workers:           a.num_workers,
            beam_width:            a.beam_width,
            use_pretrained:        !a.no_pretrained,
            pretrained_repo:       a.pretrained_repo,
            pretrained_file:       a.pretrained_file,
            pretrained_path:       a.pretrained_path,
            vocab_size:            0,
            longest_caption:       0,
        }
    }
}

/// All arguments for the `caption` command
#[derive(Args, Debug)]
pub struct CaptionArgs {
    /// Image file to describe
    #[arg(long)]
    pub image: String,

    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Override the beam width stored with the checkpoint
    #[arg(long)]
    pub beam_width: Option<usize>,

    /// Override the maximum number of decoding steps
    #[arg(long)]
    pub max_steps: Option<usize>,
}

impl CaptionArgs {
    pub fn overrides(&self) -> SearchOverrides {
        SearchOverrides { beam_width: self.beam_width, max_steps: self.max_steps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_defaults_match_config_defaults() {
        let cli = Cli::try_parse_from(["image-captioner", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg = TrainConfig::from(args);
        let default = TrainConfig::default();

        assert_eq!(cfg.image_height, default.image_height);
        assert_eq!(cfg.batch_size, default.batch_size);
        assert_eq!(cfg.frozen_convs, default.frozen_convs);
        assert_eq!(cfg.pretrained_repo, default.pretrained_repo);
        assert!(cfg.use_pretrained);
    }

    #[test]
    fn test_no_pretrained_flag() {
        let cli = Cli::try_parse_from(["image-captioner", "train", "--no-pretrained", "--epochs", "3"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg = TrainConfig::from(args);
        assert!(!cfg.use_pretrained);
        assert_eq!(cfg.epochs, 3);
    }

    #[test]
    fn test_caption_overrides() {
        let cli = Cli::try_parse_from(["image-captioner", "caption", "--image", "a.jpg", "--beam-width", "3"]).unwrap();
        let Commands::Caption(args) = cli.command else { panic!("expected caption") };
        let overrides = args.overrides();
        assert_eq!(overrides.beam_width, Some(3));
        assert_eq!(overrides.max_steps, None);
    }
}
