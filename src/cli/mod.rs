// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap and delegates everything else to Layer 2.
//
//   1. `train`   trains the captioner on a dataset manifest
//   2. `caption` loads a checkpoint and describes an image
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use commands::{CaptionArgs, Commands, TrainArgs};

use crate::domain::traits::ImageCaptioner;

#[derive(Parser, Debug)]
#[command(
    name = "image-captioner",
    version = "0.1.0",
    about = "Train a VGG16 + attention LSTM image captioner, then caption images."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Caption(args) => run_caption(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on dataset in: {}", args.dataset_dir);
    let checkpoint_dir = args.checkpoint_dir.clone();

    TrainUseCase::new(args.into()).execute()?;

    println!("Training complete. Checkpoints saved to '{}'.", checkpoint_dir);
    Ok(())
}

fn run_caption(args: CaptionArgs) -> Result<()> {
    use crate::application::caption_use_case::CaptionUseCase;

    let use_case = CaptionUseCase::new(&args.checkpoint_dir, args.overrides())?;
    let caption = use_case.caption(Path::new(&args.image))?;
    println!("{}", caption);
    Ok(())
}
