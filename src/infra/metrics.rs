// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per epoch to <checkpoint_dir>/metrics.csv:
//
//   epoch,train_loss,val_loss,val_token_acc,grad_norm
//   1,5.812300,5.401200,0.121000,7.330000
//
// train_loss and val_loss are the masked sequence cross entropy;
// val_token_acc is the share of valid caption positions whose
// greedy prediction matches the reference under teacher forcing;
// grad_norm is the mean pre-clipping global gradient norm.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const HEADER: &str = "epoch,train_loss,val_loss,val_token_acc,grad_norm";

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    /// Mean masked cross entropy over the training batches,
    /// computed with scheduled sampling active
    pub train_loss: f64,

    /// Mean masked cross entropy on the validation set under pure
    /// teacher forcing. NaN when the validation split is empty
    pub val_loss: f64,

    /// Fraction of valid caption positions predicted exactly
    /// Range: [0.0, 1.0]
    pub val_token_acc: f64,

    /// Mean global gradient norm before clipping. Values far above
    /// the clip bound mean most updates are being rescaled
    pub grad_norm: f64,
}

impl EpochMetrics {
    /// True if this epoch beats `best_val_loss`. NaN never improves.
    pub fn is_improvement(&self, best_val_loss: f64) -> bool {
        self.val_loss < best_val_loss
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the header if the file doesn't exist yet, so reruns append.
    pub fn new(dir: impl Into<String>) -> Result<Self> {
        let dir = PathBuf::from(dir.into());
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6}",
            m.epoch, m.train_loss, m.val_loss, m.val_token_acc, m.grad_norm,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.val_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}
