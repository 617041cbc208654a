// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from the caption manifest on disk to tensor
// batches on the training device:
//
//   captions.json + image files
//       │
//       ▼
//   ManifestLoader    → one CaptionRecord per (image, caption)
//       │
//       ▼
//   Preprocessor      → lowercase, strip punctuation
//       │
//       ▼
//   VocabStore        → <start> word ids <end>   (infra layer)
//       │
//       ▼
//   split_train_val   → seeded shuffle, train / validation
//       │
//       ▼
//   CaptionDataset    → Burn Dataset, decodes images lazily
//       │             (ImageTransform: resize + normalise)
//       ▼
//   CaptionBatcher    → image tensor, padded caption tensor
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads the JSON caption manifest
pub mod loader;

/// Cleans caption text
pub mod preprocessor;

/// Resizes and normalises images into CHW buffers
pub mod image;

/// Implements Burn's Dataset trait for caption samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Shuffles and splits data into train/validation sets
pub mod splitter;
