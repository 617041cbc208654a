// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Persistence and external resources shared by training and
// inference:
//
//   checkpoint.rs   model weights (CompactRecorder), the
//                   TrainConfig JSON and latest_epoch.json
//
//   vocab_store.rs  caption vocabulary as a WordLevel
//                   tokenizer.json, built once and reused
//
//   metrics.rs      per-epoch metrics CSV
//
//   pretrained.rs   ImageNet VGG16 weights from a local
//                   PyTorch file or the Hugging Face Hub
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Vocabulary building, saving, and loading
pub mod vocab_store;

/// Training metrics CSV logger
pub mod metrics;

pub mod pretrained;
