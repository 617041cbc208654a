// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All network code lives here: the VGG16 encoder, the stacked
// LSTM decoder with Luong attention, beam search, the training
// loop and the inference engine.
//
//   cell.rs        LSTM cell with forget-gate bias
//   attention.rs   Luong (multiplicative) attention
//   encoder.rs     VGG16 backbone + state projection
//   decoder.rs     embedding, LSTM stack, attention, vocab head
//   model.rs       encoder + decoder, masked sequence loss
//   beam.rs        host-side beam bookkeeping
//   grad_clip.rs   global-norm gradient clipping
//   trainer.rs     partial_fit and the epoch loop
//   inferencer.rs  checkpoint loading and prediction
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Luong et al. (2015) Effective Approaches to
//            Attention-based Neural Machine Translation

use burn::backend::Autodiff;

/// LSTM cell used by every decoder layer
pub mod cell;

pub mod attention;

/// VGG16 image encoder
pub mod encoder;

/// Attention decoder with scheduled sampling
pub mod decoder;

pub mod model;

/// Beam search over decoder steps
pub mod beam;

pub mod grad_clip;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// Inference engine: loads a checkpoint and captions images
pub mod inferencer;

/// Backend for inference and validation.
#[cfg(feature = "backend-wgpu")]
pub type InnerBackend = burn::backend::Wgpu;

/// Backend for inference and validation.
#[cfg(not(feature = "backend-wgpu"))]
pub type InnerBackend = burn::backend::NdArray;

/// Backend with gradient tracking, used for training.
pub type TrainBackend = Autodiff<InnerBackend>;
