// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to accomplish one goal each:
// training a captioner or captioning an image.
//
//   - No network math here (Layer 5)
//   - No argument parsing here (Layer 1)
//   - Only workflow coordination

// The training workflow
pub mod train_use_case;

// The image captioning workflow
pub mod caption_use_case;
