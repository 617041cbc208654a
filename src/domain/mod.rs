// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types that describe what the captioner works with:
// caption records, the vocabulary and the errors raised when
// either is malformed.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O or network calls
//   - Only structs, enums and traits

/// An image paired with one human-written caption
pub mod caption;

/// Typed failures for malformed records and vocabularies
pub mod error;

/// Word <-> index mapping with the reserved sequence markers
pub mod vocabulary;

/// Abstractions implemented by the data and application layers
pub mod traits;
