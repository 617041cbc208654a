use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while validating captions, vocabularies and configs.
#[derive(Debug, Error, PartialEq)]
pub enum CaptionError {
    #[error("caption for '{image}' is empty")]
    EmptyCaption { image: PathBuf },

    #[error("caption record has no image path")]
    MissingImage,

    #[error("vocabulary is missing the reserved token '{0}'")]
    MissingSpecialToken(&'static str),

    #[error("caption has {len} tokens; at least 2 (<start> and <end>) are required")]
    CaptionTooShort { len: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
