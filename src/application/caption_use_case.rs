// ============================================================
// Layer 2 — Caption Use Case
// ============================================================
// Loads everything a trained run left in the checkpoint dir:
//   1. tokenizer.json       → vocabulary
//   2. train_config.json    → architecture + search defaults
//   3. model_epoch_{n}      → weights
// then turns beam search output back into words.

use std::path::Path;

use anyhow::Result;

use crate::domain::{traits::ImageCaptioner, vocabulary::Vocabulary};
use crate::infra::{
    checkpoint::CheckpointManager,
    vocab_store::{vocabulary_of, VocabStore},
};
use crate::ml::inferencer::{Inferencer, SearchOverrides};

pub struct CaptionUseCase {
    vocab:      Vocabulary,
    inferencer: Inferencer,
}

impl CaptionUseCase {
    pub fn new(checkpoint_dir: &str, overrides: SearchOverrides) -> Result<Self> {
        let tokenizer  = VocabStore::new(checkpoint_dir).load()?;
        let vocab      = vocabulary_of(&tokenizer)?;
        let ckpt       = CheckpointManager::new(checkpoint_dir);
        let inferencer = Inferencer::from_checkpoint(&ckpt, &vocab, overrides)?;
        Ok(Self { vocab, inferencer })
    }
}

impl ImageCaptioner for CaptionUseCase {
    fn caption(&self, image: &Path) -> Result<String> {
        let best = self.inferencer.predict(image)?;
        Ok(self.vocab.render(&best.tokens))
    }
}
