// ============================================================
// Layer 6 — Vocabulary Store
// ============================================================
// Builds, saves and loads the caption vocabulary as a Hugging
// Face `tokenizers` WordLevel JSON. The JSON is written directly
// rather than trained: the word list is simply every cleaned
// caption word seen at least `min_count` times.
//
//   ids 0..=3   <pad> <unk> <start> <end>
//   ids 4..     words by descending frequency, ties alphabetical
//
// Captions reaching this store are already cleaned, so the
// tokenizer only needs a Lowercase normalizer and a plain
// whitespace split.

use std::{collections::HashMap, path::PathBuf};

use anyhow::{Context, Result};
use tokenizers::Tokenizer;

use crate::domain::{
    error::CaptionError,
    vocabulary::{Vocabulary, SPECIAL_TOKENS, UNK_TOKEN},
};

pub struct VocabStore {
    dir: PathBuf,
}

impl VocabStore {
    pub fn new(dir: impl Into<String>) -> Self {
        Self { dir: PathBuf::from(dir.into()) }
    }

    fn path(&self) -> PathBuf {
        self.dir.join("tokenizer.json")
    }

    /// Load an existing tokenizer or build one from `captions`.
    pub fn load_or_build(&self, captions: &[String], min_count: usize, max_size: usize) -> Result<Tokenizer> {
        if self.path().exists() {
            tracing::info!("Loading existing vocabulary from '{}'", self.path().display());
            self.load()
        } else {
            tracing::info!("Building vocabulary (min_count={}, max_size={})", min_count, max_size);
            self.build_and_save(captions, min_count, max_size)
        }
    }

    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.path();
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
    }

    fn build_and_save(&self, captions: &[String], min_count: usize, max_size: usize) -> Result<Tokenizer> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        // ── Step 1: word frequencies ─────────────────────────────────────────
        let mut freq: HashMap<&str, usize> = HashMap::new();
        for caption in captions {
            for word in caption.split_whitespace() {
                *freq.entry(word).or_insert(0) += 1;
            }
        }

        let mut words: Vec<(&str, usize)> = freq
            .into_iter()
            .filter(|(w, count)| *count >= min_count.max(1) && !SPECIAL_TOKENS.contains(w))
            .collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        words.truncate(max_size.saturating_sub(SPECIAL_TOKENS.len()));

        // ── Step 2: vocab JSON ───────────────────────────────────────────────
        let mut vocab = serde_json::Map::new();
        for (id, token) in SPECIAL_TOKENS.iter().enumerate() {
            vocab.insert(token.to_string(), serde_json::json!(id));
        }
        for (offset, (word, _)) in words.iter().enumerate() {
            vocab.insert(word.to_string(), serde_json::json!(SPECIAL_TOKENS.len() + offset));
        }

        let added_tokens: Vec<serde_json::Value> = SPECIAL_TOKENS
            .iter()
            .enumerate()
            .map(|(id, token)| {
                serde_json::json!({
                    "id": id, "content": token, "single_word": false, "lstrip": false,
                    "rstrip": false, "normalized": false, "special": true
                })
            })
            .collect();

        // ── Step 3: tokenizer JSON in Hugging Face format ────────────────────
        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": { "type": "Lowercase" },
            "pre_tokenizer": { "type": "WhitespaceSplit" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": UNK_TOKEN
            }
        });

        let path = self.path();
        std::fs::write(&path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write tokenizer JSON to '{}'", path.display()))?;

        tracing::info!(
            "Vocabulary built with {} entries, saved to '{}'",
            words.len() + SPECIAL_TOKENS.len(),
            path.display()
        );

        self.load()
    }
}

/// Domain vocabulary backed by the tokenizer's word map.
pub fn vocabulary_of(tokenizer: &Tokenizer) -> Result<Vocabulary, CaptionError> {
    Vocabulary::from_word_map(tokenizer.get_vocab(true))
}

/// `<start>` + word ids + `<end>`, truncated to `max_len` tokens with
/// the trailing `<end>` kept.
///
/// The tokenizer normalises and splits the caption; each word is then
/// resolved through `vocab`, so anything outside it becomes `<unk>`.
pub fn encode_caption(
    tokenizer: &Tokenizer,
    vocab:     &Vocabulary,
    caption:   &str,
    max_len:   usize,
) -> Result<Vec<u32>> {
    let encoding = tokenizer
        .encode(caption, false)
        .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;

    let mut ids = Vec::with_capacity(encoding.len() + 2);
    ids.push(vocab.start_id());
    ids.extend(encoding.get_tokens().iter().map(|word| vocab.index(word)));

    let max_len = max_len.max(2);
    ids.truncate(max_len - 1);
    ids.push(vocab.end_id());
    Ok(ids)
}
