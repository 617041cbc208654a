// ============================================================
// Layer 3 — Vocabulary
// ============================================================
// Bidirectional mapping between caption words and the integer
// indices the network predicts. Four indices are reserved:
//
//   <pad>   = 0   padding after <end>
//   <unk>   = 1   any word outside the vocabulary
//   <start> = 2   first decoder input of every caption
//   <end>   = 3   terminates a caption
//
// The vocabulary is built by the infra layer (as a tokenizer
// JSON) and rebuilt from that word map here, so this type stays
// free of I/O.

use std::collections::HashMap;

use crate::domain::error::CaptionError;

pub const PAD_TOKEN: &str = "<pad>";
pub const UNK_TOKEN: &str = "<unk>";
pub const START_TOKEN: &str = "<start>";
pub const END_TOKEN: &str = "<end>";

/// Reserved tokens in index order
pub const SPECIAL_TOKENS: [&str; 4] = [PAD_TOKEN, UNK_TOKEN, START_TOKEN, END_TOKEN];

/// Rendered in place of an index that maps to no word.
pub const SENTINEL_PLACEHOLDER: &str = "-1";

#[derive(Debug, Clone)]
pub struct Vocabulary {
    word_to_index: HashMap<String, u32>,
    index_to_word: Vec<Option<String>>,
    pad:   u32,
    unk:   u32,
    start: u32,
    end:   u32,
}

impl Vocabulary {
    /// Build from a word -> index map. Every reserved token must be present.
    pub fn from_word_map(word_to_index: HashMap<String, u32>) -> Result<Self, CaptionError> {
        let lookup = |token: &'static str| {
            word_to_index
                .get(token)
                .copied()
                .ok_or(CaptionError::MissingSpecialToken(token))
        };
        let pad   = lookup(PAD_TOKEN)?;
        let unk   = lookup(UNK_TOKEN)?;
        let start = lookup(START_TOKEN)?;
        let end   = lookup(END_TOKEN)?;

        let size = word_to_index.values().map(|&i| i as usize + 1).max().unwrap_or(0);
        let mut index_to_word = vec![None; size];
        for (word, &index) in &word_to_index {
            index_to_word[index as usize] = Some(word.clone());
        }

        Ok(Self { word_to_index, index_to_word, pad, unk, start, end })
    }

    /// Number of index slots, i.e. the width of the output projection.
    pub fn len(&self) -> usize {
        self.index_to_word.len()
    }

    pub fn pad_id(&self)   -> u32 { self.pad }
    pub fn unk_id(&self)   -> u32 { self.unk }
    pub fn start_id(&self) -> u32 { self.start }
    pub fn end_id(&self)   -> u32 { self.end }

    /// Index of `word`, falling back to `<unk>`.
    pub fn index(&self, word: &str) -> u32 {
        self.word_to_index.get(word).copied().unwrap_or(self.unk)
    }

    /// Word at `index`, or the sentinel placeholder when nothing lives there.
    pub fn word(&self, index: i64) -> &str {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.index_to_word.get(i))
            .and_then(|w| w.as_deref())
            .unwrap_or(SENTINEL_PLACEHOLDER)
    }

    fn is_marker(&self, index: i64) -> bool {
        [self.pad, self.start, self.end].iter().any(|&m| i64::from(m) == index)
    }

    /// Join the words of a decoded sequence, dropping <pad>, <start> and <end>.
    pub fn render(&self, indices: &[i64]) -> String {
        indices
            .iter()
            .filter(|&&i| !self.is_marker(i))
            .map(|&i| self.word(i))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
