// ============================================================
// Layer 4 — Caption Preprocessor
// ============================================================
// Normalises raw caption text before the vocabulary is built
// and before captions are encoded, so both see the same words.
//
// Cleaning steps (applied in order):
//   1. Lowercase
//   2. Replace anything that is not a letter, digit or
//      apostrophe with a space ("dog." -> "dog ")
//   3. Collapse runs of whitespace into one space and trim

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Clean one caption. Returns an owned, single-line String.
    pub fn clean(&self, caption: &str) -> String {
        // ── Step 1 + 2: lowercase and strip punctuation ──────────────────────
        let mapped: String = caption
            .chars()
            .flat_map(char::to_lowercase)
            .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
            .collect();

        // ── Step 3: collapse whitespace ──────────────────────────────────────
        mapped.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_and_strips_punctuation() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("A Dog, running!"), "a dog running");
    }

    #[test]
    fn test_keeps_apostrophes() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("The man's hat."), "the man's hat");
    }

    #[test]
    fn test_collapses_whitespace_and_newlines() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("  two\t\tcats \n on  a mat "), "two cats on a mat");
    }

    #[test]
    fn test_punctuation_only_cleans_to_empty() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("Red-car"), "red car");
        assert_eq!(p.clean("..."), "");
    }
}
