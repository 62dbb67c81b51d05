// ============================================================
// Layer 4 — Text Preprocessor / Tokenizer
// ============================================================
// Turns raw query and sentence text into word tokens.
//
// Steps (applied in order):
//   1. Map Unicode whitespace variants and control characters
//      to a plain space
//   2. Lowercase
//   3. Split on whitespace
//   4. Strip non-alphanumeric characters from both token edges
//      ("formed?" → "formed", "(1912)" → "1912")
//   5. Drop tokens that end up empty
//
// Inner punctuation is kept ("u.s", "o'neill") so that tokens
// still match the pretrained embedding vocabulary.

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Normalise characters without changing token boundaries.
    pub fn clean(&self, text: &str) -> String {
        text.chars()
            .map(|c| match c {
                '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                c if c.is_control() => ' ',
                c => c,
            })
            .collect()
    }

    /// Split text into lowercase word tokens.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.clean(text)
            .to_lowercase()
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect()
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
    fn test_lowercases_and_splits() {
        let p = Preprocessor::new();
        assert_eq!(p.tokenize("The Cat  SAT"), vec!["the", "cat", "sat"]);
    }

    #[test]
    fn test_strips_edge_punctuation() {
        let p = Preprocessor::new();
        assert_eq!(
            p.tokenize("how are glacier caves formed?"),
            vec!["how", "are", "glacier", "caves", "formed"]
        );
        assert_eq!(p.tokenize("(1912) -- end."), vec!["1912", "end"]);
    }

    #[test]
    fn test_keeps_inner_punctuation() {
        let p = Preprocessor::new();
        assert_eq!(p.tokenize("U.S. O'Neill"), vec!["u.s", "o'neill"]);
    }

    #[test]
    fn test_control_chars_split_tokens() {
        let p = Preprocessor::new();
        assert_eq!(p.tokenize("hello\x01world\u{00A0}again"), vec!["hello", "world", "again"]);
    }

    #[test]
    fn test_empty_string() {
        let p = Preprocessor::new();
        assert!(p.tokenize("").is_empty());
        assert!(p.tokenize(" -- ").is_empty());
    }
}
