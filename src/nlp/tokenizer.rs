//! Narrative tokenizer
//!
//! Lowercases the text and extracts maximal runs of Unicode letters.
//! Digits and punctuation never produce tokens; tokens shorter than the
//! minimum length are dropped.

use regex::Regex;
use std::sync::LazyLock;

static WORD_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\p{L}+").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokenizer {
    min_token_len: usize,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self { min_token_len: 3 }
    }

    /// Set the minimum token length, counted in characters.
    pub fn with_min_length(mut self, len: usize) -> Self {
        self.min_token_len = len;
        self
    }

    pub fn min_token_len(&self) -> usize {
        self.min_token_len
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        WORD_REGEX
            .find_iter(&lowered)
            .map(|m| m.as_str().to_string())
            .filter(|t| t.chars().count() >= self.min_token_len)
            .collect()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_and_splits_on_non_letters() {
        let tokenizer = Tokenizer::new();
        let tokens = tokenizer.tokenize("Fever, severe COUGH; vomiting-blood");
        assert_eq!(tokens, vec!["fever", "severe", "cough", "vomiting", "blood"]);
    }

    #[test]
    fn test_min_length_filter() {
        let tokenizer = Tokenizer::new();
        let tokens = tokenizer.tokenize("he had a bad flu");
        assert_eq!(tokens, vec!["had", "bad", "flu"]);

        let loose = Tokenizer::new().with_min_length(2);
        assert_eq!(loose.tokenize("he had flu"), vec!["he", "had", "flu"]);
    }

    #[test]
    fn test_digits_never_tokenize() {
        let tokenizer = Tokenizer::new();
        let tokens = tokenizer.tokenize("fever 39.5 for 3 days");
        assert_eq!(tokens, vec!["fever", "for", "days"]);
    }

    #[test]
    fn test_unicode_letters_kept() {
        let tokenizer = Tokenizer::new();
        let tokens = tokenizer.tokenize("Fiebre alta y convulsión");
        assert_eq!(tokens, vec!["fiebre", "alta", "convulsión"]);
    }

    #[test]
    fn test_empty_text() {
        let tokenizer = Tokenizer::new();
        assert!(tokenizer.tokenize("").is_empty());
        assert!(tokenizer.tokenize("12 + 34 ...").is_empty());
    }
}
