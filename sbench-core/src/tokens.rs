//! Pluggable token counting.
//!
//! The engine never inspects how tokens are counted; it receives a plain
//! function value chosen once at startup. The default is the byte/4
//! ceiling common for English-heavy source context; the weighted variant
//! adjusts for the punctuation density of code, approximating a
//! cl100k-style tokenizer without pulling in a tokenizer dependency.

use serde::Serialize;

/// The counter injected into the benchmark engine.
pub type TokenCounter = fn(&str) -> usize;

/// Byte-count / 4, rounded up.
pub fn approx_tokens(text: &str) -> usize {
    (text.len() + 3) / 4
}

/// Character/4 base plus a punctuation adjustment (code tokenizes denser
/// than prose).
pub fn weighted_tokens(text: &str) -> usize {
    let chars = text.chars().count();
    let punctuation = text.chars().filter(|c| c.is_ascii_punctuation()).count();
    chars / 4 + punctuation / 8
}

/// Startup-time tokenizer selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    Approx,
    Weighted,
}

impl TokenizerKind {
    pub fn counter(self) -> TokenCounter {
        match self {
            Self::Approx => approx_tokens,
            Self::Weighted => weighted_tokens,
        }
    }

    /// Name recorded in report payloads.
    pub fn label(self) -> &'static str {
        match self {
            Self::Approx => "approx:bytes_div_4",
            Self::Weighted => "weighted:cl100k_approx",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approx_rounds_up() {
        assert_eq!(approx_tokens(""), 0);
        assert_eq!(approx_tokens("a"), 1);
        assert_eq!(approx_tokens("abcd"), 1);
        assert_eq!(approx_tokens("abcde"), 2);
    }

    #[test]
    fn weighted_counts_punctuation_extra() {
        let plain = "abcdefgh".repeat(8);
        let punctuated = "(a+b)*c;".repeat(8);
        assert!(weighted_tokens(&punctuated) > weighted_tokens(&plain) - 1);
        assert!(weighted_tokens(&punctuated) >= punctuated.chars().count() / 4);
    }

    #[test]
    fn kind_selects_the_matching_counter() {
        let text = "let x = 42;";
        assert_eq!(TokenizerKind::Approx.counter()(text), approx_tokens(text));
        assert_eq!(TokenizerKind::Weighted.counter()(text), weighted_tokens(text));
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(TokenizerKind::Approx.label(), "approx:bytes_div_4");
        assert_eq!(TokenizerKind::Weighted.label(), "weighted:cl100k_approx");
    }
}
