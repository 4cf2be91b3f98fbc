//! A process-wide `cl100k_base` tokenizer, used wherever a
//! "fixed tokenizer" (S4.13 RAG budgeting, S6.2 chunking).
//!
//! Grounded on the `tiktoken-rs` usage shown across the pack's indexing
//! pipelines: build the `CoreBPE` once behind a lazily-initialized static and
//! share it, since construction parses a multi-megabyte BPE rank table.

use once_cell::sync::Lazy;
use tiktoken_rs::CoreBPE;

static TOKENIZER: Lazy<CoreBPE> =
    Lazy::new(|| tiktoken_rs::cl100k_base().expect("cl100k_base tokenizer tables are bundled with tiktoken-rs"));

/// Number of `cl100k_base` tokens in `text`.
pub fn count_tokens(text: &str) -> usize {
    TOKENIZER.encode_with_special_tokens(text).len()
}

/// Truncate `text` to at most `max_tokens` tokens, decoding back to a string.
/// Returns `text` unchanged if it already fits.
pub fn truncate_to_tokens(text: &str, max_tokens: usize) -> String {
    let tokens = TOKENIZER.encode_with_special_tokens(text);
    if tokens.len() <= max_tokens {
        return text.to_string();
    }
    TOKENIZER
        .decode(tokens[..max_tokens].to_vec())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_nonzero_tokens_for_text() {
        assert!(count_tokens("hello wax world") > 0);
    }

    #[test]
    fn empty_text_has_no_tokens() {
        assert_eq!(count_tokens(""), 0);
    }

    #[test]
    fn short_text_is_not_truncated() {
        let text = "hello wax";
        assert_eq!(truncate_to_tokens(text, 100), text);
    }

    #[test]
    fn long_text_is_truncated_to_budget() {
        let text = "hello wax world ".repeat(200);
        let truncated = truncate_to_tokens(&text, 10);
        assert!(count_tokens(&truncated) <= 10);
        assert!(truncated.len() < text.len());
    }
}
