//! Tokenizer for the lex index and BM25 scorer.
//!
//! Lowercase, split on non-alphanumeric characters, drop tokens shorter than
//! 2 characters. Shared by both indexing and query-time scoring so the two
//! sides always agree on what a "term" is.

/// Tokenize text into searchable terms.
///
/// # Example
///
/// ```
/// use wax_search::tokenizer::tokenize;
///
/// let tokens = tokenize("Hello, World!");
/// assert_eq!(tokens, vec!["hello", "world"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.len() >= 2)
        .map(String::from)
        .collect()
}

/// Tokenize and deduplicate, preserving first-seen order (for query terms).
///
/// # Example
///
/// ```
/// use wax_search::tokenizer::tokenize_unique;
///
/// let tokens = tokenize_unique("test test TEST");
/// assert_eq!(tokens, vec!["test"]);
/// ```
pub fn tokenize_unique(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}
