//! Splits `remember`'s input text into overlapping chunks sized by token
//! count.

use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingStrategy;
use crate::tokens::count_tokens;

/// One chunk of a `remember`d document, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub index: u32,
    pub text: String,
}

/// Split `text` into word-boundary chunks targeting `strategy.target_tokens`
/// tokens each, with `strategy.overlap_tokens` tokens of trailing overlap
/// carried into the next chunk. Word boundaries come from Unicode word
/// segmentation so multi-byte scripts chunk the same way ASCII does.
///
/// A word whose own token count exceeds `target_tokens` still becomes its
/// own chunk rather than being split mid-word — `target_tokens` is a target,
/// not a hard cap.
pub fn chunk_text(text: &str, strategy: ChunkingStrategy) -> Vec<Chunk> {
    let words: Vec<&str> = text.unicode_words().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let target = strategy.target_tokens.max(1);
    let overlap = strategy.overlap_tokens.min(target.saturating_sub(1));

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < words.len() {
        let mut end = start;
        let mut tokens_so_far = 0usize;
        while end < words.len() {
            let word_tokens = count_tokens(words[end]).max(1);
            if tokens_so_far > 0 && tokens_so_far + word_tokens > target {
                break;
            }
            tokens_so_far += word_tokens;
            end += 1;
        }
        // Always take at least one word, even if it alone exceeds `target`.
        if end == start {
            end = start + 1;
        }

        let chunk_text = words[start..end].join(" ");
        chunks.push(Chunk {
            index: chunks.len() as u32,
            text: chunk_text,
        });

        if end >= words.len() {
            break;
        }

        // Step back by the overlap's worth of tokens, measured in words from
        // the chunk's tail, so the next chunk repeats that trailing context.
        let mut back = 0usize;
        let mut overlap_tokens = 0usize;
        while back < (end - start) && overlap_tokens < overlap {
            back += 1;
            overlap_tokens += count_tokens(words[end - back]).max(1);
        }
        start = end - back;
    }

    chunks
}
