//! Splitting text into short narration chunks.
//!
//! Chunks are kept small (a few seconds of speech) so pause and stop take
//! effect quickly and a resumed chunk does not repeat much audio.

/// Default soft upper bound on chunk length, in characters.
pub const DEFAULT_TARGET_LEN: usize = 420;

/// Group whitespace-separated tokens into sentences ending in `.`, `!` or
/// `?`. A trailing fragment without terminal punctuation is still a sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for token in text.split_whitespace() {
        current.push(token);
        if token.ends_with(['.', '!', '?']) {
            sentences.push(current.join(" "));
            current.clear();
        }
    }

    if !current.is_empty() {
        sentences.push(current.join(" "));
    }

    sentences
}

/// Greedily pack sentences into chunks of at most `target_len` characters
/// (joined with single spaces). A sentence is never split, so one longer
/// than `target_len` becomes its own chunk.
pub fn chunk_text(text: &str, target_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in split_sentences(text) {
        let len = sentence.chars().count();
        if current.is_empty() {
            current = sentence;
            current_len = len;
        } else if current_len + 1 + len <= target_len {
            current.push(' ');
            current.push_str(&sentence);
            current_len += 1 + len;
        } else {
            chunks.push(std::mem::replace(&mut current, sentence));
            current_len = len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_blank_input_yield_nothing() {
        assert!(chunk_text("", DEFAULT_TARGET_LEN).is_empty());
        assert!(chunk_text("  \n\t ", DEFAULT_TARGET_LEN).is_empty());
    }

    #[test]
    fn oversized_sentence_is_not_split() {
        let sentence = format!("{}.", "x".repeat(499));
        assert_eq!(sentence.len(), 500);
        assert_eq!(chunk_text(&sentence, 420), vec![sentence]);
    }

    #[test]
    fn tight_target_gives_one_sentence_per_chunk() {
        assert_eq!(
            chunk_text("A. B. C. D.", 4),
            vec!["A.", "B.", "C.", "D."]
        );
    }

    #[test]
    fn sentences_pack_up_to_the_target() {
        let chunks = chunk_text("One two. Three four! Five six? Seven", 20);
        assert_eq!(chunks, vec!["One two. Three four!", "Five six? Seven"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
    }

    #[test]
    fn whitespace_runs_collapse_and_order_is_kept() {
        let chunks = chunk_text("First   line.\nSecond\tline.", 420);
        assert_eq!(chunks, vec!["First line. Second line."]);
    }

    #[test]
    fn trailing_fragment_is_kept() {
        assert_eq!(
            split_sentences("Done. and then"),
            vec!["Done.", "and then"]
        );
    }
}
