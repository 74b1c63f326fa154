//! Text segmentation for remote synthesis.
//!
//! Each segment becomes one provider call, so segments must stay small
//! enough for the provider's input limit and natural enough to be spoken
//! on their own.

use crate::defaults::CLONE_CHUNK_CHARS;

/// How to cut text into segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentMode {
    /// One segment per sentence.
    #[default]
    Sentence,
    /// Greedy packing of sentences and lines up to `max_chars` characters.
    SizeCapped { max_chars: usize },
}

impl SegmentMode {
    /// Size-capped mode with the default cloning cap.
    pub fn cloning() -> Self {
        SegmentMode::SizeCapped {
            max_chars: CLONE_CHUNK_CHARS,
        }
    }
}

/// Split `text` according to `mode`. Pure and deterministic.
pub fn segment(text: &str, mode: SegmentMode) -> Vec<String> {
    match mode {
        SegmentMode::Sentence => split_sentences(text),
        SegmentMode::SizeCapped { max_chars } => split_capped(text, max_chars),
    }
}

/// Split after every `.`, `?` or `!` that is followed by whitespace.
///
/// Punctuation stays with its sentence; blank pieces are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    pieces(text, false)
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Pack sentence- or newline-delimited pieces into chunks of at most
/// `max_chars` characters.
///
/// A piece that alone exceeds the cap becomes its own oversized chunk.
pub fn split_capped(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for piece in pieces(text, true) {
        let piece_len = piece.chars().count();
        if current_len + piece_len > max_chars && current_len > 0 {
            flush(&mut chunks, &current);
            current.clear();
            current_len = 0;
        }
        current.push_str(piece);
        current_len += piece_len;
    }
    flush(&mut chunks, &current);

    chunks
}

fn flush(chunks: &mut Vec<String>, chunk: &str) {
    let trimmed = chunk.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Cut `text` into pieces that each end with their delimiter run.
///
/// The delimiter is terminal punctuation followed by whitespace, plus (when
/// `break_on_newline`) any run of newlines. Concatenating the pieces gives
/// back `text`.
fn pieces(text: &str, break_on_newline: bool) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let delimited = match c {
            '.' | '?' | '!' => chars.peek().is_some_and(|&(_, next)| next.is_whitespace()),
            '\n' => break_on_newline,
            _ => false,
        };
        if !delimited {
            continue;
        }

        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            let absorb = if c == '\n' {
                next == '\n'
            } else {
                next.is_whitespace()
            };
            if !absorb {
                break;
            }
            end = j + next.len_utf8();
            chars.next();
        }

        out.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentence_mode_splits_two_sentences() {
        let segments = segment("Hello world. How are you?", SegmentMode::Sentence);
        assert_eq!(segments, vec!["Hello world.", "How are you?"]);
    }

    #[test]
    fn sentence_mode_handles_each_terminator() {
        let segments = split_sentences("Stop! Really? Yes.  Fine");
        assert_eq!(segments, vec!["Stop!", "Really?", "Yes.", "Fine"]);
    }

    #[test]
    fn sentence_mode_keeps_inner_dots() {
        let segments = split_sentences("Version 2.5 shipped. It costs $3.50 now.");
        assert_eq!(segments, vec!["Version 2.5 shipped.", "It costs $3.50 now."]);
    }

    #[test]
    fn sentence_mode_one_word_sentences() {
        assert_eq!(split_sentences("A. B. C."), vec!["A.", "B.", "C."]);
    }

    #[test]
    fn sentence_mode_drops_blank_input() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   \n\t ").is_empty());
    }

    #[test]
    fn sentence_mode_splits_across_newlines_after_punctuation() {
        let segments = split_sentences("First line.\nSecond line!\n\nThird");
        assert_eq!(segments, vec!["First line.", "Second line!", "Third"]);
    }

    #[test]
    fn sentence_mode_handles_multibyte_text() {
        let segments = split_sentences("Xin chào. Bạn khỏe không?");
        assert_eq!(segments, vec!["Xin chào.", "Bạn khỏe không?"]);
    }

    #[test]
    fn capped_mode_respects_cap_on_long_paragraph() {
        let sentence = "The quick brown fox jumps over the lazy dog. ";
        let text = sentence.repeat(3000 / sentence.len() + 1);
        assert!(text.chars().count() >= 3000);

        let chunks = split_capped(&text, 1000);
        assert!(chunks.len() >= 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 1000, "chunk of {}", chunk.len());
        }
        let rejoined: String = chunks.join(" ");
        assert_eq!(
            rejoined.split_whitespace().count(),
            text.split_whitespace().count()
        );
    }

    #[test]
    fn capped_mode_passes_oversized_piece_through() {
        let long = "x".repeat(50);
        let text = format!("Short one. {long}. Tail.");
        let chunks = split_capped(&text, 20);

        assert_eq!(chunks[0], "Short one.");
        assert_eq!(chunks[1], format!("{long}."));
        assert_eq!(chunks[2], "Tail.");
    }

    #[test]
    fn capped_mode_packs_small_pieces_together() {
        let chunks = split_capped("One. Two. Three.", 100);
        assert_eq!(chunks, vec!["One. Two. Three."]);
    }

    #[test]
    fn capped_mode_breaks_on_newlines() {
        let chunks = split_capped("line one\nline two\nline three", 12);
        assert_eq!(chunks, vec!["line one", "line two", "line three"]);
    }

    #[test]
    fn capped_mode_counts_characters_not_bytes() {
        let text = "ễễễễễ. ễễễễễ.";
        let chunks = split_capped(text, 14);
        assert_eq!(chunks, vec![text]);
    }

    #[test]
    fn segment_is_restartable() {
        let text = "One. Two. Three.";
        assert_eq!(
            segment(text, SegmentMode::Sentence),
            segment(text, SegmentMode::Sentence)
        );
    }

    #[test]
    fn cloning_mode_uses_default_cap() {
        assert_eq!(
            SegmentMode::cloning(),
            SegmentMode::SizeCapped { max_chars: 1000 }
        );
    }
}
