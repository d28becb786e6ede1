//! Sentence-boundary text chunker with overlap
//!
//! Splits text on sentence-terminal punctuation (`.?!` followed by
//! whitespace) and paragraph breaks, then greedily accumulates sentences
//! into chunks up to a target size. Each chunk after the first carries a
//! configurable amount of trailing content from its predecessor so local
//! context survives a retrieval boundary.
//!
//! Guarantees:
//! - Deterministic for identical input and configuration.
//! - Never emits an empty chunk; never drops trailing content.
//! - A single sentence longer than the target size is emitted as its own
//!   oversized chunk rather than truncated.

use docchat_core::{ChatError, Result};

/// Configurable sentence-boundary chunker
#[derive(Debug, Clone)]
pub struct TextChunker {
    target_size: usize,
    overlap: usize,
}

/// A produced chunk: full text plus the byte offset where fresh (non-overlap)
/// content begins
#[derive(Debug, Clone)]
pub(crate) struct ChunkPiece {
    pub text: String,
    pub core_start: usize,
}

impl TextChunker {
    /// Create a chunker; `target_size` must exceed `overlap`
    pub fn new(target_size: usize, overlap: usize) -> Result<Self> {
        if target_size == 0 || target_size <= overlap {
            return Err(ChatError::Validation(format!(
                "chunk target size ({target_size}) must exceed overlap ({overlap})"
            )));
        }
        Ok(Self {
            target_size,
            overlap,
        })
    }

    /// Split text into ordered chunk strings
    pub fn split(&self, text: &str) -> Vec<String> {
        self.pieces(text).into_iter().map(|p| p.text).collect()
    }

    pub(crate) fn pieces(&self, text: &str) -> Vec<ChunkPiece> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut chunks: Vec<ChunkPiece> = Vec::new();
        let mut current = String::new();
        let mut core_start = 0usize;

        for sentence in split_sentences(text) {
            let has_core = current.len() > core_start;
            if has_core && current.len() + sentence.len() > self.target_size {
                let prefix = self.overlap_tail(&current).to_string();
                chunks.push(ChunkPiece {
                    text: std::mem::take(&mut current),
                    core_start,
                });
                core_start = prefix.len();
                current = prefix;
            }
            // An oversized single sentence lands here with an empty core and
            // becomes one oversized chunk.
            current.push_str(sentence);
        }

        if current.len() > core_start {
            chunks.push(ChunkPiece {
                text: current,
                core_start,
            });
        }

        chunks
    }

    /// Trailing slice of a closed chunk carried into the next one,
    /// snapped forward to a word start
    fn overlap_tail<'a>(&self, chunk: &'a str) -> &'a str {
        if self.overlap == 0 || chunk.len() <= self.overlap {
            return "";
        }
        let mut start = chunk.len() - self.overlap;
        while !chunk.is_char_boundary(start) {
            start += 1;
        }
        let tail = &chunk[start..];
        if chunk[..start].ends_with(char::is_whitespace) {
            return tail;
        }
        // mid-word: advance to the next word boundary
        match tail.find(char::is_whitespace) {
            Some(ws) => chunk[start + ws..].trim_start_matches(char::is_whitespace),
            None => "",
        }
    }
}

/// Split text into contiguous sentence slices that exactly cover the input
///
/// A sentence ends at terminal punctuation followed by whitespace (the
/// whitespace run belongs to the finished sentence) or at a paragraph break.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut iter = text.char_indices().peekable();

    while let Some((i, c)) = iter.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(_, next)) = iter.peek() {
                if next.is_whitespace() {
                    let mut end = i + c.len_utf8();
                    while let Some(&(j, nc)) = iter.peek() {
                        if nc.is_whitespace() {
                            end = j + nc.len_utf8();
                            iter.next();
                        } else {
                            break;
                        }
                    }
                    out.push(&text[start..end]);
                    start = end;
                }
            }
        } else if c == '\n' {
            if let Some(&(j, '\n')) = iter.peek() {
                let mut end = j + 1;
                iter.next();
                while let Some(&(k, '\n')) = iter.peek() {
                    end = k + 1;
                    iter.next();
                }
                out.push(&text[start..end]);
                start = end;
            }
        }
    }

    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_short_input_single_chunk() {
        let chunker = TextChunker::new(1000, 200).unwrap();
        let chunks = chunker.split("Just one short sentence.");
        assert_eq!(chunks, vec!["Just one short sentence."]);
    }

    #[test]
    fn test_empty_input_no_chunks() {
        let chunker = TextChunker::new(1000, 200).unwrap();
        assert!(chunker.split("").is_empty());
        assert!(chunker.split("   \n  ").is_empty());
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(TextChunker::new(100, 100).is_err());
        assert!(TextChunker::new(0, 0).is_err());
    }

    #[test]
    fn test_splits_on_sentence_boundaries() {
        let chunker = TextChunker::new(40, 10).unwrap();
        let text = "First sentence here. Second sentence here. Third sentence here.";
        let chunks = chunker.split(text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(!chunk.trim().is_empty());
        }
        // fresh content of the first chunk ends at a sentence boundary
        assert!(chunks[0].trim_end().ends_with('.'));
    }

    #[test]
    fn test_oversized_sentence_kept_whole() {
        let chunker = TextChunker::new(30, 5).unwrap();
        let long = "word ".repeat(20) + "end.";
        let chunks = chunker.split(&long);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].len() > 30);
        assert!(chunks[0].contains("end."));
    }

    #[test]
    fn test_overlap_carried_forward() {
        let chunker = TextChunker::new(50, 20).unwrap();
        let text = "Alpha beta gamma delta. Epsilon zeta eta theta. Iota kappa lambda mu.";
        let pieces = chunker.pieces(text);
        assert!(pieces.len() > 1);
        for window in pieces.windows(2) {
            let prev = &window[0].text;
            let next = &window[1];
            if next.core_start > 0 {
                let prefix = &next.text[..next.core_start];
                assert!(prev.ends_with(prefix), "overlap must mirror the tail of the previous chunk");
            }
        }
    }

    #[test]
    fn test_paragraph_break_is_a_boundary() {
        let chunker = TextChunker::new(25, 0).unwrap();
        let text = "No terminal punctuation here\n\nbut the paragraph break splits";
        let chunks = chunker.split(text);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn test_deterministic() {
        let chunker = TextChunker::new(60, 15).unwrap();
        let text = "One two three. Four five six. Seven eight nine. Ten eleven twelve.";
        assert_eq!(chunker.split(text), chunker.split(text));
    }

    proptest! {
        /// Concatenating each chunk's fresh content reproduces the input.
        #[test]
        fn prop_chunk_cores_cover_input(text in "[a-zA-Z ,.!?\n]{0,600}") {
            let chunker = TextChunker::new(80, 20).unwrap();
            let pieces = chunker.pieces(&text);
            let rebuilt: String = pieces
                .iter()
                .map(|p| &p.text[p.core_start..])
                .collect();
            if text.trim().is_empty() {
                prop_assert!(pieces.is_empty());
            } else {
                prop_assert_eq!(rebuilt, text);
            }
        }

        #[test]
        fn prop_no_empty_chunks(text in "[a-z .]{0,300}") {
            let chunker = TextChunker::new(50, 10).unwrap();
            for chunk in chunker.split(&text) {
                prop_assert!(!chunk.is_empty());
            }
        }
    }
}
