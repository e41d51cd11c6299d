//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`RecursiveChunker`]: splits on paragraphs, then lines, then sentences,
//!   then words, and only cuts inside a word when nothing else fits
//! - [`FixedSizeChunker`]: hard character windows with configurable overlap
//!
//! Sizes are measured in characters, never bytes, so multi-byte text is never
//! cut inside a code point.

use std::collections::VecDeque;

use crate::document::{Chunk, Document, META_CHUNK_INDEX, META_START_INDEX};

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text and metadata but no embeddings.
/// Embeddings are attached later by the pipeline.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has no non-whitespace text.
    /// Each returned chunk has an empty embedding vector.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Separators tried in order by [`RecursiveChunker`].
pub const DEFAULT_SEPARATORS: [&str; 6] = ["\n\n", "\n", ". ", "? ", "! ", " "];

/// A contiguous byte range of the source text and its length in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
    chars: usize,
}

/// Splits text hierarchically and merges the pieces into overlapping windows.
///
/// The first separator that occurs in the text is used to cut it into pieces
/// (the separator stays attached to the preceding piece, so chunks are exact
/// substrings of the document). Pieces that fit are greedily merged into
/// chunks of at most `chunk_size` characters, carrying up to `chunk_overlap`
/// characters of the previous chunk forward. Pieces that do not fit are split
/// again with the remaining separators, falling back to single characters.
///
/// Each chunk inherits the document metadata plus `chunk_index` and
/// `start_index` (character offset into the document text).
///
/// # Example
///
/// ```rust,ignore
/// use docchat_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(1000, 200);
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker` with [`DEFAULT_SEPARATORS`].
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: maximum number of characters shared by consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
        }
    }

    /// Split `text` into chunk texts paired with their character offsets.
    pub fn split_text(&self, text: &str) -> Vec<(usize, String)> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let mut spans = Vec::new();
        self.split_recursive(text, 0, text.len(), &DEFAULT_SEPARATORS, &mut spans);

        // Spans come out in document order, so offsets can be converted incrementally.
        let mut byte_cursor = 0;
        let mut char_cursor = 0;
        spans
            .into_iter()
            .map(|span| {
                char_cursor += text[byte_cursor..span.start].chars().count();
                byte_cursor = span.start;
                (char_cursor, text[span.start..span.end].to_string())
            })
            .collect()
    }

    fn split_recursive(
        &self,
        text: &str,
        start: usize,
        end: usize,
        separators: &[&str],
        out: &mut Vec<Span>,
    ) {
        let segment = &text[start..end];
        let (pieces, remaining) = match separators.iter().position(|sep| segment.contains(sep)) {
            Some(i) => (split_keeping_separator(segment, start, separators[i]), &separators[i + 1..]),
            None => (split_chars(segment, start), &separators[..0]),
        };

        let mut fitting = Vec::new();
        for piece in pieces {
            if piece.chars <= self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                self.merge(&fitting, out);
                fitting.clear();
            }
            self.split_recursive(text, piece.start, piece.end, remaining, out);
        }
        if !fitting.is_empty() {
            self.merge(&fitting, out);
        }
    }

    /// Greedily merge adjacent pieces into windows no longer than `chunk_size`.
    fn merge(&self, pieces: &[Span], out: &mut Vec<Span>) {
        let mut window: VecDeque<Span> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            if total + piece.chars > self.chunk_size && !window.is_empty() {
                out.push(covering(&window, total));
                while total > self.chunk_overlap
                    || (total > 0 && total + piece.chars > self.chunk_size)
                {
                    match window.pop_front() {
                        Some(front) => total -= front.chars,
                        None => break,
                    }
                }
            }
            window.push_back(*piece);
            total += piece.chars;
        }

        if !window.is_empty() {
            out.push(covering(&window, total));
        }
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        self.split_text(&document.text)
            .into_iter()
            .enumerate()
            .map(|(i, (start_index, text))| make_chunk(document, i, start_index, text))
            .collect()
    }
}

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// Chunk IDs are generated as `{document_id}_{chunk_index}`. Each chunk inherits
/// the parent document's metadata plus `chunk_index` and `start_index`.
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size: chunk_size.max(1), chunk_overlap }
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = document.text.chars().collect();
        let step = self.chunk_size.saturating_sub(self.chunk_overlap).max(1);
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            let text: String = chars[start..end].iter().collect();
            chunks.push(make_chunk(document, chunks.len(), start, text));
            if end == chars.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

fn make_chunk(document: &Document, index: usize, start_index: usize, text: String) -> Chunk {
    let mut metadata = document.metadata.clone();
    metadata.insert(META_CHUNK_INDEX.to_string(), index.to_string());
    metadata.insert(META_START_INDEX.to_string(), start_index.to_string());
    Chunk {
        id: format!("{}_{index}", document.id),
        text,
        embedding: Vec::new(),
        metadata,
        document_id: document.id.clone(),
    }
}

fn covering(window: &VecDeque<Span>, chars: usize) -> Span {
    let start = window.front().map_or(0, |s| s.start);
    let end = window.back().map_or(start, |s| s.end);
    Span { start, end, chars }
}

/// Split at `separator`, keeping it attached to the preceding piece.
fn split_keeping_separator(segment: &str, base: usize, separator: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut start = 0;

    while let Some(pos) = segment[start..].find(separator) {
        let end = start + pos + separator.len();
        spans.push(span(segment, base, start, end));
        start = end;
    }
    if start < segment.len() {
        spans.push(span(segment, base, start, segment.len()));
    }

    spans
}

fn split_chars(segment: &str, base: usize) -> Vec<Span> {
    segment
        .char_indices()
        .map(|(i, c)| Span { start: base + i, end: base + i + c.len_utf8(), chars: 1 })
        .collect()
}

fn span(segment: &str, base: usize, start: usize, end: usize) -> Span {
    Span { start: base + start, end: base + end, chars: segment[start..end].chars().count() }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use super::*;

    fn doc(text: &str) -> Document {
        Document {
            id: "doc".into(),
            source_path: PathBuf::from("doc.txt"),
            text: text.into(),
            metadata: HashMap::from([("source".to_string(), "doc.txt".to_string())]),
        }
    }

    #[test]
    fn short_text_yields_single_chunk() {
        let chunks = RecursiveChunker::new(1000, 200).chunk(&doc("The capital of France is Paris."));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "The capital of France is Paris.");
        assert_eq!(chunks[0].metadata["source"], "doc.txt");
        assert_eq!(chunks[0].metadata[META_START_INDEX], "0");
    }

    #[test]
    fn whitespace_only_text_yields_nothing() {
        assert!(RecursiveChunker::new(10, 2).chunk(&doc(" \n\n \t")).is_empty());
        assert!(FixedSizeChunker::new(10, 2).chunk(&doc("")).is_empty());
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let text = format!("{}\n\n{}", "a".repeat(40), "b".repeat(40));
        let chunks = RecursiveChunker::new(50, 10).split_text(&text);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].1.chars().all(|c| c == 'a' || c == '\n'));
        assert_eq!(chunks[1].1, "b".repeat(40));
        assert_eq!(chunks[1].0, 42);
    }

    #[test]
    fn words_are_not_cut_when_avoidable() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda";
        for (_, chunk) in RecursiveChunker::new(20, 5).split_text(text) {
            for word in chunk.split_whitespace() {
                assert!(text.split(' ').any(|w| w == word), "cut word: {word}");
            }
        }
    }

    #[test]
    fn long_words_fall_back_to_character_windows() {
        let text = "x".repeat(25);
        let chunks = RecursiveChunker::new(10, 3).split_text(&text);
        assert!(chunks.iter().all(|(_, c)| c.chars().count() <= 10));
        assert_eq!(chunks[1].0, 7);
    }

    #[test]
    fn multibyte_text_is_measured_in_characters() {
        let text = "é".repeat(30);
        let chunks = RecursiveChunker::new(10, 2).split_text(&text);
        assert!(chunks.iter().all(|(_, c)| c.chars().count() <= 10));
    }

    #[test]
    fn fixed_size_windows_overlap() {
        let chunks = FixedSizeChunker::new(10, 4).chunk(&doc(&"abcdefghij".repeat(2)));
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].metadata[META_START_INDEX], "6");
        assert_eq!(chunks[1].text, "ghijabcdef");
        assert_eq!(chunks[2].id, "doc_2");
    }
}
