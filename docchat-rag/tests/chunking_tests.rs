//! Property tests for the recursive chunker.

use std::collections::HashMap;
use std::path::PathBuf;

use docchat_rag::document::{META_CHUNK_INDEX, META_START_INDEX};
use docchat_rag::{Chunker, Document, RecursiveChunker};
use proptest::prelude::*;

fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Zé0-9 .,?!\n]{0,800}"
}

fn arb_sizes() -> impl Strategy<Value = (usize, usize)> {
    (10usize..200).prop_flat_map(|size| (Just(size), 0..size / 2))
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Every chunk is the exact substring at its recorded offset and fits
    /// within the configured size.
    #[test]
    fn chunks_are_bounded_substrings(text in arb_text(), (size, overlap) in arb_sizes()) {
        let chars: Vec<char> = text.chars().collect();
        for (start, chunk) in RecursiveChunker::new(size, overlap).split_text(&text) {
            let len = char_len(&chunk);
            prop_assert!(len <= size, "chunk of {len} chars exceeds {size}");
            let expected: String = chars[start..start + len].iter().collect();
            prop_assert_eq!(chunk, expected);
        }
    }

    /// Every character of non-blank text lands in at least one chunk.
    #[test]
    fn chunks_cover_the_whole_text(text in arb_text(), (size, overlap) in arb_sizes()) {
        prop_assume!(!text.trim().is_empty());
        let mut covered = vec![false; char_len(&text)];
        for (start, chunk) in RecursiveChunker::new(size, overlap).split_text(&text) {
            covered[start..start + char_len(&chunk)].iter_mut().for_each(|c| *c = true);
        }
        prop_assert!(covered.iter().all(|&c| c));
    }

    /// Consecutive chunks move forward and share at most `overlap` characters.
    #[test]
    fn consecutive_chunks_overlap_within_bound(text in arb_text(), (size, overlap) in arb_sizes()) {
        let chunks = RecursiveChunker::new(size, overlap).split_text(&text);
        for pair in chunks.windows(2) {
            let (prev_start, prev) = &pair[0];
            let next_start = pair[1].0;
            prop_assert!(next_start > *prev_start);
            let prev_end = prev_start + char_len(prev);
            prop_assert!(prev_end.saturating_sub(next_start) <= overlap);
        }
    }

    /// On space-separated words, consecutive chunks share at least `overlap`
    /// characters minus one word.
    #[test]
    fn consecutive_chunks_share_about_overlap(
        words in proptest::collection::vec("[a-z]{1,8}", 1..150),
        (size, overlap) in (20usize..200).prop_flat_map(|size| (Just(size), 0..size / 2)),
    ) {
        let text = words.join(" ");
        let max_word = words.iter().map(|w| char_len(w)).max().unwrap_or(0);
        let chunks = RecursiveChunker::new(size, overlap).split_text(&text);
        for pair in chunks.windows(2) {
            let (prev_start, prev) = &pair[0];
            let shared = (prev_start + char_len(prev)).saturating_sub(pair[1].0);
            prop_assert!(
                shared + max_word >= overlap,
                "chunks share {shared} chars, expected about {overlap}"
            );
        }
    }
}

#[test]
fn short_document_is_a_single_chunk_with_provenance() {
    let mut metadata = HashMap::new();
    metadata.insert("source".to_string(), "docs/facts.txt".to_string());
    let document = Document {
        id: "facts.txt".into(),
        source_path: PathBuf::from("docs/facts.txt"),
        text: "The capital of France is Paris.".into(),
        metadata,
    };

    let chunks = RecursiveChunker::new(1000, 200).chunk(&document);
    assert_eq!(chunks.len(), 1);
    let chunk = &chunks[0];
    assert_eq!(chunk.id, "facts.txt_0");
    assert_eq!(chunk.text, document.text);
    assert_eq!(chunk.source(), Some("docs/facts.txt"));
    assert_eq!(chunk.metadata[META_CHUNK_INDEX], "0");
    assert_eq!(chunk.metadata[META_START_INDEX], "0");
    assert!(chunk.embedding.is_empty());
}

#[test]
fn long_prose_uses_default_sizes() {
    let sentence = "Retrieval augmented generation grounds answers in documents. ";
    let text = sentence.repeat(60);
    let chunks = RecursiveChunker::new(1000, 200).split_text(&text);

    assert!(chunks.len() > 1);
    for (_, chunk) in &chunks {
        assert!(char_len(chunk) <= 1000);
        assert!(chunk.ends_with(". ") || chunk.ends_with('.'), "cut mid-sentence: {chunk:?}");
    }
    let (second_start, _) = chunks[1];
    let first_end = char_len(&chunks[0].1);
    assert!(first_end - second_start <= 200 && first_end > second_start);
}
