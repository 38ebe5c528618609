use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::types::{Chunk, Document};

/// Separators tried in order by the recursive strategy. The empty separator
/// falls back to plain character windows.
const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitStrategy {
    /// Break on paragraphs, then lines, then words, then characters.
    #[default]
    Recursive,
    /// Fixed-size character windows.
    Chars,
}

/// Sizes are measured in characters, not bytes.
#[derive(Debug, Clone)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub strategy: SplitStrategy,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 200,
            strategy: SplitStrategy::Recursive,
        }
    }
}

pub struct TextSplitter {
    config: SplitterConfig,
}

/// Byte range into the document text.
type Span = (usize, usize);

impl TextSplitter {
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let text = &document.content;
        if text.is_empty() {
            return Vec::new();
        }
        let chunk_size = self.config.chunk_size.max(1);
        let overlap = self.config.chunk_overlap;

        let spans: Vec<Span> = match self.config.strategy {
            SplitStrategy::Recursive => {
                let pieces = split_recursive(text, (0, text.len()), SEPARATORS, chunk_size);
                merge_pieces(text, &pieces, chunk_size, overlap)
                    .into_iter()
                    .filter_map(|span| trim_span(text, span))
                    .collect()
            }
            SplitStrategy::Chars => split_chars(text, chunk_size, overlap)
                .into_iter()
                .filter(|&(s, e)| !text[s..e].trim().is_empty())
                .collect(),
        };

        let mut cursor = CharCursor::default();
        spans
            .into_iter()
            .enumerate()
            .map(|(i, (start, end))| Chunk {
                content: text[start..end].to_owned(),
                metadata: document.metadata.clone(),
                chunk_index: i,
                start_offset: cursor.char_offset(text, start),
            })
            .collect()
    }
}

fn char_len(text: &str, (start, end): Span) -> usize {
    text[start..end].chars().count()
}

/// Cut `span` into pieces of at most `chunk_size` chars, preferring the
/// earliest separator in `separators` that occurs in it. Separators stay
/// attached to the end of the preceding piece so pieces tile the span.
fn split_recursive(text: &str, span: Span, separators: &[&str], chunk_size: usize) -> Vec<Span> {
    let slice = &text[span.0..span.1];
    let Some(pos) = separators
        .iter()
        .position(|sep| sep.is_empty() || slice.contains(sep))
    else {
        return vec![span];
    };
    let sep = separators[pos];
    if sep.is_empty() {
        return char_windows(text, span, chunk_size, chunk_size);
    }

    let mut pieces = Vec::new();
    let mut prev = span.0;
    for (idx, m) in slice.match_indices(sep) {
        let end = span.0 + idx + m.len();
        if end > prev {
            pieces.push((prev, end));
        }
        prev = end;
    }
    if prev < span.1 {
        pieces.push((prev, span.1));
    }

    let rest = &separators[pos + 1..];
    pieces
        .into_iter()
        .flat_map(|piece| {
            if char_len(text, piece) <= chunk_size {
                vec![piece]
            } else {
                split_recursive(text, piece, rest, chunk_size)
            }
        })
        .collect()
}

/// Greedily join adjacent pieces up to `chunk_size` chars, carrying trailing
/// pieces of at most `overlap` chars into the next chunk.
fn merge_pieces(text: &str, pieces: &[Span], chunk_size: usize, overlap: usize) -> Vec<Span> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<(Span, usize)> = VecDeque::new();
    let mut total = 0;

    for &piece in pieces {
        let len = char_len(text, piece);
        if total + len > chunk_size && !window.is_empty() {
            chunks.push(window_span(&window));
            while total > overlap || (total + len > chunk_size && total > 0) {
                let Some((_, front_len)) = window.pop_front() else {
                    break;
                };
                total -= front_len;
            }
        }
        window.push_back((piece, len));
        total += len;
    }
    if !window.is_empty() {
        chunks.push(window_span(&window));
    }
    chunks
}

fn window_span(window: &VecDeque<(Span, usize)>) -> Span {
    let start = window.front().map_or(0, |(s, _)| s.0);
    let end = window.back().map_or(start, |(s, _)| s.1);
    (start, end)
}

fn trim_span(text: &str, (start, end): Span) -> Option<Span> {
    let slice = &text[start..end];
    let trimmed_start = slice.trim_start();
    if trimmed_start.is_empty() {
        return None;
    }
    let new_start = start + (slice.len() - trimmed_start.len());
    let new_end = new_start + trimmed_start.trim_end().len();
    Some((new_start, new_end))
}

/// Fixed windows of `size` chars advancing by `step` chars, within `span`.
fn char_windows(text: &str, span: Span, size: usize, step: usize) -> Vec<Span> {
    let boundaries: Vec<usize> = text[span.0..span.1]
        .char_indices()
        .map(|(i, _)| span.0 + i)
        .chain(std::iter::once(span.1))
        .collect();
    let n_chars = boundaries.len() - 1;
    let step = step.max(1);

    let mut windows = Vec::new();
    let mut start = 0;
    while start < n_chars {
        let end = (start + size).min(n_chars);
        windows.push((boundaries[start], boundaries[end]));
        if end == n_chars {
            break;
        }
        start += step;
    }
    windows
}

fn split_chars(text: &str, chunk_size: usize, overlap: usize) -> Vec<Span> {
    char_windows(
        text,
        (0, text.len()),
        chunk_size,
        chunk_size.saturating_sub(overlap),
    )
}

/// Converts increasing byte offsets to char offsets without rescanning from the start.
#[derive(Default)]
struct CharCursor {
    byte: usize,
    chars: usize,
}

impl CharCursor {
    fn char_offset(&mut self, text: &str, byte: usize) -> usize {
        if byte < self.byte {
            self.byte = 0;
            self.chars = 0;
        }
        self.chars += text[self.byte..byte].chars().count();
        self.byte = byte;
        self.chars
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::document::types::DocumentMetadata;

    fn make_doc(content: &str) -> Document {
        Document {
            content: content.to_owned(),
            metadata: DocumentMetadata {
                source: "test".to_owned(),
                content_type: "text/plain".to_owned(),
                extra: HashMap::new(),
            },
        }
    }

    fn splitter(chunk_size: usize, chunk_overlap: usize, strategy: SplitStrategy) -> TextSplitter {
        TextSplitter::new(SplitterConfig {
            chunk_size,
            chunk_overlap,
            strategy,
        })
    }

    fn slice_chars(text: &str, start: usize, len: usize) -> String {
        text.chars().skip(start).take(len).collect()
    }

    #[test]
    fn empty_document() {
        let chunks = TextSplitter::new(SplitterConfig::default()).split(&make_doc(""));
        assert!(chunks.is_empty());
    }

    #[test]
    fn whitespace_only_document() {
        let chunks = TextSplitter::new(SplitterConfig::default()).split(&make_doc(" \n\n  \n"));
        assert!(chunks.is_empty());
    }

    #[test]
    fn single_small_chunk() {
        let chunks = TextSplitter::new(SplitterConfig::default()).split(&make_doc("Hello world."));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].content, "Hello world.");
    }

    #[test]
    fn default_sizes() {
        let config = SplitterConfig::default();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.strategy, SplitStrategy::Recursive);
    }

    #[test]
    fn paragraphs_preferred_over_words() {
        let text = "alpha beta gamma\n\ndelta epsilon zeta";
        let chunks = splitter(20, 0, SplitStrategy::Recursive).split(&make_doc(text));
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["alpha beta gamma", "delta epsilon zeta"]);
        assert_eq!(chunks[1].start_offset, 18);
    }

    #[test]
    fn long_words_fall_back_to_characters() {
        let chunks = splitter(4, 0, SplitStrategy::Recursive).split(&make_doc("abcdefghij"));
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["abcd", "efgh", "ij"]);
        assert_eq!(chunks[2].start_offset, 8);
    }

    #[test]
    fn recursive_overlap_repeats_trailing_words() {
        let text = "one two three four five six";
        let chunks = splitter(14, 6, SplitStrategy::Recursive).split(&make_doc(text));
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let first_word = pair[1].content.split(' ').next().unwrap();
            assert!(
                pair[0].content.contains(first_word),
                "{:?} should overlap {:?}",
                pair[0].content,
                pair[1].content
            );
        }
    }

    #[test]
    fn char_splitting_with_overlap() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        let chunks = splitter(10, 3, SplitStrategy::Chars).split(&make_doc(text));
        assert!(chunks.len() > 1);
        assert_eq!(&chunks[0].content[7..10], &chunks[1].content[..3]);
        assert_eq!(chunks[1].start_offset, 7);
        assert_eq!(chunks.last().unwrap().content, "vwxyz");
    }

    #[test]
    fn char_split_no_overlap() {
        let spans = split_chars("abcdefghij", 5, 0);
        assert_eq!(spans, vec![(0, 5), (5, 10)]);
    }

    #[test]
    fn char_split_full_overlap_makes_progress() {
        let spans = split_chars("abcde", 3, 3);
        assert_eq!(spans.first(), Some(&(0, 3)));
        assert_eq!(spans.last(), Some(&(2, 5)));
    }

    #[test]
    fn offsets_count_characters_not_bytes() {
        let text = "héllo wörld ünïcode";
        let chunks = splitter(6, 0, SplitStrategy::Recursive).split(&make_doc(text));
        for chunk in &chunks {
            let len = chunk.content.chars().count();
            assert_eq!(slice_chars(text, chunk.start_offset, len), chunk.content);
        }
        assert_eq!(chunks[1].start_offset, 6);
    }

    #[test]
    fn metadata_preserved() {
        let chunks = TextSplitter::new(SplitterConfig::default()).split(&make_doc("Some content."));
        assert_eq!(chunks[0].metadata.source, "test");
    }

    #[test]
    fn default_document_chunking_respects_sizes() {
        let text = "The bakery opens at 8am on weekdays. ".repeat(60);
        let chunks = TextSplitter::new(SplitterConfig::default()).split(&make_doc(&text));
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 500);
        }
        for pair in chunks.windows(2) {
            assert!(pair[1].start_offset > pair[0].start_offset);
            assert!(pair[1].start_offset < pair[0].start_offset + pair[0].content.len());
        }
    }

    #[test]
    fn strategy_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            strategy: SplitStrategy,
        }
        let w: Wrapper = serde_json::from_str(r#"{"strategy":"chars"}"#).unwrap();
        assert_eq!(w.strategy, SplitStrategy::Chars);
    }

    mod proptest_splitter {
        use super::*;
        use proptest::prelude::*;

        fn strategy() -> impl Strategy<Value = SplitStrategy> {
            prop_oneof![Just(SplitStrategy::Recursive), Just(SplitStrategy::Chars)]
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(500))]

            #[test]
            fn split_never_panics(
                content in "\\PC{0,3000}",
                chunk_size in 1usize..1000,
                chunk_overlap in 0usize..500,
                strategy in strategy(),
            ) {
                let _ = splitter(chunk_size, chunk_overlap, strategy).split(&make_doc(&content));
            }

            #[test]
            fn chunks_are_slices_at_their_offsets(
                content in "[a-zé \n.]{1,800}",
                chunk_size in 1usize..120,
                chunk_overlap in 0usize..60,
                strategy in strategy(),
            ) {
                let doc_len = content.chars().count();
                let chunks = splitter(chunk_size, chunk_overlap, strategy).split(&make_doc(&content));
                for chunk in &chunks {
                    let len = chunk.content.chars().count();
                    prop_assert!(len > 0);
                    prop_assert!(len <= chunk_size);
                    prop_assert!(chunk.start_offset < doc_len);
                    prop_assert!(chunk.start_offset + len <= doc_len);
                    prop_assert_eq!(slice_chars(&content, chunk.start_offset, len), chunk.content.clone());
                }
            }

            #[test]
            fn chunk_count_is_deterministic(
                content in "[a-z \n.]{0,800}",
                chunk_size in 1usize..120,
                chunk_overlap in 0usize..60,
                strategy in strategy(),
            ) {
                let s = splitter(chunk_size, chunk_overlap, strategy);
                let doc = make_doc(&content);
                prop_assert_eq!(s.split(&doc).len(), s.split(&doc).len());
            }

            #[test]
            fn chunk_indices_sequential(
                content in "[a-z. ]{10,1000}",
                chunk_size in 5usize..100,
                strategy in strategy(),
            ) {
                let chunks = splitter(chunk_size, 0, strategy).split(&make_doc(&content));
                for (i, chunk) in chunks.iter().enumerate() {
                    prop_assert_eq!(chunk.chunk_index, i);
                }
            }

            #[test]
            fn non_blank_text_yields_chunks(
                content in "[a-z]{1,20}( [a-z]{1,20}){0,40}",
                chunk_size in 1usize..200,
                strategy in strategy(),
            ) {
                let chunks = splitter(chunk_size, 0, strategy).split(&make_doc(&content));
                prop_assert!(!chunks.is_empty());
            }
        }
    }
}
