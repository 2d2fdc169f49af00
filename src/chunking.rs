use crate::document::{Document, SOURCE_KEY};

/// A bounded text segment, the unit that gets embedded and retrieved.
#[derive(Debug, Clone)]
pub struct TextChunk {
    /// The text content of this chunk.
    pub content: String,
    /// Source document this chunk was derived from.
    pub source: String,
}

/// Split preference, coarsest first. Hard character cuts are the last resort.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Split a batch of documents into chunks, each inheriting its parent's
/// `source` metadata.
pub fn split_documents(
    documents: &[Document],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<TextChunk> {
    documents
        .iter()
        .flat_map(|doc| {
            let source = doc
                .metadata
                .get(SOURCE_KEY)
                .cloned()
                .unwrap_or_else(|| "unknown".to_string());

            split_text(&doc.content, chunk_size, chunk_overlap)
                .into_iter()
                .map(move |content| TextChunk {
                    content,
                    source: source.clone(),
                })
        })
        .collect()
}

/// Split text into segments of at most `chunk_size` characters, with
/// `chunk_overlap` characters repeated between consecutive segments.
///
/// Splits prefer paragraph breaks, then lines, sentences, and words before
/// falling back to a hard cut, so a chunk only exceeds the size bound when a
/// single unbreakable token does. Deterministic for a given input.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let fragments = fragment(text, &SEPARATORS, chunk_size, chunk_overlap);
    merge_fragments(fragments, chunk_size, chunk_overlap)
}

/// Recursively break `text` into fragments no longer than `chunk_size`,
/// trying each separator in order and keeping separators attached so no
/// characters are lost between fragments.
fn fragment(text: &str, separators: &[&str], chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if char_len(text) <= chunk_size {
        return vec![text.to_string()];
    }

    let Some((sep, rest)) = separators.split_first() else {
        return hard_cut(text, chunk_size, chunk_overlap);
    };

    let mut fragments = Vec::new();
    for piece in text.split_inclusive(sep) {
        if char_len(piece) <= chunk_size {
            fragments.push(piece.to_string());
        } else {
            fragments.extend(fragment(piece, rest, chunk_size, chunk_overlap));
        }
    }
    fragments
}

/// Cut an unbreakable token into fixed windows. Windows are sized
/// `chunk_size - chunk_overlap` so the merge step can seed its overlap tail
/// between them while staying inside the size bound; consecutive hard-cut
/// chunks then share context like any other chunks.
fn hard_cut(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let window = chunk_size.saturating_sub(chunk_overlap).max(1);
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(window)
        .map(|piece| piece.iter().collect())
        .collect()
}

/// Greedily pack fragments into chunks of at most `chunk_size` characters,
/// seeding each new chunk with the tail of the previous one for overlap.
fn merge_fragments(fragments: Vec<String>, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for frag in fragments {
        let frag_len = char_len(&frag);
        let current_len = char_len(&current);

        if current_len > 0 && current_len + frag_len > chunk_size {
            push_chunk(&mut chunks, &current);

            let tail = char_tail(&current, chunk_overlap);
            // Carry the overlap only when the next fragment still fits after it.
            current = if char_len(tail) + frag_len <= chunk_size {
                tail.to_string()
            } else {
                String::new()
            };
        }

        current.push_str(&frag);
    }

    push_chunk(&mut chunks, &current);
    chunks
}

fn push_chunk(chunks: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Last `n` characters of `text`, on a character boundary.
fn char_tail(text: &str, n: usize) -> &str {
    let len = char_len(text);
    if n == 0 {
        return "";
    }
    if n >= len {
        return text;
    }
    let start = text
        .char_indices()
        .nth(len - n)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &text[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample_text() -> String {
        (1..=40)
            .map(|i| format!("Sentence number {} talks about aspirin and fever. ", i))
            .collect::<String>()
    }

    #[test]
    fn short_text_yields_a_single_chunk() {
        let chunks = split_text("Aspirin is used to reduce fever and pain.", 500, 20);
        assert_eq!(chunks, vec!["Aspirin is used to reduce fever and pain."]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split_text("", 500, 20).is_empty());
        assert!(split_text("   \n\n  ", 500, 20).is_empty());
    }

    #[test]
    fn chunks_respect_the_size_bound() {
        let chunks = split_text(&sample_text(), 500, 20);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                chunk.chars().count() <= 500,
                "chunk exceeds bound: {} chars",
                chunk.chars().count()
            );
        }
    }

    #[test]
    fn oversized_token_falls_back_to_hard_cut() {
        let token = "x".repeat(1200);
        let chunks = split_text(&token, 500, 0);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 500);
        assert_eq!(chunks[2].len(), 200);
    }

    #[test]
    fn hard_cut_chunks_still_share_overlap() {
        let token: String = (0u32..1200)
            .map(|i| char::from(b'a' + (i % 26) as u8))
            .collect();
        let chunks = split_text(&token, 500, 20);

        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 500);
        }
        for pair in chunks.windows(2) {
            let tail: String = pair[0]
                .chars()
                .skip(pair[0].chars().count() - 20)
                .collect();
            assert!(
                pair[1].starts_with(&tail),
                "hard-cut chunks lost their overlap: {:?} then {:?}",
                tail,
                &pair[1][..20]
            );
        }
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let chunks = split_text(&sample_text(), 120, 40);
        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            let first_word = pair[1].split_whitespace().next().unwrap();
            assert!(
                pair[0].contains(first_word),
                "no shared context between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn no_text_is_lost_without_overlap() {
        let text = "First paragraph about fever.\n\nSecond paragraph about pain. \
                    Third sentence is a bit longer and talks about dosage. \
                    Fourth sentence closes the document.";
        let chunks = split_text(text, 60, 0);

        let original: Vec<&str> = text.split_whitespace().collect();
        let rejoined: Vec<String> = chunks
            .iter()
            .flat_map(|c| c.split_whitespace().map(String::from))
            .collect();
        assert_eq!(original, rejoined);
    }

    #[test]
    fn chunks_inherit_the_document_source() {
        let doc = Document {
            content: sample_text(),
            metadata: HashMap::from([("source".to_string(), "data/medical.pdf".to_string())]),
        };
        let chunks = split_documents(&[doc], 200, 20);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.source == "data/medical.pdf"));
    }

    #[test]
    fn documents_without_source_use_unknown() {
        let doc = Document {
            content: "short".to_string(),
            metadata: HashMap::new(),
        };
        let chunks = split_documents(&[doc], 500, 20);
        assert_eq!(chunks[0].source, "unknown");
    }
}
