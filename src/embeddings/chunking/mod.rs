
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::Document;

/// Separators tried in order, coarsest first. The empty separator means fixed-length slicing.
const SEPARATORS: [&str; 8] = ["\n\n", "\n", ".", "!", "?", ",", " ", ""];

/// Recursion limit for the split loop; past this depth text is kept verbatim
const MAX_RECURSION_DEPTH: usize = 5;

/// Configuration for text chunking, measured in characters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters carried from the end of one chunk into the next
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

/// Split a document into chunk documents carrying the parent's metadata.
///
/// A document with empty text comes back unchanged as a single element. Otherwise
/// each chunk gets `chunk_id = "{id}_{i}"` in reading order, even when the text fits
/// into one chunk.
#[inline]
pub fn chunk_document(document: &Document, config: &ChunkingConfig) -> Vec<Document> {
    if document.text.is_empty() {
        return vec![document.clone()];
    }

    let pieces = split_text(&document.text, config.chunk_size, config.chunk_overlap);
    debug!(
        "Split document {} ({} chars) into {} chunks",
        document.id,
        document.text.chars().count(),
        pieces.len()
    );

    pieces
        .into_iter()
        .enumerate()
        .map(|(index, text)| Document {
            text,
            chunk_id: Some(format!("{}_{index}", document.id)),
            ..document.clone()
        })
        .collect()
}

/// Split text into pieces of at most `chunk_size` characters.
///
/// Paragraph breaks are preferred over line breaks, sentence punctuation, commas,
/// spaces and finally fixed-length slicing. Consecutive chunks share up to
/// `chunk_overlap` trailing characters. Text that cannot be split within the
/// recursion limit is returned as one oversized piece.
#[inline]
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    recursive_split(text, chunk_size, chunk_overlap, 0)
}

fn recursive_split(text: &str, chunk_size: usize, chunk_overlap: usize, depth: usize) -> Vec<String> {
    if depth > MAX_RECURSION_DEPTH || chunk_size == 0 {
        return vec![text.to_string()];
    }

    for separator in SEPARATORS {
        let parts = split_on_separator(text, separator, chunk_size, chunk_overlap);
        let chunks = merge_parts(&parts, chunk_size, chunk_overlap);

        if chunks.len() > 1 && chunks.iter().all(|chunk| char_len(chunk) <= chunk_size) {
            return chunks;
        }
    }

    if char_len(text) > chunk_size && depth < MAX_RECURSION_DEPTH {
        return recursive_split(text, chunk_size, chunk_overlap, depth + 1);
    }

    vec![text.to_string()]
}

/// Break text on a separator, keeping the separator attached to the preceding part
fn split_on_separator<'a>(
    text: &'a str,
    separator: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<&'a str> {
    if separator.is_empty() {
        let stride = chunk_size.saturating_sub(chunk_overlap).max(1);
        return char_slices(text, stride);
    }

    text.split_inclusive(separator).collect()
}

/// Fixed-length slices of `stride` characters each
fn char_slices(text: &str, stride: usize) -> Vec<&str> {
    let mut slices = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (offset, _) in text.char_indices() {
        if count == stride {
            slices.push(&text[start..offset]);
            start = offset;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        slices.push(&text[start..]);
    }

    slices
}

/// Greedily pack parts into chunks of at most `chunk_size` characters.
///
/// A chunk is flushed when the next part would overflow it; the new chunk is seeded
/// with the flushed chunk's last `chunk_overlap` characters.
fn merge_parts(parts: &[&str], chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for part in parts {
        let part_len = char_len(part);

        if current_len + part_len > chunk_size {
            if current.is_empty() {
                current.push_str(part);
                current_len = part_len;
            } else {
                let mut next = tail_chars(&current, chunk_overlap).to_string();
                next.push_str(part);
                chunks.push(std::mem::replace(&mut current, next));
                current_len = char_len(&current);
            }
        } else {
            current.push_str(part);
            current_len += part_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// The last `n` characters of `text`, or all of it when shorter
pub(crate) fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((offset, _)) => &text[offset..],
        None => text,
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
