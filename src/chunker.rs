//! Fixed-size overlapping text chunking for embedding.
//!
//! The extracted text of a whole upload batch is aggregated and split into
//! segments of roughly [`CHUNK_TARGET`] characters with [`CHUNK_OVERLAP`]
//! characters carried between adjacent chunks. Splitting prefers paragraph
//! boundaries, then sentence boundaries, and only falls back to a hard
//! character split for pathological single sentences.

use crate::error::ApiError;
use crate::protocol::ChunkRecord;
use crate::roles::Role;

/// Target chunk size in characters.
pub const CHUNK_TARGET: usize = 1200;

/// Overlap carried from the tail of one chunk into the next.
pub const CHUNK_OVERLAP: usize = 50;

/// Chunk the aggregated text of an upload batch. Fails when no text at all
/// survives extraction (empty or fully unsupported input).
pub fn chunk_batch(
    texts: &[String],
    batch_label: &str,
    role: Role,
) -> Result<Vec<ChunkRecord>, ApiError> {
    let aggregated = texts
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    let pieces = split_text(&aggregated, CHUNK_TARGET, CHUNK_OVERLAP);
    if pieces.is_empty() {
        return Err(ApiError::Validation(
            "No text could be extracted from the provided files".into(),
        ));
    }

    Ok(pieces
        .into_iter()
        .enumerate()
        .map(|(i, text)| ChunkRecord {
            text,
            source: format!("{}-{}", i, batch_label),
            role,
            chunk_index: i,
        })
        .collect())
}

/// Split `text` into chunks of at most `target + overlap` characters,
/// preferring paragraph and sentence boundaries. Deterministic.
pub fn split_text(text: &str, target: usize, overlap: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    // Break the input into units no longer than the target.
    let mut units: Vec<String> = Vec::new();
    for para in text.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }
        if para.chars().count() <= target {
            units.push(para.to_string());
            continue;
        }
        for sentence in split_into_sentences(para) {
            if sentence.chars().count() <= target {
                units.push(sentence);
            } else {
                units.extend(hard_split(&sentence, target));
            }
        }
    }

    // Pack units into chunks, seeding each new chunk with the overlap tail
    // of the previous one.
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    for unit in units {
        let unit_len = unit.chars().count();
        if !current.is_empty() && current.chars().count() + 1 + unit_len > target {
            let tail = overlap_tail(&current, overlap);
            chunks.push(std::mem::take(&mut current));
            current = tail;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&unit);
    }
    if !current.trim().is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Split text into sentences at terminal punctuation followed by whitespace,
/// and at newlines.
pub fn split_into_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if c == '.' || c == '!' || c == '?' {
            if chars.peek().map_or(true, |&next| next.is_whitespace()) {
                if !current.trim().is_empty() {
                    sentences.push(current.trim().to_string());
                }
                current.clear();
            }
        } else if c == '\n' {
            if !current.trim().is_empty() {
                sentences.push(current.trim().to_string());
            }
            current.clear();
        }
    }

    if !current.trim().is_empty() {
        sentences.push(current.trim().to_string());
    }
    sentences
}

/// Last resort: split an oversized sentence into fixed character windows.
fn hard_split(text: &str, target: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(target)
        .map(|w| w.iter().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// The last `overlap` characters of a chunk, trimmed forward to a word
/// boundary so the seed never starts mid-word.
fn overlap_tail(chunk: &str, overlap: usize) -> String {
    if overlap == 0 {
        return String::new();
    }
    let chars: Vec<char> = chunk.chars().collect();
    if chars.len() <= overlap {
        return chunk.trim().to_string();
    }
    let tail: String = chars[chars.len() - overlap..].iter().collect();
    match tail.find(char::is_whitespace) {
        Some(pos) => tail[pos..].trim().to_string(),
        None => String::new(),
    }
}
