use std::collections::VecDeque;

use super::error::DocumentError;
use super::types::{Chunk, Document};

/// Separators from coarsest to finest. The empty separator splits into characters.
const SEPARATORS: [&str; 7] = ["\n\n", "\n", ". ", "! ", "? ", " ", ""];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitterConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Maximum number of characters shared by adjacent chunks.
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 200,
            chunk_overlap: 50,
        }
    }
}

/// Recursive character splitter with overlap between adjacent chunks.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidSplitterConfig`] if `chunk_size` is zero or
    /// `chunk_overlap` is not smaller than `chunk_size`.
    pub fn new(config: SplitterConfig) -> Result<Self, DocumentError> {
        if config.chunk_size == 0 {
            return Err(DocumentError::InvalidSplitterConfig(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(DocumentError::InvalidSplitterConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> SplitterConfig {
        self.config
    }

    #[must_use]
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let text = &document.content;
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        atomize(text, &SEPARATORS, self.config.chunk_size, &mut pieces);

        merge_pieces(pieces, self.config.chunk_size, self.config.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(i, content)| Chunk {
                content,
                metadata: document.metadata.clone(),
                chunk_index: i,
            })
            .collect()
    }

    #[must_use]
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let chunks: Vec<Chunk> = documents.iter().flat_map(|d| self.split(d)).collect();
        tracing::debug!(
            documents = documents.len(),
            chunks = chunks.len(),
            "documents split"
        );
        chunks
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Break `text` into pieces shorter than `chunk_size`, keeping each separator at
/// the end of the piece it terminates.
fn atomize(text: &str, separators: &[&str], chunk_size: usize, out: &mut Vec<String>) {
    let Some(idx) = separators
        .iter()
        .position(|sep| sep.is_empty() || text.contains(sep))
    else {
        out.push(text.to_owned());
        return;
    };
    let separator = separators[idx];
    let finer = &separators[idx + 1..];

    if separator.is_empty() {
        out.extend(text.chars().map(String::from));
        return;
    }

    for piece in text.split_inclusive(separator) {
        if char_len(piece) < chunk_size || finer.is_empty() {
            out.push(piece.to_owned());
        } else {
            atomize(piece, finer, chunk_size, out);
        }
    }
}

fn tail_chars(s: &str, n: usize) -> String {
    let skip = char_len(s).saturating_sub(n);
    s.chars().skip(skip).collect()
}

/// Greedily stitch pieces into chunks of at most `chunk_size` characters.
///
/// After each emitted chunk the trailing pieces that fit in `chunk_overlap` are
/// carried over. When none fit, the last characters of the emitted chunk are
/// carried instead so adjacent chunks always share text.
fn merge_pieces(pieces: Vec<String>, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut window: VecDeque<String> = VecDeque::new();
    let mut total = 0;
    // Whether the window holds text not yet part of an emitted chunk.
    let mut fresh = false;

    for piece in pieces {
        let blank = piece.trim().is_empty();
        if blank && !fresh {
            continue;
        }
        let len = char_len(&piece);

        if total + len > chunk_size && !window.is_empty() {
            if fresh {
                chunks.push(window.iter().map(String::as_str).collect::<String>().trim().to_owned());
                fresh = false;
            }

            while total > chunk_overlap || (total > 0 && total + len > chunk_size) {
                let Some(front) = window.pop_front() else {
                    break;
                };
                total -= char_len(&front);
            }

            if chunk_overlap > 0 && window.iter().all(|p| p.trim().is_empty()) {
                window.clear();
                total = 0;
                let take = chunk_overlap.min(chunk_size.saturating_sub(len));
                let tail = chunks.last().map(|c| tail_chars(c, take)).unwrap_or_default();
                if !tail.is_empty() {
                    total = char_len(&tail);
                    window.push_back(tail);
                }
            }
        }

        if !blank {
            fresh = true;
        }
        total += len;
        window.push_back(piece);
    }

    if fresh {
        chunks.push(window.iter().map(String::as_str).collect::<String>().trim().to_owned());
    }

    chunks
}
