//! Deterministic chunking of text into overlapping windows
//!
//! Pure, side-effect-free: re-running over the same input and parameters
//! always yields identical chunk boundaries. Retrieval quality and the test
//! suite both depend on that.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::domain::DomainError;

/// Configuration for chunking
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Window size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Overlap between consecutive windows in characters
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

fn default_chunk_size() -> usize {
    1200
}

fn default_overlap() -> usize {
    150
}

impl ChunkingConfig {
    /// Create a new chunking configuration
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }

    /// Validate the configuration: `0 < overlap < chunk_size`
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.chunk_size == 0 {
            return Err(DomainError::invalid_argument(
                "chunk_size must be greater than 0",
            ));
        }

        if self.overlap == 0 {
            return Err(DomainError::invalid_argument(
                "overlap must be greater than 0",
            ));
        }

        if self.overlap >= self.chunk_size {
            return Err(DomainError::invalid_argument(
                "overlap must be less than chunk_size",
            ));
        }

        Ok(())
    }

    /// Distance in characters between consecutive window starts
    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

/// A contiguous text window derived from a source document
///
/// Consecutive windows overlap by exactly `overlap` characters; only the
/// final window may be shorter than `chunk_size` and carries no trailing
/// overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Window text
    pub content: String,
    /// Sequence index within the source document (0-based)
    pub index: usize,
    /// Character offset where this window starts
    pub char_start: usize,
    /// Window length in characters
    pub char_len: usize,
}

/// Separator classes in preference order
///
/// Each window is filled by greedily packing whole units of the strongest
/// class that still fits; a unit crossing the window end is split with the
/// next class down. `Character` always fits, so every window except the
/// last is filled to exactly `chunk_size` characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeparatorClass {
    /// Paragraph breaks (`\n\n`)
    Paragraph,
    /// Line breaks
    Line,
    /// Sentence-ending punctuation (UAX#29 sentence boundaries)
    Sentence,
    /// Plain whitespace
    Word,
    /// Raw character boundaries
    Character,
}

impl SeparatorClass {
    fn next(self) -> Option<Self> {
        match self {
            Self::Paragraph => Some(Self::Line),
            Self::Line => Some(Self::Sentence),
            Self::Sentence => Some(Self::Word),
            Self::Word => Some(Self::Character),
            Self::Character => None,
        }
    }

    /// Split text into units, each keeping its trailing separator so that
    /// the units partition the input exactly.
    fn split<'a>(self, text: &'a str) -> Box<dyn Iterator<Item = &'a str> + 'a> {
        match self {
            Self::Paragraph => Box::new(text.split_inclusive("\n\n")),
            Self::Line => Box::new(text.split_inclusive('\n')),
            Self::Sentence => Box::new(text.unicode_sentences()),
            Self::Word => Box::new(text.split_inclusive(char::is_whitespace)),
            Self::Character => unreachable!("Character class is packed directly"),
        }
    }
}

/// Pack units from `text` into `out` until `budget` characters are consumed
/// or the text ends. Returns the number of characters consumed, which is
/// always `min(budget, chars(text))`.
fn pack_units(text: &str, budget: usize, class: SeparatorClass, out: &mut String) -> usize {
    if budget == 0 || text.is_empty() {
        return 0;
    }

    if class == SeparatorClass::Character {
        let mut taken = 0;
        for ch in text.chars().take(budget) {
            out.push(ch);
            taken += 1;
        }
        return taken;
    }

    let mut consumed = 0;

    for unit in class.split(text) {
        let unit_chars = unit.chars().count();

        if unit_chars <= budget - consumed {
            out.push_str(unit);
            consumed += unit_chars;

            if consumed == budget {
                break;
            }
        } else {
            // The unit crosses the window end: split it with the next class
            // down. That fills the remaining budget exactly.
            let next = class.next().expect("only Character has no fallback");
            consumed += pack_units(unit, budget - consumed, next, out);
            break;
        }
    }

    consumed
}

/// Split `text` into overlapping windows
///
/// Window `i` starts at character offset `i * (chunk_size - overlap)`, so
/// consecutive windows overlap by exactly `overlap` characters. Empty input
/// yields an empty sequence; input no longer than `chunk_size` yields a
/// single window spanning the whole input.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<TextChunk>, DomainError> {
    config.validate()?;

    if text.is_empty() {
        return Ok(Vec::new());
    }

    let total_chars = text.chars().count();

    if total_chars <= config.chunk_size {
        return Ok(vec![TextChunk {
            content: text.to_string(),
            index: 0,
            char_start: 0,
            char_len: total_chars,
        }]);
    }

    // Byte offset of every character position (plus the end sentinel) so
    // windows can start at arbitrary character offsets without re-scanning.
    let mut byte_at: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    byte_at.push(text.len());

    let stride = config.stride();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let budget = config.chunk_size.min(total_chars - start);
        let mut content = String::with_capacity(budget);

        let consumed = pack_units(
            &text[byte_at[start]..],
            budget,
            SeparatorClass::Paragraph,
            &mut content,
        );
        debug_assert_eq!(consumed, budget);

        chunks.push(TextChunk {
            content,
            index: chunks.len(),
            char_start: start,
            char_len: consumed,
        });

        if start + budget >= total_chars {
            break;
        }

        start += stride;
    }

    Ok(chunks)
}
