//! Character spans over the canonical text.
//!
//! All offsets are UTF-16 code units, matching the `index_basis` declared in
//! every elementary assertions document.

use serde::{Deserialize, Serialize};

/// Half-open `[start, end)` span in UTF-16 code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of code units covered.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `other` lies entirely inside this span.
    pub fn contains(&self, other: &Span) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// Smallest span covering both spans.
    pub fn union(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Inclusive-exclusive range of token sequence indices owned by a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenRange {
    pub start: usize,
    pub end: usize,
}

impl TokenRange {
    pub fn contains(&self, i: usize) -> bool {
        i >= self.start && i < self.end
    }
}

/// Slice `text` by a UTF-16 span.
///
/// Returns `None` when the span runs past the end of the text. Lone
/// surrogates at the span edges are replaced rather than rejected.
pub fn utf16_slice(text: &str, span: Span) -> Option<String> {
    let units: Vec<u16> = text.encode_utf16().collect();
    if span.start > span.end || span.end > units.len() {
        return None;
    }
    Some(String::from_utf16_lossy(&units[span.start..span.end]))
}

/// Length of `text` in UTF-16 code units.
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}
