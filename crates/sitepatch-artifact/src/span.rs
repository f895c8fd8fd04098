//! Byte spans for addressing regions within artifact text
//!
//! Provides [`Span`], the half-open `[start, end)` byte range every block,
//! anchor and fingerprint match is expressed in.

use std::fmt::{self, Display, Formatter};
use std::ops::Range;

/// Half-open byte range within an artifact's text
///
/// Offsets always fall on UTF-8 character boundaries because every span is
/// produced by a match against the text itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct Span {
    start: usize,
    end: usize,
}

impl Span {
    /// Create new span
    ///
    /// # Errors
    /// Returns error if `end < start`
    #[inline]
    pub fn new(start: usize, end: usize) -> Result<Self, SpanError> {
        if end < start {
            return Err(SpanError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// Span covering a regex or `str::find` match range
    #[inline]
    #[must_use]
    pub fn from_range(range: Range<usize>) -> Self {
        let end = range.end.max(range.start);
        Self {
            start: range.start,
            end,
        }
    }

    /// Empty span at a single offset
    #[inline]
    #[must_use]
    pub fn point(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    /// Start offset (inclusive)
    #[inline]
    #[must_use]
    pub fn start(&self) -> usize {
        self.start
    }

    /// End offset (exclusive)
    #[inline]
    #[must_use]
    pub fn end(&self) -> usize {
        self.end
    }

    /// Length in bytes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if span is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check if this span fully contains another
    #[inline]
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Check if spans share at least one byte
    #[inline]
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Gap in bytes between two spans (zero when they touch or overlap)
    #[inline]
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> usize {
        if self.end <= other.start {
            other.start - self.end
        } else if other.end <= self.start {
            self.start - other.end
        } else {
            0
        }
    }

    /// Extend the end offset, returning new span
    #[inline]
    #[must_use]
    pub fn with_end(&self, end: usize) -> Self {
        Self {
            start: self.start,
            end: end.max(self.start),
        }
    }

    /// Borrow the covered text
    ///
    /// # Panics
    /// Panics if the span does not lie on character boundaries of `text`.
    #[inline]
    #[must_use]
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }

    /// Range form for `String::replace_range`
    #[inline]
    #[must_use]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Errors related to span construction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpanError {
    /// End offset before start offset
    #[error("inverted span: {start}..{end}")]
    Inverted { start: usize, end: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_rejects_inverted() {
        assert_eq!(
            Span::new(5, 2),
            Err(SpanError::Inverted { start: 5, end: 2 })
        );
        assert!(Span::new(2, 2).unwrap().is_empty());
    }

    #[test]
    fn span_contains_and_overlaps() {
        let outer = Span::from_range(0..10);
        let inner = Span::from_range(2..4);
        let tail = Span::from_range(9..12);
        let after = Span::from_range(10..12);

        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(outer.overlaps(&tail));
        assert!(!outer.overlaps(&after));
    }

    #[test]
    fn span_distance() {
        let a = Span::from_range(0..4);
        let b = Span::from_range(10..12);
        assert_eq!(a.distance_to(&b), 6);
        assert_eq!(b.distance_to(&a), 6);
        assert_eq!(a.distance_to(&Span::from_range(2..3)), 0);
    }

    #[test]
    fn span_slice() {
        let text = "<!-- A -->body";
        let span = Span::from_range(10..14);
        assert_eq!(span.slice(text), "body");
        assert_eq!(span.to_string(), "10..14");
    }
}
