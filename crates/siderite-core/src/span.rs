//! Source locations.

use rowan::TextRange;

use crate::source_map::SourceId;

/// A location in a compilation source: which source, and the byte range
/// within it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct Span {
    pub source: SourceId,
    pub range: TextRange,
}

impl Span {
    pub fn new(source: SourceId, range: TextRange) -> Self {
        Self { source, range }
    }

    /// A span over `start..end` byte offsets of the given source.
    pub fn of(source: SourceId, start: u32, end: u32) -> Self {
        Self {
            source,
            range: TextRange::new(start.into(), end.into()),
        }
    }

    /// A zero-width span at the start of the given source. Used for
    /// synthesised symbols that have no surface syntax.
    pub fn synthetic(source: SourceId) -> Self {
        Self {
            source,
            range: TextRange::empty(0.into()),
        }
    }

    /// The smallest span covering both `self` and `other`.
    ///
    /// Both spans must address the same source.
    pub fn cover(self, other: Span) -> Span {
        debug_assert_eq!(self.source, other.source, "cover across sources");
        Span {
            source: self.source,
            range: self.range.cover(other.range),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cover_expands_both_ways() {
        let src = SourceId::default();
        let a = Span::of(src, 4, 8);
        let b = Span::of(src, 10, 12);

        let c = a.cover(b);
        assert_eq!(c, Span::of(src, 4, 12));
        assert_eq!(b.cover(a), c);
    }

    #[test]
    fn synthetic_is_empty() {
        let span = Span::synthetic(SourceId::default());
        assert!(span.range.is_empty());
    }
}
