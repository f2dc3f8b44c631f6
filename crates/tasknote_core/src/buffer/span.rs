//! Contiguous text region held by a pair of stable markers.

use crate::buffer::marker::{Gravity, MarkerId, MarkerTable};
use std::ops::Range;

/// Region bounded by two markers.
///
/// The start marker has left gravity and the end marker right gravity, so
/// text inserted at either boundary becomes part of the span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    start: MarkerId,
    end: MarkerId,
}

impl Span {
    pub fn new(markers: &mut MarkerTable, range: Range<usize>) -> Self {
        Self {
            start: markers.create(range.start, Gravity::Left),
            end: markers.create(range.end.max(range.start), Gravity::Right),
        }
    }

    /// Current range, or `None` once either marker has been released.
    pub fn range(&self, markers: &MarkerTable) -> Option<Range<usize>> {
        let start = markers.position(self.start)?;
        let end = markers.position(self.end)?;
        Some(start..end.max(start))
    }

    pub fn start(&self) -> MarkerId {
        self.start
    }

    pub fn end(&self) -> MarkerId {
        self.end
    }

    /// Drops both markers from the table.
    pub fn release(self, markers: &mut MarkerTable) {
        markers.remove(self.start);
        markers.remove(self.end);
    }
}

#[cfg(test)]
mod tests {
    use super::Span;
    use crate::buffer::marker::MarkerTable;

    #[test]
    fn span_grows_with_insertions_at_both_edges() {
        let mut markers = MarkerTable::new();
        let span = Span::new(&mut markers, 2..5);

        markers.shift_for_insert(5, 2);
        markers.shift_for_insert(2, 1);

        assert_eq!(span.range(&markers), Some(2..8));
    }

    #[test]
    fn released_span_has_no_range() {
        let mut markers = MarkerTable::new();
        let span = Span::new(&mut markers, 0..1);
        span.release(&mut markers);
        assert_eq!(span.range(&markers), None);
        assert!(markers.is_empty());
    }
}
