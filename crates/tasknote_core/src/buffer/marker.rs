//! Stable logical positions inside a text buffer.
//!
//! # Responsibility
//! - Track positions that survive insertions and deletions elsewhere.
//!
//! # Invariants
//! - A marker position never exceeds the buffer length it tracks.
//! - An insertion exactly at a marker moves it only for `Gravity::Right`.
//! - A deletion covering a marker collapses it onto the deletion start.

use std::collections::HashMap;
use std::ops::Range;

/// Opaque marker handle. Never reused within one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerId(u64);

/// Which side of an insertion at the marker position the marker sticks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gravity {
    /// Stays before text inserted at its position.
    Left,
    /// Moves after text inserted at its position.
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Marker {
    pos: usize,
    gravity: Gravity,
}

/// Marker storage owned by one buffer.
#[derive(Debug, Default)]
pub struct MarkerTable {
    next_id: u64,
    markers: HashMap<MarkerId, Marker>,
}

impl MarkerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, pos: usize, gravity: Gravity) -> MarkerId {
        let id = MarkerId(self.next_id);
        self.next_id += 1;
        self.markers.insert(id, Marker { pos, gravity });
        id
    }

    pub fn position(&self, id: MarkerId) -> Option<usize> {
        self.markers.get(&id).map(|marker| marker.pos)
    }

    /// Moves a live marker. Returns `false` for unknown markers.
    pub fn set_position(&mut self, id: MarkerId, pos: usize) -> bool {
        match self.markers.get_mut(&id) {
            Some(marker) => {
                marker.pos = pos;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: MarkerId) -> bool {
        self.markers.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub(crate) fn shift_for_insert(&mut self, pos: usize, len: usize) {
        if len == 0 {
            return;
        }
        for marker in self.markers.values_mut() {
            let moves = marker.pos > pos || (marker.pos == pos && marker.gravity == Gravity::Right);
            if moves {
                marker.pos += len;
            }
        }
    }

    pub(crate) fn shift_for_delete(&mut self, range: Range<usize>) {
        let removed = range.end.saturating_sub(range.start);
        if removed == 0 {
            return;
        }
        for marker in self.markers.values_mut() {
            if marker.pos >= range.end {
                marker.pos -= removed;
            } else if marker.pos > range.start {
                marker.pos = range.start;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Gravity, MarkerTable};

    #[test]
    fn gravity_decides_insert_at_marker() {
        let mut table = MarkerTable::new();
        let left = table.create(4, Gravity::Left);
        let right = table.create(4, Gravity::Right);

        table.shift_for_insert(4, 3);

        assert_eq!(table.position(left), Some(4));
        assert_eq!(table.position(right), Some(7));
    }

    #[test]
    fn delete_collapses_covered_markers() {
        let mut table = MarkerTable::new();
        let before = table.create(1, Gravity::Right);
        let inside = table.create(5, Gravity::Right);
        let after = table.create(10, Gravity::Left);

        table.shift_for_delete(3..8);

        assert_eq!(table.position(before), Some(1));
        assert_eq!(table.position(inside), Some(3));
        assert_eq!(table.position(after), Some(5));
    }

    #[test]
    fn removed_marker_has_no_position() {
        let mut table = MarkerTable::new();
        let id = table.create(0, Gravity::Left);
        assert!(table.remove(id));
        assert_eq!(table.position(id), None);
        assert!(!table.set_position(id, 2));
        assert!(table.is_empty());
    }
}
