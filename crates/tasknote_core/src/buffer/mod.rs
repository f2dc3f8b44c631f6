//! Tagged text buffer standing in for the host editor buffer.
//!
//! # Responsibility
//! - Store note text with per-character tag sets.
//! - Keep markers stable across edits.
//! - Report raw insert/delete events and user-action boundaries.
//! - Journal the last user action so it can be reverted.
//!
//! # Invariants
//! - Positions are character offsets; out-of-range inputs are clamped.
//! - Text inserted by `insert` inherits the structural tags of the character
//!   before it, unless that character is a newline.
//! - Edits made inside a user action are journaled. Edits made while the
//!   last action is being amended join that action; any other edit outside
//!   a user action discards the journal, since its positions would be stale.

pub mod marker;
pub mod snapshot;
pub mod span;
pub mod tag;

use marker::{Gravity, MarkerId, MarkerTable};
use std::ops::Range;
use tag::{Tag, TagClass, TagId, TagKind, TagTable};

/// Checkbox marker leading every task line (object replacement character).
pub const CHECKBOX: char = '\u{FFFC}';

/// One character and the tags applied to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedChar {
    pub ch: char,
    pub tags: Vec<TagId>,
}

/// Raw edit notification, delivered in edit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditEvent {
    Inserted { pos: usize, len: usize },
    Deleted { pos: usize, removed: Vec<TaggedChar> },
    UserActionEnded,
}

#[derive(Debug, Clone)]
enum JournalEntry {
    Inserted { pos: usize, len: usize },
    Deleted { pos: usize, chars: Vec<TaggedChar> },
    /// Tag sets of `pos..pos + before.len()` prior to a tag change.
    Retagged { pos: usize, before: Vec<Vec<TagId>> },
}

/// In-memory rich-text buffer.
#[derive(Debug, Default)]
pub struct TextBuffer {
    chars: Vec<TaggedChar>,
    tags: TagTable,
    markers: MarkerTable,
    events: Vec<EditEvent>,
    action_depth: u32,
    journal: Vec<JournalEntry>,
    last_action: Vec<JournalEntry>,
    last_action_open: bool,
    amending: bool,
    replaying: bool,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an untagged buffer holding `text`.
    pub fn from_text(text: &str) -> Self {
        let mut buffer = Self::new();
        buffer.chars = text
            .chars()
            .map(|ch| TaggedChar {
                ch,
                tags: Vec::new(),
            })
            .collect();
        buffer
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn text(&self) -> String {
        self.chars.iter().map(|cell| cell.ch).collect()
    }

    pub fn slice(&self, range: Range<usize>) -> String {
        let range = self.clamp_range(range);
        self.chars[range].iter().map(|cell| cell.ch).collect()
    }

    pub fn char_at(&self, pos: usize) -> Option<char> {
        self.chars.get(pos).map(|cell| cell.ch)
    }

    pub fn tags_at(&self, pos: usize) -> &[TagId] {
        self.chars
            .get(pos)
            .map(|cell| cell.tags.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_tag(&self, pos: usize, tag: TagId) -> bool {
        self.tags_at(pos).contains(&tag)
    }

    pub(crate) fn cells(&self) -> &[TaggedChar] {
        &self.chars
    }

    // ---- lines ----

    /// Offset of the first character of the line containing `pos`.
    pub fn line_start(&self, pos: usize) -> usize {
        let pos = pos.min(self.len());
        self.chars[..pos]
            .iter()
            .rposition(|cell| cell.ch == '\n')
            .map(|idx| idx + 1)
            .unwrap_or(0)
    }

    /// Offset of the newline ending the line containing `pos`, or the buffer
    /// length for the last line.
    pub fn line_end(&self, pos: usize) -> usize {
        let pos = pos.min(self.len());
        self.chars[pos..]
            .iter()
            .position(|cell| cell.ch == '\n')
            .map(|idx| pos + idx)
            .unwrap_or(self.len())
    }

    /// Zero-based line number of `pos`.
    pub fn line_at(&self, pos: usize) -> usize {
        let pos = pos.min(self.len());
        self.chars[..pos].iter().filter(|cell| cell.ch == '\n').count()
    }

    pub fn line_count(&self) -> usize {
        self.chars.iter().filter(|cell| cell.ch == '\n').count() + 1
    }

    // ---- edits ----

    /// Inserts `text`, inheriting the structural tags of the previous char.
    pub fn insert(&mut self, pos: usize, text: &str) -> Range<usize> {
        let pos = pos.min(self.len());
        let tags = self.inherited_tags(pos);
        self.insert_with_tags(pos, text, &tags)
    }

    /// Inserts `text` with exactly `tags` applied.
    pub fn insert_with_tags(&mut self, pos: usize, text: &str, tags: &[TagId]) -> Range<usize> {
        let pos = pos.min(self.len());
        let cells = text
            .chars()
            .map(|ch| TaggedChar {
                ch,
                tags: tags.to_vec(),
            })
            .collect();
        self.insert_cells(pos, cells)
    }

    /// Removes `range`, returning the removed characters with their tags.
    pub fn delete(&mut self, range: Range<usize>) -> Vec<TaggedChar> {
        let range = self.clamp_range(range);
        if range.is_empty() {
            return Vec::new();
        }
        let removed: Vec<TaggedChar> = self.chars.drain(range.clone()).collect();
        self.markers.shift_for_delete(range.clone());
        self.record(JournalEntry::Deleted {
            pos: range.start,
            chars: removed.clone(),
        });
        self.events.push(EditEvent::Deleted {
            pos: range.start,
            removed: removed.clone(),
        });
        removed
    }

    fn insert_cells(&mut self, pos: usize, cells: Vec<TaggedChar>) -> Range<usize> {
        let len = cells.len();
        if len == 0 {
            return pos..pos;
        }
        let tail = self.chars.split_off(pos);
        self.chars.extend(cells);
        self.chars.extend(tail);
        self.markers.shift_for_insert(pos, len);
        self.record(JournalEntry::Inserted { pos, len });
        self.events.push(EditEvent::Inserted { pos, len });
        pos..pos + len
    }

    fn record(&mut self, entry: JournalEntry) {
        if self.replaying {
            return;
        }
        if self.action_depth > 0 {
            self.journal.push(entry);
        } else if self.amending && self.last_action_open {
            self.last_action.push(entry);
        } else if self.last_action_open || !self.last_action.is_empty() {
            self.last_action.clear();
            self.last_action_open = false;
        }
    }

    fn inherited_tags(&self, pos: usize) -> Vec<TagId> {
        if pos == 0 {
            return Vec::new();
        }
        let previous = &self.chars[pos - 1];
        if previous.ch == '\n' {
            return Vec::new();
        }
        previous
            .tags
            .iter()
            .copied()
            .filter(|tag| self.tags.class_of(*tag) != Some(TagClass::Attributed))
            .collect()
    }

    // ---- user actions ----

    pub fn begin_user_action(&mut self) {
        if self.action_depth == 0 {
            self.journal.clear();
        }
        self.action_depth += 1;
    }

    /// Closes one nesting level. Returns `true` when the outermost action ended.
    pub fn end_user_action(&mut self) -> bool {
        if self.action_depth == 0 {
            return false;
        }
        self.action_depth -= 1;
        if self.action_depth > 0 {
            return false;
        }
        self.last_action = std::mem::take(&mut self.journal);
        self.last_action_open = true;
        self.events.push(EditEvent::UserActionEnded);
        true
    }

    pub fn in_user_action(&self) -> bool {
        self.action_depth > 0
    }

    /// Reverts the last completed user action. Returns `false` when there is
    /// nothing to revert.
    pub fn undo_last_action(&mut self) -> bool {
        let entries = std::mem::take(&mut self.last_action);
        self.last_action_open = false;
        if entries.is_empty() {
            return false;
        }
        self.replaying = true;
        for entry in entries.into_iter().rev() {
            match entry {
                JournalEntry::Inserted { pos, len } => {
                    self.delete(pos..pos + len);
                }
                JournalEntry::Deleted { pos, chars } => {
                    self.insert_cells(pos, chars);
                }
                JournalEntry::Retagged { pos, before } => {
                    for (cell, tags) in self.chars.iter_mut().skip(pos).zip(before) {
                        cell.tags = tags;
                    }
                }
            }
        }
        self.replaying = false;
        true
    }

    /// Until `end_amend`, edits outside user actions are journaled into the
    /// last completed action, so undoing it also reverts them.
    pub(crate) fn begin_amend(&mut self) {
        self.amending = true;
    }

    pub(crate) fn end_amend(&mut self) {
        self.amending = false;
    }

    /// Drains edit events reported since the previous call.
    pub fn take_events(&mut self) -> Vec<EditEvent> {
        std::mem::take(&mut self.events)
    }

    // ---- tags ----

    pub fn create_tag(&mut self, kind: TagKind) -> TagId {
        self.tags.create(kind)
    }

    pub fn tag(&self, id: TagId) -> Option<&Tag> {
        self.tags.get(id)
    }

    pub fn tag_mut(&mut self, id: TagId) -> Option<&mut Tag> {
        self.tags.get_mut(id)
    }

    pub fn tag_table(&self) -> &TagTable {
        &self.tags
    }

    pub(crate) fn tag_table_mut(&mut self) -> &mut TagTable {
        &mut self.tags
    }

    pub fn apply_tag(&mut self, tag: TagId, range: Range<usize>) {
        let range = self.clamp_range(range);
        if self.chars[range.clone()].iter().all(|cell| cell.tags.contains(&tag)) {
            return;
        }
        self.record_retag(range.clone());
        for cell in &mut self.chars[range] {
            if !cell.tags.contains(&tag) {
                cell.tags.push(tag);
            }
        }
    }

    pub fn remove_tag(&mut self, tag: TagId, range: Range<usize>) {
        let range = self.clamp_range(range);
        if !self.chars[range.clone()].iter().any(|cell| cell.tags.contains(&tag)) {
            return;
        }
        self.record_retag(range.clone());
        for cell in &mut self.chars[range] {
            cell.tags.retain(|current| *current != tag);
        }
    }

    fn record_retag(&mut self, range: Range<usize>) {
        let before = self.chars[range.clone()]
            .iter()
            .map(|cell| cell.tags.clone())
            .collect();
        self.record(JournalEntry::Retagged {
            pos: range.start,
            before,
        });
    }

    /// Removes the tag from all text and from the tag table.
    pub fn drop_tag(&mut self, tag: TagId) -> Option<Tag> {
        let len = self.len();
        self.remove_tag(tag, 0..len);
        self.tags.remove(tag)
    }

    // ---- markers ----

    pub fn create_marker(&mut self, pos: usize, gravity: Gravity) -> MarkerId {
        let pos = pos.min(self.len());
        self.markers.create(pos, gravity)
    }

    pub fn marker_position(&self, id: MarkerId) -> Option<usize> {
        self.markers.position(id)
    }

    pub fn move_marker(&mut self, id: MarkerId, pos: usize) -> bool {
        let pos = pos.min(self.len());
        self.markers.set_position(id, pos)
    }

    pub fn delete_marker(&mut self, id: MarkerId) -> bool {
        self.markers.remove(id)
    }

    pub fn markers(&self) -> &MarkerTable {
        &self.markers
    }

    pub fn markers_mut(&mut self) -> &mut MarkerTable {
        &mut self.markers
    }

    fn clamp_range(&self, range: Range<usize>) -> Range<usize> {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        start..end
    }
}

#[cfg(test)]
mod tests {
    use super::{EditEvent, TextBuffer};
    use crate::buffer::marker::Gravity;
    use crate::buffer::tag::{AttributedTag, TagKind, TaskListTag};

    #[test]
    fn line_navigation_uses_newlines() {
        let buffer = TextBuffer::from_text("ab\ncd\n\nef");
        assert_eq!(buffer.line_start(4), 3);
        assert_eq!(buffer.line_end(4), 5);
        assert_eq!(buffer.line_end(8), 9);
        assert_eq!(buffer.line_at(7), 3);
        assert_eq!(buffer.line_count(), 4);
        assert_eq!(buffer.line_start(6), 6);
        assert_eq!(buffer.line_end(6), 6);
    }

    #[test]
    fn insert_inherits_structural_tags_but_not_decorations() {
        let mut buffer = TextBuffer::from_text("list\nnext");
        let list = buffer.create_tag(TagKind::TaskList(TaskListTag::default()));
        let decoration = buffer.create_tag(TagKind::Attributed(AttributedTag {
            owner: list,
            attributes: Default::default(),
        }));
        buffer.apply_tag(list, 0..5);
        buffer.apply_tag(decoration, 3..4);

        buffer.insert(4, "s");
        assert_eq!(buffer.tags_at(4), &[list]);

        buffer.insert(6, "x");
        assert!(buffer.tags_at(6).is_empty(), "newline boundary stops inheritance");
    }

    #[test]
    fn undo_reverts_the_last_user_action_with_tags() {
        let mut buffer = TextBuffer::from_text("hello world");
        let list = buffer.create_tag(TagKind::TaskList(TaskListTag::default()));
        buffer.apply_tag(list, 0..5);

        buffer.begin_user_action();
        buffer.delete(0..6);
        buffer.insert(0, "big ");
        assert!(buffer.end_user_action());

        assert_eq!(buffer.text(), "big world");
        assert!(buffer.undo_last_action());
        assert_eq!(buffer.text(), "hello world");
        assert!(buffer.has_tag(0, list));
        assert!(!buffer.undo_last_action());
    }

    #[test]
    fn events_report_edits_and_action_end() {
        let mut buffer = TextBuffer::from_text("abc");
        let marker = buffer.create_marker(2, Gravity::Right);
        buffer.begin_user_action();
        buffer.insert(1, "xy");
        buffer.delete(0..1);
        buffer.end_user_action();

        let events = buffer.take_events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], EditEvent::Inserted { pos: 1, len: 2 });
        assert!(matches!(events[1], EditEvent::Deleted { pos: 0, .. }));
        assert_eq!(events[2], EditEvent::UserActionEnded);
        assert_eq!(buffer.marker_position(marker), Some(3));
        assert!(buffer.take_events().is_empty());
    }

    #[test]
    fn nested_user_actions_close_once() {
        let mut buffer = TextBuffer::new();
        buffer.begin_user_action();
        buffer.begin_user_action();
        assert!(!buffer.end_user_action());
        assert!(buffer.in_user_action());
        assert!(buffer.end_user_action());
        assert!(!buffer.end_user_action());
    }

    #[test]
    fn amended_edits_are_undone_with_the_action() {
        let mut buffer = TextBuffer::from_text("ab");
        let list = buffer.create_tag(TagKind::TaskList(TaskListTag::default()));
        buffer.begin_user_action();
        buffer.insert(2, "c");
        buffer.end_user_action();

        buffer.begin_amend();
        buffer.apply_tag(list, 0..3);
        buffer.insert(0, "x");
        buffer.end_amend();
        assert_eq!(buffer.text(), "xabc");

        assert!(buffer.undo_last_action());
        assert_eq!(buffer.text(), "ab");
        assert!(!buffer.has_tag(0, list));
        assert!(!buffer.has_tag(1, list));
    }

    #[test]
    fn edits_outside_an_action_discard_the_journal() {
        let mut buffer = TextBuffer::from_text("ab");
        buffer.begin_user_action();
        buffer.insert(2, "c");
        buffer.end_user_action();

        buffer.insert(0, "x");
        assert!(!buffer.undo_last_action());
        assert_eq!(buffer.text(), "xabc");
    }

    #[test]
    fn drop_tag_clears_text_and_table() {
        let mut buffer = TextBuffer::from_text("abc");
        let list = buffer.create_tag(TagKind::TaskList(TaskListTag::default()));
        buffer.apply_tag(list, 0..3);
        assert!(buffer.drop_tag(list).is_some());
        assert!(buffer.tags_at(1).is_empty());
        assert!(buffer.tag(list).is_none());
    }
}
