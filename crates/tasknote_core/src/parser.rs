//! Structural parser: tagged regions -> task entities.
//!
//! # Responsibility
//! - Rebuild the entity model of a note from its task/task-list regions.
//! - Reuse the live model when it already matches the buffer's tags.
//!
//! # Invariants
//! - One entity per region, keyed by tag id; parsing never duplicates.
//! - A task is attached to the innermost list region containing its start.
//! - Task regions without an enclosing list or without a checkbox are
//!   logged and skipped.
//! - Cost is linear in the document length.

use crate::buffer::{TextBuffer, CHECKBOX};
use crate::model::document::TaskDocument;
use crate::model::task::TaskListId;
use crate::region::{Region, RegionIndex};
use log::{debug, error, info, warn};

/// Returns the live lists in document order when every task-list region
/// already has an entity, `None` when a rebuild is required.
pub fn try_reuse_existing(doc: &TaskDocument) -> Option<Vec<TaskListId>> {
    let regions = RegionIndex::scan(doc.buffer());
    let mut lists = Vec::with_capacity(regions.task_lists().len());
    for region in regions.task_lists() {
        let id = TaskListId::from_tag(region.tag);
        if doc.list(id).is_none() {
            debug!(
                "event=parse_reuse module=parser status=miss tag={}",
                region.tag
            );
            return None;
        }
        lists.push(id);
    }
    Some(lists)
}

/// Full reconstruction of the entity model from the buffer's tags.
pub fn parse(doc: &mut TaskDocument) -> Vec<TaskListId> {
    let regions = RegionIndex::scan(doc.buffer());
    doc.clear_entities();

    let mut lists = Vec::with_capacity(regions.task_lists().len());
    for region in regions.task_lists() {
        lists.push(doc.create_list_entity(region.tag, region.range.start));
    }

    let mut skipped = 0usize;
    for region in regions.tasks() {
        let Some(list_region) = regions.enclosing_task_list(region.range.start) else {
            error!(
                "event=parse_task module=parser status=orphan_task tag={} start={}",
                region.tag, region.range.start
            );
            skipped += 1;
            continue;
        };
        let Some(checkbox) = checkbox_in(doc.buffer(), region) else {
            warn!(
                "event=parse_task module=parser status=missing_checkbox tag={} start={}",
                region.tag, region.range.start
            );
            skipped += 1;
            continue;
        };
        let list = TaskListId::from_tag(list_region.tag);
        if doc.create_task_entity(region.tag, list, checkbox).is_none() {
            skipped += 1;
        }
    }

    for list in &lists {
        doc.restore_supertasks(*list);
    }

    info!(
        "event=parse module=parser status=ok lists={} tasks={} skipped={}",
        lists.len(),
        doc.graph().task_count(),
        skipped
    );
    lists
}

/// Reuse fast path, falling back to a full parse.
pub fn parse_or_reuse(doc: &mut TaskDocument) -> Vec<TaskListId> {
    match try_reuse_existing(doc) {
        Some(lists) => lists,
        None => parse(doc),
    }
}

/// First checkbox inside `region` that carries the region's tag.
pub(crate) fn checkbox_in(buffer: &TextBuffer, region: &Region) -> Option<usize> {
    region
        .range
        .clone()
        .find(|pos| buffer.char_at(*pos) == Some(CHECKBOX) && buffer.has_tag(*pos, region.tag))
}

#[cfg(test)]
mod tests {
    use super::{parse, parse_or_reuse, try_reuse_existing};
    use crate::buffer::tag::{TagKind, TaskListTag, TaskTag};
    use crate::buffer::{TextBuffer, CHECKBOX};
    use crate::model::document::TaskDocument;

    #[test]
    fn task_without_list_is_skipped() {
        let mut buffer = TextBuffer::from_text(&format!("{CHECKBOX}stray"));
        let task = buffer.create_tag(TagKind::Task(TaskTag::default()));
        buffer.apply_tag(task, 0..6);
        let mut doc = TaskDocument::new(buffer);

        let lists = parse(&mut doc);
        assert!(lists.is_empty());
        assert_eq!(doc.graph().task_count(), 0);
    }

    #[test]
    fn empty_list_region_yields_empty_list() {
        let mut buffer = TextBuffer::from_text("Title");
        let list = buffer.create_tag(TagKind::TaskList(TaskListTag::default()));
        buffer.apply_tag(list, 0..5);
        let mut doc = TaskDocument::new(buffer);

        let lists = parse(&mut doc);
        assert_eq!(lists.len(), 1);
        assert_eq!(doc.list_name(lists[0]).as_deref(), Some("Title"));
        assert!(doc.list(lists[0]).map(|l| l.tasks().is_empty()).unwrap_or(false));
    }

    #[test]
    fn reuse_misses_before_first_parse_and_hits_after() {
        let mut buffer = TextBuffer::from_text("Title");
        let list = buffer.create_tag(TagKind::TaskList(TaskListTag::default()));
        buffer.apply_tag(list, 0..5);
        let mut doc = TaskDocument::new(buffer);

        assert!(try_reuse_existing(&doc).is_none());
        let parsed = parse_or_reuse(&mut doc);
        assert_eq!(try_reuse_existing(&doc), Some(parsed));
    }

    #[test]
    fn reparse_does_not_duplicate_entities() {
        let text = format!("L\n{CHECKBOX}a");
        let mut buffer = TextBuffer::from_text(&text);
        let list = buffer.create_tag(TagKind::TaskList(TaskListTag::default()));
        let task = buffer.create_tag(TagKind::Task(TaskTag::default()));
        buffer.apply_tag(list, 0..4);
        buffer.apply_tag(task, 2..4);
        let mut doc = TaskDocument::new(buffer);

        parse(&mut doc);
        let markers_after_first = doc.buffer().markers().len();
        parse(&mut doc);
        assert_eq!(doc.graph().list_count(), 1);
        assert_eq!(doc.graph().task_count(), 1);
        assert_eq!(doc.buffer().markers().len(), markers_after_first);
    }
}
