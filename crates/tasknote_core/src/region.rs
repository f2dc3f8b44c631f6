//! Tagged-region registry.
//!
//! # Responsibility
//! - Collect every tag instance of a buffer with its governing range in one
//!   left-to-right scan.
//! - Answer "which task / task list covers this position" queries.
//!
//! # Invariants
//! - A tag's range runs from the first to the last character carrying it;
//!   split runs of one tag form one logical region.
//! - Regions of each kind are listed in first-seen (start) order.
//! - Read-only over the buffer.

use crate::buffer::tag::{TagClass, TagId};
use crate::buffer::TextBuffer;
use log::warn;
use std::collections::{HashMap, HashSet};
use std::ops::Range;

/// One tag and the range it currently governs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub tag: TagId,
    pub range: Range<usize>,
}

/// Snapshot of all regions of a buffer.
#[derive(Debug, Clone, Default)]
pub struct RegionIndex {
    task_lists: Vec<Region>,
    tasks: Vec<Region>,
    attributed: Vec<Region>,
}

impl RegionIndex {
    /// Scans `buffer` once and merges every tag's occurrences.
    pub fn scan(buffer: &TextBuffer) -> Self {
        let mut order: Vec<(TagId, TagClass)> = Vec::new();
        let mut bounds: HashMap<TagId, Range<usize>> = HashMap::new();
        let mut unknown: HashSet<TagId> = HashSet::new();

        for (pos, cell) in buffer.cells().iter().enumerate() {
            for tag in &cell.tags {
                if let Some(range) = bounds.get_mut(tag) {
                    range.end = pos + 1;
                    continue;
                }
                match buffer.tag_table().class_of(*tag) {
                    Some(class) => {
                        order.push((*tag, class));
                        bounds.insert(*tag, pos..pos + 1);
                    }
                    None => {
                        if unknown.insert(*tag) {
                            warn!(
                                "event=region_scan module=region status=unknown_tag tag={} pos={}",
                                tag, pos
                            );
                        }
                    }
                }
            }
        }

        let mut index = Self::default();
        for (tag, class) in order {
            let Some(range) = bounds.remove(&tag) else {
                continue;
            };
            let region = Region { tag, range };
            match class {
                TagClass::TaskList => index.task_lists.push(region),
                TagClass::Task => index.tasks.push(region),
                TagClass::Attributed => index.attributed.push(region),
            }
        }
        index
    }

    pub fn task_lists(&self) -> &[Region] {
        &self.task_lists
    }

    pub fn tasks(&self) -> &[Region] {
        &self.tasks
    }

    pub fn attributed(&self) -> &[Region] {
        &self.attributed
    }

    /// Governing range of any tag kind.
    pub fn range_of(&self, tag: TagId) -> Option<Range<usize>> {
        self.task_lists
            .iter()
            .chain(self.tasks.iter())
            .chain(self.attributed.iter())
            .find(|region| region.tag == tag)
            .map(|region| region.range.clone())
    }

    pub fn contains_tag(&self, tag: TagId) -> bool {
        self.range_of(tag).is_some()
    }

    /// Innermost task-list region containing `pos`.
    pub fn enclosing_task_list(&self, pos: usize) -> Option<&Region> {
        innermost(&self.task_lists, pos)
    }

    pub fn task_list_at(&self, pos: usize) -> Option<TagId> {
        self.enclosing_task_list(pos).map(|region| region.tag)
    }

    pub fn task_at(&self, pos: usize) -> Option<TagId> {
        innermost(&self.tasks, pos).map(|region| region.tag)
    }

    /// Task regions whose innermost enclosing list is `list`, in start order.
    pub fn tasks_of(&self, list: TagId) -> Vec<&Region> {
        self.tasks
            .iter()
            .filter(|region| self.task_list_at(region.range.start) == Some(list))
            .collect()
    }
}

fn innermost(regions: &[Region], pos: usize) -> Option<&Region> {
    regions
        .iter()
        .filter(|region| region.range.contains(&pos))
        .min_by_key(|region| region.range.len())
}

#[cfg(test)]
mod tests {
    use super::RegionIndex;
    use crate::buffer::tag::{TagKind, TaskListTag, TaskTag};
    use crate::buffer::TextBuffer;

    #[test]
    fn split_runs_merge_into_one_region() {
        let mut buffer = TextBuffer::from_text("aa bb cc");
        let list = buffer.create_tag(TagKind::TaskList(TaskListTag::default()));
        buffer.apply_tag(list, 0..2);
        buffer.apply_tag(list, 6..8);

        let index = RegionIndex::scan(&buffer);
        assert_eq!(index.task_lists().len(), 1);
        assert_eq!(index.range_of(list), Some(0..8));
        assert_eq!(index.task_list_at(4), Some(list));
        assert_eq!(index.task_list_at(8), None);
    }

    #[test]
    fn nested_lists_resolve_to_the_innermost_region() {
        let mut buffer = TextBuffer::from_text("outer inner tail");
        let outer = buffer.create_tag(TagKind::TaskList(TaskListTag::default()));
        let inner = buffer.create_tag(TagKind::TaskList(TaskListTag::default()));
        let task = buffer.create_tag(TagKind::Task(TaskTag::default()));
        buffer.apply_tag(outer, 0..16);
        buffer.apply_tag(inner, 6..11);
        buffer.apply_tag(task, 6..11);

        let index = RegionIndex::scan(&buffer);
        assert_eq!(index.task_list_at(2), Some(outer));
        assert_eq!(index.task_list_at(7), Some(inner));
        assert_eq!(index.task_at(7), Some(task));
        assert_eq!(index.tasks_of(inner).len(), 1);
        assert!(index.tasks_of(outer).is_empty());
    }

    #[test]
    fn empty_buffer_has_no_regions() {
        let index = RegionIndex::scan(&TextBuffer::new());
        assert!(index.task_lists().is_empty());
        assert!(index.tasks().is_empty());
        assert!(index.attributed().is_empty());
    }
}
