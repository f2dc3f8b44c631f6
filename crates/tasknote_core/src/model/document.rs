//! Buffer + entity model pair of one open note.
//!
//! # Responsibility
//! - Resolve entity positions, descriptions and names from the buffer.
//! - Create and remove entities together with their markers.
//! - Write entity attribute changes through to their tags.
//!
//! # Invariants
//! - Every attribute mutation goes through `write_attributes` before
//!   returning, so tag maps never diverge from entity values.
//! - New entities are seeded from their tag's attribute map.

use crate::buffer::marker::Gravity;
use crate::buffer::tag::{TagClass, TagId};
use crate::buffer::{TextBuffer, CHECKBOX};
use crate::error::{TaskError, TaskResult};
use crate::model::attributes::{
    decode_supertasks, encode_supertasks, Priority, TaskAttributes, ATTR_SUPERTASKS,
};
use crate::model::graph::TaskGraph;
use crate::model::task::{EntityRef, NoteId, Task, TaskId, TaskList, TaskListId};
use crate::region::RegionIndex;
use chrono::NaiveDate;
use log::{debug, warn};
use std::collections::HashMap;
use std::ops::Range;
use uuid::Uuid;

#[derive(Debug)]
pub struct TaskDocument {
    note: NoteId,
    pub(crate) buffer: TextBuffer,
    pub(crate) graph: TaskGraph,
}

impl TaskDocument {
    /// Wraps a buffer with an empty entity model. Call `parser::parse` to
    /// project existing tags.
    pub fn new(buffer: TextBuffer) -> Self {
        Self::with_note(Uuid::new_v4(), buffer)
    }

    pub fn with_note(note: NoteId, buffer: TextBuffer) -> Self {
        Self {
            note,
            buffer,
            graph: TaskGraph::new(),
        }
    }

    pub fn note(&self) -> NoteId {
        self.note
    }

    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn into_buffer(self) -> TextBuffer {
        self.buffer
    }

    // ---- queries ----

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.graph.task(id)
    }

    pub fn list(&self, id: TaskListId) -> Option<&TaskList> {
        self.graph.list(id)
    }

    /// Live task lists ordered by start position.
    pub fn task_lists(&self) -> Vec<TaskListId> {
        let mut lists: Vec<(usize, TaskListId)> = self
            .graph
            .lists()
            .map(|list| {
                let pos = self
                    .buffer
                    .marker_position(list.start)
                    .unwrap_or(usize::MAX);
                (pos, list.id)
            })
            .collect();
        lists.sort();
        lists.into_iter().map(|(_, id)| id).collect()
    }

    pub fn task_start(&self, id: TaskId) -> Option<usize> {
        let task = self.graph.task(id)?;
        self.buffer.marker_position(task.start)
    }

    /// End of the task's description line.
    pub fn task_end(&self, id: TaskId) -> Option<usize> {
        let start = self.task_start(id)?;
        Some(self.buffer.line_end(start))
    }

    /// Text after the checkbox up to the end of the line, without
    /// decorative spans.
    pub fn task_description(&self, id: TaskId) -> Option<String> {
        let start = self.task_start(id)?;
        let end = self.buffer.line_end(start);
        let text_start = if self.buffer.char_at(start) == Some(CHECKBOX) {
            start + 1
        } else {
            start
        };
        Some(self.plain_text(text_start..end))
    }

    pub fn list_start(&self, id: TaskListId) -> Option<usize> {
        let list = self.graph.list(id)?;
        self.buffer.marker_position(list.start)
    }

    /// Current region of a list, clipped at its end lock. The lock never
    /// cuts into the line of the list's last task.
    pub fn list_range(&self, id: TaskListId) -> Option<Range<usize>> {
        let regions = RegionIndex::scan(&self.buffer);
        self.list_range_in(&regions, id)
    }

    pub(crate) fn list_range_in(&self, regions: &RegionIndex, id: TaskListId) -> Option<Range<usize>> {
        let list = self.graph.list(id)?;
        let mut range = regions.range_of(id.tag())?;
        if let Some(lock) = list.end_lock.and_then(|lock| self.buffer.marker_position(lock)) {
            let last_task_end = list
                .tasks
                .iter()
                .filter_map(|task| self.task_end(*task))
                .max();
            let limit = last_task_end.map_or(lock, |end| end.max(lock));
            range.end = range.end.min(limit).max(range.start);
        }
        Some(range)
    }

    pub fn list_end(&self, id: TaskListId) -> Option<usize> {
        self.list_range(id).map(|range| range.end)
    }

    /// Title line of a list, empty when the list starts with a task.
    pub fn list_name(&self, id: TaskListId) -> Option<String> {
        let start = self.list_start(id)?;
        if self.buffer.char_at(start) == Some(CHECKBOX) {
            return Some(String::new());
        }
        let end = self.buffer.line_end(start);
        Some(self.plain_text(start..end))
    }

    /// Task whose line contains `pos`.
    pub fn task_at(&self, pos: usize) -> Option<TaskId> {
        let line_start = self.buffer.line_start(pos);
        if self.buffer.char_at(line_start) != Some(CHECKBOX) {
            return None;
        }
        self.buffer
            .tags_at(line_start)
            .iter()
            .copied()
            .filter(|tag| self.buffer.tag_table().class_of(*tag) == Some(TagClass::Task))
            .map(TaskId::from_tag)
            .find(|id| self.graph.task(*id).is_some())
    }

    /// Innermost live task list covering `pos`.
    pub fn list_at(&self, pos: usize) -> Option<TaskListId> {
        let regions = RegionIndex::scan(&self.buffer);
        self.list_at_in(&regions, pos)
    }

    pub(crate) fn list_at_in(&self, regions: &RegionIndex, pos: usize) -> Option<TaskListId> {
        regions
            .task_list_at(pos)
            .map(TaskListId::from_tag)
            .filter(|id| self.graph.list(*id).is_some())
    }

    /// Whether every task of the list is done. Empty lists are not done.
    pub fn all_tasks_done(&self, id: TaskListId) -> bool {
        self.graph.list(id).is_some_and(|list| {
            !list.tasks.is_empty()
                && list
                    .tasks
                    .iter()
                    .all(|task| self.graph.task(*task).is_some_and(|t| t.attributes.done))
        })
    }

    fn plain_text(&self, range: Range<usize>) -> String {
        let mut text = String::new();
        for pos in range {
            let decorative = self.buffer.tags_at(pos).iter().any(|tag| {
                self.buffer.tag_table().class_of(*tag) == Some(TagClass::Attributed)
            });
            if decorative {
                continue;
            }
            if let Some(ch) = self.buffer.char_at(pos) {
                text.push(ch);
            }
        }
        text
    }

    // ---- attribute write-through ----

    pub fn set_done(&mut self, id: TaskId, done: bool) -> TaskResult<()> {
        let task = self.graph.task_mut(id).ok_or(TaskError::TaskNotFound(id))?;
        task.attributes.done = done;
        self.write_attributes(EntityRef::Task(id));
        Ok(())
    }

    pub(crate) fn set_list_done(&mut self, id: TaskListId, done: bool) -> bool {
        let Some(list) = self.graph.list_mut(id) else {
            return false;
        };
        if list.attributes.done == done {
            return false;
        }
        list.attributes.done = done;
        self.write_attributes(EntityRef::TaskList(id));
        true
    }

    pub fn set_priority(&mut self, entity: EntityRef, priority: Priority) -> TaskResult<()> {
        let attributes = self
            .graph
            .attributes_mut(entity)
            .ok_or_else(|| missing(entity))?;
        attributes.priority = priority;
        self.write_attributes(entity);
        Ok(())
    }

    pub fn set_due_date(&mut self, entity: EntityRef, due: Option<NaiveDate>) -> TaskResult<()> {
        let attributes = self
            .graph
            .attributes_mut(entity)
            .ok_or_else(|| missing(entity))?;
        attributes.due_date = due;
        self.write_attributes(entity);
        Ok(())
    }

    /// Copies the entity's live values into its tag map.
    pub(crate) fn write_attributes(&mut self, entity: EntityRef) -> bool {
        let Some(values) = self.graph.attributes(entity).copied() else {
            return false;
        };
        let Some(tag) = self.buffer.tag_mut(entity.tag()) else {
            warn!(
                "event=write_through module=model status=missing_tag tag={}",
                entity.tag()
            );
            return false;
        };
        values.encode_into(tag.attributes_mut());
        true
    }

    fn write_supertasks(&mut self, id: TaskListId) {
        let Some(list) = self.graph.list(id) else {
            return;
        };
        let ids: Vec<TagId> = list.super_tasks.iter().map(|task| task.tag()).collect();
        if let Some(tag) = self.buffer.tag_mut(id.tag()) {
            if ids.is_empty() {
                tag.attributes_mut().remove(ATTR_SUPERTASKS);
            } else {
                tag.attributes_mut()
                    .insert(ATTR_SUPERTASKS.to_string(), encode_supertasks(&ids));
            }
        }
    }

    // ---- entity lifecycle ----

    pub(crate) fn create_list_entity(&mut self, tag: TagId, start: usize) -> TaskListId {
        let id = TaskListId::from_tag(tag);
        let attributes = self.seed_attributes(tag);
        let start = self.buffer.create_marker(start, Gravity::Right);
        let serial = self.graph.next_serial();
        self.graph.insert_list(TaskList {
            id,
            serial,
            note: self.note,
            start,
            end_lock: None,
            tasks: Vec::new(),
            super_tasks: Vec::new(),
            attributes,
        });
        debug!(
            "event=entity_created module=model kind=task_list tag={} serial={}",
            tag, serial
        );
        id
    }

    pub(crate) fn create_task_entity(
        &mut self,
        tag: TagId,
        list: TaskListId,
        start: usize,
    ) -> Option<TaskId> {
        if self.graph.list(list).is_none() {
            return None;
        }
        let id = TaskId::from_tag(tag);
        let attributes = self.seed_attributes(tag);
        let marker = self.buffer.create_marker(start, Gravity::Right);
        let serial = self.graph.next_serial();
        let inserted = self.graph.insert_task(Task {
            id,
            serial,
            start: marker,
            list,
            subtasks: Vec::new(),
            attributes,
        });
        if !inserted {
            self.buffer.delete_marker(marker);
            return None;
        }
        debug!(
            "event=entity_created module=model kind=task tag={} serial={}",
            tag, serial
        );
        Some(id)
    }

    fn seed_attributes(&self, tag: TagId) -> TaskAttributes {
        let Some(current) = self.buffer.tag(tag) else {
            return TaskAttributes::default();
        };
        let (attributes, errors) = TaskAttributes::decode(current.attributes());
        for err in errors {
            warn!(
                "event=attribute_decode module=model status=fallback tag={} error={}",
                tag, err
            );
        }
        attributes
    }

    /// Restores super-task links of a list from its `Supertasks` attribute.
    pub(crate) fn restore_supertasks(&mut self, id: TaskListId) {
        let Some(value) = self
            .buffer
            .tag(id.tag())
            .and_then(|tag| tag.attributes().get(ATTR_SUPERTASKS).cloned())
        else {
            return;
        };
        let (tags, errors) = decode_supertasks(&value);
        for err in errors {
            warn!(
                "event=attribute_decode module=model status=fallback tag={} error={}",
                id.tag(),
                err
            );
        }
        for tag in tags {
            let task = TaskId::from_tag(tag);
            if !self.graph.link_subtask_list(task, id) {
                warn!(
                    "event=supertask_link module=model status=skipped list={} task={}",
                    id, task
                );
            }
        }
    }

    pub(crate) fn link_subtask_list(&mut self, task: TaskId, list: TaskListId) -> bool {
        if !self.graph.link_subtask_list(task, list) {
            return false;
        }
        self.write_supertasks(list);
        true
    }

    pub(crate) fn remove_task_entity(&mut self, id: TaskId) -> bool {
        let Some(task) = self.graph.remove_task(id) else {
            return false;
        };
        self.buffer.delete_marker(task.start);
        for sub in task.subtasks {
            self.write_supertasks(sub);
        }
        debug!("event=entity_removed module=model kind=task tag={}", id.tag());
        true
    }

    pub(crate) fn remove_list_entity(&mut self, id: TaskListId) -> bool {
        let Some((list, tasks)) = self.graph.remove_list(id) else {
            return false;
        };
        self.buffer.delete_marker(list.start);
        if let Some(lock) = list.end_lock {
            self.buffer.delete_marker(lock);
        }
        for task in tasks {
            self.buffer.delete_marker(task.start);
            for sub in task.subtasks {
                self.write_supertasks(sub);
            }
        }
        debug!(
            "event=entity_removed module=model kind=task_list tag={}",
            id.tag()
        );
        true
    }

    /// Drops every entity; tags stay in the buffer.
    pub(crate) fn clear_entities(&mut self) {
        let lists: Vec<TaskListId> = self.graph.lists().map(|list| list.id).collect();
        for list in lists {
            if let Some((list, tasks)) = self.graph.remove_list(list) {
                self.buffer.delete_marker(list.start);
                if let Some(lock) = list.end_lock {
                    self.buffer.delete_marker(lock);
                }
                for task in tasks {
                    self.buffer.delete_marker(task.start);
                }
            }
        }
        let orphans: Vec<TaskId> = self.graph.tasks().map(|task| task.id).collect();
        for task in orphans {
            if let Some(task) = self.graph.remove_task(task) {
                self.buffer.delete_marker(task.start);
            }
        }
    }

    pub(crate) fn move_task(&mut self, task: TaskId, to: TaskListId) -> bool {
        self.graph.move_task(task, to)
    }

    /// Reorders a list's tasks by buffer position.
    pub(crate) fn sort_list_tasks(&mut self, id: TaskListId) {
        let positions: HashMap<TaskId, usize> = self
            .graph
            .list(id)
            .map(|list| {
                list.tasks
                    .iter()
                    .map(|task| (*task, self.task_start(*task).unwrap_or(usize::MAX)))
                    .collect()
            })
            .unwrap_or_default();
        self.graph
            .sort_tasks_by(id, |task| positions.get(&task).copied().unwrap_or(usize::MAX));
    }

    pub(crate) fn set_list_start(&mut self, id: TaskListId, pos: usize) {
        if let Some(list) = self.graph.list(id) {
            let marker = list.start;
            self.buffer.move_marker(marker, pos);
        }
    }

    pub(crate) fn set_task_start(&mut self, id: TaskId, pos: usize) {
        if let Some(task) = self.graph.task(id) {
            let marker = task.start;
            self.buffer.move_marker(marker, pos);
        }
    }

    /// Caps the list's growth at `pos`.
    pub(crate) fn lock_list_end(&mut self, id: TaskListId, pos: usize) {
        let Some(existing) = self.graph.list(id).map(|list| list.end_lock) else {
            return;
        };
        match existing {
            Some(lock) => {
                self.buffer.move_marker(lock, pos);
            }
            None => {
                let lock = self.buffer.create_marker(pos, Gravity::Left);
                if let Some(list) = self.graph.list_mut(id) {
                    list.end_lock = Some(lock);
                }
            }
        }
    }

    pub(crate) fn end_lock_position(&self, id: TaskListId) -> Option<usize> {
        let lock = self.graph.list(id)?.end_lock?;
        self.buffer.marker_position(lock)
    }
}

fn missing(entity: EntityRef) -> TaskError {
    match entity {
        EntityRef::Task(id) => TaskError::TaskNotFound(id),
        EntityRef::TaskList(id) => TaskError::TaskListNotFound(id),
    }
}

#[cfg(test)]
mod tests {
    use super::TaskDocument;
    use crate::buffer::tag::{TagKind, TaskListTag, TaskTag};
    use crate::buffer::{TextBuffer, CHECKBOX};
    use crate::model::attributes::{Priority, ATTR_DONE, ATTR_DUE_DATE, ATTR_PRIORITY};
    use crate::model::task::{EntityRef, TaskId};
    use crate::parser;
    use chrono::NaiveDate;

    fn doc_with_task() -> (TaskDocument, TaskId) {
        let mut buffer = TextBuffer::from_text(&format!("L\n{CHECKBOX}task"));
        let list = buffer.create_tag(TagKind::TaskList(TaskListTag::default()));
        let task = buffer.create_tag(TagKind::Task(TaskTag::default()));
        buffer.apply_tag(list, 0..7);
        buffer.apply_tag(task, 2..7);
        let mut doc = TaskDocument::new(buffer);
        parser::parse(&mut doc);
        (doc, TaskId::from_tag(task))
    }

    #[test]
    fn setters_write_through_to_the_tag() {
        let (mut doc, task) = doc_with_task();
        let due = NaiveDate::from_ymd_opt(2024, 1, 10).expect("valid date");

        doc.set_done(task, true).expect("task exists");
        doc.set_priority(EntityRef::Task(task), Priority::High)
            .expect("task exists");
        doc.set_due_date(EntityRef::Task(task), Some(due))
            .expect("task exists");

        let attributes = doc.buffer().tag(task.tag()).expect("tag exists").attributes();
        assert_eq!(attributes.get(ATTR_DONE).map(String::as_str), Some("true"));
        assert_eq!(attributes.get(ATTR_PRIORITY).map(String::as_str), Some("4"));
        assert_eq!(attributes.get(ATTR_DUE_DATE).map(String::as_str), Some("2024-01-10"));

        doc.set_due_date(EntityRef::Task(task), None).expect("task exists");
        let attributes = doc.buffer().tag(task.tag()).expect("tag exists").attributes();
        assert!(!attributes.contains_key(ATTR_DUE_DATE));
    }

    #[test]
    fn positions_and_texts_resolve_from_markers() {
        let (doc, task) = doc_with_task();
        let list = doc.task_lists()[0];
        assert_eq!(doc.task_start(task), Some(2));
        assert_eq!(doc.task_end(task), Some(7));
        assert_eq!(doc.task_description(task).as_deref(), Some("task"));
        assert_eq!(doc.list_name(list).as_deref(), Some("L"));
        assert_eq!(doc.list_range(list), Some(0..7));
        assert_eq!(doc.task_at(4), Some(task));
        assert_eq!(doc.list_at(0), Some(list));
    }

    #[test]
    fn reparse_seeds_values_from_tags() {
        let (mut doc, task) = doc_with_task();
        doc.set_done(task, true).expect("task exists");
        parser::parse(&mut doc);
        assert!(doc.task(task).is_some_and(|entity| entity.attributes.done));
    }
}
