//! Task session over one open note.
//!
//! # Responsibility
//! - Route user edits through the repair engine inside user actions.
//! - Provide the task operations menus and toolbars invoke.
//! - Apply configuration (default priority, propagation, priority boxes).
//!
//! # Invariants
//! - Programmatic edits run with classification suspended.
//! - Inserted names and descriptions never contain checkboxes or newlines.
//! - Every attribute change is written through before an operation returns.

use crate::buffer::marker::{Gravity, MarkerId};
use crate::buffer::tag::{
    Attributes, AttributedTag, Tag, TagClass, TagId, TagKind, TaskListTag, TaskTag,
};
use crate::buffer::{TextBuffer, CHECKBOX};
use crate::config::{Clock, EngineConfig, SystemClock};
use crate::error::{TaskError, TaskResult};
use crate::model::attributes::{Priority, ATTR_PRIORITY};
use crate::model::document::TaskDocument;
use crate::model::task::{EntityRef, TaskId, TaskListId};
use crate::parser;
use crate::region::RegionIndex;
use crate::repair::{RepairEngine, RepairReport};
use crate::traversal::{MinDueDate, PropagateDone, PropagateSetDone};
use chrono::NaiveDate;
use log::{debug, info, warn};
use std::ops::Range;

/// Editing session of one note.
pub struct NoteTasks {
    doc: TaskDocument,
    engine: RepairEngine,
    cursor: MarkerId,
    config: EngineConfig,
    clock: Box<dyn Clock>,
}

impl NoteTasks {
    /// Opens a session using the host's local date.
    pub fn open(buffer: TextBuffer, config: EngineConfig) -> Self {
        Self::with_clock(buffer, config, SystemClock)
    }

    pub fn with_clock(buffer: TextBuffer, config: EngineConfig, clock: impl Clock + 'static) -> Self {
        Self::from_document(TaskDocument::new(buffer), config, clock)
    }

    /// Wraps an existing document, parsing it unless its model is current.
    pub fn from_document(
        mut doc: TaskDocument,
        config: EngineConfig,
        clock: impl Clock + 'static,
    ) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(err) => {
                warn!(
                    "event=session_open module=service status=config_fallback error={}",
                    err
                );
                EngineConfig::default()
            }
        };
        // Edits made before the session existed are not user edits.
        doc.buffer.take_events();
        let lists = parser::parse_or_reuse(&mut doc);
        let cursor = doc.buffer.create_marker(0, Gravity::Right);
        info!(
            "event=session_open module=service status=ok note={} lists={}",
            doc.note(),
            lists.len()
        );
        Self {
            doc,
            engine: RepairEngine::new().with_default_priority(config.default_priority),
            cursor,
            config,
            clock: Box::new(clock),
        }
    }

    pub fn document(&self) -> &TaskDocument {
        &self.doc
    }

    pub fn into_document(self) -> TaskDocument {
        self.doc
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Live task lists in document order.
    pub fn task_lists(&self) -> Vec<TaskListId> {
        self.doc.task_lists()
    }

    // ---- cursor ----

    pub fn cursor(&self) -> usize {
        self.doc.buffer.marker_position(self.cursor).unwrap_or(0)
    }

    pub fn set_cursor(&mut self, pos: usize) -> TaskResult<()> {
        self.check_position(pos)?;
        self.doc.buffer.move_marker(self.cursor, pos);
        Ok(())
    }

    // ---- user edits ----

    pub fn begin_user_action(&mut self) {
        self.doc.buffer.begin_user_action();
    }

    /// Closes one user-action level; the outermost close runs queued fixes.
    pub fn end_user_action(&mut self) -> RepairReport {
        self.doc.buffer.end_user_action();
        self.engine.pump(&mut self.doc, Some(self.cursor))
    }

    /// Inserts text as the user would type or paste it.
    pub fn insert_text(&mut self, pos: usize, text: &str) -> TaskResult<RepairReport> {
        self.check_position(pos)?;
        let outermost = !self.doc.buffer.in_user_action();
        if outermost {
            self.begin_user_action();
        }
        self.doc.buffer.insert(pos, text);
        let mut report = self.engine.pump(&mut self.doc, Some(self.cursor));
        if outermost {
            report.absorb(self.end_user_action());
        }
        Ok(report)
    }

    /// Inserts text at the cursor.
    pub fn type_text(&mut self, text: &str) -> TaskResult<RepairReport> {
        let pos = self.cursor();
        self.insert_text(pos, text)
    }

    /// Deletes text as the user would with backspace or a selection.
    pub fn delete_text(&mut self, range: Range<usize>) -> TaskResult<RepairReport> {
        self.check_position(range.end)?;
        if range.start > range.end {
            return Err(TaskError::InvalidPosition {
                pos: range.start,
                len: self.doc.buffer.len(),
            });
        }
        let outermost = !self.doc.buffer.in_user_action();
        if outermost {
            self.begin_user_action();
        }
        self.doc.buffer.delete(range);
        let mut report = self.engine.pump(&mut self.doc, Some(self.cursor));
        if outermost {
            report.absorb(self.end_user_action());
        }
        Ok(report)
    }

    /// Host undo of the last user action, followed by a revalidation.
    pub fn undo(&mut self) -> RepairReport {
        let undone = {
            let _guard = self.engine.suspend();
            let undone = self.doc.buffer.undo_last_action();
            self.engine.pump(&mut self.doc, None);
            undone
        };
        if !undone {
            return RepairReport::default();
        }
        self.engine.request_revalidation();
        self.engine.run_pending(&mut self.doc, Some(self.cursor))
    }

    // ---- structure ----

    /// Starts a new list with one empty task below the line holding `pos`.
    pub fn add_task_list(&mut self, pos: usize, name: &str) -> TaskResult<TaskListId> {
        self.check_position(pos)?;
        check_plain(name)?;
        if self.doc.list_at(pos).is_some() {
            return Err(TaskError::InsideTaskList(pos));
        }
        let _guard = self.engine.suspend();

        let line_start = self.doc.buffer.line_start(pos);
        let line_end = self.doc.buffer.line_end(pos);
        let mut at = line_end;
        if line_start != line_end {
            self.doc.buffer.insert_with_tags(at, "\n", &[]);
            at += 1;
        }
        let list_tag = self
            .doc
            .buffer
            .create_tag(TagKind::TaskList(TaskListTag::default()));
        let task_tag = self.doc.buffer.create_tag(TagKind::Task(TaskTag::default()));
        let title = self
            .doc
            .buffer
            .insert_with_tags(at, &format!("{name}\n"), &[list_tag]);
        let checkbox = title.end;
        self.doc
            .buffer
            .insert_with_tags(checkbox, &CHECKBOX.to_string(), &[list_tag, task_tag]);

        let list = self.doc.create_list_entity(list_tag, at);
        self.doc.write_attributes(EntityRef::TaskList(list));
        let task = self.create_task(task_tag, list, checkbox)?;
        self.finish_structural_edit(task);
        info!(
            "event=task_list_added module=service status=ok list={}",
            list
        );
        Ok(list)
    }

    /// Appends a task line to the end of `list`.
    pub fn add_task(&mut self, list: TaskListId, description: &str) -> TaskResult<TaskId> {
        check_plain(description)?;
        let range = self
            .doc
            .list_range(list)
            .ok_or(TaskError::TaskListNotFound(list))?;
        let start = self
            .doc
            .list_start(list)
            .ok_or(TaskError::TaskListNotFound(list))?;
        let last_task_end = self
            .doc
            .list(list)
            .map(|current| current.tasks().to_vec())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|task| self.doc.task_end(task))
            .max();
        let mut tags = self.structural_tags(start, TagClass::TaskList);
        let _guard = self.engine.suspend();

        let mut at = last_task_end.map_or(range.end, |end| end.max(range.end));
        if self.doc.buffer.char_at(at.saturating_sub(1)) != Some('\n') {
            self.doc.buffer.insert_with_tags(at, "\n", &tags);
            at += 1;
        }
        let task_tag = self.doc.buffer.create_tag(TagKind::Task(TaskTag::default()));
        tags.push(task_tag);
        self.doc
            .buffer
            .insert_with_tags(at, &format!("{CHECKBOX}{description}"), &tags);

        let task = self.create_task(task_tag, list, at)?;
        self.doc.sort_list_tasks(list);
        if let Some(end) = self.doc.task_end(task) {
            if self.doc.end_lock_position(list).is_some() {
                self.doc.lock_list_end(list, end);
            }
        }
        let done = self.doc.all_tasks_done(list);
        self.doc.set_list_done(list, done);
        self.finish_structural_edit(task);
        debug!(
            "event=task_added module=service status=ok list={} task={}",
            list, task
        );
        Ok(task)
    }

    /// Nests a new, untitled list with one empty task under `task`.
    pub fn add_subtask_list(&mut self, task: TaskId) -> TaskResult<TaskListId> {
        let start = self.doc.task_start(task).ok_or(TaskError::TaskNotFound(task))?;
        let end = self.doc.task_end(task).ok_or(TaskError::TaskNotFound(task))?;
        let parent_tags = self.structural_tags(start, TagClass::TaskList);
        let _guard = self.engine.suspend();

        self.doc.buffer.insert_with_tags(end, "\n", &parent_tags);
        let list_tag = self
            .doc
            .buffer
            .create_tag(TagKind::TaskList(TaskListTag::default()));
        let task_tag = self.doc.buffer.create_tag(TagKind::Task(TaskTag::default()));
        let mut tags = parent_tags;
        tags.push(list_tag);
        tags.push(task_tag);
        let checkbox = end + 1;
        self.doc
            .buffer
            .insert_with_tags(checkbox, &CHECKBOX.to_string(), &tags);

        let list = self.doc.create_list_entity(list_tag, checkbox);
        self.doc.write_attributes(EntityRef::TaskList(list));
        if !self.doc.link_subtask_list(task, list) {
            warn!(
                "event=subtask_list_added module=service status=link_failed task={} list={}",
                task, list
            );
        }
        let first = self.create_task(task_tag, list, checkbox)?;
        self.finish_structural_edit(first);
        info!(
            "event=subtask_list_added module=service status=ok task={} list={}",
            task, list
        );
        Ok(list)
    }

    // ---- attributes ----

    /// Shows the entity's priority as a decorative box, replacing any
    /// existing one.
    pub fn insert_priority_box(&mut self, entity: EntityRef) -> TaskResult<()> {
        let priority = self
            .doc
            .graph()
            .attributes(entity)
            .ok_or_else(|| missing(entity))?
            .priority;
        if let EntityRef::TaskList(id) = entity {
            let name = self.doc.list_name(id).ok_or(TaskError::TaskListNotFound(id))?;
            if name.is_empty() {
                return Err(TaskError::UntitledList(id));
            }
        }

        let _guard = self.engine.suspend();
        self.remove_priority_box(entity.tag());
        let (anchor, text) = match entity {
            EntityRef::Task(id) => {
                let start = self.doc.task_start(id).ok_or(TaskError::TaskNotFound(id))?;
                (start + 1, format!("[{}] ", priority.label()))
            }
            EntityRef::TaskList(id) => {
                let start = self.doc.list_start(id).ok_or(TaskError::TaskListNotFound(id))?;
                (self.doc.buffer.line_end(start), format!(" [{}]", priority.label()))
            }
        };
        let mut tags: Vec<TagId> = self
            .doc
            .buffer
            .tags_at(anchor.saturating_sub(1))
            .iter()
            .copied()
            .filter(|tag| self.doc.buffer.tag_table().class_of(*tag) != Some(TagClass::Attributed))
            .collect();
        let mut attributes = Attributes::new();
        attributes.insert(ATTR_PRIORITY.to_string(), priority.level().to_string());
        let box_tag = self.doc.buffer.create_tag(TagKind::Attributed(AttributedTag {
            owner: entity.tag(),
            attributes,
        }));
        tags.push(box_tag);
        self.doc.buffer.insert_with_tags(anchor, &text, &tags);
        self.engine.pump(&mut self.doc, None);
        Ok(())
    }

    /// Shows or hides priority boxes on every task.
    pub fn set_priority_visible(&mut self, visible: bool) -> TaskResult<()> {
        self.config.show_priority = visible;
        let mut tasks: Vec<TaskId> = self.doc.graph().tasks().map(|task| task.id()).collect();
        tasks.sort();
        for task in tasks {
            if visible {
                self.insert_priority_box(EntityRef::Task(task))?;
            } else {
                let _guard = self.engine.suspend();
                self.remove_priority_box(task.tag());
                self.engine.pump(&mut self.doc, None);
            }
        }
        debug!(
            "event=priority_visibility module=service status=ok visible={}",
            visible
        );
        Ok(())
    }

    pub fn set_priority(&mut self, entity: EntityRef, priority: Priority) -> TaskResult<()> {
        self.doc.set_priority(entity, priority)?;
        if self.priority_box_of(entity.tag()).is_some() {
            self.insert_priority_box(entity)?;
        }
        Ok(())
    }

    pub fn add_due_date(&mut self, entity: EntityRef, date: NaiveDate) -> TaskResult<()> {
        self.doc.set_due_date(entity, Some(date))
    }

    pub fn clear_due_date(&mut self, entity: EntityRef) -> TaskResult<()> {
        self.doc.set_due_date(entity, None)
    }

    /// Flips a task's done state and propagates it per configuration.
    /// Returns the new state.
    pub fn toggle_done(&mut self, task: TaskId) -> TaskResult<bool> {
        let current = self.doc.task(task).ok_or(TaskError::TaskNotFound(task))?;
        let done = !current.attributes.done;
        let list = current.list;
        self.doc.set_done(task, done)?;

        let cascaded = if self.config.cascade_done {
            PropagateSetDone::new(done, task).run(&mut self.doc).len()
        } else {
            0
        };
        let completed = if self.config.propagate_done {
            PropagateDone::from_task(&mut self.doc, task).len()
        } else {
            let all_done = self.doc.all_tasks_done(list);
            self.doc.set_list_done(list, all_done);
            0
        };
        debug!(
            "event=task_toggled module=service status=ok task={} done={} cascaded={} completed={}",
            task, done, cascaded, completed
        );
        Ok(done)
    }

    // ---- queries ----

    pub fn get_task(&self, pos: usize) -> TaskResult<Option<TaskId>> {
        self.check_position(pos)?;
        Ok(self.doc.task_at(pos))
    }

    pub fn get_task_list(&self, pos: usize) -> TaskResult<Option<TaskListId>> {
        self.check_position(pos)?;
        Ok(self.doc.list_at(pos))
    }

    pub fn in_task_list(&self, pos: usize) -> TaskResult<bool> {
        Ok(self.get_task_list(pos)?.is_some())
    }

    /// Earliest due date required by the entity and its nested tasks, or
    /// today.
    pub fn suggested_due_date(&self, entity: EntityRef) -> TaskResult<NaiveDate> {
        if !self.doc.graph().contains(entity) {
            return Err(missing(entity));
        }
        Ok(MinDueDate::of(self.doc.graph(), entity, self.today()))
    }

    // ---- helpers ----

    fn check_position(&self, pos: usize) -> TaskResult<()> {
        let len = self.doc.buffer.len();
        if pos > len {
            return Err(TaskError::InvalidPosition { pos, len });
        }
        Ok(())
    }

    fn create_task(&mut self, tag: TagId, list: TaskListId, checkbox: usize) -> TaskResult<TaskId> {
        let task = self
            .doc
            .create_task_entity(tag, list, checkbox)
            .ok_or(TaskError::TaskListNotFound(list))?;
        self.doc
            .set_priority(EntityRef::Task(task), self.config.default_priority)?;
        if self.config.show_priority {
            self.insert_priority_box(EntityRef::Task(task))?;
        }
        Ok(task)
    }

    /// Drains edits made under suspension and parks the cursor at the end
    /// of `task`'s line.
    fn finish_structural_edit(&mut self, task: TaskId) {
        self.engine.pump(&mut self.doc, None);
        if let Some(end) = self.doc.task_end(task) {
            self.doc.buffer.move_marker(self.cursor, end);
        }
    }

    fn structural_tags(&self, pos: usize, class: TagClass) -> Vec<TagId> {
        self.doc
            .buffer
            .tags_at(pos)
            .iter()
            .copied()
            .filter(|tag| self.doc.buffer.tag_table().class_of(*tag) == Some(class))
            .collect()
    }

    fn priority_box_of(&self, owner: TagId) -> Option<(TagId, Range<usize>)> {
        RegionIndex::scan(&self.doc.buffer)
            .attributed()
            .iter()
            .find(|region| self.doc.buffer.tag(region.tag).and_then(Tag::owner) == Some(owner))
            .map(|region| (region.tag, region.range.clone()))
    }

    /// Deletes the owner's box, if any.
    fn remove_priority_box(&mut self, owner: TagId) -> bool {
        let Some((tag, range)) = self.priority_box_of(owner) else {
            return false;
        };
        self.doc.buffer.delete(range);
        self.doc.buffer.drop_tag(tag);
        true
    }
}

fn check_plain(text: &str) -> TaskResult<()> {
    if text.contains(CHECKBOX) || text.contains('\n') {
        return Err(TaskError::ReservedCharacter);
    }
    Ok(())
}

fn missing(entity: EntityRef) -> TaskError {
    match entity {
        EntityRef::Task(id) => TaskError::TaskNotFound(id),
        EntityRef::TaskList(id) => TaskError::TaskListNotFound(id),
    }
}
