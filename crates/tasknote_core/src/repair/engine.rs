//! Edit classification and deferred structural repair.
//!
//! # Responsibility
//! - Turn raw buffer edits into queued fix actions while the edit is fresh.
//! - Run queued fixes once the enclosing user action ends.
//! - Keep entities, tags and markers consistent after arbitrary edits.
//!
//! # Invariants
//! - Fixes never run inside a user action.
//! - Edits made by a fix are never classified again.
//! - An expected entity that has gone missing degrades to a full parse;
//!   nothing is reported to the caller as an error.

use crate::buffer::marker::{Gravity, MarkerId};
use crate::buffer::span::Span;
use crate::buffer::tag::{TagClass, TagId, TagKind, TaskTag};
use crate::buffer::{EditEvent, TaggedChar, CHECKBOX};
use crate::model::attributes::Priority;
use crate::model::document::TaskDocument;
use crate::model::task::{EntityRef, TaskId, TaskListId};
use crate::parser;
use crate::region::RegionIndex;
use crate::repair::fix::{FixAction, FixKind, FixQueue, SuspendGuard, Suspension};
use log::{debug, info, warn};

/// What one `pump` did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub applied: Vec<FixKind>,
    pub reparsed: bool,
}

impl RepairReport {
    pub fn absorb(&mut self, other: RepairReport) {
        self.applied.extend(other.applied);
        self.reparsed |= other.reparsed;
    }
}

#[derive(Debug, Default)]
struct FixOutcome {
    cursor: Option<usize>,
    reparsed: bool,
}

#[derive(Debug, Default)]
pub struct RepairEngine {
    queue: FixQueue,
    suspension: Suspension,
    default_priority: Priority,
}

impl RepairEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Priority given to tasks created by Enter.
    pub fn with_default_priority(mut self, priority: Priority) -> Self {
        self.default_priority = priority;
        self
    }

    /// Stops classification until the guard is dropped. Used around
    /// programmatic edits.
    pub fn suspend(&self) -> SuspendGuard {
        self.suspension.suspend()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspension.is_suspended()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drains the buffer's edit events. Must be called after every edit so
    /// classification sees the buffer as the edit left it. Queued fixes run
    /// when a user action end is observed; `cursor` is restored afterwards.
    pub fn pump(&mut self, doc: &mut TaskDocument, cursor: Option<MarkerId>) -> RepairReport {
        let mut report = RepairReport::default();
        for event in doc.buffer.take_events() {
            if self.is_suspended() {
                continue;
            }
            match event {
                EditEvent::UserActionEnded => report.absorb(self.flush(doc, cursor)),
                EditEvent::Inserted { pos, len } => self.classify_insert(doc, pos, len),
                EditEvent::Deleted { pos, removed } => self.classify_delete(doc, pos, &removed),
            }
        }
        report
    }

    /// Queues a whole-note revalidation, as after a host undo.
    pub fn request_revalidation(&mut self) {
        self.queue.push(FixAction::revalidate());
    }

    /// Runs queued fixes immediately. Only valid outside a user action.
    pub fn run_pending(&mut self, doc: &mut TaskDocument, cursor: Option<MarkerId>) -> RepairReport {
        if doc.buffer.in_user_action() {
            return RepairReport::default();
        }
        self.flush(doc, cursor)
    }

    fn classify_insert(&mut self, doc: &mut TaskDocument, pos: usize, len: usize) {
        let range = pos..pos + len;
        let text = doc.buffer.slice(range.clone());
        if text.contains(CHECKBOX) {
            debug!("event=repair_classify module=repair status=reject reason=checkbox pos={}", pos);
            self.queue.push(FixAction::Undo);
            return;
        }

        let end = range.end;
        if !text.ends_with('\n')
            && doc.buffer.line_start(pos) == pos
            && doc.buffer.char_at(end) == Some(CHECKBOX)
            && task_tag_at(doc, end).is_some()
        {
            debug!(
                "event=repair_classify module=repair status=reject reason=before_checkbox pos={}",
                pos
            );
            self.queue.push(FixAction::Undo);
            return;
        }

        if !text.contains('\n') {
            return;
        }
        let view: &TaskDocument = doc;
        let task = range
            .clone()
            .filter(|p| view.buffer.char_at(*p) == Some('\n'))
            .find_map(|p| task_tag_at(view, p));
        if let Some(task) = task {
            debug!(
                "event=repair_classify module=repair status=split task={} pos={}",
                task, pos
            );
            let span = Span::new(doc.buffer.markers_mut(), range);
            self.queue.push(FixAction::SplitTask { task, span });
        }
    }

    fn classify_delete(&mut self, doc: &mut TaskDocument, pos: usize, removed: &[TaggedChar]) {
        let structural = removed.iter().any(|cell| {
            cell.ch == CHECKBOX
                || cell.ch == '\n'
                || cell.tags.iter().any(|tag| {
                    matches!(
                        doc.buffer.tag_table().class_of(*tag),
                        Some(TagClass::TaskList) | Some(TagClass::Task)
                    )
                })
        });
        if !structural {
            return;
        }
        let regions = RegionIndex::scan(&doc.buffer);
        let before = pos
            .checked_sub(1)
            .and_then(|previous| doc.list_at_in(&regions, previous));
        let after = doc.list_at_in(&regions, pos);
        let line = Some(doc.buffer.create_marker(pos, Gravity::Left));
        debug!(
            "event=repair_classify module=repair status=delete_repair pos={} removed={} before={} after={}",
            pos,
            removed.len(),
            before.is_some(),
            after.is_some()
        );
        self.queue.push(FixAction::DeleteRepair {
            before,
            after,
            line,
        });
    }

    fn flush(&mut self, doc: &mut TaskDocument, cursor: Option<MarkerId>) -> RepairReport {
        let batch = self.queue.take_batch();
        for fix in batch.superseded {
            release(doc, fix);
        }
        let mut report = RepairReport::default();
        if batch.run.is_empty() {
            return report;
        }
        info!(
            "event=repair_flush module=repair status=start fixes={}",
            batch.run.len()
        );
        // Fix edits belong to the action being repaired.
        doc.buffer.begin_amend();
        for fix in batch.run {
            let kind = fix.kind();
            let _guard = self.suspension.suspend();
            let saved = cursor
                .and_then(|marker| doc.buffer.marker_position(marker))
                .map(|pos| doc.buffer.create_marker(pos, Gravity::Left));

            let outcome = self.run_fix(doc, fix);

            if let Some(cursor) = cursor {
                let target = outcome
                    .cursor
                    .or_else(|| saved.and_then(|marker| doc.buffer.marker_position(marker)));
                if let Some(target) = target {
                    doc.buffer.move_marker(cursor, target);
                }
            }
            if let Some(marker) = saved {
                doc.buffer.delete_marker(marker);
            }
            // Edits made by the fix itself.
            doc.buffer.take_events();
            report.applied.push(kind);
            report.reparsed |= outcome.reparsed;
        }
        doc.buffer.end_amend();
        info!(
            "event=repair_flush module=repair status=ok fixes={} reparsed={}",
            report.applied.len(),
            report.reparsed
        );
        report
    }

    fn run_fix(&self, doc: &mut TaskDocument, fix: FixAction) -> FixOutcome {
        match fix {
            FixAction::Undo => {
                if !doc.buffer.undo_last_action() {
                    debug!("event=repair_undo module=repair status=empty_journal");
                }
                FixOutcome::default()
            }
            FixAction::DeleteRepair {
                before,
                after,
                line,
            } => {
                let line_pos = line.and_then(|marker| doc.buffer.marker_position(marker));
                if let Some(marker) = line {
                    doc.buffer.delete_marker(marker);
                }
                delete_repair(doc, before, after, line_pos)
            }
            FixAction::SplitTask { task, span } => self.split_task(doc, task, span),
        }
    }

    fn split_task(&self, doc: &mut TaskDocument, task: TaskId, span: Span) -> FixOutcome {
        let Some(list) = doc.task(task).map(|current| current.list) else {
            span.release(doc.buffer.markers_mut());
            return full_parse(doc, "split_task_missing");
        };
        let Some(range) = span.range(doc.buffer.markers()) else {
            span.release(doc.buffer.markers_mut());
            return FixOutcome::default();
        };
        let newlines: Vec<usize> = range
            .filter(|pos| doc.buffer.char_at(*pos) == Some('\n') && doc.buffer.has_tag(*pos, task.tag()))
            .collect();

        if let [newline] = newlines.as_slice() {
            if let Some(start) = exits_list(doc, task, list, *newline) {
                span.release(doc.buffer.markers_mut());
                doc.buffer.delete(start..newline + 1);
                doc.remove_task_entity(task);
                debug!(
                    "event=repair_split module=repair status=exit_list list={}",
                    list
                );
                return FixOutcome {
                    cursor: Some(start),
                    reparsed: false,
                };
            }
        }

        let mut created = 0usize;
        for newline in newlines.into_iter().rev() {
            doc.buffer.remove_tag(task.tag(), newline..newline + 1);
            let mut tags: Vec<TagId> = doc
                .buffer
                .tags_at(newline)
                .iter()
                .copied()
                .filter(|tag| doc.buffer.tag_table().class_of(*tag) == Some(TagClass::TaskList))
                .collect();
            let new_tag = doc.buffer.create_tag(TagKind::Task(TaskTag::default()));
            tags.push(new_tag);

            let line_start = newline + 1;
            doc.buffer
                .insert_with_tags(line_start, &CHECKBOX.to_string(), &tags);
            let line_end = doc.buffer.line_end(line_start);
            for pos in line_start + 1..line_end {
                doc.buffer.remove_tag(task.tag(), pos..pos + 1);
                doc.buffer.apply_tag(new_tag, pos..pos + 1);
            }

            if let Some(id) = doc.create_task_entity(new_tag, list, line_start) {
                if doc.set_priority(EntityRef::Task(id), self.default_priority).is_ok() {
                    created += 1;
                }
            }
        }
        doc.sort_list_tasks(list);
        extend_lock_to_tasks(doc, list);

        let cursor = span.range(doc.buffer.markers()).map(|range| range.end);
        span.release(doc.buffer.markers_mut());
        debug!(
            "event=repair_split module=repair status=ok list={} created={}",
            list, created
        );
        FixOutcome {
            cursor,
            reparsed: false,
        }
    }
}

/// Start of the task line when Enter on `task` should leave the list: the
/// task is the list's last, its description is empty and so is the line
/// Enter opened.
fn exits_list(doc: &TaskDocument, task: TaskId, list: TaskListId, newline: usize) -> Option<usize> {
    let is_last = doc
        .list(list)
        .and_then(|current| current.tasks.last().copied())
        == Some(task);
    if !is_last {
        return None;
    }
    let start = doc.task_start(task)?;
    if doc.buffer.char_at(start) != Some(CHECKBOX) || doc.buffer.line_end(start) != newline {
        return None;
    }
    let empty_description = doc.task_description(task).is_some_and(|text| text.is_empty());
    let empty_new_line = doc.buffer.line_end(newline + 1) == newline + 1;
    (empty_description && empty_new_line).then_some(start)
}

fn delete_repair(
    doc: &mut TaskDocument,
    before: Option<TaskListId>,
    after: Option<TaskListId>,
    line: Option<usize>,
) -> FixOutcome {
    match (before, after) {
        (None, None) => revalidate(doc),
        (Some(a), Some(b)) if a == b => repaired(doc, a, line),
        (Some(a), Some(b)) => merge_lists(doc, a, b, line),
        (Some(a), None) => repaired(doc, a, line),
        (None, Some(b)) => {
            let outcome = repaired(doc, b, line);
            if outcome.reparsed {
                return outcome;
            }
            let regions = RegionIndex::scan(&doc.buffer);
            if let Some(range) = regions.range_of(b.tag()) {
                doc.lock_list_end(b, range.end);
            }
            outcome
        }
    }
}

fn repaired(doc: &mut TaskDocument, id: TaskListId, line: Option<usize>) -> FixOutcome {
    if repair_list(doc, id, line) {
        FixOutcome::default()
    } else {
        full_parse(doc, "list_missing")
    }
}

fn full_parse(doc: &mut TaskDocument, reason: &str) -> FixOutcome {
    warn!(
        "event=repair_fallback module=repair status=reparse reason={}",
        reason
    );
    parser::parse(doc);
    FixOutcome {
        cursor: None,
        reparsed: true,
    }
}

/// Prunes entities whose tags vanished, then reuses or rebuilds the model.
fn revalidate(doc: &mut TaskDocument) -> FixOutcome {
    let regions = RegionIndex::scan(&doc.buffer);
    let stale_lists: Vec<TaskListId> = doc
        .graph()
        .lists()
        .map(|list| list.id)
        .filter(|id| !regions.contains_tag(id.tag()))
        .collect();
    for id in stale_lists {
        doc.remove_list_entity(id);
    }
    let stale_tasks: Vec<TaskId> = doc
        .graph()
        .tasks()
        .map(|task| task.id)
        .filter(|id| !regions.contains_tag(id.tag()))
        .collect();
    for id in stale_tasks {
        doc.remove_task_entity(id);
    }

    let Some(lists) = parser::try_reuse_existing(doc) else {
        info!("event=repair_revalidate module=repair status=reparse");
        parser::parse(doc);
        return FixOutcome {
            cursor: None,
            reparsed: true,
        };
    };
    for list in &lists {
        if !repair_list(doc, *list, None) {
            return full_parse(doc, "revalidate_list_missing");
        }
    }
    for list in &lists {
        doc.restore_supertasks(*list);
    }
    debug!(
        "event=repair_revalidate module=repair status=reused lists={}",
        lists.len()
    );
    FixOutcome::default()
}

/// Merges the later of two adjacent lists into the earlier one.
fn merge_lists(
    doc: &mut TaskDocument,
    a: TaskListId,
    b: TaskListId,
    line: Option<usize>,
) -> FixOutcome {
    if doc.list(a).is_none() || doc.list(b).is_none() {
        return full_parse(doc, "merge_list_missing");
    }
    let regions = RegionIndex::scan(&doc.buffer);
    let (Some(ra), Some(rb)) = (regions.range_of(a.tag()), regions.range_of(b.tag())) else {
        return full_parse(doc, "merge_region_missing");
    };

    let nested = (ra.start <= rb.start && rb.end <= ra.end) || (rb.start <= ra.start && ra.end <= rb.end);
    if nested {
        let (inner, outer) = if ra.len() <= rb.len() { (a, b) } else { (b, a) };
        if repair_list(doc, inner, line) && repair_list(doc, outer, None) {
            return FixOutcome::default();
        }
        return full_parse(doc, "merge_nested_missing");
    }

    let merged = ra.start.min(rb.start)..ra.end.max(rb.end);
    let (first, second, second_range) = if ra.start <= rb.start {
        (a, b, rb)
    } else {
        (b, a, ra)
    };
    doc.buffer.apply_tag(first.tag(), merged.clone());
    doc.buffer.remove_tag(second.tag(), second_range);

    let moved: Vec<TaskId> = doc
        .list(second)
        .map(|list| list.tasks.clone())
        .unwrap_or_default();
    for task in &moved {
        doc.move_task(*task, first);
    }
    doc.remove_list_entity(second);
    if doc.end_lock_position(first).is_some() {
        doc.lock_list_end(first, merged.end);
    }
    info!(
        "event=repair_merge module=repair status=ok into={} from={} moved={}",
        first,
        second,
        moved.len()
    );
    repaired(doc, first, line)
}

/// Resyncs one list with its region. Returns `false` when the entity is
/// unknown.
fn repair_list(doc: &mut TaskDocument, id: TaskListId, line: Option<usize>) -> bool {
    if doc.list(id).is_none() {
        return false;
    }
    if let Some(line) = line {
        adopt_orphan_text(doc, line);
    }
    let regions = RegionIndex::scan(&doc.buffer);
    let Some(range) = doc.list_range_in(&regions, id) else {
        debug!(
            "event=repair_list module=repair status=vanished list={}",
            id
        );
        doc.remove_list_entity(id);
        return true;
    };

    let members: Vec<(TagId, usize)> = regions
        .tasks_of(id.tag())
        .into_iter()
        .filter_map(|region| parser::checkbox_in(&doc.buffer, region).map(|pos| (region.tag, pos)))
        .collect();

    let current: Vec<TaskId> = doc
        .list(id)
        .map(|list| list.tasks.clone())
        .unwrap_or_default();
    for task in current {
        if members.iter().any(|(tag, _)| *tag == task.tag()) {
            continue;
        }
        let elsewhere = regions
            .range_of(task.tag())
            .and_then(|range| doc.list_at_in(&regions, range.start))
            .filter(|other| *other != id);
        match elsewhere {
            Some(other) => {
                doc.move_task(task, other);
                doc.sort_list_tasks(other);
            }
            None => {
                doc.remove_task_entity(task);
            }
        }
    }

    for (tag, checkbox) in members {
        let task = TaskId::from_tag(tag);
        match doc.task(task).map(|current| current.list) {
            Some(list) if list == id => doc.set_task_start(task, checkbox),
            Some(_) => {
                doc.move_task(task, id);
                doc.set_task_start(task, checkbox);
            }
            None => {
                doc.create_task_entity(tag, id, checkbox);
            }
        }
    }
    doc.sort_list_tasks(id);
    doc.set_list_start(id, range.start);
    extend_lock_to_tasks(doc, id);
    debug!(
        "event=repair_list module=repair status=ok list={} tasks={}",
        id,
        doc.list(id).map(|list| list.tasks.len()).unwrap_or(0)
    );
    true
}

/// Gives task text stranded on `line` to the task owning the line.
///
/// Checkboxes left in the middle of the line by a join are removed. With no
/// owner, stray task tags are stripped from a line without a checkbox.
fn adopt_orphan_text(doc: &mut TaskDocument, line: usize) {
    let start = doc.buffer.line_start(line);
    let owner = doc.task_at(start);
    if owner.is_none() && doc.buffer.char_at(start) == Some(CHECKBOX) {
        return;
    }
    if owner.is_some() {
        let end = doc.buffer.line_end(start);
        let extras: Vec<usize> = (start + 1..end)
            .filter(|pos| doc.buffer.char_at(*pos) == Some(CHECKBOX))
            .collect();
        for pos in extras.into_iter().rev() {
            doc.buffer.delete(pos..pos + 1);
        }
    }

    let end = doc.buffer.line_end(start);
    let mut adopted = 0usize;
    for pos in start..end {
        let stray: Vec<TagId> = doc
            .buffer
            .tags_at(pos)
            .iter()
            .copied()
            .filter(|tag| {
                doc.buffer.tag_table().class_of(*tag) == Some(TagClass::Task)
                    && Some(*tag) != owner.map(TaskId::tag)
            })
            .collect();
        for tag in stray {
            doc.buffer.remove_tag(tag, pos..pos + 1);
            adopted += 1;
        }
        if let Some(owner) = owner {
            doc.buffer.apply_tag(owner.tag(), pos..pos + 1);
        }
    }
    if adopted > 0 {
        debug!(
            "event=repair_orphans module=repair status=adopted cells={} owner={}",
            adopted,
            owner.is_some()
        );
    }
}

/// Keeps an end lock from cutting off the list's own tasks.
fn extend_lock_to_tasks(doc: &mut TaskDocument, id: TaskListId) {
    let Some(lock) = doc.end_lock_position(id) else {
        return;
    };
    let tasks = doc
        .list(id)
        .map(|list| list.tasks.clone())
        .unwrap_or_default();
    let last_end = tasks.into_iter().filter_map(|task| doc.task_end(task)).max();
    if let Some(end) = last_end.filter(|end| *end > lock) {
        doc.lock_list_end(id, end);
    }
}

/// Task whose tag covers `pos` and has a live entity.
fn task_tag_at(doc: &TaskDocument, pos: usize) -> Option<TaskId> {
    doc.buffer
        .tags_at(pos)
        .iter()
        .copied()
        .filter(|tag| doc.buffer.tag_table().class_of(*tag) == Some(TagClass::Task))
        .map(TaskId::from_tag)
        .find(|id| doc.task(*id).is_some())
}

fn release(doc: &mut TaskDocument, fix: FixAction) {
    match fix {
        FixAction::DeleteRepair {
            line: Some(marker), ..
        } => {
            doc.buffer.delete_marker(marker);
        }
        FixAction::SplitTask { span, .. } => span.release(doc.buffer.markers_mut()),
        _ => {}
    }
}
