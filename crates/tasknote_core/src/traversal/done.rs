//! Done-state propagation.
//!
//! `PropagateDone` walks upward and completes tasks whose subtask lists are
//! all done. `PropagateSetDone` walks downward and copies a toggled task's
//! value onto everything nested below it.

use crate::model::document::TaskDocument;
use crate::model::task::{EntityRef, TaskId, TaskListId};
use crate::traversal::{MutVisitor, Visited};
use log::debug;

/// Bottom-up completion of super tasks.
///
/// Never clears a done flag; a task with at least one unfinished subtask is
/// left as it is.
#[derive(Debug, Default)]
pub struct PropagateDone {
    visited: Visited,
    completed: Vec<TaskId>,
}

impl PropagateDone {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-evaluates the ancestors of `task`. The task itself keeps the value
    /// the user gave it.
    pub fn from_task(doc: &mut TaskDocument, task: TaskId) -> Vec<TaskId> {
        let mut visitor = Self::new();
        visitor.visited.first_visit(task);
        if let Some(list) = doc.task(task).map(|current| current.list) {
            visitor.visit_task_list(doc, list);
        }
        visitor.completed
    }

    /// Re-evaluates every task of the note until nothing changes.
    pub fn run_all(doc: &mut TaskDocument) -> Vec<TaskId> {
        let mut visitor = Self::new();
        visitor.visit_note(doc);
        visitor.completed
    }

    /// Tasks this traversal marked done, in completion order.
    pub fn completed(&self) -> &[TaskId] {
        &self.completed
    }

    fn complete_if_ready(&mut self, doc: &mut TaskDocument, id: TaskId) -> bool {
        let Some(task) = doc.task(id) else {
            return false;
        };
        if task.attributes.done || task.subtasks.is_empty() {
            return false;
        }
        let ready = task
            .subtasks
            .iter()
            .all(|list| doc.all_tasks_done(*list));
        if !ready || doc.set_done(id, true).is_err() {
            return false;
        }
        debug!(
            "event=propagate_done module=traversal status=completed task={}",
            id
        );
        self.completed.push(id);
        true
    }
}

impl MutVisitor for PropagateDone {
    fn visit_note(&mut self, doc: &mut TaskDocument) {
        // Completion is monotonic, so the fixpoint loop is bounded by the
        // number of tasks.
        loop {
            let candidates: Vec<TaskId> = doc
                .graph()
                .tasks()
                .filter(|task| !task.attributes.done && !task.subtasks.is_empty())
                .map(|task| task.id)
                .collect();
            let mut changed = false;
            for id in candidates {
                changed |= self.complete_if_ready(doc, id);
            }
            if !changed {
                break;
            }
        }
        let lists: Vec<TaskListId> = doc.graph().lists().map(|list| list.id).collect();
        for list in lists {
            let done = doc.all_tasks_done(list);
            doc.set_list_done(list, done);
        }
    }

    fn visit_task_list(&mut self, doc: &mut TaskDocument, id: TaskListId) {
        if !self.visited.first_visit(id) {
            return;
        }
        let done = doc.all_tasks_done(id);
        doc.set_list_done(id, done);
        let super_tasks = doc
            .list(id)
            .map(|list| list.super_tasks.clone())
            .unwrap_or_default();
        for task in super_tasks {
            self.visit_task(doc, task);
        }
    }

    fn visit_task(&mut self, doc: &mut TaskDocument, id: TaskId) {
        if !self.visited.first_visit(id) {
            return;
        }
        self.complete_if_ready(doc, id);
        if let Some(list) = doc.task(id).map(|task| task.list) {
            self.visit_task_list(doc, list);
        }
    }
}

/// Top-down cascade of a user toggle.
#[derive(Debug)]
pub struct PropagateSetDone {
    value: bool,
    origin: TaskId,
    visited: Visited,
    changed: Vec<TaskId>,
}

impl PropagateSetDone {
    pub fn new(value: bool, origin: TaskId) -> Self {
        Self {
            value,
            origin,
            visited: Visited::new(),
            changed: Vec::new(),
        }
    }

    /// Cascades from the origin and returns the tasks whose value changed.
    pub fn run(mut self, doc: &mut TaskDocument) -> Vec<TaskId> {
        let origin = self.origin;
        crate::traversal::accept_mut(&mut self, doc, EntityRef::Task(origin));
        self.changed
    }
}

impl MutVisitor for PropagateSetDone {
    fn visit_task_list(&mut self, doc: &mut TaskDocument, id: TaskListId) {
        if !self.visited.first_visit(id) {
            return;
        }
        let tasks = doc
            .list(id)
            .map(|list| list.tasks.clone())
            .unwrap_or_default();
        for task in tasks {
            self.visit_task(doc, task);
        }
        let done = doc.all_tasks_done(id);
        doc.set_list_done(id, done);
    }

    fn visit_task(&mut self, doc: &mut TaskDocument, id: TaskId) {
        if !self.visited.first_visit(id) {
            return;
        }
        let Some(current) = doc.task(id).map(|task| task.attributes.done) else {
            return;
        };
        if id == self.origin {
            // The checkbox already holds the new value; only refresh the tag.
            doc.write_attributes(EntityRef::Task(id));
        } else if current != self.value && doc.set_done(id, self.value).is_ok() {
            self.changed.push(id);
        }
        let subtasks = doc
            .task(id)
            .map(|task| task.subtasks.clone())
            .unwrap_or_default();
        for list in subtasks {
            self.visit_task_list(doc, list);
        }
    }
}
