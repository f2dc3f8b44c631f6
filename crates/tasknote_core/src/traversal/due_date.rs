//! Earliest due date below an entity.

use crate::model::graph::TaskGraph;
use crate::model::task::{EntityRef, TaskId, TaskListId};
use crate::traversal::{accept, Visited, Visitor};
use chrono::NaiveDate;

/// Collects the earliest due date of an entity and everything nested under
/// it. Used to pre-seed a due-date picker.
#[derive(Debug)]
pub struct MinDueDate {
    today: NaiveDate,
    earliest: Option<NaiveDate>,
    visited: Visited,
}

impl MinDueDate {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            earliest: None,
            visited: Visited::new(),
        }
    }

    /// Earliest due date under `entity`, or `today` when nothing is dated.
    pub fn of(graph: &TaskGraph, entity: EntityRef, today: NaiveDate) -> NaiveDate {
        let mut visitor = Self::new(today);
        accept(&mut visitor, graph, entity);
        visitor.result()
    }

    pub fn result(&self) -> NaiveDate {
        self.earliest.unwrap_or(self.today)
    }

    fn consider(&mut self, due: Option<NaiveDate>) {
        if let Some(due) = due {
            self.earliest = Some(match self.earliest {
                Some(current) => current.min(due),
                None => due,
            });
        }
    }
}

impl Visitor for MinDueDate {
    fn visit_task_list(&mut self, graph: &TaskGraph, id: TaskListId) {
        if !self.visited.first_visit(id) {
            return;
        }
        let Some(list) = graph.list(id) else {
            return;
        };
        self.consider(list.attributes.due_date);
        for task in list.tasks() {
            self.visit_task(graph, *task);
        }
    }

    fn visit_task(&mut self, graph: &TaskGraph, id: TaskId) {
        if !self.visited.first_visit(id) {
            return;
        }
        let Some(task) = graph.task(id) else {
            return;
        };
        self.consider(task.attributes.due_date);
        for list in task.subtasks() {
            self.visit_task_list(graph, *list);
        }
    }
}
