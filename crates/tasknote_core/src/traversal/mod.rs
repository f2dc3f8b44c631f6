//! Visitor traversals over the task graph.
//!
//! # Responsibility
//! - Define read (`Visitor`) and write (`MutVisitor`) traversal contracts.
//! - Provide the per-traversal visited set every traversal must use.
//!
//! # Invariants
//! - A traversal visits each entity at most once, so it terminates on
//!   shared sub-structure and on cycles.
//! - Visited state belongs to one traversal instance and is never shared
//!   or persisted.

pub mod done;
pub mod due_date;

use crate::model::document::TaskDocument;
use crate::model::graph::TaskGraph;
use crate::model::task::{EntityRef, TaskId, TaskListId};
use std::collections::HashSet;

pub use done::{PropagateDone, PropagateSetDone};
pub use due_date::MinDueDate;

/// Read-only traversal.
pub trait Visitor {
    /// Whole-document hook; no-op unless a traversal needs it.
    fn visit_note(&mut self, _graph: &TaskGraph) {}
    fn visit_task_list(&mut self, graph: &TaskGraph, id: TaskListId);
    fn visit_task(&mut self, graph: &TaskGraph, id: TaskId);
}

/// Traversal that mutates entities (with write-through).
pub trait MutVisitor {
    /// Whole-document hook; no-op unless a traversal needs it.
    fn visit_note(&mut self, _doc: &mut TaskDocument) {}
    fn visit_task_list(&mut self, doc: &mut TaskDocument, id: TaskListId);
    fn visit_task(&mut self, doc: &mut TaskDocument, id: TaskId);
}

/// Dispatches a read traversal onto one entity.
pub fn accept(visitor: &mut impl Visitor, graph: &TaskGraph, entity: EntityRef) {
    match entity {
        EntityRef::Task(id) => visitor.visit_task(graph, id),
        EntityRef::TaskList(id) => visitor.visit_task_list(graph, id),
    }
}

/// Dispatches a write traversal onto one entity.
pub fn accept_mut(visitor: &mut impl MutVisitor, doc: &mut TaskDocument, entity: EntityRef) {
    match entity {
        EntityRef::Task(id) => visitor.visit_task(doc, id),
        EntityRef::TaskList(id) => visitor.visit_task_list(doc, id),
    }
}

/// Entities already seen by one traversal.
#[derive(Debug, Default)]
pub struct Visited {
    seen: HashSet<EntityRef>,
}

impl Visited {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `entity`; returns `false` if it was already visited.
    pub fn first_visit(&mut self, entity: impl Into<EntityRef>) -> bool {
        self.seen.insert(entity.into())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::Visited;
    use crate::buffer::tag::TagId;
    use crate::model::task::{EntityRef, TaskId, TaskListId};

    #[test]
    fn visited_reports_first_visit_once_per_entity() {
        let tag = TagId::new();
        let mut visited = Visited::new();
        assert!(visited.first_visit(TaskId::from_tag(tag)));
        assert!(!visited.first_visit(EntityRef::Task(TaskId::from_tag(tag))));
        assert!(visited.first_visit(TaskListId::from_tag(tag)));
        assert_eq!(visited.len(), 2);
    }
}
