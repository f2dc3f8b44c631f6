//! Task and task-list entities.
//!
//! # Responsibility
//! - Define the in-memory projection of task and task-list regions.
//! - Expose the shared `Attributed` behavior of both entity kinds.
//!
//! # Invariants
//! - An entity id is the id of the tag backing it, so one region never has
//!   two live entities.
//! - `serial` changes only when an entity object is rebuilt.
//! - A task list owns its tasks; tasks and task lists only hold lookup ids
//!   of their containers.

use crate::buffer::marker::MarkerId;
use crate::buffer::tag::TagId;
use crate::model::attributes::{Priority, TaskAttributes};
use chrono::NaiveDate;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Identifier of the note a task list lives in.
pub type NoteId = Uuid;

/// Identity of a task, equal to its backing task tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(TagId);

/// Identity of a task list, equal to its backing task-list tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskListId(TagId);

impl TaskId {
    pub fn from_tag(tag: TagId) -> Self {
        Self(tag)
    }

    pub fn tag(self) -> TagId {
        self.0
    }
}

impl TaskListId {
    pub fn from_tag(tag: TagId) -> Self {
        Self(tag)
    }

    pub fn tag(self) -> TagId {
        self.0
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "task:{}", self.0)
    }
}

impl Display for TaskListId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "tasklist:{}", self.0)
    }
}

/// Either entity kind, used where tasks and lists are handled uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityRef {
    Task(TaskId),
    TaskList(TaskListId),
}

impl EntityRef {
    pub fn tag(self) -> TagId {
        match self {
            Self::Task(id) => id.tag(),
            Self::TaskList(id) => id.tag(),
        }
    }
}

impl From<TaskId> for EntityRef {
    fn from(value: TaskId) -> Self {
        Self::Task(value)
    }
}

impl From<TaskListId> for EntityRef {
    fn from(value: TaskListId) -> Self {
        Self::TaskList(value)
    }
}

/// Behavior shared by tasks and task lists.
pub trait Attributed {
    fn tag(&self) -> TagId;
    /// Creation serial; differs between two objects for the same region.
    fn serial(&self) -> u64;
    fn start_marker(&self) -> MarkerId;
    fn attributes(&self) -> &TaskAttributes;

    fn is_done(&self) -> bool {
        self.attributes().done
    }

    fn priority(&self) -> Priority {
        self.attributes().priority
    }

    fn due_date(&self) -> Option<NaiveDate> {
        self.attributes().due_date
    }

    fn is_overdue(&self, today: NaiveDate) -> bool {
        self.attributes().is_overdue(today)
    }
}

/// One checkbox line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub(crate) id: TaskId,
    pub(crate) serial: u64,
    pub(crate) start: MarkerId,
    pub(crate) list: TaskListId,
    pub(crate) subtasks: Vec<TaskListId>,
    pub(crate) attributes: TaskAttributes,
}

impl Task {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Containing task list.
    pub fn list(&self) -> TaskListId {
        self.list
    }

    /// Task lists nested under this task.
    pub fn subtasks(&self) -> &[TaskListId] {
        &self.subtasks
    }
}

impl Attributed for Task {
    fn tag(&self) -> TagId {
        self.id.tag()
    }

    fn serial(&self) -> u64 {
        self.serial
    }

    fn start_marker(&self) -> MarkerId {
        self.start
    }

    fn attributes(&self) -> &TaskAttributes {
        &self.attributes
    }
}

/// Ordered collection of tasks backed by one task-list region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskList {
    pub(crate) id: TaskListId,
    pub(crate) serial: u64,
    pub(crate) note: NoteId,
    pub(crate) start: MarkerId,
    pub(crate) end_lock: Option<MarkerId>,
    pub(crate) tasks: Vec<TaskId>,
    pub(crate) super_tasks: Vec<TaskId>,
    pub(crate) attributes: TaskAttributes,
}

impl TaskList {
    pub fn id(&self) -> TaskListId {
        self.id
    }

    pub fn note(&self) -> NoteId {
        self.note
    }

    pub fn tasks(&self) -> &[TaskId] {
        &self.tasks
    }

    /// Tasks this list is nested under.
    pub fn super_tasks(&self) -> &[TaskId] {
        &self.super_tasks
    }

    /// Whether growth of the list is capped at a locked end position.
    pub fn is_end_locked(&self) -> bool {
        self.end_lock.is_some()
    }
}

impl Attributed for TaskList {
    fn tag(&self) -> TagId {
        self.id.tag()
    }

    fn serial(&self) -> u64 {
        self.serial
    }

    fn start_marker(&self) -> MarkerId {
        self.start
    }

    fn attributes(&self) -> &TaskAttributes {
        &self.attributes
    }
}
