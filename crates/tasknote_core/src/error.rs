//! Errors returned by caller-facing task operations.
//!
//! Structural inconsistencies found while parsing or repairing are logged and
//! repaired instead of being returned; only invalid caller input shows up
//! here.

use crate::model::task::{TaskId, TaskListId};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type TaskResult<T> = Result<T, TaskError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// No live task with this id.
    TaskNotFound(TaskId),
    /// No live task list with this id.
    TaskListNotFound(TaskListId),
    /// Position lies past the end of the buffer.
    InvalidPosition { pos: usize, len: usize },
    /// Operation requires a position outside any task list.
    InsideTaskList(usize),
    /// Text contains characters reserved for task structure.
    ReservedCharacter,
    /// Task list has no title line to decorate.
    UntitledList(TaskListId),
}

impl Display for TaskError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::TaskListNotFound(id) => write!(f, "task list not found: {id}"),
            Self::InvalidPosition { pos, len } => {
                write!(f, "position {pos} is outside buffer of length {len}")
            }
            Self::InsideTaskList(pos) => write!(f, "position {pos} is already inside a task list"),
            Self::ReservedCharacter => {
                write!(f, "text contains a reserved checkbox or newline character")
            }
            Self::UntitledList(id) => write!(f, "task list has no title line: {id}"),
        }
    }
}

impl Error for TaskError {}

#[cfg(test)]
mod tests {
    use super::TaskError;
    use crate::buffer::tag::TagId;
    use crate::model::task::TaskListId;
    use std::error::Error;

    #[test]
    fn errors_describe_caller_input_without_a_source() {
        let list = TaskListId::from_tag(TagId::new());
        let error = TaskError::UntitledList(list);
        assert!(error.to_string().starts_with("task list has no title line"));
        assert!(error.source().is_none());

        let error = TaskError::InvalidPosition { pos: 9, len: 4 };
        assert_eq!(error.to_string(), "position 9 is outside buffer of length 4");
    }
}
