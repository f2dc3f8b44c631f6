//! Deferred fix actions and their queue.
//!
//! # Invariants
//! - Fixes only hold tag ids and markers, never raw positions.
//! - `DeleteRepair` runs before normal-priority fixes; order is otherwise
//!   the order of classification.
//! - A queued `Undo` supersedes every other fix of its batch and is
//!   followed by one revalidation.

use crate::buffer::marker::MarkerId;
use crate::buffer::span::Span;
use crate::model::task::{TaskId, TaskListId};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FixPriority {
    High,
    Normal,
}

/// Discriminant of a fix, reported back to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixKind {
    Undo,
    DeleteRepair,
    SplitTask,
}

impl fmt::Display for FixKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undo => write!(f, "undo"),
            Self::DeleteRepair => write!(f, "delete_repair"),
            Self::SplitTask => write!(f, "split_task"),
        }
    }
}

#[derive(Debug)]
pub enum FixAction {
    /// Revert the user action that just ended.
    Undo,
    /// Reconcile lists around a deletion. Both `None` means revalidate the
    /// whole note.
    DeleteRepair {
        before: Option<TaskListId>,
        after: Option<TaskListId>,
        line: Option<MarkerId>,
    },
    /// Turn the newlines typed inside `task` into new task lines.
    SplitTask { task: TaskId, span: Span },
}

impl FixAction {
    pub fn revalidate() -> Self {
        Self::DeleteRepair {
            before: None,
            after: None,
            line: None,
        }
    }

    pub fn kind(&self) -> FixKind {
        match self {
            Self::Undo => FixKind::Undo,
            Self::DeleteRepair { .. } => FixKind::DeleteRepair,
            Self::SplitTask { .. } => FixKind::SplitTask,
        }
    }

    pub fn priority(&self) -> FixPriority {
        match self {
            Self::DeleteRepair { .. } => FixPriority::High,
            Self::Undo | Self::SplitTask { .. } => FixPriority::Normal,
        }
    }
}

/// One flush worth of fixes.
#[derive(Debug, Default)]
pub struct FixBatch {
    /// Fixes to run, in order.
    pub run: Vec<FixAction>,
    /// Fixes dropped because an `Undo` superseded them. Their markers still
    /// need releasing.
    pub superseded: Vec<FixAction>,
}

#[derive(Debug, Default)]
pub struct FixQueue {
    entries: Vec<FixAction>,
}

impl FixQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fix: FixAction) {
        self.entries.push(fix);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Empties the queue into an ordered batch.
    pub fn take_batch(&mut self) -> FixBatch {
        let mut entries = std::mem::take(&mut self.entries);
        if entries.iter().any(|fix| matches!(fix, FixAction::Undo)) {
            entries.retain(|fix| !matches!(fix, FixAction::Undo));
            return FixBatch {
                run: vec![FixAction::Undo, FixAction::revalidate()],
                superseded: entries,
            };
        }
        // Stable, so equal-priority fixes keep classification order.
        entries.sort_by_key(FixAction::priority);
        FixBatch {
            run: entries,
            superseded: Vec::new(),
        }
    }
}

/// Shared listener-suspension counter.
#[derive(Debug, Clone, Default)]
pub struct Suspension {
    depth: Rc<Cell<u32>>,
}

impl Suspension {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_suspended(&self) -> bool {
        self.depth.get() > 0
    }

    /// Suspends listeners until the returned guard is dropped.
    pub fn suspend(&self) -> SuspendGuard {
        self.depth.set(self.depth.get() + 1);
        SuspendGuard {
            depth: Rc::clone(&self.depth),
        }
    }
}

/// Resumes listeners on drop, including during unwinding.
#[derive(Debug)]
pub struct SuspendGuard {
    depth: Rc<Cell<u32>>,
}

impl Drop for SuspendGuard {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::{FixAction, FixKind, FixQueue, Suspension};
    use crate::buffer::marker::MarkerTable;
    use crate::buffer::span::Span;
    use crate::buffer::tag::TagId;
    use crate::model::task::TaskId;

    fn split(markers: &mut MarkerTable) -> FixAction {
        FixAction::SplitTask {
            task: TaskId::from_tag(TagId::new()),
            span: Span::new(markers, 0..1),
        }
    }

    #[test]
    fn delete_repair_runs_before_normal_fixes() {
        let mut markers = MarkerTable::default();
        let mut queue = FixQueue::new();
        queue.push(split(&mut markers));
        queue.push(FixAction::revalidate());

        let batch = queue.take_batch();
        let kinds: Vec<FixKind> = batch.run.iter().map(FixAction::kind).collect();
        assert_eq!(kinds, vec![FixKind::DeleteRepair, FixKind::SplitTask]);
        assert!(queue.is_empty());
    }

    #[test]
    fn undo_supersedes_the_rest_and_revalidates() {
        let mut markers = MarkerTable::default();
        let mut queue = FixQueue::new();
        queue.push(split(&mut markers));
        queue.push(FixAction::Undo);
        queue.push(FixAction::Undo);

        let batch = queue.take_batch();
        let kinds: Vec<FixKind> = batch.run.iter().map(FixAction::kind).collect();
        assert_eq!(kinds, vec![FixKind::Undo, FixKind::DeleteRepair]);
        assert_eq!(batch.superseded.len(), 1);
    }

    #[test]
    fn guard_resumes_on_drop_and_nests() {
        let suspension = Suspension::new();
        assert!(!suspension.is_suspended());
        {
            let _outer = suspension.suspend();
            {
                let _inner = suspension.clone().suspend();
                assert!(suspension.is_suspended());
            }
            assert!(suspension.is_suspended());
        }
        assert!(!suspension.is_suspended());
    }

    #[test]
    fn guard_resumes_after_panic() {
        let suspension = Suspension::new();
        let shared = suspension.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = shared.suspend();
            panic!("fix failed");
        }));
        assert!(result.is_err());
        assert!(!suspension.is_suspended());
    }
}
