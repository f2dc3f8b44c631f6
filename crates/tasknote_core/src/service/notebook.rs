//! Predicates behind the notebook's "open tasks" and "overdue tasks" views.
//!
//! Each predicate parses the note (reusing a current model) and asks whether
//! any of its lists qualifies.

use crate::model::document::TaskDocument;
use crate::model::graph::TaskGraph;
use crate::model::task::TaskListId;
use crate::parser;
use chrono::NaiveDate;

/// Whether any task of the note is still open.
pub fn has_open_tasks(doc: &mut TaskDocument) -> bool {
    parser::parse_or_reuse(doc)
        .into_iter()
        .any(|list| task_list_has_open_tasks(doc.graph(), list))
}

/// Whether any open task of the note is due on or before `today`.
pub fn has_overdue_tasks(doc: &mut TaskDocument, today: NaiveDate) -> bool {
    parser::parse_or_reuse(doc)
        .into_iter()
        .any(|list| task_list_is_overdue(doc.graph(), list, today))
}

pub fn task_list_has_open_tasks(graph: &TaskGraph, list: TaskListId) -> bool {
    graph.list(list).is_some_and(|current| {
        current
            .tasks()
            .iter()
            .filter_map(|task| graph.task(*task))
            .any(|task| !task.attributes.done)
    })
}

/// A list is overdue when it holds an open task that is overdue.
pub fn task_list_is_overdue(graph: &TaskGraph, list: TaskListId, today: NaiveDate) -> bool {
    graph.list(list).is_some_and(|current| {
        current
            .tasks()
            .iter()
            .filter_map(|task| graph.task(*task))
            .any(|task| !task.attributes.done && task.attributes.is_overdue(today))
    })
}

#[cfg(test)]
mod tests {
    use super::{has_open_tasks, has_overdue_tasks, task_list_is_overdue};
    use crate::buffer::TextBuffer;
    use crate::model::document::TaskDocument;
    use crate::service::outline::import_outline;
    use chrono::NaiveDate;

    fn day(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid test date")
    }

    #[test]
    fn note_without_lists_has_nothing_open() {
        let mut doc = TaskDocument::new(TextBuffer::from_text("just prose"));
        assert!(!has_open_tasks(&mut doc));
        assert!(!has_overdue_tasks(&mut doc, day("2024-01-10")));
    }

    #[test]
    fn due_today_counts_as_overdue() {
        let mut doc = import_outline("L\n- [ ] pay rent @2024-01-10").expect("outline imports");
        let list = doc.task_lists()[0];
        assert!(task_list_is_overdue(doc.graph(), list, day("2024-01-10")));
        assert!(!task_list_is_overdue(doc.graph(), list, day("2024-01-09")));
        assert!(has_open_tasks(&mut doc));
    }
}
