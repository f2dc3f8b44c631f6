use chrono::NaiveDate;
use tasknote_core::model::task::Attributed;
use tasknote_core::traversal::{MinDueDate, PropagateDone, PropagateSetDone};
use tasknote_core::{import_outline, EntityRef, TaskDocument, TaskId};

fn task_named(doc: &TaskDocument, description: &str) -> TaskId {
    doc.graph()
        .tasks()
        .map(|task| task.id())
        .find(|id| doc.task_description(*id).as_deref() == Some(description))
        .unwrap_or_else(|| panic!("no task named {description}"))
}

#[test]
fn run_all_completes_parents_bottom_up() {
    let mut doc = import_outline(
        "Build\n- [ ] release\n  - [ ] tests\n    - [x] unit\n    - [x] e2e\n  - [x] docs",
    )
    .unwrap();

    let completed = PropagateDone::run_all(&mut doc);
    let release = task_named(&doc, "release");
    let tests = task_named(&doc, "tests");
    assert!(completed.contains(&release));
    assert!(completed.contains(&tests));
    assert!(doc.task(release).unwrap().is_done());
    let list = doc.task_lists()[0];
    assert!(doc.list(list).unwrap().is_done());
}

#[test]
fn run_all_leaves_parents_with_open_subtasks() {
    let mut doc = import_outline("- [ ] parent\n  - [x] a\n  - [ ] b").unwrap();
    assert!(PropagateDone::run_all(&mut doc).is_empty());
    assert!(!doc.task(task_named(&doc, "parent")).unwrap().is_done());
}

#[test]
fn set_done_reaches_every_nested_task() {
    let mut doc = import_outline("- [ ] root\n  - [ ] mid\n    - [ ] leaf").unwrap();
    let root = task_named(&doc, "root");
    doc.set_done(root, true).unwrap();

    let changed = PropagateSetDone::new(true, root).run(&mut doc);
    assert_eq!(changed.len(), 2);
    assert!(doc.task(task_named(&doc, "leaf")).unwrap().is_done());
}

#[test]
fn min_due_date_of_a_list_spans_all_levels() {
    let doc = import_outline(
        "Trip\n- [ ] book @2024-03-01\n  - [ ] visa @2024-01-15\n- [ ] pack @2024-02-20",
    )
    .unwrap();
    let list = doc.task_lists()[0];
    let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

    assert_eq!(
        MinDueDate::of(doc.graph(), EntityRef::TaskList(list), today),
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    );
}
