use chrono::NaiveDate;
use tasknote_core::service::notebook::{task_list_has_open_tasks, task_list_is_overdue};
use tasknote_core::{has_open_tasks, has_overdue_tasks, import_outline};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn task_due_yesterday_and_open_is_overdue() {
    let mut doc = import_outline("Bills\n- [ ] pay rent @2024-01-09").unwrap();
    assert!(has_overdue_tasks(&mut doc, date(2024, 1, 10)));
    assert!(has_open_tasks(&mut doc));
}

#[test]
fn finished_task_is_never_overdue() {
    let mut doc = import_outline("Bills\n- [x] pay rent @2024-01-09").unwrap();
    assert!(!has_overdue_tasks(&mut doc, date(2024, 1, 10)));
    assert!(!has_open_tasks(&mut doc));
}

#[test]
fn future_due_date_is_not_overdue() {
    let mut doc = import_outline("- [ ] renew passport @2024-06-01").unwrap();
    assert!(!has_overdue_tasks(&mut doc, date(2024, 1, 10)));
}

#[test]
fn per_list_queries_look_at_their_own_tasks() {
    let doc = import_outline("Done\n- [x] a\n\nOpen\n- [ ] b @2024-01-01").unwrap();
    let lists = doc.task_lists();
    assert_eq!(lists.len(), 2);
    let today = date(2024, 1, 10);

    assert!(!task_list_has_open_tasks(doc.graph(), lists[0]));
    assert!(!task_list_is_overdue(doc.graph(), lists[0], today));
    assert!(task_list_has_open_tasks(doc.graph(), lists[1]));
    assert!(task_list_is_overdue(doc.graph(), lists[1], today));
}

#[test]
fn note_without_tasks_has_nothing_open() {
    let mut doc = import_outline("groceries later\nmaybe").unwrap();
    assert!(!has_open_tasks(&mut doc));
    assert!(!has_overdue_tasks(&mut doc, date(2024, 1, 10)));
}
