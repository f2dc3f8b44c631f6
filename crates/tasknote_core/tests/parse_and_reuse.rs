use tasknote_core::buffer::tag::{TagKind, TaskListTag, TaskTag};
use tasknote_core::model::task::Attributed;
use tasknote_core::{
    export_outline, import_outline, parser, NoteSnapshot, TaskDocument, TextBuffer, CHECKBOX,
};

/// "Shopping\n☐milk\n☐eggs" tagged as one list with two tasks.
fn shopping_buffer() -> TextBuffer {
    let mut buffer = TextBuffer::from_text(&format!("Shopping\n{CHECKBOX}milk\n{CHECKBOX}eggs"));
    let list = buffer.create_tag(TagKind::TaskList(TaskListTag::default()));
    let milk = buffer.create_tag(TagKind::Task(TaskTag::default()));
    let eggs = buffer.create_tag(TagKind::Task(TaskTag::default()));
    buffer.apply_tag(list, 0..20);
    buffer.apply_tag(milk, 9..14);
    buffer.apply_tag(eggs, 15..20);
    buffer
}

#[test]
fn parse_recovers_list_and_tasks_in_order() {
    let mut doc = TaskDocument::new(shopping_buffer());
    let lists = parser::parse(&mut doc);

    assert_eq!(lists.len(), 1);
    assert_eq!(doc.list_name(lists[0]).as_deref(), Some("Shopping"));
    let tasks = doc.list(lists[0]).unwrap().tasks().to_vec();
    let descriptions: Vec<String> = tasks
        .iter()
        .map(|task| doc.task_description(*task).unwrap())
        .collect();
    assert_eq!(descriptions, vec!["milk", "eggs"]);
    assert!(tasks.iter().all(|task| !doc.task(*task).unwrap().is_done()));
}

#[test]
fn parse_on_plain_text_finds_nothing() {
    let mut doc = TaskDocument::new(TextBuffer::from_text("just a note\nwith two lines"));
    assert!(parser::parse(&mut doc).is_empty());
    assert!(doc.graph().is_empty());
}

#[test]
fn reuse_keeps_entity_objects() {
    let mut doc = TaskDocument::new(shopping_buffer());
    parser::parse(&mut doc);
    let before: Vec<u64> = doc.graph().tasks().map(|task| task.serial()).collect();

    assert!(parser::try_reuse_existing(&doc).is_some());
    parser::parse_or_reuse(&mut doc);
    parser::parse_or_reuse(&mut doc);

    let after: Vec<u64> = doc.graph().tasks().map(|task| task.serial()).collect();
    assert_eq!(before, after);
}

#[test]
fn snapshot_roundtrip_preserves_structure_and_attributes() {
    let doc = import_outline(
        "Work\n- [ ] report !high @2024-02-01\n  - [x] draft\n- [x] email !low",
    )
    .unwrap();
    let json = doc.buffer().snapshot().to_json().unwrap();

    let restored = NoteSnapshot::from_json(&json).unwrap();
    let mut reopened = TaskDocument::new(TextBuffer::from_snapshot(&restored).unwrap());
    parser::parse(&mut reopened);

    assert_eq!(reopened.buffer().text(), doc.buffer().text());
    assert_eq!(reopened.graph().task_count(), 3);
    assert_eq!(reopened.graph().list_count(), 2);
    assert_eq!(export_outline(&reopened), export_outline(&doc));
}

#[test]
fn malformed_snapshot_json_is_an_error() {
    assert!(NoteSnapshot::from_json("{\"text\": 3}").is_err());
}
