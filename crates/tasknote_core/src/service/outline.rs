//! Plain-text outline import and export.
//!
//! # Responsibility
//! - Build a tagged note from a markdown-like checklist outline.
//! - Render a note's task structure back into the same outline form.
//!
//! # Invariants
//! - A text line directly above an unindented task line is that list's
//!   title; a blank line or prose ends the current lists.
//! - Deeper indentation nests a subtask list under the previous task.
//! - Trailing `!<priority>` and `@YYYY-MM-DD` tokens become attributes.
//!
//! Example:
//! ```text
//! Groceries
//! - [ ] milk !4 @2024-01-10
//!   - [x] check fridge
//! - [ ] bread
//! ```

use crate::buffer::tag::{TagId, TagKind, TaskListTag, TaskTag};
use crate::buffer::{TextBuffer, CHECKBOX};
use crate::model::attributes::{
    decode_due_date, encode_supertasks, Priority, TaskAttributes, ATTR_SUPERTASKS,
};
use crate::model::document::TaskDocument;
use crate::model::task::{Attributed, TaskListId};
use crate::parser;
use chrono::NaiveDate;
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

static TASK_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<indent>[ \t]*)[-*] \[(?P<mark>[ xX])\](?: (?P<text>.*))?$")
        .expect("valid task line regex")
});
static TRAILING_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+(?:!(?P<priority>[0-5]|[A-Za-z_-]+)|@(?P<due>\d{4}-\d{2}-\d{2}))\s*$")
        .expect("valid trailing token regex")
});

const INDENT_STEP: &str = "  ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutlineError {
    /// Priority token is neither a level nor a known label.
    InvalidPriority { line: usize, value: String },
    /// Due-date token is not a calendar date.
    InvalidDueDate { line: usize, value: String },
    /// Indented task line with no task above it to nest under.
    OrphanIndent { line: usize },
    /// Input contains the checkbox character.
    ReservedCharacter { line: usize },
}

impl Display for OutlineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPriority { line, value } => {
                write!(f, "line {line}: invalid priority `{value}`")
            }
            Self::InvalidDueDate { line, value } => {
                write!(f, "line {line}: invalid due date `{value}`")
            }
            Self::OrphanIndent { line } => {
                write!(f, "line {line}: indented task has no parent task")
            }
            Self::ReservedCharacter { line } => {
                write!(f, "line {line}: reserved checkbox character")
            }
        }
    }
}

impl Error for OutlineError {}

/// One outline line after tokenization.
#[derive(Debug)]
enum OutlineLine {
    Text(String),
    Task {
        indent: usize,
        text: String,
        attributes: TaskAttributes,
    },
}

/// One buffer line to emit.
struct Emitted {
    text: String,
    lists: Vec<TagId>,
    task: Option<TagId>,
}

struct OpenList {
    indent: usize,
    tags: Vec<TagId>,
    last_task: Option<TagId>,
}

/// Builds a parsed note from `input`.
pub fn import_outline(input: &str) -> Result<TaskDocument, OutlineError> {
    let lines = input
        .lines()
        .enumerate()
        .map(|(index, line)| tokenize(index + 1, line))
        .collect::<Result<Vec<_>, _>>()?;

    let mut buffer = TextBuffer::new();
    let mut emitted: Vec<Emitted> = Vec::with_capacity(lines.len());
    let mut stack: Vec<OpenList> = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        match line {
            OutlineLine::Text(text) => {
                stack.clear();
                let opens_list = !text.trim().is_empty()
                    && matches!(lines.get(index + 1), Some(OutlineLine::Task { indent: 0, .. }));
                if opens_list {
                    let tag = buffer.create_tag(TagKind::TaskList(TaskListTag::default()));
                    stack.push(OpenList {
                        indent: 0,
                        tags: vec![tag],
                        last_task: None,
                    });
                    emitted.push(Emitted {
                        text: text.clone(),
                        lists: vec![tag],
                        task: None,
                    });
                } else {
                    emitted.push(Emitted {
                        text: text.clone(),
                        lists: Vec::new(),
                        task: None,
                    });
                }
            }
            OutlineLine::Task {
                indent,
                text,
                attributes,
            } => {
                while stack.last().is_some_and(|open| open.indent > *indent) {
                    stack.pop();
                }
                let nested_under = match stack.last() {
                    Some(open) if *indent > open.indent => {
                        Some(open.last_task.ok_or(OutlineError::OrphanIndent { line: index + 1 })?)
                    }
                    Some(_) => None,
                    None if *indent > 0 => return Err(OutlineError::OrphanIndent { line: index + 1 }),
                    None => None,
                };
                if stack.is_empty() || nested_under.is_some() {
                    let mut list_tag = TaskListTag::default();
                    if let Some(parent) = nested_under {
                        list_tag
                            .attributes
                            .insert(ATTR_SUPERTASKS.to_string(), encode_supertasks(&[parent]));
                    }
                    let tag = buffer.create_tag(TagKind::TaskList(list_tag));
                    let mut tags = stack.last().map(|open| open.tags.clone()).unwrap_or_default();
                    tags.push(tag);
                    stack.push(OpenList {
                        indent: *indent,
                        tags,
                        last_task: None,
                    });
                }

                let mut task_tag = TaskTag::default();
                attributes.encode_into(&mut task_tag.attributes);
                let tag = buffer.create_tag(TagKind::Task(task_tag));
                let Some(open) = stack.last_mut() else {
                    continue;
                };
                open.last_task = Some(tag);
                emitted.push(Emitted {
                    text: format!("{CHECKBOX}{text}"),
                    lists: open.tags.clone(),
                    task: Some(tag),
                });
            }
        }
    }

    for (index, line) in emitted.iter().enumerate() {
        if index > 0 {
            let shared: Vec<TagId> = emitted[index - 1]
                .lists
                .iter()
                .copied()
                .filter(|tag| line.lists.contains(tag))
                .collect();
            let at = buffer.len();
            buffer.insert_with_tags(at, "\n", &shared);
        }
        let mut tags = line.lists.clone();
        tags.extend(line.task);
        let at = buffer.len();
        buffer.insert_with_tags(at, &line.text, &tags);
    }
    buffer.take_events();

    let mut doc = TaskDocument::new(buffer);
    let lists = parser::parse(&mut doc);
    for list in &lists {
        let done = doc.all_tasks_done(*list);
        doc.set_list_done(*list, done);
    }
    info!(
        "event=outline_import module=service status=ok lines={} lists={} tasks={}",
        lines.len(),
        lists.len(),
        doc.graph().task_count()
    );
    Ok(doc)
}

/// Renders every top-level list with its nested lists. Lists are separated
/// by a blank line; prose is not exported.
pub fn export_outline(doc: &TaskDocument) -> String {
    let mut blocks: Vec<String> = Vec::new();
    let mut visited: HashSet<TaskListId> = HashSet::new();
    for list in doc.task_lists() {
        let top_level = doc
            .list(list)
            .is_some_and(|current| current.super_tasks().is_empty());
        if !top_level {
            continue;
        }
        let mut out = Vec::new();
        if let Some(name) = doc.list_name(list).filter(|name| !name.is_empty()) {
            out.push(name.trim_end().to_string());
        }
        render_list(doc, list, 0, &mut visited, &mut out);
        blocks.push(out.join("\n"));
    }
    blocks.join("\n\n")
}

fn render_list(
    doc: &TaskDocument,
    list: TaskListId,
    depth: usize,
    visited: &mut HashSet<TaskListId>,
    out: &mut Vec<String>,
) {
    if !visited.insert(list) {
        return;
    }
    let Some(current) = doc.list(list) else {
        return;
    };
    for task in current.tasks() {
        let Some(entity) = doc.task(*task) else {
            continue;
        };
        let mark = if entity.is_done() { 'x' } else { ' ' };
        let mut line = format!(
            "{}- [{}] {}",
            INDENT_STEP.repeat(depth),
            mark,
            doc.task_description(*task).unwrap_or_default().trim_end()
        );
        if entity.priority() != Priority::default() {
            line.push_str(&format!(" !{}", entity.priority().level()));
        }
        if let Some(due) = entity.due_date() {
            line.push_str(&format!(" @{}", due.format("%Y-%m-%d")));
        }
        out.push(line.trim_end().to_string());
        for sub in entity.subtasks() {
            render_list(doc, *sub, depth + 1, visited, out);
        }
    }
}

fn tokenize(line_no: usize, line: &str) -> Result<OutlineLine, OutlineError> {
    if line.contains(CHECKBOX) {
        return Err(OutlineError::ReservedCharacter { line: line_no });
    }
    let Some(caps) = TASK_LINE_RE.captures(line) else {
        return Ok(OutlineLine::Text(line.to_string()));
    };
    let indent = caps
        .name("indent")
        .map(|m| m.as_str().chars().map(|ch| if ch == '\t' { 2 } else { 1 }).sum())
        .unwrap_or(0);
    let done = caps.name("mark").is_some_and(|m| m.as_str() != " ");
    let mut text = caps
        .name("text")
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    let mut priority: Option<Priority> = None;
    let mut due_date: Option<NaiveDate> = None;
    while let Some(token) = TRAILING_TOKEN_RE.captures(&text) {
        let cut = token.get(0).map(|m| m.start()).unwrap_or(text.len());
        if let Some(value) = token.name("priority") {
            let value = value.as_str();
            let parsed = value
                .parse::<u8>()
                .ok()
                .and_then(Priority::from_level)
                .or_else(|| Priority::from_label(value));
            match parsed {
                Some(parsed) => {
                    priority.get_or_insert(parsed);
                }
                None => {
                    return Err(OutlineError::InvalidPriority {
                        line: line_no,
                        value: value.to_string(),
                    })
                }
            }
        }
        if let Some(value) = token.name("due") {
            let parsed = decode_due_date(value.as_str()).map_err(|_| OutlineError::InvalidDueDate {
                line: line_no,
                value: value.as_str().to_string(),
            })?;
            due_date.get_or_insert(parsed);
        }
        text.truncate(cut);
    }

    Ok(OutlineLine::Task {
        indent,
        text,
        attributes: TaskAttributes {
            done,
            priority: priority.unwrap_or_default(),
            due_date,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::{export_outline, import_outline, OutlineError};
    use crate::model::attributes::Priority;
    use crate::model::task::Attributed;
    use chrono::NaiveDate;

    #[test]
    fn title_tasks_and_tokens_are_imported() {
        let doc = import_outline("Groceries\n- [ ] milk !4 @2024-01-10\n- [x] eggs")
            .expect("outline imports");
        let lists = doc.task_lists();
        assert_eq!(lists.len(), 1);
        assert_eq!(doc.list_name(lists[0]).as_deref(), Some("Groceries"));

        let tasks = doc.list(lists[0]).map(|l| l.tasks().to_vec()).unwrap_or_default();
        assert_eq!(tasks.len(), 2);
        assert_eq!(doc.task_description(tasks[0]).as_deref(), Some("milk"));
        let milk = doc.task(tasks[0]).expect("milk exists");
        assert_eq!(milk.priority(), Priority::High);
        assert_eq!(milk.due_date(), NaiveDate::from_ymd_opt(2024, 1, 10));
        assert!(doc.task(tasks[1]).is_some_and(|t| t.is_done()));
    }

    #[test]
    fn indentation_nests_a_subtask_list() {
        let doc = import_outline("L\n- [ ] parent\n  - [ ] child\n- [ ] sibling")
            .expect("outline imports");
        assert_eq!(doc.graph().list_count(), 2);
        let top = doc.task_lists()[0];
        let tasks = doc.list(top).map(|l| l.tasks().to_vec()).unwrap_or_default();
        assert_eq!(tasks.len(), 2);
        let parent = doc.task(tasks[0]).expect("parent exists");
        assert_eq!(parent.subtasks().len(), 1);
        let sub = parent.subtasks()[0];
        assert_eq!(doc.list(sub).map(|l| l.tasks().len()), Some(1));
        assert_eq!(doc.list_name(sub).as_deref(), Some(""));
    }

    #[test]
    fn export_reproduces_canonical_outline() {
        let input = "Work\n- [ ] report !5 @2024-02-01\n  - [x] draft\n- [ ] email\n\n- [x] untitled";
        let doc = import_outline(input).expect("outline imports");
        assert_eq!(export_outline(&doc), input);
    }

    #[test]
    fn bad_tokens_and_orphan_indent_are_reported() {
        assert_eq!(
            import_outline("- [ ] x @2024-13-40").err(),
            Some(OutlineError::InvalidDueDate {
                line: 1,
                value: "2024-13-40".to_string()
            })
        );
        assert_eq!(
            import_outline("  - [ ] x").err(),
            Some(OutlineError::OrphanIndent { line: 1 })
        );
        assert!(matches!(
            import_outline("- [ ] x !urgentish"),
            Err(OutlineError::InvalidPriority { .. })
        ));
    }
}
