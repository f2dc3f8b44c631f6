//! Command-line probe for the task engine.
//!
//! # Responsibility
//! - Without arguments, verify `tasknote_core` linkage.
//! - With an outline file, import it and print its task lists and the
//!   notebook-level open/overdue flags.
//!
//! Set `TASKNOTE_LOG_DIR` to an absolute directory to enable file logging.

use std::process::ExitCode;
use tasknote_core::model::task::Attributed;
use tasknote_core::{
    default_log_level, has_open_tasks, has_overdue_tasks, import_outline, init_logging, Clock,
    SystemClock, TaskDocument, TaskListId,
};

fn main() -> ExitCode {
    if let Ok(dir) = std::env::var("TASKNOTE_LOG_DIR") {
        if let Err(err) = init_logging(default_log_level(), &dir) {
            eprintln!("tasknote: logging disabled: {err}");
        }
    }

    let Some(path) = std::env::args().nth(1) else {
        println!("tasknote_core ping={}", tasknote_core::ping());
        println!("tasknote_core version={}", tasknote_core::core_version());
        return ExitCode::SUCCESS;
    };

    match summarize(&path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("tasknote: {message}");
            ExitCode::FAILURE
        }
    }
}

fn summarize(path: &str) -> Result<(), String> {
    let input =
        std::fs::read_to_string(path).map_err(|err| format!("cannot read `{path}`: {err}"))?;
    let mut doc = import_outline(&input).map_err(|err| format!("{path}: {err}"))?;

    let top_level: Vec<TaskListId> = doc
        .task_lists()
        .into_iter()
        .filter(|id| doc.list(*id).is_some_and(|list| list.super_tasks().is_empty()))
        .collect();
    for list in top_level {
        print_list(&doc, list, 0);
    }

    let today = SystemClock.today();
    println!("open={}", has_open_tasks(&mut doc));
    println!("overdue={}", has_overdue_tasks(&mut doc, today));
    log::info!(
        "event=cli_summary module=cli status=ok lists={} tasks={}",
        doc.graph().list_count(),
        doc.graph().task_count()
    );
    Ok(())
}

fn print_list(doc: &TaskDocument, id: TaskListId, depth: usize) {
    let Some(list) = doc.list(id) else {
        return;
    };
    let indent = "  ".repeat(depth);
    let name = doc.list_name(id).unwrap_or_default();
    if !name.is_empty() {
        println!("{indent}# {name}");
    }
    for task_id in list.tasks() {
        let Some(task) = doc.task(*task_id) else {
            continue;
        };
        let mark = if task.is_done() { 'x' } else { ' ' };
        let description = doc.task_description(*task_id).unwrap_or_default();
        let due = task
            .due_date()
            .map(|date| format!(" due={date}"))
            .unwrap_or_default();
        println!(
            "{indent}[{mark}] {description} priority={}{due}",
            task.priority().label()
        );
        for sublist in task.subtasks() {
            print_list(doc, *sublist, depth + 1);
        }
    }
}
