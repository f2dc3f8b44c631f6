//! Core logic for task lists embedded in rich-text notes.
//!
//! Tasks live in the note text itself: a checkbox character plus tags
//! spanning the line. This crate recovers task structure from that text,
//! keeps it consistent while the user edits, and answers questions about it.

pub mod buffer;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod parser;
pub mod region;
pub mod repair;
pub mod service;
pub mod traversal;

pub use buffer::snapshot::{NoteSnapshot, SnapshotError};
pub use buffer::{EditEvent, TextBuffer, CHECKBOX};
pub use config::{Clock, ConfigError, EngineConfig, FixedClock, SystemClock};
pub use error::{TaskError, TaskResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::attributes::{Priority, TaskAttributes};
pub use model::document::TaskDocument;
pub use model::graph::TaskGraph;
pub use model::task::{EntityRef, Task, TaskId, TaskList, TaskListId};
pub use repair::{RepairEngine, RepairReport};
pub use service::notebook::{has_open_tasks, has_overdue_tasks};
pub use service::outline::{export_outline, import_outline, OutlineError};
pub use service::task_service::NoteTasks;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
