//! Incremental repair of the task structure after user edits.
//!
//! `engine` classifies buffer edits and runs the deferred fixes defined in
//! `fix` once the user action that caused them has ended.

pub mod engine;
pub mod fix;

pub use engine::{RepairEngine, RepairReport};
pub use fix::{FixAction, FixKind, FixPriority, FixQueue, SuspendGuard, Suspension};
