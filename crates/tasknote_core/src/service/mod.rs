//! Caller-facing task services.
//!
//! # Responsibility
//! - Expose the operations a note editor invokes on its task structure.
//! - Keep editor and menu layers free of structural logic.

pub mod notebook;
pub mod outline;
pub mod task_service;
