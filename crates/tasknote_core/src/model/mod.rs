//! Task structure recovered from note text.
//!
//! # Responsibility
//! - Define task and task-list entities and their attribute views.
//! - Pair a note's text buffer with the entity graph in `TaskDocument`.
//!
//! # Invariants
//! - Every entity is identified by the tag that spans its text.
//! - Attribute values live on the tag; entities only cache them.

pub mod attributes;
pub mod document;
pub mod graph;
pub mod task;
