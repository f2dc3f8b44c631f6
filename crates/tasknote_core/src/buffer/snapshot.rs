//! Serializable buffer snapshots.
//!
//! # Responsibility
//! - Capture text, tag payloads and tag runs in a host-neutral shape.
//! - Restore a buffer from such a capture.
//!
//! # Invariants
//! - Runs are maximal, non-overlapping `[start, end)` character ranges.
//! - Restoring rejects runs that fall outside the text.

use crate::buffer::tag::{Tag, TagId, TagKind};
use crate::buffer::TextBuffer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Full capture of one note buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSnapshot {
    pub text: String,
    pub tags: Vec<TagSnapshot>,
}

/// One tag, its payload and where it is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSnapshot {
    pub id: TagId,
    pub kind: TagKind,
    pub runs: Vec<(usize, usize)>,
}

#[derive(Debug)]
pub enum SnapshotError {
    Json(serde_json::Error),
    RunOutOfBounds {
        tag: TagId,
        start: usize,
        end: usize,
        len: usize,
    },
}

impl Display for SnapshotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid snapshot json: {err}"),
            Self::RunOutOfBounds {
                tag,
                start,
                end,
                len,
            } => write!(
                f,
                "tag {tag} run {start}..{end} exceeds text length {len}"
            ),
        }
    }
}

impl Error for SnapshotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::RunOutOfBounds { .. } => None,
        }
    }
}

impl From<serde_json::Error> for SnapshotError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl NoteSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(self).map_err(Into::into)
    }

    pub fn from_json(value: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(value).map_err(Into::into)
    }
}

impl TextBuffer {
    /// Captures text and tags. Tags are ordered by first run, then id.
    pub fn snapshot(&self) -> NoteSnapshot {
        let mut runs: HashMap<TagId, Vec<(usize, usize)>> = HashMap::new();
        for (pos, cell) in self.cells().iter().enumerate() {
            for tag in &cell.tags {
                let tag_runs = runs.entry(*tag).or_default();
                match tag_runs.last_mut() {
                    Some(last) if last.1 == pos => last.1 = pos + 1,
                    _ => tag_runs.push((pos, pos + 1)),
                }
            }
        }

        let mut tags: Vec<TagSnapshot> = self
            .tag_table()
            .iter()
            .map(|tag| TagSnapshot {
                id: tag.id,
                kind: tag.kind.clone(),
                runs: runs.remove(&tag.id).unwrap_or_default(),
            })
            .collect();
        tags.sort_by_key(|tag| (tag.runs.first().map(|run| run.0), tag.id));

        NoteSnapshot {
            text: self.text(),
            tags,
        }
    }

    /// Rebuilds a buffer from a snapshot. Markers and journal start empty.
    pub fn from_snapshot(snapshot: &NoteSnapshot) -> Result<Self, SnapshotError> {
        let mut buffer = TextBuffer::from_text(&snapshot.text);
        let len = buffer.len();
        for tag in &snapshot.tags {
            for &(start, end) in &tag.runs {
                if start > end || end > len {
                    return Err(SnapshotError::RunOutOfBounds {
                        tag: tag.id,
                        start,
                        end,
                        len,
                    });
                }
            }
            buffer.tag_table_mut().insert(Tag {
                id: tag.id,
                kind: tag.kind.clone(),
            });
            for &(start, end) in &tag.runs {
                buffer.apply_tag(tag.id, start..end);
            }
        }
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::{NoteSnapshot, SnapshotError, TagSnapshot};
    use crate::buffer::tag::{TagId, TagKind, TaskListTag};
    use crate::buffer::TextBuffer;

    #[test]
    fn snapshot_records_maximal_runs() {
        let mut buffer = TextBuffer::from_text("abcdef");
        let list = buffer.create_tag(TagKind::TaskList(TaskListTag::default()));
        buffer.apply_tag(list, 0..2);
        buffer.apply_tag(list, 4..6);

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.tags.len(), 1);
        assert_eq!(snapshot.tags[0].runs, vec![(0, 2), (4, 6)]);

        let json = snapshot.to_json().expect("serialize snapshot");
        let decoded = NoteSnapshot::from_json(&json).expect("decode snapshot");
        let restored = TextBuffer::from_snapshot(&decoded).expect("restore snapshot");
        assert_eq!(restored.text(), "abcdef");
        assert!(restored.has_tag(5, list));
        assert!(!restored.has_tag(3, list));
    }

    #[test]
    fn restore_rejects_runs_past_the_text() {
        let snapshot = NoteSnapshot {
            text: "ab".to_string(),
            tags: vec![TagSnapshot {
                id: TagId::new(),
                kind: TagKind::TaskList(TaskListTag::default()),
                runs: vec![(1, 5)],
            }],
        };
        let err = TextBuffer::from_snapshot(&snapshot).expect_err("run is out of bounds");
        assert!(matches!(err, SnapshotError::RunOutOfBounds { len: 2, .. }));
    }
}
