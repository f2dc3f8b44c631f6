//! Dynamic formatting tags carrying task metadata.
//!
//! # Responsibility
//! - Identify every task, task-list and decorative span instance.
//! - Hold the string-keyed attribute map persisted by the host.
//!
//! # Invariants
//! - One `TagId` names exactly one logical entity region.
//! - Attribute values are plain strings; typed decoding lives in
//!   `model::attributes`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// String-keyed attribute map of one tag instance.
pub type Attributes = BTreeMap<String, String>;

/// Stable tag identity, also used as the identity of the entity it backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(Uuid);

impl TagId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parses the textual form written into `Supertasks` attributes.
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value.trim()).ok().map(Self)
    }
}

impl Default for TagId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TagId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payload of a task-list region tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskListTag {
    pub attributes: Attributes,
}

/// Payload of a task region tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTag {
    pub attributes: Attributes,
}

/// Payload of a decorative span owned by a task or task list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributedTag {
    pub owner: TagId,
    pub attributes: Attributes,
}

/// Tag variants recognized by the region registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TagKind {
    TaskList(TaskListTag),
    Task(TaskTag),
    Attributed(AttributedTag),
}

/// Payload-free discriminant of `TagKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagClass {
    TaskList,
    Task,
    Attributed,
}

/// One tag instance registered in a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: TagId,
    pub kind: TagKind,
}

impl Tag {
    pub fn class(&self) -> TagClass {
        match self.kind {
            TagKind::TaskList(_) => TagClass::TaskList,
            TagKind::Task(_) => TagClass::Task,
            TagKind::Attributed(_) => TagClass::Attributed,
        }
    }

    pub fn attributes(&self) -> &Attributes {
        match &self.kind {
            TagKind::TaskList(payload) => &payload.attributes,
            TagKind::Task(payload) => &payload.attributes,
            TagKind::Attributed(payload) => &payload.attributes,
        }
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        match &mut self.kind {
            TagKind::TaskList(payload) => &mut payload.attributes,
            TagKind::Task(payload) => &mut payload.attributes,
            TagKind::Attributed(payload) => &mut payload.attributes,
        }
    }

    /// Decorative spans owned by an entity report that entity.
    pub fn owner(&self) -> Option<TagId> {
        match &self.kind {
            TagKind::Attributed(payload) => Some(payload.owner),
            _ => None,
        }
    }
}

/// Tag registry of one buffer.
#[derive(Debug, Default)]
pub struct TagTable {
    tags: HashMap<TagId, Tag>,
}

impl TagTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, kind: TagKind) -> TagId {
        let id = TagId::new();
        self.insert(Tag { id, kind });
        id
    }

    /// Registers a tag with a known identity (snapshot restore).
    pub fn insert(&mut self, tag: Tag) {
        self.tags.insert(tag.id, tag);
    }

    pub fn get(&self, id: TagId) -> Option<&Tag> {
        self.tags.get(&id)
    }

    pub fn get_mut(&mut self, id: TagId) -> Option<&mut Tag> {
        self.tags.get_mut(&id)
    }

    pub fn remove(&mut self, id: TagId) -> Option<Tag> {
        self.tags.remove(&id)
    }

    pub fn class_of(&self, id: TagId) -> Option<TagClass> {
        self.tags.get(&id).map(Tag::class)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
