//! Typed task attributes and their tag encoding.
//!
//! # Responsibility
//! - Define `Priority` and the shared attribute set of tasks and task lists.
//! - Encode/decode attribute values to/from string-keyed tag maps.
//!
//! # Invariants
//! - `Priority::Normal` is the default; `Unset` is never produced by default.
//! - Due dates use locale-independent `YYYY-MM-DD` text.
//! - A malformed value only resets its own attribute to the default.

use crate::buffer::tag::{Attributes, TagId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const ATTR_DONE: &str = "Done";
pub const ATTR_DUE_DATE: &str = "Duedate";
pub const ATTR_PRIORITY: &str = "Priority";
pub const ATTR_SUPERTASKS: &str = "Supertasks";

const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Task urgency, ascending from `VeryLow` (1) to `VeryHigh` (5).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Explicitly cleared by the user.
    Unset,
    VeryLow,
    Low,
    #[default]
    Normal,
    High,
    VeryHigh,
}

impl Priority {
    pub const ALL: [Priority; 6] = [
        Priority::Unset,
        Priority::VeryLow,
        Priority::Low,
        Priority::Normal,
        Priority::High,
        Priority::VeryHigh,
    ];

    /// Persisted integer level.
    pub fn level(self) -> u8 {
        match self {
            Self::Unset => 0,
            Self::VeryLow => 1,
            Self::Low => 2,
            Self::Normal => 3,
            Self::High => 4,
            Self::VeryHigh => 5,
        }
    }

    pub fn from_level(level: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|priority| priority.level() == level)
    }

    /// Short label used by priority boxes and outlines.
    pub fn label(self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::VeryLow => "very-low",
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::VeryHigh => "very-high",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        Self::ALL
            .into_iter()
            .find(|priority| priority.label() == normalized)
    }
}

/// Attribute decode failure for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeError {
    InvalidDone(String),
    InvalidPriority(String),
    InvalidDueDate(String),
    InvalidTagReference(String),
}

impl Display for AttributeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDone(value) => write!(f, "invalid `{ATTR_DONE}` value `{value}`"),
            Self::InvalidPriority(value) => {
                write!(f, "invalid `{ATTR_PRIORITY}` value `{value}`")
            }
            Self::InvalidDueDate(value) => {
                write!(f, "invalid `{ATTR_DUE_DATE}` value `{value}`")
            }
            Self::InvalidTagReference(value) => {
                write!(f, "invalid `{ATTR_SUPERTASKS}` entry `{value}`")
            }
        }
    }
}

impl Error for AttributeError {}

/// Attribute values shared by tasks and task lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskAttributes {
    pub done: bool,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
}

impl TaskAttributes {
    /// Reads values from a tag map, falling back per attribute on errors.
    pub fn decode(attributes: &Attributes) -> (Self, Vec<AttributeError>) {
        let mut errors = Vec::new();
        let mut decoded = Self::default();

        if let Some(value) = attributes.get(ATTR_DONE) {
            match decode_done(value) {
                Ok(done) => decoded.done = done,
                Err(err) => errors.push(err),
            }
        }
        if let Some(value) = attributes.get(ATTR_PRIORITY) {
            match decode_priority(value) {
                Ok(priority) => decoded.priority = priority,
                Err(err) => errors.push(err),
            }
        }
        if let Some(value) = attributes.get(ATTR_DUE_DATE) {
            match decode_due_date(value) {
                Ok(date) => decoded.due_date = Some(date),
                Err(err) => errors.push(err),
            }
        }

        (decoded, errors)
    }

    /// Writes every value into a tag map. A missing due date removes the key.
    pub fn encode_into(&self, attributes: &mut Attributes) {
        attributes.insert(ATTR_DONE.to_string(), self.done.to_string());
        attributes.insert(
            ATTR_PRIORITY.to_string(),
            self.priority.level().to_string(),
        );
        match self.due_date {
            Some(date) => {
                attributes.insert(ATTR_DUE_DATE.to_string(), encode_due_date(date));
            }
            None => {
                attributes.remove(ATTR_DUE_DATE);
            }
        }
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.due_date.is_some_and(|due| due <= today)
    }
}

pub fn decode_done(value: &str) -> Result<bool, AttributeError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(AttributeError::InvalidDone(value.to_string())),
    }
}

pub fn decode_priority(value: &str) -> Result<Priority, AttributeError> {
    value
        .trim()
        .parse::<u8>()
        .ok()
        .and_then(Priority::from_level)
        .ok_or_else(|| AttributeError::InvalidPriority(value.to_string()))
}

pub fn decode_due_date(value: &str) -> Result<NaiveDate, AttributeError> {
    NaiveDate::parse_from_str(value.trim(), DUE_DATE_FORMAT)
        .map_err(|_| AttributeError::InvalidDueDate(value.to_string()))
}

pub fn encode_due_date(date: NaiveDate) -> String {
    date.format(DUE_DATE_FORMAT).to_string()
}

/// Parses a comma separated tag id list; bad entries are reported, not kept.
pub fn decode_supertasks(value: &str) -> (Vec<TagId>, Vec<AttributeError>) {
    let mut ids = Vec::new();
    let mut errors = Vec::new();
    for entry in value.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        match TagId::parse(entry) {
            Some(id) if !ids.contains(&id) => ids.push(id),
            Some(_) => {}
            None => errors.push(AttributeError::InvalidTagReference(entry.to_string())),
        }
    }
    (ids, errors)
}

pub fn encode_supertasks(ids: &[TagId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::{
        decode_supertasks, AttributeError, Priority, TaskAttributes, ATTR_DONE, ATTR_DUE_DATE,
        ATTR_PRIORITY,
    };
    use crate::buffer::tag::{Attributes, TagId};
    use chrono::NaiveDate;

    #[test]
    fn default_priority_is_normal() {
        assert_eq!(Priority::default(), Priority::Normal);
        assert_eq!(TaskAttributes::default().priority, Priority::Normal);
    }

    #[test]
    fn priority_levels_ascend_with_urgency() {
        assert!(Priority::VeryHigh > Priority::High);
        assert!(Priority::VeryLow > Priority::Unset);
        assert_eq!(Priority::from_level(5), Some(Priority::VeryHigh));
        assert_eq!(Priority::from_level(6), None);
        assert_eq!(Priority::from_label("Very High"), Some(Priority::VeryHigh));
    }

    #[test]
    fn encode_then_decode_keeps_values() {
        let attrs = TaskAttributes {
            done: true,
            priority: Priority::High,
            due_date: NaiveDate::from_ymd_opt(2024, 1, 10),
        };
        let mut map = Attributes::new();
        attrs.encode_into(&mut map);
        assert_eq!(map.get(ATTR_DUE_DATE).map(String::as_str), Some("2024-01-10"));
        assert_eq!(map.get(ATTR_PRIORITY).map(String::as_str), Some("4"));

        let (decoded, errors) = TaskAttributes::decode(&map);
        assert!(errors.is_empty());
        assert_eq!(decoded, attrs);
    }

    #[test]
    fn malformed_values_fall_back_per_attribute() {
        let mut map = Attributes::new();
        map.insert(ATTR_DONE.to_string(), "True".to_string());
        map.insert(ATTR_PRIORITY.to_string(), "urgent".to_string());
        map.insert(ATTR_DUE_DATE.to_string(), "10/01/2024".to_string());

        let (decoded, errors) = TaskAttributes::decode(&map);
        assert!(decoded.done);
        assert_eq!(decoded.priority, Priority::Normal);
        assert_eq!(decoded.due_date, None);
        assert_eq!(
            errors,
            vec![
                AttributeError::InvalidPriority("urgent".to_string()),
                AttributeError::InvalidDueDate("10/01/2024".to_string()),
            ]
        );
    }

    #[test]
    fn missing_due_date_removes_the_key() {
        let mut map = Attributes::new();
        map.insert(ATTR_DUE_DATE.to_string(), "2024-01-10".to_string());
        TaskAttributes::default().encode_into(&mut map);
        assert!(!map.contains_key(ATTR_DUE_DATE));
    }

    #[test]
    fn supertasks_skip_bad_and_duplicate_entries() {
        let id = TagId::new();
        let (ids, errors) = decode_supertasks(&format!("{id}, nope ,{id},"));
        assert_eq!(ids, vec![id]);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn overdue_includes_today() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date");
        let mut attrs = TaskAttributes::default();
        assert!(!attrs.is_overdue(today));
        attrs.due_date = Some(today);
        assert!(attrs.is_overdue(today));
        attrs.due_date = today.succ_opt();
        assert!(!attrs.is_overdue(today));
    }
}
