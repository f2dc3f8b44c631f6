//! Engine configuration and the date source.
//!
//! # Responsibility
//! - Hold the user-tunable knobs of a task session.
//! - Supply "today" for overdue checks and due-date suggestions.
//!
//! # Invariants
//! - Missing JSON fields take their defaults.
//! - `Priority::Unset` is never accepted as the default priority.

use crate::model::attributes::Priority;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ConfigError {
    /// Input is not valid JSON for the config shape.
    Json(serde_json::Error),
    /// `default_priority` must be an actual level.
    UnsetDefaultPriority,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid engine config: {err}"),
            Self::UnsetDefaultPriority => write!(f, "default_priority cannot be `unset`"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::UnsetDefaultPriority => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Complete super tasks once all of their subtasks are done.
    pub propagate_done: bool,
    /// Copy a toggled task's state onto its subtasks.
    pub cascade_done: bool,
    /// Show priority boxes on newly added tasks.
    pub show_priority: bool,
    /// Priority of tasks created by the user.
    pub default_priority: Priority,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            propagate_done: true,
            cascade_done: true,
            show_priority: false,
            default_priority: Priority::Normal,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON config document.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_priority == Priority::Unset {
            return Err(ConfigError::UnsetDefaultPriority);
        }
        Ok(())
    }
}

/// Source of the current date.
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

/// Local calendar date of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Always reports the same date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, ConfigError, EngineConfig, FixedClock};
    use crate::model::attributes::Priority;
    use chrono::NaiveDate;

    #[test]
    fn missing_fields_take_defaults() {
        let config = EngineConfig::from_json_str(r#"{"show_priority": true}"#)
            .expect("partial config should parse");
        assert!(config.show_priority);
        assert!(config.propagate_done);
        assert_eq!(config.default_priority, Priority::Normal);
    }

    #[test]
    fn unset_default_priority_is_rejected() {
        let error = EngineConfig::from_json_str(r#"{"default_priority": "unset"}"#)
            .expect_err("unset must be rejected");
        assert!(matches!(error, ConfigError::UnsetDefaultPriority));
    }

    #[test]
    fn malformed_json_reports_source() {
        let error = EngineConfig::from_json_str("{").expect_err("broken json must fail");
        assert!(matches!(error, ConfigError::Json(_)));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn fixed_clock_is_fixed() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 10).expect("valid date");
        assert_eq!(FixedClock(date).today(), date);
    }
}
