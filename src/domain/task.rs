use crate::domain::column::ColumnId;
use crate::error::BoardError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Unique identifier for a task
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Creates a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Priority of a task
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(BoardError::validation(
                "priority",
                format!("'{}' is not one of low, medium, high", s),
            )),
        }
    }
}

/// Parses a due date from form or storage input.
///
/// Accepts a plain `YYYY-MM-DD` day or an RFC 3339 timestamp. For timestamps
/// the calendar day is taken exactly as written, ignoring the offset, so the
/// same input always yields the same day whatever the local timezone.
pub fn parse_due_date(input: &str) -> Result<NaiveDate, BoardError> {
    let input = input.trim();
    if let Ok(day) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(day);
    }
    DateTime::parse_from_rfc3339(input)
        .map(|ts| ts.date_naive())
        .map_err(|_| {
            BoardError::validation("due_date", format!("'{}' is not a calendar date", input))
        })
}

/// A task card on the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub column_id: ColumnId,
    pub position: usize,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a new task with a fresh ID. Placement is assigned on insertion.
    pub fn new(title: impl Into<String>, column_id: ColumnId) -> Self {
        Self::with_id(TaskId::generate(), title, column_id)
    }

    pub fn with_id(id: TaskId, title: impl Into<String>, column_id: ColumnId) -> Self {
        let now = Utc::now();
        Self {
            id,
            column_id,
            position: 0,
            title: title.into(),
            description: None,
            assignee: None,
            priority: Priority::default(),
            due_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Copies the editable attributes of `other`, keeping identity and placement
    pub fn apply_edits(&mut self, other: &Task) {
        self.title = other.title.clone();
        self.description = other.description.clone();
        self.assignee = other.assignee.clone();
        self.priority = other.priority;
        self.due_date = other.due_date;
        self.updated_at = Utc::now();
    }
}
