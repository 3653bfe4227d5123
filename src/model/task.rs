use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Task priority as stored by the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::None => "none",
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    /// Single-character marker used in tree output
    pub fn marker(self) -> Option<char> {
        match self {
            Priority::None => None,
            Priority::Low => Some('!'),
            Priority::Medium => Some('‼'),
            Priority::High => Some('🔴'),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Priority::None),
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

/// Repetition cadence detected in natural-language input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    Daily,
    Weekly,
    Monthly,
}

/// One to-do entry with its nested sub-tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNode {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, with = "crate::model::datetime::option")]
    pub due_date: Option<DateTime<FixedOffset>>,
    #[serde(
        default,
        with = "crate::model::datetime::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub reminder_date: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub children: Vec<TaskNode>,
}

impl TaskNode {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        TaskNode {
            id: id.into(),
            description: description.into(),
            is_completed: false,
            priority: Priority::None,
            due_date: None,
            reminder_date: None,
            order: 0,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<TaskNode>) -> Self {
        self.children = children;
        self
    }

    pub fn completed(mut self, is_completed: bool) -> Self {
        self.is_completed = is_completed;
        self
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Set this node and every descendant to `completed`.
    pub fn set_completed_recursive(&mut self, completed: bool) {
        self.is_completed = completed;
        for child in &mut self.children {
            child.set_completed_recursive(completed);
        }
    }
}

/// A due date with a midnight wall time carries no time of day.
pub fn is_date_only(due: &DateTime<FixedOffset>) -> bool {
    due.time() == NaiveTime::MIN && due.nanosecond() == 0
}
