use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Task priority as the service encodes it on the wire ("low"/"medium"/"high")
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn display_name(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Error)]
#[error("invalid priority '{0}' (expected low, medium, or high)")]
pub struct ParsePriorityError(String);

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" | "med" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(ParsePriorityError(s.to_string())),
        }
    }
}

/// A task as the remote service represents it. Never persisted locally;
/// this client is a pass-through view over the API's copy.
///
/// Timestamps stay as the wire gives them (the service has emitted both
/// snake_case and camelCase over time) and are normalized only for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Todo {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default, alias = "dueDate")]
    pub due_date: Option<String>,
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<String>,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<String>,
    #[serde(default, alias = "completedAt")]
    pub completed_at: Option<String>,
}

impl Todo {
    pub fn status_label(&self) -> &'static str {
        if self.completed {
            "Completed"
        } else {
            "Pending"
        }
    }
}

/// Payload for `POST /addtodo`
#[derive(Debug, Clone, Serialize)]
pub struct NewTodo {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

/// Full-edit payload for `PUT /todos/:id`
#[derive(Debug, Clone, Serialize)]
pub struct TodoUpdate {
    pub title: String,
    pub description: String,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_todo() {
        let json = r#"{"id": 12, "title": "Buy milk", "description": "2%",
                       "completed": false, "priority": "high",
                       "due_date": "2026-08-10"}"#;
        let todo: Todo = serde_json::from_str(json).expect("todo should parse");
        assert_eq!(todo.id, 12);
        assert_eq!(todo.priority, Some(Priority::High));
        assert_eq!(todo.status_label(), "Pending");
    }

    #[test]
    fn test_parse_todo_camel_case_timestamps() {
        let json = r#"{"id": 3, "title": "Ship it", "completed": true,
                       "completedAt": "2026-07-01T12:30:00Z",
                       "createdAt": "2026-06-20T08:00:00Z"}"#;
        let todo: Todo = serde_json::from_str(json).expect("todo should parse");
        assert_eq!(todo.status_label(), "Completed");
        assert_eq!(todo.completed_at.as_deref(), Some("2026-07-01T12:30:00Z"));
        assert!(todo.description.is_empty());
    }

    #[test]
    fn test_priority_round_trip() {
        let json = serde_json::to_string(&Priority::Medium).expect("priority should serialize");
        assert_eq!(json, "\"medium\"");
        let back: Priority = serde_json::from_str(&json).expect("priority should parse");
        assert_eq!(back, Priority::Medium);
    }

    #[test]
    fn test_priority_from_str() {
        assert_eq!("HIGH".parse::<Priority>().expect("parses"), Priority::High);
        assert_eq!("med".parse::<Priority>().expect("parses"), Priority::Medium);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn test_new_todo_omits_unset_fields() {
        let todo = NewTodo {
            title: "Call dentist".to_string(),
            description: String::new(),
            completed: None,
            priority: None,
            due_date: None,
        };
        let json = serde_json::to_string(&todo).expect("payload should serialize");
        assert!(!json.contains("priority"));
        assert!(!json.contains("due_date"));
        assert!(!json.contains("completed"));
    }
}
