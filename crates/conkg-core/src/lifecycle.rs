use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::EntityType;
use crate::error::{ConkgError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl IssueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Open => "open",
            IssueStatus::InProgress => "in_progress",
            IssueStatus::Resolved => "resolved",
            IssueStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match normalize(s).as_str() {
            "open" | "new" | "reopened" => Some(IssueStatus::Open),
            "in_progress" | "active" => Some(IssueStatus::InProgress),
            "resolved" | "fixed" => Some(IssueStatus::Resolved),
            "closed" | "done" => Some(IssueStatus::Closed),
            _ => None,
        }
    }

    pub fn can_transition(self, to: IssueStatus) -> bool {
        use IssueStatus::*;
        matches!(
            (self, to),
            (Open, InProgress)
                | (InProgress, Resolved)
                | (Resolved, Closed)
                | (Resolved, Open)
                | (Closed, Open)
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    Blocked,
    Complete,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not_started",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Complete => "complete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match normalize(s).as_str() {
            "not_started" | "planned" | "pending" => Some(TaskStatus::NotStarted),
            "in_progress" | "active" | "started" => Some(TaskStatus::InProgress),
            "blocked" | "on_hold" => Some(TaskStatus::Blocked),
            "complete" | "completed" | "done" => Some(TaskStatus::Complete),
            _ => None,
        }
    }

    pub fn can_transition(self, to: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, to),
            (NotStarted, InProgress)
                | (NotStarted, Blocked)
                | (InProgress, Complete)
                | (InProgress, Blocked)
                | (Blocked, InProgress)
                | (Complete, InProgress)
        )
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase().replace([' ', '-'], "_")
}

/// Check a status change for an entity of `entity_type`.
///
/// `current` is the stored status, if any; an entity with no status is treated
/// as being at the start of its lifecycle. Returns the canonical spelling of
/// the new status.
pub fn check_transition(
    entity_type: EntityType,
    current: Option<&str>,
    requested: &str,
) -> Result<String> {
    match entity_type {
        EntityType::Issue => {
            let to = IssueStatus::parse(requested).ok_or_else(|| {
                ConkgError::Validation(format!("unknown issue status '{requested}'"))
            })?;
            let from = match current {
                Some(s) => IssueStatus::parse(s).unwrap_or(IssueStatus::Open),
                None => IssueStatus::Open,
            };
            if from == to || from.can_transition(to) {
                Ok(to.as_str().to_string())
            } else {
                Err(ConkgError::Validation(format!(
                    "issue cannot move from {from} to {to}"
                )))
            }
        }
        EntityType::Task => {
            let to = TaskStatus::parse(requested).ok_or_else(|| {
                ConkgError::Validation(format!("unknown task status '{requested}'"))
            })?;
            let from = match current {
                Some(s) => TaskStatus::parse(s).unwrap_or(TaskStatus::NotStarted),
                None => TaskStatus::NotStarted,
            };
            if from == to || from.can_transition(to) {
                Ok(to.as_str().to_string())
            } else {
                Err(ConkgError::Validation(format!(
                    "task cannot move from {from} to {to}"
                )))
            }
        }
        other => Err(ConkgError::Validation(format!(
            "{} entities have no status lifecycle",
            other.label()
        ))),
    }
}
