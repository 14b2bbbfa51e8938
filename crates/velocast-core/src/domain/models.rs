use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{SprintState, UtcDateTime, ValidationError};

/// Canonical work item type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Story,
    Task,
    Bug,
    Epic,
    Other,
}

impl IssueType {
    /// Map a tracker issue type name onto the canonical set.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "story" | "user story" => Self::Story,
            "task" | "sub-task" | "subtask" => Self::Task,
            "bug" | "defect" => Self::Bug,
            "epic" => Self::Epic,
            _ => Self::Other,
        }
    }
}

/// Assignee reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub account_id: Option<String>,
    pub display_name: String,
}

/// Deployment-independent issue record.
///
/// Absent measurements stay `None`: an issue without points has no points,
/// which is not the same thing as zero points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalIssue {
    pub key: String,
    pub summary: String,
    pub issue_type: IssueType,
    pub status: String,
    pub done: bool,
    pub assignee: Option<Person>,
    pub points: Option<f64>,
    pub time_spent_seconds: Option<u64>,
    pub time_remaining_seconds: Option<u64>,
    pub labels: Vec<String>,
    pub blockers: Vec<String>,
    pub epic_link: Option<String>,
    pub has_description: bool,
    pub has_acceptance_criteria: bool,
}

/// Sprint metadata as enumerated from a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sprint {
    pub id: u64,
    pub name: String,
    pub state: SprintState,
    pub start: Option<UtcDateTime>,
    pub end: Option<UtcDateTime>,
    pub goal: Option<String>,
}

/// Issue collection for one sprint failed; the sprint must not count as zero velocity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSprintFailure {
    pub sprint_id: u64,
    pub sprint_name: String,
    pub reason: String,
}

/// One sprint together with every issue collected for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SprintResult {
    pub sprint: Sprint,
    pub issues: Vec<CanonicalIssue>,
    pub failure: Option<PartialSprintFailure>,
}

impl SprintResult {
    pub fn new(sprint: Sprint, issues: Vec<CanonicalIssue>) -> Self {
        Self {
            sprint,
            issues,
            failure: None,
        }
    }

    /// Sprint present with no issues and a recorded failure.
    pub fn failed(sprint: Sprint, reason: impl Into<String>) -> Self {
        let failure = PartialSprintFailure {
            sprint_id: sprint.id,
            sprint_name: sprint.name.clone(),
            reason: reason.into(),
        };
        Self {
            sprint,
            issues: Vec::new(),
            failure: Some(failure),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Distinct assignee display names, sorted.
    pub fn team_members(&self) -> Vec<String> {
        self.issues
            .iter()
            .filter_map(|issue| issue.assignee.as_ref())
            .map(|person| person.display_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Achieved work for one completed sprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityRecord {
    pub sprint_id: u64,
    pub sprint_name: String,
    pub start: Option<UtcDateTime>,
    pub end: UtcDateTime,
    pub achieved_points: f64,
    pub achieved_seconds: u64,
    pub duration_days: Option<f64>,
    /// Person-days the team had available during the sprint.
    pub available_days: Option<f64>,
}

impl VelocityRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sprint_id: u64,
        sprint_name: impl Into<String>,
        start: Option<UtcDateTime>,
        end: UtcDateTime,
        achieved_points: f64,
        achieved_seconds: u64,
        duration_days: Option<f64>,
        available_days: Option<f64>,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("achieved_points", achieved_points)?;
        validate_optional_non_negative("duration_days", duration_days)?;
        validate_optional_non_negative("available_days", available_days)?;

        Ok(Self {
            sprint_id,
            sprint_name: sprint_name.into(),
            start,
            end,
            achieved_points,
            achieved_seconds,
            duration_days,
            available_days,
        })
    }
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidMeasure {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn validate_optional_non_negative(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        validate_non_negative(field, value)?;
    }
    Ok(())
}
