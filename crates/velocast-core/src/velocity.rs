//! Reduce a [`SprintResult`] into a [`VelocityRecord`].

use std::fmt::{Display, Formatter};

use crate::domain::{SprintResult, SprintState, VelocityRecord};
use crate::ValidationError;

/// Person-days assumed per team member when availability is not supplied.
pub const DEFAULT_DAYS_PER_MEMBER: f64 = 10.0;

/// Why a sprint produced no velocity record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    /// Issue collection failed; the sprint is unknown, not zero.
    FetchFailed { reason: String },
    /// The sprint has not ended yet.
    NotClosed { state: SprintState },
    /// The record could not be built.
    Invalid(ValidationError),
}

impl Display for Exclusion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FetchFailed { reason } => write!(f, "issue collection failed: {reason}"),
            Self::NotClosed { state } => write!(f, "sprint is {state}; only closed sprints with an end date count"),
            Self::Invalid(error) => write!(f, "invalid velocity record: {error}"),
        }
    }
}

/// Sums achieved work over done issues.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityAggregator {
    days_per_member: f64,
}

impl Default for VelocityAggregator {
    fn default() -> Self {
        Self {
            days_per_member: DEFAULT_DAYS_PER_MEMBER,
        }
    }
}

impl VelocityAggregator {
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidAvailability`] for a negative or non-finite value.
    pub fn with_days_per_member(days_per_member: f64) -> Result<Self, ValidationError> {
        if !days_per_member.is_finite() || days_per_member < 0.0 {
            return Err(ValidationError::InvalidAvailability {
                value: days_per_member.to_string(),
            });
        }
        Ok(Self { days_per_member })
    }

    /// Achieved points and logged seconds over done issues of one sprint.
    ///
    /// Issues without points or time contribute nothing. A sprint with no done
    /// issues yields `(0, 0)`. Failed and unfinished sprints are excluded.
    pub fn achieved(&self, result: &SprintResult) -> Result<VelocityRecord, Exclusion> {
        if let Some(failure) = &result.failure {
            return Err(Exclusion::FetchFailed {
                reason: failure.reason.clone(),
            });
        }
        let sprint = &result.sprint;
        let Some(end) = sprint.end else {
            return Err(Exclusion::NotClosed {
                state: sprint.state,
            });
        };
        if sprint.state != SprintState::Closed {
            return Err(Exclusion::NotClosed {
                state: sprint.state,
            });
        }

        let done = result.issues.iter().filter(|issue| issue.done);
        let (points, seconds) = done.fold((0.0_f64, 0_u64), |(points, seconds), issue| {
            (
                points + issue.points.unwrap_or(0.0),
                seconds.saturating_add(issue.time_spent_seconds.unwrap_or(0)),
            )
        });

        let members = result.team_members().len();
        let available_days = (members > 0).then(|| members as f64 * self.days_per_member);

        VelocityRecord::new(
            sprint.id,
            sprint.name.clone(),
            sprint.start,
            end,
            points,
            seconds,
            sprint.start.map(|start| start.days_until(end).max(0.0)),
            available_days,
        )
        .map_err(Exclusion::Invalid)
    }

    /// Records for every result that qualifies, plus the exclusions, in input order.
    pub fn aggregate<'a, I>(&self, results: I) -> (Vec<VelocityRecord>, Vec<(u64, Exclusion)>)
    where
        I: IntoIterator<Item = &'a SprintResult>,
    {
        let mut records = Vec::new();
        let mut excluded = Vec::new();
        for result in results {
            match self.achieved(result) {
                Ok(record) => records.push(record),
                Err(exclusion) => {
                    tracing::debug!(sprint_id = result.sprint.id, %exclusion, "sprint excluded from history");
                    excluded.push((result.sprint.id, exclusion));
                }
            }
        }
        (records, excluded)
    }
}

/// `"{h}h {m}m"` rendering of logged seconds.
pub fn format_hours_minutes(seconds: u64) -> String {
    let hours = seconds / 3_600;
    let minutes = (seconds % 3_600) / 60;
    format!("{hours}h {minutes}m")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CanonicalIssue, IssueType, Person, Sprint, UtcDateTime};

    fn closed_sprint(id: u64) -> Sprint {
        Sprint {
            id,
            name: format!("Sprint {id}"),
            state: SprintState::Closed,
            start: Some(UtcDateTime::parse("2024-01-01T00:00:00Z").expect("start")),
            end: Some(UtcDateTime::parse("2024-01-15T00:00:00Z").expect("end")),
            goal: None,
        }
    }

    fn issue(key: &str, done: bool, points: Option<f64>, seconds: Option<u64>, who: &str) -> CanonicalIssue {
        CanonicalIssue {
            key: key.to_owned(),
            summary: String::new(),
            issue_type: IssueType::Story,
            status: String::from(if done { "Done" } else { "In Progress" }),
            done,
            assignee: Some(Person {
                account_id: None,
                display_name: who.to_owned(),
            }),
            points,
            time_spent_seconds: seconds,
            time_remaining_seconds: None,
            labels: Vec::new(),
            blockers: Vec::new(),
            epic_link: None,
            has_description: true,
            has_acceptance_criteria: true,
        }
    }

    #[test]
    fn sums_only_done_issues() {
        let result = SprintResult::new(
            closed_sprint(1),
            vec![
                issue("V-1", true, Some(5.0), Some(3_600), "Rae"),
                issue("V-2", true, None, Some(1_800), "Jo"),
                issue("V-3", false, Some(8.0), Some(7_200), "Rae"),
            ],
        );

        let record = VelocityAggregator::default().achieved(&result).expect("record");

        assert_eq!(record.achieved_points, 5.0);
        assert_eq!(record.achieved_seconds, 5_400);
        assert_eq!(record.duration_days, Some(14.0));
        assert_eq!(record.available_days, Some(20.0));
    }

    #[test]
    fn zero_done_issues_is_a_valid_zero_record() {
        let result = SprintResult::new(
            closed_sprint(2),
            vec![issue("V-4", false, Some(3.0), None, "Rae")],
        );

        let record = VelocityAggregator::default().achieved(&result).expect("record");
        assert_eq!((record.achieved_points, record.achieved_seconds), (0.0, 0));
    }

    #[test]
    fn failed_and_active_sprints_are_excluded() {
        let failed = SprintResult::failed(closed_sprint(3), "boom");
        let mut active_sprint = closed_sprint(4);
        active_sprint.state = SprintState::Active;
        active_sprint.end = None;
        let active = SprintResult::new(active_sprint, Vec::new());

        let aggregator = VelocityAggregator::default();
        assert!(matches!(aggregator.achieved(&failed), Err(Exclusion::FetchFailed { .. })));
        assert!(matches!(
            aggregator.achieved(&active),
            Err(Exclusion::NotClosed { state: SprintState::Active })
        ));

        let (records, excluded) = aggregator.aggregate([&failed, &active]);
        assert!(records.is_empty());
        assert_eq!(excluded.len(), 2);
    }

    #[test]
    fn sprint_without_members_has_unknown_availability() {
        let record = VelocityAggregator::default()
            .achieved(&SprintResult::new(closed_sprint(5), Vec::new()))
            .expect("record");
        assert_eq!(record.available_days, None);
    }

    #[test]
    fn rejects_negative_days_per_member() {
        assert!(VelocityAggregator::with_days_per_member(-1.0).is_err());
        assert!(VelocityAggregator::with_days_per_member(8.0).is_ok());
    }

    #[test]
    fn formats_hours_and_minutes() {
        assert_eq!(format_hours_minutes(0), "0h 0m");
        assert_eq!(format_hours_minutes(5_400), "1h 30m");
        assert_eq!(format_hours_minutes(90_061), "25h 1m");
    }
}
