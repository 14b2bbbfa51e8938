//! Board-level sprint enumeration and per-sprint issue collection.
//!
//! Board-level failures (listing sprints, loading one sprint's metadata) are
//! terminal. A failure while collecting one sprint's issues is recorded on
//! that sprint's [`SprintResult`] and collection moves on.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::domain::{Sprint, SprintResult, SprintState, UtcDateTime};
use crate::jql;
use crate::negotiation::{NegotiationError, Negotiator, Query};
use crate::normalizer::IssueNormalizer;
use crate::ValidationError;

/// Collection tuning.
///
/// The default collects every issue in a sprint with one unfiltered query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectorConfig {
    /// One issue query is issued per type; empty means a single unfiltered query.
    pub issue_types: Vec<String>,
}

/// Terminal collection failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollectError {
    #[error("failed to list sprints for board '{board_id}': {source}")]
    SprintList {
        board_id: String,
        #[source]
        source: NegotiationError,
    },

    #[error("failed to load sprint {sprint_id}: {source}")]
    SprintDetail {
        sprint_id: u64,
        #[source]
        source: NegotiationError,
    },

    #[error("sprint record is invalid: {0}")]
    InvalidSprint(#[from] ValidationError),
}

impl CollectError {
    pub fn negotiation(&self) -> Option<&NegotiationError> {
        match self {
            Self::SprintList { source, .. } | Self::SprintDetail { source, .. } => Some(source),
            Self::InvalidSprint(_) => None,
        }
    }
}

/// Enumerates a board's sprints and gathers each sprint's issues.
pub struct SprintCollector {
    negotiator: Arc<Negotiator>,
    normalizer: IssueNormalizer,
    board_id: String,
    issue_filters: Vec<String>,
}

impl SprintCollector {
    /// # Errors
    ///
    /// Returns [`ValidationError`] when a configured issue type is not safe to
    /// interpolate into JQL.
    pub fn new(
        negotiator: Arc<Negotiator>,
        normalizer: IssueNormalizer,
        board_id: impl Into<String>,
        config: &CollectorConfig,
    ) -> Result<Self, ValidationError> {
        let issue_filters = config
            .issue_types
            .iter()
            .map(|name| jql::issue_type_clause(name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            negotiator,
            normalizer,
            board_id: board_id.into(),
            issue_filters,
        })
    }

    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    /// Sprints on the board in the order the tracker returns them.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::SprintList`] when the board query fails.
    pub async fn list_sprints(&self, state: Option<SprintState>) -> Result<Vec<Sprint>, CollectError> {
        let outcome = self
            .negotiator
            .fetch_all(&Query::board_sprints(self.board_id.clone(), state))
            .await
            .map_err(|source| CollectError::SprintList {
                board_id: self.board_id.clone(),
                source,
            })?;

        let sprints = outcome
            .items
            .iter()
            .filter_map(|raw| match parse_sprint(raw) {
                Ok(sprint) => Some(sprint),
                Err(error) => {
                    tracing::warn!(board = %self.board_id, %error, "skipping malformed sprint record");
                    None
                }
            })
            .filter(|sprint| state.map_or(true, |wanted| sprint.state == wanted))
            .collect();
        Ok(sprints)
    }

    /// The last `last_n` closed sprints, most recently ended first.
    ///
    /// Closed sprints without an end date are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::SprintList`] when the board query fails.
    pub async fn recent_closed_sprints(&self, last_n: usize) -> Result<Vec<Sprint>, CollectError> {
        let mut sprints = self
            .list_sprints(Some(SprintState::Closed))
            .await?
            .into_iter()
            .filter(|sprint| sprint.end.is_some())
            .collect::<Vec<_>>();
        sprints.sort_by(|left, right| right.end.cmp(&left.end));
        sprints.truncate(last_n);
        Ok(sprints)
    }

    /// First future sprint on the board, if one is planned.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::SprintList`] when the board query fails.
    pub async fn upcoming_sprint(&self) -> Result<Option<Sprint>, CollectError> {
        Ok(self
            .list_sprints(Some(SprintState::Future))
            .await?
            .into_iter()
            .next())
    }

    /// # Errors
    ///
    /// Returns [`CollectError::SprintDetail`] when the sprint cannot be loaded,
    /// or [`CollectError::InvalidSprint`] when the record is malformed.
    pub async fn sprint_by_id(&self, sprint_id: u64) -> Result<Sprint, CollectError> {
        let outcome = self
            .negotiator
            .fetch_all(&Query::sprint_detail(sprint_id))
            .await
            .map_err(|source| CollectError::SprintDetail { sprint_id, source })?;
        let raw = outcome
            .items
            .first()
            .ok_or(ValidationError::MissingSprintField { field: "id" })?;
        Ok(parse_sprint(raw)?)
    }

    /// Every issue of `sprint`, deduplicated by key in first-seen order.
    pub async fn collect_sprint(&self, sprint: &Sprint) -> SprintResult {
        let fields = self.normalizer.fields().requested_fields();
        let filters = if self.issue_filters.is_empty() {
            vec![None]
        } else {
            self.issue_filters.iter().cloned().map(Some).collect()
        };

        let mut seen = HashSet::new();
        let mut issues = Vec::new();
        for filter in filters {
            let query = Query::sprint_issues(sprint.id, filter, fields.clone());
            let outcome = match self.negotiator.fetch_all(&query).await {
                Ok(outcome) => outcome,
                Err(error) => {
                    tracing::warn!(
                        sprint_id = sprint.id, sprint = %sprint.name, %error,
                        "issue collection failed; sprint recorded as partial failure"
                    );
                    return SprintResult::failed(sprint.clone(), error.to_string());
                }
            };

            for raw in &outcome.items {
                match self.normalizer.normalize(raw) {
                    Ok(issue) => {
                        if seen.insert(issue.key.clone()) {
                            issues.push(issue);
                        }
                    }
                    Err(error) => {
                        tracing::debug!(sprint_id = sprint.id, %error, "skipping issue record");
                    }
                }
            }
        }

        tracing::debug!(sprint_id = sprint.id, issues = issues.len(), "sprint collected");
        SprintResult::new(sprint.clone(), issues)
    }

    /// Results for the last `last_n` closed sprints, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::SprintList`] when the board query fails.
    pub async fn collect(&self, last_n: usize) -> Result<Vec<SprintResult>, CollectError> {
        let mut sprints = self.recent_closed_sprints(last_n).await?;
        sprints.reverse();

        let mut results = Vec::with_capacity(sprints.len());
        for sprint in &sprints {
            results.push(self.collect_sprint(sprint).await);
        }
        Ok(results)
    }
}

/// Map a raw agile sprint object into [`Sprint`].
///
/// # Errors
///
/// Returns [`ValidationError`] when the id or state is missing or unknown.
pub fn parse_sprint(raw: &Value) -> Result<Sprint, ValidationError> {
    let id = raw
        .get("id")
        .and_then(Value::as_u64)
        .ok_or(ValidationError::MissingSprintField { field: "id" })?;
    let state = raw
        .get("state")
        .and_then(Value::as_str)
        .ok_or(ValidationError::MissingSprintField { field: "state" })?
        .parse::<SprintState>()?;
    let name = raw
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map_or_else(|| format!("Sprint {id}"), str::to_owned);

    Ok(Sprint {
        id,
        name,
        state,
        start: UtcDateTime::parse_optional(raw.get("startDate").and_then(Value::as_str)),
        end: UtcDateTime::parse_optional(raw.get("endDate").and_then(Value::as_str)),
        goal: raw
            .get("goal")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|goal| !goal.is_empty())
            .map(str::to_owned),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_agile_sprint_object() {
        let sprint = parse_sprint(&json!({
            "id": 37,
            "state": "closed",
            "name": "Sprint 37",
            "startDate": "2024-01-01T09:00:00.000Z",
            "endDate": "2024-01-14T17:00:00.000+0000",
            "goal": " ship checkout "
        }))
        .expect("valid sprint");

        assert_eq!(sprint.id, 37);
        assert_eq!(sprint.state, SprintState::Closed);
        assert_eq!(sprint.goal.as_deref(), Some("ship checkout"));
        assert_eq!(
            sprint.end.map(UtcDateTime::format_rfc3339).as_deref(),
            Some("2024-01-14T17:00:00Z")
        );
    }

    #[test]
    fn unparseable_dates_become_absent() {
        let sprint = parse_sprint(&json!({"id": 1, "state": "active", "endDate": "soon"}))
            .expect("valid sprint");
        assert_eq!(sprint.end, None);
        assert_eq!(sprint.name, "Sprint 1");
    }

    #[test]
    fn sprint_without_state_is_rejected() {
        let err = parse_sprint(&json!({"id": 1})).expect_err("must fail");
        assert_eq!(err, ValidationError::MissingSprintField { field: "state" });
    }

    #[test]
    fn default_collects_every_issue_type() {
        assert!(CollectorConfig::default().issue_types.is_empty());
    }
}
