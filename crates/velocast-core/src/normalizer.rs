//! Raw tracker issue JSON into [`CanonicalIssue`].
//!
//! Custom field identifiers come from [`FieldMapping`]; nothing past this
//! module sees a `customfield_*` name.

use std::collections::HashSet;

use serde_json::Value;

use crate::config::{FieldMapping, DEFAULT_DONE_STATUSES};
use crate::domain::{CanonicalIssue, IssueType, Person};
use crate::ValidationError;

const BLOCKED_BY: &str = "is blocked by";

/// Pure mapping from raw records to canonical issues.
#[derive(Debug, Clone)]
pub struct IssueNormalizer {
    fields: FieldMapping,
    done_statuses: HashSet<String>,
}

impl Default for IssueNormalizer {
    fn default() -> Self {
        Self {
            fields: FieldMapping::default(),
            done_statuses: DEFAULT_DONE_STATUSES
                .iter()
                .map(|status| (*status).to_owned())
                .collect(),
        }
    }
}

impl IssueNormalizer {
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyDoneStatuses`] when no usable status remains.
    pub fn new<I, S>(fields: FieldMapping, done_statuses: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let done_statuses = done_statuses
            .into_iter()
            .map(|status| status.as_ref().trim().to_lowercase())
            .filter(|status| !status.is_empty())
            .collect::<HashSet<_>>();
        if done_statuses.is_empty() {
            return Err(ValidationError::EmptyDoneStatuses);
        }
        Ok(Self {
            fields,
            done_statuses,
        })
    }

    pub fn fields(&self) -> &FieldMapping {
        &self.fields
    }

    /// Case-insensitive membership in the done set. Unknown statuses are not done.
    pub fn is_done(&self, status: &str) -> bool {
        self.done_statuses.contains(&status.trim().to_lowercase())
    }

    /// # Errors
    ///
    /// Returns [`ValidationError::MissingIssueKey`] when the record has no key.
    pub fn normalize(&self, raw: &Value) -> Result<CanonicalIssue, ValidationError> {
        let key = raw
            .get("key")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ValidationError::MissingIssueKey)?
            .to_owned();

        let empty = Value::Null;
        let fields = raw.get("fields").unwrap_or(&empty);

        let status = fields
            .pointer("/status/name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let issue_type = fields
            .pointer("/issuetype/name")
            .and_then(Value::as_str)
            .map_or(IssueType::Other, IssueType::from_name);
        let timetracking = fields.get("timetracking");

        Ok(CanonicalIssue {
            summary: fields
                .get("summary")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            issue_type,
            done: self.is_done(&status),
            status,
            assignee: parse_person(fields.get("assignee")),
            points: parse_points(fields.get(&self.fields.story_points)),
            time_spent_seconds: timetracking.and_then(|tt| seconds(tt.get("timeSpentSeconds"))),
            time_remaining_seconds: timetracking
                .and_then(|tt| seconds(tt.get("remainingEstimateSeconds"))),
            labels: dedup_exact(
                fields
                    .get("labels")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .filter_map(Value::as_str),
            ),
            blockers: parse_blockers(fields.get("issuelinks")),
            epic_link: parse_epic_link(fields.get(&self.fields.epic_link)),
            has_description: has_description(fields.get("description")),
            has_acceptance_criteria: has_bullet_with_text(
                fields.get(&self.fields.acceptance_criteria),
            ),
            key,
        })
    }
}

fn parse_person(value: Option<&Value>) -> Option<Person> {
    let value = value?;
    let display_name = value
        .get("displayName")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())?;
    Some(Person {
        account_id: value
            .get("accountId")
            .and_then(Value::as_str)
            .map(str::to_owned),
        display_name: display_name.to_owned(),
    })
}

/// Numbers or numeric strings. `""`, `"?"` and negative values are absent.
fn parse_points(value: Option<&Value>) -> Option<f64> {
    let points = match value? {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() || text == "?" {
                return None;
            }
            text.parse::<f64>().ok()?
        }
        _ => return None,
    };
    (points.is_finite() && points >= 0.0).then_some(points)
}

fn seconds(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|s| *s >= 0.0).map(|s| s.round() as u64)),
        _ => None,
    }
}

fn parse_blockers(value: Option<&Value>) -> Vec<String> {
    let links = value.and_then(Value::as_array).into_iter().flatten();
    dedup_case_insensitive(links.filter_map(|link| {
        let inward = link.pointer("/type/inward").and_then(Value::as_str)?;
        if !inward.trim().eq_ignore_ascii_case(BLOCKED_BY) {
            return None;
        }
        link.pointer("/inwardIssue/key").and_then(Value::as_str)
    }))
}

fn parse_epic_link(value: Option<&Value>) -> Option<String> {
    let key = match value? {
        Value::String(key) => key.as_str(),
        Value::Object(object) => object.get("key").and_then(Value::as_str)?,
        _ => return None,
    };
    let key = key.trim();
    (!key.is_empty()).then(|| key.to_owned())
}

/// Labels keep their casing; `Foo` and `foo` are distinct.
fn dedup_exact<'a, I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .map(str::trim)
        .filter(|value| !value.is_empty() && seen.insert(*value))
        .map(str::to_owned)
        .collect()
}

/// First-seen casing wins.
fn dedup_case_insensitive<'a, I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .filter(|value| seen.insert(value.to_lowercase()))
        .map(str::to_owned)
        .collect()
}

fn has_description(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(text)) => !text.trim().is_empty(),
        Some(node @ Value::Object(_)) => document_has_text(node),
        Some(_) => true,
    }
}

/// Walks an Atlassian Document Format tree looking for non-blank text.
fn document_has_text(node: &Value) -> bool {
    match node {
        Value::String(text) => !text.trim().is_empty(),
        Value::Array(items) => items.iter().any(document_has_text),
        Value::Object(object) => {
            if object.get("type").and_then(Value::as_str) == Some("text") {
                return object
                    .get("text")
                    .and_then(Value::as_str)
                    .is_some_and(|text| !text.trim().is_empty());
            }
            ["text", "content", "paragraphs", "items"]
                .iter()
                .filter_map(|key| object.get(*key))
                .any(document_has_text)
        }
        _ => false,
    }
}

fn has_bullet_with_text(value: Option<&Value>) -> bool {
    let Some(text) = value.and_then(Value::as_str) else {
        return false;
    };
    text.lines().map(str::trim).any(|line| {
        (line.starts_with('*') || line.starts_with('-'))
            && !line.trim_start_matches(['*', '-']).trim().is_empty()
    })
}
