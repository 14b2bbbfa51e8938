use serde::Serialize;

use velocast_core::{format_hours_minutes, CanonicalIssue, Sprint, SprintCollector};

use crate::cli::SprintArgs;
use crate::error::CliError;
use crate::output::Envelope;

#[derive(Debug, Serialize)]
struct SprintResponseData {
    sprint: Sprint,
    team_members: Vec<String>,
    done_points: f64,
    time_spent: String,
    issues: Vec<CanonicalIssue>,
}

pub async fn run(args: &SprintArgs, collector: &SprintCollector) -> Result<Envelope, CliError> {
    let sprint = collector.sprint_by_id(args.id).await?;
    let result = collector.collect_sprint(&sprint).await;

    let team_members = result.team_members();
    let done_points = result
        .issues
        .iter()
        .filter(|issue| issue.done)
        .filter_map(|issue| issue.points)
        .sum();
    let spent_seconds = result
        .issues
        .iter()
        .filter_map(|issue| issue.time_spent_seconds)
        .sum();
    let failures = result.failure.into_iter().collect();

    let data = serde_json::to_value(SprintResponseData {
        sprint: result.sprint,
        team_members,
        done_points,
        time_spent: format_hours_minutes(spent_seconds),
        issues: result.issues,
    })?;
    Ok(Envelope::new(data).with_failures(failures))
}
