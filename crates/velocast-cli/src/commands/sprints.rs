use serde::Serialize;

use velocast_core::{Sprint, SprintCollector, SprintState};

use crate::cli::SprintsArgs;
use crate::error::CliError;
use crate::output::Envelope;

#[derive(Debug, Serialize)]
struct SprintsResponseData {
    board_id: String,
    sprints: Vec<Sprint>,
}

pub async fn run(args: &SprintsArgs, collector: &SprintCollector) -> Result<Envelope, CliError> {
    let state = args.state.map(SprintState::from);

    let sprints = match (state, args.last) {
        (Some(SprintState::Closed), Some(last)) => collector.recent_closed_sprints(last).await?,
        (_, last) => {
            let sprints = collector.list_sprints(state).await?;
            match last {
                Some(last) => most_recent(sprints, last),
                None => sprints,
            }
        }
    };

    let data = serde_json::to_value(SprintsResponseData {
        board_id: collector.board_id().to_owned(),
        sprints,
    })?;
    Ok(Envelope::new(data))
}

/// Latest-ending first; sprints without an end date sort last.
fn most_recent(mut sprints: Vec<Sprint>, last: usize) -> Vec<Sprint> {
    sprints.sort_by(|left, right| right.end.cmp(&left.end));
    sprints.truncate(last);
    sprints
}
