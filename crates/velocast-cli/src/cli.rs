//! CLI argument definitions for velocast.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sprints` | Enumerate the board's sprints |
//! | `sprint` | Collect and normalize every issue of one sprint |
//! | `history` | Record recent closed sprints in the velocity history |
//! | `forecast` | Project capacity for the next sprint |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--verbose` | `false` | Debug-level logging on stderr |
//! | `--mock` | `false` | Serve canned board data instead of calling the tracker |
//! | `--db` | `$VELOCAST_HOME/history.duckdb` | History database path |
//!
//! # Examples
//!
//! ```bash
//! velocast sprints --state closed --last 5
//! velocast sprint 1234 --pretty
//! velocast history --count 6
//! velocast forecast --availability 40 --sync
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use velocast_core::SprintState;

/// Sprint velocity history and capacity forecasts from a ticket tracker.
#[derive(Debug, Parser)]
#[command(
    name = "velocast",
    author,
    version,
    about = "Sprint velocity history and capacity forecasts",
    long_about = "velocast reads sprints and issues from a Jira board, records the \
points and time achieved in each closed sprint, and projects what the team can \
take on next.\n\
\n\
Connection settings come from VELOCAST_JIRA_URL, VELOCAST_JIRA_USERNAME, \
VELOCAST_JIRA_TOKEN and VELOCAST_JIRA_BOARD."
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Use canned board data instead of a live tracker.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    /// History database path.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List sprints on the configured board.
    ///
    /// # Examples
    ///
    ///   velocast sprints
    ///   velocast sprints --state closed --last 3
    Sprints(SprintsArgs),

    /// Collect every issue of one sprint.
    Sprint(SprintArgs),

    /// Aggregate recent closed sprints and merge them into the history.
    History(HistoryArgs),

    /// Forecast points and time for the next sprint.
    ///
    /// # Examples
    ///
    ///   velocast forecast --availability 40
    ///   velocast forecast --availability 32.5 --sync
    Forecast(ForecastArgs),
}

/// Arguments for the `sprints` command.
#[derive(Debug, Args)]
pub struct SprintsArgs {
    /// Only sprints in this state.
    #[arg(long, value_enum)]
    pub state: Option<StateArg>,

    /// Keep the N most recently ended sprints.
    #[arg(long)]
    pub last: Option<usize>,
}

/// Arguments for the `sprint` command.
#[derive(Debug, Args)]
pub struct SprintArgs {
    /// Sprint identifier.
    pub id: u64,
}

/// Arguments for the `history` command.
#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Number of recent closed sprints to collect.
    #[arg(long, default_value_t = 5)]
    pub count: usize,

    /// Person-days credited to each assignee when estimating past availability.
    #[arg(long, default_value_t = velocast_core::DEFAULT_DAYS_PER_MEMBER)]
    pub days_per_member: f64,
}

/// Arguments for the `forecast` command.
#[derive(Debug, Args)]
pub struct ForecastArgs {
    /// Person-days the team has available next sprint.
    #[arg(long)]
    pub availability: f64,

    /// Refresh the history before forecasting.
    #[arg(long, default_value_t = false)]
    pub sync: bool,

    /// Sprints to collect when syncing.
    #[arg(long, default_value_t = 5)]
    pub count: usize,

    /// Person-days credited to each assignee when syncing.
    #[arg(long, default_value_t = velocast_core::DEFAULT_DAYS_PER_MEMBER)]
    pub days_per_member: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StateArg {
    Active,
    Closed,
    Future,
}

impl From<StateArg> for SprintState {
    fn from(value: StateArg) -> Self {
        match value {
            StateArg::Active => Self::Active,
            StateArg::Closed => Self::Closed,
            StateArg::Future => Self::Future,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["velocast", "sprints", "--state", "closed", "--mock"])
            .expect("parse");
        assert!(cli.mock);
        match cli.command {
            Command::Sprints(args) => assert_eq!(args.state, Some(StateArg::Closed)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn forecast_requires_availability() {
        assert!(Cli::try_parse_from(["velocast", "forecast"]).is_err());
        let cli = Cli::try_parse_from(["velocast", "forecast", "--availability", "40", "--sync"])
            .expect("parse");
        match cli.command {
            Command::Forecast(args) => {
                assert_eq!(args.availability, 40.0);
                assert!(args.sync);
                assert_eq!(args.count, 5);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
