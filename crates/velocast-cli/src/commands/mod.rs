mod forecast;
mod history;
mod sprint;
mod sprints;

use std::sync::Arc;

use velocast_core::{
    CollectorConfig, Fetcher, HttpClient, IssueNormalizer, JiraConfig, Negotiator,
    ReqwestHttpClient, SprintCollector,
};
use velocast_warehouse::{HistoryWarehouse, WarehouseConfig};

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::mock;
use crate::output::Envelope;

pub async fn run(cli: &Cli) -> Result<Envelope, CliError> {
    match &cli.command {
        Command::Sprints(args) => sprints::run(args, &build_collector(cli)?).await,
        Command::Sprint(args) => sprint::run(args, &build_collector(cli)?).await,
        Command::History(args) => {
            history::run(args, &build_collector(cli)?, &open_warehouse(cli)?).await
        }
        Command::Forecast(args) => {
            let warehouse = open_warehouse(cli)?;
            if args.sync {
                let collector = build_collector(cli)?;
                forecast::run(args, Some(&collector), &warehouse).await
            } else {
                forecast::run(args, None, &warehouse).await
            }
        }
    }
}

fn build_collector(cli: &Cli) -> Result<SprintCollector, CliError> {
    let (config, client): (JiraConfig, Arc<dyn HttpClient>) = if cli.mock {
        let client: Arc<dyn HttpClient> = Arc::new(mock::client());
        (mock::config()?, client)
    } else {
        let config = JiraConfig::from_env()?;
        let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new(&config.tls)?);
        (config, client)
    };
    tracing::debug!(base_url = %config.base_url, board = %config.board_id, mock = cli.mock, "tracker configured");

    let fetcher = Fetcher::new(client, config.auth()).with_timeout_ms(config.timeout_ms);
    let negotiator = Arc::new(Negotiator::new(fetcher, config.base_url.as_str()));
    let normalizer = IssueNormalizer::new(config.fields.clone(), &config.done_statuses)?;
    let collector = SprintCollector::new(
        negotiator,
        normalizer,
        config.board_id.as_str(),
        &CollectorConfig::default(),
    )?;
    Ok(collector)
}

/// Mock runs get their own database unless `--db` says otherwise.
fn open_warehouse(cli: &Cli) -> Result<HistoryWarehouse, CliError> {
    let config = match &cli.db {
        Some(path) => WarehouseConfig::at(path.clone()),
        None if cli.mock => {
            let defaults = WarehouseConfig::default();
            WarehouseConfig::at(defaults.velocast_home.join("mock-history.duckdb"))
        }
        None => WarehouseConfig::default(),
    };
    Ok(HistoryWarehouse::open(config)?)
}
