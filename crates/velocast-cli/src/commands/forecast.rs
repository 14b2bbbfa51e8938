use serde::Serialize;

use velocast_core::history;
use velocast_core::{forecast, ForecastResult, SprintCollector, VelocityAggregator};
use velocast_warehouse::HistoryWarehouse;

use crate::cli::ForecastArgs;
use crate::error::CliError;
use crate::output::Envelope;

use super::history::sync;

#[derive(Debug, Serialize)]
struct ForecastResponseData {
    synced: bool,
    #[serde(flatten)]
    forecast: ForecastResult,
}

pub async fn run(
    args: &ForecastArgs,
    collector: Option<&SprintCollector>,
    warehouse: &HistoryWarehouse,
) -> Result<Envelope, CliError> {
    // Reject bad input before touching the tracker.
    forecast(&[], args.availability)?;

    let mut warnings = Vec::new();
    let mut failures = Vec::new();
    let records = match collector {
        Some(collector) => {
            let aggregator = VelocityAggregator::with_days_per_member(args.days_per_member)?;
            let (report, records) = sync(collector, warehouse, &aggregator, args.count).await?;
            warnings = report.warnings;
            failures = report.failures;
            records
        }
        None => history::load(warehouse)?.into_records(),
    };

    let result = forecast(&records, args.availability)?;
    warnings.extend(
        result
            .windows
            .iter()
            .filter(|window| !window.has_data())
            .map(|window| format!("{}-sprint window has no history", window.window)),
    );

    let data = serde_json::to_value(ForecastResponseData {
        synced: collector.is_some(),
        forecast: result,
    })?;
    Ok(Envelope::new(data)
        .with_warnings(warnings)
        .with_failures(failures))
}
