use serde::Serialize;

use velocast_core::{
    commit, format_hours_minutes, Exclusion, PartialSprintFailure, SprintCollector,
    VelocityAggregator, VelocityRecord,
};
use velocast_warehouse::HistoryWarehouse;

use crate::cli::HistoryArgs;
use crate::error::CliError;
use crate::output::Envelope;

#[derive(Debug, Serialize)]
struct HistoryRow<'a> {
    #[serde(flatten)]
    record: &'a VelocityRecord,
    achieved_time: String,
}

#[derive(Debug, Serialize)]
struct HistoryResponseData<'a> {
    appended: Vec<u64>,
    skipped: Vec<u64>,
    records: Vec<HistoryRow<'a>>,
}

/// What one collect-aggregate-merge pass produced besides the stored log.
pub struct SyncReport {
    pub appended: Vec<u64>,
    pub skipped: Vec<u64>,
    pub warnings: Vec<String>,
    pub failures: Vec<PartialSprintFailure>,
}

pub async fn run(
    args: &HistoryArgs,
    collector: &SprintCollector,
    warehouse: &HistoryWarehouse,
) -> Result<Envelope, CliError> {
    let aggregator = VelocityAggregator::with_days_per_member(args.days_per_member)?;
    let (report, log) = sync(collector, warehouse, &aggregator, args.count).await?;

    let records = log
        .iter()
        .map(|record| HistoryRow {
            record,
            achieved_time: format_hours_minutes(record.achieved_seconds),
        })
        .collect();
    let data = serde_json::to_value(HistoryResponseData {
        appended: report.appended,
        skipped: report.skipped,
        records,
    })?;

    Ok(Envelope::new(data)
        .with_warnings(report.warnings)
        .with_failures(report.failures))
}

/// Collect the last `count` closed sprints and merge them into the warehouse.
pub async fn sync(
    collector: &SprintCollector,
    warehouse: &HistoryWarehouse,
    aggregator: &VelocityAggregator,
    count: usize,
) -> Result<(SyncReport, Vec<VelocityRecord>), CliError> {
    let results = collector.collect(count).await?;
    let failures = results
        .iter()
        .filter_map(|result| result.failure.clone())
        .collect::<Vec<_>>();

    let (records, excluded) = aggregator.aggregate(&results);
    let warnings = excluded
        .iter()
        .filter(|(_, exclusion)| !matches!(exclusion, Exclusion::FetchFailed { .. }))
        .map(|(sprint_id, exclusion)| format!("sprint {sprint_id} excluded: {exclusion}"))
        .collect();

    let outcome = commit(warehouse, records)?;
    let report = SyncReport {
        appended: outcome.appended,
        skipped: outcome.skipped,
        warnings,
        failures,
    };
    Ok((report, outcome.log.into_records()))
}
