//! Append-only velocity history and the merge-and-persist cycle.
//!
//! [`HistoryLog`] never holds two records for one sprint and is kept in
//! chronological order. [`merge`] only appends; a record already present is
//! left exactly as it was. [`commit`] runs lock, load, merge and write against
//! any [`HistoryStore`], with the lock held until the cycle ends.

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;

use crate::domain::VelocityRecord;

/// Boxed error surfaced by a store implementation.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// History persistence or invariant failure.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to acquire history lock: {0}")]
    Lock(#[source] StoreError),
    #[error("failed to load history: {0}")]
    Load(#[source] StoreError),
    #[error("failed to write history: {0}")]
    Write(#[source] StoreError),
    #[error("persisted history contains sprint {sprint_id} more than once")]
    DuplicateSprint { sprint_id: u64 },
}

/// Chronological, duplicate-free sequence of velocity records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct HistoryLog {
    records: Vec<VelocityRecord>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt persisted records, rejecting duplicates and restoring order.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::DuplicateSprint`] when a sprint id repeats.
    pub fn from_records(mut records: Vec<VelocityRecord>) -> Result<Self, HistoryError> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(record.sprint_id) {
                return Err(HistoryError::DuplicateSprint {
                    sprint_id: record.sprint_id,
                });
            }
        }
        sort_chronologically(&mut records);
        Ok(Self { records })
    }

    pub fn records(&self) -> &[VelocityRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, sprint_id: u64) -> bool {
        self.records.iter().any(|record| record.sprint_id == sprint_id)
    }

    /// The most recent `count` records, oldest first.
    pub fn last(&self, count: usize) -> &[VelocityRecord] {
        let start = self.records.len().saturating_sub(count);
        &self.records[start..]
    }

    pub fn into_records(self) -> Vec<VelocityRecord> {
        self.records
    }
}

/// Result of reconciling fresh records with a log.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub log: HistoryLog,
    /// Sprint ids newly appended.
    pub appended: Vec<u64>,
    /// Sprint ids already present and therefore left untouched.
    pub skipped: Vec<u64>,
}

/// Append every fresh record whose sprint is not yet in `existing`.
pub fn merge(existing: HistoryLog, fresh: impl IntoIterator<Item = VelocityRecord>) -> MergeOutcome {
    let mut records = existing.records;
    let mut known = records.iter().map(|record| record.sprint_id).collect::<HashSet<_>>();
    let mut appended = Vec::new();
    let mut skipped = Vec::new();

    for record in fresh {
        if known.insert(record.sprint_id) {
            appended.push(record.sprint_id);
            records.push(record);
        } else {
            skipped.push(record.sprint_id);
        }
    }

    sort_chronologically(&mut records);
    MergeOutcome {
        log: HistoryLog { records },
        appended,
        skipped,
    }
}

/// Stable sort by end, then start, then sprint id.
fn sort_chronologically(records: &mut [VelocityRecord]) {
    records.sort_by(|left, right| {
        left.end
            .cmp(&right.end)
            .then_with(|| left.start.cmp(&right.start))
            .then_with(|| left.sprint_id.cmp(&right.sprint_id))
    });
}

/// Persistence collaborator for the history log.
///
/// `lock` returns a guard that must release the resource when dropped, on
/// every exit path. `write` must replace the stored log atomically.
pub trait HistoryStore {
    type Lock;

    fn lock(&self) -> Result<Self::Lock, StoreError>;
    fn load(&self, lock: &Self::Lock) -> Result<Vec<VelocityRecord>, StoreError>;
    fn write(&self, lock: &Self::Lock, records: &[VelocityRecord]) -> Result<(), StoreError>;
}

/// Read the current log without merging.
///
/// # Errors
///
/// Returns [`HistoryError`] when the lock or the load fails, or the stored
/// log violates the no-duplicate invariant.
pub fn load<S: HistoryStore>(store: &S) -> Result<HistoryLog, HistoryError> {
    let lock = store.lock().map_err(HistoryError::Lock)?;
    let records = store.load(&lock).map_err(HistoryError::Load)?;
    HistoryLog::from_records(records)
}

/// Lock, load, merge `fresh`, write, release.
///
/// Nothing is written when no record was appended. On any failure the stored
/// log is left as it was.
///
/// # Errors
///
/// Returns [`HistoryError`] when locking, loading, or writing fails.
pub fn commit<S: HistoryStore>(
    store: &S,
    fresh: impl IntoIterator<Item = VelocityRecord>,
) -> Result<MergeOutcome, HistoryError> {
    let lock = store.lock().map_err(HistoryError::Lock)?;
    let existing = HistoryLog::from_records(store.load(&lock).map_err(HistoryError::Load)?)?;
    let outcome = merge(existing, fresh);

    if outcome.appended.is_empty() {
        tracing::debug!(skipped = outcome.skipped.len(), "history unchanged");
        return Ok(outcome);
    }

    store
        .write(&lock, outcome.log.records())
        .map_err(HistoryError::Write)?;
    tracing::info!(
        appended = outcome.appended.len(),
        skipped = outcome.skipped.len(),
        total = outcome.log.len(),
        "history merged"
    );
    Ok(outcome)
}
