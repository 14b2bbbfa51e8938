//! # Domain Models
//!
//! Canonical sprint and issue types shared by every stage of the pipeline.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`CanonicalIssue`] | Issue record with deployment-specific fields resolved |
//! | [`IssueType`] | Story, task, bug, epic, or other |
//! | [`Sprint`] | Sprint metadata from a board |
//! | [`SprintState`] | Active, closed, or future |
//! | [`SprintResult`] | A sprint plus its collected issues, or a recorded failure |
//! | [`VelocityRecord`] | Achieved points and time for one completed sprint |
//! | [`UtcDateTime`] | Timestamp normalized to UTC |
//!
//! Measurements that were never reported are `None`, never zero.

mod models;
mod sprint_state;
mod timestamp;

pub use models::{
    CanonicalIssue, IssueType, PartialSprintFailure, Person, Sprint, SprintResult, VelocityRecord,
};
pub use sprint_state::SprintState;
pub use timestamp::UtcDateTime;
