use thiserror::Error;

/// Validation and contract errors exposed by `velocast-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("configuration value '{name}' is required")]
    MissingSetting { name: &'static str },
    #[error("base url must start with http:// or https://: '{value}'")]
    InvalidBaseUrl { value: String },
    #[error("setting '{name}' must be a positive integer: '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("page size must be greater than zero")]
    ZeroPageSize,
    #[error("done-status set must contain at least one status")]
    EmptyDoneStatuses,

    #[error("issue record is missing its key")]
    MissingIssueKey,
    #[error("sprint record is missing field '{field}'")]
    MissingSprintField { field: &'static str },
    #[error("unknown sprint state '{value}' (expected active, closed, or future)")]
    InvalidSprintState { value: String },
    #[error("'{field}' must be a finite non-negative number, got {value}")]
    InvalidMeasure { field: &'static str, value: String },

    #[error("timestamp is not a recognized ISO 8601 value: '{value}'")]
    InvalidTimestamp { value: String },

    #[error("availability must be a finite non-negative number of days, got {value}")]
    InvalidAvailability { value: String },

    #[error("JQL value cannot be empty")]
    EmptyJqlValue,
    #[error("JQL value '{value}' rejected: {reason}")]
    UnsafeJqlValue { value: String, reason: &'static str },
}
