use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] velocast_core::ValidationError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] velocast_core::HttpError),

    #[error(transparent)]
    Collect(#[from] velocast_core::CollectError),

    #[error(transparent)]
    History(#[from] velocast_core::HistoryError),

    #[error(transparent)]
    Warehouse(#[from] velocast_warehouse::WarehouseError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Client(_) => 3,
            Self::Collect(_) => 3,
            Self::History(_) => 4,
            Self::Warehouse(_) => 4,
            Self::Serialization(_) => 5,
            Self::Io(_) => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use velocast_core::ValidationError;

    #[test]
    fn categories_have_distinct_exit_codes() {
        let validation = CliError::from(ValidationError::ZeroPageSize);
        let history = CliError::from(velocast_core::HistoryError::DuplicateSprint { sprint_id: 1 });
        let io = CliError::from(std::io::Error::other("boom"));

        assert_eq!(validation.exit_code(), 2);
        assert_eq!(history.exit_code(), 4);
        assert_eq!(io.exit_code(), 10);
    }
}
