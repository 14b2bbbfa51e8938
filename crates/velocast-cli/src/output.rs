use std::io::{self, Write};

use serde::Serialize;
use serde_json::Value;
use velocast_core::PartialSprintFailure;

use crate::error::CliError;

/// Shape of everything velocast prints on stdout.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub data: Value,
    pub warnings: Vec<String>,
    pub failures: Vec<PartialSprintFailure>,
}

impl Envelope {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_failures(mut self, failures: Vec<PartialSprintFailure>) -> Self {
        self.failures.extend(failures);
        self
    }
}

pub fn render(envelope: &Envelope, pretty: bool) -> Result<(), CliError> {
    let payload = to_json(envelope, pretty)?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{payload}")?;
    Ok(())
}

fn to_json(envelope: &Envelope, pretty: bool) -> Result<String, CliError> {
    let payload = if pretty {
        serde_json::to_string_pretty(envelope)?
    } else {
        serde_json::to_string(envelope)?
    };
    Ok(payload)
}
