//! Typed configuration handed to the core by its caller.
//!
//! The core performs no file parsing. [`JiraConfig::from_env`] reads process
//! environment variables; [`JiraConfig::from_lookup`] accepts any lookup
//! function so callers (and tests) can supply values from elsewhere.
//!
//! | Setting | Primary variable | Fallback variable |
//! |---------|------------------|-------------------|
//! | base url | `VELOCAST_JIRA_URL` | `JT_JIRA_URL` |
//! | username | `VELOCAST_JIRA_USERNAME` | `JT_JIRA_USERNAME` |
//! | api token | `VELOCAST_JIRA_TOKEN` | `JT_JIRA_PASSWORD` |
//! | board | `VELOCAST_JIRA_BOARD` | `JT_JIRA_BOARD` |
//! | TLS mode | `VELOCAST_SSL_VERIFY` | `JT_SSL_VERIFY` |
//! | story points field | `VELOCAST_FIELD_STORY_POINTS` | - |
//! | acceptance criteria field | `VELOCAST_FIELD_ACCEPTANCE_CRITERIA` | `JT_JIRA_FIELD_ACCEPTANCE_CRITERIA` |
//! | epic link field | `VELOCAST_FIELD_EPIC_LINK` | `JT_JIRA_FIELD_EPIC_LINK` |
//! | done statuses | `VELOCAST_DONE_STATUSES` | - |
//! | request timeout | `VELOCAST_TIMEOUT_MS` | - |

use std::path::PathBuf;

use crate::http_client::HttpAuth;
use crate::ValidationError;

/// Default set of statuses that count toward achieved velocity.
pub const DEFAULT_DONE_STATUSES: [&str; 3] = ["done", "closed", "resolved"];

/// TLS verification mode, resolved once per process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsMode {
    Verify,
    CustomCa(PathBuf),
    Disabled,
}

impl TlsMode {
    /// Interpret a `*_SSL_VERIFY` style value.
    ///
    /// A path that does not exist falls back to [`TlsMode::Verify`].
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "true" | "1" | "yes" => Self::Verify,
            "false" | "0" | "no" => Self::Disabled,
            _ => {
                let path = PathBuf::from(trimmed);
                if path.exists() {
                    Self::CustomCa(path)
                } else {
                    tracing::warn!(
                        path = %path.display(),
                        "CA bundle does not exist; falling back to default verification"
                    );
                    Self::Verify
                }
            }
        }
    }
}

impl Default for TlsMode {
    fn default() -> Self {
        Self::Verify
    }
}

/// Deployment-specific custom field identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub story_points: String,
    pub acceptance_criteria: String,
    pub epic_link: String,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            story_points: String::from("customfield_10024"),
            acceptance_criteria: String::from("customfield_10140"),
            epic_link: String::from("customfield_10031"),
        }
    }
}

impl FieldMapping {
    /// Field list requested from search endpoints.
    pub fn requested_fields(&self) -> Vec<String> {
        let mut fields = [
            "summary",
            "issuetype",
            "status",
            "assignee",
            "labels",
            "issuelinks",
            "timetracking",
            "description",
        ]
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>();
        fields.push(self.story_points.clone());
        fields.push(self.acceptance_criteria.clone());
        fields.push(self.epic_link.clone());
        fields
    }
}

/// Connection and interpretation settings for one tracker deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct JiraConfig {
    pub base_url: String,
    pub username: String,
    pub api_token: String,
    pub board_id: String,
    pub tls: TlsMode,
    pub fields: FieldMapping,
    pub done_statuses: Vec<String>,
    pub timeout_ms: u64,
}

impl JiraConfig {
    /// Build configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when a required setting is missing or malformed.
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary lookup function.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when a required setting is missing or malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |primary: &str, fallback: Option<&str>| {
            lookup(primary)
                .or_else(|| fallback.and_then(&lookup))
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let base_url = read("VELOCAST_JIRA_URL", Some("JT_JIRA_URL")).ok_or(
            ValidationError::MissingSetting {
                name: "VELOCAST_JIRA_URL",
            },
        )?;
        let username = read("VELOCAST_JIRA_USERNAME", Some("JT_JIRA_USERNAME")).ok_or(
            ValidationError::MissingSetting {
                name: "VELOCAST_JIRA_USERNAME",
            },
        )?;
        let api_token = read("VELOCAST_JIRA_TOKEN", Some("JT_JIRA_PASSWORD")).ok_or(
            ValidationError::MissingSetting {
                name: "VELOCAST_JIRA_TOKEN",
            },
        )?;
        let board_id = read("VELOCAST_JIRA_BOARD", Some("JT_JIRA_BOARD")).ok_or(
            ValidationError::MissingSetting {
                name: "VELOCAST_JIRA_BOARD",
            },
        )?;

        let tls = read("VELOCAST_SSL_VERIFY", Some("JT_SSL_VERIFY"))
            .map(|value| TlsMode::parse(&value))
            .unwrap_or_default();

        let defaults = FieldMapping::default();
        let fields = FieldMapping {
            story_points: read("VELOCAST_FIELD_STORY_POINTS", None)
                .unwrap_or(defaults.story_points),
            acceptance_criteria: read(
                "VELOCAST_FIELD_ACCEPTANCE_CRITERIA",
                Some("JT_JIRA_FIELD_ACCEPTANCE_CRITERIA"),
            )
            .unwrap_or(defaults.acceptance_criteria),
            epic_link: read("VELOCAST_FIELD_EPIC_LINK", Some("JT_JIRA_FIELD_EPIC_LINK"))
                .unwrap_or(defaults.epic_link),
        };

        let done_statuses = match read("VELOCAST_DONE_STATUSES", None) {
            Some(list) => parse_status_list(&list)?,
            None => DEFAULT_DONE_STATUSES.iter().map(|s| (*s).to_owned()).collect(),
        };

        let timeout_ms = match read("VELOCAST_TIMEOUT_MS", None) {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or(ValidationError::InvalidNumber {
                    name: "VELOCAST_TIMEOUT_MS",
                    value: raw,
                })?,
            None => 15_000,
        };

        Self {
            base_url,
            username,
            api_token,
            board_id,
            tls,
            fields,
            done_statuses,
            timeout_ms,
        }
        .validated()
    }

    fn validated(mut self) -> Result<Self, ValidationError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ValidationError::InvalidBaseUrl {
                value: self.base_url,
            });
        }
        self.base_url = self.base_url.trim_end_matches('/').to_owned();
        Ok(self)
    }

    pub fn auth(&self) -> HttpAuth {
        HttpAuth::basic(&self.username, &self.api_token)
    }
}

fn parse_status_list(list: &str) -> Result<Vec<String>, ValidationError> {
    let statuses = list
        .split(',')
        .map(str::trim)
        .filter(|status| !status.is_empty())
        .map(str::to_owned)
        .collect::<Vec<_>>();
    if statuses.is_empty() {
        return Err(ValidationError::EmptyDoneStatuses);
    }
    Ok(statuses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect::<HashMap<_, _>>();
        move |name| map.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("VELOCAST_JIRA_URL", "https://jira.example.test/"),
        ("VELOCAST_JIRA_USERNAME", "dev@example.test"),
        ("VELOCAST_JIRA_TOKEN", "token"),
        ("VELOCAST_JIRA_BOARD", "42"),
    ];

    #[test]
    fn defaults_are_applied_and_trailing_slash_trimmed() {
        let config = JiraConfig::from_lookup(lookup(&REQUIRED)).expect("valid config");

        assert_eq!(config.base_url, "https://jira.example.test");
        assert_eq!(config.tls, TlsMode::Verify);
        assert_eq!(config.fields.story_points, "customfield_10024");
        assert_eq!(config.done_statuses, vec!["done", "closed", "resolved"]);
        assert_eq!(config.timeout_ms, 15_000);
    }

    #[test]
    fn legacy_variable_names_are_honored() {
        let config = JiraConfig::from_lookup(lookup(&[
            ("JT_JIRA_URL", "https://legacy.example.test"),
            ("JT_JIRA_USERNAME", "legacy"),
            ("JT_JIRA_PASSWORD", "secret"),
            ("JT_JIRA_BOARD", "7"),
            ("JT_SSL_VERIFY", "false"),
        ]))
        .expect("valid config");

        assert_eq!(config.base_url, "https://legacy.example.test");
        assert_eq!(config.board_id, "7");
        assert_eq!(config.tls, TlsMode::Disabled);
    }

    #[test]
    fn missing_board_is_reported_by_name() {
        let error = JiraConfig::from_lookup(lookup(&REQUIRED[..3])).expect_err("board missing");
        assert_eq!(
            error,
            ValidationError::MissingSetting {
                name: "VELOCAST_JIRA_BOARD"
            }
        );
    }

    #[test]
    fn custom_done_statuses_replace_defaults() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("VELOCAST_DONE_STATUSES", "Done, Shipped ,"));
        let config = JiraConfig::from_lookup(lookup(&pairs)).expect("valid config");
        assert_eq!(config.done_statuses, vec!["Done", "Shipped"]);
    }

    #[test]
    fn tls_mode_uses_existing_ca_bundle_and_falls_back_otherwise() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bundle = dir.path().join("corp-ca.pem");
        std::fs::write(&bundle, "-----BEGIN CERTIFICATE-----\n").expect("write bundle");

        assert_eq!(
            TlsMode::parse(bundle.to_str().expect("utf8 path")),
            TlsMode::CustomCa(bundle.clone())
        );
        assert_eq!(
            TlsMode::parse("/nonexistent/corp-ca.pem"),
            TlsMode::Verify
        );
    }

    #[test]
    fn rejects_non_http_base_url() {
        let mut pairs = REQUIRED.to_vec();
        pairs[0] = ("VELOCAST_JIRA_URL", "jira.example.test");
        let error = JiraConfig::from_lookup(lookup(&pairs)).expect_err("invalid url");
        assert!(matches!(error, ValidationError::InvalidBaseUrl { .. }));
    }
}
