//! # Velocast Core
//!
//! Sprint data acquisition and velocity forecasting against a ticket tracker
//! whose REST surface differs from one deployment to the next.
//!
//! ## Overview
//!
//! - **Resilient fetching** with bounded exponential backoff for transient failures
//! - **Endpoint negotiation** over ordered path/payload candidates, cached per query kind
//! - **Issue normalization** from deployment-specific custom fields to canonical records
//! - **Sprint collection** that records per-sprint failures instead of aborting
//! - **Velocity aggregation** and **capacity forecasting** over rolling windows
//! - **History merge** that only ever appends
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`collector`] | Sprint enumeration and per-sprint issue collection |
//! | [`config`] | Typed tracker configuration and TLS mode |
//! | [`domain`] | Canonical issue, sprint, and velocity types |
//! | [`error`] | Validation errors |
//! | [`fetcher`] | Single-request transport with retry |
//! | [`forecast`] | Rolling-window capacity forecasts |
//! | [`history`] | Append-only history log and store contract |
//! | [`http_client`] | HTTP client abstraction |
//! | [`jql`] | JQL value sanitization |
//! | [`negotiation`] | Endpoint candidates and negotiation |
//! | [`normalizer`] | Raw issue JSON to canonical issues |
//! | [`retry`] | Backoff and retry policy |
//! | [`testing`] | Scripted offline HTTP client |
//! | [`velocity`] | Achieved points and time per sprint |
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ Sprint Collector │──────────────┐
//! └────────┬─────────┘              │
//!          │                        ▼
//!          ▼                 ┌──────────────┐
//! ┌──────────────────┐       │  Normalizer  │
//! │    Negotiator    │       └──────────────┘
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │     Fetcher      │────▶│ HTTP Client      │
//! │ (retry/backoff)  │     │ (reqwest/script) │
//! └──────────────────┘     └──────────────────┘
//!
//! SprintResult ─▶ Velocity Aggregator ─▶ History merge ─▶ Capacity Forecaster
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use velocast_core::{
//!     CollectorConfig, Fetcher, IssueNormalizer, JiraConfig, Negotiator,
//!     ReqwestHttpClient, SprintCollector, VelocityAggregator,
//! };
//!
//! let config = JiraConfig::from_env()?;
//! let client = Arc::new(ReqwestHttpClient::new(&config.tls)?);
//! let fetcher = Fetcher::new(client, config.auth()).with_timeout_ms(config.timeout_ms);
//! let negotiator = Arc::new(Negotiator::new(fetcher, &config.base_url));
//! let normalizer = IssueNormalizer::new(config.fields.clone(), &config.done_statuses)?;
//! let collector = SprintCollector::new(negotiator, normalizer, &config.board_id, &CollectorConfig::default())?;
//!
//! let results = collector.collect(5).await?;
//! let (records, _excluded) = VelocityAggregator::default().aggregate(&results);
//! let forecast = velocast_core::forecast(&records, 40.0)?;
//! ```
//!
//! ## Security
//!
//! - Credentials never appear in `Debug` output or log events
//! - Values interpolated into JQL pass through [`jql::sanitize_value`]
//! - TLS verification is resolved once into [`TlsMode`]

pub mod collector;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod forecast;
pub mod history;
pub mod http_client;
pub mod jql;
pub mod negotiation;
pub mod normalizer;
pub mod retry;
pub mod testing;
pub mod velocity;

pub use collector::{parse_sprint, CollectError, CollectorConfig, SprintCollector};
pub use config::{FieldMapping, JiraConfig, TlsMode, DEFAULT_DONE_STATUSES};
pub use domain::{
    CanonicalIssue, IssueType, PartialSprintFailure, Person, Sprint, SprintResult, SprintState,
    UtcDateTime, VelocityRecord,
};
pub use error::ValidationError;
pub use fetcher::{FetchError, Fetcher};
pub use forecast::{forecast, ForecastResult, WindowForecast, FORECAST_WINDOWS};
pub use history::{
    commit, merge, HistoryError, HistoryLog, HistoryStore, MergeOutcome, StoreError,
};
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpMethod, HttpRequest, HttpResponse,
    ReqwestHttpClient,
};
pub use jql::JqlValueKind;
pub use negotiation::{
    CandidateAttempt, CandidateCatalog, Cursor, EndpointCandidate, NegotiationError, Negotiator,
    NegotiatorConfig, Pagination, PayloadShape, Query, QueryKind, QueryOutcome,
};
pub use normalizer::IssueNormalizer;
pub use retry::{Backoff, RetryConfig};
pub use velocity::{format_hours_minutes, Exclusion, VelocityAggregator, DEFAULT_DAYS_PER_MEMBER};
