//! Endpoint negotiation across deployment-specific REST surfaces.
//!
//! Each [`QueryKind`] owns an ordered list of [`EndpointCandidate`]s. A query
//! tries them in order; a 4xx on the first page marks the candidate as
//! incompatible and moves to the next one. The first candidate that answers
//! wins for the rest of the process and every later page or query of that
//! kind goes straight to it.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, PoisonError};

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::fetcher::{FetchError, Fetcher};
use crate::http_client::{HttpMethod, HttpResponse};
use crate::jql;
use crate::{SprintState, ValidationError};

/// Logical query families the negotiator knows how to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    BoardSprints,
    SprintDetail,
    SprintIssues,
}

impl QueryKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BoardSprints => "board_sprints",
            Self::SprintDetail => "sprint_detail",
            Self::SprintIssues => "sprint_issues",
        }
    }
}

impl Display for QueryKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of one logical request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub kind: QueryKind,
    pub board_id: Option<String>,
    pub sprint_id: Option<u64>,
    pub sprint_state: Option<SprintState>,
    /// Extra JQL narrowing the result, already sanitized.
    pub filter: Option<String>,
    pub fields: Vec<String>,
    pub page_size: Option<u32>,
}

impl Query {
    pub fn board_sprints(board_id: impl Into<String>, state: Option<SprintState>) -> Self {
        Self {
            kind: QueryKind::BoardSprints,
            board_id: Some(board_id.into()),
            sprint_id: None,
            sprint_state: state,
            filter: None,
            fields: Vec::new(),
            page_size: None,
        }
    }

    pub fn sprint_detail(sprint_id: u64) -> Self {
        Self {
            kind: QueryKind::SprintDetail,
            board_id: None,
            sprint_id: Some(sprint_id),
            sprint_state: None,
            filter: None,
            fields: Vec::new(),
            page_size: None,
        }
    }

    pub fn sprint_issues(sprint_id: u64, filter: Option<String>, fields: Vec<String>) -> Self {
        Self {
            kind: QueryKind::SprintIssues,
            board_id: None,
            sprint_id: Some(sprint_id),
            sprint_state: None,
            filter,
            fields,
            page_size: None,
        }
    }

    /// # Errors
    ///
    /// Returns [`ValidationError::ZeroPageSize`] for a zero page size.
    pub fn with_page_size(mut self, page_size: u32) -> Result<Self, ValidationError> {
        if page_size == 0 {
            return Err(ValidationError::ZeroPageSize);
        }
        self.page_size = Some(page_size);
        Ok(self)
    }
}

/// Continuation position within a paginated result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    Start,
    Offset(u64),
    Token(String),
}

impl Cursor {
    fn offset(&self) -> u64 {
        match self {
            Self::Offset(offset) => *offset,
            Self::Start | Self::Token(_) => 0,
        }
    }
}

/// How a candidate encodes the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// GET with parameters in the query string.
    QueryString,
    /// POST `{jql, fields, startAt | nextPageToken, maxResults}`.
    JsonFull,
    /// POST `{jql, fields}` plus the continuation once past the first page.
    JsonMinimal,
    /// POST `{query: {jql, startAt | nextPageToken, maxResults}, fields}`.
    JsonNested,
}

/// How a candidate reports that more pages remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// `startAt` + item count compared against `total`, or `isLast`.
    Offset,
    /// `nextPageToken`, absent on the last page.
    Token,
    /// One object, no pages.
    Single,
}

/// One concrete path and payload shape that may satisfy a query kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointCandidate {
    pub name: &'static str,
    pub method: HttpMethod,
    /// Path below the base URL; `{board}` and `{sprint}` are substituted.
    pub path: &'static str,
    pub shape: PayloadShape,
    pub pagination: Pagination,
    /// Response array holding the items; `None` when the body is the item.
    pub items_key: Option<&'static str>,
}

impl EndpointCandidate {
    pub const fn get(
        name: &'static str,
        path: &'static str,
        pagination: Pagination,
        items_key: Option<&'static str>,
    ) -> Self {
        Self {
            name,
            method: HttpMethod::Get,
            path,
            shape: PayloadShape::QueryString,
            pagination,
            items_key,
        }
    }

    pub const fn post(
        name: &'static str,
        path: &'static str,
        shape: PayloadShape,
        pagination: Pagination,
    ) -> Self {
        Self {
            name,
            method: HttpMethod::Post,
            path,
            shape,
            pagination,
            items_key: Some("issues"),
        }
    }
}

/// Ordered candidates per query kind.
#[derive(Debug, Clone)]
pub struct CandidateCatalog {
    candidates: HashMap<QueryKind, Vec<EndpointCandidate>>,
}

impl Default for CandidateCatalog {
    fn default() -> Self {
        let mut sprint_issues = vec![EndpointCandidate::get(
            "agile-sprint-issues",
            "/rest/agile/1.0/sprint/{sprint}/issue",
            Pagination::Offset,
            Some("issues"),
        )];
        sprint_issues.extend(search_candidates(
            ["search-jql-full", "search-jql-minimal", "search-jql-nested"],
            "/rest/api/3/search/jql",
            Pagination::Token,
        ));
        sprint_issues.extend(search_candidates(
            ["search-full", "search-minimal", "search-nested"],
            "/rest/api/3/search",
            Pagination::Offset,
        ));

        Self::empty()
            .with_candidates(
                QueryKind::BoardSprints,
                vec![EndpointCandidate::get(
                    "agile-board-sprints",
                    "/rest/agile/1.0/board/{board}/sprint",
                    Pagination::Offset,
                    Some("values"),
                )],
            )
            .with_candidates(
                QueryKind::SprintDetail,
                vec![EndpointCandidate::get(
                    "agile-sprint",
                    "/rest/agile/1.0/sprint/{sprint}",
                    Pagination::Single,
                    None,
                )],
            )
            .with_candidates(QueryKind::SprintIssues, sprint_issues)
    }
}

/// Full, minimal, then nested payloads against one search path.
fn search_candidates(
    names: [&'static str; 3],
    path: &'static str,
    pagination: Pagination,
) -> Vec<EndpointCandidate> {
    let shapes = [
        PayloadShape::JsonFull,
        PayloadShape::JsonMinimal,
        PayloadShape::JsonNested,
    ];
    names
        .into_iter()
        .zip(shapes)
        .map(|(name, shape)| EndpointCandidate::post(name, path, shape, pagination))
        .collect()
}

impl CandidateCatalog {
    pub fn empty() -> Self {
        Self {
            candidates: HashMap::new(),
        }
    }

    pub fn with_candidates(mut self, kind: QueryKind, candidates: Vec<EndpointCandidate>) -> Self {
        self.candidates.insert(kind, candidates);
        self
    }

    pub fn candidates(&self, kind: QueryKind) -> &[EndpointCandidate] {
        self.candidates.get(&kind).map_or(&[], Vec::as_slice)
    }
}

/// Negotiation tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatorConfig {
    pub page_size: u32,
    /// Safety ceiling on pages fetched for one query.
    pub max_pages: usize,
}

impl Default for NegotiatorConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            max_pages: 200,
        }
    }
}

/// Why one candidate was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateAttempt {
    pub candidate: &'static str,
    pub status: Option<u16>,
    pub reason: String,
}

impl Display for CandidateAttempt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (status {status}): {}", self.candidate, self.reason),
            None => write!(f, "{}: {}", self.candidate, self.reason),
        }
    }
}

fn describe_attempts(attempts: &[CandidateAttempt]) -> String {
    if attempts.is_empty() {
        return String::from("no candidates configured");
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Terminal negotiation failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("every endpoint candidate for '{kind}' failed: {}", describe_attempts(attempts))]
    Exhausted {
        kind: QueryKind,
        attempts: Vec<CandidateAttempt>,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("candidate '{candidate}' returned an undecodable body on page {page}: {message}")]
    Decode {
        candidate: &'static str,
        page: usize,
        message: String,
    },

    #[error("candidate '{candidate}' rejected page {page} with status {status}: {message}")]
    PageRejected {
        candidate: &'static str,
        page: usize,
        status: u16,
        message: String,
    },

    #[error("candidate '{candidate}' still had more results after {pages} pages")]
    PageLimit {
        kind: QueryKind,
        candidate: &'static str,
        pages: usize,
    },

    #[error("query '{kind}' is missing its {field}")]
    IncompleteQuery {
        kind: QueryKind,
        field: &'static str,
    },
}

impl NegotiationError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Exhausted { .. } => "negotiation.exhausted",
            Self::Fetch(error) => error.code(),
            Self::Decode { .. } => "negotiation.decode",
            Self::PageRejected { .. } => "negotiation.page_rejected",
            Self::PageLimit { .. } => "negotiation.page_limit",
            Self::IncompleteQuery { .. } => "negotiation.incomplete_query",
        }
    }
}

/// Items gathered for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub items: Vec<Value>,
    pub candidate: &'static str,
    pub pages: usize,
    /// Candidates abandoned before the winner answered.
    pub fallbacks: Vec<CandidateAttempt>,
}

enum CandidateFailure {
    Incompatible(CandidateAttempt),
    Terminal(NegotiationError),
}

impl From<NegotiationError> for CandidateFailure {
    fn from(error: NegotiationError) -> Self {
        Self::Terminal(error)
    }
}

/// Resolves logical queries to whichever endpoint the deployment accepts.
pub struct Negotiator {
    fetcher: Fetcher,
    base_url: String,
    catalog: CandidateCatalog,
    config: NegotiatorConfig,
    winners: Mutex<HashMap<QueryKind, usize>>,
}

impl Negotiator {
    pub fn new(fetcher: Fetcher, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            catalog: CandidateCatalog::default(),
            config: NegotiatorConfig::default(),
            winners: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_catalog(mut self, catalog: CandidateCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// # Errors
    ///
    /// Returns [`ValidationError`] when the page size or page ceiling is zero.
    pub fn with_config(mut self, config: NegotiatorConfig) -> Result<Self, ValidationError> {
        if config.page_size == 0 || config.max_pages == 0 {
            return Err(ValidationError::ZeroPageSize);
        }
        self.config = config;
        Ok(self)
    }

    pub fn config(&self) -> NegotiatorConfig {
        self.config
    }

    /// Candidate currently remembered for `kind`, if any.
    pub fn cached_winner(&self, kind: QueryKind) -> Option<&'static str> {
        let index = *self.winners_guard().get(&kind)?;
        self.catalog.candidates(kind).get(index).map(|c| c.name)
    }

    /// Fetch every page of `query` through the first compatible candidate.
    ///
    /// # Errors
    ///
    /// Returns [`NegotiationError::Exhausted`] when no candidate is compatible,
    /// or the terminal error of the candidate that was answering.
    pub async fn fetch_all(&self, query: &Query) -> Result<QueryOutcome, NegotiationError> {
        let candidates = self.catalog.candidates(query.kind);
        let mut fallbacks = Vec::new();
        let cached = self.winners_guard().get(&query.kind).copied();

        if let Some(index) = cached.filter(|index| *index < candidates.len()) {
            let candidate = &candidates[index];
            tracing::debug!(kind = %query.kind, candidate = candidate.name, "using cached endpoint");
            match self.run_candidate(candidate, query).await {
                Ok((items, pages)) => {
                    return Ok(QueryOutcome {
                        items,
                        candidate: candidate.name,
                        pages,
                        fallbacks,
                    })
                }
                Err(CandidateFailure::Incompatible(attempt)) => {
                    tracing::info!(
                        kind = %query.kind, candidate = candidate.name, status = ?attempt.status,
                        "cached endpoint no longer accepted; renegotiating"
                    );
                    self.winners_guard().remove(&query.kind);
                    fallbacks.push(attempt);
                }
                Err(CandidateFailure::Terminal(error)) => return Err(error),
            }
        }

        for (index, candidate) in candidates.iter().enumerate() {
            if Some(index) == cached {
                continue;
            }
            match self.run_candidate(candidate, query).await {
                Ok((items, pages)) => {
                    self.winners_guard().insert(query.kind, index);
                    if !fallbacks.is_empty() {
                        tracing::info!(
                            kind = %query.kind, candidate = candidate.name,
                            failed = fallbacks.len(), "endpoint fallback succeeded"
                        );
                    }
                    return Ok(QueryOutcome {
                        items,
                        candidate: candidate.name,
                        pages,
                        fallbacks,
                    });
                }
                Err(CandidateFailure::Incompatible(attempt)) => {
                    tracing::info!(
                        kind = %query.kind, candidate = candidate.name, status = ?attempt.status,
                        reason = %attempt.reason, "endpoint candidate incompatible"
                    );
                    fallbacks.push(attempt);
                }
                Err(CandidateFailure::Terminal(error)) => return Err(error),
            }
        }

        Err(NegotiationError::Exhausted {
            kind: query.kind,
            attempts: fallbacks,
        })
    }

    async fn run_candidate(
        &self,
        candidate: &EndpointCandidate,
        query: &Query,
    ) -> Result<(Vec<Value>, usize), CandidateFailure> {
        let page_size = query.page_size.unwrap_or(self.config.page_size);
        let path = resolve_path(candidate.path, query)?;
        let mut cursor = Cursor::Start;
        let mut items = Vec::new();
        let mut pages = 0;

        loop {
            if pages == self.config.max_pages {
                return Err(NegotiationError::PageLimit {
                    kind: query.kind,
                    candidate: candidate.name,
                    pages,
                }
                .into());
            }
            pages += 1;
            let first_page = pages == 1;

            let (url, payload) =
                self.build_request(candidate, &path, query, &cursor, page_size);
            let response = self
                .fetcher
                .fetch(candidate.method, &url, payload.as_ref())
                .await
                .map_err(NegotiationError::from)?;

            if !response.is_success() {
                return Err(rejected(candidate, pages, &response, first_page));
            }

            let body = match serde_json::from_str::<Value>(&response.body) {
                Ok(body) => body,
                Err(error) if first_page => {
                    return Err(CandidateFailure::Incompatible(CandidateAttempt {
                        candidate: candidate.name,
                        status: Some(response.status),
                        reason: format!("response is not JSON: {error}"),
                    }))
                }
                Err(error) => {
                    return Err(NegotiationError::Decode {
                        candidate: candidate.name,
                        page: pages,
                        message: error.to_string(),
                    }
                    .into())
                }
            };

            let page_items = match candidate.items_key {
                None => vec![body.clone()],
                Some(key) => match body.get(key).and_then(Value::as_array) {
                    Some(array) => array.clone(),
                    None if first_page => {
                        return Err(CandidateFailure::Incompatible(CandidateAttempt {
                            candidate: candidate.name,
                            status: Some(response.status),
                            reason: format!("response has no '{key}' array"),
                        }))
                    }
                    None => {
                        return Err(NegotiationError::Decode {
                            candidate: candidate.name,
                            page: pages,
                            message: format!("response has no '{key}' array"),
                        }
                        .into())
                    }
                },
            };

            let next = next_cursor(candidate.pagination, &body, &cursor, page_items.len());
            items.extend(page_items);
            match next {
                Some(next) => cursor = next,
                None => return Ok((items, pages)),
            }
        }
    }

    fn build_request(
        &self,
        candidate: &EndpointCandidate,
        path: &str,
        query: &Query,
        cursor: &Cursor,
        page_size: u32,
    ) -> (String, Option<Value>) {
        let url = format!("{}{}", self.base_url, path);
        match candidate.shape {
            PayloadShape::QueryString => {
                let mut params: Vec<(&str, String)> = Vec::new();
                if let Some(state) = query.sprint_state {
                    params.push(("state", state.as_str().to_owned()));
                }
                if let Some(filter) = &query.filter {
                    params.push(("jql", filter.clone()));
                }
                if !query.fields.is_empty() {
                    params.push(("fields", query.fields.join(",")));
                }
                if candidate.pagination != Pagination::Single {
                    params.push(("startAt", cursor.offset().to_string()));
                    params.push(("maxResults", page_size.to_string()));
                }
                (append_query_string(url, &params), None)
            }
            shape => {
                let jql = search_jql(query);
                (url, Some(search_payload(shape, jql, &query.fields, cursor, page_size)))
            }
        }
    }

    fn winners_guard(&self) -> std::sync::MutexGuard<'_, HashMap<QueryKind, usize>> {
        self.winners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn rejected(
    candidate: &EndpointCandidate,
    page: usize,
    response: &HttpResponse,
    first_page: bool,
) -> CandidateFailure {
    if first_page {
        CandidateFailure::Incompatible(CandidateAttempt {
            candidate: candidate.name,
            status: Some(response.status),
            reason: response.body_excerpt(),
        })
    } else {
        CandidateFailure::Terminal(NegotiationError::PageRejected {
            candidate: candidate.name,
            page,
            status: response.status,
            message: response.body_excerpt(),
        })
    }
}

fn resolve_path(template: &str, query: &Query) -> Result<String, NegotiationError> {
    let mut path = template.to_owned();
    if path.contains("{board}") {
        let board = query
            .board_id
            .as_deref()
            .ok_or(NegotiationError::IncompleteQuery {
                kind: query.kind,
                field: "board id",
            })?;
        path = path.replace("{board}", &urlencoding::encode(board));
    }
    if path.contains("{sprint}") {
        let sprint = query.sprint_id.ok_or(NegotiationError::IncompleteQuery {
            kind: query.kind,
            field: "sprint id",
        })?;
        path = path.replace("{sprint}", &sprint.to_string());
    }
    Ok(path)
}

fn append_query_string(url: String, params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return url;
    }
    let encoded = params
        .iter()
        .map(|(name, value)| format!("{name}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{url}?{encoded}")
}

fn search_jql(query: &Query) -> String {
    match query.sprint_id {
        Some(sprint_id) => jql::sprint_query(sprint_id, query.filter.as_deref()),
        None => query.filter.clone().unwrap_or_default(),
    }
}

fn search_payload(
    shape: PayloadShape,
    jql: String,
    fields: &[String],
    cursor: &Cursor,
    page_size: u32,
) -> Value {
    let mut position = Map::new();
    match cursor {
        Cursor::Start => {
            if shape != PayloadShape::JsonMinimal {
                position.insert(String::from("startAt"), json!(0));
            }
        }
        Cursor::Offset(offset) => {
            position.insert(String::from("startAt"), json!(offset));
        }
        Cursor::Token(token) => {
            position.insert(String::from("nextPageToken"), json!(token));
        }
    }
    if shape != PayloadShape::JsonMinimal {
        position.insert(String::from("maxResults"), json!(page_size));
    }

    match shape {
        PayloadShape::JsonNested => {
            position.insert(String::from("jql"), json!(jql));
            json!({"query": Value::Object(position), "fields": fields})
        }
        _ => {
            position.insert(String::from("jql"), json!(jql));
            position.insert(String::from("fields"), json!(fields));
            Value::Object(position)
        }
    }
}

/// Continuation for the page just received, or `None` when it was the last.
fn next_cursor(
    pagination: Pagination,
    body: &Value,
    current: &Cursor,
    received: usize,
) -> Option<Cursor> {
    let is_last = body.get("isLast").and_then(Value::as_bool);
    match pagination {
        Pagination::Single => None,
        Pagination::Token => body
            .get("nextPageToken")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .filter(|_| is_last != Some(true))
            .map(|token| Cursor::Token(token.to_owned())),
        Pagination::Offset => {
            if received == 0 || is_last == Some(true) {
                return None;
            }
            let start = body
                .get("startAt")
                .and_then(Value::as_u64)
                .unwrap_or_else(|| current.offset());
            let next = start + received as u64;
            match body.get("total").and_then(Value::as_u64) {
                Some(total) => (next < total).then_some(Cursor::Offset(next)),
                None => (is_last == Some(false)).then_some(Cursor::Offset(next)),
            }
        }
    }
}
