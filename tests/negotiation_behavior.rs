//! Behavior-driven tests for endpoint negotiation
//!
//! These tests verify WHICH endpoint a logical query lands on when a
//! deployment only supports some of the known request shapes.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use velocast_core::testing::ScriptedHttpClient;
use velocast_core::{
    CandidateCatalog, EndpointCandidate, FetchError, Fetcher, HttpAuth, HttpMethod, HttpResponse,
    NegotiationError, Negotiator, NegotiatorConfig, Pagination, Query, QueryKind, RetryConfig,
};

const BASE: &str = "https://jira.test";

fn negotiator(client: &Arc<ScriptedHttpClient>) -> Negotiator {
    let fetcher = Fetcher::new(client.clone(), HttpAuth::None)
        .with_retry(RetryConfig::fixed(Duration::ZERO, 2));
    Negotiator::new(fetcher, BASE)
}

fn two_candidate_catalog() -> CandidateCatalog {
    CandidateCatalog::empty().with_candidates(
        QueryKind::BoardSprints,
        vec![
            EndpointCandidate::get("legacy", "/legacy/board/{board}/sprint", Pagination::Offset, Some("values")),
            EndpointCandidate::get("current", "/current/board/{board}/sprint", Pagination::Offset, Some("values")),
        ],
    )
}

fn sprint_values(ids: &[u64]) -> Vec<Value> {
    ids.iter()
        .map(|id| json!({"id": id, "state": "closed", "name": format!("Sprint {id}")}))
        .collect()
}

fn sprint_page(ids: &[u64]) -> HttpResponse {
    HttpResponse::ok_json(json!({"values": sprint_values(ids), "isLast": true}).to_string())
}

/// A page that claims more results follow.
fn open_ended_page(ids: &[u64]) -> HttpResponse {
    HttpResponse::ok_json(json!({"values": sprint_values(ids), "isLast": false}).to_string())
}

// =============================================================================
// Negotiator: Fallback and Caching
// =============================================================================

#[tokio::test]
async fn query_falls_back_and_later_queries_go_straight_to_the_winner() {
    // Given: A deployment without the first candidate's endpoint
    let client = Arc::new(
        ScriptedHttpClient::default()
            .with_route(HttpMethod::Get, "/legacy/", HttpResponse::new(404, r#"{"errorMessages":["gone"]}"#))
            .with_route(HttpMethod::Get, "/current/", sprint_page(&[1, 2])),
    );
    let negotiator = negotiator(&client).with_catalog(two_candidate_catalog());

    // When: The same kind of query runs twice
    let first = negotiator
        .fetch_all(&Query::board_sprints("7", None))
        .await
        .expect("second candidate answers");
    let second = negotiator
        .fetch_all(&Query::board_sprints("7", None))
        .await
        .expect("cached candidate answers");

    // Then: The first run records the fallback and the second never probes the failed candidate
    assert_eq!(first.candidate, "current");
    assert_eq!(first.fallbacks.len(), 1);
    assert_eq!(first.fallbacks[0].candidate, "legacy");
    assert_eq!(first.fallbacks[0].status, Some(404));
    assert_eq!(first.items.len(), 2);

    assert_eq!(second.candidate, "current");
    assert!(second.fallbacks.is_empty());
    assert_eq!(negotiator.cached_winner(QueryKind::BoardSprints), Some("current"));

    let legacy_calls = client
        .requested_urls()
        .iter()
        .filter(|url| url.contains("/legacy/"))
        .count();
    assert_eq!(legacy_calls, 1);
    assert_eq!(client.request_count(), 3);
}

#[tokio::test]
async fn exhausted_negotiation_names_every_candidate_tried() {
    // Given: A deployment that rejects every candidate
    let client = Arc::new(
        ScriptedHttpClient::default()
            .with_route(HttpMethod::Get, "/legacy/", HttpResponse::new(410, "removed"))
            .with_route(HttpMethod::Get, "/current/", HttpResponse::new(400, "bad request")),
    );
    let negotiator = negotiator(&client).with_catalog(two_candidate_catalog());

    // When: A query is attempted
    let error = negotiator
        .fetch_all(&Query::board_sprints("7", None))
        .await
        .expect_err("nothing is compatible");

    // Then: The error lists both attempts with their statuses, and nothing was cached
    match &error {
        NegotiationError::Exhausted { kind, attempts } => {
            assert_eq!(*kind, QueryKind::BoardSprints);
            let summary = attempts
                .iter()
                .map(|attempt| (attempt.candidate, attempt.status))
                .collect::<Vec<_>>();
            assert_eq!(summary, vec![("legacy", Some(410)), ("current", Some(400))]);
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(error.code(), "negotiation.exhausted");
    assert_eq!(negotiator.cached_winner(QueryKind::BoardSprints), None);
}

#[tokio::test]
async fn transient_failures_are_terminal_rather_than_a_reason_to_fall_back() {
    // Given: The first candidate's server keeps failing
    let client = Arc::new(
        ScriptedHttpClient::default()
            .with_route(HttpMethod::Get, "/legacy/", HttpResponse::new(503, "unavailable"))
            .with_route(HttpMethod::Get, "/current/", sprint_page(&[1])),
    );
    let negotiator = negotiator(&client).with_catalog(two_candidate_catalog());

    // When: A query is attempted
    let error = negotiator
        .fetch_all(&Query::board_sprints("7", None))
        .await
        .expect_err("retries exhausted");

    // Then: The transient failure surfaces and the second candidate is never tried
    assert!(matches!(
        error,
        NegotiationError::Fetch(FetchError::TransientNetwork { attempts: 3, .. })
    ));
    assert!(client.requested_urls().iter().all(|url| url.contains("/legacy/")));
}

// =============================================================================
// Negotiator: Default Catalog Against Real-World Shapes
// =============================================================================

#[tokio::test]
async fn sprint_issues_walk_down_to_the_minimal_token_search_and_follow_pages() {
    // Given: No agile issue endpoint, a search/jql endpoint that rejects the full payload
    let client = Arc::new(ScriptedHttpClient::new(vec![
        Ok(HttpResponse::new(404, "not found")),
        Ok(HttpResponse::new(400, r#"{"errorMessages":["Invalid request payload"]}"#)),
        Ok(HttpResponse::ok_json(
            json!({"issues": [{"key": "VEL-1"}, {"key": "VEL-2"}], "nextPageToken": "page-2", "isLast": false})
                .to_string(),
        )),
        Ok(HttpResponse::ok_json(
            json!({"issues": [{"key": "VEL-3"}], "isLast": true}).to_string(),
        )),
    ]));
    let negotiator = negotiator(&client);

    // When: The issues of a sprint are requested
    let outcome = negotiator
        .fetch_all(&Query::sprint_issues(
            55,
            Some(String::from("issuetype = \"Story\"")),
            vec![String::from("summary"), String::from("status")],
        ))
        .await
        .expect("minimal search answers");

    // Then: Every page is collected through the minimal shape
    assert_eq!(outcome.candidate, "search-jql-minimal");
    assert_eq!(outcome.pages, 2);
    let keys = outcome
        .items
        .iter()
        .filter_map(|item| item.get("key").and_then(Value::as_str))
        .collect::<Vec<_>>();
    assert_eq!(keys, vec!["VEL-1", "VEL-2", "VEL-3"]);

    // And: The minimal payload carries the JQL and, on page two, only the continuation token
    let requests = client.recorded_requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[0].method, HttpMethod::Get);
    assert!(requests[0].url.contains("/rest/agile/1.0/sprint/55/issue"));

    let first_page: Value =
        serde_json::from_str(requests[2].body.as_deref().expect("body")).expect("json body");
    assert_eq!(first_page["jql"], json!("sprint = 55 AND issuetype = \"Story\""));
    assert!(first_page.get("startAt").is_none());
    assert!(first_page.get("maxResults").is_none());

    let second_page: Value =
        serde_json::from_str(requests[3].body.as_deref().expect("body")).expect("json body");
    assert_eq!(second_page["nextPageToken"], json!("page-2"));
}

#[tokio::test]
async fn offset_pagination_follows_the_reported_total() {
    let client = Arc::new(ScriptedHttpClient::new(vec![
        Ok(HttpResponse::ok_json(
            json!({"startAt": 0, "maxResults": 2, "total": 3, "issues": [{"key": "A-1"}, {"key": "A-2"}]})
                .to_string(),
        )),
        Ok(HttpResponse::ok_json(
            json!({"startAt": 2, "maxResults": 2, "total": 3, "issues": [{"key": "A-3"}]}).to_string(),
        )),
    ]));
    let negotiator = negotiator(&client);

    let outcome = negotiator
        .fetch_all(
            &Query::sprint_issues(8, None, Vec::new())
                .with_page_size(2)
                .expect("page size"),
        )
        .await
        .expect("agile endpoint answers");

    assert_eq!(outcome.candidate, "agile-sprint-issues");
    assert_eq!(outcome.items.len(), 3);
    let urls = client.requested_urls();
    assert!(urls[0].contains("startAt=0"));
    assert!(urls[1].contains("startAt=2"));
    assert!(urls[1].contains("maxResults=2"));
}

#[tokio::test]
async fn cached_winner_is_dropped_when_the_deployment_stops_accepting_it() {
    // Given: A winner cached from an earlier query
    let client = Arc::new(ScriptedHttpClient::new(vec![
        Ok(HttpResponse::new(404, "no legacy")),
        Ok(sprint_page(&[1])),
        Ok(HttpResponse::new(404, "current removed too")),
        Ok(sprint_page(&[2])),
    ]));
    let catalog = two_candidate_catalog();
    let negotiator = negotiator(&client).with_catalog(catalog);
    negotiator
        .fetch_all(&Query::board_sprints("7", None))
        .await
        .expect("first negotiation");
    assert_eq!(negotiator.cached_winner(QueryKind::BoardSprints), Some("current"));

    // When: The cached endpoint starts answering 404
    let outcome = negotiator
        .fetch_all(&Query::board_sprints("7", None))
        .await
        .expect("renegotiated");

    // Then: Negotiation restarts from the top of the list
    assert_eq!(outcome.candidate, "legacy");
    assert_eq!(outcome.fallbacks.len(), 1);
    assert_eq!(negotiator.cached_winner(QueryKind::BoardSprints), Some("legacy"));
}

// =============================================================================
// Negotiator: Failures After the First Page
// =============================================================================

#[tokio::test]
async fn endless_pagination_stops_at_the_page_ceiling() {
    // Given: A server that always reports another page
    let client = Arc::new(
        ScriptedHttpClient::default()
            .with_route(HttpMethod::Get, "/legacy/", open_ended_page(&[1]))
            .with_route(HttpMethod::Get, "/current/", sprint_page(&[1])),
    );
    let negotiator = negotiator(&client)
        .with_catalog(two_candidate_catalog())
        .with_config(NegotiatorConfig { page_size: 1, max_pages: 3 })
        .expect("config");

    // When: A query is attempted
    let error = negotiator
        .fetch_all(&Query::board_sprints("7", None))
        .await
        .expect_err("ceiling reached");

    // Then: Exactly three pages were requested and the next candidate was never tried
    match error {
        NegotiationError::PageLimit { kind, candidate, pages } => {
            assert_eq!(kind, QueryKind::BoardSprints);
            assert_eq!(candidate, "legacy");
            assert_eq!(pages, 3);
        }
        other => panic!("expected page limit, got {other:?}"),
    }
    assert_eq!(client.request_count(), 3);
    assert!(client.requested_urls().iter().all(|url| url.contains("/legacy/")));
}

#[tokio::test]
async fn rejected_later_page_is_terminal_rather_than_a_fallback() {
    // Given: A candidate that answers page one and rejects page two
    let client = Arc::new(ScriptedHttpClient::new(vec![
        Ok(open_ended_page(&[1])),
        Ok(HttpResponse::new(400, r#"{"errorMessages":["startAt out of range"]}"#)),
        Ok(sprint_page(&[2])),
    ]));
    let negotiator = negotiator(&client).with_catalog(two_candidate_catalog());

    // When: A query is attempted
    let error = negotiator
        .fetch_all(&Query::board_sprints("7", None))
        .await
        .expect_err("page two rejected");

    // Then: The rejection surfaces and the second candidate is never asked
    assert!(matches!(
        error,
        NegotiationError::PageRejected { candidate: "legacy", page: 2, status: 400, .. }
    ));
    assert_eq!(error.code(), "negotiation.page_rejected");
    assert_eq!(client.request_count(), 2);
    assert_eq!(negotiator.cached_winner(QueryKind::BoardSprints), None);
}

#[tokio::test]
async fn undecodable_later_page_is_terminal() {
    let client = Arc::new(ScriptedHttpClient::new(vec![
        Ok(open_ended_page(&[1])),
        Ok(HttpResponse::ok_json("<html>maintenance</html>")),
        Ok(sprint_page(&[2])),
    ]));
    let negotiator = negotiator(&client).with_catalog(two_candidate_catalog());

    let error = negotiator
        .fetch_all(&Query::board_sprints("7", None))
        .await
        .expect_err("page two undecodable");

    assert!(matches!(error, NegotiationError::Decode { candidate: "legacy", page: 2, .. }));
    assert_eq!(client.request_count(), 2);
}
