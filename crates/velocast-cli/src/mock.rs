//! Canned board used by `--mock`.
//!
//! Three closed sprints achieving 10, 20 and 30 points, one active sprint and
//! one future sprint, served through the same negotiation path as a live
//! tracker.

use serde_json::{json, Value};
use velocast_core::testing::ScriptedHttpClient;
use velocast_core::{HttpMethod, HttpResponse, JiraConfig, ValidationError};

pub const MOCK_BOARD: &str = "42";
const MOCK_BASE_URL: &str = "https://tracker.mock.invalid";

struct MockSprint {
    id: u64,
    name: &'static str,
    state: &'static str,
    start: &'static str,
    end: &'static str,
}

const SPRINTS: &[MockSprint] = &[
    MockSprint {
        id: 101,
        name: "Sprint 1",
        state: "closed",
        start: "2024-01-01T09:00:00.000+0000",
        end: "2024-01-14T17:00:00.000+0000",
    },
    MockSprint {
        id: 102,
        name: "Sprint 2",
        state: "closed",
        start: "2024-01-15T09:00:00.000+0000",
        end: "2024-01-28T17:00:00.000+0000",
    },
    MockSprint {
        id: 103,
        name: "Sprint 3",
        state: "closed",
        start: "2024-01-29T09:00:00.000+0000",
        end: "2024-02-11T17:00:00.000+0000",
    },
    MockSprint {
        id: 104,
        name: "Sprint 4",
        state: "active",
        start: "2024-02-12T09:00:00.000+0000",
        end: "2024-02-25T17:00:00.000+0000",
    },
    MockSprint {
        id: 105,
        name: "Sprint 5",
        state: "future",
        start: "2024-02-26T09:00:00.000+0000",
        end: "2024-03-10T17:00:00.000+0000",
    },
];

pub fn config() -> Result<JiraConfig, ValidationError> {
    JiraConfig::from_lookup(|name| {
        let value = match name {
            "VELOCAST_JIRA_URL" => MOCK_BASE_URL,
            "VELOCAST_JIRA_USERNAME" => "mock@velocast.invalid",
            "VELOCAST_JIRA_TOKEN" => "mock-token",
            "VELOCAST_JIRA_BOARD" => MOCK_BOARD,
            _ => return None,
        };
        Some(value.to_owned())
    })
}

pub fn client() -> ScriptedHttpClient {
    let mut client = ScriptedHttpClient::default();

    for sprint in SPRINTS {
        client = client
            .with_route(
                HttpMethod::Get,
                format!("/rest/agile/1.0/sprint/{}/issue", sprint.id),
                issue_page(issues_for(sprint.id)),
            )
            .with_route(
                HttpMethod::Get,
                format!("/rest/agile/1.0/sprint/{}", sprint.id),
                HttpResponse::ok_json(sprint_json(sprint).to_string()),
            );
    }

    let board = format!("/rest/agile/1.0/board/{MOCK_BOARD}/sprint");
    for state in ["active", "closed", "future"] {
        let values = SPRINTS
            .iter()
            .filter(|sprint| sprint.state == state)
            .map(sprint_json)
            .collect::<Vec<_>>();
        client = client.with_route(
            HttpMethod::Get,
            format!("{board}?state={state}"),
            sprint_page(values),
        );
    }
    client.with_route(
        HttpMethod::Get,
        board,
        sprint_page(SPRINTS.iter().map(sprint_json).collect()),
    )
}

fn sprint_json(sprint: &MockSprint) -> Value {
    json!({
        "id": sprint.id,
        "self": format!("{MOCK_BASE_URL}/rest/agile/1.0/sprint/{}", sprint.id),
        "state": sprint.state,
        "name": sprint.name,
        "startDate": sprint.start,
        "endDate": sprint.end,
        "originBoardId": 42,
    })
}

fn sprint_page(values: Vec<Value>) -> HttpResponse {
    let body = json!({
        "maxResults": 50,
        "startAt": 0,
        "isLast": true,
        "values": values,
    });
    HttpResponse::ok_json(body.to_string())
}

fn issue_page(issues: Vec<Value>) -> HttpResponse {
    let body = json!({
        "startAt": 0,
        "maxResults": 50,
        "total": issues.len(),
        "issues": issues,
    });
    HttpResponse::ok_json(body.to_string())
}

fn issues_for(sprint_id: u64) -> Vec<Value> {
    match sprint_id {
        101 => vec![
            issue("VEL-1", "Story", "Done", Some(5.0), "Ada", Some(14_400)),
            issue("VEL-2", "Story", "Done", Some(5.0), "Lin", Some(10_800)),
            issue("VEL-3", "Bug", "Done", None, "Ada", Some(3_600)),
        ],
        102 => vec![
            issue("VEL-4", "Story", "Done", Some(8.0), "Ada", Some(21_600)),
            issue("VEL-5", "Story", "Closed", Some(12.0), "Lin", Some(28_800)),
            issue("VEL-6", "Story", "In Progress", Some(3.0), "Sam", Some(7_200)),
        ],
        103 => vec![
            issue("VEL-7", "Story", "Done", Some(13.0), "Ada", Some(36_000)),
            issue("VEL-8", "Story", "Resolved", Some(17.0), "Sam", Some(43_200)),
            issue("VEL-9", "Task", "Done", None, "Lin", Some(5_400)),
            issue("VEL-11", "Sub-task", "Done", None, "Lin", Some(1_800)),
        ],
        104 => vec![issue("VEL-10", "Story", "In Progress", Some(8.0), "Ada", None)],
        _ => Vec::new(),
    }
}

fn issue(
    key: &str,
    issue_type: &str,
    status: &str,
    points: Option<f64>,
    assignee: &str,
    spent_seconds: Option<u64>,
) -> Value {
    json!({
        "key": key,
        "fields": {
            "summary": format!("{issue_type} {key}"),
            "issuetype": { "name": issue_type },
            "status": { "name": status },
            "assignee": {
                "accountId": format!("acct-{}", assignee.to_ascii_lowercase()),
                "displayName": assignee,
            },
            "customfield_10024": points,
            "timetracking": {
                "timeSpentSeconds": spent_seconds,
                "remainingEstimateSeconds": 0,
            },
            "labels": ["mock"],
            "issuelinks": [],
            "description": format!("Work for {key}."),
            "customfield_10140": "* acceptance criteria recorded",
        }
    })
}
