//! Guarded construction of JQL filter fragments.
//!
//! Every value interpolated into a generated query passes through
//! [`sanitize_value`] first.

use crate::ValidationError;

const OPERATOR_WORDS: [&str; 5] = ["AND", "OR", "NOT", "IN", "IS"];
const HISTORY_WORDS: [&str; 1] = ["WAS"];
const OPERATOR_CHARS: [char; 10] = ['<', '>', '=', '!', '~', '(', ')', '[', ']', ';'];

/// Shape a value must have before it may appear in JQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JqlValueKind {
    /// Issue key, `PROJ-123`.
    Key,
    /// Label: letters, digits, `-`, `_`, `&`.
    Label,
    /// Free text; operators are rejected and quotes escaped.
    Text,
}

/// Validate `value` for `kind` and return the form safe to interpolate.
pub fn sanitize_value(value: &str, kind: JqlValueKind) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::EmptyJqlValue);
    }

    let reject = |reason: &'static str| ValidationError::UnsafeJqlValue {
        value: value.to_owned(),
        reason,
    };

    if value.contains("--") || value.contains("/*") || value.contains("*/") {
        return Err(reject("contains comment markers"));
    }
    if value.matches('"').count() > 2 || value.matches('\'').count() > 2 {
        return Err(reject("excessive quotes"));
    }

    match kind {
        JqlValueKind::Key => {
            if is_issue_key(value) {
                Ok(value.to_owned())
            } else {
                Err(reject("expected an issue key such as PROJ-123"))
            }
        }
        JqlValueKind::Label => {
            let valid = value
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '&'));
            if valid {
                Ok(value.to_owned())
            } else {
                Err(reject("labels may only contain letters, digits, '-', '_' and '&'"))
            }
        }
        JqlValueKind::Text => {
            if value.contains(OPERATOR_CHARS) {
                return Err(reject("contains a JQL operator character"));
            }
            let has_operator_word = value.split_whitespace().any(|word| {
                OPERATOR_WORDS
                    .iter()
                    .chain(HISTORY_WORDS.iter())
                    .any(|operator| word.eq_ignore_ascii_case(operator))
            });
            if has_operator_word {
                return Err(reject("contains a JQL keyword"));
            }
            Ok(value.replace('"', "\\\"").replace('\'', "\\'"))
        }
    }
}

/// Wrap an already sanitized value in double quotes.
pub fn quote(sanitized: &str) -> String {
    format!("\"{sanitized}\"")
}

/// `issuetype = "<name>"` for one issue type name.
pub fn issue_type_clause(name: &str) -> Result<String, ValidationError> {
    let sanitized = sanitize_value(name, JqlValueKind::Text)?;
    Ok(format!("issuetype = {}", quote(&sanitized)))
}

/// `sprint = <id>`, optionally narrowed by an extra clause.
pub fn sprint_query(sprint_id: u64, filter: Option<&str>) -> String {
    match filter.map(str::trim).filter(|clause| !clause.is_empty()) {
        Some(clause) => format!("sprint = {sprint_id} AND {clause}"),
        None => format!("sprint = {sprint_id}"),
    }
}

fn is_issue_key(value: &str) -> bool {
    let Some((project, number)) = value.split_once('-') else {
        return false;
    };
    let mut project_chars = project.chars();
    let starts_upper = project_chars
        .next()
        .is_some_and(|first| first.is_ascii_uppercase());
    starts_upper
        && project_chars.all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit())
        && !number.is_empty()
        && number.chars().all(|ch| ch.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_issue_keys() {
        assert_eq!(sanitize_value(" PROJ-123 ", JqlValueKind::Key).expect("valid"), "PROJ-123");
        assert_eq!(sanitize_value("A2B-7", JqlValueKind::Key).expect("valid"), "A2B-7");
    }

    #[test]
    fn rejects_malformed_keys() {
        for value in ["proj-1", "PROJ-", "PROJ-12a", "1PROJ-2", "PROJ-123'; DROP"] {
            assert!(
                sanitize_value(value, JqlValueKind::Key).is_err(),
                "value={value}"
            );
        }
    }

    #[test]
    fn labels_allow_ampersand_and_underscore() {
        assert_eq!(sanitize_value("S&A_MGT", JqlValueKind::Label).expect("valid"), "S&A_MGT");
        assert!(sanitize_value("two words", JqlValueKind::Label).is_err());
    }

    #[test]
    fn comment_markers_and_quote_floods_are_rejected_for_every_kind() {
        for kind in [JqlValueKind::Key, JqlValueKind::Label, JqlValueKind::Text] {
            assert!(sanitize_value("abc--", kind).is_err());
            assert!(sanitize_value("a/*b", kind).is_err());
            assert!(sanitize_value("\"a\"b\"", kind).is_err());
        }
    }

    #[test]
    fn text_rejects_operators_and_escapes_quotes() {
        assert!(sanitize_value("Story OR 1", JqlValueKind::Text).is_err());
        assert!(sanitize_value("a = b", JqlValueKind::Text).is_err());
        assert!(sanitize_value("(x)", JqlValueKind::Text).is_err());
        assert_eq!(
            sanitize_value("Team's task", JqlValueKind::Text).expect("valid"),
            "Team\\'s task"
        );
        assert_eq!(sanitize_value("Android", JqlValueKind::Text).expect("valid"), "Android");
    }

    #[test]
    fn empty_values_are_rejected() {
        assert_eq!(
            sanitize_value("   ", JqlValueKind::Text),
            Err(ValidationError::EmptyJqlValue)
        );
    }

    #[test]
    fn builds_clauses() {
        assert_eq!(issue_type_clause("Story").expect("valid"), "issuetype = \"Story\"");
        assert_eq!(sprint_query(12, None), "sprint = 12");
        assert_eq!(
            sprint_query(12, Some("issuetype = \"Bug\"")),
            "sprint = 12 AND issuetype = \"Bug\""
        );
    }
}
