//! Download failure classification
//!
//! A static, ordered rule table evaluated by a pure function. Rules are
//! data, not control flow: the table is the part most likely to grow. The
//! first rule whose non-null predicates all match wins; no match means the
//! caller treats the failure as unclassified/generic.

use crate::download::DownloadError;

/// One ordered classification rule.
///
/// A rule matches iff every one of its non-null predicates matches. The
/// `hard` flag marks a known systemic issue, counted separately in run
/// statistics but still producing a placeholder, never aborting the run.
/// `permanent` rules omit the "try again later" line from the placeholder.
#[derive(Debug)]
pub struct MatchingRule {
    /// Message key; also the rule's name in statistics and logs.
    pub name: &'static str,

    /// Matches when the called URL contains any of these substrings.
    pub url_contains: Option<&'static [&'static str]>,

    /// Inclusive HTTP status range.
    pub status_range: Option<(u16, u16)>,

    /// Response content-type substring.
    pub content_type_contains: Option<&'static str>,

    /// Raw response body substring.
    pub body_contains: Option<&'static str>,

    /// JSON-path string-value predicate against the response body.
    pub json_path: Option<(&'static [&'static str], &'static str)>,

    /// Explanation shown in the placeholder document.
    pub message: &'static str,

    /// Extended explanation, included when present.
    pub detail: Option<&'static str>,

    pub hard: bool,
    pub permanent: bool,
}

impl MatchingRule {
    fn matches(&self, error: &DownloadError) -> bool {
        if let Some(needles) = self.url_contains {
            if !needles.iter().any(|needle| error.url.contains(needle)) {
                return false;
            }
        }

        if let Some((low, high)) = self.status_range {
            match error.status_code {
                Some(status) if status >= low && status <= high => {}
                _ => return false,
            }
        }

        if let Some(needle) = self.content_type_contains {
            match &error.content_type {
                Some(content_type) if content_type.contains(needle) => {}
                _ => return false,
            }
        }

        if let Some(needle) = self.body_contains {
            match &error.body {
                Some(body) if body.contains(needle) => {}
                _ => return false,
            }
        }

        if let Some((path, expected)) = self.json_path {
            let Some(body) = &error.body else {
                return false;
            };
            let Ok(mut value) = serde_json::from_str::<serde_json::Value>(body) else {
                return false;
            };
            for segment in path {
                match value.get_mut(segment) {
                    Some(inner) => value = inner.take(),
                    None => return false,
                }
            }
            if value.as_str() != Some(expected) {
                return false;
            }
        }

        true
    }
}

/// The ordered rule table. Declaration order is evaluation order.
static RULES: &[MatchingRule] = &[
    MatchingRule {
        name: "html-500",
        url_contains: None,
        status_range: Some((500, 599)),
        content_type_contains: Some("text/html"),
        body_contains: Some("maintenance"),
        json_path: None,
        message: "The source site was undergoing maintenance while this snapshot was made.",
        detail: Some("The server answered with an HTML maintenance page instead of content."),
        hard: true,
        permanent: false,
    },
    MatchingRule {
        name: "api-missing-title",
        url_contains: None,
        status_range: None,
        content_type_contains: None,
        body_contains: None,
        json_path: Some((&["error", "code"], "missingtitle")),
        message: "This article was deleted from the source site before it could be fetched.",
        detail: None,
        hard: false,
        permanent: true,
    },
    MatchingRule {
        name: "deleted-article",
        url_contains: None,
        status_range: Some((404, 404)),
        content_type_contains: None,
        body_contains: None,
        json_path: None,
        message: "This article was deleted from the source site before it could be fetched.",
        detail: None,
        hard: false,
        permanent: true,
    },
    MatchingRule {
        name: "access-denied",
        url_contains: None,
        status_range: Some((401, 403)),
        content_type_contains: None,
        body_contains: None,
        json_path: None,
        message: "The source site refused access to this article.",
        detail: Some("The request was answered with an authorization failure."),
        hard: true,
        permanent: false,
    },
    MatchingRule {
        name: "rate-limited",
        url_contains: None,
        status_range: Some((429, 429)),
        content_type_contains: None,
        body_contains: None,
        json_path: None,
        message: "The source site rate-limited the snapshot while fetching this article.",
        detail: None,
        hard: false,
        permanent: false,
    },
    MatchingRule {
        name: "upstream-gateway",
        url_contains: None,
        status_range: Some((502, 504)),
        content_type_contains: None,
        body_contains: None,
        json_path: None,
        message: "The source site's gateway failed while fetching this article.",
        detail: None,
        hard: true,
        permanent: false,
    },
];

/// Matches a terminal download failure against the rule table.
///
/// Pure function; first match wins; `None` means unclassified.
pub fn classify(error: &DownloadError) -> Option<&'static MatchingRule> {
    RULES.iter().find(|rule| rule.matches(error))
}

/// The rule applied when a page vanished between listing and fetch.
///
/// Used for deletions detected without an HTTP failure (a zero-valued
/// revision marker in an otherwise successful response).
pub fn deleted_article_rule() -> &'static MatchingRule {
    RULES
        .iter()
        .find(|rule| rule.name == "deleted-article")
        .unwrap_or(&RULES[0])
}

/// Produces the stand-in offline document for a failed unit.
///
/// The placeholder occupies the unit's expected offline path so readers
/// never encounter a broken link for a unit that failed to fetch.
pub fn render_placeholder(
    rule: Option<&MatchingRule>,
    _unit_id: &str,
    display_title: &str,
) -> String {
    let message = rule
        .map(|r| r.message)
        .unwrap_or("This article could not be fetched from the source site.");
    let permanent = rule.map(|r| r.permanent).unwrap_or(false);
    let detail = rule.and_then(|r| r.detail);

    let mut body = String::new();
    body.push_str(&format!("<h1>{display_title}</h1>\n"));
    body.push_str(&format!("<p>{message}</p>\n"));
    if let Some(detail) = detail {
        body.push_str(&format!("<p class=\"detail\">{detail}</p>\n"));
    }
    if !permanent {
        body.push_str("<p>It may be available in a newer snapshot; try again later.</p>\n");
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{display_title}</title>\n</head>\n<body>\n{body}</body>\n</html>\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(
        status: Option<u16>,
        content_type: Option<&str>,
        body: Option<&str>,
    ) -> DownloadError {
        DownloadError {
            url: "https://wiki.example.com/w/api.php".to_string(),
            status_code: status,
            content_type: content_type.map(|s| s.to_string()),
            body: body.map(|s| s.to_string()),
        }
    }

    #[test]
    fn test_html_500_maintenance_is_hard() {
        let rule = classify(&error(
            Some(500),
            Some("text/html"),
            Some("<html>We are currently under maintenance</html>"),
        ))
        .unwrap();
        assert_eq!(rule.name, "html-500");
        assert!(rule.hard);
    }

    #[test]
    fn test_404_is_soft_deleted_article() {
        let rule = classify(&error(Some(404), Some("text/html"), Some("not found"))).unwrap();
        assert_eq!(rule.name, "deleted-article");
        assert!(!rule.hard);
        assert!(rule.permanent);
    }

    #[test]
    fn test_json_path_predicate_matches_api_error() {
        let rule = classify(&error(
            Some(200),
            Some("application/json"),
            Some(r#"{"error":{"code":"missingtitle","info":"The page does not exist"}}"#),
        ))
        .unwrap();
        assert_eq!(rule.name, "api-missing-title");
        assert!(rule.permanent);
    }

    #[test]
    fn test_plain_500_without_marker_is_unclassified() {
        assert!(classify(&error(Some(500), Some("application/json"), Some("{}"))).is_none());
    }

    #[test]
    fn test_first_match_wins_over_later_rules() {
        // A 503 HTML maintenance page matches both html-500 and
        // upstream-gateway; declaration order picks html-500.
        let rule = classify(&error(
            Some(503),
            Some("text/html; charset=utf-8"),
            Some("scheduled maintenance window"),
        ))
        .unwrap();
        assert_eq!(rule.name, "html-500");
    }

    #[test]
    fn test_placeholder_omits_retry_line_for_permanent_rules() {
        let deleted = classify(&error(Some(404), None, None)).unwrap();
        let html = render_placeholder(Some(deleted), "Earth", "Earth");
        assert!(html.contains("<h1>Earth</h1>"));
        assert!(html.contains("deleted from the source site"));
        assert!(!html.contains("try again later"));
    }

    #[test]
    fn test_placeholder_includes_retry_line_and_detail_for_hard_rules() {
        let maintenance = classify(&error(
            Some(500),
            Some("text/html"),
            Some("maintenance"),
        ))
        .unwrap();
        let html = render_placeholder(Some(maintenance), "Earth", "Earth");
        assert!(html.contains("try again later"));
        assert!(html.contains("class=\"detail\""));
    }

    #[test]
    fn test_placeholder_without_rule_uses_generic_text() {
        let html = render_placeholder(None, "Earth", "Earth");
        assert!(html.contains("could not be fetched"));
        assert!(html.contains("try again later"));
    }
}
