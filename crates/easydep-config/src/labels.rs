//! Release-body label markup and matching against the agent's own
//! configured labels.
//!
//! A release's body is matched against the agent's configured
//! [`Regex`], and the first capture group is parsed as a small
//! TOML-family table: `labels = { server = "live1;;live2", "region?" = "us" }`.
//! A trailing `?` on a key marks it optional: absence of that key in
//! the agent's own label set does not block the deploy.

use std::collections::HashMap;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

use crate::token_list::parse_value_set;

#[derive(Debug, Deserialize, Default)]
struct BodyMarkup {
    #[serde(default)]
    labels: HashMap<String, String>,
}

/// The outcome of matching a release's declared labels against the
/// agent's own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelDecision {
    Accept,
    Reject { reason: String },
}

/// Extracts the markup section from `body` using `pattern`'s first
/// capture group. Returns `None` (meaning "accept, no labels
/// declared") when the body is blank or the pattern does not match.
pub fn extract_markup<'a>(body: Option<&'a str>, pattern: &Regex) -> Option<&'a str> {
    let body = body?;
    if body.trim().is_empty() {
        return None;
    }
    pattern.captures(body)?.get(1).map(|m| m.as_str())
}

/// Parses the extracted markup into a map of label key to its allowed
/// value set. Keys retain their trailing `?` so callers can detect
/// optionality; use [`strip_optional_marker`] to get the bare key.
pub fn parse_release_labels(markup: &str) -> Result<HashMap<String, Vec<String>>> {
    if markup.trim().is_empty() {
        return Ok(HashMap::new());
    }
    let parsed: BodyMarkup = toml::from_str(markup).context("failed to parse label markup")?;
    Ok(parsed
        .labels
        .into_iter()
        .map(|(k, v)| (k, parse_value_set(&v)))
        .collect())
}

pub fn strip_optional_marker(key: &str) -> (&str, bool) {
    match key.strip_suffix('?') {
        Some(stripped) => (stripped, true),
        None => (key, false),
    }
}

/// Implements testable property 6: cancel iff some release-declared
/// label is required-but-absent locally, or present locally with no
/// overlapping value.
pub fn evaluate(
    local_labels: &HashMap<String, Vec<String>>,
    release_labels: &HashMap<String, Vec<String>>,
) -> LabelDecision {
    for (raw_key, allowed_values) in release_labels {
        if allowed_values.is_empty() {
            continue;
        }
        let (key, optional) = strip_optional_marker(raw_key);

        match local_labels.get(key) {
            None => {
                if !optional {
                    return LabelDecision::Reject {
                        reason: format!("required label '{key}' is not configured locally"),
                    };
                }
            }
            Some(local_values) => {
                let overlaps = local_values.iter().any(|v| allowed_values.contains(v));
                if !overlaps {
                    return LabelDecision::Reject {
                        reason: format!(
                            "label '{key}' value(s) {local_values:?} do not match release's allowed {allowed_values:?}"
                        ),
                    };
                }
            }
        }
    }
    LabelDecision::Accept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern() -> Regex {
        Regex::new("(?s)(.*)").unwrap()
    }

    #[test]
    fn no_body_accepts() {
        assert_eq!(extract_markup(None, &pattern()), None);
        assert_eq!(extract_markup(Some(""), &pattern()), None);
    }

    #[test]
    fn parses_labels_table() {
        let markup = r#"labels = { server = "live1;;live2", "region?" = "us" }"#;
        let labels = parse_release_labels(markup).unwrap();
        assert_eq!(labels.get("server").unwrap(), &vec!["live1".to_string(), "live2".to_string()]);
        assert_eq!(labels.get("region?").unwrap(), &vec!["us".to_string()]);
    }

    #[test]
    fn empty_markup_has_no_labels() {
        assert!(parse_release_labels("").unwrap().is_empty());
    }

    #[test]
    fn accepts_when_no_release_labels_declared() {
        let local = HashMap::new();
        let release = HashMap::new();
        assert_eq!(evaluate(&local, &release), LabelDecision::Accept);
    }

    #[test]
    fn rejects_required_label_missing_locally() {
        let local = HashMap::new();
        let mut release = HashMap::new();
        release.insert("server".to_string(), vec!["live1".to_string()]);
        assert!(matches!(evaluate(&local, &release), LabelDecision::Reject { .. }));
    }

    #[test]
    fn accepts_optional_label_missing_locally() {
        let local = HashMap::new();
        let mut release = HashMap::new();
        release.insert("region?".to_string(), vec!["us".to_string()]);
        assert_eq!(evaluate(&local, &release), LabelDecision::Accept);
    }

    #[test]
    fn rejects_on_value_mismatch() {
        let mut local = HashMap::new();
        local.insert("server".to_string(), vec!["live1".to_string()]);
        let mut release = HashMap::new();
        release.insert("server".to_string(), vec!["live2".to_string(), "live3".to_string()]);
        assert!(matches!(evaluate(&local, &release), LabelDecision::Reject { .. }));
    }

    #[test]
    fn accepts_on_value_overlap() {
        let mut local = HashMap::new();
        local.insert("server".to_string(), vec!["live1".to_string()]);
        let mut release = HashMap::new();
        release.insert("server".to_string(), vec!["live1".to_string(), "live2".to_string()]);
        assert_eq!(evaluate(&local, &release), LabelDecision::Accept);
    }
}
