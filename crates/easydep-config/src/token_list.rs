//! The `key:value;;key:value` token-list grammar shared by
//! `EASYDEP_DEPLOY_LABELS` and `EASYDEP_DEPLOY_ADDITIONAL_SYMLINKS`.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

const RECORD_SEPARATOR: &str = ";;";

/// `^([A-Za-z0-9_./\- ]+):(.+)$`, per the documented token-list grammar.
fn record_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([A-Za-z0-9_./\- ]+):(.+)$").unwrap())
}

/// Parses `input` into an ordered list of `(key, value)` pairs.
///
/// Records not matching `^([A-Za-z0-9_./\- ]+):(.+)$` are dropped with a
/// warning logged to stderr (config loading happens before the
/// `tracing` subscriber is wired up, so this can't go through a real
/// logger yet). Blank records are ignored silently. A key repeated
/// across records is a warning too; the first-seen value for that key
/// wins and later occurrences are dropped.
pub fn parse(input: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut seen_keys = HashSet::new();
    for record in input.split(RECORD_SEPARATOR) {
        let record = record.trim();
        if record.is_empty() {
            continue;
        }
        match record_pattern().captures(record) {
            Some(captures) => {
                let key = captures[1].trim().to_string();
                let value = captures[2].trim().to_string();
                if value.is_empty() {
                    eprintln!("[warn] dropping token-list record with an empty value: '{record}'");
                    continue;
                }
                if !seen_keys.insert(key.clone()) {
                    eprintln!(
                        "[warn] duplicate token-list key '{key}', keeping the first-seen value"
                    );
                    continue;
                }
                pairs.push((key, value));
            }
            None => {
                eprintln!("[warn] dropping malformed token-list record: '{record}'");
            }
        }
    }
    pairs
}

/// Parses `input` the same way as [`parse`] (first-seen-wins on
/// duplicate keys) and wraps each value in a single-element list, so
/// callers that match against a release's multi-valued label sets
/// (see [`crate::labels::evaluate`]) can treat local and release labels
/// uniformly.
pub fn parse_value_lists(input: &str) -> HashMap<String, Vec<String>> {
    parse(input).into_iter().map(|(k, v)| (k, vec![v])).collect()
}

/// Parses a single value's own `;;`-delimited set, used for the
/// release-body `labels = { key = "v1;;v2" }` markup where one key can
/// list several acceptable values.
pub fn parse_value_set(value: &str) -> Vec<String> {
    value
        .split(RECORD_SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
