//! Topic pattern classification and matching
//!
//! Search patterns arrive in three dialects with conflicting semantics: MQTT
//! subscription wildcards (`+`/`#`, anchored per-segment), shell globs
//! (`*`/`?`, substring match), and bare keywords (case-insensitive
//! substring). `#` is legal in both the MQTT and glob dialects but means
//! different things, so the dialects are kept as separate tiers instead of
//! being collapsed into one engine; classification is first-match-wins and
//! deterministic for a given pattern string.

use crate::broker::MessageSnapshot;
use regex::Regex;
use std::collections::HashMap;

/// Which matching tier a pattern belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// Contains `+` or `#`: MQTT subscription wildcard, anchored full match
    BrokerWildcard,
    /// Contains `*` or `?`: glob, matched as a substring of the path
    Glob,
    /// Anything else: case-insensitive keyword substring
    Keyword,
}

/// Classify a pattern string. Tier 1 (broker wildcard) takes precedence over
/// tiers 2 and 3, so `+`/`#` are only treated literally when absent.
pub fn classify(pattern: &str) -> PatternKind {
    if pattern.contains('+') || pattern.contains('#') {
        PatternKind::BrokerWildcard
    } else if pattern.contains('*') || pattern.contains('?') {
        PatternKind::Glob
    } else {
        PatternKind::Keyword
    }
}

/// Does `topic` match `pattern` under the pattern's tier?
pub fn matches(topic: &str, pattern: &str) -> bool {
    match classify(pattern) {
        PatternKind::BrokerWildcard => match wildcard_regex(pattern) {
            Some(re) => re.is_match(topic),
            None => false,
        },
        PatternKind::Glob => match glob_regex(pattern) {
            Some(re) => re.is_match(topic),
            None => false,
        },
        PatternKind::Keyword => topic.to_lowercase().contains(&pattern.to_lowercase()),
    }
}

/// Filter a discovered topic map down to the entries whose paths match.
pub fn filter_topics(
    all_topics: &HashMap<String, MessageSnapshot>,
    pattern: &str,
) -> HashMap<String, MessageSnapshot> {
    all_topics
        .iter()
        .filter(|(topic, _)| matches(topic, pattern))
        .map(|(topic, snapshot)| (topic.clone(), snapshot.clone()))
        .collect()
}

/// Translate an MQTT wildcard pattern to an anchored regex: `+` matches
/// exactly one path segment, `#` matches any remaining characters, and
/// everything else is literal.
fn wildcard_regex(pattern: &str) -> Option<Regex> {
    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push('^');
    for c in pattern.chars() {
        match c {
            '+' => translated.push_str("[^/]+"),
            '#' => translated.push_str(".*"),
            other => translated.push_str(&regex::escape(&other.to_string())),
        }
    }
    translated.push('$');
    Regex::new(&translated).ok()
}

/// Translate a glob to a regex matched anywhere in the path (the glob is
/// implicitly wrapped in leading/trailing wildcards).
fn glob_regex(pattern: &str) -> Option<Regex> {
    let mut translated = String::with_capacity(pattern.len() + 4);
    for c in pattern.chars() {
        match c {
            '*' => translated.push_str(".*"),
            '?' => translated.push('.'),
            other => translated.push_str(&regex::escape(&other.to_string())),
        }
    }
    Regex::new(&translated).ok()
}
