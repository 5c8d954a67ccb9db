//! Subscription patterns
//!
//! A pattern is one of:
//! - `*` - matches every event type, including the empty string
//! - `prefix*` - matches any type starting with `prefix`
//! - anything else - matches only the identical type
//!
//! There is no per-segment wildcard and no regular expression support;
//! `sensor.*` matches `sensor.temp.updated` and `sensor.` but not `sensors.temp`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Matching rule over event type keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Pattern {
    /// `*`
    Any,
    /// Trailing-`*` pattern, holding the prefix without the `*`
    Prefix(String),
    /// Exact type
    Exact(String),
}

impl Pattern {
    /// Parse a pattern string.
    pub fn parse(pattern: &str) -> Self {
        if pattern == "*" {
            return Pattern::Any;
        }
        match pattern.strip_suffix('*') {
            Some(prefix) => Pattern::Prefix(prefix.to_string()),
            None => Pattern::Exact(pattern.to_string()),
        }
    }

    /// Check whether an event type matches this pattern.
    pub fn matches(&self, event_type: &str) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Prefix(prefix) => event_type.starts_with(prefix.as_str()),
            Pattern::Exact(exact) => exact == event_type,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Any => f.write_str("*"),
            Pattern::Prefix(prefix) => write!(f, "{}*", prefix),
            Pattern::Exact(exact) => f.write_str(exact),
        }
    }
}

impl From<&str> for Pattern {
    fn from(pattern: &str) -> Self {
        Pattern::parse(pattern)
    }
}

impl From<String> for Pattern {
    fn from(pattern: String) -> Self {
        Pattern::parse(&pattern)
    }
}

impl From<Pattern> for String {
    fn from(pattern: Pattern) -> Self {
        pattern.to_string()
    }
}
