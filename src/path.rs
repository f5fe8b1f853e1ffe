//! Dotted value paths into a request context.
//!
//! A path such as `hooks.user.bookId` or `hooks.items[0].id` is parsed once,
//! when the middleware is built, and walked on every request. Walking never
//! fails: a missing key, an out-of-range index or a scalar in the middle of
//! the path all yield `None`.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::ConfigError;

/// A parsed, non-empty dotted path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValuePath {
    raw: String,
    segments: Vec<String>,
}

impl ValuePath {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Splits off the root segment (`params`, `hooks`, …) from the remainder.
    pub(crate) fn split_root(&self) -> (&str, &[String]) {
        match self.segments.split_first() {
            Some((root, rest)) => (root.as_str(), rest),
            None => ("", &[][..]),
        }
    }
}

impl FromStr for ValuePath {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| ConfigError::Path { path: raw.to_owned(), reason };

        if raw.trim().is_empty() {
            return Err(invalid("path must be a non-empty string"));
        }

        // `a[0].b` is sugar for `a.0.b`. A closing `]` ends the segment, so
        // only `.`, `[` or the end of the path may follow it.
        let mut normalised = String::with_capacity(raw.len());
        let mut in_bracket = false;
        let mut just_closed = false;
        for ch in raw.chars() {
            if just_closed && !matches!(ch, '.' | '[') {
                return Err(invalid("unexpected text after `]`"));
            }
            just_closed = false;
            match ch {
                '[' if !in_bracket => {
                    in_bracket = true;
                    normalised.push('.');
                }
                ']' if in_bracket => {
                    in_bracket = false;
                    just_closed = true;
                }
                '[' | ']' => return Err(invalid("unbalanced brackets")),
                c => normalised.push(c),
            }
        }
        if in_bracket {
            return Err(invalid("unbalanced brackets"));
        }

        let segments: Vec<String> = normalised.split('.').map(str::to_owned).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("empty path segment"));
        }

        Ok(Self { raw: raw.to_owned(), segments })
    }
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Walks `segments` down from `root`.
///
/// Objects are indexed by key, arrays by a decimal index.
pub fn walk<'a>(root: &'a Value, segments: &[String]) -> Option<&'a Value> {
    segments.iter().try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
