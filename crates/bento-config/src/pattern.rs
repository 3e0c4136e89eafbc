//! Module id patterns used by dependency options and watch ignores.

use std::fmt;

use regex::Regex;

use crate::error::{ConfigError, Result};

/// An exact id, a glob, or a `/regex/` string.
#[derive(Clone)]
pub enum Pattern {
    Exact(String),
    Glob(glob::Pattern),
    Regex(Regex),
}

impl Pattern {
    pub fn parse(source: &str) -> Result<Self> {
        if let Some(body) = regex_body(source) {
            let regex = Regex::new(body).map_err(|e| ConfigError::InvalidPattern {
                pattern: source.to_string(),
                message: e.to_string(),
            })?;
            return Ok(Pattern::Regex(regex));
        }
        if crate::glob::is_dynamic_pattern(source) && !source.contains('{') {
            let glob = glob::Pattern::new(source).map_err(|e| ConfigError::InvalidPattern {
                pattern: source.to_string(),
                message: e.msg.to_string(),
            })?;
            return Ok(Pattern::Glob(glob));
        }
        Ok(Pattern::Exact(source.to_string()))
    }

    pub fn parse_all<'a>(sources: impl IntoIterator<Item = &'a String>) -> Result<Vec<Self>> {
        sources.into_iter().map(|s| Pattern::parse(s)).collect()
    }

    pub fn matches(&self, id: &str) -> bool {
        match self {
            Pattern::Exact(exact) => exact == id,
            Pattern::Glob(glob) => glob.matches(id),
            Pattern::Regex(regex) => regex.is_match(id),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Pattern::Exact(exact) => exact,
            Pattern::Glob(glob) => glob.as_str(),
            Pattern::Regex(regex) => regex.as_str(),
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Exact(exact) => write!(f, "{exact:?}"),
            Pattern::Glob(glob) => write!(f, "glob({:?})", glob.as_str()),
            Pattern::Regex(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Regex(regex) => write!(f, "/{}/", regex.as_str()),
            other => f.write_str(other.as_str()),
        }
    }
}

/// `/body/` with at least one character of body.
pub fn regex_body(source: &str) -> Option<&str> {
    if source.len() > 2 && source.starts_with('/') && source.ends_with('/') {
        Some(&source[1..source.len() - 1])
    } else {
        None
    }
}

pub fn matches_any(patterns: &[Pattern], id: &str) -> bool {
    patterns.iter().any(|pattern| pattern.matches(id))
}
