//! Central routing table: every view's path pattern and who may see it.
//!
//! Patterns are `/`-separated. A `:name` segment matches exactly one path segment;
//! a trailing `*` matches zero or more. Rules are matched in declaration order and
//! the first match wins, so declare specific patterns before broad ones.

use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::identity::{normalize, Role};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "roles", rename_all = "snake_case")]
pub enum Access {
    /// Never guarded (login, registration, landing page).
    Public,
    /// Any signed-in user; the allow-list is absent.
    Authenticated,
    /// Canonical role identifiers allowed to view the route. Never empty.
    Roles(Vec<String>),
}

impl Access {
    pub fn roles(roles: &[Role]) -> Self {
        Access::Roles(roles.iter().map(|r| r.as_str().to_string()).collect())
    }

    /// `None` means "any authenticated user".
    pub fn allowed_roles(&self) -> Option<&[String]> {
        match self {
            Access::Roles(r) => Some(r.as_slice()),
            Access::Public | Access::Authenticated => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `:name` matches any single segment; the name only documents the pattern.
    Param,
    Rest,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteRule {
    pub pattern: String,
    pub name: String,
    pub access: Access,
    #[serde(skip)]
    segments: Vec<Segment>,
}

impl RouteRule {
    pub fn new(pattern: &str, name: &str, access: Access) -> AppResult<Self> {
        let segments = parse_pattern(pattern)?;
        if let Access::Roles(roles) = &access {
            if roles.is_empty() {
                return Err(AppError::config("empty_allow_list", format!("route '{}' has an empty allow-list", pattern)));
            }
            if roles.iter().any(|r| normalize(Some(r)).is_empty()) {
                return Err(AppError::config("blank_role", format!("route '{}' lists a blank role", pattern)));
            }
        }
        Ok(Self { pattern: pattern.to_string(), name: name.to_string(), access, segments })
    }

    pub fn public(pattern: &str, name: &str) -> AppResult<Self> { Self::new(pattern, name, Access::Public) }

    pub fn authenticated(pattern: &str, name: &str) -> AppResult<Self> { Self::new(pattern, name, Access::Authenticated) }

    pub fn roles(pattern: &str, name: &str, roles: &[Role]) -> AppResult<Self> { Self::new(pattern, name, Access::roles(roles)) }

    pub fn is_public(&self) -> bool { matches!(self.access, Access::Public) }

    pub fn matches(&self, path: &str) -> bool {
        let parts = path_segments(path);
        let mut i = 0usize;
        for seg in &self.segments {
            match seg {
                Segment::Rest => return true,
                Segment::Literal(lit) => {
                    if parts.get(i).map(|p| p == lit) != Some(true) { return false; }
                }
                Segment::Param => {
                    if parts.get(i).is_none() { return false; }
                }
            }
            i += 1;
        }
        i == parts.len()
    }
}

fn parse_pattern(pattern: &str) -> AppResult<Vec<Segment>> {
    if !pattern.starts_with('/') {
        return Err(AppError::config("bad_pattern", format!("route pattern '{}' must start with '/'", pattern)));
    }
    let raw: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let mut out = Vec::with_capacity(raw.len());
    for (idx, s) in raw.iter().enumerate() {
        let seg = if *s == "*" {
            if idx + 1 != raw.len() {
                return Err(AppError::config("bad_pattern", format!("'*' must be the last segment in '{}'", pattern)));
            }
            Segment::Rest
        } else if let Some(name) = s.strip_prefix(':') {
            if name.is_empty() {
                return Err(AppError::config("bad_pattern", format!("unnamed parameter in '{}'", pattern)));
            }
            Segment::Param
        } else {
            Segment::Literal(s.to_ascii_lowercase())
        };
        out.push(seg);
    }
    Ok(out)
}

/// Split a requested path into lower-cased segments, dropping any query string,
/// fragment, empty segments and trailing slash. Dot segments (plain or
/// percent-encoded) are resolved, and `..` never climbs above the root.
pub fn path_segments(path: &str) -> Vec<String> {
    let path = path.split(['?', '#']).next().unwrap_or("");
    let mut out: Vec<String> = Vec::new();
    for raw in path.split('/').filter(|s| !s.is_empty()) {
        let seg = raw.to_ascii_lowercase();
        match seg.as_str() {
            "." | "%2e" => {}
            ".." | "%2e%2e" | ".%2e" | "%2e." => { out.pop(); }
            _ => out.push(seg),
        }
    }
    out
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new(rules: Vec<RouteRule>) -> AppResult<Self> {
        for (i, r) in rules.iter().enumerate() {
            if rules[..i].iter().any(|p| p.segments == r.segments) {
                return Err(AppError::config("duplicate_route", format!("route pattern '{}' declared twice", r.pattern)));
            }
        }
        Ok(Self { rules })
    }

    pub fn lookup(&self, path: &str) -> Option<&RouteRule> {
        self.rules.iter().find(|r| r.matches(path))
    }

    pub fn rules(&self) -> &[RouteRule] { &self.rules }

    pub fn len(&self) -> usize { self.rules.len() }

    pub fn is_empty(&self) -> bool { self.rules.is_empty() }
}
