//! Ant-style path pattern matching.
//!
//! Supported syntax:
//! - `*` matches exactly one path segment
//! - `**` matches zero or more path segments
//! - `{name}` matches one segment and captures it under `name`
//! - `{name:regex}` does the same, but only when the whole segment matches `regex`
//! - `*` and `?` inside a literal segment glob within that segment (`*.css`, `v?`)
//!
//! Empty segments are ignored, so `/a/`, `a` and `/a` are equivalent. An empty
//! pattern has no segments and therefore only matches the root path.
//!
//! Matching fills a table indexed by (pattern segment, path segment), so the
//! cost is bounded by the product of the two lengths however many `**` the
//! pattern holds.

use std::collections::HashMap;

use regex::Regex;
use thiserror::Error;

/// Errors produced when a pattern string cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("Pattern is empty")]
    Empty,

    #[error("Unbalanced brace in segment '{0}'")]
    UnbalancedBrace(String),

    #[error("Empty variable name in segment '{0}'")]
    EmptyVariable(String),

    #[error("Variable must occupy a whole segment: '{0}'")]
    EmbeddedVariable(String),

    #[error("Invalid constraint in segment '{segment}': {reason}")]
    InvalidConstraint { segment: String, reason: String },
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Glob(String),
    Single,
    Multi,
    Variable {
        name: String,
        constraint: Option<Regex>,
    },
}

impl Segment {
    /// Whether this single-segment matcher accepts `text`. `Multi` is handled
    /// by the table walk and never reaches here.
    fn accepts(&self, text: &str) -> bool {
        match self {
            Segment::Literal(lit) => lit == text,
            Segment::Glob(glob) => glob_matches(glob.as_bytes(), text.as_bytes()),
            Segment::Single => true,
            Segment::Variable { constraint, .. } => {
                constraint.as_ref().is_none_or(|re| re.is_match(text))
            }
            Segment::Multi => false,
        }
    }
}

/// Result of matching a path against a pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub is_match: bool,
    pub variables: HashMap<String, String>,
}

impl MatchResult {
    pub fn no_match() -> Self {
        Self::default()
    }

    fn matched(variables: HashMap<String, String>) -> Self {
        Self {
            is_match: true,
            variables,
        }
    }
}

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a pattern, tolerating the empty pattern (root only).
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let segments = split_segments(pattern)
            .map(parse_segment)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    /// Strict parse used by the administration layer.
    ///
    /// Same as [`compile`](Self::compile) but also rejects blank patterns.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if pattern.trim().is_empty() {
            return Err(PatternError::Empty);
        }
        Self::compile(pattern)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, path: &str) -> MatchResult {
        let path: Vec<&str> = split_segments(path).collect();
        let table = MatchTable::build(&self.segments, &path);
        if !table.get(0, 0) {
            return MatchResult::no_match();
        }

        // Walk one accepting route through the table. `**` consumes as little
        // as possible, so later variables bind to the earliest viable segment.
        let mut variables = HashMap::new();
        let (mut i, mut j) = (0, 0);
        while i < self.segments.len() {
            match &self.segments[i] {
                Segment::Multi if table.get(i + 1, j) => i += 1,
                Segment::Multi => j += 1,
                Segment::Variable { name, .. } => {
                    variables.insert(name.clone(), path[j].to_string());
                    i += 1;
                    j += 1;
                }
                _ => {
                    i += 1;
                    j += 1;
                }
            }
        }
        MatchResult::matched(variables)
    }
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for PathPattern {}

/// `cells[i][j]`: pattern segments `i..` match path segments `j..`.
struct MatchTable {
    width: usize,
    cells: Vec<bool>,
}

impl MatchTable {
    fn build(pattern: &[Segment], path: &[&str]) -> Self {
        let width = path.len() + 1;
        let mut table = Self {
            width,
            cells: vec![false; (pattern.len() + 1) * width],
        };
        table.set(pattern.len(), path.len(), true);

        for i in (0..pattern.len()).rev() {
            for j in (0..=path.len()).rev() {
                let ok = match &pattern[i] {
                    Segment::Multi => {
                        table.get(i + 1, j) || (j < path.len() && table.get(i, j + 1))
                    }
                    segment => {
                        j < path.len() && table.get(i + 1, j + 1) && segment.accepts(path[j])
                    }
                };
                table.set(i, j, ok);
            }
        }
        table
    }

    fn get(&self, i: usize, j: usize) -> bool {
        self.cells[i * self.width + j]
    }

    fn set(&mut self, i: usize, j: usize, value: bool) {
        self.cells[i * self.width + j] = value;
    }
}

/// Match `path` against `pattern` in one step.
///
/// Pure: the same inputs always produce the same result. Fails only when the
/// pattern itself is malformed.
pub fn matches(pattern: &str, path: &str) -> Result<MatchResult, PatternError> {
    Ok(PathPattern::compile(pattern)?.matches(path))
}

fn split_segments(input: &str) -> impl Iterator<Item = &str> {
    input.split('/').filter(|s| !s.is_empty())
}

fn parse_segment(raw: &str) -> Result<Segment, PatternError> {
    match raw {
        "**" => return Ok(Segment::Multi),
        "*" => return Ok(Segment::Single),
        _ => {}
    }

    if let Some(inner) = raw.strip_prefix('{') {
        let Some(inner) = inner.strip_suffix('}') else {
            return Err(PatternError::UnbalancedBrace(raw.to_string()));
        };
        let (name, constraint) = match inner.split_once(':') {
            Some((name, regex)) => (name.trim(), Some(compile_constraint(raw, regex)?)),
            None => (inner.trim(), None),
        };
        if name.is_empty() {
            return Err(PatternError::EmptyVariable(raw.to_string()));
        }
        if name.contains(['{', '}']) {
            return Err(PatternError::UnbalancedBrace(raw.to_string()));
        }
        return Ok(Segment::Variable {
            name: name.to_string(),
            constraint,
        });
    }

    if raw.contains(['{', '}']) {
        let balanced = raw.matches('{').count() == raw.matches('}').count();
        return Err(if balanced {
            PatternError::EmbeddedVariable(raw.to_string())
        } else {
            PatternError::UnbalancedBrace(raw.to_string())
        });
    }

    if raw.contains(['*', '?']) {
        Ok(Segment::Glob(raw.to_string()))
    } else {
        Ok(Segment::Literal(raw.to_string()))
    }
}

/// Anchor a `{name:regex}` constraint so it must cover the whole segment.
fn compile_constraint(segment: &str, regex: &str) -> Result<Regex, PatternError> {
    if regex.is_empty() {
        return Err(PatternError::InvalidConstraint {
            segment: segment.to_string(),
            reason: "empty regex".to_string(),
        });
    }
    Regex::new(&format!("^(?:{regex})$")).map_err(|e| PatternError::InvalidConstraint {
        segment: segment.to_string(),
        reason: e.to_string(),
    })
}

/// Within-segment glob: `*` matches any run of characters, `?` exactly one.
fn glob_matches(glob: &[u8], text: &[u8]) -> bool {
    let (mut g, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if g < glob.len() && (glob[g] == b'?' || glob[g] == text[t]) {
            g += 1;
            t += 1;
        } else if g < glob.len() && glob[g] == b'*' {
            star = Some((g, t));
            g += 1;
        } else if let Some((sg, st)) = star {
            g = sg + 1;
            t = st + 1;
            star = Some((sg, st + 1));
        } else {
            return false;
        }
    }

    glob[g..].iter().all(|&c| c == b'*')
}
