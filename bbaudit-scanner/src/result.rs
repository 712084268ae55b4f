use crate::error::{AuditError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::str::FromStr;

/// Default shape of an academic term code, e.g. `1157`.
pub const DEFAULT_TERM_PATTERN: &str = r"^1[0-9]{2}[1478]$";

/// Institution-specific numeric identifier for an academic term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TermCode(u32);

impl TermCode {
    pub fn new(code: u32) -> Self {
        Self(code)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Parses `input` and checks it against `pattern`, which callers anchor at both ends.
    pub fn parse_with(input: &str, pattern: &Regex) -> Result<Self> {
        let trimmed = input.trim();
        if !pattern.is_match(trimmed) {
            return Err(AuditError::InvalidTerm(trimmed.to_string()));
        }
        trimmed
            .parse::<u32>()
            .map(Self)
            .map_err(|_| AuditError::InvalidTerm(trimmed.to_string()))
    }
}

impl FromStr for TermCode {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self> {
        let pattern = Regex::new(DEFAULT_TERM_PATTERN)?;
        Self::parse_with(s, &pattern)
    }
}

impl fmt::Display for TermCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkAttribute {
    Href,
    Src,
}

impl LinkAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkAttribute::Href => "href",
            LinkAttribute::Src => "src",
        }
    }
}

/// A URL pulled out of a content item's markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateLink {
    pub url: String,
    pub attribute: LinkAttribute,
    pub origin_course_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub url: String,
    pub is_hardlink: bool,
}

/// Why a course ended up in the flagged set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "url", rename_all = "snake_case")]
pub enum Evidence {
    Hardlink(String),
    DeployedHtmlFile,
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evidence::Hardlink(url) => write!(f, "{}", url),
            Evidence::DeployedHtmlFile => write!(f, "HTML FILE"),
        }
    }
}

/// Deduplicated course identifiers, always iterated in lexicographic order.
///
/// When the same course is inserted twice the smaller evidence wins, which keeps
/// `merge` commutative and idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlaggedCourseSet {
    courses: BTreeMap<String, Evidence>,
}

impl FlaggedCourseSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the course was not flagged before.
    pub fn insert(&mut self, course_id: impl Into<String>, evidence: Evidence) -> bool {
        match self.courses.entry(course_id.into()) {
            Entry::Vacant(slot) => {
                slot.insert(evidence);
                true
            }
            Entry::Occupied(mut slot) => {
                if evidence < *slot.get() {
                    slot.insert(evidence);
                }
                false
            }
        }
    }

    pub fn contains(&self, course_id: &str) -> bool {
        self.courses.contains_key(course_id)
    }

    pub fn evidence(&self, course_id: &str) -> Option<&Evidence> {
        self.courses.get(course_id)
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    pub fn merge(&mut self, other: FlaggedCourseSet) {
        for (course_id, evidence) in other.courses {
            self.insert(course_id, evidence);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Evidence)> {
        self.courses.iter().map(|(id, ev)| (id.as_str(), ev))
    }

    pub fn course_ids(&self) -> impl Iterator<Item = &str> {
        self.courses.keys().map(String::as_str)
    }
}

impl FromIterator<(String, Evidence)> for FlaggedCourseSet {
    fn from_iter<I: IntoIterator<Item = (String, Evidence)>>(iter: I) -> Self {
        let mut set = FlaggedCourseSet::new();
        for (course_id, evidence) in iter {
            set.insert(course_id, evidence);
        }
        set
    }
}
