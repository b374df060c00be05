//! Candidate profiles and the sources they are resolved from.
//!
//! Two sources feed the run: the declarative candidate file ([`file`]) and
//! the remote candidate directory ([`directory`]). Both are reduced to
//! [`CandidateRecord`]s, which [`resolver`] merges into immutable
//! [`CandidateProfile`]s.

pub mod directory;
pub mod file;
pub mod resolver;

use std::fmt;

use crate::ladder::SearchLadder;

pub use directory::DirectoryClient;
pub use file::{CandidateFile, GlobalSettings};
pub use resolver::CandidateResolver;

/// Credential values that mean "not set".
pub const PLACEHOLDERS: &[&str] = &["", "*****", "changeme"];

pub fn is_placeholder(value: &str) -> bool {
    PLACEHOLDERS.contains(&value.trim())
}

/// `Some(value)` unless the value is absent or a placeholder.
pub fn usable(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !is_placeholder(v))
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A raw candidate as a source describes it, before defaulting and merge.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CandidateRecord {
    pub candidate_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keywords: Vec<String>,
    pub locations: Vec<String>,
    pub enabled: Option<bool>,
    pub max_radius: Option<u32>,
    pub max_extractions_per_run: Option<u32>,
    pub distance_ladder: Option<bool>,
}

impl fmt::Debug for CandidateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CandidateRecord")
            .field("candidate_id", &self.candidate_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("keywords", &self.keywords)
            .field("locations", &self.locations)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// A fully resolved candidate. Built once per run, never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct CandidateProfile {
    pub candidate_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Search terms, in the order they are searched. Never empty.
    pub keywords: Vec<String>,
    /// Free-form location strings; may embed a postal code.
    pub locations: Vec<String>,
    pub run_enabled: bool,
    /// Widest search radius in miles.
    pub max_radius: u32,
    pub max_extractions_per_run: u32,
    pub distance_ladder: bool,
}

impl CandidateProfile {
    /// Login credentials, when both parts are present and not placeholders.
    pub fn credentials(&self) -> Option<Credentials> {
        let username = usable(self.username.as_deref())?;
        let password = usable(self.password.as_deref())?;
        Some(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    pub fn radii(&self) -> Vec<u32> {
        SearchLadder::for_candidate(self.max_radius, self.distance_ladder)
    }
}

impl fmt::Debug for CandidateProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CandidateProfile")
            .field("candidate_id", &self.candidate_id)
            .field("username", &self.username)
            .field("has_password", &self.password.is_some())
            .field("keywords", &self.keywords)
            .field("locations", &self.locations)
            .field("run_enabled", &self.run_enabled)
            .field("max_radius", &self.max_radius)
            .field("max_extractions_per_run", &self.max_extractions_per_run)
            .field("distance_ladder", &self.distance_ladder)
            .finish()
    }
}

/// Splits a single comma-separated string into trimmed, non-empty entries.
pub fn split_list(value: &str) -> Vec<String> {
    clean_list(value.split(','))
}

/// Trims list entries and drops empties. Entries are kept whole: a
/// location such as `"Austin, TX 78701"` stays one entry.
pub fn clean_list<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| v.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
