use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One job listing discovered on the site. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    pub job_id: String,
    pub title: String,
    pub company: String,
    pub location_text: String,
    pub postal_code: String,
    pub url: String,
    pub is_easy_apply: bool,
    pub extracted_at: DateTime<Utc>,
    /// The candidate run that discovered the posting.
    pub candidate_id: String,
}

/// Lifecycle of a queued location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
    Skipped,
}

/// A working-queue entry: one location to search for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationTask {
    pub candidate_id: String,
    pub location: String,
    pub status: TaskStatus,
    /// Session restarts spent on this task so far.
    pub restarts: u32,
}

impl LocationTask {
    pub fn new(candidate_id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            candidate_id: candidate_id.into(),
            location: location.into().trim().to_string(),
            status: TaskStatus::Pending,
            restarts: 0,
        }
    }
}

/// Finds a 5- or 6-digit postal code token in free text.
pub fn find_postal_code(text: &str) -> Option<&str> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .find(|token| {
            (token.len() == 5 || token.len() == 6) && token.chars().all(|c| c.is_ascii_digit())
        })
}

/// Postal code for a posting: from the card's location text, else from the
/// search term, else the search term itself.
pub fn resolve_postal_code(location_text: &str, search_location: &str) -> String {
    find_postal_code(location_text)
        .or_else(|| find_postal_code(search_location))
        .unwrap_or(search_location)
        .to_string()
}
