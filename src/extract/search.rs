use reqwest::Url;

use crate::error::ScoutError;

/// Results per search page; the offset advances by this much per page.
pub const PAGE_SIZE: u32 = 25;

/// Parameters of one results page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery<'a> {
    pub keyword: &'a str,
    pub location: &'a str,
    pub radius: u32,
    pub start: u32,
}

impl SearchQuery<'_> {
    pub fn next_page(&self) -> Self {
        Self {
            start: self.start + PAGE_SIZE,
            ..self.clone()
        }
    }
}

/// Bare six-digit postal codes are not recognised on their own; qualify
/// them with the country.
pub fn format_location(location: &str) -> String {
    let location = location.trim();
    if location.len() == 6 && location.chars().all(|c| c.is_ascii_digit()) {
        format!("{location}, India")
    } else {
        location.to_string()
    }
}

/// Deterministic search URL: posted in the last 24h, sorted by date,
/// filtered to `radius` miles.
pub fn search_url(base_url: &str, query: &SearchQuery<'_>) -> Result<Url, ScoutError> {
    let endpoint = format!("{}/jobs/search/", base_url.trim_end_matches('/'));
    let location = format_location(query.location);
    let start = query.start.to_string();
    let radius = query.radius.to_string();
    Url::parse_with_params(
        &endpoint,
        [
            ("f_TPR", "r86400"),
            ("keywords", query.keyword),
            ("location", location.as_str()),
            ("start", start.as_str()),
            ("f_D", radius.as_str()),
            ("sortBy", "DD"),
            ("origin", "JOB_SEARCH_PAGE_LOCATION_AUTOCOMPLETE"),
            ("refresh", "true"),
        ],
    )
    .map_err(|e| ScoutError::Config(format!("invalid site base url {base_url}: {e}")))
}

/// Canonical view URL of a posting.
pub fn job_view_url(base_url: &str, job_id: &str) -> String {
    format!("{}/jobs/view/{job_id}", base_url.trim_end_matches('/'))
}
