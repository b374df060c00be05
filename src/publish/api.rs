use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ScoutError;
use crate::model::JobPosting;

/// Source name reported to the positions API.
const SOURCE: &str = "linkedin";

/// Body of `POST <positions_url>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionPayload {
    pub title: String,
    pub company_name: String,
    pub location: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    pub job_url: String,
    pub source: String,
    pub source_uid: String,
    pub status: String,
}

impl PositionPayload {
    pub fn from_posting(posting: &JobPosting) -> Self {
        let (city, state) = split_city_state(&posting.location_text);
        Self {
            title: posting.title.clone(),
            company_name: posting.company.clone(),
            location: posting.location_text.clone(),
            city,
            state,
            zip: posting.postal_code.clone(),
            country: infer_country(&posting.postal_code).to_string(),
            job_url: posting.url.clone(),
            source: SOURCE.to_string(),
            source_uid: posting.job_id.clone(),
            status: "open".to_string(),
        }
    }
}

/// `"City, State, ..."` into `(city, state)`; empty strings without a comma.
pub fn split_city_state(location: &str) -> (String, String) {
    if !location.contains(',') {
        return (String::new(), String::new());
    }
    let mut parts = location.split(',').map(str::trim);
    let city = parts.next().unwrap_or_default().to_string();
    let state = parts.next().unwrap_or_default().to_string();
    (city, state)
}

/// Country guessed from postal code length alone: five characters means
/// USA, anything else India.
///
/// This is a coarse approximation that ignores the location text; it is
/// kept as-is and deliberately not extended.
pub fn infer_country(postal_code: &str) -> &'static str {
    if postal_code.chars().count() == 5 {
        "USA"
    } else {
        "India"
    }
}

/// Outcome of a remote submission that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitStatus {
    Accepted,
    Rejected { status: u16, body: String },
}

/// Client for the remote positions API.
pub struct PositionsApi {
    client: Client,
    url: String,
}

impl PositionsApi {
    pub fn new(url: impl Into<String>) -> Result<Self, ScoutError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(10))
            .build()?;
        let mut url = url.into();
        if !url.ends_with('/') {
            url.push('/');
        }
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST the posting. 200/201 is `Accepted`; any other status is
    /// `Rejected`; transport failures are errors.
    pub async fn submit(&self, posting: &JobPosting) -> Result<SubmitStatus, ScoutError> {
        let payload = PositionPayload::from_posting(posting);
        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status().as_u16();
        if status == 200 || status == 201 {
            return Ok(SubmitStatus::Accepted);
        }
        let body = response.text().await.unwrap_or_default();
        Ok(SubmitStatus::Rejected { status, body })
    }
}
