//! The declarative candidate file (`candidates.toml`).
//!
//! ```toml
//! [settings]
//! positions = ["Software Engineer"]
//! distance_miles = 50
//!
//! [[candidates]]
//! candidate_id = "c1"
//! linkedin_username = "jane@example.com"
//! linkedin_password = "*****"
//! keywords = ["Data Engineer", "ML Engineer"]
//! locations = ["560100", "Austin, TX 78701"]
//! ```

use std::path::Path;

use serde::{Deserialize, Deserializer};
use tracing::{info, warn};

use super::{CandidateRecord, clean_list, split_list};
use crate::error::ScoutError;

/// Run-wide defaults from the `[settings]` block.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    /// Keywords for candidates that list none.
    #[serde(deserialize_with = "list_or_string")]
    pub positions: Vec<String>,
    pub distance_miles: u32,
    pub distance_ladder: bool,
    pub max_applications_per_run: u32,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            positions: vec!["Software Engineer".to_string()],
            distance_miles: 50,
            distance_ladder: false,
            max_applications_per_run: 100,
        }
    }
}

impl GlobalSettings {
    /// `positions`, or the built-in default when the file sets an empty list.
    pub fn default_keywords(&self) -> Vec<String> {
        if self.positions.is_empty() {
            Self::default().positions
        } else {
            self.positions.clone()
        }
    }
}

/// A scalar that may be written as a string or a bare number.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(i64),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Text(s) => s,
            Scalar::Number(n) => n.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrScalar {
    List(Vec<Scalar>),
    One(Scalar),
}

/// Accepts `["a", "b"]`, `"a, b"` or a bare number. Only a single string is
/// split on commas; list entries are kept whole.
fn list_or_string<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = match Option::<ListOrScalar>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(ListOrScalar::List(items)) => clean_list(items.into_iter().map(Scalar::into_string)),
        Some(ListOrScalar::One(item)) => split_list(&item.into_string()),
    };
    Ok(values)
}

fn optional_scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(Scalar::into_string))
}

/// One `[[candidates]]` entry as written.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileCandidate {
    #[serde(deserialize_with = "optional_scalar")]
    pub candidate_id: Option<String>,
    #[serde(alias = "username")]
    pub linkedin_username: Option<String>,
    #[serde(alias = "password")]
    pub linkedin_password: Option<String>,
    #[serde(deserialize_with = "list_or_string")]
    pub keywords: Vec<String>,
    #[serde(deserialize_with = "list_or_string")]
    pub locations: Vec<String>,
    /// Deprecated: use `locations`.
    #[serde(deserialize_with = "list_or_string")]
    pub zipcodes: Vec<String>,
    /// Deprecated: use `locations`.
    #[serde(deserialize_with = "optional_scalar")]
    pub zipcode: Option<String>,
    pub run_extract_linkedin_jobs: Option<bool>,
    pub max_radius: Option<u32>,
    pub max_extractions_per_run: Option<u32>,
    pub distance_ladder: Option<bool>,
}

impl FileCandidate {
    /// Locations with the deprecated fields as fallbacks.
    fn resolved_locations(&self) -> Vec<String> {
        if !self.locations.is_empty() {
            return self.locations.clone();
        }
        if !self.zipcodes.is_empty() {
            return self.zipcodes.clone();
        }
        self.zipcode
            .as_deref()
            .map(split_list)
            .unwrap_or_default()
    }
}

/// Top-level layout of the candidate file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateFile {
    #[serde(default)]
    pub settings: GlobalSettings,
    #[serde(default)]
    pub candidates: Vec<FileCandidate>,
}

impl CandidateFile {
    /// Reads and parses the file. A missing or unparseable file is fatal.
    pub fn load(path: &Path) -> Result<Self, ScoutError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ScoutError::Config(format!("cannot read candidate file {}: {e}", path.display()))
        })?;
        let file = Self::parse(&contents)?;
        info!(path = %path.display(), candidates = file.candidates.len(), "loaded candidate file");
        Ok(file)
    }

    pub fn parse(contents: &str) -> Result<Self, ScoutError> {
        Ok(toml::from_str(contents)?)
    }

    /// Entries as source records. Entries without a candidate id are dropped
    /// with a warning.
    pub fn records(&self) -> Vec<CandidateRecord> {
        self.candidates
            .iter()
            .enumerate()
            .filter_map(|(index, c)| {
                let id = c
                    .candidate_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|id| !id.is_empty());
                let Some(id) = id else {
                    warn!(index, "candidate entry without candidate_id ignored");
                    return None;
                };
                Some(CandidateRecord {
                    candidate_id: id.to_string(),
                    username: c.linkedin_username.clone(),
                    password: c.linkedin_password.clone(),
                    keywords: c.keywords.clone(),
                    locations: c.resolved_locations(),
                    enabled: c.run_extract_linkedin_jobs,
                    max_radius: c.max_radius,
                    max_extractions_per_run: c.max_extractions_per_run,
                    distance_ladder: c.distance_ladder,
                })
            })
            .collect()
    }
}
