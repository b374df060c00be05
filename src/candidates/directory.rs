//! Client for the remote candidate directory.
//!
//! The directory is best-effort: every failure (missing token, transport,
//! non-2xx status, unexpected body) degrades to an empty list with a
//! warning. Field names vary between deployments and are resolved through
//! an alias table.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{CandidateRecord, clean_list, split_list};
use crate::error::ScoutError;

/// Paths probed in order below the directory base URL.
pub const DEFAULT_ENDPOINTS: &[&str] = &[
    "api/candidates",
    "api/candidate-management",
    "api/v1/candidates",
    "api/marketing/candidates",
    "api/job-automation/candidates",
    "candidates",
];

const ID_KEYS: &[&str] = &["candidate_id", "id"];
const USERNAME_KEYS: &[&str] = &["linkedin_username", "email"];
const PASSWORD_KEYS: &[&str] = &["linkedin_password", "password"];
const LOCATION_KEYS: &[&str] = &["locations", "zipcodes", "zip_code"];
const KEYWORD_KEYS: &[&str] = &["keywords", "skills"];
const ENABLED_KEYS: &[&str] = &["enabled", "run_extract_linkedin_jobs"];

pub struct DirectoryClient {
    client: Client,
    base_url: String,
    api_token: Option<String>,
    secret_key: Option<String>,
    endpoints: Vec<String>,
}

impl DirectoryClient {
    pub fn new(
        base_url: impl Into<String>,
        api_token: Option<String>,
        secret_key: Option<String>,
    ) -> Result<Self, ScoutError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(10))
            .build()?;
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self {
            client,
            base_url,
            api_token: api_token.filter(|t| !t.is_empty()),
            secret_key: secret_key.filter(|k| !k.is_empty()),
            endpoints: DEFAULT_ENDPOINTS.iter().map(|e| e.to_string()).collect(),
        })
    }

    #[cfg(test)]
    pub fn with_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Fetch candidate records. Never fails; problems are logged and yield
    /// an empty list.
    pub async fn fetch(&self) -> Vec<CandidateRecord> {
        let Some(token) = self.api_token.as_deref() else {
            info!("API_TOKEN not set, candidate directory skipped");
            return Vec::new();
        };

        for endpoint in &self.endpoints {
            let url = format!("{}{}", self.base_url, endpoint.trim_start_matches('/'));
            debug!(url = %url, "querying candidate directory");

            let mut request = self.client.get(&url).bearer_auth(token);
            if let Some(secret) = self.secret_key.as_deref() {
                request = request
                    .header("X-Secret-Key", secret)
                    .header("X-API-Key", secret);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    debug!(url = %url, error = %e, "candidate directory unreachable");
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                return match response.json::<Value>().await {
                    Ok(body) => {
                        let records = parse_directory(&body);
                        info!(
                            endpoint = %endpoint,
                            candidates = records.len(),
                            "fetched candidate directory"
                        );
                        records
                    }
                    Err(e) => {
                        warn!(
                            endpoint = %endpoint,
                            error = %e,
                            "candidate directory body unreadable"
                        );
                        Vec::new()
                    }
                };
            }
            if status.as_u16() == 401 || status.as_u16() == 403 {
                warn!(
                    endpoint = %endpoint,
                    status = status.as_u16(),
                    "candidate directory rejected credentials"
                );
            } else {
                debug!(
                    endpoint = %endpoint,
                    status = status.as_u16(),
                    "candidate directory endpoint unavailable"
                );
            }
        }

        warn!("no candidate directory endpoint answered, continuing with the candidate file only");
        Vec::new()
    }
}

/// Records from a directory body: a bare list or an envelope with `data`
/// or `candidates`.
pub fn parse_directory(body: &Value) -> Vec<CandidateRecord> {
    let items: &[Value] = match body {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("data").or_else(|| map.get("candidates")) {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };
    items.iter().filter_map(parse_record).collect()
}

fn first<'a>(item: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| item.get(*k))
        .find(|v| !v.is_null() && !is_empty_value(v))
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => clean_list(items.iter().filter_map(scalar_string)),
        other => scalar_string(other)
            .map(|s| split_list(&s))
            .unwrap_or_default(),
    }
}

fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn parse_record(item: &Value) -> Option<CandidateRecord> {
    let Some(candidate_id) = first(item, ID_KEYS).and_then(scalar_string) else {
        debug!("directory entry without id ignored");
        return None;
    };
    Some(CandidateRecord {
        candidate_id,
        username: first(item, USERNAME_KEYS).and_then(scalar_string),
        password: first(item, PASSWORD_KEYS).and_then(scalar_string),
        keywords: first(item, KEYWORD_KEYS).map(string_list).unwrap_or_default(),
        locations: first(item, LOCATION_KEYS).map(string_list).unwrap_or_default(),
        enabled: first(item, ENABLED_KEYS).and_then(flag),
        max_radius: None,
        max_extractions_per_run: None,
        distance_ladder: None,
    })
}
