use std::collections::HashSet;

use tracing::{debug, info, warn};

use super::{CandidateProfile, CandidateRecord, GlobalSettings, is_placeholder};

/// Merges the candidate file (authoritative) with the directory
/// (best-effort) into the ordered candidate list of a run.
///
/// Pure over its inputs: resolving the same records twice gives the same
/// profiles.
pub struct CandidateResolver {
    settings: GlobalSettings,
}

impl CandidateResolver {
    pub fn new(settings: GlobalSettings) -> Self {
        Self { settings }
    }

    pub fn resolve(
        &self,
        primary: &[CandidateRecord],
        dynamic: &[CandidateRecord],
    ) -> Vec<CandidateProfile> {
        let mut seen = HashSet::new();
        let mut profiles = Vec::new();

        for record in primary {
            if !seen.insert(record.candidate_id.clone()) {
                warn!(
                    candidate = %record.candidate_id,
                    "duplicate candidate id in candidate file, later entry ignored"
                );
                continue;
            }
            let merged = match find_match(record, dynamic) {
                Some(remote) => {
                    debug!(candidate = %record.candidate_id, "merging directory record");
                    fill_from(record, remote)
                }
                None => record.clone(),
            };
            profiles.push(self.profile(merged));
        }

        for record in dynamic {
            if seen.contains(&record.candidate_id) || is_matched(record, primary) {
                continue;
            }
            if record.enabled != Some(true) {
                debug!(candidate = %record.candidate_id, "directory-only candidate not enabled");
                continue;
            }
            seen.insert(record.candidate_id.clone());
            info!(candidate = %record.candidate_id, "adding directory-only candidate");
            profiles.push(self.profile(record.clone()));
        }

        profiles
    }

    fn profile(&self, record: CandidateRecord) -> CandidateProfile {
        let keywords = if record.keywords.is_empty() {
            self.settings.default_keywords()
        } else {
            record.keywords
        };
        CandidateProfile {
            candidate_id: record.candidate_id,
            username: record.username.filter(|u| !u.trim().is_empty()),
            password: record.password.filter(|p| !is_placeholder(p)),
            keywords,
            locations: record.locations,
            run_enabled: record.enabled.unwrap_or(true),
            max_radius: record.max_radius.unwrap_or(self.settings.distance_miles),
            max_extractions_per_run: record
                .max_extractions_per_run
                .unwrap_or(self.settings.max_applications_per_run),
            distance_ladder: record
                .distance_ladder
                .unwrap_or(self.settings.distance_ladder),
        }
    }
}

fn same_username(a: Option<&str>, b: Option<&str>) -> bool {
    match (a.map(str::trim), b.map(str::trim)) {
        (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

fn matches(primary: &CandidateRecord, remote: &CandidateRecord) -> bool {
    primary.candidate_id == remote.candidate_id
        || same_username(primary.username.as_deref(), remote.username.as_deref())
}

fn find_match<'a>(
    primary: &CandidateRecord,
    dynamic: &'a [CandidateRecord],
) -> Option<&'a CandidateRecord> {
    dynamic.iter().find(|remote| matches(primary, remote))
}

fn is_matched(remote: &CandidateRecord, primary: &[CandidateRecord]) -> bool {
    primary.iter().any(|p| matches(p, remote))
}

fn missing(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(is_placeholder)
}

/// Fill absent or placeholder fields of `primary` from `remote`.
fn fill_from(primary: &CandidateRecord, remote: &CandidateRecord) -> CandidateRecord {
    let mut merged = primary.clone();
    if missing(&merged.username) && !missing(&remote.username) {
        merged.username = remote.username.clone();
    }
    if missing(&merged.password) && !missing(&remote.password) {
        merged.password = remote.password.clone();
    }
    if merged.keywords.is_empty() {
        merged.keywords = remote.keywords.clone();
    }
    if merged.locations.is_empty() {
        merged.locations = remote.locations.clone();
    }
    merged
}
