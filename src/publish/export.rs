use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::error::ScoutError;
use crate::model::JobPosting;

const HEADER: [&str; 8] = [
    "job_id",
    "title",
    "company",
    "location",
    "postal_code",
    "url",
    "extracted_at",
    "is_easy_apply",
];

/// Flat CSV export, one row per published posting.
#[derive(Debug, Clone)]
pub struct CsvExport {
    path: PathBuf,
}

impl CsvExport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<dir>/<name>_extracted_jobs.csv`, where `name` is the local part of
    /// the username or, failing that, the candidate id.
    pub fn for_candidate(dir: &Path, candidate_id: &str, username: Option<&str>) -> Self {
        let name = username
            .and_then(|u| u.split('@').next())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(candidate_id);
        let safe: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        Self::new(dir.join(format!("{safe}_extracted_jobs.csv")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, posting: &JobPosting) -> Result<(), ScoutError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if needs_header {
            writer.write_record(HEADER)?;
        }
        let extracted_at = posting.extracted_at.format("%Y-%m-%d %H:%M:%S").to_string();
        writer.write_record([
            posting.job_id.as_str(),
            posting.title.as_str(),
            posting.company.as_str(),
            posting.location_text.as_str(),
            posting.postal_code.as_str(),
            posting.url.as_str(),
            extracted_at.as_str(),
            if posting.is_easy_apply { "true" } else { "false" },
        ])?;
        writer.flush()?;
        Ok(())
    }
}
