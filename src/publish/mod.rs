//! Fan-out of newly extracted postings to every sink.
//!
//! Sinks are written in order local store → CSV export → remote API and
//! fail independently. Only the local store decides whether the posting
//! counts as published.

pub mod api;
pub mod export;

use std::rc::Rc;

use tracing::{info, warn};

use crate::model::JobPosting;
use crate::store::LocalStore;

pub use api::{PositionsApi, SubmitStatus};
pub use export::CsvExport;

/// What happened at a single sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOutcome {
    Written,
    /// The sink is not configured for this run.
    Disabled,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    pub local: SinkOutcome,
    pub export: SinkOutcome,
    pub remote: SinkOutcome,
}

impl PublishResult {
    /// The posting reached durable local storage and may be marked seen.
    pub fn is_durable(&self) -> bool {
        self.local == SinkOutcome::Written
    }
}

pub struct MultiSinkPublisher {
    store: Rc<LocalStore>,
    export: Option<CsvExport>,
    remote: Option<PositionsApi>,
}

impl MultiSinkPublisher {
    pub fn new(store: Rc<LocalStore>, remote: Option<PositionsApi>) -> Self {
        Self {
            store,
            export: None,
            remote,
        }
    }

    /// Point the flat-file sink at the current candidate's export file.
    pub fn set_export(&mut self, export: Option<CsvExport>) {
        self.export = export;
    }

    pub async fn publish(&self, posting: &JobPosting) -> PublishResult {
        let local = match self.store.upsert_posting(posting) {
            Ok(()) => SinkOutcome::Written,
            Err(e) => {
                warn!(
                    job_id = %posting.job_id,
                    stage = "publish_local",
                    error = %e,
                    "local store write failed"
                );
                SinkOutcome::Failed(e.to_string())
            }
        };

        let export = match &self.export {
            None => SinkOutcome::Disabled,
            Some(export) => match export.append(posting) {
                Ok(()) => SinkOutcome::Written,
                Err(e) => {
                    warn!(
                        job_id = %posting.job_id,
                        stage = "publish_export",
                        path = %export.path().display(),
                        error = %e,
                        "export append failed"
                    );
                    SinkOutcome::Failed(e.to_string())
                }
            },
        };

        let remote = match &self.remote {
            None => SinkOutcome::Disabled,
            Some(api) => match api.submit(posting).await {
                Ok(SubmitStatus::Accepted) => SinkOutcome::Written,
                Ok(SubmitStatus::Rejected { status, body }) => {
                    warn!(
                        job_id = %posting.job_id,
                        stage = "publish_remote",
                        status,
                        body = %body,
                        "positions API rejected posting"
                    );
                    SinkOutcome::Failed(format!("status {status}"))
                }
                Err(e) => {
                    warn!(
                        job_id = %posting.job_id,
                        stage = "publish_remote",
                        error = %e,
                        "positions API unreachable"
                    );
                    SinkOutcome::Failed(e.to_string())
                }
            },
        };

        if local == SinkOutcome::Written {
            info!(
                job_id = %posting.job_id,
                title = %posting.title,
                company = %posting.company,
                location = %posting.location_text,
                postal_code = %posting.postal_code,
                "saved job"
            );
        }

        PublishResult {
            local,
            export,
            remote,
        }
    }
}
