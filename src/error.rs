use thiserror::Error;

use crate::driver::DriverError;

#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("No candidates resolved. Check the candidate file.")]
    NoCandidates,

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Navigation failed after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: DriverError },

    #[error("Session lost: {0}")]
    SessionLost(String),

    #[error("Illegal session transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error("Malformed card {job_id}: {reason}")]
    MalformedCard { job_id: String, reason: String },

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ScoutError {
    /// Classifies an error for the orchestrator's recovery decision.
    ///
    /// Exhausted navigation retries and lost sessions are crash-shaped; driver
    /// errors keep the kind the adapter tagged them with; everything else is
    /// a logical failure confined to the current location.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ScoutError::Driver(e) => e.kind,
            ScoutError::RetryExhausted { .. } | ScoutError::SessionLost(_) => {
                FailureKind::CrashShaped
            }
            _ => FailureKind::Logical,
        }
    }
}

/// Classifies a failure at the point where it is raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FailureKind {
    /// A single operation failed and may succeed if repeated in place.
    Transient,
    /// The automation session or its transport is gone.
    CrashShaped,
    /// Unexpected page state, missing element or unparseable content.
    Logical,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Transient => write!(f, "Transient"),
            FailureKind::CrashShaped => write!(f, "CrashShaped"),
            FailureKind::Logical => write!(f, "Logical"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_errors_keep_their_kind() {
        let err = ScoutError::from(DriverError::crash("invalid session id"));
        assert_eq!(err.failure_kind(), FailureKind::CrashShaped);

        let err = ScoutError::from(DriverError::logical("no such element"));
        assert_eq!(err.failure_kind(), FailureKind::Logical);
    }

    #[test]
    fn exhausted_retries_are_crash_shaped() {
        let err = ScoutError::RetryExhausted {
            attempts: 3,
            last: DriverError::transient("timeout"),
        };
        assert_eq!(err.failure_kind(), FailureKind::CrashShaped);
        assert!(err.to_string().contains("after 3 attempts"));
    }

    #[test]
    fn malformed_card_is_logical() {
        let err = ScoutError::MalformedCard {
            job_id: "42".into(),
            reason: "no title line".into(),
        };
        assert_eq!(err.failure_kind(), FailureKind::Logical);
    }

    #[test]
    fn failure_kind_display() {
        assert_eq!(FailureKind::CrashShaped.to_string(), "CrashShaped");
        assert_eq!(FailureKind::Transient.to_string(), "Transient");
    }
}
