use std::collections::HashSet;
use std::rc::Rc;

use tracing::info;

use crate::error::ScoutError;
use crate::store::LocalStore;

/// Global set of job ids already extracted, shared by every candidate.
///
/// Loaded fully from the local store at startup; `add` writes the id
/// durably before it joins the in-memory set.
pub struct DedupStore {
    seen: HashSet<String>,
    store: Rc<LocalStore>,
}

impl DedupStore {
    pub fn load(store: Rc<LocalStore>) -> Result<Self, ScoutError> {
        let seen = store.load_seen_ids()?;
        info!(known = seen.len(), "seen-job set loaded");
        Ok(Self { seen, store })
    }

    pub fn has(&self, job_id: &str) -> bool {
        self.seen.contains(job_id)
    }

    /// Record `job_id` as seen. Returns `true` if it was not known before.
    pub fn add(&mut self, job_id: &str) -> Result<bool, ScoutError> {
        if self.seen.contains(job_id) {
            return Ok(false);
        }
        self.store.insert_seen(job_id)?;
        self.seen.insert(job_id.to_string());
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn add_is_idempotent() {
        let store = Rc::new(LocalStore::in_memory().unwrap());
        let mut dedup = DedupStore::load(store).unwrap();
        assert!(dedup.is_empty());
        assert!(dedup.add("100").unwrap());
        assert!(!dedup.add("100").unwrap());
        assert!(dedup.has("100"));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn reload_sees_previous_run() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("jobs.db");
        {
            let store = Rc::new(LocalStore::open(&path).unwrap());
            let mut dedup = DedupStore::load(store).unwrap();
            dedup.add("abc").unwrap();
        }
        let store = Rc::new(LocalStore::open(&path).unwrap());
        let dedup = DedupStore::load(store).unwrap();
        assert!(dedup.has("abc"));
        assert!(!dedup.has("xyz"));
    }
}
