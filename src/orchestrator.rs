use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tokio::time::sleep;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::candidates::CandidateProfile;
use crate::dedup::DedupStore;
use crate::driver::{DirectInteraction, DriverLauncher, Interaction};
use crate::error::{FailureKind, ScoutError};
use crate::extract::{ExtractionEngine, SearchRequest};
use crate::model::{LocationTask, TaskStatus};
use crate::publish::{CsvExport, MultiSinkPublisher};
use crate::session::{LoginFlow, SessionHandle, SessionSupervisor};
use crate::ui::RunProgress;

/// How a candidate's run ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum CandidateOutcome {
    #[default]
    Completed,
    /// The per-run extraction quota was spent; remaining locations dropped.
    QuotaReached,
    Disabled,
    NoLocations,
}

impl fmt::Display for CandidateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateOutcome::Completed => write!(f, "completed"),
            CandidateOutcome::QuotaReached => write!(f, "quota reached"),
            CandidateOutcome::Disabled => write!(f, "disabled"),
            CandidateOutcome::NoLocations => write!(f, "no locations"),
        }
    }
}

/// Per-candidate counters of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub candidate_id: String,
    pub outcome: CandidateOutcome,
    pub locations_done: u32,
    pub locations_skipped: u32,
    pub session_restarts: u32,
    pub published: u32,
}

impl RunSummary {
    pub fn new(candidate_id: impl Into<String>) -> Self {
        Self {
            candidate_id: candidate_id.into(),
            ..Default::default()
        }
    }
}

/// Recovery bounds and pacing of the candidate loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    /// Crash restarts spent on one location before it is skipped.
    pub max_session_restarts: u32,
    pub restart_pause_ms: u64,
    pub location_pause_ms: u64,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_session_restarts: 3,
            restart_pause_ms: 5000,
            location_pause_ms: 5000,
        }
    }
}

impl RunLimits {
    /// Pause before restart number `restart` (1-based).
    /// delay = restart_pause_ms * 2^(restart - 1)
    pub fn restart_delay(&self, restart: u32) -> Duration {
        let factor = 2u64.saturating_pow(restart.saturating_sub(1));
        Duration::from_millis(self.restart_pause_ms.saturating_mul(factor))
    }
}

/// Walks candidates → locations → radii, owning the session lifecycle.
pub struct Orchestrator<A, L, I: Interaction = DirectInteraction> {
    supervisor: SessionSupervisor<A, L>,
    engine: ExtractionEngine<I>,
    limits: RunLimits,
    show_progress: bool,
}

impl<A, L, I> Orchestrator<A, L, I>
where
    A: DriverLauncher,
    L: LoginFlow,
    I: Interaction,
{
    pub fn new(
        supervisor: SessionSupervisor<A, L>,
        engine: ExtractionEngine<I>,
        limits: RunLimits,
    ) -> Self {
        Self {
            supervisor,
            engine,
            limits,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Run every candidate in order. `only` restricts the run to one
    /// candidate id. Each candidate's postings go to its own CSV inside
    /// `export_dir`.
    pub async fn run_all(
        &self,
        candidates: &[CandidateProfile],
        dedup: &mut DedupStore,
        publisher: &mut MultiSinkPublisher,
        export_dir: Option<&Path>,
        only: Option<&str>,
    ) -> Vec<RunSummary> {
        let mut summaries = Vec::new();
        for candidate in candidates {
            if only.is_some_and(|id| id != candidate.candidate_id) {
                continue;
            }
            publisher.set_export(export_dir.map(|dir| {
                let username = candidate.username.as_deref();
                CsvExport::for_candidate(dir, &candidate.candidate_id, username)
            }));

            let progress = if self.show_progress {
                RunProgress::start(&candidate.candidate_id)
            } else {
                RunProgress::hidden()
            };
            let span = info_span!("candidate", candidate = %candidate.candidate_id);
            let summary = self
                .run_candidate(candidate, dedup, publisher, &progress)
                .instrument(span)
                .await;
            progress.complete(&summary);
            summaries.push(summary);
        }
        summaries
    }

    pub async fn run_candidate(
        &self,
        candidate: &CandidateProfile,
        dedup: &mut DedupStore,
        publisher: &MultiSinkPublisher,
        progress: &RunProgress,
    ) -> RunSummary {
        let mut summary = RunSummary::new(candidate.candidate_id.as_str());
        if !candidate.run_enabled {
            info!(candidate = %candidate.candidate_id, "extraction disabled, skipping candidate");
            summary.outcome = CandidateOutcome::Disabled;
            return summary;
        }

        let mut queue: VecDeque<LocationTask> = candidate
            .locations
            .iter()
            .map(|l| LocationTask::new(candidate.candidate_id.as_str(), l.as_str()))
            .filter(|t| !t.location.is_empty())
            .collect();
        if queue.is_empty() {
            warn!(
                candidate = %candidate.candidate_id,
                "no locations configured, skipping candidate"
            );
            summary.outcome = CandidateOutcome::NoLocations;
            return summary;
        }

        let radii = candidate.radii();
        let quota = candidate.max_extractions_per_run;
        info!(
            candidate = %candidate.candidate_id,
            locations = queue.len(),
            radii = ?radii,
            quota,
            keywords = candidate.keywords.len(),
            "starting candidate"
        );

        let mut session: Option<SessionHandle<A::Driver>> = None;
        while let Some(task) = queue.front_mut() {
            if summary.published >= quota {
                info!(
                    candidate = %candidate.candidate_id,
                    published = summary.published,
                    dropped = queue.len(),
                    "extraction quota reached, candidate finished"
                );
                queue.clear();
                break;
            }
            task.status = TaskStatus::InProgress;
            let location = task.location.clone();
            let result = self
                .process_location(
                    &mut session,
                    candidate,
                    &location,
                    &radii,
                    dedup,
                    publisher,
                    progress,
                    &mut summary,
                )
                .await;

            match result {
                Ok(()) => {
                    task.status = TaskStatus::Done;
                    queue.pop_front();
                    summary.locations_done += 1;
                    if summary.published < quota && !queue.is_empty() {
                        sleep(Duration::from_millis(self.limits.location_pause_ms)).await;
                    }
                }
                Err(e) if e.failure_kind() == FailureKind::Logical => {
                    warn!(
                        candidate = %candidate.candidate_id,
                        location = %location,
                        stage = "location",
                        error = %e,
                        "logical failure, skipping location"
                    );
                    task.status = TaskStatus::Skipped;
                    queue.pop_front();
                    summary.locations_skipped += 1;
                    progress.skipped(&location, &e.to_string());
                    self.discard(&mut session).await;
                }
                Err(e) => {
                    error!(
                        candidate = %candidate.candidate_id,
                        location = %location,
                        stage = "location",
                        kind = %e.failure_kind(),
                        error = %e,
                        "session lost, restarting"
                    );
                    self.discard(&mut session).await;
                    task.restarts += 1;
                    summary.session_restarts += 1;
                    let restarts = task.restarts;
                    if restarts > self.limits.max_session_restarts {
                        warn!(
                            candidate = %candidate.candidate_id,
                            location = %location,
                            restarts,
                            "location keeps crashing the session, skipping it"
                        );
                        task.status = TaskStatus::Skipped;
                        queue.pop_front();
                        summary.locations_skipped += 1;
                        progress.skipped(&location, "too many session restarts");
                    } else if summary.published < quota {
                        let max = self.limits.max_session_restarts;
                        progress.restart(restarts, max, &e.to_string());
                        sleep(self.limits.restart_delay(restarts)).await;
                    }
                }
            }
        }

        if let Some(mut handle) = session.take() {
            self.supervisor.teardown(&mut handle).await;
        }
        if summary.published >= quota {
            summary.outcome = CandidateOutcome::QuotaReached;
        }
        info!(
            candidate = %candidate.candidate_id,
            published = summary.published,
            done = summary.locations_done,
            skipped = summary.locations_skipped,
            restarts = summary.session_restarts,
            "candidate finished"
        );
        summary
    }

    /// Every ladder radius for one location. The engine bumps
    /// `summary.published` per posting, so a failure mid-location still
    /// counts what it published.
    #[allow(clippy::too_many_arguments)]
    async fn process_location(
        &self,
        session: &mut Option<SessionHandle<A::Driver>>,
        candidate: &CandidateProfile,
        location: &str,
        radii: &[u32],
        dedup: &mut DedupStore,
        publisher: &MultiSinkPublisher,
        progress: &RunProgress,
        summary: &mut RunSummary,
    ) -> Result<(), ScoutError> {
        let handle = self
            .supervisor
            .ensure_session(session.take(), candidate)
            .await?;
        let handle = session.insert(handle);
        if !self.supervisor.is_alive(handle).await {
            return Err(ScoutError::SessionLost(format!(
                "session {} failed its liveness probe",
                handle.id
            )));
        }
        let driver = handle.driver()?;

        let mut location_total = 0;
        for &radius in radii {
            let remaining = candidate
                .max_extractions_per_run
                .saturating_sub(summary.published);
            if remaining == 0 {
                break;
            }
            progress.searching(&candidate.candidate_id, location, radius);
            info!(
                candidate = %candidate.candidate_id,
                location,
                radius,
                stage = "search",
                "searching radius"
            );

            let request = SearchRequest {
                candidate_id: &candidate.candidate_id,
                keywords: &candidate.keywords,
                location,
                radius,
                quota: remaining,
            };
            let report = self
                .engine
                .run(driver, &request, &mut summary.published, dedup, publisher)
                .await?;
            location_total += report.published;
            for search in &report.searches {
                debug!(
                    keyword = %search.keyword,
                    state = %search.state,
                    stop = ?search.stop,
                    pages = search.pages,
                    published = search.published,
                    "keyword search finished"
                );
            }
            if report.found_nothing() {
                info!(
                    candidate = %candidate.candidate_id,
                    location,
                    radius,
                    "no results at this radius"
                );
            }
        }

        info!(
            candidate = %candidate.candidate_id,
            location,
            published = location_total,
            "location finished"
        );
        Ok(())
    }

    /// Tear down a session that failed mid-location.
    async fn discard(&self, session: &mut Option<SessionHandle<A::Driver>>) {
        if let Some(mut handle) = session.take() {
            handle.mark_degraded();
            self.supervisor.teardown(&mut handle).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::LocatorTable;
    use crate::extract::ExtractionSettings;
    use crate::retry::{RetryExecutor, RetryPolicy};
    use crate::session::{FeedLogin, LoginPacing};
    use crate::store::LocalStore;
    use crate::testing::{FakeCard, FakeDriver, FakeLauncher, FakeLog};
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    const BASE: &str = "https://www.linkedin.com";

    type TestOrchestrator = Orchestrator<FakeLauncher, FeedLogin>;

    fn orchestrator(
        drivers: Vec<FakeDriver>,
        log: &Rc<RefCell<FakeLog>>,
        dir: &TempDir,
        max_session_restarts: u32,
    ) -> TestOrchestrator {
        let supervisor = SessionSupervisor::new(
            FakeLauncher::new(Rc::clone(log), drivers),
            FeedLogin::new(BASE, LocatorTable::default(), LoginPacing::immediate()),
            dir.path().join("profiles"),
        );
        let engine = ExtractionEngine::new(
            BASE,
            LocatorTable::default(),
            ExtractionSettings {
                settle_ms: 0,
                scroll_pause_ms: 0,
                page_load_ms: 0,
                ..ExtractionSettings::default()
            },
            RetryExecutor::new(RetryPolicy {
                max_attempts: 3,
                delay_ms: 0,
            }),
        );
        Orchestrator::new(
            supervisor,
            engine,
            RunLimits {
                max_session_restarts,
                restart_pause_ms: 0,
                location_pause_ms: 0,
            },
        )
    }

    fn candidate(locations: &[&str], max_radius: u32, quota: u32) -> CandidateProfile {
        CandidateProfile {
            candidate_id: "c1".into(),
            username: Some("jane@example.com".into()),
            password: None,
            keywords: vec!["Data Engineer".into()],
            locations: locations.iter().map(|l| l.to_string()).collect(),
            run_enabled: true,
            max_radius,
            max_extractions_per_run: quota,
            distance_ladder: true,
        }
    }

    struct Sinks {
        store: Rc<LocalStore>,
        dedup: DedupStore,
        publisher: MultiSinkPublisher,
    }

    fn sinks() -> Sinks {
        let store = Rc::new(LocalStore::in_memory().unwrap());
        Sinks {
            dedup: DedupStore::load(Rc::clone(&store)).unwrap(),
            publisher: MultiSinkPublisher::new(Rc::clone(&store), None),
            store,
        }
    }

    async fn run_one(orch: &TestOrchestrator, c: &CandidateProfile, s: &mut Sinks) -> RunSummary {
        let progress = RunProgress::hidden();
        orch.run_candidate(c, &mut s.dedup, &s.publisher, &progress).await
    }

    fn two_jobs() -> Vec<Vec<FakeCard>> {
        vec![vec![
            FakeCard::new("101", "Data Engineer\nAcme\nBengaluru, Karnataka 560100"),
            FakeCard::new("102", "Senior Data Engineer\nGlobex\nBengaluru"),
        ]]
    }

    #[tokio::test]
    async fn single_location_walks_the_ladder() {
        let tmp = TempDir::new().unwrap();
        let log = FakeLog::shared();
        let driver = FakeDriver::new(Rc::clone(&log), two_jobs());
        let orch = orchestrator(vec![driver], &log, &tmp, 3);
        let mut s = sinks();

        let summary = run_one(&orch, &candidate(&["560100"], 10, 100), &mut s).await;

        assert_eq!(summary.outcome, CandidateOutcome::Completed);
        assert_eq!(summary.published, 2);
        assert_eq!(summary.locations_done, 1);
        assert_eq!(summary.session_restarts, 0);
        assert_eq!(s.store.count_postings_for("c1").unwrap(), 2);

        let log = log.borrow();
        let searches: Vec<_> = log
            .navigations
            .iter()
            .filter(|u| u.contains("/jobs/search"))
            .collect();
        assert!(searches.iter().any(|u| u.contains("f_D=5&")));
        assert!(searches.iter().any(|u| u.contains("f_D=10&")));
        assert!(searches.iter().all(|u| u.contains("location=560100%2C+India")));
        assert_eq!(log.launches, 1);
        assert_eq!(log.closes, 1);
    }

    #[tokio::test]
    async fn empty_results_pop_location_without_restart() {
        let tmp = TempDir::new().unwrap();
        let log = FakeLog::shared();
        let driver = FakeDriver::new(Rc::clone(&log), vec![]);
        let orch = orchestrator(vec![driver], &log, &tmp, 3);
        let mut s = sinks();
        let mut c1 = candidate(&["560100"], 10, 100);
        c1.distance_ladder = false;

        let summary = run_one(&orch, &c1, &mut s).await;

        assert_eq!(summary.outcome, CandidateOutcome::Completed);
        assert_eq!(summary.published, 0);
        assert_eq!(summary.locations_done, 1);
        assert_eq!(summary.session_restarts, 0);
        let log = log.borrow();
        let searches: Vec<_> = log
            .navigations
            .iter()
            .filter(|u| u.contains("/jobs/search"))
            .collect();
        assert_eq!(searches.len(), 1);
        assert!(searches[0].contains("f_D=10&"));
        assert_eq!(log.launches, 1);
    }

    #[tokio::test]
    async fn quota_clears_remaining_locations() {
        let tmp = TempDir::new().unwrap();
        let log = FakeLog::shared();
        let driver = FakeDriver::new(Rc::clone(&log), two_jobs());
        let orch = orchestrator(vec![driver], &log, &tmp, 3);
        let mut s = sinks();

        let summary = run_one(&orch, &candidate(&["560100", "Pune"], 50, 1), &mut s).await;

        assert_eq!(summary.outcome, CandidateOutcome::QuotaReached);
        assert_eq!(summary.published, 1);
        assert_eq!(summary.locations_done, 1);
        assert!(!log.borrow().navigations.iter().any(|u| u.contains("location=Pune")));
        assert_eq!(log.borrow().closes, 1);
    }

    #[tokio::test]
    async fn crash_restarts_session_and_retries_location() {
        let tmp = TempDir::new().unwrap();
        let log = FakeLog::shared();
        let orch = orchestrator(
            vec![
                FakeDriver::new(Rc::clone(&log), two_jobs()).crash_on_search(),
                FakeDriver::new(Rc::clone(&log), two_jobs()),
            ],
            &log,
            &tmp,
            3,
        );
        let mut s = sinks();

        let summary = run_one(&orch, &candidate(&["560100"], 5, 100), &mut s).await;

        assert_eq!(summary.session_restarts, 1);
        assert_eq!(summary.locations_done, 1);
        assert_eq!(summary.locations_skipped, 0);
        assert_eq!(summary.published, 2);
        assert_eq!(log.borrow().launches, 2);
    }

    #[tokio::test]
    async fn endless_crashes_skip_the_location() {
        let tmp = TempDir::new().unwrap();
        let log = FakeLog::shared();
        let drivers = (0..3)
            .map(|_| FakeDriver::new(Rc::clone(&log), two_jobs()).crash_on_search())
            .collect();
        let orch = orchestrator(drivers, &log, &tmp, 2);
        let mut s = sinks();

        let summary = run_one(&orch, &candidate(&["560100"], 5, 100), &mut s).await;

        assert_eq!(summary.session_restarts, 3);
        assert_eq!(summary.locations_skipped, 1);
        assert_eq!(summary.locations_done, 0);
        assert_eq!(summary.published, 0);
        assert_eq!(log.borrow().launches, 3);
    }

    #[tokio::test]
    async fn exhausted_navigation_retries_count_as_crash() {
        let tmp = TempDir::new().unwrap();
        let log = FakeLog::shared();
        let flaky = FakeDriver::new(Rc::clone(&log), two_jobs()).fail_navigation(vec![
            crate::driver::DriverError::transient("timeout"),
            crate::driver::DriverError::transient("timeout"),
            crate::driver::DriverError::transient("timeout"),
        ]);
        let orch = orchestrator(
            vec![flaky, FakeDriver::new(Rc::clone(&log), two_jobs())],
            &log,
            &tmp,
            3,
        );
        let mut s = sinks();

        let summary = run_one(&orch, &candidate(&["560100"], 5, 100), &mut s).await;

        assert_eq!(summary.session_restarts, 1);
        assert_eq!(summary.published, 2);
    }

    #[tokio::test]
    async fn logical_failure_skips_location_once() {
        let tmp = TempDir::new().unwrap();
        let log = FakeLog::shared();
        let malformed = vec![vec![FakeCard::new("900", "Promoted\nActively recruiting")]];
        let orch = orchestrator(
            vec![
                FakeDriver::new(Rc::clone(&log), malformed),
                FakeDriver::new(Rc::clone(&log), two_jobs()),
            ],
            &log,
            &tmp,
            3,
        );
        let mut s = sinks();

        let summary = run_one(&orch, &candidate(&["560100", "Pune"], 5, 100), &mut s).await;

        assert_eq!(summary.locations_skipped, 1);
        assert_eq!(summary.locations_done, 1);
        assert_eq!(summary.session_restarts, 0);
        assert_eq!(summary.published, 2);
        // The session was discarded after the logical failure.
        assert_eq!(log.borrow().launches, 2);
        assert_eq!(log.borrow().closes, 2);
    }

    #[tokio::test]
    async fn postings_before_a_failed_location_count_towards_quota() {
        let tmp = TempDir::new().unwrap();
        let log = FakeLog::shared();
        let partial = vec![vec![
            FakeCard::new("201", "Data Engineer\nAcme\nPune"),
            FakeCard::new("202", "ML Engineer\nGlobex\nPune"),
            FakeCard::new("203", "Promoted\nActively recruiting"),
        ]];
        let fresh = vec![vec![
            FakeCard::new("301", "Data Engineer\nInitech\nMumbai"),
            FakeCard::new("302", "Data Analyst\nHooli\nMumbai"),
            FakeCard::new("303", "Platform Engineer\nUmbrella\nMumbai"),
        ]];
        let orch = orchestrator(
            vec![
                FakeDriver::new(Rc::clone(&log), partial),
                FakeDriver::new(Rc::clone(&log), fresh),
            ],
            &log,
            &tmp,
            3,
        );
        let mut s = sinks();

        let summary = run_one(&orch, &candidate(&["Pune", "Mumbai"], 5, 3), &mut s).await;

        assert_eq!(summary.locations_skipped, 1);
        assert_eq!(summary.published, 3);
        assert_eq!(summary.outcome, CandidateOutcome::QuotaReached);
        assert_eq!(s.store.count_postings_for("c1").unwrap(), 3);
    }

    #[tokio::test]
    async fn crash_after_partial_page_keeps_the_count() {
        let tmp = TempDir::new().unwrap();
        let log = FakeLog::shared();
        let first = FakeDriver::new(Rc::clone(&log), two_jobs()).crash_on_page(1);
        let orch = orchestrator(vec![first], &log, &tmp, 0);
        let mut s = sinks();

        let summary = run_one(&orch, &candidate(&["560100"], 5, 100), &mut s).await;

        assert_eq!(summary.session_restarts, 1);
        assert_eq!(summary.locations_skipped, 1);
        assert_eq!(summary.published, 2);
        assert_eq!(u64::from(summary.published), s.store.count_postings_for("c1").unwrap());
    }

    #[tokio::test]
    async fn disabled_and_empty_candidates_never_launch() {
        let tmp = TempDir::new().unwrap();
        let log = FakeLog::shared();
        let orch = orchestrator(vec![], &log, &tmp, 3);
        let mut s = sinks();

        let mut disabled = candidate(&["560100"], 5, 100);
        disabled.run_enabled = false;
        let summary = run_one(&orch, &disabled, &mut s).await;
        assert_eq!(summary.outcome, CandidateOutcome::Disabled);

        let summary = run_one(&orch, &candidate(&["  "], 5, 100), &mut s).await;
        assert_eq!(summary.outcome, CandidateOutcome::NoLocations);
        assert_eq!(log.borrow().launches, 0);
    }

    #[tokio::test]
    async fn run_all_exports_per_candidate_and_honors_only() {
        let tmp = TempDir::new().unwrap();
        let log = FakeLog::shared();
        let driver = FakeDriver::new(Rc::clone(&log), two_jobs());
        let orch = orchestrator(vec![driver], &log, &tmp, 3);
        let mut s = sinks();

        let mut other = candidate(&["Pune"], 5, 100);
        other.candidate_id = "c2".into();
        let exports = tmp.path().join("exports");

        let summaries = orch
            .run_all(
                &[candidate(&["560100"], 5, 100), other],
                &mut s.dedup,
                &mut s.publisher,
                Some(&exports),
                Some("c1"),
            )
            .await;

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].candidate_id, "c1");
        let csv = std::fs::read_to_string(exports.join("jane_extracted_jobs.csv")).unwrap();
        assert_eq!(csv.lines().count(), 3);
        let header = "job_id,title,company,location,postal_code,url,extracted_at,is_easy_apply";
        assert!(csv.starts_with(header));
    }

    #[test]
    fn restart_delay_backs_off() {
        let limits = RunLimits {
            restart_pause_ms: 1000,
            ..RunLimits::default()
        };
        assert_eq!(limits.restart_delay(1), Duration::from_millis(1000));
        assert_eq!(limits.restart_delay(2), Duration::from_millis(2000));
        assert_eq!(limits.restart_delay(3), Duration::from_millis(4000));
    }
}
