//! The scroll-and-extract loop for one (keywords, location, radius) search.
//!
//! Each keyword walks the state machine
//! `START → LOADING → SCROLLING → CARD_SCAN → PAGINATE_OR_STOP` and ends in
//! one of `DONE`, `DONE_LIMIT` or `DONE_NO_RESULTS`. Errors leave the loop
//! as `FAILED` and are handed back to the orchestrator with their kind.

pub mod card;
pub mod search;

use std::fmt;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::dedup::DedupStore;
use crate::driver::locators::JOB_ID_ATTRIBUTE;
use crate::driver::{BrowserDriver, DirectInteraction, Element, Interaction, LocatorTable};
use crate::error::{FailureKind, ScoutError};
use crate::model::{JobPosting, resolve_postal_code};
use crate::publish::MultiSinkPublisher;
use crate::retry::RetryExecutor;

use card::{card_lines, is_easy_apply, parse_card};
use search::{PAGE_SIZE, SearchQuery, job_view_url, search_url};

/// Scrolls the results list (or the window as a fallback) to the bottom and
/// returns the new scroll height, or -1 on a script-side error.
const SCROLL_SCRIPT: &str = r#"
try {
    var selectors = [
        '.jobs-search-results-list',
        '.jobs-search-results',
        '.scaffold-layout__list-container',
        'section.jobs-search-results-list'
    ];
    var list = null;
    for (var s of selectors) {
        list = document.querySelector(s);
        if (list) break;
    }
    if (list) {
        list.scrollTop = list.scrollHeight;
        return list.scrollHeight;
    }
    window.scrollTo(0, document.body.scrollHeight);
    return document.body.scrollHeight;
} catch (e) { return -1; }
"#;

/// Limits and pacing of the extraction loop.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    pub max_scroll_iterations: u32,
    /// Consecutive scrolls without growth before scrolling stops.
    pub stuck_threshold: u32,
    /// Hard ceiling on the result offset.
    pub max_offset: u32,
    /// Wall-clock budget per keyword search, in seconds.
    pub time_budget_secs: u64,
    pub settle_ms: u64,
    pub scroll_pause_ms: u64,
    pub page_load_ms: u64,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            max_scroll_iterations: 15,
            stuck_threshold: 3,
            max_offset: 1000,
            time_budget_secs: 1800,
            settle_ms: 4000,
            scroll_pause_ms: 2000,
            page_load_ms: 5000,
        }
    }
}

impl ExtractionSettings {
    fn time_budget(&self) -> Duration {
        Duration::from_secs(self.time_budget_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionState {
    Start,
    Loading,
    Scrolling,
    CardScan,
    PaginateOrStop,
    Done,
    DoneLimit,
    DoneNoResults,
    Failed,
}

impl fmt::Display for ExtractionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionState::Start => write!(f, "START"),
            ExtractionState::Loading => write!(f, "LOADING"),
            ExtractionState::Scrolling => write!(f, "SCROLLING"),
            ExtractionState::CardScan => write!(f, "CARD_SCAN"),
            ExtractionState::PaginateOrStop => write!(f, "PAGINATE_OR_STOP"),
            ExtractionState::Done => write!(f, "DONE"),
            ExtractionState::DoneLimit => write!(f, "DONE_LIMIT"),
            ExtractionState::DoneNoResults => write!(f, "DONE_NO_RESULTS"),
            ExtractionState::Failed => write!(f, "FAILED"),
        }
    }
}

/// Why a keyword search stopped paginating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    NoResults,
    OffsetCeiling,
    QuotaReached,
    TimeBudget,
}

impl StopReason {
    fn terminal_state(self) -> ExtractionState {
        match self {
            StopReason::NoResults => ExtractionState::DoneNoResults,
            StopReason::OffsetCeiling | StopReason::QuotaReached => ExtractionState::DoneLimit,
            StopReason::TimeBudget => ExtractionState::Done,
        }
    }
}

enum PageStep {
    Stop(StopReason),
    Clicked,
    Navigate,
}

enum CardOutcome {
    NoId,
    AlreadySeen,
    EasyApply,
    Published,
    NotDurable,
}

/// One search invocation: every keyword of a candidate at one location and radius.
#[derive(Debug, Clone, Copy)]
pub struct SearchRequest<'a> {
    pub candidate_id: &'a str,
    pub keywords: &'a [String],
    pub location: &'a str,
    pub radius: u32,
    /// Postings this invocation may still publish.
    pub quota: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordOutcome {
    pub keyword: String,
    pub state: ExtractionState,
    pub stop: StopReason,
    pub published: u32,
    pub pages: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    pub published: u32,
    pub searches: Vec<KeywordOutcome>,
}

impl ExtractionReport {
    /// Every keyword search ran and the site reported no matching results.
    pub fn found_nothing(&self) -> bool {
        !self.searches.is_empty()
            && self
                .searches
                .iter()
                .all(|s| s.state == ExtractionState::DoneNoResults && s.published == 0)
    }
}

pub struct ExtractionEngine<I: Interaction = DirectInteraction> {
    base_url: String,
    locators: LocatorTable,
    settings: ExtractionSettings,
    retry: RetryExecutor,
    interaction: I,
}

impl ExtractionEngine<DirectInteraction> {
    pub fn new(
        base_url: impl Into<String>,
        locators: LocatorTable,
        settings: ExtractionSettings,
        retry: RetryExecutor,
    ) -> Self {
        Self::with_interaction(base_url, locators, settings, retry, DirectInteraction)
    }
}

impl<I: Interaction> ExtractionEngine<I> {
    pub fn with_interaction(
        base_url: impl Into<String>,
        locators: LocatorTable,
        settings: ExtractionSettings,
        retry: RetryExecutor,
        interaction: I,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            locators,
            settings,
            retry,
            interaction,
        }
    }

    /// Search every keyword in order until the quota is spent. Returns the
    /// number of newly published postings.
    ///
    /// `tally` is bumped on every publication, so postings published before
    /// an error are still accounted for by the caller.
    pub async fn run<D: BrowserDriver>(
        &self,
        driver: &D,
        request: &SearchRequest<'_>,
        tally: &mut u32,
        dedup: &mut DedupStore,
        publisher: &MultiSinkPublisher,
    ) -> Result<ExtractionReport, ScoutError> {
        let mut report = ExtractionReport::default();
        for keyword in request.keywords {
            let remaining = request.quota.saturating_sub(report.published);
            if remaining == 0 {
                break;
            }
            let span = info_span!(
                "search",
                candidate = request.candidate_id,
                location = request.location,
                radius = request.radius,
                keyword = keyword.as_str(),
            );
            let outcome = self
                .run_keyword(driver, request, keyword, remaining, tally, dedup, publisher)
                .instrument(span)
                .await?;
            report.published += outcome.published;
            report.searches.push(outcome);
        }
        Ok(report)
    }

    async fn run_keyword<D: BrowserDriver>(
        &self,
        driver: &D,
        request: &SearchRequest<'_>,
        keyword: &str,
        quota: u32,
        tally: &mut u32,
        dedup: &mut DedupStore,
        publisher: &MultiSinkPublisher,
    ) -> Result<KeywordOutcome, ScoutError> {
        let started = Instant::now();
        let mut query = SearchQuery {
            keyword,
            location: request.location,
            radius: request.radius,
            start: 0,
        };
        let mut state = ExtractionState::Start;
        let mut navigate = true;
        let mut published = 0;
        let mut pages = 0;

        let stop = loop {
            let step = match state {
                ExtractionState::Start => Ok(ExtractionState::Loading),
                ExtractionState::Loading => {
                    pages += 1;
                    info!(page = pages, start = query.start, "loading results page");
                    self.load(driver, &query, navigate)
                        .await
                        .map(|()| ExtractionState::Scrolling)
                }
                ExtractionState::Scrolling => self
                    .scroll_results(driver, started)
                    .await
                    .map(|()| ExtractionState::CardScan),
                ExtractionState::CardScan => {
                    let remaining = quota.saturating_sub(published);
                    match self
                        .scan_cards(driver, request, remaining, tally, dedup, publisher)
                        .await
                    {
                        Ok(n) => {
                            info!(page = pages, new = n, "finished page");
                            published += n;
                            Ok(ExtractionState::PaginateOrStop)
                        }
                        Err(e) => Err(e),
                    }
                }
                ExtractionState::PaginateOrStop => {
                    match self
                        .paginate_or_stop(driver, &query, started, published, quota)
                        .await
                    {
                        Ok(PageStep::Stop(reason)) => break reason,
                        Ok(PageStep::Clicked) => {
                            navigate = false;
                            query = query.next_page();
                            Ok(ExtractionState::Loading)
                        }
                        Ok(PageStep::Navigate) => {
                            navigate = true;
                            query = query.next_page();
                            Ok(ExtractionState::Loading)
                        }
                        Err(e) => Err(e),
                    }
                }
                ExtractionState::Done
                | ExtractionState::DoneLimit
                | ExtractionState::DoneNoResults
                | ExtractionState::Failed => {
                    return Err(ScoutError::Config(format!(
                        "extraction loop re-entered terminal state {state}"
                    )));
                }
            };

            state = match step {
                Ok(next) => next,
                Err(e) => {
                    error!(
                        stage = %state,
                        state = %ExtractionState::Failed,
                        start = query.start,
                        kind = %e.failure_kind(),
                        error = %e,
                        "extraction failed"
                    );
                    return Err(e);
                }
            };
        };

        let state = stop.terminal_state();
        info!(state = %state, reason = ?stop, published, pages, "search finished");
        Ok(KeywordOutcome {
            keyword: keyword.to_string(),
            state,
            stop,
            published,
            pages,
        })
    }

    async fn load<D: BrowserDriver>(
        &self,
        driver: &D,
        query: &SearchQuery<'_>,
        navigate: bool,
    ) -> Result<(), ScoutError> {
        if navigate {
            let url = search_url(&self.base_url, query)?;
            let url = url.as_str();
            info!(url, "navigating");
            self.retry
                .run("search_navigation", move || driver.navigate(url))
                .await?;
        } else {
            sleep(Duration::from_millis(self.settings.page_load_ms)).await;
        }
        sleep(Duration::from_millis(self.settings.settle_ms)).await;
        Ok(())
    }

    async fn scroll_results<D: BrowserDriver>(
        &self,
        driver: &D,
        started: Instant,
    ) -> Result<(), ScoutError> {
        let mut last_height = 0;
        let mut stuck = 0;
        for iteration in 0..self.settings.max_scroll_iterations {
            if started.elapsed() >= self.settings.time_budget() {
                debug!(iteration, "time budget spent, scrolling stopped");
                break;
            }
            let height = match driver.run_script(SCROLL_SCRIPT).await {
                Ok(value) => value.as_i64().unwrap_or(-1),
                Err(e) if e.kind == FailureKind::CrashShaped => {
                    error!(iteration, error = %e, "session lost during scroll");
                    return Err(e.into());
                }
                Err(e) => {
                    warn!(iteration, error = %e, "scroll iteration failed");
                    break;
                }
            };
            if height == -1 {
                warn!(iteration, "scroll script error");
                break;
            }

            sleep(Duration::from_millis(self.settings.scroll_pause_ms)).await;

            if height == last_height {
                stuck += 1;
            } else {
                last_height = height;
                stuck = 0;
                debug!(height, "scroll height grew");
            }
            if stuck >= self.settings.stuck_threshold {
                break;
            }
        }
        Ok(())
    }

    async fn scan_cards<D: BrowserDriver>(
        &self,
        driver: &D,
        request: &SearchRequest<'_>,
        remaining: u32,
        tally: &mut u32,
        dedup: &mut DedupStore,
        publisher: &MultiSinkPublisher,
    ) -> Result<u32, ScoutError> {
        if remaining == 0 {
            return Ok(0);
        }
        let cards = driver.find_elements(&self.locators.job_cards).await?;
        info!(cards = cards.len(), "detected job cards");

        let mut published = 0;
        for card in &cards {
            match self
                .process_card(driver, card, request, dedup, publisher)
                .await
            {
                Ok(CardOutcome::Published) => {
                    published += 1;
                    *tally += 1;
                    if published >= remaining {
                        info!(published, "quota reached mid-page");
                        break;
                    }
                }
                Ok(_) => {}
                Err(ScoutError::Driver(e)) if e.kind == FailureKind::Logical => {
                    warn!(card = %card.id, error = %e, "card unreadable, skipped");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(published)
    }

    async fn process_card<D: BrowserDriver>(
        &self,
        driver: &D,
        card: &Element,
        request: &SearchRequest<'_>,
        dedup: &mut DedupStore,
        publisher: &MultiSinkPublisher,
    ) -> Result<CardOutcome, ScoutError> {
        let job_id = driver
            .attribute(card, JOB_ID_ATTRIBUTE)
            .await?
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        let Some(job_id) = job_id else {
            return Ok(CardOutcome::NoId);
        };
        if dedup.has(&job_id) {
            debug!(job_id = %job_id, "already seen, skipping");
            return Ok(CardOutcome::AlreadySeen);
        }

        let text = driver.text(card).await?;
        let lines = card_lines(&text);
        if is_easy_apply(&lines) {
            info!(job_id = %job_id, "skipping Easy Apply job");
            dedup.add(&job_id)?;
            return Ok(CardOutcome::EasyApply);
        }

        let partial = parse_card(&lines).map_err(|e| ScoutError::MalformedCard {
            job_id: job_id.clone(),
            reason: e.to_string(),
        })?;
        let location_text = partial
            .location
            .unwrap_or_else(|| request.location.to_string());
        let posting = JobPosting {
            url: job_view_url(&self.base_url, &job_id),
            postal_code: resolve_postal_code(&location_text, request.location),
            job_id,
            title: partial.title,
            company: partial.company,
            location_text,
            is_easy_apply: false,
            extracted_at: Utc::now(),
            candidate_id: request.candidate_id.to_string(),
        };

        let result = publisher.publish(&posting).await;
        if !result.is_durable() {
            warn!(job_id = %posting.job_id, "posting not durable, left unseen for a later run");
            return Ok(CardOutcome::NotDurable);
        }
        dedup.add(&posting.job_id)?;
        Ok(CardOutcome::Published)
    }

    async fn paginate_or_stop<D: BrowserDriver>(
        &self,
        driver: &D,
        query: &SearchQuery<'_>,
        started: Instant,
        published: u32,
        quota: u32,
    ) -> Result<PageStep, ScoutError> {
        if !driver
            .find_elements(&self.locators.no_results)
            .await?
            .is_empty()
        {
            info!("no more jobs found for this search");
            return Ok(PageStep::Stop(StopReason::NoResults));
        }
        if published >= quota {
            return Ok(PageStep::Stop(StopReason::QuotaReached));
        }
        if started.elapsed() >= self.settings.time_budget() {
            warn!(elapsed_secs = started.elapsed().as_secs(), "search time budget exhausted");
            return Ok(PageStep::Stop(StopReason::TimeBudget));
        }
        if query.start + PAGE_SIZE >= self.settings.max_offset {
            info!(start = query.start, "result offset ceiling reached");
            return Ok(PageStep::Stop(StopReason::OffsetCeiling));
        }

        let next = driver.find_elements(&self.locators.next_page).await?;
        if let Some(button) = next.first() {
            let disabled = driver.attribute(button, "disabled").await?.is_some();
            if !disabled {
                match self.interaction.click(driver, button).await {
                    Ok(()) => {
                        info!("clicked next page");
                        return Ok(PageStep::Clicked);
                    }
                    Err(e) if e.kind == FailureKind::CrashShaped => return Err(e.into()),
                    Err(e) => debug!(error = %e, "next button click failed"),
                }
            }
        }
        debug!("next button unavailable, using URL pagination");
        Ok(PageStep::Navigate)
    }
}
