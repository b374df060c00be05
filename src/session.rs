//! Browser session lifecycle: one profile-bound session per candidate.
//!
//! A [`SessionHandle`] walks
//! `UNINITIALIZED → INITIALIZING → READY → DEGRADED → TERMINATED`; a
//! terminated handle is never revived, the supervisor builds a fresh one.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::candidates::{CandidateProfile, Credentials};
use crate::driver::{
    BrowserDriver, DirectInteraction, DriverError, DriverLauncher, Element, Interaction, Locator,
    LocatorTable,
};
use crate::error::ScoutError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Degraded,
    Terminated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "UNINITIALIZED"),
            SessionState::Initializing => write!(f, "INITIALIZING"),
            SessionState::Ready => write!(f, "READY"),
            SessionState::Degraded => write!(f, "DEGRADED"),
            SessionState::Terminated => write!(f, "TERMINATED"),
        }
    }
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Uninitialized, Initializing)
                | (Uninitialized, Terminated)
                | (Initializing, Ready)
                | (Initializing, Terminated)
                | (Ready, Degraded)
                | (Ready, Terminated)
                | (Degraded, Terminated)
        )
    }
}

/// One live automation session, owned by the orchestrator for one candidate.
pub struct SessionHandle<D> {
    pub id: Uuid,
    pub candidate_id: String,
    pub started_at: DateTime<Utc>,
    state: SessionState,
    history: Vec<SessionState>,
    driver: Option<D>,
}

impl<D> SessionHandle<D> {
    pub fn new(candidate_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            candidate_id: candidate_id.into(),
            started_at: Utc::now(),
            state: SessionState::Uninitialized,
            history: Vec::new(),
            driver: None,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// States this handle has left, oldest first.
    #[cfg(test)]
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    pub fn transition(&mut self, next: SessionState) -> Result<(), ScoutError> {
        if !self.state.can_transition_to(next) {
            return Err(ScoutError::IllegalTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.history.push(self.state);
        self.state = next;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// The driver of a ready session.
    pub fn driver(&self) -> Result<&D, ScoutError> {
        match (&self.driver, self.state) {
            (Some(driver), SessionState::Ready) => Ok(driver),
            (_, state) => Err(ScoutError::SessionLost(format!(
                "session {} is {state}",
                self.id
            ))),
        }
    }

    /// Ready → degraded after a crash-shaped failure. No-op in other states.
    pub fn mark_degraded(&mut self) {
        if self.state == SessionState::Ready {
            self.history.push(self.state);
            self.state = SessionState::Degraded;
        }
    }
}

impl<D> fmt::Debug for SessionHandle<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("candidate_id", &self.candidate_id)
            .field("state", &self.state)
            .field("has_driver", &self.driver.is_some())
            .finish()
    }
}

/// Result of a login attempt that did not crash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The persisted profile already carried a session.
    AlreadyLoggedIn,
    LoggedIn,
    /// A checkpoint or captcha page; left for the operator to clear.
    Checkpoint(String),
    /// Landed somewhere unexpected; the message is what the page reported.
    Failed(String),
}

/// Authenticates a freshly launched session.
pub trait LoginFlow {
    async fn login<D: BrowserDriver>(
        &self,
        driver: &D,
        credentials: &Credentials,
    ) -> Result<LoginOutcome, ScoutError>;
}

/// Pauses of the login form, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginPacing {
    pub landing_ms: u64,
    pub field_ms: u64,
    pub submit_ms: u64,
}

impl Default for LoginPacing {
    fn default() -> Self {
        Self {
            landing_ms: 3000,
            field_ms: 2000,
            submit_ms: 15000,
        }
    }
}

impl LoginPacing {
    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            landing_ms: 0,
            field_ms: 0,
            submit_ms: 0,
        }
    }
}

/// Visits the feed; if the profile is not signed in, fills the login form
/// and checks where the site lands.
pub struct FeedLogin<I: Interaction = DirectInteraction> {
    base_url: String,
    locators: LocatorTable,
    pacing: LoginPacing,
    interaction: I,
}

impl FeedLogin<DirectInteraction> {
    pub fn new(base_url: impl Into<String>, locators: LocatorTable, pacing: LoginPacing) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            locators,
            pacing,
            interaction: DirectInteraction,
        }
    }
}

fn is_checkpoint(url: &str) -> bool {
    url.contains("checkpoint") || url.contains("challenge")
}

impl<I: Interaction> FeedLogin<I> {
    async fn first_present<D: BrowserDriver>(
        &self,
        driver: &D,
        locator: &Locator,
        name: &str,
    ) -> Result<Element, ScoutError> {
        driver
            .find_elements(locator)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ScoutError::Driver(DriverError::logical(format!(
                    "login form field {name} not found"
                )))
            })
    }

    async fn error_message<D: BrowserDriver>(&self, driver: &D) -> Option<String> {
        for locator in &self.locators.login_errors {
            let Ok(found) = driver.find_elements(locator).await else {
                continue;
            };
            for element in found {
                if let Ok(text) = driver.text(&element).await {
                    let text = text.trim();
                    if !text.is_empty() {
                        return Some(text.to_string());
                    }
                }
            }
        }
        None
    }
}

impl<I: Interaction> LoginFlow for FeedLogin<I> {
    async fn login<D: BrowserDriver>(
        &self,
        driver: &D,
        credentials: &Credentials,
    ) -> Result<LoginOutcome, ScoutError> {
        info!(stage = "login", "checking login status");
        driver.navigate(&format!("{}/feed/", self.base_url)).await?;
        sleep(Duration::from_millis(self.pacing.landing_ms)).await;
        if driver.current_url().await?.contains("feed") {
            info!(stage = "login", "already logged in");
            return Ok(LoginOutcome::AlreadyLoggedIn);
        }

        info!(stage = "login", "not logged in, opening login page");
        driver.navigate(&format!("{}/login", self.base_url)).await?;
        sleep(Duration::from_millis(self.pacing.landing_ms)).await;
        if driver.current_url().await?.contains("feed") {
            return Ok(LoginOutcome::AlreadyLoggedIn);
        }

        let username = self
            .first_present(driver, &self.locators.login_username, "username")
            .await?;
        let password = self
            .first_present(driver, &self.locators.login_password, "password")
            .await?;
        let submit = self
            .first_present(driver, &self.locators.login_submit, "submit")
            .await?;

        self.interaction
            .type_text(driver, &username, &credentials.username)
            .await?;
        sleep(Duration::from_millis(self.pacing.field_ms)).await;
        self.interaction
            .type_text(driver, &password, &credentials.password)
            .await?;
        sleep(Duration::from_millis(self.pacing.field_ms)).await;
        self.interaction.click(driver, &submit).await?;
        sleep(Duration::from_millis(self.pacing.submit_ms)).await;

        let landed = driver.current_url().await?;
        if landed.contains("feed") {
            info!(stage = "login", "login confirmed");
            return Ok(LoginOutcome::LoggedIn);
        }
        if is_checkpoint(&landed) {
            warn!(
                stage = "login",
                url = %landed,
                "security checkpoint, clear it manually in the browser"
            );
            return Ok(LoginOutcome::Checkpoint(landed));
        }
        let message = self
            .error_message(driver)
            .await
            .unwrap_or_else(|| format!("login finished on {landed}"));
        error!(stage = "login", message = %message, "login failed");
        Ok(LoginOutcome::Failed(message))
    }
}

/// Owns launching, authenticating, probing and closing sessions.
pub struct SessionSupervisor<A, L> {
    launcher: A,
    login: L,
    profiles_dir: PathBuf,
}

impl<A, L> SessionSupervisor<A, L>
where
    A: DriverLauncher,
    L: LoginFlow,
{
    pub fn new(launcher: A, login: L, profiles_dir: impl Into<PathBuf>) -> Self {
        Self {
            launcher,
            login,
            profiles_dir: profiles_dir.into(),
        }
    }

    pub fn profile_dir(&self, candidate_id: &str) -> PathBuf {
        self.profiles_dir.join(candidate_id)
    }

    /// A ready session for `candidate`: `previous` when it is still ready and
    /// belongs to them, otherwise a freshly launched and authenticated one.
    pub async fn ensure_session(
        &self,
        previous: Option<SessionHandle<A::Driver>>,
        candidate: &CandidateProfile,
    ) -> Result<SessionHandle<A::Driver>, ScoutError> {
        if let Some(mut handle) = previous {
            if handle.is_ready() && handle.candidate_id == candidate.candidate_id {
                return Ok(handle);
            }
            self.teardown(&mut handle).await;
        }

        let mut handle = SessionHandle::new(candidate.candidate_id.as_str());
        handle.transition(SessionState::Initializing)?;
        let profile_dir = self.profile_dir(&candidate.candidate_id);
        info!(
            candidate = %candidate.candidate_id,
            session = %handle.id,
            profile = %profile_dir.display(),
            stage = "session_start",
            "launching browser session"
        );

        if let Err(e) = ensure_profile_dir(&profile_dir) {
            handle.transition(SessionState::Terminated)?;
            return Err(e);
        }
        let driver = match self.launcher.launch(&profile_dir).await {
            Ok(driver) => driver,
            Err(e) => {
                error!(
                    candidate = %candidate.candidate_id,
                    stage = "session_start",
                    error = %e,
                    "browser launch failed"
                );
                handle.transition(SessionState::Terminated)?;
                return Err(e.into());
            }
        };
        handle.driver = Some(driver);

        if let Some(credentials) = candidate.credentials() {
            let login = match &handle.driver {
                Some(driver) => self.login.login(driver, &credentials).await,
                None => Err(ScoutError::SessionLost("driver vanished before login".into())),
            };
            if let Err(e) = login {
                error!(
                    candidate = %candidate.candidate_id,
                    stage = "login",
                    error = %e,
                    "login flow failed"
                );
                self.teardown(&mut handle).await;
                return Err(e);
            }
        } else {
            info!(
                candidate = %candidate.candidate_id,
                stage = "login",
                "no usable credentials, relying on the saved profile"
            );
        }

        handle.transition(SessionState::Ready)?;
        Ok(handle)
    }

    /// Probe the session. A negative answer leaves the handle degraded.
    pub async fn is_alive(&self, handle: &mut SessionHandle<A::Driver>) -> bool {
        if !handle.is_ready() {
            return false;
        }
        let alive = match &handle.driver {
            Some(driver) => driver.is_alive().await,
            None => false,
        };
        if !alive {
            warn!(
                candidate = %handle.candidate_id,
                session = %handle.id,
                "session failed liveness probe"
            );
            handle.mark_degraded();
        }
        alive
    }

    /// Close the session, best effort. The handle always ends terminated.
    pub async fn teardown(&self, handle: &mut SessionHandle<A::Driver>) {
        if handle.state == SessionState::Terminated {
            return;
        }
        if let Some(driver) = handle.driver.take()
            && let Err(e) = driver.close().await
        {
            warn!(
                candidate = %handle.candidate_id,
                session = %handle.id,
                error = %e,
                "error closing browser session"
            );
        }
        handle.history.push(handle.state);
        handle.state = SessionState::Terminated;
        let uptime_secs = (Utc::now() - handle.started_at).num_seconds();
        info!(
            candidate = %handle.candidate_id,
            session = %handle.id,
            uptime_secs,
            "session terminated"
        );
    }
}

fn ensure_profile_dir(path: &Path) -> Result<(), ScoutError> {
    std::fs::create_dir_all(path).map_err(|e| {
        ScoutError::Config(format!(
            "cannot create browser profile dir {}: {e}",
            path.display()
        ))
    })
}
