//! Scripted in-memory stand-ins for the browser seam.
//!
//! [`FakeDriver`] serves a fixed list of result pages, a login form and a
//! few failure modes; every side effect lands in a shared [`FakeLog`].

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use reqwest::Url;
use serde_json::{Value, json};

use crate::driver::locators::JOB_ID_ATTRIBUTE;
use crate::driver::{
    BrowserDriver, DriverError, DriverLauncher, DriverResult, Element, Locator, LocatorTable,
};
use crate::extract::search::PAGE_SIZE;

const ORIGIN: &str = "https://www.linkedin.com";

#[derive(Debug, Clone)]
pub struct FakeCard {
    pub id: Option<String>,
    pub text: String,
}

impl FakeCard {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            text: text.into(),
        }
    }

    pub fn without_id(text: impl Into<String>) -> Self {
        Self {
            id: None,
            text: text.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeLog {
    pub navigations: Vec<String>,
    pub clicks: Vec<String>,
    /// (element id, text) per `send_keys`.
    pub typed: Vec<(String, String)>,
    pub profiles: Vec<PathBuf>,
    pub launches: u32,
    pub closes: u32,
}

impl FakeLog {
    pub fn shared() -> Rc<RefCell<FakeLog>> {
        Rc::new(RefCell::new(FakeLog::default()))
    }
}

#[derive(Debug, Clone)]
enum LoginMode {
    Accept,
    Checkpoint,
    Reject(String),
}

pub struct FakeDriver {
    log: Rc<RefCell<FakeLog>>,
    locators: LocatorTable,
    pages: Vec<Vec<FakeCard>>,
    next_button: bool,
    page: Cell<usize>,
    url: RefCell<String>,
    alive: Cell<bool>,
    logged_in: Cell<bool>,
    login_mode: LoginMode,
    submitted: Cell<bool>,
    navigation_failures: RefCell<VecDeque<DriverError>>,
    crash_on_search: bool,
    crash_page: Option<usize>,
    close_fails: bool,
}

impl FakeDriver {
    pub fn new(log: Rc<RefCell<FakeLog>>, pages: Vec<Vec<FakeCard>>) -> Self {
        Self {
            log,
            locators: LocatorTable::default(),
            pages,
            next_button: false,
            page: Cell::new(0),
            url: RefCell::new("about:blank".to_string()),
            alive: Cell::new(true),
            logged_in: Cell::new(false),
            login_mode: LoginMode::Accept,
            submitted: Cell::new(false),
            navigation_failures: RefCell::new(VecDeque::new()),
            crash_on_search: false,
            crash_page: None,
            close_fails: false,
        }
    }

    /// Show a "next" button on every page that has a successor.
    pub fn with_next_button(mut self) -> Self {
        self.next_button = true;
        self
    }

    /// Errors returned, in order, by the next search navigations.
    pub fn fail_navigation(self, errors: Vec<DriverError>) -> Self {
        *self.navigation_failures.borrow_mut() = errors.into();
        self
    }

    /// The browser dies on the first search navigation.
    pub fn crash_on_search(mut self) -> Self {
        self.crash_on_search = true;
        self
    }

    /// The browser dies when navigating to result page `page` (0-based).
    pub fn crash_on_page(mut self, page: usize) -> Self {
        self.crash_page = Some(page);
        self
    }

    pub fn fail_close(mut self) -> Self {
        self.close_fails = true;
        self
    }

    pub fn logged_in(self) -> Self {
        self.logged_in.set(true);
        self
    }

    pub fn checkpoint_on_login(mut self) -> Self {
        self.login_mode = LoginMode::Checkpoint;
        self
    }

    pub fn reject_login(mut self, message: impl Into<String>) -> Self {
        self.login_mode = LoginMode::Reject(message.into());
        self
    }

    pub fn kill(&self) {
        self.alive.set(false);
    }

    fn check_alive(&self) -> DriverResult<()> {
        if self.alive.get() {
            Ok(())
        } else {
            Err(DriverError::crash("invalid session id"))
        }
    }

    fn on_search(&self) -> bool {
        self.url.borrow().contains("/jobs/search")
    }

    fn card(&self, element: &Element) -> Option<&FakeCard> {
        let rest = element.id.strip_prefix("card:")?;
        let (page, index) = rest.split_once(':')?;
        let page: usize = page.parse().ok()?;
        let index: usize = index.parse().ok()?;
        self.pages.get(page)?.get(index)
    }

    fn search_page(url: &str) -> usize {
        Url::parse(url)
            .ok()
            .and_then(|u| {
                u.query_pairs()
                    .find(|(k, _)| k == "start")
                    .and_then(|(_, v)| v.parse::<u32>().ok())
            })
            .map(|start| (start / PAGE_SIZE) as usize)
            .unwrap_or(0)
    }

    fn elements(ids: impl IntoIterator<Item = String>) -> Vec<Element> {
        ids.into_iter().map(Element::new).collect()
    }
}

impl BrowserDriver for FakeDriver {
    async fn navigate(&self, url: &str) -> DriverResult<()> {
        self.check_alive()?;
        if url.contains("/jobs/search") {
            if self.crash_on_search || self.crash_page == Some(Self::search_page(url)) {
                self.alive.set(false);
                return Err(DriverError::crash("chrome not reachable"));
            }
            if let Some(err) = self.navigation_failures.borrow_mut().pop_front() {
                return Err(err);
            }
            self.page.set(Self::search_page(url));
            *self.url.borrow_mut() = url.to_string();
        } else if url.contains("/feed") && !self.logged_in.get() {
            *self.url.borrow_mut() = format!("{ORIGIN}/login");
        } else {
            *self.url.borrow_mut() = url.to_string();
        }
        self.log.borrow_mut().navigations.push(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        self.check_alive()?;
        Ok(self.url.borrow().clone())
    }

    async fn find_elements(&self, locator: &Locator) -> DriverResult<Vec<Element>> {
        self.check_alive()?;
        let page = self.page.get();
        let on_login = self.url.borrow().contains("/login");
        let found = if *locator == self.locators.job_cards {
            match self.pages.get(page) {
                Some(cards) if self.on_search() => {
                    Self::elements((0..cards.len()).map(|i| format!("card:{page}:{i}")))
                }
                _ => Vec::new(),
            }
        } else if *locator == self.locators.no_results {
            if self.on_search() && page >= self.pages.len() {
                Self::elements(["no-results".to_string()])
            } else {
                Vec::new()
            }
        } else if *locator == self.locators.next_page {
            if self.next_button && self.on_search() && page + 1 < self.pages.len() {
                Self::elements(["next".to_string()])
            } else {
                Vec::new()
            }
        } else if *locator == self.locators.login_username && on_login {
            Self::elements(["username".to_string()])
        } else if *locator == self.locators.login_password && on_login {
            Self::elements(["password".to_string()])
        } else if *locator == self.locators.login_submit && on_login {
            Self::elements(["submit".to_string()])
        } else if self.locators.login_errors.first() == Some(locator)
            && self.submitted.get()
            && matches!(self.login_mode, LoginMode::Reject(_))
        {
            Self::elements(["login-error".to_string()])
        } else {
            Vec::new()
        };
        Ok(found)
    }

    async fn attribute(&self, element: &Element, name: &str) -> DriverResult<Option<String>> {
        self.check_alive()?;
        if name == JOB_ID_ATTRIBUTE {
            return Ok(self.card(element).and_then(|c| c.id.clone()));
        }
        Ok(None)
    }

    async fn text(&self, element: &Element) -> DriverResult<String> {
        self.check_alive()?;
        if let Some(card) = self.card(element) {
            return Ok(card.text.clone());
        }
        match (&self.login_mode, element.id.as_str()) {
            (LoginMode::Reject(message), "login-error") => Ok(message.clone()),
            _ => Err(DriverError::logical(format!(
                "stale element reference: {}",
                element.id
            ))),
        }
    }

    async fn run_script(&self, _script: &str) -> DriverResult<Value> {
        self.check_alive()?;
        Ok(json!(1200))
    }

    async fn click(&self, element: &Element) -> DriverResult<()> {
        self.check_alive()?;
        self.log.borrow_mut().clicks.push(element.id.clone());
        match element.id.as_str() {
            "next" => self.page.set(self.page.get() + 1),
            "submit" => {
                self.submitted.set(true);
                match &self.login_mode {
                    LoginMode::Accept => {
                        self.logged_in.set(true);
                        *self.url.borrow_mut() = format!("{ORIGIN}/feed/");
                    }
                    LoginMode::Checkpoint => {
                        *self.url.borrow_mut() = format!("{ORIGIN}/checkpoint/challenge/1");
                    }
                    LoginMode::Reject(_) => {}
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn send_keys(&self, element: &Element, text: &str) -> DriverResult<()> {
        self.check_alive()?;
        self.log
            .borrow_mut()
            .typed
            .push((element.id.clone(), text.to_string()));
        Ok(())
    }

    async fn is_alive(&self) -> bool {
        self.alive.get()
    }

    async fn close(&self) -> DriverResult<()> {
        self.log.borrow_mut().closes += 1;
        self.alive.set(false);
        if self.close_fails {
            return Err(DriverError::crash("chrome not reachable"));
        }
        Ok(())
    }
}

/// Hands out pre-built drivers in order; fails once they run out.
pub struct FakeLauncher {
    log: Rc<RefCell<FakeLog>>,
    drivers: RefCell<VecDeque<FakeDriver>>,
}

impl FakeLauncher {
    pub fn new(log: Rc<RefCell<FakeLog>>, drivers: Vec<FakeDriver>) -> Self {
        Self {
            log,
            drivers: RefCell::new(drivers.into()),
        }
    }
}

impl DriverLauncher for FakeLauncher {
    type Driver = FakeDriver;

    async fn launch(&self, profile_dir: &Path) -> DriverResult<FakeDriver> {
        {
            let mut log = self.log.borrow_mut();
            log.launches += 1;
            log.profiles.push(profile_dir.to_path_buf());
        }
        self.drivers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| DriverError::crash("chrome not reachable"))
    }
}
