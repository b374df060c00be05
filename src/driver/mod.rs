//! The browser automation seam.
//!
//! The extraction core only talks to [`BrowserDriver`]; the concrete
//! W3C WebDriver adapter lives in [`webdriver`]. Every failure an adapter
//! raises carries a [`FailureKind`] so callers never inspect error text.

pub mod locators;
pub mod webdriver;

use std::path::Path;

use serde_json::Value;
use thiserror::Error;

use crate::error::FailureKind;

pub use locators::{Locator, LocatorTable};
pub use webdriver::WebDriverLauncher;

/// An error raised by the automation layer, tagged with its kind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct DriverError {
    pub kind: FailureKind,
    pub message: String,
}

impl DriverError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[cfg(test)]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Transient, message)
    }

    pub fn crash(message: impl Into<String>) -> Self {
        Self::new(FailureKind::CrashShaped, message)
    }

    pub fn logical(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Logical, message)
    }
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Opaque reference to an element on the current page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Element {
    pub id: String,
}

impl Element {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Capabilities the extraction core needs from a live browser session.
pub trait BrowserDriver {
    async fn navigate(&self, url: &str) -> DriverResult<()>;

    async fn current_url(&self) -> DriverResult<String>;

    async fn find_elements(&self, locator: &Locator) -> DriverResult<Vec<Element>>;

    async fn attribute(&self, element: &Element, name: &str) -> DriverResult<Option<String>>;

    /// Rendered text of the element, lines separated by `\n`.
    async fn text(&self, element: &Element) -> DriverResult<String>;

    async fn run_script(&self, script: &str) -> DriverResult<Value>;

    async fn click(&self, element: &Element) -> DriverResult<()>;

    async fn send_keys(&self, element: &Element, text: &str) -> DriverResult<()>;

    /// Probes the session and its transport. Never fails; a broken probe is `false`.
    async fn is_alive(&self) -> bool;

    async fn close(&self) -> DriverResult<()>;
}

/// Starts new browser sessions bound to a persistent profile directory.
pub trait DriverLauncher {
    type Driver: BrowserDriver;

    async fn launch(&self, profile_dir: &Path) -> DriverResult<Self::Driver>;
}

/// Decorator around clicks and typing. Human-like pacing plugs in here.
pub trait Interaction {
    async fn click<D: BrowserDriver>(&self, driver: &D, element: &Element) -> DriverResult<()>;

    async fn type_text<D: BrowserDriver>(
        &self,
        driver: &D,
        element: &Element,
        text: &str,
    ) -> DriverResult<()>;
}

/// Passes clicks and keystrokes straight to the driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectInteraction;

impl Interaction for DirectInteraction {
    async fn click<D: BrowserDriver>(&self, driver: &D, element: &Element) -> DriverResult<()> {
        driver.click(element).await
    }

    async fn type_text<D: BrowserDriver>(
        &self,
        driver: &D,
        element: &Element,
        text: &str,
    ) -> DriverResult<()> {
        driver.click(element).await?;
        driver.send_keys(element, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_error_display_includes_kind() {
        let err = DriverError::crash("chrome not reachable");
        assert_eq!(err.to_string(), "CrashShaped: chrome not reachable");
    }

    #[test]
    fn constructors_tag_kind() {
        assert_eq!(DriverError::transient("x").kind, FailureKind::Transient);
        assert_eq!(DriverError::logical("x").kind, FailureKind::Logical);
    }
}
