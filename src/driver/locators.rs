use serde::{Deserialize, Serialize};

/// Element lookup strategy, named as the WebDriver protocol names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    #[serde(rename = "css selector")]
    Css,
    #[serde(rename = "xpath")]
    XPath,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub using: Strategy,
    pub value: String,
}

impl Locator {
    pub fn css(value: impl Into<String>) -> Self {
        Self {
            using: Strategy::Css,
            value: value.into(),
        }
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self {
            using: Strategy::XPath,
            value: value.into(),
        }
    }
}

/// Stable table of locators for the job site. Any entry may be overridden
/// from the `[locators]` section of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LocatorTable {
    pub job_cards: Locator,
    pub next_page: Locator,
    pub no_results: Locator,
    pub login_username: Locator,
    pub login_password: Locator,
    pub login_submit: Locator,
    pub login_errors: Vec<Locator>,
}

impl Default for LocatorTable {
    fn default() -> Self {
        Self {
            job_cards: Locator::css("[data-job-id]"),
            next_page: Locator::xpath(
                "//button[@aria-label='Next' or contains(@class, 'pagination__button--next')]",
            ),
            no_results: Locator::xpath("//*[contains(text(), 'No matching jobs found')]"),
            login_username: Locator::css("#username"),
            login_password: Locator::css("#password"),
            login_submit: Locator::css("button[type=\"submit\"]"),
            login_errors: vec![
                Locator::css("#error-for-password"),
                Locator::css("#error-for-username"),
                Locator::css(".alert-content"),
            ],
        }
    }
}

/// Attribute carrying the site-assigned posting identifier on a card.
pub const JOB_ID_ATTRIBUTE: &str = "data-job-id";
