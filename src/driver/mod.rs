//! Browser capability consumed by the scraper.
//!
//! Everything is addressed by CSS selector against the active tab, and every
//! read returns owned values so callers never hold live element handles across
//! a navigation or click.

pub mod chrome;
pub mod snapshot;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub use self::chrome::ChromeDriver;
pub use self::snapshot::SnapshotDriver;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("no element matches `{0}`")]
    ElementNotFound(String),

    #[error("no browser tab at index {0}")]
    TabNotFound(usize),

    #[error("invalid selector `{0}`")]
    InvalidSelector(String),

    #[error("no page available for {0}")]
    UnknownPage(String),

    #[error("browser: {0}")]
    Browser(String),
}

/// Text and attributes of one matched element, read at call time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    pub text: String,
    pub attributes: BTreeMap<String, String>,
}

impl ElementSnapshot {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Synchronous page driver. One instance owns one browser session.
pub trait PageDriver {
    fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    /// Native click on the first match. Fails with `ElementNotFound` when absent.
    fn click(&mut self, selector: &str) -> Result<(), DriverError>;

    /// `element.click()` dispatched from page script; works on covered elements.
    fn click_via_script(&mut self, selector: &str) -> Result<(), DriverError>;

    fn run_script(&mut self, script: &str) -> Result<(), DriverError>;

    /// Trimmed text of the first match, empty when nothing matches.
    fn read_text(&self, selector: &str) -> Result<String, DriverError>;

    fn read_texts(&self, selector: &str) -> Result<Vec<String>, DriverError>;

    fn read_attribute(&self, selector: &str, name: &str) -> Result<Option<String>, DriverError>;

    fn list_elements(&self, selector: &str) -> Result<Vec<ElementSnapshot>, DriverError>;

    fn count(&self, selector: &str) -> Result<usize, DriverError> {
        Ok(self.list_elements(selector)?.len())
    }

    /// Block until client-side rendering has (presumably) settled.
    fn wait_for_stable_render(&mut self);

    fn tab_count(&self) -> Result<usize, DriverError>;

    fn switch_tab(&mut self, index: usize) -> Result<(), DriverError>;

    fn close_current_tab(&mut self) -> Result<(), DriverError>;

    fn current_url(&self) -> Result<String, DriverError>;
}

/// Collapse runs of whitespace the way rendered text reads.
pub(crate) fn normalise_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
