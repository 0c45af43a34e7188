pub mod charts;
pub mod cleaner;
pub mod columns;
pub mod error;
pub mod filings;
pub mod gate;
pub mod geometry;
pub mod listings;
pub mod noncompliance;
pub mod premarket;
pub mod table;

use chrono::{Local, NaiveDateTime};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{BrowserConfig, CashDescriptionStrategy, PipelineConfig};
use crate::driver::{DriverError, PageDriver};
use crate::models::{TickerEntry, TickerReport};

use self::error::Result;
use self::table::RowWindow;

const NAV_ITEMS: &str = "nav li";
const GO_TO_APP: &str = "Go to App";
const CLOSE_MODAL: &str = ".intercom-post-close";

/// Info icons add their tooltip text to the labels they sit next to.
const REMOVE_ICONS: &str = "document.querySelectorAll('.dtCardInfoIcon, .dilutionRatingInfoIcon').forEach(icon => icon.remove())";

/// Per-section knobs taken from the pipeline configuration.
#[derive(Debug, Clone, Copy)]
pub struct SectionSettings {
    pub filings_window_days: i64,
    pub news_window: RowWindow,
    pub fetch_more_clicks: usize,
    pub cash_description: CashDescriptionStrategy,
    pub noncompliance: bool,
}

impl From<&PipelineConfig> for SectionSettings {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            filings_window_days: cfg.filings_window_days,
            news_window: RowWindow::new(cfg.news_start_row, cfg.news_end_row),
            fetch_more_clicks: cfg.fetch_more_clicks,
            cash_description: cfg.cash_description,
            noncompliance: cfg.noncompliance,
        }
    }
}

impl Default for SectionSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Dilution-tracker dashboard scraper over any [`PageDriver`].
///
/// Section methods read whatever company page is currently loaded; call
/// [`DilutionScraper::load_company`] first.
pub struct DilutionScraper<D: PageDriver> {
    driver: D,
    base_url: Url,
    noncompliant_url: String,
    settings: SectionSettings,
    clock: fn() -> NaiveDateTime,
}

impl<D: PageDriver> DilutionScraper<D> {
    pub fn new(driver: D, browser: &BrowserConfig, settings: SectionSettings) -> Result<Self> {
        Ok(Self {
            driver,
            base_url: Url::parse(&browser.base_url)?,
            noncompliant_url: browser.noncompliant_url.clone(),
            settings,
            clock: local_now,
        })
    }

    /// Replace the wall clock (terminal chart columns, filings window).
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    fn url(&self, path: &str) -> Result<String> {
        Ok(self.base_url.join(path)?.to_string())
    }

    /// Click an element that some layouts do not render. Absence is fine.
    fn click_optional(&mut self, selector: &str, via_script: bool) -> Result<bool> {
        let clicked = if via_script {
            self.driver.click_via_script(selector)
        } else {
            self.driver.click(selector)
        };
        match clicked {
            Ok(()) => {
                self.driver.wait_for_stable_render();
                Ok(true)
            }
            Err(DriverError::ElementNotFound(_)) => {
                debug!("Optional element `{}` not present", selector);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Open a dashboard tab (news, holders, filings) and let it render.
    fn open_tab(&mut self, selector: &str) -> Result<()> {
        self.driver.click(selector)?;
        self.driver.wait_for_stable_render();
        Ok(())
    }

    /// Check the browser profile carries a session and enter the app.
    pub fn login(&mut self) -> Result<bool> {
        let home = self.base_url.to_string();
        self.driver.navigate(&home)?;
        self.driver.wait_for_stable_render();

        let nav = self.driver.read_texts(NAV_ITEMS)?;
        if !nav.iter().any(|item| item == GO_TO_APP) {
            warn!("No \"{}\" entry in the navigation, session is not logged in", GO_TO_APP);
            return Ok(false);
        }

        let before = self.driver.current_url()?;
        let app = self.url("app")?;
        self.driver.navigate(&app)?;
        self.driver.wait_for_stable_render();
        if self.driver.current_url()? == before {
            warn!("Navigation to {} did not leave {}", app, before);
            return Ok(false);
        }

        if self.driver.count(CLOSE_MODAL)? > 0 {
            self.click_optional(CLOSE_MODAL, true)?;
        }

        info!("Login successful");
        Ok(true)
    }

    /// Navigate to a company's dashboard. `key` is the search path segment
    /// from the tickers file and may carry a query string.
    pub fn load_company(&mut self, key: &str) -> Result<()> {
        let url = self.url(&format!("app/search/{key}"))?;
        self.driver.navigate(&url)?;
        self.driver.wait_for_stable_render();

        self.driver.run_script(REMOVE_ICONS)?;
        self.driver.wait_for_stable_render();
        Ok(())
    }

    /// Load a company and run every section.
    pub fn scrape_ticker(&mut self, entry: &TickerEntry) -> Result<TickerReport> {
        self.load_company(&entry.key)?;
        self.collect(&entry.name, self.settings.noncompliance)
    }

    /// Run every section against the loaded page, stopping after the
    /// premarket section when the ticker is not covered. The non-compliance
    /// list lives on another site and is visited last.
    pub fn collect(&mut self, ticker: &str, with_noncompliance: bool) -> Result<TickerReport> {
        let premarket = self.premarket()?;
        if !premarket.found {
            return Ok(TickerReport {
                ticker: ticker.to_string(),
                premarket,
                ..Default::default()
            });
        }

        let mut report = TickerReport {
            ticker: ticker.to_string(),
            premarket,
            historical: Some(self.historical()?),
            cash: Some(self.cash()?),
            extras: self.extras()?,
            offerings: self.offerings()?,
            news: self.news()?,
            holders: self.holders()?,
            filings: self.filings()?,
            noncompliance: Vec::new(),
        };

        if with_noncompliance {
            report.noncompliance = self.noncompliance(ticker)?;
        }
        Ok(report)
    }
}
