//! Pipeline orchestrator: ties tickers file → scraper → storage together.
//!
//! One browser session, one ticker at a time: log in once, then for each
//! ticker load its page, run the sections and persist the report. A failing
//! ticker is logged and counted; the run moves on to the next one.

use crate::config::AppConfig;
use crate::driver::{ChromeDriver, PageDriver};
use crate::loader::load_tickers;
use crate::models::TickerEntry;
use crate::scraper::{DilutionScraper, SectionSettings};
use crate::storage::Repository;
use crate::utils::Timer;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::path::Path;
use tracing::{info, warn};

pub struct Pipeline {
    config: AppConfig,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub tickers_processed: usize,
    pub not_found: usize,
    pub records_saved: usize,
    pub errors: usize,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Full run against the live site. `tickers` overrides the configured
    /// CSV, `limit` the debug ticker count.
    pub fn run(&self, tickers: Option<&Path>, limit: Option<usize>) -> Result<PipelineStats> {
        let repo = Repository::open(&self.config.storage.db_path)
            .context("Failed to open DuckDB")?;
        if self.config.storage.run_migrations {
            repo.run_migrations()?;
        }

        let path = tickers.unwrap_or(self.config.pipeline.tickers_csv.as_path());
        let entries = load_tickers(path)?;

        let driver = ChromeDriver::launch(&self.config.browser)
            .context("Failed to launch Chrome")?;
        let mut scraper = DilutionScraper::new(
            driver,
            &self.config.browser,
            SectionSettings::from(&self.config.pipeline),
        )
        .context("Failed to build scraper")?;

        let run_id = repo.begin_scrape_run()?;
        match self.scrape_all(&mut scraper, &repo, &entries, limit) {
            Ok(stats) => {
                let error = (stats.errors > 0).then(|| format!("{} tickers failed", stats.errors));
                repo.finish_scrape_run(run_id, stats.tickers_processed, stats.records_saved, error.as_deref())
                    .ok();
                Ok(stats)
            }
            Err(e) => {
                repo.finish_scrape_run(run_id, 0, 0, Some(&format!("{e:#}"))).ok();
                Err(e)
            }
        }
    }

    /// Explicit limit first, then the debug limit, else every ticker.
    fn ticker_limit(&self, limit: Option<usize>) -> Option<usize> {
        let pipeline = &self.config.pipeline;
        limit.or(pipeline.debug.then_some(pipeline.debug_tickers))
    }

    pub fn scrape_all<D: PageDriver>(
        &self,
        scraper: &mut DilutionScraper<D>,
        repo: &Repository,
        entries: &[TickerEntry],
        limit: Option<usize>,
    ) -> Result<PipelineStats> {
        if !scraper.login().context("Login check failed")? {
            bail!("Browser session is not logged in; log in with the configured Chrome profile first");
        }

        let entries = match self.ticker_limit(limit) {
            Some(n) if n < entries.len() => {
                info!("Limiting run to {} of {} tickers", n, entries.len());
                &entries[..n]
            }
            _ => entries,
        };

        let timer = Timer::start(format!("Scraping {} tickers", entries.len()));
        let mut stats = PipelineStats::default();

        for (i, entry) in entries.iter().enumerate() {
            info!("=== [{}/{}] {} ===", i + 1, entries.len(), entry.name);
            stats.tickers_processed += 1;

            let report = match scraper.scrape_ticker(entry) {
                Ok(report) => report,
                Err(e) => {
                    warn!("{}: {:#}", entry.name, e);
                    stats.errors += 1;
                    continue;
                }
            };
            if !report.premarket.found {
                stats.not_found += 1;
            }

            match repo.save_report(&report, Utc::now().naive_utc()) {
                Ok(n) => {
                    info!("{}: {} rows saved", entry.name, n);
                    stats.records_saved += n;
                }
                Err(e) => {
                    warn!("{}: save failed: {:#}", entry.name, e);
                    stats.errors += 1;
                }
            }
        }

        info!(
            "=== Done: {} tickers | {} not covered | {} rows | {} errors | {:.1?} per ticker ===",
            stats.tickers_processed,
            stats.not_found,
            stats.records_saved,
            stats.errors,
            timer.per_item(stats.tickers_processed),
        );
        Ok(stats)
    }
}
