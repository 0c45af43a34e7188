use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Browser / site configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_noncompliant_url")]
    pub noncompliant_url: String,

    /// Chrome user-data dir holding a logged-in session.
    #[serde(default)]
    pub chrome_folder: Option<PathBuf>,

    #[serde(default)]
    pub headless: bool,

    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_tab_settle_ms")]
    pub tab_settle_ms: u64,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_tickers_csv")]
    pub tickers_csv: PathBuf,

    #[serde(default)]
    pub debug: bool,

    /// Ticker-count limit applied when `debug` is set.
    #[serde(default = "default_debug_tickers")]
    pub debug_tickers: usize,

    #[serde(default = "default_filings_window_days")]
    pub filings_window_days: i64,

    #[serde(default = "default_news_start_row")]
    pub news_start_row: usize,

    #[serde(default = "default_news_end_row")]
    pub news_end_row: usize,

    #[serde(default = "default_fetch_more_clicks")]
    pub fetch_more_clicks: usize,

    #[serde(default)]
    pub cash_description: CashDescriptionStrategy,

    #[serde(default = "default_true")]
    pub noncompliance: bool,
}

/// How the derived cash figures are pulled out of the cash description.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CashDescriptionStrategy {
    /// Read the `<strong>` children and strip their fixed decorations.
    #[default]
    Labels,
    /// Regex every signed decimal out of the sentence text.
    Numbers,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://dilutiontracker.com".to_string()
}
fn default_noncompliant_url() -> String {
    "https://listingcenter.nasdaq.com/noncompliantcompanylist.aspx".to_string()
}
fn default_settle_ms() -> u64 {
    3000
}
fn default_jitter_ms() -> u64 {
    500
}
fn default_tab_settle_ms() -> u64 {
    5000
}
fn default_db_path() -> PathBuf {
    PathBuf::from("data/dilution.duckdb")
}
fn default_tickers_csv() -> PathBuf {
    PathBuf::from("tickers.csv")
}
fn default_true() -> bool {
    true
}
fn default_debug_tickers() -> usize {
    1
}
fn default_filings_window_days() -> i64 {
    10
}
fn default_news_start_row() -> usize {
    2
}
fn default_news_end_row() -> usize {
    7
}
fn default_fetch_more_clicks() -> usize {
    4
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("DT").separator("__"))
            .build()?;

        Ok(Self::from_sources(cfg))
    }

    /// Deserialize merged sources, falling back to defaults when any value
    /// does not parse.
    fn from_sources(cfg: config::Config) -> Self {
        cfg.try_deserialize().unwrap_or_else(|e| {
            tracing::warn!("Invalid configuration ({}), using defaults for every setting", e);
            AppConfig::default()
        })
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            noncompliant_url: default_noncompliant_url(),
            chrome_folder: None,
            headless: false,
            settle_ms: default_settle_ms(),
            jitter_ms: default_jitter_ms(),
            tab_settle_ms: default_tab_settle_ms(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tickers_csv: default_tickers_csv(),
            debug: false,
            debug_tickers: default_debug_tickers(),
            filings_window_days: default_filings_window_days(),
            news_start_row: default_news_start_row(),
            news_end_row: default_news_end_row(),
            fetch_more_clicks: default_fetch_more_clicks(),
            cash_description: CashDescriptionStrategy::default(),
            noncompliance: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            run_migrations: true,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            browser: BrowserConfig::default(),
            storage: StorageConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cash_strategy_names() {
        let s: CashDescriptionStrategy = serde_json::from_str("\"numbers\"").unwrap();
        assert_eq!(s, CashDescriptionStrategy::Numbers);
        assert_eq!(CashDescriptionStrategy::default(), CashDescriptionStrategy::Labels);
    }

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.pipeline.filings_window_days, 10);
        assert_eq!(cfg.pipeline.news_end_row - cfg.pipeline.news_start_row, 5);
        assert!(cfg.browser.base_url.starts_with("https://"));
    }

    #[test]
    fn test_overrides_and_fallback() {
        let cfg = config::Config::builder()
            .set_override("pipeline.filings_window_days", 3)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(AppConfig::from_sources(cfg).pipeline.filings_window_days, 3);

        let cfg = config::Config::builder()
            .set_override("pipeline.filings_window_days", "soon")
            .unwrap()
            .set_override("pipeline.debug_tickers", 2)
            .unwrap()
            .build()
            .unwrap();
        let app = AppConfig::from_sources(cfg);
        assert_eq!(app.pipeline.filings_window_days, 10);
        assert_eq!(app.pipeline.debug_tickers, 1);
    }
}
