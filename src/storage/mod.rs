use crate::models::{
    CashRecord, ExtraRecord, FilingRecord, HistoricalRecord, HolderRecord, NewsRecord,
    NonComplianceRecord, OfferingRecord, PremarketRecord, SeriesSample, TickerReport,
};
use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use duckdb::{params, Connection, OptionalExt};
use std::path::Path;
use tracing::{debug, info};

// ── Schema ────────────────────────────────────────────────────────────────────

/// Categorical text columns are stored as ids into one of these tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dictionary {
    Sectors,
    Industries,
    DilutionData,
    Adjectives,
    ExtraOrigins,
    ExtraStatuses,
    ExtraNames,
    OfferingTypes,
    OfferingMethods,
    Banks,
    Investors,
    Institutions,
    FilingForms,
    Markets,
    Deficiencies,
}

impl Dictionary {
    pub const ALL: [Dictionary; 15] = [
        Dictionary::Sectors,
        Dictionary::Industries,
        Dictionary::DilutionData,
        Dictionary::Adjectives,
        Dictionary::ExtraOrigins,
        Dictionary::ExtraStatuses,
        Dictionary::ExtraNames,
        Dictionary::OfferingTypes,
        Dictionary::OfferingMethods,
        Dictionary::Banks,
        Dictionary::Investors,
        Dictionary::Institutions,
        Dictionary::FilingForms,
        Dictionary::Markets,
        Dictionary::Deficiencies,
    ];

    pub fn table(self) -> &'static str {
        match self {
            Dictionary::Sectors => "sectors",
            Dictionary::Industries => "industries",
            Dictionary::DilutionData => "dilution_data",
            Dictionary::Adjectives => "adjectives",
            Dictionary::ExtraOrigins => "extra_origins",
            Dictionary::ExtraStatuses => "extra_statuses",
            Dictionary::ExtraNames => "extra_names",
            Dictionary::OfferingTypes => "offering_types",
            Dictionary::OfferingMethods => "offering_methods",
            Dictionary::Banks => "banks",
            Dictionary::Investors => "investors",
            Dictionary::Institutions => "institutions",
            Dictionary::FilingForms => "filing_forms",
            Dictionary::Markets => "markets",
            Dictionary::Deficiencies => "deficiencies",
        }
    }
}

const DDL: &str = r#"
CREATE SEQUENCE IF NOT EXISTS seq_scrape_runs START 1;

CREATE TABLE IF NOT EXISTS premarket (
    ticker                  VARCHAR   NOT NULL,
    scraped_at              TIMESTAMP NOT NULL,
    found                   BOOLEAN   NOT NULL,
    dilution_data_id        BIGINT,
    name                    VARCHAR,
    sector_id               BIGINT,
    industry_id             BIGINT,
    -- Converted from the page's cleaned strings; NULL when unparsable
    mkt_cap                 DOUBLE,
    float_cap               DOUBLE,
    est_cash_sh             DOUBLE,
    t25_inst_own            DOUBLE,
    si                      DOUBLE,
    description_company     VARCHAR,
    overall_risk_id         BIGINT,
    offering_ability_id     BIGINT,
    dilution_amt_ex_shelf_id BIGINT,
    historical_id           BIGINT,
    cash_need_id            BIGINT,
    our_take                VARCHAR,
    update_info             VARCHAR,
    PRIMARY KEY (ticker, scraped_at)
);

CREATE TABLE IF NOT EXISTS historical (
    ticker                  VARCHAR   NOT NULL,
    scraped_at              TIMESTAMP NOT NULL,
    atm                     DOUBLE,
    warrant                 DOUBLE,
    convertible_preferred   DOUBLE,
    convertible_note        DOUBLE,
    equity_line             DOUBLE,
    s1_offering             DOUBLE,
    PRIMARY KEY (ticker, scraped_at)
);

CREATE TABLE IF NOT EXISTS historical_columns (
    ticker      VARCHAR   NOT NULL,
    scraped_at  TIMESTAMP NOT NULL,
    position    INTEGER   NOT NULL,
    date        TIMESTAMP NOT NULL,
    value       DOUBLE    NOT NULL,
    PRIMARY KEY (ticker, scraped_at, position)
);

CREATE TABLE IF NOT EXISTS cash (
    ticker                  VARCHAR   NOT NULL,
    scraped_at              TIMESTAMP NOT NULL,
    prorated_operating      DOUBLE,
    capital_raise           DOUBLE,
    current_cash_estimate   DOUBLE,
    cash_description        VARCHAR,
    months_of_cash          DOUBLE,
    quarterly_cash_burn_m   DOUBLE,
    current_cash_m          DOUBLE,
    m                       DOUBLE,
    PRIMARY KEY (ticker, scraped_at)
);

CREATE TABLE IF NOT EXISTS cash_columns (
    ticker      VARCHAR   NOT NULL,
    scraped_at  TIMESTAMP NOT NULL,
    position    INTEGER   NOT NULL,
    date        TIMESTAMP NOT NULL,
    value       DOUBLE    NOT NULL,
    PRIMARY KEY (ticker, scraped_at, position)
);

CREATE TABLE IF NOT EXISTS extras (
    ticker      VARCHAR   NOT NULL,
    scraped_at  TIMESTAMP NOT NULL,
    origin_id   BIGINT,
    status_id   BIGINT,
    name_id     BIGINT,
    title       VARCHAR,
    value       VARCHAR,
    position    INTEGER
);

CREATE TABLE IF NOT EXISTS offerings (
    ticker              VARCHAR   NOT NULL,
    scraped_at          TIMESTAMP NOT NULL,
    type_id             BIGINT,
    method_id           BIGINT,
    share_equivalent    BIGINT,
    price               DOUBLE,
    warrants            BIGINT,
    offering_amt        BIGINT,
    bank_id             BIGINT,
    investors_id        BIGINT,
    date                TIMESTAMP
);

CREATE TABLE IF NOT EXISTS news (
    ticker              VARCHAR   NOT NULL,
    scraped_at          TIMESTAMP NOT NULL,
    time_ago_number     BIGINT,
    time_ago_label      VARCHAR,
    datetime            TIMESTAMP,
    headline            VARCHAR,
    link                VARCHAR,
    UNIQUE (ticker, link)
);

CREATE TABLE IF NOT EXISTS holders (
    ticker          VARCHAR   NOT NULL,
    scraped_at      TIMESTAMP NOT NULL,
    institution_id  BIGINT,
    percentage      DOUBLE,
    shares          BIGINT,
    change          DOUBLE,
    form_id         BIGINT,
    effective       TIMESTAMP,
    filed           TIMESTAMP
);

CREATE TABLE IF NOT EXISTS filings (
    ticker      VARCHAR   NOT NULL,
    scraped_at  TIMESTAMP NOT NULL,
    form_id     BIGINT,
    headline    VARCHAR,
    date        TIMESTAMP NOT NULL,
    link        VARCHAR   NOT NULL,
    UNIQUE (ticker, link)
);

CREATE TABLE IF NOT EXISTS noncompliance (
    ticker              VARCHAR   NOT NULL,
    scraped_at          TIMESTAMP NOT NULL,
    company             VARCHAR,
    deficiency_id       BIGINT,
    market_id           BIGINT,
    notification_date   TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS scrape_runs (
    id                  BIGINT PRIMARY KEY DEFAULT nextval('seq_scrape_runs'),
    started_at          TIMESTAMP NOT NULL,
    finished_at         TIMESTAMP,
    status              VARCHAR NOT NULL DEFAULT 'running',
    tickers_processed   INTEGER DEFAULT 0,
    records_saved       INTEGER DEFAULT 0,
    error_msg           VARCHAR
);

CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY,
    applied_at  TIMESTAMP NOT NULL
);
"#;

const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_premarket_ticker ON premarket (ticker);
CREATE INDEX IF NOT EXISTS idx_news_ticker      ON news (ticker);
CREATE INDEX IF NOT EXISTS idx_filings_date     ON filings (date);
"#;

/// Tables reported by `stats`, in display order.
pub const RECORD_TABLES: [&str; 11] = [
    "premarket",
    "historical",
    "historical_columns",
    "cash",
    "cash_columns",
    "extras",
    "offerings",
    "news",
    "holders",
    "filings",
    "noncompliance",
];

fn dictionary_ddl(dict: Dictionary) -> String {
    let t = dict.table();
    format!(
        "CREATE SEQUENCE IF NOT EXISTS seq_{t} START 1;
         CREATE TABLE IF NOT EXISTS {t} (
             id   BIGINT PRIMARY KEY DEFAULT nextval('seq_{t}'),
             name VARCHAR NOT NULL UNIQUE
         );"
    )
}

/// Cleaned premarket figure → number. "" and anything unparsable are NULL.
fn to_double(value: Option<&String>) -> Option<f64> {
    value.and_then(|v| v.trim().parse().ok())
}

// ── Repository ────────────────────────────────────────────────────────────────

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open DuckDB at {:?}", path))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    pub fn run_migrations(&self) -> Result<()> {
        info!("Running migrations…");
        for dict in Dictionary::ALL {
            self.conn
                .execute_batch(&dictionary_ddl(dict))
                .with_context(|| format!("DDL failed for {}", dict.table()))?;
        }
        self.conn.execute_batch(DDL).context("DDL failed")?;
        self.conn.execute_batch(INDEXES).context("Index creation failed")?;
        self.conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, ?)",
            params![Utc::now().naive_utc()],
        )?;
        info!("Migrations done.");
        Ok(())
    }

    // ── Dictionaries ──────────────────────────────────────────────────────────

    /// Id of `name` in `dict`, inserting it when absent. Empty text has no id.
    pub fn dictionary_id(&self, dict: Dictionary, name: Option<&str>) -> Result<Option<i64>> {
        let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
            return Ok(None);
        };
        let table = dict.table();

        let existing: Option<i64> = self
            .conn
            .query_row(&format!("SELECT id FROM {table} WHERE name = ?"), params![name], |r| {
                r.get(0)
            })
            .optional()
            .with_context(|| format!("lookup {table} {name:?}"))?;
        if let Some(id) = existing {
            return Ok(Some(id));
        }

        let id: i64 = self
            .conn
            .query_row(
                &format!("INSERT INTO {table} (name) VALUES (?) RETURNING id"),
                params![name],
                |r| r.get(0),
            )
            .with_context(|| format!("insert {table} {name:?}"))?;
        debug!("New {} entry {:?} = {}", table, name, id);
        Ok(Some(id))
    }

    fn dict(&self, dict: Dictionary, name: Option<&String>) -> Result<Option<i64>> {
        self.dictionary_id(dict, name.map(String::as_str))
    }

    // ── Records ───────────────────────────────────────────────────────────────

    pub fn save_premarket(&self, ticker: &str, at: NaiveDateTime, r: &PremarketRecord) -> Result<usize> {
        let adjective = |v: &Option<String>| self.dict(Dictionary::Adjectives, v.as_ref());
        self.conn
            .execute(
                r#"INSERT INTO premarket
                   (ticker, scraped_at, found, dilution_data_id, name, sector_id, industry_id,
                    mkt_cap, float_cap, est_cash_sh, t25_inst_own, si, description_company,
                    overall_risk_id, offering_ability_id, dilution_amt_ex_shelf_id,
                    historical_id, cash_need_id, our_take, update_info)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
                params![
                    ticker,
                    at,
                    r.found,
                    self.dict(Dictionary::DilutionData, r.dilution_data.as_ref())?,
                    r.name,
                    self.dict(Dictionary::Sectors, r.sector.as_ref())?,
                    self.dict(Dictionary::Industries, r.industry.as_ref())?,
                    to_double(r.mkt_cap.as_ref()),
                    to_double(r.float_cap.as_ref()),
                    to_double(r.est_cash_sh.as_ref()),
                    to_double(r.t25_inst_own.as_ref()),
                    to_double(r.si.as_ref()),
                    r.description_company,
                    adjective(&r.overall_risk)?,
                    adjective(&r.offering_ability)?,
                    adjective(&r.dilution_amt_ex_shelf)?,
                    adjective(&r.historical)?,
                    adjective(&r.cash_need)?,
                    r.our_take,
                    r.update_info,
                ],
            )
            .with_context(|| format!("insert premarket {ticker}"))
    }

    fn save_columns(&self, table: &str, ticker: &str, at: NaiveDateTime, columns: &[SeriesSample]) -> Result<usize> {
        let sql = format!(
            "INSERT INTO {table} (ticker, scraped_at, position, date, value) VALUES (?, ?, ?, ?, ?)"
        );
        for c in columns {
            self.conn
                .execute(&sql, params![ticker, at, c.position as i64, c.date, c.value])
                .with_context(|| format!("insert {table} {ticker} #{}", c.position))?;
        }
        Ok(columns.len())
    }

    pub fn save_historical(&self, ticker: &str, at: NaiveDateTime, r: &HistoricalRecord) -> Result<usize> {
        self.conn
            .execute(
                r#"INSERT INTO historical
                   (ticker, scraped_at, atm, warrant, convertible_preferred, convertible_note,
                    equity_line, s1_offering)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
                params![
                    ticker,
                    at,
                    r.atm,
                    r.warrant,
                    r.convertible_preferred,
                    r.convertible_note,
                    r.equity_line,
                    r.s1_offering,
                ],
            )
            .with_context(|| format!("insert historical {ticker}"))?;
        Ok(1 + self.save_columns("historical_columns", ticker, at, &r.columns)?)
    }

    pub fn save_cash(&self, ticker: &str, at: NaiveDateTime, r: &CashRecord) -> Result<usize> {
        self.conn
            .execute(
                r#"INSERT INTO cash
                   (ticker, scraped_at, prorated_operating, capital_raise, current_cash_estimate,
                    cash_description, months_of_cash, quarterly_cash_burn_m, current_cash_m, m)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
                params![
                    ticker,
                    at,
                    r.prorated_operating,
                    r.capital_raise,
                    r.current_cash_estimate,
                    r.cash_description,
                    r.figures.months_of_cash,
                    r.figures.quarterly_cash_burn_m,
                    r.figures.current_cash_m,
                    r.figures.m,
                ],
            )
            .with_context(|| format!("insert cash {ticker}"))?;
        Ok(1 + self.save_columns("cash_columns", ticker, at, &r.columns)?)
    }

    pub fn save_extras(&self, ticker: &str, at: NaiveDateTime, rows: &[ExtraRecord]) -> Result<usize> {
        for r in rows {
            self.conn
                .execute(
                    r#"INSERT INTO extras
                       (ticker, scraped_at, origin_id, status_id, name_id, title, value, position)
                       VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
                    params![
                        ticker,
                        at,
                        self.dictionary_id(Dictionary::ExtraOrigins, Some(&r.origin))?,
                        self.dictionary_id(Dictionary::ExtraStatuses, Some(&r.status))?,
                        self.dictionary_id(Dictionary::ExtraNames, Some(&r.name))?,
                        r.title,
                        r.value,
                        r.position as i64,
                    ],
                )
                .with_context(|| format!("insert extra {ticker} {}", r.title))?;
        }
        Ok(rows.len())
    }

    pub fn save_offerings(&self, ticker: &str, at: NaiveDateTime, rows: &[OfferingRecord]) -> Result<usize> {
        for r in rows {
            self.conn
                .execute(
                    r#"INSERT INTO offerings
                       (ticker, scraped_at, type_id, method_id, share_equivalent, price, warrants,
                        offering_amt, bank_id, investors_id, date)
                       VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
                    params![
                        ticker,
                        at,
                        self.dict(Dictionary::OfferingTypes, r.offering_type.as_ref())?,
                        self.dict(Dictionary::OfferingMethods, r.method.as_ref())?,
                        r.share_equivalent,
                        r.price,
                        r.warrants,
                        r.offering_amt,
                        self.dict(Dictionary::Banks, r.bank.as_ref())?,
                        self.dict(Dictionary::Investors, r.investors.as_ref())?,
                        r.date,
                    ],
                )
                .with_context(|| format!("insert offering {ticker}"))?;
        }
        Ok(rows.len())
    }

    /// Already-stored links are skipped. Returns the rows actually inserted.
    pub fn save_news(&self, ticker: &str, at: NaiveDateTime, rows: &[NewsRecord]) -> Result<usize> {
        let mut inserted = 0;
        for r in rows {
            inserted += self
                .conn
                .execute(
                    r#"INSERT OR IGNORE INTO news
                       (ticker, scraped_at, time_ago_number, time_ago_label, datetime, headline, link)
                       VALUES (?, ?, ?, ?, ?, ?, ?)"#,
                    params![
                        ticker,
                        at,
                        r.time_ago_number,
                        r.time_ago_label,
                        r.datetime,
                        r.headline,
                        r.link,
                    ],
                )
                .with_context(|| format!("insert news {ticker} {:?}", r.link))?;
        }
        Ok(inserted)
    }

    pub fn save_holders(&self, ticker: &str, at: NaiveDateTime, rows: &[HolderRecord]) -> Result<usize> {
        for r in rows {
            self.conn
                .execute(
                    r#"INSERT INTO holders
                       (ticker, scraped_at, institution_id, percentage, shares, change, form_id,
                        effective, filed)
                       VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
                    params![
                        ticker,
                        at,
                        self.dict(Dictionary::Institutions, r.institution_name.as_ref())?,
                        r.percentage,
                        r.shares,
                        r.change,
                        self.dict(Dictionary::FilingForms, r.form.as_ref())?,
                        r.effective,
                        r.filed,
                    ],
                )
                .with_context(|| format!("insert holder {ticker} {:?}", r.institution_name))?;
        }
        Ok(rows.len())
    }

    /// Already-stored links are skipped. Returns the rows actually inserted.
    pub fn save_filings(&self, ticker: &str, at: NaiveDateTime, rows: &[FilingRecord]) -> Result<usize> {
        let mut inserted = 0;
        for r in rows {
            inserted += self
                .conn
                .execute(
                    r#"INSERT OR IGNORE INTO filings
                       (ticker, scraped_at, form_id, headline, date, link)
                       VALUES (?, ?, ?, ?, ?, ?)"#,
                    params![
                        ticker,
                        at,
                        self.dictionary_id(Dictionary::FilingForms, Some(&r.name))?,
                        r.headline,
                        r.date,
                        r.link,
                    ],
                )
                .with_context(|| format!("insert filing {ticker} {}", r.link))?;
        }
        Ok(inserted)
    }

    pub fn save_noncompliance(
        &self,
        ticker: &str,
        at: NaiveDateTime,
        rows: &[NonComplianceRecord],
    ) -> Result<usize> {
        for r in rows {
            self.conn
                .execute(
                    r#"INSERT INTO noncompliance
                       (ticker, scraped_at, company, deficiency_id, market_id, notification_date)
                       VALUES (?, ?, ?, ?, ?, ?)"#,
                    params![
                        ticker,
                        at,
                        r.company,
                        self.dictionary_id(Dictionary::Deficiencies, Some(&r.deficiency))?,
                        self.dictionary_id(Dictionary::Markets, Some(&r.market))?,
                        r.notification_date,
                    ],
                )
                .with_context(|| format!("insert noncompliance {ticker}"))?;
        }
        Ok(rows.len())
    }

    /// Persist every section of one ticker atomically. Returns rows written.
    pub fn save_report(&self, report: &TickerReport, at: NaiveDateTime) -> Result<usize> {
        let t = report.ticker.as_str();
        let tx = self.conn.unchecked_transaction()?;

        let mut saved = self.save_premarket(t, at, &report.premarket)?;
        if let Some(h) = &report.historical {
            saved += self.save_historical(t, at, h)?;
        }
        if let Some(c) = &report.cash {
            saved += self.save_cash(t, at, c)?;
        }
        saved += self.save_extras(t, at, &report.extras)?;
        saved += self.save_offerings(t, at, &report.offerings)?;
        saved += self.save_news(t, at, &report.news)?;
        saved += self.save_holders(t, at, &report.holders)?;
        saved += self.save_filings(t, at, &report.filings)?;
        saved += self.save_noncompliance(t, at, &report.noncompliance)?;

        tx.commit()?;
        debug!("Saved {} rows for {}", saved, t);
        Ok(saved)
    }

    // ── Stats ─────────────────────────────────────────────────────────────────

    pub fn count(&self, table: &str) -> Result<i64> {
        let mut s = self.conn.prepare(&format!("SELECT COUNT(*) FROM {table}"))?;
        Ok(s.query_row([], |r| r.get(0))?)
    }

    pub fn table_counts(&self) -> Result<Vec<(&'static str, i64)>> {
        RECORD_TABLES
            .iter()
            .map(|t| Ok((*t, self.count(t)?)))
            .collect()
    }

    /// (found, not found) premarket rows.
    pub fn coverage_counts(&self) -> Result<(i64, i64)> {
        let mut s = self.conn.prepare(
            "SELECT COUNT(*) FILTER (WHERE found), COUNT(*) FILTER (WHERE NOT found) FROM premarket",
        )?;
        Ok(s.query_row([], |r| Ok((r.get(0)?, r.get(1)?)))?)
    }

    pub fn last_scrape(&self) -> Result<Option<NaiveDateTime>> {
        let mut s = self.conn.prepare("SELECT MAX(scraped_at) FROM premarket")?;
        Ok(s.query_row([], |r| r.get(0))?)
    }

    // ── Scrape run log ────────────────────────────────────────────────────────

    pub fn begin_scrape_run(&self) -> Result<i64> {
        let id: i64 = self.conn.query_row(
            "INSERT INTO scrape_runs (started_at, status) VALUES (?, 'running') RETURNING id",
            params![Utc::now().naive_utc()],
            |r| r.get(0),
        )?;
        Ok(id)
    }

    pub fn finish_scrape_run(
        &self, run_id: i64, tickers: usize, records: usize, error: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            r#"UPDATE scrape_runs SET
               finished_at = ?, status = ?,
               tickers_processed = ?, records_saved = ?, error_msg = ?
               WHERE id = ?"#,
            params![
                Utc::now().naive_utc(),
                if error.is_none() { "success" } else { "error" },
                tickers as i64, records as i64, error, run_id,
            ],
        )?;
        Ok(())
    }

    pub fn run_status(&self, run_id: i64) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT status FROM scrape_runs WHERE id = ?", params![run_id], |r| r.get(0))
            .optional()?)
    }
}
