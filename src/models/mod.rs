use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ── Premarket ─────────────────────────────────────────────────────────────────

/// Company header, ratings and commentary from the ticker's dashboard.
///
/// Numeric fundamentals are kept as cleaned strings (currency, percent and
/// magnitude suffixes stripped); storage converts them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PremarketRecord {
    pub found: bool,
    /// Text of the not-covered indicator, when the page shows one.
    pub dilution_data: Option<String>,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub mkt_cap: Option<String>,
    pub float_cap: Option<String>,
    pub est_cash_sh: Option<String>,
    pub t25_inst_own: Option<String>,
    pub si: Option<String>,
    pub description_company: Option<String>,
    pub overall_risk: Option<String>,
    pub offering_ability: Option<String>,
    pub dilution_amt_ex_shelf: Option<String>,
    pub historical: Option<String>,
    pub cash_need: Option<String>,
    pub our_take: Option<String>,
    pub update_info: Option<String>,
}

impl PremarketRecord {
    /// Record for a ticker the site has never indexed.
    pub fn not_found(indicator: impl Into<String>) -> Self {
        Self {
            found: false,
            dilution_data: Some(indicator.into()),
            ..Default::default()
        }
    }
}

// ── Chart series ──────────────────────────────────────────────────────────────

/// One bar of a rendered chart. `position` is the bar's document order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesSample {
    pub position: usize,
    pub date: NaiveDateTime,
    pub value: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HistoricalRecord {
    pub columns: Vec<SeriesSample>,
    pub atm: Option<f64>,
    pub warrant: Option<f64>,
    pub convertible_preferred: Option<f64>,
    pub convertible_note: Option<f64>,
    pub equity_line: Option<f64>,
    pub s1_offering: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CashRecord {
    pub columns: Vec<SeriesSample>,
    pub prorated_operating: Option<f64>,
    pub capital_raise: Option<f64>,
    pub current_cash_estimate: Option<f64>,
    pub cash_description: String,
    pub figures: CashFigures,
}

/// Figures read out of the cash description sentence.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CashFigures {
    pub months_of_cash: Option<f64>,
    pub quarterly_cash_burn_m: Option<f64>,
    pub current_cash_m: Option<f64>,
    /// Lone figure when the sentence has the single-number shape.
    pub m: Option<f64>,
}

// ── Table sections ────────────────────────────────────────────────────────────

/// One label/value line of a detail card in the extras section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtraRecord {
    pub origin: String,
    pub status: String,
    pub name: String,
    pub title: String,
    pub value: String,
    /// 1-based card index within its section.
    pub position: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OfferingRecord {
    pub offering_type: Option<String>,
    pub method: Option<String>,
    pub share_equivalent: Option<i64>,
    pub price: Option<f64>,
    pub warrants: Option<i64>,
    pub offering_amt: Option<i64>,
    pub bank: Option<String>,
    pub investors: Option<String>,
    pub date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsRecord {
    pub time_ago_number: Option<i64>,
    pub time_ago_label: Option<String>,
    pub datetime: Option<NaiveDateTime>,
    pub headline: Option<String>,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HolderRecord {
    pub institution_name: Option<String>,
    pub percentage: Option<f64>,
    pub shares: Option<i64>,
    pub change: Option<f64>,
    pub form: Option<String>,
    pub effective: Option<NaiveDateTime>,
    pub filed: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilingRecord {
    pub name: String,
    pub headline: String,
    pub date: NaiveDateTime,
    pub link: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NonComplianceRecord {
    pub company: String,
    pub ticker: String,
    pub deficiency: String,
    pub market: String,
    pub notification_date: NaiveDateTime,
}

// ── Ticker list ───────────────────────────────────────────────────────────────

/// Entry of the tickers CSV: display name and the key used in the search URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickerEntry {
    pub name: String,
    pub key: String,
}

// ── Per-ticker result ─────────────────────────────────────────────────────────

/// Everything scraped for one ticker. Sections after `premarket` stay empty
/// when the ticker is not covered.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TickerReport {
    pub ticker: String,
    pub premarket: PremarketRecord,
    pub historical: Option<HistoricalRecord>,
    pub cash: Option<CashRecord>,
    pub extras: Vec<ExtraRecord>,
    pub offerings: Vec<OfferingRecord>,
    pub news: Vec<NewsRecord>,
    pub holders: Vec<HolderRecord>,
    pub filings: Vec<FilingRecord>,
    pub noncompliance: Vec<NonComplianceRecord>,
}
