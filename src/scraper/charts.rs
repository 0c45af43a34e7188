//! Historical shares-outstanding and cash-position charts.

use tracing::{debug, info};

use super::cleaner::{cash_figures_from_labels, cash_figures_from_sentence, parse_float};
use super::columns::extract_columns;
use super::error::Result;
use super::geometry::AxisScale;
use super::DilutionScraper;
use crate::config::CashDescriptionStrategy;
use crate::driver::PageDriver;
use crate::models::{CashRecord, HistoricalRecord};

const OS_CHART: &str = "#results-os-chart";
const OS_BARS: &str = "#results-os-chart .recharts-bar-rectangles .recharts-bar-rectangle";
const OS_TOP_TICK: &str = "#results-os-chart .yAxis .recharts-cartesian-axis-tick:last-child > text";
const OS_SEGMENTS: &str = r#"#results-os-chart path[name="Fully Diluted"]"#;

const CASH_CHART: &str = ".results-cash-bar-chart";
const CASH_DESCRIPTION: &str = "#results-os-chart + p + p";

const BAR: &str = "path";

/// Segment of the fully-diluted bar → instrument, keyed by fill colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Instrument {
    Atm,
    Warrant,
    ConvertiblePreferred,
    ConvertibleNote,
    EquityLine,
    S1Offering,
}

const SEGMENT_COLOURS: [(&str, Instrument); 6] = [
    ("#2CA1CF", Instrument::Atm),
    ("#8CD2E8", Instrument::Warrant),
    ("#FFD876", Instrument::ConvertiblePreferred),
    ("#FFC107", Instrument::ConvertibleNote),
    ("#BCC0C4", Instrument::EquityLine),
    ("#D1D5D8", Instrument::S1Offering),
];

impl Instrument {
    fn from_fill(fill: &str) -> Option<Self> {
        SEGMENT_COLOURS
            .iter()
            .find(|(colour, _)| colour.eq_ignore_ascii_case(fill.trim()))
            .map(|(_, instrument)| *instrument)
    }

    fn slot(self, record: &mut HistoricalRecord) -> &mut Option<f64> {
        match self {
            Instrument::Atm => &mut record.atm,
            Instrument::Warrant => &mut record.warrant,
            Instrument::ConvertiblePreferred => &mut record.convertible_preferred,
            Instrument::ConvertibleNote => &mut record.convertible_note,
            Instrument::EquityLine => &mut record.equity_line,
            Instrument::S1Offering => &mut record.s1_offering,
        }
    }
}

impl<D: PageDriver> DilutionScraper<D> {
    /// Shares-outstanding bars plus the fully-diluted instrument mix.
    pub fn historical(&mut self) -> Result<HistoricalRecord> {
        let scale = AxisScale::read(&self.driver, OS_TOP_TICK, &format!("{OS_TOP_TICK} tspan"), None)?;
        debug!("{} axis: {:?}", OS_CHART, scale);

        let mut record = HistoricalRecord {
            columns: extract_columns(&self.driver, OS_BARS, BAR, &scale, self.now())?,
            ..Default::default()
        };

        for segment in self.driver.list_elements(OS_SEGMENTS)? {
            let Some(instrument) = segment.attr("fill").and_then(Instrument::from_fill) else {
                debug!("Unmapped segment fill {:?}", segment.attr("fill"));
                continue;
            };
            let height = parse_float("segment height", segment.attr("height").unwrap_or_default())?;
            *instrument.slot(&mut record) = Some(scale.decode(height));
        }

        info!("Historical: {} columns", record.columns.len());
        Ok(record)
    }

    /// Quarterly cash bars, the three summary bars and the runway sentence.
    /// The axis can dip below zero, so its full span is the reference.
    pub fn cash(&mut self) -> Result<CashRecord> {
        let ticks = format!("{CASH_CHART} .yAxis .recharts-cartesian-axis-tick");
        let top = format!("{ticks}:last-child > text");
        let scale = AxisScale::read(
            &self.driver,
            &top,
            &format!("{top} tspan"),
            Some(&format!("{ticks}:first-child > text tspan")),
        )?;
        debug!("{} axis: {:?}", CASH_CHART, scale);

        let bars = format!("{CASH_CHART} .yAxis + g .recharts-layer");
        let columns = extract_columns(&self.driver, &bars, BAR, &scale, self.now())?;

        let summary_bar = |name: &str| -> Result<Option<f64>> {
            let selector = format!(r#"{CASH_CHART} [name="{name}"]:not([fill="none"])"#);
            match self.driver.read_attribute(&selector, "height")? {
                Some(h) if !h.trim().is_empty() => Ok(Some(scale.decode(parse_float(name, &h)?))),
                _ => Ok(None),
            }
        };
        let prorated_operating = summary_bar("OpCF")?;
        let capital_raise = summary_bar("Cap Raise")?;
        let current_cash_estimate = summary_bar("Current Est")?;

        let cash_description = self.driver.read_text(CASH_DESCRIPTION)?;
        let figures = match self.settings.cash_description {
            CashDescriptionStrategy::Labels => {
                let items = self
                    .driver
                    .read_texts(&format!("{CASH_DESCRIPTION} > strong"))?;
                cash_figures_from_labels(&items)
            }
            CashDescriptionStrategy::Numbers => cash_figures_from_sentence(&cash_description),
        };

        info!("Cash: {} columns", columns.len());
        Ok(CashRecord {
            columns,
            prorated_operating,
            capital_raise,
            current_cash_estimate,
            cash_description,
            figures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::SnapshotDriver;
    use crate::scraper::fixtures::{COMPANY_URL, fixed_now, page, scraper};
    use crate::scraper::SectionSettings;
    use crate::scraper::error::ScrapeError;

    const OS_CHART_HTML: &str = r##"
        <div id="results-os-chart">
          <svg>
            <g class="yAxis">
              <g class="recharts-cartesian-axis-tick"><text height="200"><tspan>0</tspan></text></g>
              <g class="recharts-cartesian-axis-tick"><text height="200"><tspan>80</tspan></text></g>
            </g>
            <g class="recharts-bar-rectangles">
              <g class="recharts-bar-rectangle"><path name="12/31/2023" height="50"></path></g>
              <g class="recharts-bar-rectangle"></g>
              <g class="recharts-bar-rectangle"><path name="02/29/2024" height="100"></path></g>
              <g class="recharts-bar-rectangle"><path name="Current" height="125"></path></g>
            </g>
            <path name="Fully Diluted" fill="#2ca1cf" height="10"></path>
            <path name="Fully Diluted" fill="#FFC107" height="25"></path>
            <path name="Fully Diluted" fill="#123456" height="99"></path>
          </svg>
        </div>
    "##;

    const CASH_CHART_HTML: &str = r##"
        <div id="results-os-chart"></div>
        <p>Cash position</p>
        <p>The company has <strong>7.1 months</strong> of cash left based on quarterly cash burn of
           <strong>-$3.4M</strong> and estimated current cash of <strong>$8.0M.</strong></p>
        <div class="results-cash-bar-chart">
          <svg>
            <g class="yAxis">
              <g class="recharts-cartesian-axis-tick"><text height="150"><tspan>-5</tspan></text></g>
              <g class="recharts-cartesian-axis-tick"><text height="150"><tspan>10</tspan></text></g>
            </g>
            <g>
              <g class="recharts-layer"><path name="09/30/2023" height="30"></path></g>
              <g class="recharts-layer"><path name="12/31/2023" height="60"></path></g>
              <g class="recharts-layer"><path name="Est" height="45"></path></g>
            </g>
            <path name="OpCF" fill="none" height="70"></path>
            <path name="OpCF" fill="#e74c3c" height="20"></path>
            <path name="Cap Raise" fill="#2ecc71" height="15"></path>
          </svg>
        </div>
    "##;

    #[test]
    fn test_historical_columns_and_segments() {
        let mut s = page(OS_CHART_HTML);
        let r = s.historical().unwrap();

        let values: Vec<(usize, f64)> = r.columns.iter().map(|c| (c.position, c.value)).collect();
        assert_eq!(values, vec![(0, 20.0), (2, 40.0), (3, 50.0)]);
        assert_eq!(r.columns[2].date, fixed_now());
        assert_eq!(r.atm, Some(4.0));
        assert_eq!(r.convertible_note, Some(10.0));
        assert_eq!(r.warrant, None);
        assert_eq!(r.s1_offering, None);
    }

    #[test]
    fn test_historical_without_axis_fails() {
        let mut s = page(r#"<div id="results-os-chart"></div>"#);
        assert!(matches!(s.historical(), Err(ScrapeError::Calibration(_))));
    }

    #[test]
    fn test_cash_uses_full_axis_span() {
        let mut s = page(CASH_CHART_HTML);
        let r = s.cash().unwrap();

        // Reference is 10 + |-5| = 15 over 150px.
        let values: Vec<f64> = r.columns.iter().map(|c| c.value).collect();
        assert_eq!(values, vec![3.0, 6.0, 4.5]);
        assert_eq!(r.prorated_operating, Some(2.0));
        assert_eq!(r.capital_raise, Some(1.5));
        assert_eq!(r.current_cash_estimate, None);
        assert!(r.cash_description.starts_with("The company has 7.1 months"));
        assert_eq!(r.figures.months_of_cash, Some(7.1));
        assert_eq!(r.figures.quarterly_cash_burn_m, Some(3.4));
        assert_eq!(r.figures.current_cash_m, Some(8.0));
        assert_eq!(r.figures.m, None);
    }

    #[test]
    fn test_cash_sentence_strategy_keeps_sign() {
        let settings = SectionSettings {
            cash_description: CashDescriptionStrategy::Numbers,
            ..SectionSettings::default()
        };
        let html = format!("<html><body>{CASH_CHART_HTML}</body></html>");
        let driver = SnapshotDriver::from_html(COMPANY_URL, &html);
        let mut s = scraper(driver);
        s.settings = settings;

        let r = s.cash().unwrap();
        assert_eq!(r.figures.months_of_cash, Some(7.1));
        assert_eq!(r.figures.quarterly_cash_burn_m, Some(-3.4));
        assert_eq!(r.figures.current_cash_m, Some(8.0));
    }
}
