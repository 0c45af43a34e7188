//! Company header, dilution ratings and "our take" block.
//!
//! Header and rating blocks are lists of (label, value) span pairs whose order
//! changes between page versions, so values are routed by label keyword.

use tracing::{debug, info};

use super::cleaner::clean_figure;
use super::error::Result;
use super::gate::{Coverage, assess};
use super::DilutionScraper;
use crate::driver::PageDriver;
use crate::models::PremarketRecord;

const NOT_COVERED: &str = "#filingNotInCoverageIcon + div";
const NAME: &str = "h1";
const HEADER_TEXTS: &str = ".mw-1010:nth-child(1) .cursor-default > div";
const HEADER_COUNTERS: &str = r#".mw-1010:nth-child(2) [class="cursor-default"] > div"#;
const SHOW_MORE: &str = "#showMoreBtn";
const DESCRIPTION: &str = "#companyDesc > div";
const RATINGS: &str = ".dilutionRatingSingleWrapper";
const TAKES: &str = ".ourTakeSingleContainer";
const UPDATE_INFO: &str = "#results-os-chart > p:nth-child(2)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Sector,
    Industry,
    MktCap,
    FloatCap,
    EstCashPerShare,
    InstOwnership,
    ShortInterest,
    OverallRisk,
    OfferingAbility,
    DilutionAmount,
    Historical,
    CashNeed,
}

/// First keyword contained in the label wins.
const HEADER_TEXT_FIELDS: [(&str, Field); 2] =
    [("sector", Field::Sector), ("industry", Field::Industry)];

const HEADER_COUNTER_FIELDS: [(&str, Field); 5] = [
    ("mkt cap", Field::MktCap),
    ("float", Field::FloatCap),
    ("est", Field::EstCashPerShare),
    ("t25", Field::InstOwnership),
    ("si", Field::ShortInterest),
];

const RATING_FIELDS: [(&str, Field); 5] = [
    ("overall risk", Field::OverallRisk),
    ("offering ability", Field::OfferingAbility),
    ("overhead supply", Field::DilutionAmount),
    ("historical", Field::Historical),
    ("cash need", Field::CashNeed),
];

fn dispatch(table: &[(&str, Field)], label: &str) -> Option<Field> {
    let label = label.to_lowercase();
    table
        .iter()
        .find(|(keyword, _)| label.contains(keyword))
        .map(|(_, field)| *field)
}

impl Field {
    fn assign(self, record: &mut PremarketRecord, value: &str) {
        let value = value.to_lowercase();
        match self {
            Field::Sector => record.sector = Some(value),
            Field::Industry => record.industry = Some(value),
            Field::MktCap => record.mkt_cap = Some(clean_figure(&value)),
            Field::FloatCap => record.float_cap = Some(clean_figure(&value)),
            Field::EstCashPerShare => record.est_cash_sh = Some(clean_figure(&value)),
            Field::InstOwnership => record.t25_inst_own = Some(clean_figure(&value)),
            Field::ShortInterest => record.si = Some(clean_figure(&value)),
            Field::OverallRisk => record.overall_risk = Some(value),
            Field::OfferingAbility => record.offering_ability = Some(value),
            Field::DilutionAmount => record.dilution_amt_ex_shelf = Some(value),
            Field::Historical => record.historical = Some(value),
            Field::CashNeed => record.cash_need = Some(value),
        }
    }
}

impl<D: PageDriver> DilutionScraper<D> {
    /// Premarket summary, gated on the not-covered indicator.
    pub fn premarket(&mut self) -> Result<PremarketRecord> {
        let indicator = self.driver.read_text(NOT_COVERED)?;
        let caveat = match assess(&indicator) {
            Coverage::NotFound { indicator } => {
                info!("Not covered: {}", indicator);
                return Ok(PremarketRecord::not_found(indicator));
            }
            Coverage::Found { caveat } => caveat,
            Coverage::NotScraped | Coverage::Checked { .. } => None,
        };

        let mut record = PremarketRecord {
            found: true,
            dilution_data: caveat,
            name: Some(self.driver.read_text(NAME)?),
            ..Default::default()
        };

        self.read_pairs(HEADER_TEXTS, "> span", &HEADER_TEXT_FIELDS, &mut record)?;
        self.read_pairs(HEADER_COUNTERS, "> span", &HEADER_COUNTER_FIELDS, &mut record)?;

        self.click_optional(SHOW_MORE, false)?;
        record.description_company = Some(self.driver.read_text(DESCRIPTION)?);

        self.read_ratings(&mut record)?;
        record.our_take = Some(self.read_our_take()?);
        record.update_info = Some(self.driver.read_text(UPDATE_INFO)?);

        Ok(record)
    }

    /// Each block under `wrapper` holds a label span followed by a value span.
    fn read_pairs(
        &self,
        wrapper: &str,
        spans: &str,
        table: &[(&str, Field)],
        record: &mut PremarketRecord,
    ) -> Result<()> {
        let blocks = self.driver.count(wrapper)?;
        for i in 1..=blocks {
            let texts = self
                .driver
                .read_texts(&format!("{wrapper}:nth-child({i}) {spans}"))?;
            let [label, value, ..] = texts.as_slice() else {
                debug!("Header block {} of `{}` has no value span", i, wrapper);
                continue;
            };
            match dispatch(table, label) {
                Some(field) => field.assign(record, value),
                None => debug!("Unmapped header label {:?}", label),
            }
        }
        Ok(())
    }

    fn read_ratings(&self, record: &mut PremarketRecord) -> Result<()> {
        let ratings = self.driver.count(RATINGS)?;
        for i in 1..=ratings {
            let block = format!("{RATINGS}:nth-child({i})");
            let name = self.driver.read_text(&format!("{block} > span:first-child"))?;
            let info = self.driver.read_text(&format!("{block} > span:last-child"))?;
            if let Some(field) = dispatch(&RATING_FIELDS, &name) {
                field.assign(record, &info);
            }
        }
        Ok(())
    }

    /// One `"{datetime}  {text}"` line per take; the first child is a heading.
    fn read_our_take(&self) -> Result<String> {
        let takes = self.driver.count(TAKES)?;
        let mut lines = Vec::with_capacity(takes);
        for i in 0..takes {
            let block = format!("{TAKES}:nth-child({})", i + 2);
            let when = self.driver.read_text(&format!("{block} span:first-child"))?;
            let text = self.driver.read_text(&format!("{block} span:nth-child(2)"))?;
            lines.push(format!("{}  {}", when.to_lowercase(), text.to_lowercase()));
        }
        Ok(lines.join("\n").trim().to_string())
    }
}
