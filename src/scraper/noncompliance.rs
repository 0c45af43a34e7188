//! Exchange list of companies out of compliance with listing rules.

use tracing::{debug, info};

use super::cleaner::parse_datetime;
use super::error::Result;
use super::DilutionScraper;
use crate::driver::PageDriver;
use crate::models::NonComplianceRecord;

const SHOW_ALL: &str = r#"th [type="button"]"#;
const ROWS: &str = ".rgMasterTable tbody tr";
const COMPANY: &str = r#"td[colspan="4"] p"#;
const TICKER: &str = "td:nth-child(2)";
const DEFICIENCY: &str = "td:nth-child(3)";
const MARKET: &str = "td:nth-child(4)";
const NOTIFIED: &str = "td:nth-child(5)";
const NOTIFIED_FORMAT: &str = "%m/%d/%Y";

impl<D: PageDriver> DilutionScraper<D> {
    /// Deficiency notices for `ticker`. The table groups detail rows under a
    /// company-name row, so the current company is carried down the scan.
    pub fn noncompliance(&mut self, ticker: &str) -> Result<Vec<NonComplianceRecord>> {
        let url = self.noncompliant_url.clone();
        self.driver.navigate(&url)?;
        self.driver.wait_for_stable_render();
        self.click_optional(SHOW_ALL, true)?;

        let wanted = ticker.trim().to_lowercase();
        let total = self.driver.count(ROWS)?;
        debug!("{} non-compliance rows", total);

        let mut company = String::new();
        let mut data = Vec::new();
        for nth in 1..=total {
            let row = format!("{ROWS}:nth-child({nth})");

            let heading = self.driver.read_text(&format!("{row} {COMPANY}"))?;
            if !heading.is_empty() {
                company = heading;
                continue;
            }

            let row_ticker = self.driver.read_text(&format!("{row} {TICKER}"))?;
            if row_ticker.trim().to_lowercase() != wanted {
                continue;
            }

            let notified = self.driver.read_text(&format!("{row} {NOTIFIED}"))?;
            data.push(NonComplianceRecord {
                company: company.clone(),
                ticker: row_ticker,
                deficiency: self.driver.read_text(&format!("{row} {DEFICIENCY}"))?,
                market: self.driver.read_text(&format!("{row} {MARKET}"))?,
                notification_date: parse_datetime("notification date", &notified, NOTIFIED_FORMAT)?,
            });
        }

        info!("Non-compliance: {} rows for {}", data.len(), ticker);
        Ok(data)
    }
}
