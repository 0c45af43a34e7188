//! Recent SEC filings from the filings tab.
//!
//! Filing rows only expose their document URL through a click that opens a
//! new browser tab, so each kept row costs one tab round trip.

use chrono::Duration;
use tracing::{debug, info, warn};

use super::cleaner::parse_datetime;
use super::error::Result;
use super::DilutionScraper;
use crate::driver::{DriverError, PageDriver};
use crate::models::FilingRecord;

const FILINGS_TAB: &str = "#result-tab-filings";
const FETCH_MORE: &str = ".secFilingFetchMoreRow";
const ROWS: &str =
    ".row > div:first-child .secFilingResultSingleContainer:first-child .secFilingTableWrapper > div";
const FORM: &str = ".secFilingFormType";
const HEADLINE: &str = ".secFilingDescription";
const FILED_AT: &str = ".secFilingFiledAt";
const FILED_AT_FORMAT: &str = "%m/%d/%y";

/// A tab opened by clicking a link. Dropping it closes every tab beyond the
/// first and puts focus back on the first tab, whatever happened in between.
struct SecondaryTab<'a, D: PageDriver> {
    driver: &'a mut D,
    focused: bool,
}

impl<'a, D: PageDriver> SecondaryTab<'a, D> {
    fn open(driver: &'a mut D, selector: &str) -> Result<Self> {
        driver.click_via_script(selector)?;
        driver.wait_for_stable_render();
        let mut tab = Self {
            driver,
            focused: false,
        };
        tab.driver.switch_tab(1)?;
        tab.focused = true;
        Ok(tab)
    }

    fn url(&self) -> Result<String> {
        Ok(self.driver.current_url()?)
    }

    /// Close tabs that opened without ever taking focus, last first.
    fn close_unfocused(&mut self) -> std::result::Result<(), DriverError> {
        let open = self.driver.tab_count()?;
        for index in (1..open).rev() {
            self.driver.switch_tab(index)?;
            self.driver.close_current_tab()?;
        }
        Ok(())
    }
}

impl<D: PageDriver> Drop for SecondaryTab<'_, D> {
    fn drop(&mut self) {
        if self.focused {
            if let Err(e) = self.driver.close_current_tab() {
                warn!("Failed to close secondary tab: {}", e);
            }
        }
        if let Err(e) = self.close_unfocused() {
            warn!("Failed to close a stray tab: {}", e);
        }
        if let Err(e) = self.driver.switch_tab(0) {
            warn!("Failed to refocus the main tab: {}", e);
        }
    }
}

impl<D: PageDriver> DilutionScraper<D> {
    /// Filings from the last `filings_window_days` days. Rows are listed
    /// newest first; the first older row ends the scan.
    pub fn filings(&mut self) -> Result<Vec<FilingRecord>> {
        self.open_tab(FILINGS_TAB)?;

        for _ in 0..self.settings.fetch_more_clicks {
            if self.driver.count(FETCH_MORE)? == 0 {
                break;
            }
            self.click_optional(FETCH_MORE, true)?;
        }

        let cutoff = self.now() - Duration::days(self.settings.filings_window_days);
        let total = self.driver.count(ROWS)?;
        debug!("{} filing rows, cutoff {}", total, cutoff);

        let mut data = Vec::new();
        for nth in 1..=total {
            let row = format!("{ROWS}:nth-child({nth})");
            let raw_date = self.driver.read_text(&format!("{row} {FILED_AT}"))?;
            let date = parse_datetime("filed at", &raw_date, FILED_AT_FORMAT)?;
            if date < cutoff {
                debug!("Filing row {} dated {} is outside the window", nth, date);
                break;
            }

            let name = self.driver.read_text(&format!("{row} {FORM}"))?;
            let headline = self.driver.read_text(&format!("{row} {HEADLINE}"))?;
            let link = {
                let tab = SecondaryTab::open(&mut self.driver, &format!("{row} > div"))?;
                tab.url()?
            };

            data.push(FilingRecord {
                name,
                headline,
                date,
                link,
            });
        }

        info!("Filings: {} rows", data.len());
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::SnapshotDriver;
    use crate::driver::snapshot::DriverEvent;
    use crate::scraper::fixtures::{COMPANY_URL, fixed_now, page, scraper};
    use crate::scraper::error::ScrapeError;

    fn filing_row(days_ago: i64, form: &str) -> String {
        let filed = (fixed_now() - Duration::days(days_ago)).format("%m/%d/%y");
        format!(
            r#"<div><div data-href="https://sec.test/{form}-{days_ago}">
                 <span class="secFilingFormType">{form}</span>
                 <span class="secFilingDescription">{form} filed</span>
                 <span class="secFilingFiledAt">{filed}</span>
               </div></div>"#
        )
    }

    fn filings_page(rows: &[(i64, &str)]) -> String {
        let rows: String = rows.iter().map(|(d, f)| filing_row(*d, f)).collect();
        format!(
            r#"<div id="result-tab-filings"></div>
               <div class="row">
                 <div><div class="secFilingResultSingleContainer">
                   <div class="secFilingTableWrapper">{rows}</div>
                 </div></div>
                 <div><div class="secFilingResultSingleContainer">other list</div></div>
               </div>"#
        )
    }

    fn count(events: &[DriverEvent], f: impl Fn(&DriverEvent) -> bool) -> usize {
        events.iter().filter(|e| f(e)).count()
    }

    #[test]
    fn test_window_stops_at_first_old_row() {
        let mut s = page(&filings_page(&[(0, "8-K"), (5, "S-3"), (12, "10-Q"), (20, "4")]));
        let filings = s.filings().unwrap();

        assert_eq!(filings.len(), 2);
        assert_eq!(filings[0].name, "8-K");
        assert_eq!(filings[0].link, "https://sec.test/8-K-0");
        assert_eq!(filings[1].headline, "S-3 filed");
        assert_eq!(filings[1].link, "https://sec.test/S-3-5");

        let events = s.driver().events();
        assert_eq!(count(events, |e| matches!(e, DriverEvent::TabOpened(_))), 2);
        assert_eq!(count(events, |e| matches!(e, DriverEvent::TabClosed(_))), 2);
        assert_eq!(s.driver().tab_count().unwrap(), 1);
        assert_eq!(s.driver().current_url().unwrap(), COMPANY_URL);
    }

    #[test]
    fn test_fetch_more_clicked_while_present() {
        let html = format!(
            r#"<html><body>{}<div class="secFilingFetchMoreRow">more</div></body></html>"#,
            filings_page(&[(1, "8-K")])
        );
        let mut s = scraper(SnapshotDriver::from_html(COMPANY_URL, &html));
        s.filings().unwrap();
        let clicks = count(s.driver().events(), |e| {
            matches!(e, DriverEvent::ScriptClick(sel) if sel == FETCH_MORE)
        });
        assert_eq!(clicks, 4);
    }

    #[test]
    fn test_tab_released_when_focus_fails() {
        // Row link opens no tab, so switching to tab 1 fails.
        let html = filings_page(&[(0, "8-K")]).replace("data-href", "data-x");
        let mut s = page(&html);
        let err = s.filings().unwrap_err();
        assert!(matches!(err, ScrapeError::Driver(_)));
        assert_eq!(s.driver().events().last(), Some(&DriverEvent::TabSwitched(0)));
        assert_eq!(s.driver().tab_count().unwrap(), 1);
    }

    /// Opens tabs like the dashboard does but reports the first new tab
    /// late, as a slow browser would.
    struct LateTabDriver {
        inner: SnapshotDriver,
        late: bool,
    }

    impl PageDriver for LateTabDriver {
        fn navigate(&mut self, url: &str) -> std::result::Result<(), DriverError> {
            self.inner.navigate(url)
        }
        fn click(&mut self, selector: &str) -> std::result::Result<(), DriverError> {
            self.inner.click(selector)
        }
        fn click_via_script(&mut self, selector: &str) -> std::result::Result<(), DriverError> {
            self.inner.click_via_script(selector)
        }
        fn run_script(&mut self, script: &str) -> std::result::Result<(), DriverError> {
            self.inner.run_script(script)
        }
        fn read_text(&self, selector: &str) -> std::result::Result<String, DriverError> {
            self.inner.read_text(selector)
        }
        fn read_texts(&self, selector: &str) -> std::result::Result<Vec<String>, DriverError> {
            self.inner.read_texts(selector)
        }
        fn read_attribute(
            &self,
            selector: &str,
            name: &str,
        ) -> std::result::Result<Option<String>, DriverError> {
            self.inner.read_attribute(selector, name)
        }
        fn list_elements(
            &self,
            selector: &str,
        ) -> std::result::Result<Vec<crate::driver::ElementSnapshot>, DriverError> {
            self.inner.list_elements(selector)
        }
        fn wait_for_stable_render(&mut self) {
            self.inner.wait_for_stable_render()
        }
        fn tab_count(&self) -> std::result::Result<usize, DriverError> {
            self.inner.tab_count()
        }
        fn switch_tab(&mut self, index: usize) -> std::result::Result<(), DriverError> {
            if index > 0 && self.late {
                self.late = false;
                return Err(DriverError::TabNotFound(index));
            }
            self.inner.switch_tab(index)
        }
        fn close_current_tab(&mut self) -> std::result::Result<(), DriverError> {
            self.inner.close_current_tab()
        }
        fn current_url(&self) -> std::result::Result<String, DriverError> {
            self.inner.current_url()
        }
    }

    #[test]
    fn test_late_tab_is_closed() {
        let html = format!("<html><body>{}</body></html>", filings_page(&[(0, "8-K")]));
        let mut driver = LateTabDriver {
            inner: SnapshotDriver::from_html(COMPANY_URL, &html),
            late: true,
        };
        let row = format!("{ROWS}:nth-child(1) > div");

        let err = SecondaryTab::open(&mut driver, &row).err();
        assert!(matches!(err, Some(ScrapeError::Driver(DriverError::TabNotFound(1)))));

        let events = driver.inner.events();
        assert_eq!(
            count(events, |e| matches!(e, DriverEvent::TabClosed(url) if url == "https://sec.test/8-K-0")),
            1
        );
        assert_eq!(events.last(), Some(&DriverEvent::TabSwitched(0)));
        assert_eq!(driver.inner.tab_count().unwrap(), 1);
        assert_eq!(driver.inner.current_url().unwrap(), COMPANY_URL);
    }

    #[test]
    fn test_bad_filing_date() {
        let html = filings_page(&[(0, "8-K")]).replace("secFilingFiledAt\">", "secFilingFiledAt\">soon ");
        let mut s = page(&html);
        assert!(matches!(s.filings(), Err(ScrapeError::Date { .. })));
    }
}
