//! Detail cards, completed offerings, news and institutional holders.

use tracing::{debug, info};

use super::error::{Result, ScrapeError};
use super::table::{Column, ColumnKind, RowWindow, extract_rows};
use super::DilutionScraper;
use crate::driver::PageDriver;
use crate::models::{ExtraRecord, HolderRecord, NewsRecord, OfferingRecord};

const CONTENT_SECTIONS: &str = "#dashContentWrapper > div";
const EXTRAS_CLASS: &str = ".my-3";

const OFFERING_ROWS: &str = "#stickyTableHeadingExtraTopWhite + table tbody tr";
const OFFERING_COLUMNS: [Column; 9] = [
    Column::new("type", "td:nth-child(1)", ColumnKind::Text),
    Column::new("method", "td:nth-child(2)", ColumnKind::Text),
    Column::new("share_equivalent", "td:nth-child(3)", ColumnKind::Integer),
    Column::new("price", "td:nth-child(4)", ColumnKind::Float),
    Column::new("warrants", "td:nth-child(5)", ColumnKind::Integer),
    Column::new("offering_amt", "td:nth-child(6)", ColumnKind::Integer),
    Column::new("bank", "td:nth-child(7)", ColumnKind::Text),
    Column::new("investors", "td:nth-child(8)", ColumnKind::Text),
    Column::new("date", "td:nth-child(9)", ColumnKind::Date("%Y-%m-%d %H:%M")),
];

const NEWS_TAB: &str = "#result-tab-news";
const NEWS_ROWS: &str = ".mb-5:last-child .my-2";
const NEWS_COLUMNS: [Column; 4] = [
    Column::new("time_ago", "span:nth-child(1)", ColumnKind::Text),
    Column::new("datetime", "span:nth-child(3)", ColumnKind::Date("%m/%d/%Y, %I:%M:%S %p")),
    Column::new("headline", "a", ColumnKind::Text),
    Column::new("link", "a", ColumnKind::Link),
];

const HOLDERS_TAB: &str = "#result-tab-inst-own";
const HOLDER_ROWS: &str = ".instOwnTable tbody tr";
const HOLDER_COLUMNS: [Column; 7] = [
    Column::new("institution_name", "td:nth-child(1)", ColumnKind::Text),
    Column::new("percentage", "td:nth-child(2)", ColumnKind::Float),
    Column::new("shares", "td:nth-child(3)", ColumnKind::Integer),
    Column::new("change", "td:nth-child(4)", ColumnKind::Float),
    Column::new("form", "td:nth-child(5)", ColumnKind::Text),
    Column::new("effective", "td:nth-child(6)", ColumnKind::Date("%Y/%m/%d")),
    Column::new("filed", "td:nth-child(7)", ColumnKind::Date("%Y/%m/%d")),
];

/// "3 hours ago" → (3, "hours")
fn split_time_ago(raw: &str) -> Result<(i64, String)> {
    let mut parts = raw.split_whitespace();
    let number = parts.next().and_then(|n| n.parse().ok());
    let label = parts.next();
    match (number, label) {
        (Some(number), Some(label)) => Ok((number, label.to_string())),
        _ => Err(ScrapeError::TimeAgo(raw.to_string())),
    }
}

impl<D: PageDriver> DilutionScraper<D> {
    /// Label/value lines of every card in the detail sections (warrants,
    /// convertibles, shelves...), which follow the summary blocks.
    pub fn extras(&mut self) -> Result<Vec<ExtraRecord>> {
        let sections = self.driver.count(CONTENT_SECTIONS)?;
        let mut first = None;
        for i in 1..=sections {
            if self
                .driver
                .count(&format!("{CONTENT_SECTIONS}:nth-child({i}){EXTRAS_CLASS}"))?
                > 0
            {
                first = Some(i);
                break;
            }
        }
        let Some(first) = first else {
            debug!("No detail sections on the page");
            return Ok(Vec::new());
        };

        let count = self
            .driver
            .count(&format!("{CONTENT_SECTIONS}{EXTRAS_CLASS}"))?;
        let mut data = Vec::new();
        for nth in first..first + count {
            let section = format!("{CONTENT_SECTIONS}:nth-child({nth})");
            let origin = self
                .driver
                .read_text(&format!("{section} .heading-filing-category"))?;

            let cards = format!("{section} .card");
            for card_index in 0..self.driver.count(&cards)? {
                let card = format!("{cards}:nth-child({})", card_index + 1);
                let name = self.driver.read_text(&format!("{card} h5"))?;
                let status = self.driver.read_text(&format!("{card} .opacity-7"))?;

                let lines = format!("{card} ul > li");
                for line in 1..=self.driver.count(&lines)? {
                    let line = format!("{lines}:nth-child({line})");
                    data.push(ExtraRecord {
                        origin: origin.clone(),
                        status: status.clone(),
                        name: name.clone(),
                        title: self.driver.read_text(&format!("{line} span:first-child"))?,
                        value: self.driver.read_text(&format!("{line} span:last-child"))?,
                        position: card_index + 1,
                    });
                }
            }
        }

        info!("Extras: {} lines", data.len());
        Ok(data)
    }

    pub fn offerings(&mut self) -> Result<Vec<OfferingRecord>> {
        let rows = extract_rows(&self.driver, OFFERING_ROWS, &OFFERING_COLUMNS, RowWindow::default())?;
        let data: Vec<OfferingRecord> = rows
            .into_iter()
            .map(|row| OfferingRecord {
                offering_type: row.text("type"),
                method: row.text("method"),
                share_equivalent: row.integer("share_equivalent"),
                price: row.float("price"),
                warrants: row.integer("warrants"),
                offering_amt: row.integer("offering_amt"),
                bank: row.text("bank"),
                investors: row.text("investors"),
                date: row.date("date"),
            })
            .collect();
        info!("Offerings: {} rows", data.len());
        Ok(data)
    }

    /// Latest headlines from the news tab, bounded by the configured window.
    pub fn news(&mut self) -> Result<Vec<NewsRecord>> {
        self.open_tab(NEWS_TAB)?;
        let rows = extract_rows(&self.driver, NEWS_ROWS, &NEWS_COLUMNS, self.settings.news_window)?;

        let mut data = Vec::with_capacity(rows.len());
        for row in rows {
            let (time_ago_number, time_ago_label) = match row.text("time_ago") {
                Some(raw) => {
                    let (n, label) = split_time_ago(&raw)?;
                    (Some(n), Some(label))
                }
                None => (None, None),
            };
            data.push(NewsRecord {
                time_ago_number,
                time_ago_label,
                datetime: row.date("datetime"),
                headline: row.text("headline"),
                link: row.text("link"),
            });
        }
        info!("News: {} rows", data.len());
        Ok(data)
    }

    pub fn holders(&mut self) -> Result<Vec<HolderRecord>> {
        self.open_tab(HOLDERS_TAB)?;
        let rows = extract_rows(&self.driver, HOLDER_ROWS, &HOLDER_COLUMNS, RowWindow::default())?;
        let data: Vec<HolderRecord> = rows
            .into_iter()
            .map(|row| HolderRecord {
                institution_name: row.text("institution_name"),
                percentage: row.float("percentage"),
                shares: row.integer("shares"),
                change: row.float("change"),
                form: row.text("form"),
                effective: row.date("effective"),
                filed: row.date("filed"),
            })
            .collect();
        info!("Holders: {} rows", data.len());
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::snapshot::DriverEvent;
    use crate::scraper::fixtures::page;
    use chrono::NaiveDate;

    const DETAILS: &str = r#"
        <div id="dashContentWrapper">
          <div class="summary">header</div>
          <div class="summary">ratings</div>
          <div class="my-3">
            <div class="heading-filing-category">Warrants</div>
            <div class="cards">
              <div class="card">
                <h5>June 2023 Warrants</h5><span class="opacity-7">Registered</span>
                <ul>
                  <li><span>Remaining</span><span>4.5M</span></li>
                  <li><span>Exercise Price</span><span>$1.25</span></li>
                </ul>
              </div>
              <div class="card">
                <h5>Pre-funded</h5><span class="opacity-7">Pending</span>
                <ul><li><span>Remaining</span><span>0.8M</span></li></ul>
              </div>
            </div>
          </div>
          <div class="my-3">
            <div class="heading-filing-category">Shelf</div>
            <div class="cards">
              <div class="card">
                <h5>S-3</h5><span class="opacity-7">Effective</span>
                <ul><li><span>Capacity</span><span>$100M</span></li></ul>
              </div>
            </div>
          </div>
        </div>
    "#;

    #[test]
    fn test_extras_walk_sections_cards_and_lines() {
        let mut s = page(DETAILS);
        let extras = s.extras().unwrap();

        assert_eq!(extras.len(), 4);
        assert_eq!(
            extras[1],
            ExtraRecord {
                origin: "Warrants".into(),
                status: "Registered".into(),
                name: "June 2023 Warrants".into(),
                title: "Exercise Price".into(),
                value: "$1.25".into(),
                position: 1,
            }
        );
        assert_eq!(extras[2].name, "Pre-funded");
        assert_eq!(extras[2].position, 2);
        assert_eq!(extras[3].origin, "Shelf");
        assert_eq!(extras[3].position, 1);
    }

    #[test]
    fn test_extras_absent() {
        let mut s = page(r#"<div id="dashContentWrapper"><div>only</div></div>"#);
        assert!(s.extras().unwrap().is_empty());
    }

    #[test]
    fn test_offerings_typed_columns() {
        let mut s = page(
            r#"<div id="stickyTableHeadingExtraTopWhite"></div>
               <table><tbody>
                 <tr><td>Registered Direct</td><td>Direct</td><td>2,500,000</td><td>$1.10</td>
                     <td>2,500,000</td><td>2,750,000</td><td>H.C. Wainwright</td><td></td>
                     <td>2024-01-15 08:30</td></tr>
               </tbody></table>"#,
        );
        let rows = s.offerings().unwrap();
        assert_eq!(rows.len(), 1);
        let o = &rows[0];
        assert_eq!(o.offering_type.as_deref(), Some("Registered Direct"));
        assert_eq!(o.share_equivalent, Some(2_500_000));
        assert_eq!(o.price, Some(1.10));
        assert_eq!(o.offering_amt, Some(2_750_000));
        assert_eq!(o.investors, None);
        assert_eq!(
            o.date,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(8, 30, 0)
        );
    }

    fn news_page(items: usize) -> String {
        let rows: String = (1..=items)
            .map(|i| {
                format!(
                    r#"<div class="my-2"><span>{i} hours ago</span><span>|</span>
                       <span>03/20/2024, 0{}:15:00 AM</span>
                       <a href="https://news.test/{i}">Headline {i}</a></div>"#,
                    i % 10
                )
            })
            .collect();
        format!(
            r#"<div id="result-tab-news"></div>
               <div class="tab"><div class="mb-5">old</div><div class="mb-5">{rows}</div></div>"#
        )
    }

    #[test]
    fn test_news_window_and_time_ago() {
        let mut s = page(&news_page(9));
        let news = s.news().unwrap();

        // Rows 2..7 of 9.
        assert_eq!(news.len(), 5);
        assert_eq!(news[0].time_ago_number, Some(2));
        assert_eq!(news[0].time_ago_label.as_deref(), Some("hours"));
        assert_eq!(news[0].headline.as_deref(), Some("Headline 2"));
        assert_eq!(news[0].link.as_deref(), Some("https://news.test/2"));
        assert_eq!(
            news[0].datetime,
            NaiveDate::from_ymd_opt(2024, 3, 20).unwrap().and_hms_opt(2, 15, 0)
        );
        assert_eq!(news[4].headline.as_deref(), Some("Headline 6"));
        assert_eq!(
            s.driver().events().first(),
            Some(&DriverEvent::Click(NEWS_TAB.to_string()))
        );
    }

    #[test]
    fn test_news_bad_time_ago() {
        assert!(matches!(split_time_ago("yesterday"), Err(ScrapeError::TimeAgo(_))));
        assert_eq!(split_time_ago("1 day ago").unwrap(), (1, "day".to_string()));
    }

    #[test]
    fn test_holders() {
        let mut s = page(
            r#"<div id="result-tab-inst-own"></div>
               <table class="instOwnTable"><tbody>
                 <tr><td>Vanguard Group</td><td>4.2%</td><td>1,200,000</td><td>-3.5%</td>
                     <td>13F</td><td>2023/12/31</td><td>2024/02/14</td></tr>
                 <tr><td>O'Shea "Capital"</td><td>1.1</td><td>300,000</td><td></td>
                     <td>13G</td><td>2023/12/31</td><td></td></tr>
               </tbody></table>"#,
        );
        let holders = s.holders().unwrap();
        assert_eq!(holders.len(), 2);
        assert_eq!(holders[0].percentage, Some(4.2));
        assert_eq!(holders[0].shares, Some(1_200_000));
        assert_eq!(holders[0].change, Some(-3.5));
        assert_eq!(
            holders[0].filed,
            NaiveDate::from_ymd_opt(2024, 2, 14).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(holders[1].institution_name.as_deref(), Some("OShea Capital"));
        assert_eq!(holders[1].change, None);
        assert_eq!(holders[1].filed, None);
    }
}
