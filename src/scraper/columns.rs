//! Bar-series extraction from recharts bar groups.

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use super::cleaner::parse_float;
use super::error::Result;
use super::geometry::AxisScale;
use crate::driver::PageDriver;
use crate::models::SeriesSample;

const COLUMN_DATE_FORMAT: &str = "%m/%d/%Y";

/// Walk the bar groups matched by `wrapper` in document order and decode the
/// `column` shape inside each one.
///
/// Groups without a shape are gaps and are skipped; positions keep counting.
/// The first shape whose `name` is not a date is the chart's open, rightmost
/// column: it is stamped `now`, kept, and ends the series.
pub fn extract_columns<D: PageDriver + ?Sized>(
    driver: &D,
    wrapper: &str,
    column: &str,
    scale: &AxisScale,
    now: NaiveDateTime,
) -> Result<Vec<SeriesSample>> {
    let total = driver.count(wrapper)?;
    let mut samples = Vec::with_capacity(total);

    for position in 0..total {
        let selector = format!("{wrapper}:nth-child({}) {column}", position + 1);
        let Some(shape) = driver.list_elements(&selector)?.into_iter().next() else {
            continue;
        };

        let height = parse_float("column height", shape.attr("height").unwrap_or_default())?;
        let value = scale.decode(height);

        let name = shape.attr("name").unwrap_or_default();
        let (date, terminal) = match NaiveDate::parse_from_str(name.trim(), COLUMN_DATE_FORMAT) {
            Ok(d) => (d.and_hms_opt(0, 0, 0).unwrap_or(now), false),
            Err(_) => (now, true),
        };

        samples.push(SeriesSample {
            position,
            date,
            value,
        });

        if terminal {
            debug!("Series ends at column {} ({:?})", position, name);
            break;
        }
    }

    check_chronology(&samples);
    Ok(samples)
}

/// Storage keys series by position; a date running backwards is only reported.
fn check_chronology(samples: &[SeriesSample]) {
    for pair in samples.windows(2) {
        if pair[1].date < pair[0].date {
            warn!(
                "Column {} ({}) is dated before column {} ({})",
                pair[1].position, pair[1].date, pair[0].position, pair[0].date
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::SnapshotDriver;
    use crate::scraper::error::ScrapeError;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 20)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn chart(bars: &str) -> SnapshotDriver {
        let html = format!(r#"<svg><g class="bars">{bars}</g></svg>"#);
        SnapshotDriver::from_html("https://example.test/", &html)
    }

    const WRAPPER: &str = ".bars .bar";

    #[test]
    fn test_terminal_column_ends_series() {
        // The bar after the terminal one has a bogus height: reading it would fail.
        let d = chart(
            r#"<g class="bar"><path name="01/31/2024" height="50"></path></g>
               <g class="bar"><path name="02/29/2024" height="75"></path></g>
               <g class="bar"><path name="03/31/2024" height="100"></path></g>
               <g class="bar"><path name="Today" height="120"></path></g>
               <g class="bar"><path name="later" height="not-a-number"></path></g>"#,
        );
        let scale = AxisScale::zero_based(200, 40.0);
        let samples = extract_columns(&d, WRAPPER, "path", &scale, now()).unwrap();

        assert_eq!(samples.len(), 4);
        assert_eq!(samples[0].value, 10.0);
        assert_eq!(samples[2].value, 20.0);
        assert_eq!(
            samples[1].date,
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );
        let last = samples.last().unwrap();
        assert_eq!(last.date, now());
        assert_eq!(last.value, 24.0);
        assert_eq!(last.position, 3);
    }

    #[test]
    fn test_empty_group_keeps_positions() {
        let d = chart(
            r#"<g class="bar"><path name="01/31/2024" height="20"></path></g>
               <g class="bar"></g>
               <g class="bar"><path name="03/31/2024" height="40"></path></g>"#,
        );
        let scale = AxisScale::zero_based(100, 10.0);
        let samples = extract_columns(&d, WRAPPER, "path", &scale, now()).unwrap();

        let positions: Vec<usize> = samples.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![0, 2]);
        assert_eq!(samples[1].value, 4.0);
    }

    #[test]
    fn test_bad_height_is_fatal() {
        let d = chart(r#"<g class="bar"><path name="01/31/2024" height="tall"></path></g>"#);
        let scale = AxisScale::zero_based(100, 10.0);
        let err = extract_columns(&d, WRAPPER, "path", &scale, now()).unwrap_err();
        assert!(matches!(err, ScrapeError::Numeric { .. }));
    }
}
