//! Pixel geometry → chart values.
//!
//! Bars carry no data attributes, only their rendered height. The y-axis top
//! tick gives one calibration point (its pixel height and its label), and the
//! axis is assumed linear through zero.

use super::cleaner::parse_float;
use super::error::{Result, ScrapeError};
use crate::driver::PageDriver;

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// `round(pixel_height * axis_max_value / axis_pixel_height, 2)`
pub fn decode(pixel_height: f64, axis_pixel_height: u32, axis_max_value: f64) -> f64 {
    round2(pixel_height * axis_max_value / f64::from(axis_pixel_height))
}

/// Calibration of one chart's y-axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisScale {
    pub pixel_height: u32,
    /// Value spanned by `pixel_height`.
    pub reference: f64,
}

impl AxisScale {
    pub fn zero_based(pixel_height: u32, max_value: f64) -> Self {
        Self {
            pixel_height,
            reference: max_value,
        }
    }

    /// Axis with a negative floor: the full span is the reference range.
    pub fn spanning(pixel_height: u32, max_value: f64, min_value: f64) -> Self {
        Self {
            pixel_height,
            reference: max_value + min_value.abs(),
        }
    }

    pub fn decode(&self, pixel_height: f64) -> f64 {
        decode(pixel_height, self.pixel_height, self.reference)
    }

    /// Read the axis from the page. `height_selector` is the top tick's
    /// `<text>` (its `height` attribute), the value selectors its `<tspan>`s.
    pub fn read<D: PageDriver + ?Sized>(
        driver: &D,
        height_selector: &str,
        max_selector: &str,
        min_selector: Option<&str>,
    ) -> Result<Self> {
        let height = driver
            .read_attribute(height_selector, "height")?
            .ok_or_else(|| ScrapeError::Calibration(height_selector.to_string()))?;
        let pixel_height = parse_float("axis height", &height)?.round() as u32;

        let max_value = read_tick(driver, max_selector)?;
        match min_selector {
            Some(min_selector) => {
                let min_value = read_tick(driver, min_selector)?;
                Ok(Self::spanning(pixel_height, max_value, min_value))
            }
            None => Ok(Self::zero_based(pixel_height, max_value)),
        }
    }
}

fn read_tick<D: PageDriver + ?Sized>(driver: &D, selector: &str) -> Result<f64> {
    let label = driver.read_text(selector)?;
    if label.is_empty() {
        return Err(ScrapeError::Calibration(selector.to_string()));
    }
    parse_float("axis tick", &label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::SnapshotDriver;

    #[test]
    fn test_decode_is_linear() {
        assert_eq!(decode(0.0, 200, 80.0), 0.0);
        assert_eq!(decode(50.0, 200, 80.0), 20.0);
        assert_eq!(decode(100.0, 200, 80.0), 2.0 * decode(50.0, 200, 80.0));
        assert_eq!(decode(33.3, 100, 1.0), 0.33);
        assert_eq!(decode(12.345, 150, 45.5), 3.74);
    }

    #[test]
    fn test_spanning_scale() {
        let scale = AxisScale::spanning(200, 30.0, -10.0);
        assert_eq!(scale.reference, 40.0);
        assert_eq!(scale.decode(50.0), 10.0);
    }

    #[test]
    fn test_read_axis() {
        let html = r#"<svg><g class="yAxis">
            <g class="recharts-cartesian-axis-tick"><text height="160"><tspan>-20</tspan></text></g>
            <g class="recharts-cartesian-axis-tick"><text height="160"><tspan>60</tspan></text></g>
        </g></svg>"#;
        let d = SnapshotDriver::from_html("https://example.test/", html);
        let tick = ".yAxis .recharts-cartesian-axis-tick";
        let scale = AxisScale::read(
            &d,
            &format!("{tick}:last-child > text"),
            &format!("{tick}:last-child > text tspan"),
            Some(&format!("{tick}:first-child > text tspan")),
        )
        .unwrap();
        assert_eq!(scale, AxisScale::spanning(160, 60.0, -20.0));

        let missing = AxisScale::read(&d, ".nope", ".nope", None);
        assert!(matches!(missing, Err(ScrapeError::Calibration(_))));
    }
}
