use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use tracing::warn;

use super::error::{Result, ScrapeError};
use crate::models::CashFigures;

/// Characters never allowed through into stored text.
const QUOTE_CHARS: [char; 3] = ['\\', '\'', '"'];

/// Decorations around numeric table cells.
const NUMERIC_NOISE: [char; 3] = [',', '%', '$'];

/// Decorations around the `<strong>` figures of the cash description.
const CASH_LABEL_NOISE: [&str; 4] = [" months", "-", "$", "M"];

static SIGNED_DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\$?\d[\d,]*(?:\.\d+)?").expect("valid decimal pattern"));

// ── Text ──────────────────────────────────────────────────────────────────────

pub fn strip_chars(text: &str, chars: &[&str]) -> String {
    chars
        .iter()
        .fold(text.to_string(), |acc, c| acc.replace(c, ""))
}

pub fn strip_quotes(text: &str) -> String {
    text.chars().filter(|c| !QUOTE_CHARS.contains(c)).collect()
}

/// Header counter value → bare figure in millions: "$12.5M" → "12.5",
/// "$1.2B" → "1200", "$850K" → "0.85". Figures without a magnitude suffix
/// ("8.1%", "$0.45") keep their digits as written.
pub fn clean_figure(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| !NUMERIC_NOISE.contains(c))
        .collect();
    let stripped = stripped.trim();
    let digits: String = stripped
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    let scale = match stripped[digits.len()..].trim_start().chars().next() {
        Some('k') => 1e-3,
        Some('b') => 1e3,
        Some('t') => 1e6,
        _ => return digits,
    };
    match digits.parse::<f64>() {
        Ok(value) => format!("{}", (value * scale * 1e6).round() / 1e6),
        Err(_) => digits,
    }
}

// ── Numbers ───────────────────────────────────────────────────────────────────

fn numeric_text(raw: &str) -> String {
    raw.chars()
        .filter(|c| !NUMERIC_NOISE.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Strict float coercion for a declared numeric field.
pub fn parse_float(field: &str, raw: &str) -> Result<f64> {
    numeric_text(raw).parse().map_err(|_| ScrapeError::Numeric {
        field: field.to_string(),
        raw: raw.to_string(),
    })
}

/// Strict integer coercion; whole-valued decimals ("1200.0") are accepted.
pub fn parse_int(field: &str, raw: &str) -> Result<i64> {
    let text = numeric_text(raw);
    if let Ok(v) = text.parse::<i64>() {
        return Ok(v);
    }
    match text.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 => Ok(v as i64),
        _ => Err(ScrapeError::Numeric {
            field: field.to_string(),
            raw: raw.to_string(),
        }),
    }
}

// ── Dates ─────────────────────────────────────────────────────────────────────

/// Parse with a strftime format; date-only formats land on midnight.
pub fn parse_datetime(field: &str, raw: &str, format: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, format)
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, format)
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
        })
        .map_err(|_| ScrapeError::Date {
            field: field.to_string(),
            raw: raw.to_string(),
            format: format.to_string(),
        })
}

// ── Cash description ──────────────────────────────────────────────────────────

/// Figures from the `<strong>` children of the description, in page order:
/// months of cash, quarterly burn, current cash.
pub fn cash_figures_from_labels(items: &[String]) -> CashFigures {
    let cleaned: Vec<String> = items
        .iter()
        .map(|item| strip_chars(item, &CASH_LABEL_NOISE))
        .map(|item| {
            item.trim()
                .trim_end_matches(|c: char| !c.is_ascii_digit())
                .to_string()
        })
        .collect();
    let values: Vec<Option<f64>> = cleaned.iter().map(|v| v.parse().ok()).collect();

    match values.as_slice() {
        [Some(months), Some(burn), Some(cash)] => CashFigures {
            months_of_cash: Some(*months),
            quarterly_cash_burn_m: Some(*burn),
            current_cash_m: Some(*cash),
            m: None,
        },
        [Some(m)] => CashFigures {
            m: Some(*m),
            ..Default::default()
        },
        _ => {
            warn!(
                "Cash description has {} usable figures ({:?}), leaving them empty",
                values.len(),
                items
            );
            CashFigures::default()
        }
    }
}

/// Figures from every signed decimal in the sentence. With three numbers, the
/// one followed by "month" is the runway and the one shortly after "burn" is
/// the burn; whatever is left fills the remaining slots in sentence order.
pub fn cash_figures_from_sentence(sentence: &str) -> CashFigures {
    let lower = sentence.to_ascii_lowercase();
    let tokens: Vec<(usize, usize, f64)> = SIGNED_DECIMAL
        .find_iter(sentence)
        .filter_map(|m| {
            let value = m.as_str().replace(['$', ','], "").parse().ok()?;
            Some((m.start(), m.end(), value))
        })
        .collect();

    match tokens.as_slice() {
        [(_, _, m)] => CashFigures {
            m: Some(*m),
            ..Default::default()
        },
        [_, _, _] => {
            let mut months = None;
            let mut burn = None;
            let mut rest = Vec::new();
            for &(start, end, value) in &tokens {
                let after = lower[end..].trim_start();
                let burn_near = lower[..start]
                    .rfind("burn")
                    .is_some_and(|at| start - at <= 24);
                if months.is_none() && after.starts_with("month") {
                    months = Some(value);
                } else if burn.is_none() && burn_near {
                    burn = Some(value);
                } else {
                    rest.push(value);
                }
            }
            let mut rest = rest.into_iter();
            let months = months.or_else(|| rest.next());
            let burn = burn.or_else(|| rest.next());
            CashFigures {
                months_of_cash: months,
                quarterly_cash_burn_m: burn,
                current_cash_m: rest.next(),
                m: None,
            }
        }
        _ => {
            warn!(
                "Cash description has {} numbers, expected 1 or 3: {:?}",
                tokens.len(),
                sentence
            );
            CashFigures::default()
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
