//! Coverage check run on every freshly loaded company page.
//!
//! ```text
//! NotScraped --check(indicator)--> Checked --resolve--> NotFound   (indicator == NOT_INDEXED)
//!                                                   \-> Found      (anything else; non-empty text kept as caveat)
//! ```

/// Indicator text shown for tickers the site has never analysed.
pub const NOT_INDEXED: &str = "We haven't indexed this ticker yet";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coverage {
    NotScraped,
    Checked { indicator: Option<String> },
    NotFound { indicator: String },
    Found { caveat: Option<String> },
}

impl Coverage {
    /// Record the indicator text. Only valid from `NotScraped`.
    pub fn check(self, indicator_text: &str) -> Self {
        match self {
            Coverage::NotScraped => {
                let text = indicator_text.trim();
                Coverage::Checked {
                    indicator: (!text.is_empty()).then(|| text.to_string()),
                }
            }
            other => other,
        }
    }

    /// Decide the outcome. Only valid from `Checked`.
    pub fn resolve(self) -> Self {
        match self {
            Coverage::Checked {
                indicator: Some(text),
            } if text == NOT_INDEXED => Coverage::NotFound { indicator: text },
            Coverage::Checked { indicator } => Coverage::Found { caveat: indicator },
            other => other,
        }
    }
}

/// Run the full transition for one indicator reading. The result is always
/// `NotFound` or `Found`.
pub fn assess(indicator_text: &str) -> Coverage {
    Coverage::NotScraped.check(indicator_text).resolve()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_indexed_is_not_found() {
        assert_eq!(
            assess("We haven't indexed this ticker yet"),
            Coverage::NotFound {
                indicator: NOT_INDEXED.to_string()
            }
        );
    }

    #[test]
    fn test_other_indicator_is_caveat() {
        assert_eq!(
            assess("Data limited"),
            Coverage::Found {
                caveat: Some("Data limited".to_string())
            }
        );
    }

    #[test]
    fn test_no_indicator() {
        assert_eq!(assess("   "), Coverage::Found { caveat: None });
    }

    #[test]
    fn test_assess_always_resolves() {
        for text in ["", "  ", NOT_INDEXED, "Data limited", " We haven't indexed this ticker yet "] {
            assert!(
                matches!(assess(text), Coverage::NotFound { .. } | Coverage::Found { .. }),
                "{text:?} left the gate unresolved"
            );
        }
    }

    #[test]
    fn test_transitions_out_of_order_are_ignored() {
        assert_eq!(Coverage::NotScraped.resolve(), Coverage::NotScraped);
        let found = assess("");
        assert_eq!(found.clone().check(NOT_INDEXED), found);
    }
}
