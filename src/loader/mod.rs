//! Tickers CSV: `name,key` rows under a header line. `key` is the search path
//! segment of the company page and may carry a query string.

use crate::models::TickerEntry;
use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

pub fn load_tickers(path: &Path) -> Result<Vec<TickerEntry>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Could not open tickers file {:?}", path))?;
    let tickers = read_tickers(file)?;
    info!("{} tickers loaded from {:?}", tickers.len(), path);
    Ok(tickers)
}

pub fn read_tickers<R: Read>(source: R) -> Result<Vec<TickerEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let mut tickers = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Tickers row {}: {}", i + 1, e);
                continue;
            }
        };

        let name = record.get(0).unwrap_or_default();
        if name.is_empty() {
            debug!("Tickers row {} has no name, skipped", i + 1);
            continue;
        }
        // Rows without a key search by name.
        let key = record.get(1).filter(|k| !k.is_empty()).unwrap_or(name);

        tickers.push(TickerEntry {
            name: name.to_string(),
            key: key.to_string(),
        });
    }

    Ok(tickers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_tickers() {
        let csv = "name,key\nGMBL, GMBL?a=3kxbzw\nABCD,ABCD\n,orphan\nSOLO\n";
        let tickers = read_tickers(csv.as_bytes()).unwrap();
        assert_eq!(
            tickers,
            vec![
                TickerEntry { name: "GMBL".into(), key: "GMBL?a=3kxbzw".into() },
                TickerEntry { name: "ABCD".into(), key: "ABCD".into() },
                TickerEntry { name: "SOLO".into(), key: "SOLO".into() },
            ]
        );
    }

    #[test]
    fn test_header_only() {
        assert!(read_tickers("name,key\n".as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file() {
        assert!(load_tickers(Path::new("does/not/exist.csv")).is_err());
    }
}
