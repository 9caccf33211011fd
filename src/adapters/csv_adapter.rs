//! CSV file data adapter: one `<SYMBOL>.csv` per symbol in a directory.
//!
//! Expected header: `date,open,high,low,close,volume`, dates as `YYYY-MM-DD`.

use crate::domain::error::ArenaError;
use crate::domain::quote::Quote;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct QuoteRow {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }
}

impl DataPort for CsvAdapter {
    fn fetch_quotes(&self, symbol: &str) -> Result<Vec<Quote>, ArenaError> {
        let path = self.csv_path(symbol);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ArenaError::NoData {
                    symbol: symbol.to_string(),
                });
            }
            Err(e) => {
                return Err(ArenaError::Data {
                    reason: format!("failed to read {}: {}", path.display(), e),
                });
            }
        };

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut quotes = Vec::new();

        for (line, result) in rdr.deserialize::<QuoteRow>().enumerate() {
            let row = result.map_err(|e| ArenaError::Data {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;
            let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|e| {
                ArenaError::Data {
                    reason: format!(
                        "{}: invalid date on row {}: {}",
                        path.display(),
                        line + 1,
                        e
                    ),
                }
            })?;
            quotes.push(Quote {
                symbol: symbol.to_string(),
                date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        // stable sort, then keep the last row for a repeated date
        quotes.sort_by_key(|q| q.date);
        let mut deduped: Vec<Quote> = Vec::with_capacity(quotes.len());
        for quote in quotes {
            match deduped.last_mut() {
                Some(last) if last.date == quote.date => *last = quote,
                _ => deduped.push(quote),
            }
        }

        tracing::debug!(symbol, quotes = deduped.len(), "read quotes from CSV");
        Ok(deduped)
    }

    fn list_symbols(&self) -> Result<Vec<String>, ArenaError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| ArenaError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ArenaError::Data {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(symbol) = name_str.strip_suffix(".csv") {
                if !symbol.is_empty() {
                    symbols.push(symbol.to_string());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str = "date,open,high,low,close,volume\n";

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = format!(
            "{HEADER}\
            2024-01-17,110.0,120.0,105.0,115.0,55000\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000\n\
            2024-01-16,105.0,115.0,100.0,110.0,60000\n\
            2024-01-16,105.0,116.0,100.0,111.0,61000\n"
        );

        fs::write(path.join("BHP.csv"), csv_content).unwrap();
        fs::write(path.join("CBA.csv"), HEADER).unwrap();
        fs::write(path.join("notes.txt"), "ignore me").unwrap();

        (dir, path)
    }

    #[test]
    fn fetch_quotes_sorted_and_deduped() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let quotes = adapter.fetch_quotes("BHP").unwrap();

        assert_eq!(quotes.len(), 3);
        assert_eq!(quotes[0].date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(quotes[0].open, 100.0);
        assert_eq!(quotes[0].high, 110.0);
        assert_eq!(quotes[0].low, 90.0);
        assert_eq!(quotes[0].close, 105.0);
        assert_eq!(quotes[0].volume, 50000.0);
        assert_eq!(quotes[0].symbol, "BHP");
        // the later duplicate row wins
        assert_eq!(quotes[1].close, 111.0);
        assert!(quotes.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn fetch_quotes_header_only_is_empty() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert!(adapter.fetch_quotes("CBA").unwrap().is_empty());
    }

    #[test]
    fn fetch_quotes_missing_file_is_no_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let result = adapter.fetch_quotes("XYZ");
        assert!(matches!(result, Err(ArenaError::NoData { .. })));
    }

    #[test]
    fn fetch_quotes_bad_row_is_data_error() {
        let (_dir, path) = setup_test_data();
        fs::write(
            path.join("BAD.csv"),
            format!("{HEADER}2024-01-15,abc,1,1,1,1\n"),
        )
        .unwrap();
        let adapter = CsvAdapter::new(path);
        assert!(matches!(
            adapter.fetch_quotes("BAD"),
            Err(ArenaError::Data { .. })
        ));
    }

    #[test]
    fn fetch_quotes_bad_date_is_data_error() {
        let (_dir, path) = setup_test_data();
        fs::write(
            path.join("BAD.csv"),
            format!("{HEADER}15/01/2024,1,1,1,1,1\n"),
        )
        .unwrap();
        let adapter = CsvAdapter::new(path);
        assert!(matches!(
            adapter.fetch_quotes("BAD"),
            Err(ArenaError::Data { .. })
        ));
    }

    #[test]
    fn list_symbols_returns_csv_stems() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert_eq!(adapter.list_symbols().unwrap(), vec!["BHP", "CBA"]);
    }

    #[test]
    fn list_symbols_missing_dir_errors() {
        let adapter = CsvAdapter::new(PathBuf::from("/nonexistent/quotes"));
        assert!(adapter.list_symbols().is_err());
    }
}
