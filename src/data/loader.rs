//! CSV loader for cleaned session bars.
//!
//! Expects a header row with at least `date` and `close`. The optional
//! columns `open`, `high`, `low` and `volume` default to zero when absent.
//! Dates use the `YYYY-MM-DD` format.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use super::types::{Bar, PriceSeries, SeriesError};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid series: {0}")]
    Series(#[from] SeriesError),

    #[error("No rows found in {0}")]
    Empty(String),
}

/// Load a price series from a CSV file on disk.
pub fn load_csv(path: &Path, symbol: &str) -> Result<PriceSeries, LoaderError> {
    if !path.exists() {
        return Err(LoaderError::FileNotFound(path.display().to_string()));
    }
    let file = File::open(path).map_err(|e| LoaderError::FileNotFound(e.to_string()))?;
    let series = read_csv(BufReader::new(file), symbol)?;

    if series.is_empty() {
        return Err(LoaderError::Empty(path.display().to_string()));
    }

    debug!(
        "Loaded {} bars for {} from {}",
        series.len(),
        symbol,
        path.display()
    );
    Ok(series)
}

/// Parse bars from any CSV reader.
pub fn read_csv<R: Read>(reader: R, symbol: &str) -> Result<PriceSeries, LoaderError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let bars = reader
        .deserialize::<Bar>()
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PriceSeries::new(symbol, bars)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_close_only_csv() {
        let data = "date,close\n2024-01-02,100.5\n2024-01-03,101.25\n";
        let series = read_csv(data.as_bytes(), "DAX").unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.symbol(), "DAX");
        assert_eq!(series.bars()[1].close, 101.25);
        assert_eq!(series.bars()[1].volume, 0.0);
    }

    #[test]
    fn test_read_full_ohlcv_csv() {
        let data = "date,open,high,low,close,volume\n\
                    2024-01-02,99,102,98,101,1500\n\
                    2024-01-03,101,103,100,102.5,1700\n";
        let series = read_csv(data.as_bytes(), "DAX").unwrap();

        assert_eq!(series.bars()[0].high, 102.0);
        assert_eq!(series.bars()[1].volume, 1700.0);
    }

    #[test]
    fn test_read_rejects_unordered_rows() {
        let data = "date,close\n2024-01-03,100\n2024-01-02,101\n";
        let err = read_csv(data.as_bytes(), "DAX").unwrap_err();
        assert!(matches!(err, LoaderError::Series(_)));
    }

    #[test]
    fn test_load_csv_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "date,close").unwrap();
        writeln!(file, "2024-01-02,18000").unwrap();
        writeln!(file, "2024-01-03,18100").unwrap();

        let series = load_csv(file.path(), "NQ").unwrap();
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_load_csv_missing_file() {
        let err = load_csv(Path::new("/nonexistent/bars.csv"), "NQ").unwrap_err();
        assert!(matches!(err, LoaderError::FileNotFound(_)));
    }

    #[test]
    fn test_load_csv_header_only() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "date,close").unwrap();

        let err = load_csv(file.path(), "NQ").unwrap_err();
        assert!(matches!(err, LoaderError::Empty(_)));
    }
}
