//! Price-table loading from CSV.
//!
//! Expected header: `timestamp,open,high,low,close,volume` (`date` and
//! `time` are accepted for the first column). Timestamps may be RFC 3339,
//! `%Y-%m-%d %H:%M:%S`, `%Y-%m-%dT%H:%M:%S`, `%Y-%m-%d`, or integer epoch
//! seconds / milliseconds. The loaded table is validated before it is
//! returned: ascending, no duplicate timestamps, positive prices,
//! non-negative volume.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use thiserror::Error;

use regimelab_core::domain::{validate_table, Bar, BarError};
use regimelab_core::engine::trim;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open price table {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: unrecognized timestamp '{value}'")]
    Timestamp { row: usize, value: String },
    #[error("price table failed validation: {0}")]
    Invalid(#[from] BarError),
    #[error("price table is empty")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "date", alias = "time", alias = "Date", alias = "Timestamp")]
    timestamp: String,
    #[serde(alias = "Open")]
    open: f64,
    #[serde(alias = "High")]
    high: f64,
    #[serde(alias = "Low")]
    low: f64,
    #[serde(alias = "Close")]
    close: f64,
    #[serde(alias = "Volume")]
    volume: f64,
}

/// Options applied after parsing.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Inclusive lower bound on timestamps.
    pub start: Option<NaiveDateTime>,
    /// Inclusive upper bound on timestamps.
    pub end: Option<NaiveDateTime>,
}

/// A validated price table plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub bars: Vec<Bar>,
    pub source: Option<PathBuf>,
    /// BLAKE3 over the parsed bars, for reproducibility records.
    pub dataset_hash: String,
}

/// Parse one timestamp cell. Epoch integers above 10^11 are milliseconds.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(epoch) = raw.parse::<i64>() {
        let dt = if epoch.abs() >= 100_000_000_000 {
            DateTime::from_timestamp_millis(epoch)
        } else {
            DateTime::from_timestamp(epoch, 0)
        };
        return dt.map(|d| d.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse and validate a price table from any reader.
pub fn read_price_table<R: Read>(reader: R) -> Result<Vec<Bar>, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut bars = Vec::new();
    for (row, record) in csv_reader.deserialize::<CsvRow>().enumerate() {
        let record = record?;
        let timestamp =
            parse_timestamp(&record.timestamp).ok_or_else(|| LoadError::Timestamp {
                row: row + 1,
                value: record.timestamp.clone(),
            })?;
        bars.push(Bar {
            timestamp,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
        });
    }
    validate_table(&bars)?;
    Ok(bars)
}

/// Load, validate and trim a CSV price table.
pub fn load_bars(path: &Path, opts: &LoadOptions) -> Result<LoadedData, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let all = read_price_table(std::io::BufReader::new(file))?;
    let bars = trim(&all, opts.start, opts.end).to_vec();
    if bars.is_empty() {
        return Err(LoadError::Empty);
    }
    tracing::info!(
        path = %path.display(),
        rows = all.len(),
        kept = bars.len(),
        "loaded price table"
    );
    Ok(LoadedData {
        dataset_hash: dataset_hash(&bars),
        bars,
        source: Some(path.to_path_buf()),
    })
}

/// BLAKE3 over every bar's timestamp and OHLCV bit patterns.
pub fn dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(&bar.timestamp.and_utc().timestamp_millis().to_le_bytes());
        for value in [bar.open, bar.high, bar.low, bar.close, bar.volume] {
            hasher.update(&value.to_bits().to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
timestamp,open,high,low,close,volume
2024-01-01 00:00:00,100,101,99,100.5,10
2024-01-01 01:00:00,100.5,102,100,101.5,12
2024-01-01 02:00:00,101.5,103,101,102.0,0
";

    #[test]
    fn timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-03-05 12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05T12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05T12:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05T14:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("1709641800"), Some(expected));
        assert_eq!(parse_timestamp("1709641800000"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-03-05"),
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn reads_valid_table() {
        let bars = read_price_table(TABLE.as_bytes()).unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[1].close, 101.5);
        assert_eq!(bars[2].volume, 0.0);
    }

    #[test]
    fn date_header_alias() {
        let text = "date,open,high,low,close,volume\n2024-01-02,1,1,1,1,1\n";
        assert_eq!(read_price_table(text.as_bytes()).unwrap().len(), 1);
    }

    #[test]
    fn rejects_bad_timestamp() {
        let text = "timestamp,open,high,low,close,volume\nnope,1,1,1,1,1\n";
        assert!(matches!(
            read_price_table(text.as_bytes()),
            Err(LoadError::Timestamp { row: 1, .. })
        ));
    }

    #[test]
    fn rejects_unsorted_and_duplicate() {
        let unsorted = "timestamp,open,high,low,close,volume\n\
                        2024-01-02,1,1,1,1,1\n2024-01-01,1,1,1,1,1\n";
        assert!(matches!(
            read_price_table(unsorted.as_bytes()),
            Err(LoadError::Invalid(BarError::Unsorted { index: 1, .. }))
        ));
        let duplicate = "timestamp,open,high,low,close,volume\n\
                         2024-01-01,1,1,1,1,1\n2024-01-01,1,1,1,1,1\n";
        assert!(matches!(
            read_price_table(duplicate.as_bytes()),
            Err(LoadError::Invalid(BarError::DuplicateTimestamp { .. }))
        ));
    }

    #[test]
    fn rejects_bad_values() {
        let price = "timestamp,open,high,low,close,volume\n2024-01-01,1,1,1,0,1\n";
        assert!(matches!(
            read_price_table(price.as_bytes()),
            Err(LoadError::Invalid(BarError::InvalidPrice { .. }))
        ));
        let volume = "timestamp,open,high,low,close,volume\n2024-01-01,1,1,1,1,-5\n";
        assert!(matches!(
            read_price_table(volume.as_bytes()),
            Err(LoadError::Invalid(BarError::InvalidVolume { .. }))
        ));
    }

    #[test]
    fn dataset_hash_tracks_content() {
        let bars = read_price_table(TABLE.as_bytes()).unwrap();
        let mut changed = bars.clone();
        changed[0].close = 100.6;
        assert_eq!(dataset_hash(&bars), dataset_hash(&bars.clone()));
        assert_ne!(dataset_hash(&bars), dataset_hash(&changed));
    }
}
