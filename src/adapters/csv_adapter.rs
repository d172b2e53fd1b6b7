//! CSV directory series adapter: one `<SYMBOL>.csv` file per symbol.
//!
//! Columns are matched by header name: `date, open, high, low, close, volume,
//! open_interest, turnover, expiry`. Only `date` and `close` are required;
//! other fields may be absent or blank.

use crate::domain::error::FutalphaError;
use crate::domain::series::{Bar, SymbolSeries};
use crate::ports::series_port::SeriesPort;
use chrono::NaiveDate;
use csv::StringRecord;
use std::fs::{self, File};
use std::path::PathBuf;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct CsvSeriesAdapter {
    base_path: PathBuf,
}

impl CsvSeriesAdapter {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }
}

/// Header positions for one file.
struct Columns {
    date: usize,
    close: usize,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    volume: Option<usize>,
    open_interest: Option<usize>,
    turnover: Option<usize>,
    expiry: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord, source: &str) -> Result<Self, FutalphaError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let required = |name: &str| {
            find(name).ok_or_else(|| FutalphaError::MissingColumn {
                source_name: source.to_string(),
                column: name.to_string(),
            })
        };
        Ok(Columns {
            date: required("date")?,
            close: required("close")?,
            open: find("open"),
            high: find("high"),
            low: find("low"),
            volume: find("volume"),
            open_interest: find("open_interest"),
            turnover: find("turnover"),
            expiry: find("expiry"),
        })
    }
}

struct RowReader<'a> {
    record: &'a StringRecord,
    source: &'a str,
    line: u64,
}

impl RowReader<'_> {
    fn raw(&self, index: Option<usize>) -> Option<&str> {
        index
            .and_then(|i| self.record.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    fn number(&self, index: Option<usize>, name: &str) -> Result<Option<f64>, FutalphaError> {
        match self.raw(index) {
            None => Ok(None),
            Some(v) => v
                .parse::<f64>()
                .ok()
                .filter(|x| x.is_finite())
                .map(Some)
                .ok_or_else(|| self.malformed(format!("invalid {name} value '{v}'"))),
        }
    }

    fn date(&self, index: Option<usize>, name: &str) -> Result<Option<NaiveDate>, FutalphaError> {
        match self.raw(index) {
            None => Ok(None),
            Some(v) => NaiveDate::parse_from_str(v, DATE_FORMAT)
                .map(Some)
                .map_err(|_| self.malformed(format!("invalid {name} '{v}'"))),
        }
    }

    fn malformed(&self, reason: String) -> FutalphaError {
        FutalphaError::malformed(self.source, format!("line {}: {reason}", self.line))
    }
}

impl SeriesPort for CsvSeriesAdapter {
    fn load_series(&self, symbol: &str) -> Result<SymbolSeries, FutalphaError> {
        let path = self.csv_path(symbol);
        let source = path.display().to_string();
        let file = File::open(&path)?;

        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(file);
        let headers = rdr
            .headers()
            .map_err(|e| FutalphaError::malformed(&source, format!("CSV header error: {e}")))?
            .clone();
        let columns = Columns::from_headers(&headers, &source)?;

        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result
                .map_err(|e| FutalphaError::malformed(&source, format!("CSV parse error: {e}")))?;
            let row = RowReader {
                record: &record,
                source: &source,
                line: record.position().map_or(0, |p| p.line()),
            };

            let date = row
                .date(Some(columns.date), "date")?
                .ok_or_else(|| row.malformed("empty date".to_string()))?;
            let close = row
                .number(Some(columns.close), "close")?
                .ok_or_else(|| row.malformed("empty close".to_string()))?;

            bars.push(Bar {
                date,
                open: row.number(columns.open, "open")?.unwrap_or(close),
                high: row.number(columns.high, "high")?.unwrap_or(close),
                low: row.number(columns.low, "low")?.unwrap_or(close),
                close,
                volume: row.number(columns.volume, "volume")?,
                open_interest: row.number(columns.open_interest, "open_interest")?,
                turnover: row.number(columns.turnover, "turnover")?,
                expiry: row.date(columns.expiry, "expiry")?,
            });
        }

        SymbolSeries::new(symbol, bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, FutalphaError> {
        let mut symbols = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != "csv") {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                symbols.push(stem.to_string_lossy().into_owned());
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}
