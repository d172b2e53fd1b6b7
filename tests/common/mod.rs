#![allow(dead_code)]

use chrono::{Days, NaiveDate};
use futalpha::domain::error::FutalphaError;
pub use futalpha::domain::series::{Bar, SymbolSeries};
use futalpha::ports::series_port::SeriesPort;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

pub struct MockSeriesPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub malformed: HashMap<String, String>,
}

impl MockSeriesPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            malformed: HashMap::new(),
        }
    }

    pub fn with_series(mut self, series: SymbolSeries) -> Self {
        self.data
            .insert(series.symbol().to_string(), series.bars().to_vec());
        self
    }

    pub fn with_malformed(mut self, symbol: &str, reason: &str) -> Self {
        self.malformed.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl SeriesPort for MockSeriesPort {
    fn load_series(&self, symbol: &str) -> Result<SymbolSeries, FutalphaError> {
        if let Some(reason) = self.malformed.get(symbol) {
            return Err(FutalphaError::malformed(symbol, reason.clone()));
        }
        match self.data.get(symbol) {
            Some(bars) => SymbolSeries::new(symbol, bars.clone()),
            None => Err(FutalphaError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{symbol}.csv not found"),
            ))),
        }
    }

    fn list_symbols(&self) -> Result<Vec<String>, FutalphaError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Daily bars with a constant drift and a shared wiggle so that realized
/// volatility is never zero. Open interest grows by one contract per day.
pub fn generate_series(
    symbol: &str,
    start: NaiveDate,
    count: usize,
    drift: f64,
    turnover: f64,
) -> SymbolSeries {
    let bars = (0..count)
        .map(|i| {
            let close = 100.0 * (1.0 + drift).powi(i as i32) * (1.0 + 0.01 * (i as f64).sin());
            Bar {
                date: start + Days::new(i as u64),
                open: close,
                high: close * 1.005,
                low: close * 0.995,
                close,
                volume: Some(1000.0),
                open_interest: Some(5000.0 + i as f64),
                turnover: Some(turnover),
                expiry: None,
            }
        })
        .collect();
    SymbolSeries::new(symbol, bars).unwrap()
}

/// Three symbols with clearly separated drifts: UP > FLAT > DOWN.
pub fn sample_universe(start: NaiveDate, count: usize) -> Vec<SymbolSeries> {
    vec![
        generate_series("UP", start, count, 0.004, 5e8),
        generate_series("FLAT", start, count, 0.0, 3e8),
        generate_series("DOWN", start, count, -0.003, 1e8),
    ]
}

/// Writes `series` as `<SYMBOL>.csv` files in `dir`.
pub fn write_csv_universe(dir: &Path, universe: &[SymbolSeries]) {
    for series in universe {
        let mut content =
            String::from("date,open,high,low,close,volume,open_interest,turnover,expiry\n");
        for b in series.bars() {
            writeln!(
                content,
                "{},{},{},{},{},{},{},{},",
                b.date,
                b.open,
                b.high,
                b.low,
                b.close,
                b.volume.unwrap_or(0.0),
                b.open_interest.unwrap_or(0.0),
                b.turnover.unwrap_or(0.0),
            )
            .unwrap();
        }
        std::fs::write(dir.join(format!("{}.csv", series.symbol())), content).unwrap();
    }
}
