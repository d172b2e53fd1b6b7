//! Symbol universe: parses symbol lists and validates that each symbol has
//! enough history for the feature warmup.

use crate::domain::error::FutalphaError;
use crate::domain::series::SymbolSeries;
use crate::ports::series_port::SeriesPort;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

/// Splits a comma separated symbol list. Symbols keep their case since they
/// double as file stems.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        if !seen.insert(trimmed.to_string()) {
            return Err(UniverseError::DuplicateSymbol(trimmed.to_string()));
        }
        symbols.push(trimmed.to_string());
    }

    Ok(symbols)
}

#[derive(Debug)]
pub struct UniverseValidationResult {
    pub series: Vec<SymbolSeries>,
    pub skipped: Vec<SkippedSymbol>,
}

impl UniverseValidationResult {
    pub fn symbols(&self) -> Vec<&str> {
        self.series.iter().map(|s| s.symbol()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    InsufficientHistory { bars: usize, minimum: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoData => write!(f, "no data"),
            SkipReason::InsufficientHistory { bars, minimum } => {
                write!(f, "only {bars} bars, minimum {minimum} required")
            }
        }
    }
}

/// Loads every symbol and keeps those with at least `min_bars` bars inside
/// the date window.
///
/// Malformed files abort the run. Missing files and short histories are
/// logged and skipped; the call fails only when nothing survives.
pub fn validate_universe(
    port: &dyn SeriesPort,
    symbols: &[String],
    min_bars: usize,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<UniverseValidationResult, FutalphaError> {
    let mut series = Vec::new();
    let mut skipped = Vec::new();

    for symbol in symbols {
        let loaded = match port.load_series(symbol) {
            Ok(s) => s.restrict(start, end),
            Err(FutalphaError::Io(e)) => {
                warn!(symbol = %symbol, reason = %e, "skipping symbol");
                skipped.push(SkippedSymbol {
                    symbol: symbol.clone(),
                    reason: SkipReason::NoData,
                });
                continue;
            }
            Err(e) => return Err(e),
        };

        if loaded.is_empty() {
            warn!(symbol = %symbol, reason = "no bars in window", "skipping symbol");
            skipped.push(SkippedSymbol {
                symbol: symbol.clone(),
                reason: SkipReason::NoData,
            });
            continue;
        }

        if loaded.len() < min_bars {
            let err = FutalphaError::InsufficientHistory {
                symbol: symbol.clone(),
                bars: loaded.len(),
                minimum: min_bars,
            };
            warn!(symbol = %symbol, reason = %err, "skipping symbol");
            skipped.push(SkippedSymbol {
                symbol: symbol.clone(),
                reason: SkipReason::InsufficientHistory {
                    bars: loaded.len(),
                    minimum: min_bars,
                },
            });
            continue;
        }

        info!(symbol = %symbol, bars = loaded.len(), "loaded series");
        series.push(loaded);
    }

    if series.is_empty() {
        return Err(FutalphaError::NoUsableOutput {
            reason: format!("none of {} symbols has enough history", symbols.len()),
        });
    }

    if !skipped.is_empty() {
        info!(
            kept = series.len(),
            total = symbols.len(),
            "universe reduced after validation"
        );
    }

    Ok(UniverseValidationResult { series, skipped })
}
