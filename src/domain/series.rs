//! Per-symbol bar series consumed by the core.

use crate::domain::error::FutalphaError;
use chrono::NaiveDate;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
    pub open_interest: Option<f64>,
    pub turnover: Option<f64>,
    pub expiry: Option<NaiveDate>,
}

impl Bar {
    /// Bar with only a close; open/high/low mirror it and optional fields are empty.
    pub fn from_close(date: NaiveDate, close: f64) -> Self {
        Bar {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: None,
            open_interest: None,
            turnover: None,
            expiry: None,
        }
    }

    /// Reported turnover, falling back to volume * close.
    pub fn turnover_proxy(&self) -> Option<f64> {
        self.turnover
            .or_else(|| self.volume.map(|v| v * self.close))
            .filter(|t| t.is_finite())
    }

    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Which bar field feeds momentum, volatility and the regime index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceField {
    #[default]
    Close,
    Typical,
}

impl PriceField {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "close" | "adj_close" => Some(PriceField::Close),
            "typical" => Some(PriceField::Typical),
            _ => None,
        }
    }

    pub fn select(self, bar: &Bar) -> f64 {
        match self {
            PriceField::Close => bar.close,
            PriceField::Typical => bar.typical_price(),
        }
    }
}

/// Read-only, strictly date-ordered bar history for one symbol.
#[derive(Debug, Clone)]
pub struct SymbolSeries {
    symbol: String,
    bars: Vec<Bar>,
    date_index: HashMap<NaiveDate, usize>,
}

impl SymbolSeries {
    /// Builds a series, rejecting duplicate or out-of-order dates.
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, FutalphaError> {
        let symbol = symbol.into();
        for pair in bars.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(FutalphaError::malformed(
                    symbol.clone(),
                    format!(
                        "dates must be strictly increasing ({} followed by {})",
                        pair[0].date, pair[1].date
                    ),
                ));
            }
        }
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Ok(Self {
            symbol,
            bars,
            date_index,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get_bar(&self, date: NaiveDate) -> Option<&Bar> {
        self.date_index.get(&date).map(|&i| &self.bars[i])
    }

    pub fn prices(&self, field: PriceField) -> Vec<f64> {
        self.bars.iter().map(|b| field.select(b)).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    /// Keeps only bars inside `[start, end]`.
    pub fn restrict(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> SymbolSeries {
        let bars: Vec<Bar> = self
            .bars
            .iter()
            .filter(|b| start.is_none_or(|s| b.date >= s) && end.is_none_or(|e| b.date <= e))
            .cloned()
            .collect();
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        SymbolSeries {
            symbol: self.symbol.clone(),
            bars,
            date_index,
        }
    }
}
