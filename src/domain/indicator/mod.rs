//! Rolling indicator primitives over a price (or return) vector.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator series, with a validity flag
//! - `IndicatorType`: Enum for indicator identity + parameters
//! - `IndicatorSeries`: A series of indicator values aligned with its input

pub mod ema;
pub mod roc;
pub mod sma;
pub mod stddev;

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorPoint {
    pub valid: bool,
    pub value: f64,
}

impl IndicatorPoint {
    pub fn invalid() -> Self {
        IndicatorPoint {
            valid: false,
            value: f64::NAN,
        }
    }

    pub fn valid(value: f64) -> Self {
        IndicatorPoint { valid: true, value }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Ema(usize),
    RollingMean(usize),
    RollingStddev(usize),
    PctChange(usize),
    DailyReturn,
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn empty(indicator_type: IndicatorType) -> Self {
        IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        }
    }

    /// Value at `i` when it is valid and finite.
    pub fn get(&self, i: usize) -> Option<f64> {
        self.values
            .get(i)
            .filter(|p| p.valid && p.value.is_finite())
            .map(|p| p.value)
    }

    /// Valid values as options; invalid points become `None`.
    pub fn to_options(&self) -> Vec<Option<f64>> {
        (0..self.values.len()).map(|i| self.get(i)).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Ema(span) => write!(f, "EMA({})", span),
            IndicatorType::RollingMean(window) => write!(f, "MEAN({})", window),
            IndicatorType::RollingStddev(window) => write!(f, "STDDEV({})", window),
            IndicatorType::PctChange(lookback) => write!(f, "PCT_CHANGE({})", lookback),
            IndicatorType::DailyReturn => write!(f, "RET(1)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_type_display() {
        assert_eq!(IndicatorType::Ema(100).to_string(), "EMA(100)");
        assert_eq!(IndicatorType::PctChange(3).to_string(), "PCT_CHANGE(3)");
        assert_eq!(IndicatorType::RollingStddev(20).to_string(), "STDDEV(20)");
    }

    #[test]
    fn get_skips_invalid_and_non_finite() {
        let series = IndicatorSeries {
            indicator_type: IndicatorType::DailyReturn,
            values: vec![
                IndicatorPoint::invalid(),
                IndicatorPoint::valid(0.5),
                IndicatorPoint::valid(f64::INFINITY),
            ],
        };
        assert_eq!(series.get(0), None);
        assert_eq!(series.get(1), Some(0.5));
        assert_eq!(series.get(2), None);
        assert_eq!(series.get(9), None);
        assert_eq!(series.to_options(), vec![None, Some(0.5), None]);
    }
}
