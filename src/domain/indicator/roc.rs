//! Fractional rate of change (percentage change).
//!
//! PCT(n)[i] = (X[i] - X[i-n]) / X[i-n]
//! Warmup: first n points invalid. A zero or non-finite base is invalid too.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};

pub fn calculate_pct_change(values: &[f64], lookback: usize) -> IndicatorSeries {
    if lookback == 0 {
        return IndicatorSeries::empty(IndicatorType::PctChange(lookback));
    }

    let points = (0..values.len())
        .map(|i| {
            if i < lookback {
                return IndicatorPoint::invalid();
            }
            let base = values[i - lookback];
            let change = (values[i] - base) / base;
            if base == 0.0 || !change.is_finite() {
                IndicatorPoint::invalid()
            } else {
                IndicatorPoint::valid(change)
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::PctChange(lookback),
        values: points,
    }
}

/// One-bar percentage returns; the first point is invalid.
pub fn calculate_daily_returns(values: &[f64]) -> IndicatorSeries {
    IndicatorSeries {
        indicator_type: IndicatorType::DailyReturn,
        values: calculate_pct_change(values, 1).values,
    }
}
