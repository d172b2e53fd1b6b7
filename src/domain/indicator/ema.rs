//! Exponential Moving Average in recursive (non-adjusted) form.
//!
//! k = 2/(span+1), EMA[0] = X[0], then EMA[i] = X[i]*k + EMA[i-1]*(1-k).
//! Valid from the first bar. A non-finite input leaves the EMA unchanged and
//! marks that point invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};

pub fn calculate_ema(values: &[f64], span: usize) -> IndicatorSeries {
    if span == 0 || values.is_empty() {
        return IndicatorSeries::empty(IndicatorType::Ema(span));
    }

    let k = 2.0 / (span as f64 + 1.0);
    let mut points = Vec::with_capacity(values.len());
    let mut ema: Option<f64> = None;

    for &x in values {
        if !x.is_finite() {
            points.push(IndicatorPoint::invalid());
            continue;
        }
        let next = match ema {
            None => x,
            Some(prev) => x * k + prev * (1.0 - k),
        };
        ema = Some(next);
        points.push(IndicatorPoint::valid(next));
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(span),
        values: points,
    }
}
