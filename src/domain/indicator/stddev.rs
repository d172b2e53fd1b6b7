//! Rolling sample standard deviation.
//!
//! STDDEV(n)[i] = sqrt(sum((X[i-j] - MEAN(n)[i])^2 for j in 0..n) / (n - 1))
//! Valid once n finite values are in the window; n < 2 yields an empty series.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};

pub fn calculate_stddev(values: &[f64], window: usize) -> IndicatorSeries {
    if window < 2 {
        return IndicatorSeries::empty(IndicatorType::RollingStddev(window));
    }

    let points = (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return IndicatorPoint::invalid();
            }
            match sample_stddev(&values[i + 1 - window..=i]) {
                Some(sd) => IndicatorPoint::valid(sd),
                None => IndicatorPoint::invalid(),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::RollingStddev(window),
        values: points,
    }
}

/// Sample standard deviation; `None` for fewer than two values or any non-finite value.
pub fn sample_stddev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 || values.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}
