//! Rolling arithmetic mean.
//!
//! MEAN(n)[i] = sum(X[i-n+1..=i]) / n, valid once n finite values are in the window.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};

pub fn calculate_rolling_mean(values: &[f64], window: usize) -> IndicatorSeries {
    if window == 0 {
        return IndicatorSeries::empty(IndicatorType::RollingMean(window));
    }

    let points = (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return IndicatorPoint::invalid();
            }
            let slice = &values[i + 1 - window..=i];
            if slice.iter().any(|v| !v.is_finite()) {
                return IndicatorPoint::invalid();
            }
            IndicatorPoint::valid(slice.iter().sum::<f64>() / window as f64)
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::RollingMean(window),
        values: points,
    }
}
