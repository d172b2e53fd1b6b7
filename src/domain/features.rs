//! Per-symbol feature construction.
//!
//! Every feature is computed from the symbol's own history up to and
//! including the row's date, so a row never sees a later bar.

use crate::domain::indicator::ema::calculate_ema;
use crate::domain::indicator::roc::{calculate_daily_returns, calculate_pct_change};
use crate::domain::indicator::sma::calculate_rolling_mean;
use crate::domain::indicator::stddev::calculate_stddev;
use crate::domain::series::{PriceField, SymbolSeries};
use chrono::NaiveDate;
use rayon::prelude::*;

/// Ratio used when open interest has no usable rolling average.
pub const NEUTRAL_BREAKOUT: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConfig {
    pub momentum_lookbacks: Vec<usize>,
    pub oi_window: usize,
    pub volatility_window: usize,
    pub trend_span: usize,
    /// Rolling window for the per-symbol (temporal) momentum z-score.
    pub temporal_window: usize,
    pub price_field: PriceField,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            momentum_lookbacks: vec![3, 5, 10],
            oi_window: 10,
            volatility_window: 20,
            trend_span: 100,
            temporal_window: 60,
            price_field: PriceField::Close,
        }
    }
}

impl FeatureConfig {
    pub fn max_lookback(&self) -> usize {
        self.momentum_lookbacks.iter().copied().max().unwrap_or(0)
    }

    /// Bars a symbol needs before every momentum lookback is defined.
    pub fn min_bars(&self) -> usize {
        self.max_lookback() + 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub symbol: String,
    pub price: f64,
    /// Aligned with `FeatureConfig::momentum_lookbacks`.
    pub momentum: Vec<Option<f64>>,
    /// Momentum z-scored against the symbol's own rolling history.
    pub temporal_z: Vec<Option<f64>>,
    pub oi_breakout: f64,
    pub volatility: Option<f64>,
    pub trend_ema: Option<f64>,
    pub turnover: Option<f64>,
    /// Bars available up to and including this row.
    pub bars_seen: usize,
}

impl FeatureRow {
    /// True once every configured lookback has enough history.
    pub fn has_history(&self, config: &FeatureConfig) -> bool {
        self.bars_seen > config.max_lookback()
    }

    /// Price above its long EMA.
    pub fn in_uptrend(&self) -> bool {
        self.trend_ema.is_some_and(|ema| self.price > ema)
    }
}

/// Builds one feature row per bar of `series`.
pub fn build_features(series: &SymbolSeries, config: &FeatureConfig) -> Vec<FeatureRow> {
    let prices = series.prices(config.price_field);

    let momentum: Vec<Vec<Option<f64>>> = config
        .momentum_lookbacks
        .iter()
        .map(|&lb| calculate_pct_change(&prices, lb).to_options())
        .collect();
    let temporal: Vec<Vec<Option<f64>>> = momentum
        .iter()
        .map(|m| temporal_zscore(m, config.temporal_window))
        .collect();

    let oi: Vec<f64> = series
        .bars()
        .iter()
        .map(|b| b.open_interest.filter(|v| v.is_finite()).unwrap_or(0.0))
        .collect();
    let oi_avg = calculate_rolling_mean(&oi, config.oi_window);

    let returns: Vec<f64> = calculate_daily_returns(&prices)
        .values
        .iter()
        .map(|p| if p.valid { p.value } else { f64::NAN })
        .collect();
    let volatility = calculate_stddev(&returns, config.volatility_window);
    let trend = calculate_ema(&prices, config.trend_span);

    series
        .bars()
        .iter()
        .enumerate()
        .map(|(i, bar)| FeatureRow {
            date: bar.date,
            symbol: series.symbol().to_string(),
            price: prices[i],
            momentum: momentum.iter().map(|m| m[i]).collect(),
            temporal_z: temporal.iter().map(|z| z[i]).collect(),
            oi_breakout: breakout_ratio(oi[i], oi_avg.get(i)),
            volatility: volatility.get(i),
            trend_ema: trend.get(i),
            turnover: bar.turnover_proxy(),
            bars_seen: i + 1,
        })
        .collect()
}

/// Builds features for every series in parallel, preserving input order.
pub fn build_all(series: &[SymbolSeries], config: &FeatureConfig) -> Vec<Vec<FeatureRow>> {
    series
        .par_iter()
        .map(|s| build_features(s, config))
        .collect()
}

/// OI divided by its rolling average, neutral when the average is unusable.
pub fn breakout_ratio(open_interest: f64, rolling_avg: Option<f64>) -> f64 {
    match rolling_avg {
        Some(avg) if avg != 0.0 => {
            let ratio = open_interest / avg;
            if ratio.is_finite() { ratio } else { NEUTRAL_BREAKOUT }
        }
        _ => NEUTRAL_BREAKOUT,
    }
}

fn temporal_zscore(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let raw: Vec<f64> = values.iter().map(|v| v.unwrap_or(f64::NAN)).collect();
    let mean = calculate_rolling_mean(&raw, window);
    let sd = calculate_stddev(&raw, window);
    (0..raw.len())
        .map(|i| match (values[i], mean.get(i), sd.get(i)) {
            (Some(v), Some(m), Some(s)) if s > 0.0 => Some((v - m) / s),
            (Some(_), Some(_), Some(_)) => Some(0.0),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::series::Bar;

    fn series_with(prices: &[f64], oi: Option<&[f64]>) -> SymbolSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = prices
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                let mut bar = Bar::from_close(start + chrono::Duration::days(i as i64), p);
                bar.open_interest = oi.map(|o| o[i]);
                bar
            })
            .collect();
        SymbolSeries::new("NIFTY", bars).unwrap()
    }

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn momentum_undefined_during_warmup() {
        let config = FeatureConfig::default();
        let rows = build_features(&series_with(&ramp(12), None), &config);

        for row in &rows[..3] {
            assert_eq!(row.momentum[0], None);
        }
        assert!(rows[3].momentum[0].is_some());
        assert_eq!(rows[9].momentum[2], None);
        assert!(rows[10].momentum[2].is_some());
        assert!(!rows[9].has_history(&config));
        assert!(rows[10].has_history(&config));
    }

    #[test]
    fn momentum_value() {
        let rows = build_features(&series_with(&ramp(12), None), &FeatureConfig::default());
        let expected = (103.0 - 100.0) / 100.0;
        assert!((rows[3].momentum[0].unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn missing_open_interest_is_neutral() {
        let rows = build_features(&series_with(&ramp(15), None), &FeatureConfig::default());
        assert!(rows.iter().all(|r| r.oi_breakout == NEUTRAL_BREAKOUT));
    }

    #[test]
    fn breakout_against_rolling_average() {
        let mut oi = vec![100.0; 10];
        oi[9] = 190.0;
        let config = FeatureConfig {
            oi_window: 10,
            ..FeatureConfig::default()
        };
        let rows = build_features(&series_with(&ramp(10), Some(&oi)), &config);
        // avg = (9*100 + 190) / 10 = 109
        assert!((rows[9].oi_breakout - 190.0 / 109.0).abs() < 1e-12);
        assert_eq!(rows[8].oi_breakout, NEUTRAL_BREAKOUT);
    }

    #[test]
    fn breakout_ratio_zero_average() {
        assert_eq!(breakout_ratio(5.0, Some(0.0)), NEUTRAL_BREAKOUT);
        assert_eq!(breakout_ratio(5.0, None), NEUTRAL_BREAKOUT);
        assert_eq!(breakout_ratio(f64::INFINITY, Some(1.0)), NEUTRAL_BREAKOUT);
        assert_eq!(breakout_ratio(2.0, Some(4.0)), 0.5);
    }

    #[test]
    fn volatility_needs_full_window_of_returns() {
        let config = FeatureConfig {
            volatility_window: 5,
            ..FeatureConfig::default()
        };
        let prices = [100.0, 101.0, 99.0, 102.0, 103.0, 101.0, 104.0];
        let rows = build_features(&series_with(&prices, None), &config);
        assert_eq!(rows[4].volatility, None);
        assert!(rows[5].volatility.is_some());
    }

    #[test]
    fn trend_flag_follows_ema() {
        let rows = build_features(&series_with(&ramp(30), None), &FeatureConfig::default());
        assert!(!rows[0].in_uptrend());
        assert!(rows[29].in_uptrend());
    }

    #[test]
    fn build_all_preserves_order() {
        let a = series_with(&ramp(5), None);
        let bars = a.bars().to_vec();
        let b = SymbolSeries::new("BANKNIFTY", bars).unwrap();
        let out = build_all(&[a, b], &FeatureConfig::default());
        assert_eq!(out[0][0].symbol, "NIFTY");
        assert_eq!(out[1][0].symbol, "BANKNIFTY");
    }

    #[test]
    fn temporal_zscore_flat_history_is_zero() {
        let values: Vec<Option<f64>> = vec![Some(0.1); 4];
        let z = temporal_zscore(&values, 3);
        assert_eq!(z, vec![None, None, Some(0.0), Some(0.0)]);
    }
}
