//! Market regime gate from a synthetic equal-weight index.

use crate::domain::indicator::ema::calculate_ema;
use crate::domain::series::{PriceField, SymbolSeries};
use chrono::NaiveDate;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct RegimeConfig {
    pub ema_span: usize,
    pub enabled: bool,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        RegimeConfig {
            ema_span: 100,
            enabled: true,
        }
    }
}

/// Risk-on flag per date.
#[derive(Debug, Clone, PartialEq)]
pub struct RegimeState {
    states: BTreeMap<NaiveDate, bool>,
    enabled: bool,
}

impl RegimeState {
    /// Gate that lets every date trade.
    pub fn always_on() -> Self {
        RegimeState {
            states: BTreeMap::new(),
            enabled: false,
        }
    }

    pub fn from_states(states: BTreeMap<NaiveDate, bool>) -> Self {
        RegimeState {
            states,
            enabled: true,
        }
    }

    /// Dates missing from the series are risk-off.
    pub fn is_risk_on(&self, date: NaiveDate) -> bool {
        !self.enabled || self.states.get(&date).copied().unwrap_or(false)
    }

    pub fn states(&self) -> &BTreeMap<NaiveDate, bool> {
        &self.states
    }

    pub fn risk_on_days(&self) -> usize {
        self.states.values().filter(|&&on| on).count()
    }
}

/// Mean price across the symbols present on each date.
pub fn synthetic_index(series: &[SymbolSeries], field: PriceField) -> BTreeMap<NaiveDate, f64> {
    let mut sums: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for s in series {
        for bar in s.bars() {
            let price = field.select(bar);
            if !price.is_finite() {
                continue;
            }
            let slot = sums.entry(bar.date).or_insert((0.0, 0));
            slot.0 += price;
            slot.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(date, (sum, n))| (date, sum / n as f64))
        .collect()
}

/// `RISK_ON[d] = index[d] > EMA(index)[d]`.
pub fn detect_regime(
    series: &[SymbolSeries],
    field: PriceField,
    config: &RegimeConfig,
) -> RegimeState {
    if !config.enabled {
        return RegimeState::always_on();
    }
    let index = synthetic_index(series, field);
    let values: Vec<f64> = index.values().copied().collect();
    let ema = calculate_ema(&values, config.ema_span);

    let states = index
        .keys()
        .enumerate()
        .map(|(i, &date)| (date, ema.get(i).is_some_and(|e| values[i] > e)))
        .collect();
    RegimeState::from_states(states)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::series::Bar;

    fn series(symbol: &str, start_day: u32, prices: &[f64]) -> SymbolSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, start_day).unwrap();
        let bars = prices
            .iter()
            .enumerate()
            .map(|(i, &p)| Bar::from_close(start + chrono::Duration::days(i as i64), p))
            .collect();
        SymbolSeries::new(symbol, bars).unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn index_averages_present_symbols() {
        let a = series("A", 1, &[100.0, 110.0]);
        let b = series("B", 2, &[200.0, 300.0]);
        let index = synthetic_index(&[a, b], PriceField::Close);
        assert_eq!(index[&d(1)], 100.0);
        assert_eq!(index[&d(2)], 155.0);
        assert_eq!(index[&d(3)], 300.0);
    }

    #[test]
    fn rising_index_is_risk_on() {
        let a = series("A", 1, &[100.0, 101.0, 102.0, 103.0]);
        let regime = detect_regime(&[a], PriceField::Close, &RegimeConfig::default());
        assert!(!regime.is_risk_on(d(1)));
        assert!(regime.is_risk_on(d(2)));
        assert!(regime.is_risk_on(d(4)));
        assert_eq!(regime.risk_on_days(), 3);
    }

    #[test]
    fn falling_index_is_risk_off() {
        let a = series("A", 1, &[100.0, 99.0, 98.0]);
        let regime = detect_regime(&[a], PriceField::Close, &RegimeConfig::default());
        assert!(!regime.is_risk_on(d(3)));
    }

    #[test]
    fn unknown_date_is_risk_off() {
        let a = series("A", 1, &[100.0, 101.0]);
        let regime = detect_regime(&[a], PriceField::Close, &RegimeConfig::default());
        assert!(!regime.is_risk_on(d(20)));
    }

    #[test]
    fn disabled_gate_is_always_on() {
        let a = series("A", 1, &[100.0, 99.0]);
        let config = RegimeConfig {
            enabled: false,
            ..RegimeConfig::default()
        };
        let regime = detect_regime(&[a], PriceField::Close, &config);
        assert!(regime.is_risk_on(d(2)));
        assert!(regime.is_risk_on(d(28)));
    }
}
