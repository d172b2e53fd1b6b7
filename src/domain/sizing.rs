//! Volatility-parity position sizing.
//!
//! raw_i = (1/vol_i) / sum(1/vol), scaled toward the target portfolio vol,
//! clipped at `max_weight`, then renormalized to sum to 1. The renormalize
//! step can lift weights back above the cap when fewer than 1/max_weight
//! names survive.

use crate::domain::scoring::RankedEntry;
use chrono::NaiveDate;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct SizingConfig {
    pub target_portfolio_vol: f64,
    pub max_weight: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        SizingConfig {
            target_portfolio_vol: 0.18,
            max_weight: 0.20,
        }
    }
}

/// Long-only weights for one date. Empty means a flat day.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub date: NaiveDate,
    pub weights: Vec<(String, f64)>,
}

impl Allocation {
    pub fn flat(date: NaiveDate) -> Self {
        Allocation {
            date,
            weights: Vec::new(),
        }
    }

    pub fn is_flat(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.weights.iter().map(|(_, w)| w).sum()
    }

    pub fn weight_of(&self, symbol: &str) -> Option<f64> {
        self.weights
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, w)| *w)
    }
}

/// Sizes the ranked entries; symbols without a positive volatility are dropped.
pub fn size_positions(
    date: NaiveDate,
    entries: &[RankedEntry],
    config: &SizingConfig,
) -> Allocation {
    let sized: Vec<(&str, f64)> = entries
        .iter()
        .filter_map(|e| match e.volatility {
            Some(v) if v.is_finite() && v > 0.0 => Some((e.symbol.as_str(), v)),
            _ => {
                debug!(symbol = %e.symbol, date = %date, "no usable volatility, not sized");
                None
            }
        })
        .collect();
    if sized.is_empty() {
        return Allocation::flat(date);
    }

    let inv_total: f64 = sized.iter().map(|(_, v)| 1.0 / v).sum();
    let raw: Vec<f64> = sized.iter().map(|(_, v)| (1.0 / v) / inv_total).collect();

    let portfolio_vol: f64 = raw.iter().zip(&sized).map(|(w, (_, v))| w * v).sum();
    let scale = if portfolio_vol > 0.0 {
        config.target_portfolio_vol / portfolio_vol
    } else {
        1.0
    };

    let clipped: Vec<f64> = raw
        .iter()
        .map(|w| (w * scale).min(config.max_weight))
        .collect();
    let clipped_total: f64 = clipped.iter().sum();
    if clipped_total <= 0.0 || !clipped_total.is_finite() {
        return Allocation::flat(date);
    }

    Allocation {
        date,
        weights: sized
            .iter()
            .zip(clipped)
            .map(|((symbol, _), w)| (symbol.to_string(), w / clipped_total))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn entry(symbol: &str, rank: usize, vol: Option<f64>) -> RankedEntry {
        RankedEntry {
            symbol: symbol.to_string(),
            score: 1.0 / rank as f64,
            rank,
            price: 100.0,
            volatility: vol,
            turnover: None,
            breakdown: None,
        }
    }

    #[test]
    fn two_names_clip_then_renormalize() {
        let entries = [entry("A", 1, Some(0.02)), entry("B", 2, Some(0.01))];
        let alloc = size_positions(date(), &entries, &SizingConfig::default());
        assert_relative_eq!(alloc.weight_of("A").unwrap(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(alloc.weight_of("B").unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn nan_volatility_is_excluded() {
        let entries = [entry("A", 1, Some(f64::NAN)), entry("B", 2, Some(0.01))];
        let alloc = size_positions(date(), &entries, &SizingConfig::default());
        assert_eq!(alloc.weight_of("A"), None);
        assert_relative_eq!(alloc.total(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn no_sizeable_symbols_is_flat() {
        let entries = [entry("A", 1, None), entry("B", 2, Some(0.0))];
        let alloc = size_positions(date(), &entries, &SizingConfig::default());
        assert!(alloc.is_flat());
        assert_eq!(alloc.total(), 0.0);
    }

    #[test]
    fn inverse_vol_when_cap_does_not_bind() {
        let entries = [entry("A", 1, Some(0.02)), entry("B", 2, Some(0.01))];
        let config = SizingConfig {
            target_portfolio_vol: 0.01,
            max_weight: 1.0,
        };
        let alloc = size_positions(date(), &entries, &config);
        assert_relative_eq!(alloc.weight_of("A").unwrap(), 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(alloc.weight_of("B").unwrap(), 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn many_names_respect_cap() {
        let entries: Vec<RankedEntry> = (1..=10)
            .map(|i| entry(&format!("S{i}"), i, Some(0.01 * i as f64)))
            .collect();
        let alloc = size_positions(date(), &entries, &SizingConfig::default());
        assert_relative_eq!(alloc.total(), 1.0, epsilon = 1e-12);
        assert!(alloc.weights.iter().all(|(_, w)| *w >= 0.0));
    }
}
