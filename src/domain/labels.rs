//! Next-period returns used for PnL and as training labels.

use crate::domain::series::{PriceField, SymbolSeries};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

pub const LABEL_FLOOR: f64 = -0.05;
pub const LABEL_CAP: f64 = 0.10;

/// `(p[i+1] - p[i]) / p[i]` aligned to bar `i`; the last bar has none.
pub fn next_period_returns(series: &SymbolSeries, field: PriceField) -> Vec<Option<f64>> {
    let prices = series.prices(field);
    (0..prices.len())
        .map(|i| {
            let next = prices.get(i + 1)?;
            let ret = (next - prices[i]) / prices[i];
            ret.is_finite().then_some(ret)
        })
        .collect()
}

/// Training label: the return clipped to [-5%, +10%].
pub fn clip_label(ret: f64) -> f64 {
    ret.clamp(LABEL_FLOOR, LABEL_CAP)
}

/// Next-period return lookup by date and symbol.
#[derive(Debug, Clone, Default)]
pub struct ForwardReturns {
    by_date: BTreeMap<NaiveDate, HashMap<String, f64>>,
}

impl ForwardReturns {
    pub fn from_series(series: &[SymbolSeries], field: PriceField) -> Self {
        let mut by_date: BTreeMap<NaiveDate, HashMap<String, f64>> = BTreeMap::new();
        for s in series {
            for (bar, ret) in s.bars().iter().zip(next_period_returns(s, field)) {
                if let Some(r) = ret {
                    by_date
                        .entry(bar.date)
                        .or_default()
                        .insert(s.symbol().to_string(), r);
                }
            }
        }
        ForwardReturns { by_date }
    }

    pub fn insert(&mut self, date: NaiveDate, symbol: &str, ret: f64) {
        self.by_date
            .entry(date)
            .or_default()
            .insert(symbol.to_string(), ret);
    }

    pub fn get(&self, date: NaiveDate, symbol: &str) -> Option<f64> {
        self.by_date.get(&date)?.get(symbol).copied()
    }
}
