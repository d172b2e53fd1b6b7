//! Property tests for the sizing, ranking and feature invariants.

mod common;

use common::*;
use futalpha::domain::features::{build_features, FeatureConfig, FeatureRow};
use futalpha::domain::scoring::{score_snapshot, RankedEntry, ScoringConfig};
use futalpha::domain::sizing::{size_positions, SizingConfig};
use futalpha::domain::snapshot::CrossSectionalSnapshot;
use proptest::prelude::*;

fn entry(i: usize, volatility: Option<f64>) -> RankedEntry {
    RankedEntry {
        symbol: format!("S{i}"),
        score: -(i as f64),
        rank: i + 1,
        price: 100.0,
        volatility,
        turnover: None,
        breakdown: None,
    }
}

fn feature_row(i: usize, momentum: &[f64], oi_breakout: f64, uptrend: bool) -> FeatureRow {
    FeatureRow {
        date: date(2024, 5, 2),
        symbol: format!("S{i}"),
        price: 100.0,
        momentum: momentum.iter().copied().map(Some).collect(),
        temporal_z: vec![None; momentum.len()],
        oi_breakout,
        volatility: Some(0.01),
        trend_ema: Some(if uptrend { 90.0 } else { 110.0 }),
        turnover: None,
        bars_seen: 200,
    }
}

proptest! {
    #[test]
    fn weights_sum_to_zero_or_one(
        vols in prop::collection::vec(prop::option::of(0.001f64..0.1), 0..12),
        target in 0.01f64..0.5,
        max_weight in 0.05f64..1.0,
    ) {
        let entries: Vec<RankedEntry> = vols
            .iter()
            .enumerate()
            .map(|(i, v)| entry(i, *v))
            .collect();
        let config = SizingConfig { target_portfolio_vol: target, max_weight };
        let allocation = size_positions(date(2024, 5, 2), &entries, &config);

        let total = allocation.total();
        prop_assert!(allocation.is_flat() || (total - 1.0).abs() < 1e-9);
        prop_assert!(allocation.weights.iter().all(|(_, w)| *w >= 0.0));
        let sized = vols.iter().filter(|v| v.is_some()).count();
        prop_assert_eq!(allocation.weights.len(), sized);
    }

    #[test]
    fn ranks_form_dense_sequence(
        rows in prop::collection::vec(
            (prop::array::uniform3(-0.2f64..0.2), 0.5f64..1.5, any::<bool>()),
            1..15,
        ),
    ) {
        let feature_rows: Vec<FeatureRow> = rows
            .iter()
            .enumerate()
            .map(|(i, (mom, oi, up))| feature_row(i, mom, *oi, *up))
            .collect();
        let snapshot = CrossSectionalSnapshot::new(date(2024, 5, 2), feature_rows).unwrap();
        let config = ScoringConfig { top_n: usize::MAX, ..ScoringConfig::default() };
        let ranked = score_snapshot(&snapshot, &config).unwrap();

        let ranks: Vec<usize> = ranked.entries.iter().map(|e| e.rank).collect();
        let expected: Vec<usize> = (1..=rows.len()).collect();
        prop_assert_eq!(ranks, expected);
        for pair in ranked.entries.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn momentum_needs_lookback_plus_one_bars(
        closes in prop::collection::vec(50.0f64..150.0, 1..40),
    ) {
        let start = date(2024, 1, 1);
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, c)| Bar::from_close(start + chrono::Days::new(i as u64), *c))
            .collect();
        let series = SymbolSeries::new("X", bars).unwrap();
        let config = FeatureConfig::default();
        let features = build_features(&series, &config);

        for row in &features {
            for (k, lookback) in config.momentum_lookbacks.iter().enumerate() {
                if row.bars_seen < lookback + 1 {
                    prop_assert!(row.momentum[k].is_none());
                } else {
                    prop_assert!(row.momentum[k].is_some());
                }
            }
        }
    }
}
