//! Pluggable scoring used by the walk-forward validator.

use crate::domain::error::FutalphaError;
use crate::domain::features::FeatureRow;
use crate::domain::scoring::{composite_score, zscores};
use chrono::NaiveDate;
use std::collections::BTreeMap;

pub const OI_COLUMN: &str = "oi_breakout";
pub const VOLATILITY_COLUMN: &str = "volatility";
pub const TREND_COLUMN: &str = "trend";

pub fn momentum_column(lookback: usize) -> String {
    format!("mom_{lookback}")
}

/// Dense feature rows keyed by (date, symbol).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    pub keys: Vec<(NaiveDate, String)>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn with_columns(columns: Vec<String>) -> Self {
        FeatureMatrix {
            keys: Vec::new(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Column names for the given momentum lookbacks plus OI, volatility and trend.
    pub fn standard_columns(lookbacks: &[usize]) -> Vec<String> {
        lookbacks
            .iter()
            .map(|&lb| momentum_column(lb))
            .chain([
                OI_COLUMN.to_string(),
                VOLATILITY_COLUMN.to_string(),
                TREND_COLUMN.to_string(),
            ])
            .collect()
    }

    pub fn push(&mut self, date: NaiveDate, symbol: &str, values: Vec<f64>) {
        self.keys.push((date, symbol.to_string()));
        self.rows.push(values);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Result<usize, FutalphaError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| FutalphaError::Model {
                reason: format!("feature matrix has no column '{name}'"),
            })
    }
}

/// Standard feature vector for a row, `None` if any value is missing.
pub fn feature_vector(row: &FeatureRow) -> Option<Vec<f64>> {
    let mut values = Vec::with_capacity(row.momentum.len() + 3);
    for m in &row.momentum {
        values.push((*m)?);
    }
    values.push(Some(row.oi_breakout).filter(|v| v.is_finite())?);
    values.push(row.volatility?);
    if row.trend_ema.is_none() {
        return None;
    }
    values.push(if row.in_uptrend() { 1.0 } else { 0.0 });
    Some(values)
}

/// Which `PredictiveScorer` the validator builds per fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScorerKind {
    #[default]
    Rule,
    Gbm,
}

impl ScorerKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "rule" => Some(ScorerKind::Rule),
            "gbm" | "ml" => Some(ScorerKind::Gbm),
            _ => None,
        }
    }
}

/// A scorer fit on a training window and asked for continuous scores.
pub trait PredictiveScorer: Send {
    fn name(&self) -> &str;

    fn fit(&mut self, features: &FeatureMatrix, labels: &[f64]) -> Result<(), FutalphaError>;

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, FutalphaError>;
}

/// The cross-sectional momentum formula as a scorer. Needs no fitting.
#[derive(Debug, Clone)]
pub struct RuleScorer {
    lookbacks: Vec<usize>,
    weights: Vec<f64>,
    trend_boost: f64,
}

impl RuleScorer {
    pub fn new(lookbacks: Vec<usize>, weights: Vec<f64>, trend_boost: f64) -> Self {
        RuleScorer {
            lookbacks,
            weights,
            trend_boost,
        }
    }
}

impl PredictiveScorer for RuleScorer {
    fn name(&self) -> &str {
        "rule"
    }

    fn fit(&mut self, _features: &FeatureMatrix, _labels: &[f64]) -> Result<(), FutalphaError> {
        Ok(())
    }

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, FutalphaError> {
        let mom_idx: Vec<usize> = self
            .lookbacks
            .iter()
            .map(|&lb| features.column_index(&momentum_column(lb)))
            .collect::<Result<_, _>>()?;
        let oi_idx = features.column_index(OI_COLUMN)?;
        let trend_idx = features.column_index(TREND_COLUMN)?;

        let mut by_date: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
        for (i, (date, _)) in features.keys.iter().enumerate() {
            by_date.entry(*date).or_default().push(i);
        }

        let mut scores = vec![0.0; features.len()];
        for members in by_date.values() {
            let z_columns: Vec<Vec<f64>> = mom_idx
                .iter()
                .map(|&c| {
                    let column: Vec<f64> = members.iter().map(|&i| features.rows[i][c]).collect();
                    zscores(&column)
                })
                .collect();
            for (pos, &i) in members.iter().enumerate() {
                let z: Vec<f64> = z_columns.iter().map(|col| col[pos]).collect();
                let row = &features.rows[i];
                scores[i] = composite_score(
                    &z,
                    &self.weights,
                    row[oi_idx],
                    row[trend_idx],
                    self.trend_boost,
                )
                .score();
            }
        }
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn matrix() -> FeatureMatrix {
        let mut m = FeatureMatrix::with_columns(FeatureMatrix::standard_columns(&[3, 5, 10]));
        m.push(d(1), "A", vec![0.03, 0.04, 0.05, 1.1, 0.01, 1.0]);
        m.push(d(1), "B", vec![0.02, 0.02, 0.02, 1.0, 0.01, 0.0]);
        m.push(d(1), "C", vec![0.01, 0.00, -0.01, 0.9, 0.01, 0.0]);
        m.push(d(2), "A", vec![0.01, 0.01, 0.01, 1.0, 0.01, 0.0]);
        m
    }

    #[test]
    fn standard_columns_order() {
        assert_eq!(
            FeatureMatrix::standard_columns(&[3, 5]),
            vec!["mom_3", "mom_5", "oi_breakout", "volatility", "trend"]
        );
    }

    #[test]
    fn rule_scorer_ranks_within_date() {
        let scorer = RuleScorer::new(vec![3, 5, 10], vec![0.4, 0.3, 0.3], 0.3);
        let scores = scorer.predict(&matrix()).unwrap();
        assert!(scores[0] > scores[1]);
        assert!(scores[1] > scores[2]);
        // lone symbol on a date has zero z-scores
        assert_eq!(scores[3], 0.0);
    }

    #[test]
    fn rule_scorer_matches_formula() {
        let scorer = RuleScorer::new(vec![3, 5, 10], vec![0.4, 0.3, 0.3], 0.3);
        let scores = scorer.predict(&matrix()).unwrap();
        let z3 = zscores(&[0.03, 0.02, 0.01]);
        let z5 = zscores(&[0.04, 0.02, 0.0]);
        let z10 = zscores(&[0.05, 0.02, -0.01]);
        let expected = (0.4 * z3[0] + 0.3 * z5[0] + 0.3 * z10[0]) * 1.1 * 1.3;
        assert_relative_eq!(scores[0], expected, epsilon = 1e-9);
    }

    #[test]
    fn parse_scorer_kind() {
        assert_eq!(ScorerKind::parse("GBM"), Some(ScorerKind::Gbm));
        assert_eq!(ScorerKind::parse("rule"), Some(ScorerKind::Rule));
        assert_eq!(ScorerKind::parse("xgb"), None);
    }

    #[test]
    fn missing_column_is_model_error() {
        let m = FeatureMatrix::with_columns(vec!["mom_3".into()]);
        let scorer = RuleScorer::new(vec![3], vec![1.0], 0.3);
        assert!(matches!(
            scorer.predict(&m),
            Err(FutalphaError::Model { .. })
        ));
    }

    #[test]
    fn feature_vector_requires_all_values() {
        let mut row = FeatureRow {
            date: d(1),
            symbol: "A".into(),
            price: 101.0,
            momentum: vec![Some(0.01), Some(0.02)],
            temporal_z: vec![None, None],
            oi_breakout: 1.2,
            volatility: Some(0.015),
            trend_ema: Some(100.0),
            turnover: None,
            bars_seen: 30,
        };
        assert_eq!(
            feature_vector(&row),
            Some(vec![0.01, 0.02, 1.2, 0.015, 1.0])
        );
        row.volatility = None;
        assert_eq!(feature_vector(&row), None);
    }
}
