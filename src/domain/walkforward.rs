//! Calendar-year walk-forward validation.
//!
//! For each year Y the scorer is trained on rows dated before Jan 1 of Y and
//! scored on rows inside Y. A fresh scorer is built per fold and dropped when
//! the fold ends.

use crate::domain::backtest::{BacktestConfig, BacktestResult, DailySelection, run_backtest};
use crate::domain::error::FutalphaError;
use crate::domain::features::{FeatureConfig, FeatureRow};
use crate::domain::labels::{ForwardReturns, clip_label, next_period_returns};
use crate::domain::metrics::Metrics;
use crate::domain::regime::RegimeState;
use crate::domain::scorer::{FeatureMatrix, PredictiveScorer, feature_vector};
use crate::domain::scoring::{RankedSnapshot, ScoringConfig, rank_scores};
use crate::domain::series::{PriceField, SymbolSeries};
use crate::domain::sizing::{SizingConfig, size_positions};
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct WalkForwardConfig {
    /// First calendar year used as a test window.
    pub min_year: i32,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        WalkForwardConfig { min_year: 2022 }
    }
}

/// One (date, symbol) observation for training and scoring.
#[derive(Debug, Clone)]
pub struct LabeledRow {
    pub row: FeatureRow,
    /// Standard feature vector; `None` when any feature is missing.
    pub features: Option<Vec<f64>>,
    /// Next-period return clipped for training.
    pub label: Option<f64>,
    /// Unclipped next-period return used for PnL.
    pub next_return: Option<f64>,
}

impl LabeledRow {
    pub fn date(&self) -> NaiveDate {
        self.row.date
    }

    fn is_complete(&self) -> bool {
        self.features.is_some() && self.label.is_some()
    }
}

/// Joins per-symbol feature rows with their next-period returns, ordered by
/// date then input symbol order.
pub fn build_labeled_rows(
    series: &[SymbolSeries],
    features: &[Vec<FeatureRow>],
    field: PriceField,
) -> Vec<LabeledRow> {
    let mut rows: Vec<LabeledRow> = series
        .iter()
        .zip(features)
        .flat_map(|(s, feature_rows)| {
            feature_rows
                .iter()
                .zip(next_period_returns(s, field))
                .map(|(row, next)| LabeledRow {
                    row: row.clone(),
                    features: feature_vector(row),
                    label: next.map(clip_label),
                    next_return: next,
                })
                .collect::<Vec<_>>()
        })
        .collect();
    // stable: symbols keep input order within a date
    rows.sort_by_key(|r| r.date());
    rows
}

#[derive(Debug, Clone)]
pub struct FoldResult {
    pub year: i32,
    pub train_rows: usize,
    pub test_rows: usize,
    pub train_max_date: NaiveDate,
    pub result: BacktestResult,
    pub metrics: Metrics,
}

#[derive(Debug, Clone)]
pub struct WalkForwardReport {
    pub scorer: String,
    pub folds: Vec<FoldResult>,
    /// Metrics over the concatenated fold returns.
    pub aggregate: Metrics,
}

/// Settings shared by every fold.
pub struct FoldSettings<'a> {
    pub feature: &'a FeatureConfig,
    pub scoring: &'a ScoringConfig,
    pub sizing: &'a SizingConfig,
    pub backtest: &'a BacktestConfig,
    pub regime: &'a RegimeState,
}

pub fn run_walk_forward(
    rows: &[LabeledRow],
    make_scorer: &dyn Fn() -> Box<dyn PredictiveScorer>,
    settings: &FoldSettings<'_>,
    config: &WalkForwardConfig,
) -> Result<WalkForwardReport, FutalphaError> {
    let years: BTreeSet<i32> = rows
        .iter()
        .map(|r| r.date().year())
        .filter(|&y| y >= config.min_year)
        .collect();
    let columns = FeatureMatrix::standard_columns(&settings.feature.momentum_lookbacks);

    let mut folds = Vec::new();
    let mut scorer_name = String::new();
    for year in years {
        let mut scorer = make_scorer();
        scorer_name = scorer.name().to_string();
        if let Some(fold) = run_fold(year, rows, &columns, scorer.as_mut(), settings)? {
            info!(
                year = year,
                train = fold.train_rows,
                test = fold.test_rows,
                cagr = fold.metrics.cagr,
                sharpe = fold.metrics.sharpe_ratio,
                "fold complete"
            );
            folds.push(fold);
        }
    }

    if folds.is_empty() {
        return Err(FutalphaError::NoUsableOutput {
            reason: format!("no walk-forward fold from {} produced returns", config.min_year),
        });
    }

    let all_returns: Vec<f64> = folds.iter().flat_map(|f| f.result.returns()).collect();
    Ok(WalkForwardReport {
        scorer: scorer_name,
        aggregate: Metrics::from_returns(&all_returns),
        folds,
    })
}

fn run_fold(
    year: i32,
    rows: &[LabeledRow],
    columns: &[String],
    scorer: &mut dyn PredictiveScorer,
    settings: &FoldSettings<'_>,
) -> Result<Option<FoldResult>, FutalphaError> {
    let train: Vec<&LabeledRow> = rows
        .iter()
        .filter(|r| r.date().year() < year && r.is_complete())
        .collect();
    let test: Vec<&LabeledRow> = rows
        .iter()
        .filter(|r| r.date().year() == year && r.is_complete())
        .collect();
    if train.is_empty() || test.is_empty() {
        warn!(
            year = year,
            train = train.len(),
            test = test.len(),
            "skipping fold without usable train/test rows"
        );
        return Ok(None);
    }

    let train_matrix = to_matrix(&train, columns);
    let labels: Vec<f64> = train.iter().filter_map(|r| r.label).collect();
    scorer.fit(&train_matrix, &labels)?;
    let scores = scorer.predict(&to_matrix(&test, columns))?;

    let history = selections(&test, &scores, settings)?;
    let mut forward = ForwardReturns::default();
    for r in &test {
        if let Some(ret) = r.next_return {
            forward.insert(r.date(), &r.row.symbol, ret);
        }
    }
    let result = run_backtest(&history, &forward, settings.regime, settings.backtest)?;
    if result.points.is_empty() {
        warn!(year = year, "skipping fold with no traded dates");
        return Ok(None);
    }

    let train_max_date = train
        .iter()
        .map(|r| r.date())
        .max()
        .unwrap_or(NaiveDate::MIN);
    Ok(Some(FoldResult {
        year,
        train_rows: train.len(),
        test_rows: test.len(),
        train_max_date,
        metrics: result.metrics(),
        result,
    }))
}

/// A single-date ranking from a scorer fit on everything before that date.
#[derive(Debug, Clone)]
pub struct AsOfRanking {
    pub ranked: RankedSnapshot,
    pub train_rows: usize,
    pub train_max_date: NaiveDate,
}

/// Last date carrying at least one row with a full feature vector.
pub fn latest_scorable_date(rows: &[LabeledRow]) -> Option<NaiveDate> {
    rows.iter()
        .filter(|r| r.features.is_some())
        .map(|r| r.date())
        .max()
}

/// Fits `scorer` on complete rows dated strictly before `as_of`, then scores
/// and ranks the rows dated `as_of`. Those rows need features but no label.
pub fn rank_as_of(
    rows: &[LabeledRow],
    as_of: NaiveDate,
    columns: &[String],
    scorer: &mut dyn PredictiveScorer,
    scoring: &ScoringConfig,
) -> Result<AsOfRanking, FutalphaError> {
    let train: Vec<&LabeledRow> = rows
        .iter()
        .filter(|r| r.date() < as_of && r.is_complete())
        .collect();
    let target: Vec<&LabeledRow> = rows
        .iter()
        .filter(|r| r.date() == as_of && r.features.is_some())
        .collect();
    if target.is_empty() {
        return Err(FutalphaError::EmptyUniverse { date: as_of });
    }
    if train.is_empty() {
        return Err(FutalphaError::NoUsableOutput {
            reason: format!("no labeled rows before {as_of} to train on"),
        });
    }

    let labels: Vec<f64> = train.iter().filter_map(|r| r.label).collect();
    scorer.fit(&to_matrix(&train, columns), &labels)?;
    let scores = scorer.predict(&to_matrix(&target, columns))?;

    let target_rows: Vec<FeatureRow> = target.iter().map(|r| r.row.clone()).collect();
    let ranked = rank_scores(as_of, &target_rows, &scores, scoring)?;
    let train_max_date = train
        .iter()
        .map(|r| r.date())
        .max()
        .unwrap_or(NaiveDate::MIN);
    info!(
        date = %as_of,
        scorer = scorer.name(),
        train = train.len(),
        scored = target.len(),
        "as-of ranking built"
    );
    Ok(AsOfRanking {
        ranked,
        train_rows: train.len(),
        train_max_date,
    })
}

fn to_matrix(rows: &[&LabeledRow], columns: &[String]) -> FeatureMatrix {
    let mut matrix = FeatureMatrix::with_columns(columns.to_vec());
    for r in rows {
        if let Some(values) = &r.features {
            matrix.push(r.date(), &r.row.symbol, values.clone());
        }
    }
    matrix
}

/// Ranks and sizes the scored test rows date by date.
fn selections(
    test: &[&LabeledRow],
    scores: &[f64],
    settings: &FoldSettings<'_>,
) -> Result<Vec<DailySelection>, FutalphaError> {
    let mut by_date: BTreeMap<NaiveDate, (Vec<FeatureRow>, Vec<f64>)> = BTreeMap::new();
    for (r, &score) in test.iter().zip(scores) {
        let slot = by_date.entry(r.date()).or_default();
        slot.0.push(r.row.clone());
        slot.1.push(score);
    }

    let mut history = Vec::with_capacity(by_date.len());
    for (date, (rows, day_scores)) in by_date {
        let ranked = match rank_scores(date, &rows, &day_scores, settings.scoring) {
            Ok(ranked) => ranked,
            Err(FutalphaError::EmptyUniverse { .. }) => continue,
            Err(e) => return Err(e),
        };
        let allocation = size_positions(date, &ranked.entries, settings.sizing);
        history.push(DailySelection {
            date,
            ranked: ranked.entries,
            allocation,
        });
    }
    Ok(history)
}
