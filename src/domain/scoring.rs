//! Cross-sectional scoring and ranking.
//!
//! SCORE = (sum_k w_k * z(mom_k)) * oi_breakout * (1 + boost * trend)
//!
//! Momentum is z-scored across the symbols present on the date. The liquidity
//! filter runs after scoring so it never changes the relative scores.

use crate::domain::error::FutalphaError;
use crate::domain::features::{FeatureRow, NEUTRAL_BREAKOUT};
use crate::domain::indicator::stddev::sample_stddev;
use crate::domain::snapshot::CrossSectionalSnapshot;
use chrono::NaiveDate;
use tracing::warn;

/// How momentum is normalized before weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalizationMode {
    /// z-score across symbols on the same date.
    #[default]
    CrossSectional,
    /// z-score against each symbol's own rolling history.
    Temporal,
}

impl NormalizationMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "cross_sectional" | "cross-sectional" => Some(NormalizationMode::CrossSectional),
            "temporal" => Some(NormalizationMode::Temporal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    /// One weight per momentum lookback, in lookback order.
    pub momentum_weights: Vec<f64>,
    pub trend_boost: f64,
    pub min_liquidity: Option<f64>,
    pub top_n: usize,
    pub normalization: NormalizationMode,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            momentum_weights: vec![0.4, 0.3, 0.3],
            trend_boost: 0.30,
            min_liquidity: Some(1e7),
            top_n: 5,
            normalization: NormalizationMode::CrossSectional,
        }
    }
}

/// Components behind a rule-based score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    pub z_momentum: Vec<f64>,
    pub score_mom: f64,
    pub score_oi: f64,
    pub trend_boost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    pub symbol: String,
    pub score: f64,
    pub rank: usize,
    pub price: f64,
    pub volatility: Option<f64>,
    pub turnover: Option<f64>,
    /// `None` when the score came from an external model.
    pub breakdown: Option<ScoreBreakdown>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedSnapshot {
    pub date: NaiveDate,
    pub entries: Vec<RankedEntry>,
}

/// Cross-sectional z-scores with the sample std; all zero when the std is
/// zero or fewer than two values are present.
pub fn zscores(values: &[f64]) -> Vec<f64> {
    let mean = values.iter().sum::<f64>() / values.len().max(1) as f64;
    match sample_stddev(values) {
        Some(sd) if sd > 0.0 => values.iter().map(|v| (v - mean) / sd).collect(),
        _ => vec![0.0; values.len()],
    }
}

/// Combines normalized momentum with the OI multiplier and trend boost.
pub fn composite_score(
    z_momentum: &[f64],
    weights: &[f64],
    oi_breakout: f64,
    trend: f64,
    boost: f64,
) -> ScoreBreakdown {
    let score_mom: f64 = z_momentum.iter().zip(weights).map(|(z, w)| z * w).sum();
    ScoreBreakdown {
        z_momentum: z_momentum.to_vec(),
        score_mom,
        score_oi: oi_breakout,
        trend_boost: trend * boost,
    }
}

impl ScoreBreakdown {
    pub fn score(&self) -> f64 {
        self.score_mom * self.score_oi * (1.0 + self.trend_boost)
    }
}

/// Scores every row of `snapshot`, filters for liquidity and ranks.
pub fn score_snapshot(
    snapshot: &CrossSectionalSnapshot,
    config: &ScoringConfig,
) -> Result<RankedSnapshot, FutalphaError> {
    let breakdowns = score_rows(&snapshot.rows, config);
    let scored = snapshot
        .rows
        .iter()
        .zip(breakdowns)
        .map(|(row, b)| (row, b.score(), Some(b)))
        .collect();
    rank(snapshot.date, scored, config)
}

/// Ranks externally produced scores through the same filter and ordering.
pub fn rank_scores(
    date: NaiveDate,
    rows: &[FeatureRow],
    scores: &[f64],
    config: &ScoringConfig,
) -> Result<RankedSnapshot, FutalphaError> {
    if rows.len() != scores.len() {
        return Err(FutalphaError::malformed(
            date.to_string(),
            format!("{} rows but {} scores", rows.len(), scores.len()),
        ));
    }
    let scored = rows
        .iter()
        .zip(scores)
        .map(|(row, &s)| (row, if s.is_finite() { s } else { 0.0 }, None))
        .collect();
    rank(date, scored, config)
}

fn score_rows(rows: &[FeatureRow], config: &ScoringConfig) -> Vec<ScoreBreakdown> {
    let lookbacks = config.momentum_weights.len();
    let z_columns: Vec<Vec<f64>> = (0..lookbacks)
        .map(|k| match config.normalization {
            NormalizationMode::CrossSectional => {
                let column: Vec<f64> = rows
                    .iter()
                    .map(|r| r.momentum.get(k).copied().flatten().unwrap_or(0.0))
                    .collect();
                zscores(&column)
            }
            NormalizationMode::Temporal => rows
                .iter()
                .map(|r| r.temporal_z.get(k).copied().flatten().unwrap_or(0.0))
                .collect(),
        })
        .collect();

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let z: Vec<f64> = z_columns.iter().map(|col| col[i]).collect();
            let oi = if row.oi_breakout.is_finite() {
                row.oi_breakout
            } else {
                NEUTRAL_BREAKOUT
            };
            let trend = if row.in_uptrend() { 1.0 } else { 0.0 };
            composite_score(&z, &config.momentum_weights, oi, trend, config.trend_boost)
        })
        .collect()
}

fn rank(
    date: NaiveDate,
    scored: Vec<(&FeatureRow, f64, Option<ScoreBreakdown>)>,
    config: &ScoringConfig,
) -> Result<RankedSnapshot, FutalphaError> {
    let mut kept = liquidity_filter(scored, config.min_liquidity);
    if kept.is_empty() {
        warn!(date = %date, "empty universe after liquidity filter");
        return Err(FutalphaError::EmptyUniverse { date });
    }

    // stable: equal scores keep their input order
    kept.sort_by(|a, b| b.1.total_cmp(&a.1));

    let entries = kept
        .into_iter()
        .take(config.top_n)
        .enumerate()
        .map(|(i, (row, score, breakdown))| RankedEntry {
            symbol: row.symbol.clone(),
            score,
            rank: i + 1,
            price: row.price,
            volatility: row.volatility,
            turnover: row.turnover,
            breakdown,
        })
        .collect();

    Ok(RankedSnapshot { date, entries })
}

fn liquidity_filter<'a>(
    scored: Vec<(&'a FeatureRow, f64, Option<ScoreBreakdown>)>,
    min_liquidity: Option<f64>,
) -> Vec<(&'a FeatureRow, f64, Option<ScoreBreakdown>)> {
    let Some(min) = min_liquidity else {
        return scored;
    };
    if scored.iter().all(|(row, _, _)| row.turnover.is_none()) {
        return scored;
    }
    scored
        .into_iter()
        .filter(|(row, _, _)| row.turnover.is_some_and(|t| t >= min))
        .collect()
}

/// Human-readable lines for the top `k` entries.
pub fn explain(ranked: &RankedSnapshot, k: usize) -> Vec<String> {
    ranked
        .entries
        .iter()
        .take(k)
        .map(|e| {
            let vol = e
                .volatility
                .map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"));
            match &e.breakdown {
                Some(b) => format!(
                    "#{} {} score={:.4} mom={:.4} oi={:.3} trend={:.2} vol={}",
                    e.rank, e.symbol, e.score, b.score_mom, b.score_oi, b.trend_boost, vol
                ),
                None => format!("#{} {} score={:.4} vol={}", e.rank, e.symbol, e.score, vol),
            }
        })
        .collect()
}
