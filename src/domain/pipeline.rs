//! End-to-end runs over a loaded universe: ranking history, single-date
//! ranking, backtest and walk-forward validation.

use crate::domain::backtest::{run_backtest, BacktestResult, DailySelection};
use crate::domain::config::PipelineConfig;
use crate::domain::error::FutalphaError;
use crate::domain::features::build_all;
use crate::domain::gbm::GradientBoostedScorer;
use crate::domain::labels::ForwardReturns;
use crate::domain::regime::{detect_regime, RegimeState};
use crate::domain::scorer::{FeatureMatrix, PredictiveScorer, RuleScorer, ScorerKind};
use crate::domain::scoring::{score_snapshot, RankedSnapshot};
use crate::domain::series::SymbolSeries;
use crate::domain::sizing::{size_positions, Allocation};
use crate::domain::snapshot::build_snapshots;
use crate::domain::universe::{validate_universe, UniverseValidationResult};
use crate::domain::walkforward::{
    build_labeled_rows, latest_scorable_date, rank_as_of, run_walk_forward, FoldSettings,
    WalkForwardReport,
};
use crate::ports::series_port::SeriesPort;
use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{info, warn};

/// Resolves the configured symbols (or everything the port lists) and
/// validates them against the feature warmup.
pub fn load_universe(
    port: &dyn SeriesPort,
    config: &PipelineConfig,
) -> Result<UniverseValidationResult, FutalphaError> {
    let symbols = match &config.data.symbols {
        Some(symbols) => symbols.clone(),
        None => port.list_symbols()?,
    };
    if symbols.is_empty() {
        return Err(FutalphaError::NoUsableOutput {
            reason: format!("no symbols found in {}", config.data.dir.display()),
        });
    }
    validate_universe(
        port,
        &symbols,
        config.features.min_bars(),
        config.data.start_date,
        config.data.end_date,
    )
}

/// Rankings and weights for every date with a non-empty universe.
#[derive(Debug, Clone, Default)]
pub struct RankingHistory {
    pub rankings: Vec<RankedSnapshot>,
    pub allocations: Vec<Allocation>,
}

impl RankingHistory {
    pub fn selections(&self) -> Vec<DailySelection> {
        self.rankings
            .iter()
            .zip(&self.allocations)
            .map(|(ranked, allocation)| DailySelection {
                date: ranked.date,
                ranked: ranked.entries.clone(),
                allocation: allocation.clone(),
            })
            .collect()
    }
}

pub fn rank_history(
    series: &[SymbolSeries],
    config: &PipelineConfig,
) -> Result<RankingHistory, FutalphaError> {
    let features = build_all(series, &config.features);
    let snapshots = build_snapshots(&features, &config.features)?;

    let scored: Vec<Option<RankedSnapshot>> = snapshots
        .par_iter()
        .map(|snapshot| match score_snapshot(snapshot, &config.scoring) {
            Ok(ranked) => Ok(Some(ranked)),
            Err(FutalphaError::EmptyUniverse { date }) => {
                warn!(date = %date, reason = "no symbol passed the liquidity filter", "date skipped");
                Ok(None)
            }
            Err(e) => Err(e),
        })
        .collect::<Result<_, FutalphaError>>()?;
    let rankings: Vec<RankedSnapshot> = scored.into_iter().flatten().collect();

    if rankings.is_empty() {
        return Err(FutalphaError::NoUsableOutput {
            reason: "no date produced a ranking".to_string(),
        });
    }

    let allocations = rankings
        .iter()
        .map(|r| size_positions(r.date, &r.entries, &config.sizing))
        .collect();
    info!(dates = rankings.len(), symbols = series.len(), "ranking history built");
    Ok(RankingHistory {
        rankings,
        allocations,
    })
}

/// Ranks a single date, the latest available one when `date` is `None`.
pub fn rank_on(
    series: &[SymbolSeries],
    config: &PipelineConfig,
    date: Option<NaiveDate>,
) -> Result<(RankedSnapshot, Allocation), FutalphaError> {
    let features = build_all(series, &config.features);
    let snapshots = build_snapshots(&features, &config.features)?;

    let snapshot = match date {
        Some(d) => snapshots
            .iter()
            .find(|s| s.date == d)
            .ok_or(FutalphaError::EmptyUniverse { date: d })?,
        None => snapshots
            .last()
            .ok_or_else(|| FutalphaError::NoUsableOutput {
                reason: "no date has enough history to rank".to_string(),
            })?,
    };

    let ranked = score_snapshot(snapshot, &config.scoring)?;
    let allocation = size_positions(ranked.date, &ranked.entries, &config.sizing);
    Ok((ranked, allocation))
}

/// Single-date ranking with the chosen scorer. The rule formula ranks the
/// snapshot directly; a fitted scorer trains on every labeled row dated
/// before the target date and scores that date.
pub fn rank_with(
    series: &[SymbolSeries],
    config: &PipelineConfig,
    date: Option<NaiveDate>,
    kind: ScorerKind,
) -> Result<(RankedSnapshot, Allocation), FutalphaError> {
    if kind == ScorerKind::Rule {
        return rank_on(series, config, date);
    }

    let features = build_all(series, &config.features);
    let rows = build_labeled_rows(series, &features, config.data.price_field);
    let as_of = match date {
        Some(d) => d,
        None => latest_scorable_date(&rows).ok_or_else(|| FutalphaError::NoUsableOutput {
            reason: "no date has enough history to rank".to_string(),
        })?,
    };

    let columns = FeatureMatrix::standard_columns(&config.features.momentum_lookbacks);
    let mut scorer = make_scorer(kind, config);
    let ranking = rank_as_of(&rows, as_of, &columns, scorer.as_mut(), &config.scoring)?;
    let allocation = size_positions(as_of, &ranking.ranked.entries, &config.sizing);
    Ok((ranking.ranked, allocation))
}

#[derive(Debug, Clone)]
pub struct BacktestRun {
    pub history: RankingHistory,
    pub regime: RegimeState,
    pub result: BacktestResult,
}

pub fn backtest(
    series: &[SymbolSeries],
    config: &PipelineConfig,
) -> Result<BacktestRun, FutalphaError> {
    let history = rank_history(series, config)?;
    let regime = detect_regime(series, config.data.price_field, &config.regime);
    let forward = ForwardReturns::from_series(series, config.data.price_field);

    let result = run_backtest(&history.selections(), &forward, &regime, &config.backtest)?;
    if result.points.is_empty() {
        return Err(FutalphaError::NoUsableOutput {
            reason: format!(
                "backtest skipped all {} ranked dates",
                history.rankings.len()
            ),
        });
    }

    info!(
        days = result.points.len(),
        skipped = result.skipped.len(),
        final_equity = result.final_equity(),
        "backtest complete"
    );
    Ok(BacktestRun {
        history,
        regime,
        result,
    })
}

/// Builds a fresh, unfitted scorer of the requested kind.
pub fn make_scorer(kind: ScorerKind, config: &PipelineConfig) -> Box<dyn PredictiveScorer> {
    match kind {
        ScorerKind::Rule => Box::new(RuleScorer::new(
            config.features.momentum_lookbacks.clone(),
            config.scoring.momentum_weights.clone(),
            config.scoring.trend_boost,
        )),
        ScorerKind::Gbm => Box::new(GradientBoostedScorer::new(config.gbm.clone())),
    }
}

pub fn walk_forward(
    series: &[SymbolSeries],
    config: &PipelineConfig,
    kind: ScorerKind,
) -> Result<WalkForwardReport, FutalphaError> {
    let features = build_all(series, &config.features);
    let rows = build_labeled_rows(series, &features, config.data.price_field);
    let regime = detect_regime(series, config.data.price_field, &config.regime);

    let settings = FoldSettings {
        feature: &config.features,
        scoring: &config.scoring,
        sizing: &config.sizing,
        backtest: &config.backtest,
        regime: &regime,
    };
    let factory = || make_scorer(kind, config);
    run_walk_forward(&rows, &factory, &settings, &config.walkforward)
}
