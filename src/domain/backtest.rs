//! Daily-rebalance backtest over a ranking and sizing history.
//!
//! For each date in order: risk-off records a zero return; otherwise the
//! top_n picks' next-period returns are averaged (or weighted), scaled toward
//! the volatility target and charged the liquidity slippage.

use crate::domain::costs::{SlippageTiers, VolTarget, median};
use crate::domain::error::FutalphaError;
use crate::domain::labels::ForwardReturns;
use crate::domain::metrics::Metrics;
use crate::domain::regime::RegimeState;
use crate::domain::scoring::RankedEntry;
use crate::domain::sizing::Allocation;
use chrono::NaiveDate;
use std::fmt;
use tracing::{debug, warn};

/// How the day's valid picks are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Weighting {
    #[default]
    Equal,
    VolParity,
}

impl Weighting {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "equal" => Some(Weighting::Equal),
            "vol_parity" | "vol-parity" => Some(Weighting::VolParity),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub top_n: usize,
    pub vol_target: VolTarget,
    pub slippage: SlippageTiers,
    pub weighting: Weighting,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            top_n: 5,
            vol_target: VolTarget::default(),
            slippage: SlippageTiers::default(),
            weighting: Weighting::Equal,
        }
    }
}

/// Ranking and sizing for one date, built from data up to that date.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySelection {
    pub date: NaiveDate,
    pub ranked: Vec<RankedEntry>,
    pub allocation: Allocation,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyReturn {
    pub date: NaiveDate,
    pub portfolio_return: f64,
    pub equity: f64,
    pub risk_on: bool,
    pub picks: usize,
    pub cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoValidReturns,
    NoSizedPicks,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoValidReturns => write!(f, "no picks with a next-period return"),
            SkipReason::NoSizedPicks => write!(f, "no valid pick carries a weight"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkippedDate {
    pub date: NaiveDate,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BacktestResult {
    pub points: Vec<DailyReturn>,
    pub skipped: Vec<SkippedDate>,
}

impl BacktestResult {
    pub fn returns(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.portfolio_return).collect()
    }

    pub fn final_equity(&self) -> f64 {
        self.points.last().map_or(1.0, |p| p.equity)
    }

    pub fn metrics(&self) -> Metrics {
        Metrics::from_returns(&self.returns())
    }
}

/// Runs the backtest. `history` must be in strictly increasing date order.
pub fn run_backtest(
    history: &[DailySelection],
    forward_returns: &ForwardReturns,
    regime: &RegimeState,
    config: &BacktestConfig,
) -> Result<BacktestResult, FutalphaError> {
    for pair in history.windows(2) {
        if pair[1].date <= pair[0].date {
            return Err(FutalphaError::malformed(
                "selection history",
                format!("{} follows {}", pair[1].date, pair[0].date),
            ));
        }
    }

    let mut result = BacktestResult::default();
    let mut equity = 1.0_f64;

    for day in history {
        if !regime.is_risk_on(day.date) {
            result.points.push(DailyReturn {
                date: day.date,
                portfolio_return: 0.0,
                equity,
                risk_on: false,
                picks: 0,
                cost: 0.0,
            });
            continue;
        }

        match day_return(day, forward_returns, config) {
            Ok((net, picks, cost)) => {
                equity *= 1.0 + net;
                result.points.push(DailyReturn {
                    date: day.date,
                    portfolio_return: net,
                    equity,
                    risk_on: true,
                    picks,
                    cost,
                });
            }
            Err(reason) => {
                debug!(date = %day.date, reason = %reason, "date skipped");
                result.skipped.push(SkippedDate {
                    date: day.date,
                    reason,
                });
            }
        }
    }

    if !result.skipped.is_empty() {
        warn!(
            skipped = result.skipped.len(),
            traded = result.points.len(),
            "backtest skipped dates"
        );
    }
    Ok(result)
}

fn day_return(
    day: &DailySelection,
    forward_returns: &ForwardReturns,
    config: &BacktestConfig,
) -> Result<(f64, usize, f64), SkipReason> {
    let mut picks: Vec<&RankedEntry> = day.ranked.iter().collect();
    picks.sort_by_key(|e| e.rank);
    let valid: Vec<(&RankedEntry, f64)> = picks
        .into_iter()
        .take(config.top_n)
        .filter_map(|e| forward_returns.get(day.date, &e.symbol).map(|r| (e, r)))
        .collect();
    if valid.is_empty() {
        return Err(SkipReason::NoValidReturns);
    }

    let rets: Vec<f64> = valid.iter().map(|(_, r)| *r).collect();
    let raw = match config.weighting {
        Weighting::Equal => rets.iter().sum::<f64>() / rets.len() as f64,
        Weighting::VolParity => {
            let weighted: Vec<(f64, f64)> = valid
                .iter()
                .filter_map(|(e, r)| day.allocation.weight_of(&e.symbol).map(|w| (w, *r)))
                .collect();
            let total: f64 = weighted.iter().map(|(w, _)| w).sum();
            if weighted.is_empty() || total <= 0.0 {
                return Err(SkipReason::NoSizedPicks);
            }
            weighted.iter().map(|(w, r)| w / total * r).sum::<f64>()
        }
    };

    let scaled = raw * config.vol_target.scale(&rets);
    let turnovers: Vec<f64> = valid.iter().filter_map(|(e, _)| e.turnover).collect();
    let cost = config.slippage.cost(median(&turnovers));
    Ok((scaled - cost, valid.len(), cost))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::BTreeMap;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn entry(symbol: &str, rank: usize, turnover: Option<f64>) -> RankedEntry {
        RankedEntry {
            symbol: symbol.to_string(),
            score: 1.0 / rank as f64,
            rank,
            price: 100.0,
            volatility: Some(0.01 * rank as f64),
            turnover,
            breakdown: None,
        }
    }

    fn selection(day: u32, symbols: &[&str]) -> DailySelection {
        DailySelection {
            date: d(day),
            ranked: symbols
                .iter()
                .enumerate()
                .map(|(i, s)| entry(s, i + 1, Some(1e9)))
                .collect(),
            allocation: Allocation::flat(d(day)),
        }
    }

    fn all_on(days: &[u32]) -> RegimeState {
        RegimeState::from_states(days.iter().map(|&day| (d(day), true)).collect())
    }

    #[test]
    fn risk_off_day_returns_zero() {
        let history = [selection(1, &["A"])];
        let mut fr = ForwardReturns::default();
        fr.insert(d(1), "A", 0.05);
        let regime = RegimeState::from_states(BTreeMap::from([(d(1), false)]));
        let result = run_backtest(&history, &fr, &regime, &BacktestConfig::default()).unwrap();
        assert_eq!(result.points.len(), 1);
        assert_eq!(result.points[0].portfolio_return, 0.0);
        assert_eq!(result.points[0].equity, 1.0);
        assert!(!result.points[0].risk_on);
    }

    #[test]
    fn equal_weight_mean_minus_cost() {
        let history = [selection(1, &["A", "B"])];
        let mut fr = ForwardReturns::default();
        fr.insert(d(1), "A", 0.002);
        fr.insert(d(1), "B", 0.004);
        let result =
            run_backtest(&history, &fr, &all_on(&[1]), &BacktestConfig::default()).unwrap();
        // realized vol is tiny, so the scale caps at 1; turnover 1e9 costs 0.10%
        assert_relative_eq!(result.points[0].portfolio_return, 0.003 - 0.001, epsilon = 1e-12);
        assert_relative_eq!(result.points[0].cost, 0.001);
    }

    #[test]
    fn missing_returns_are_dropped() {
        let history = [selection(1, &["A", "B"])];
        let mut fr = ForwardReturns::default();
        fr.insert(d(1), "B", 0.01);
        let result =
            run_backtest(&history, &fr, &all_on(&[1]), &BacktestConfig::default()).unwrap();
        assert_eq!(result.points[0].picks, 1);
        assert_relative_eq!(result.points[0].portfolio_return, 0.01 - 0.001, epsilon = 1e-12);
    }

    #[test]
    fn no_valid_returns_skips_date() {
        let history = [selection(1, &["A"]), selection(2, &["A"])];
        let mut fr = ForwardReturns::default();
        fr.insert(d(2), "A", 0.01);
        let result =
            run_backtest(&history, &fr, &all_on(&[1, 2]), &BacktestConfig::default()).unwrap();
        assert_eq!(result.points.len(), 1);
        assert_eq!(result.points[0].date, d(2));
        assert_eq!(
            result.skipped,
            vec![SkippedDate {
                date: d(1),
                reason: SkipReason::NoValidReturns
            }]
        );
    }

    #[test]
    fn only_top_n_are_traded() {
        let history = [selection(1, &["A", "B", "C"])];
        let mut fr = ForwardReturns::default();
        fr.insert(d(1), "A", 0.01);
        fr.insert(d(1), "B", 0.01);
        fr.insert(d(1), "C", -0.5);
        let config = BacktestConfig {
            top_n: 2,
            ..BacktestConfig::default()
        };
        let result = run_backtest(&history, &fr, &all_on(&[1]), &config).unwrap();
        assert_eq!(result.points[0].picks, 2);
        assert!(result.points[0].portfolio_return > 0.0);
    }

    #[test]
    fn equity_compounds_in_date_order() {
        let history = [selection(1, &["A"]), selection(2, &["A"])];
        let mut fr = ForwardReturns::default();
        fr.insert(d(1), "A", 0.011);
        fr.insert(d(2), "A", 0.021);
        let result =
            run_backtest(&history, &fr, &all_on(&[1, 2]), &BacktestConfig::default()).unwrap();
        assert_relative_eq!(result.final_equity(), 1.01 * 1.02, epsilon = 1e-12);
    }

    #[test]
    fn out_of_order_history_is_rejected() {
        let history = [selection(2, &["A"]), selection(1, &["A"])];
        let err = run_backtest(
            &history,
            &ForwardReturns::default(),
            &all_on(&[1, 2]),
            &BacktestConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FutalphaError::MalformedInput { .. }));
    }

    #[test]
    fn vol_parity_uses_allocation() {
        let mut day = selection(1, &["A", "B"]);
        day.allocation = Allocation {
            date: d(1),
            weights: vec![("A".into(), 0.25), ("B".into(), 0.75)],
        };
        let mut fr = ForwardReturns::default();
        fr.insert(d(1), "A", 0.004);
        fr.insert(d(1), "B", 0.0);
        let config = BacktestConfig {
            weighting: Weighting::VolParity,
            ..BacktestConfig::default()
        };
        let result = run_backtest(&[day], &fr, &all_on(&[1]), &config).unwrap();
        assert_relative_eq!(result.points[0].portfolio_return, 0.001 - 0.001, epsilon = 1e-12);
    }

    #[test]
    fn vol_parity_without_weights_skips() {
        let mut fr = ForwardReturns::default();
        fr.insert(d(1), "A", 0.01);
        let config = BacktestConfig {
            weighting: Weighting::VolParity,
            ..BacktestConfig::default()
        };
        let result = run_backtest(&[selection(1, &["A"])], &fr, &all_on(&[1]), &config).unwrap();
        assert_eq!(result.skipped[0].reason, SkipReason::NoSizedPicks);
    }

    #[test]
    fn high_dispersion_is_scaled_down() {
        let history = [selection(1, &["A", "B"])];
        let mut fr = ForwardReturns::default();
        fr.insert(d(1), "A", 0.10);
        fr.insert(d(1), "B", -0.02);
        let result =
            run_backtest(&history, &fr, &all_on(&[1]), &BacktestConfig::default()).unwrap();
        let scale = VolTarget::default().scale(&[0.10, -0.02]);
        assert!(scale < 1.0);
        assert_relative_eq!(
            result.points[0].portfolio_return,
            0.04 * scale - 0.001,
            epsilon = 1e-12
        );
    }

    #[test]
    fn parse_weighting() {
        assert_eq!(Weighting::parse("vol_parity"), Some(Weighting::VolParity));
        assert_eq!(Weighting::parse("EQUAL"), Some(Weighting::Equal));
        assert_eq!(Weighting::parse("kelly"), None);
    }
}
