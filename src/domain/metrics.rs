//! Performance metrics over a daily net-return series.

use crate::domain::indicator::stddev::sample_stddev;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
/// Shortest horizon used to annualize, in years.
const MIN_YEARS: f64 = 0.25;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_return: f64,
    pub cagr: f64,
    pub annualized_vol: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Worst `equity / running_max - 1`, zero or negative.
    pub max_drawdown: f64,
    /// Longest run of days spent below a prior peak.
    pub max_drawdown_duration: i64,
    pub win_rate: f64,
    pub trading_days: usize,
}

impl Metrics {
    pub fn from_returns(returns: &[f64]) -> Self {
        let trading_days = returns.len();
        let equity_curve = equity_curve(returns);
        let final_equity = equity_curve.last().copied().unwrap_or(1.0);
        let total_return = final_equity - 1.0;

        let years = (trading_days as f64 / TRADING_DAYS_PER_YEAR).max(MIN_YEARS);
        let cagr = if trading_days == 0 {
            0.0
        } else if final_equity > 0.0 {
            final_equity.powf(1.0 / years) - 1.0
        } else {
            -1.0
        };

        let daily_sd = sample_stddev(returns).unwrap_or(0.0);
        let annualized_vol = daily_sd * TRADING_DAYS_PER_YEAR.sqrt();
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(returns, annualized_vol);
        let (max_drawdown, max_drawdown_duration) = compute_drawdown(&equity_curve);

        let win_rate = if trading_days > 0 {
            returns.iter().filter(|&&r| r > 0.0).count() as f64 / trading_days as f64
        } else {
            0.0
        };

        Metrics {
            total_return,
            cagr,
            annualized_vol,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            win_rate,
            trading_days,
        }
    }
}

/// Cumulative product of `1 + r`, starting from 1.0 (not included).
pub fn equity_curve(returns: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .scan(1.0, |equity, r| {
            *equity *= 1.0 + r;
            Some(*equity)
        })
        .collect()
}

/// The running max covers curve points only, so a first-day loss is not a
/// drawdown.
fn compute_drawdown(equity_curve: &[f64]) -> (f64, i64) {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0i64;
    let mut current_dd_duration = 0i64;

    for &equity in equity_curve {
        if equity >= peak {
            peak = equity;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            let dd = equity / peak - 1.0;
            if dd < max_dd {
                max_dd = dd;
            }
            current_dd_duration += 1;
            if current_dd_duration > max_dd_duration {
                max_dd_duration = current_dd_duration;
            }
        }
    }

    (max_dd, max_dd_duration)
}

/// Sharpe is `mean / annualized_vol * sqrt(252)` with no risk-free rate.
fn compute_risk_adjusted(returns: &[f64], annualized_vol: f64) -> (f64, f64) {
    if returns.len() < 2 {
        return (0.0, 0.0);
    }

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;

    let sharpe = if annualized_vol > 0.0 {
        (mean / annualized_vol) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    let downside_sq: f64 = returns
        .iter()
        .filter(|&&r| r < 0.0)
        .map(|r| r.powi(2))
        .sum();
    let downside_stddev = (downside_sq / n).sqrt();

    let sortino = if downside_stddev > 0.0 {
        (mean / downside_stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    (sharpe, sortino)
}
