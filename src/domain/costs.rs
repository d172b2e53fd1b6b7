//! Trading cost and exposure scaling models.

use crate::domain::indicator::stddev::sample_stddev;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Slippage keyed by the median turnover of the day's picks.
#[derive(Debug, Clone, PartialEq)]
pub struct SlippageTiers {
    pub low_turnover: f64,
    pub mid_turnover: f64,
    pub low_cost: f64,
    pub mid_cost: f64,
    pub high_cost: f64,
    /// Used when turnover is missing or non-positive.
    pub default_cost: f64,
}

impl Default for SlippageTiers {
    fn default() -> Self {
        SlippageTiers {
            low_turnover: 5e7,
            mid_turnover: 2e8,
            low_cost: 0.0020,
            mid_cost: 0.0015,
            high_cost: 0.0010,
            default_cost: 0.0025,
        }
    }
}

impl SlippageTiers {
    pub fn cost(&self, turnover: Option<f64>) -> f64 {
        match turnover {
            Some(t) if t.is_finite() && t > 0.0 => {
                if t < self.low_turnover {
                    self.low_cost
                } else if t < self.mid_turnover {
                    self.mid_cost
                } else {
                    self.high_cost
                }
            }
            _ => self.default_cost,
        }
    }
}

/// Exposure scalar that pulls realized volatility toward a target.
#[derive(Debug, Clone, PartialEq)]
pub struct VolTarget {
    pub target: f64,
    pub floor: f64,
}

impl Default for VolTarget {
    fn default() -> Self {
        VolTarget {
            target: 0.15,
            floor: 0.05,
        }
    }
}

impl VolTarget {
    /// `min(target / max(std * sqrt(252), floor), 1)`; 1 with fewer than two returns.
    pub fn scale(&self, returns: &[f64]) -> f64 {
        let Some(sd) = sample_stddev(returns) else {
            return 1.0;
        };
        let realized = sd * TRADING_DAYS_PER_YEAR.sqrt();
        (self.target / realized.max(self.floor)).min(1.0)
    }
}

/// Median of the finite values, `None` if there are none.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(f64::total_cmp);
    let mid = finite.len() / 2;
    if finite.len() % 2 == 0 {
        Some((finite[mid - 1] + finite[mid]) / 2.0)
    } else {
        Some(finite[mid])
    }
}
