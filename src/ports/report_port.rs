//! Tabular output port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::FutalphaError;
use crate::domain::scoring::RankedSnapshot;
use crate::domain::sizing::Allocation;
use crate::domain::walkforward::WalkForwardReport;
use std::path::PathBuf;

/// Port for writing result tables. Each call returns the path written.
pub trait ReportPort {
    fn write_rankings(&self, rankings: &[RankedSnapshot]) -> Result<PathBuf, FutalphaError>;

    fn write_weights(&self, allocations: &[Allocation]) -> Result<PathBuf, FutalphaError>;

    fn write_backtest(&self, result: &BacktestResult) -> Result<PathBuf, FutalphaError>;

    fn write_walk_forward(&self, report: &WalkForwardReport) -> Result<PathBuf, FutalphaError>;

    /// Daily returns and equity of every fold; equity restarts at 1 per fold.
    fn write_walk_forward_equity(
        &self,
        report: &WalkForwardReport,
    ) -> Result<PathBuf, FutalphaError>;
}
