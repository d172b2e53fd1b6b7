//! CSV report adapter implementing `ReportPort`.
//!
//! Writes `rankings.csv`, `weights.csv`, `backtest.csv`, `walk_forward.csv`
//! and `walk_forward_equity.csv` into one output directory. Missing values
//! are blank.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::FutalphaError;
use crate::domain::metrics::Metrics;
use crate::domain::scorer::momentum_column;
use crate::domain::scoring::RankedSnapshot;
use crate::domain::sizing::Allocation;
use crate::domain::walkforward::WalkForwardReport;
use crate::ports::report_port::ReportPort;
use csv::Writer;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

pub struct CsvReportAdapter {
    dir: PathBuf,
    lookbacks: Vec<usize>,
}

impl CsvReportAdapter {
    /// Creates `dir` if needed. `lookbacks` names the z-score columns of the
    /// ranking table.
    pub fn new(dir: impl Into<PathBuf>, lookbacks: &[usize]) -> Result<Self, FutalphaError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            lookbacks: lookbacks.to_vec(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn writer(&self, name: &str) -> Result<(PathBuf, Writer<File>), FutalphaError> {
        let path = self.dir.join(name);
        let writer = Writer::from_path(&path).map_err(io::Error::from)?;
        Ok((path, writer))
    }
}

fn opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn metric_fields(m: &Metrics) -> Vec<String> {
    vec![
        m.cagr.to_string(),
        m.annualized_vol.to_string(),
        m.sharpe_ratio.to_string(),
        m.sortino_ratio.to_string(),
        m.max_drawdown.to_string(),
        m.win_rate.to_string(),
        m.total_return.to_string(),
        m.trading_days.to_string(),
    ]
}

const METRIC_HEADERS: [&str; 8] = [
    "cagr",
    "volatility",
    "sharpe",
    "sortino",
    "max_drawdown",
    "win_rate",
    "total_return",
    "trading_days",
];

fn finish(path: PathBuf, mut writer: Writer<File>) -> Result<PathBuf, FutalphaError> {
    writer.flush()?;
    Ok(path)
}

impl ReportPort for CsvReportAdapter {
    fn write_rankings(&self, rankings: &[RankedSnapshot]) -> Result<PathBuf, FutalphaError> {
        let (path, mut w) = self.writer("rankings.csv")?;

        let mut header: Vec<String> = ["date", "symbol", "score", "rank", "price", "volatility", "turnover"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        header.extend(self.lookbacks.iter().map(|&lb| format!("z_{}", momentum_column(lb))));
        header.extend(["score_mom", "score_oi", "trend_boost"].map(String::from));
        w.write_record(&header).map_err(io::Error::from)?;

        for snapshot in rankings {
            for e in &snapshot.entries {
                let mut record = vec![
                    snapshot.date.to_string(),
                    e.symbol.clone(),
                    e.score.to_string(),
                    e.rank.to_string(),
                    e.price.to_string(),
                    opt(e.volatility),
                    opt(e.turnover),
                ];
                match &e.breakdown {
                    Some(b) => {
                        record.extend(
                            (0..self.lookbacks.len()).map(|i| opt(b.z_momentum.get(i).copied())),
                        );
                        record.push(b.score_mom.to_string());
                        record.push(b.score_oi.to_string());
                        record.push(b.trend_boost.to_string());
                    }
                    None => record.extend(std::iter::repeat_n(String::new(), self.lookbacks.len() + 3)),
                }
                w.write_record(&record).map_err(io::Error::from)?;
            }
        }
        finish(path, w)
    }

    fn write_weights(&self, allocations: &[Allocation]) -> Result<PathBuf, FutalphaError> {
        let (path, mut w) = self.writer("weights.csv")?;
        w.write_record(["date", "symbol", "weight"]).map_err(io::Error::from)?;
        for allocation in allocations {
            for (symbol, weight) in &allocation.weights {
                w.write_record([
                    allocation.date.to_string(),
                    symbol.clone(),
                    weight.to_string(),
                ])
                .map_err(io::Error::from)?;
            }
        }
        finish(path, w)
    }

    fn write_backtest(&self, result: &BacktestResult) -> Result<PathBuf, FutalphaError> {
        let (path, mut w) = self.writer("backtest.csv")?;
        w.write_record(["date", "portfolio_return", "equity", "risk_on", "picks", "cost"])
            .map_err(io::Error::from)?;
        for p in &result.points {
            w.write_record([
                p.date.to_string(),
                p.portfolio_return.to_string(),
                p.equity.to_string(),
                p.risk_on.to_string(),
                p.picks.to_string(),
                p.cost.to_string(),
            ])
            .map_err(io::Error::from)?;
        }
        finish(path, w)
    }

    fn write_walk_forward(&self, report: &WalkForwardReport) -> Result<PathBuf, FutalphaError> {
        let (path, mut w) = self.writer("walk_forward.csv")?;
        let mut header = vec!["year", "scorer", "train_rows", "test_rows"];
        header.extend(METRIC_HEADERS);
        w.write_record(&header).map_err(io::Error::from)?;

        for fold in &report.folds {
            let mut record = vec![
                fold.year.to_string(),
                report.scorer.clone(),
                fold.train_rows.to_string(),
                fold.test_rows.to_string(),
            ];
            record.extend(metric_fields(&fold.metrics));
            w.write_record(&record).map_err(io::Error::from)?;
        }

        let train: usize = report.folds.iter().map(|f| f.train_rows).sum();
        let test: usize = report.folds.iter().map(|f| f.test_rows).sum();
        let mut aggregate = vec![
            "ALL".to_string(),
            report.scorer.clone(),
            train.to_string(),
            test.to_string(),
        ];
        aggregate.extend(metric_fields(&report.aggregate));
        w.write_record(&aggregate).map_err(io::Error::from)?;
        finish(path, w)
    }

    fn write_walk_forward_equity(
        &self,
        report: &WalkForwardReport,
    ) -> Result<PathBuf, FutalphaError> {
        let (path, mut w) = self.writer("walk_forward_equity.csv")?;
        w.write_record(["year", "date", "portfolio_return", "equity", "risk_on"])
            .map_err(io::Error::from)?;
        for fold in &report.folds {
            for p in &fold.result.points {
                w.write_record([
                    fold.year.to_string(),
                    p.date.to_string(),
                    p.portfolio_return.to_string(),
                    p.equity.to_string(),
                    p.risk_on.to_string(),
                ])
                .map_err(io::Error::from)?;
            }
        }
        finish(path, w)
    }
}
