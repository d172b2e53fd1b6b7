//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvSeriesAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config::PipelineConfig;
use crate::domain::error::FutalphaError;
use crate::domain::metrics::Metrics;
use crate::domain::pipeline;
use crate::domain::scorer::ScorerKind;
use crate::domain::scoring::explain;
use crate::domain::universe::UniverseValidationResult;
use crate::ports::report_port::ReportPort;

/// Top picks shown in console summaries.
const EXPLAIN_TOP: usize = 5;

#[derive(Parser, Debug)]
#[command(
    name = "futalpha",
    about = "Cross-sectional futures momentum ranking and backtesting"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rank the universe on one date (latest by default)
    Rank {
        #[arg(short, long)]
        config: PathBuf,
        /// Date to rank, YYYY-MM-DD
        #[arg(long)]
        date: Option<NaiveDate>,
        /// rule or gbm; gbm trains on every labeled row before the date
        #[arg(long)]
        scorer: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Rank every date and run the regime-gated backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Year-by-year walk-forward validation
    WalkForward {
        #[arg(short, long)]
        config: PathBuf,
        /// rule or gbm
        #[arg(long)]
        scorer: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check the configuration and universe without running anything
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Rank {
            config,
            date,
            scorer,
            output,
        } => run_rank(&config, date, scorer.as_deref(), output.as_deref()),
        Command::Backtest { config, output } => run_backtest(&config, output.as_deref()),
        Command::WalkForward {
            config,
            scorer,
            output,
        } => run_walk_forward(&config, scorer.as_deref(), output.as_deref()),
        Command::Validate { config } => run_validate(&config),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<PipelineConfig, FutalphaError> {
    eprintln!("Loading config from {}", path.display());
    let adapter = FileConfigAdapter::from_file(path)?;
    PipelineConfig::from_port(&adapter)
}

fn load_universe(config: &PipelineConfig) -> Result<UniverseValidationResult, FutalphaError> {
    let port = CsvSeriesAdapter::new(&config.data.dir);
    let universe = pipeline::load_universe(&port, config)?;
    eprintln!(
        "Universe: {} symbols loaded, {} skipped",
        universe.series.len(),
        universe.skipped.len()
    );
    Ok(universe)
}

fn report_adapter(
    config: &PipelineConfig,
    output: Option<&Path>,
) -> Result<CsvReportAdapter, FutalphaError> {
    let dir = output.unwrap_or(&config.output_dir);
    CsvReportAdapter::new(dir, &config.features.momentum_lookbacks)
}

fn parse_scorer(name: &str) -> Result<ScorerKind, FutalphaError> {
    ScorerKind::parse(name).ok_or_else(|| {
        FutalphaError::config_invalid(
            "walkforward",
            "scorer",
            format!("unknown scorer '{name}', expected rule or gbm"),
        )
    })
}

fn print_metrics(title: &str, m: &Metrics) {
    eprintln!("\n=== {title} ===");
    eprintln!("Total Return:     {:.2}%", m.total_return * 100.0);
    eprintln!("CAGR:             {:.2}%", m.cagr * 100.0);
    eprintln!("Volatility:       {:.2}%", m.annualized_vol * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", m.sortino_ratio);
    eprintln!("Max Drawdown:     {:.1}%", m.max_drawdown * 100.0);
    eprintln!("Drawdown Days:    {}", m.max_drawdown_duration);
    eprintln!("Win Rate:         {:.1}%", m.win_rate * 100.0);
    eprintln!("Trading Days:     {}", m.trading_days);
}

fn run_rank(
    config_path: &Path,
    date: Option<NaiveDate>,
    scorer: Option<&str>,
    output: Option<&Path>,
) -> Result<(), FutalphaError> {
    let config = load_config(config_path)?;
    let kind = scorer.map(parse_scorer).transpose()?.unwrap_or(ScorerKind::Rule);
    let universe = load_universe(&config)?;

    let (ranked, allocation) = pipeline::rank_with(&universe.series, &config, date, kind)?;

    eprintln!("\n=== Rankings for {} ({:?} scorer) ===", ranked.date, kind);
    for line in explain(&ranked, EXPLAIN_TOP) {
        eprintln!("  {line}");
    }
    if allocation.is_flat() {
        eprintln!("\nNo position could be sized; allocation is flat");
    } else {
        eprintln!("\n=== Weights ===");
        for (symbol, weight) in &allocation.weights {
            eprintln!("  {symbol}: {:.1}%", weight * 100.0);
        }
    }

    let reports = report_adapter(&config, output)?;
    println!("{}", reports.write_rankings(&[ranked])?.display());
    println!("{}", reports.write_weights(&[allocation])?.display());
    Ok(())
}

fn run_backtest(config_path: &Path, output: Option<&Path>) -> Result<(), FutalphaError> {
    let config = load_config(config_path)?;
    let universe = load_universe(&config)?;

    eprintln!(
        "Running backtest: {} symbols, top {}, {:?} weighting",
        universe.series.len(),
        config.backtest.top_n,
        config.backtest.weighting
    );
    let run = pipeline::backtest(&universe.series, &config)?;

    eprintln!(
        "  {} dates ranked, {} traded, {} skipped, {} risk-on days",
        run.history.rankings.len(),
        run.result.points.len(),
        run.result.skipped.len(),
        run.result.points.iter().filter(|p| p.risk_on).count()
    );
    print_metrics("Backtest Results", &run.result.metrics());
    if let Some(last) = run.history.rankings.last() {
        eprintln!("\n=== Latest Picks ({}) ===", last.date);
        for line in explain(last, EXPLAIN_TOP) {
            eprintln!("  {line}");
        }
    }

    let reports = report_adapter(&config, output)?;
    println!("{}", reports.write_rankings(&run.history.rankings)?.display());
    println!("{}", reports.write_weights(&run.history.allocations)?.display());
    println!("{}", reports.write_backtest(&run.result)?.display());
    Ok(())
}

fn run_walk_forward(
    config_path: &Path,
    scorer: Option<&str>,
    output: Option<&Path>,
) -> Result<(), FutalphaError> {
    let config = load_config(config_path)?;
    let kind = scorer.map(parse_scorer).transpose()?.unwrap_or(config.scorer);
    let universe = load_universe(&config)?;

    eprintln!(
        "Running walk-forward from {} with the {:?} scorer",
        config.walkforward.min_year, kind
    );
    let report = pipeline::walk_forward(&universe.series, &config, kind)?;

    eprintln!("\n=== Walk-Forward Folds ({}) ===", report.scorer);
    eprintln!(
        "  {:<6} {:>9} {:>9} {:>8} {:>9} {:>8}",
        "year", "CAGR", "vol", "Sharpe", "maxDD", "win"
    );
    for fold in &report.folds {
        let m = &fold.metrics;
        eprintln!(
            "  {:<6} {:>8.2}% {:>8.2}% {:>8.2} {:>8.1}% {:>7.1}%",
            fold.year,
            m.cagr * 100.0,
            m.annualized_vol * 100.0,
            m.sharpe_ratio,
            m.max_drawdown * 100.0,
            m.win_rate * 100.0
        );
    }
    print_metrics("Aggregate", &report.aggregate);

    let reports = report_adapter(&config, output)?;
    println!("{}", reports.write_walk_forward(&report)?.display());
    println!("{}", reports.write_walk_forward_equity(&report)?.display());
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), FutalphaError> {
    let config = load_config(config_path)?;
    eprintln!("Config validated successfully\n");
    for line in config.summary() {
        eprintln!("  {line}");
    }

    let universe = load_universe(&config)?;
    eprintln!("\nUniverse:");
    for series in &universe.series {
        eprintln!("  {}: {} bars [OK]", series.symbol(), series.len());
    }
    for skipped in &universe.skipped {
        eprintln!("  {}: skipped ({})", skipped.symbol, skipped.reason);
    }

    eprintln!("\nDry run complete: configuration is valid");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rank_with_date() {
        let cli = Cli::try_parse_from([
            "futalpha",
            "rank",
            "--config",
            "cfg.ini",
            "--date",
            "2024-03-01",
        ])
        .unwrap();
        match cli.command {
            Command::Rank {
                config,
                date,
                scorer,
                output,
            } => {
                assert_eq!(config, PathBuf::from("cfg.ini"));
                assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 1));
                assert_eq!(scorer, None);
                assert_eq!(output, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_date() {
        let result = Cli::try_parse_from(["futalpha", "rank", "-c", "x.ini", "--date", "March"]);
        assert!(result.is_err());
    }

    #[test]
    fn parses_walk_forward_scorer() {
        let cli = Cli::try_parse_from([
            "futalpha",
            "walk-forward",
            "-c",
            "x.ini",
            "--scorer",
            "gbm",
            "-o",
            "out",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::WalkForward { scorer: Some(ref s), output: Some(_), .. } if s == "gbm"
        ));
    }

    #[test]
    fn config_is_required() {
        assert!(Cli::try_parse_from(["futalpha", "backtest"]).is_err());
    }
}
