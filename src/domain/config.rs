//! Pipeline configuration built from a `ConfigPort`.
//!
//! Every knob has a default; only `[data] dir` is required. Values are range
//! checked once here so the components can assume sane parameters.

use crate::domain::backtest::{BacktestConfig, Weighting};
use crate::domain::costs::{SlippageTiers, VolTarget};
use crate::domain::error::FutalphaError;
use crate::domain::features::FeatureConfig;
use crate::domain::gbm::GbmParams;
use crate::domain::regime::RegimeConfig;
use crate::domain::scorer::ScorerKind;
use crate::domain::scoring::{NormalizationMode, ScoringConfig};
use crate::domain::series::PriceField;
use crate::domain::sizing::SizingConfig;
use crate::domain::universe::parse_symbols;
use crate::domain::walkforward::WalkForwardConfig;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub struct DataConfig {
    pub dir: PathBuf,
    /// Explicit universe; `None` means every symbol the source lists.
    pub symbols: Option<Vec<String>>,
    pub price_field: PriceField,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub features: FeatureConfig,
    pub scoring: ScoringConfig,
    pub sizing: SizingConfig,
    pub regime: RegimeConfig,
    pub backtest: BacktestConfig,
    pub walkforward: WalkForwardConfig,
    pub scorer: ScorerKind,
    pub gbm: GbmParams,
    pub output_dir: PathBuf,
}

impl PipelineConfig {
    pub fn from_port(port: &dyn ConfigPort) -> Result<Self, FutalphaError> {
        let config = PipelineConfig {
            data: data_config(port)?,
            features: feature_config(port)?,
            scoring: scoring_config(port)?,
            sizing: SizingConfig {
                target_portfolio_vol: port.get_double("sizing", "target_portfolio_vol", 0.18)?,
                max_weight: port.get_double("sizing", "max_weight", 0.20)?,
            },
            regime: RegimeConfig {
                enabled: port.get_bool("regime", "enabled", true)?,
                ema_span: usize_key(port, "regime", "ema_span", 100)?,
            },
            backtest: backtest_config(port)?,
            walkforward: WalkForwardConfig {
                min_year: i32::try_from(port.get_int("walkforward", "min_year", 2022)?)
                    .map_err(|_| {
                        FutalphaError::config_invalid("walkforward", "min_year", "out of range")
                    })?,
            },
            scorer: parsed(port, "walkforward", "scorer", ScorerKind::parse)?.unwrap_or_default(),
            gbm: GbmParams {
                n_estimators: usize_key(port, "model", "n_estimators", 150)?,
                learning_rate: port.get_double("model", "learning_rate", 0.05)?,
                max_depth: usize_key(port, "model", "max_depth", 3)?,
                min_samples_leaf: usize_key(port, "model", "min_samples_leaf", 20)?,
                max_bins: usize_key(port, "model", "max_bins", 64)?,
            },
            output_dir: port
                .get_string("output", "dir")
                .map_or_else(|| PathBuf::from("output"), PathBuf::from),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FutalphaError> {
        validate_features(&self.features)?;
        validate_scoring(&self.scoring, &self.features)?;
        validate_sizing(&self.sizing)?;
        validate_backtest(&self.backtest, &self.scoring)?;
        validate_gbm(&self.gbm)?;
        if self.regime.ema_span == 0 {
            return Err(FutalphaError::config_invalid("regime", "ema_span", "must be at least 1"));
        }
        if let (Some(start), Some(end)) = (self.data.start_date, self.data.end_date) {
            if start > end {
                return Err(FutalphaError::config_invalid(
                    "data",
                    "start_date",
                    "start_date must not be after end_date",
                ));
            }
        }
        Ok(())
    }

    /// Resolved settings, one `key = value` line each.
    pub fn summary(&self) -> Vec<String> {
        vec![
            format!("data.dir = {}", self.data.dir.display()),
            format!(
                "data.symbols = {}",
                self.data
                    .symbols
                    .as_ref()
                    .map_or_else(|| "<all>".to_string(), |s| s.join(","))
            ),
            format!("data.price_field = {:?}", self.data.price_field),
            format!("features.momentum_lookbacks = {:?}", self.features.momentum_lookbacks),
            format!("features.volatility_window = {}", self.features.volatility_window),
            format!("features.oi_window = {}", self.features.oi_window),
            format!("scoring.momentum_weights = {:?}", self.scoring.momentum_weights),
            format!("scoring.normalization = {:?}", self.scoring.normalization),
            format!("scoring.top_n = {}", self.scoring.top_n),
            format!("scoring.min_liquidity = {:?}", self.scoring.min_liquidity),
            format!("sizing.target_portfolio_vol = {}", self.sizing.target_portfolio_vol),
            format!("sizing.max_weight = {}", self.sizing.max_weight),
            format!("regime.enabled = {}", self.regime.enabled),
            format!("backtest.weighting = {:?}", self.backtest.weighting),
            format!("backtest.target_vol = {}", self.backtest.vol_target.target),
            format!("walkforward.min_year = {}", self.walkforward.min_year),
            format!("walkforward.scorer = {:?}", self.scorer),
            format!("output.dir = {}", self.output_dir.display()),
        ]
    }
}

fn data_config(port: &dyn ConfigPort) -> Result<DataConfig, FutalphaError> {
    let dir = port
        .get_string("data", "dir")
        .ok_or_else(|| FutalphaError::ConfigMissing {
            section: "data".to_string(),
            key: "dir".to_string(),
        })?;
    let symbols = match port.get_string("data", "symbols") {
        Some(raw) => Some(parse_symbols(&raw).map_err(|e| {
            FutalphaError::config_invalid("data", "symbols", e.to_string())
        })?),
        None => None,
    };
    Ok(DataConfig {
        dir: PathBuf::from(dir),
        symbols,
        price_field: parsed(port, "data", "price_field", PriceField::parse)?.unwrap_or_default(),
        start_date: date_key(port, "data", "start_date")?,
        end_date: date_key(port, "data", "end_date")?,
    })
}

fn feature_config(port: &dyn ConfigPort) -> Result<FeatureConfig, FutalphaError> {
    let defaults = FeatureConfig::default();
    Ok(FeatureConfig {
        momentum_lookbacks: list_key(port, "features", "momentum_lookbacks")?
            .unwrap_or(defaults.momentum_lookbacks),
        oi_window: usize_key(port, "features", "oi_window", defaults.oi_window)?,
        volatility_window: usize_key(
            port,
            "features",
            "volatility_window",
            defaults.volatility_window,
        )?,
        trend_span: usize_key(port, "features", "trend_span", defaults.trend_span)?,
        temporal_window: usize_key(port, "features", "temporal_window", defaults.temporal_window)?,
        price_field: parsed(port, "data", "price_field", PriceField::parse)?.unwrap_or_default(),
    })
}

fn scoring_config(port: &dyn ConfigPort) -> Result<ScoringConfig, FutalphaError> {
    let defaults = ScoringConfig::default();
    let min_liquidity = port.get_double("scoring", "min_liquidity", 1e7)?;
    Ok(ScoringConfig {
        momentum_weights: list_key(port, "scoring", "momentum_weights")?
            .unwrap_or(defaults.momentum_weights),
        trend_boost: port.get_double("scoring", "trend_boost", defaults.trend_boost)?,
        min_liquidity: (min_liquidity > 0.0).then_some(min_liquidity),
        top_n: usize_key(port, "scoring", "top_n", defaults.top_n)?,
        normalization: parsed(port, "scoring", "normalization", NormalizationMode::parse)?
            .unwrap_or_default(),
    })
}

fn backtest_config(port: &dyn ConfigPort) -> Result<BacktestConfig, FutalphaError> {
    let tiers = SlippageTiers::default();
    let scoring_top_n = usize_key(port, "scoring", "top_n", 5)?;
    Ok(BacktestConfig {
        top_n: usize_key(port, "backtest", "top_n", scoring_top_n)?,
        vol_target: VolTarget {
            target: port.get_double("backtest", "target_vol", 0.15)?,
            floor: port.get_double("backtest", "vol_floor", 0.05)?,
        },
        slippage: SlippageTiers {
            low_turnover: port.get_double("backtest", "slippage_low_turnover", tiers.low_turnover)?,
            mid_turnover: port.get_double("backtest", "slippage_mid_turnover", tiers.mid_turnover)?,
            low_cost: port.get_double("backtest", "slippage_low", tiers.low_cost)?,
            mid_cost: port.get_double("backtest", "slippage_mid", tiers.mid_cost)?,
            high_cost: port.get_double("backtest", "slippage_high", tiers.high_cost)?,
            default_cost: port.get_double("backtest", "slippage_default", tiers.default_cost)?,
        },
        weighting: parsed(port, "backtest", "weighting", Weighting::parse)?.unwrap_or_default(),
    })
}

fn validate_features(f: &FeatureConfig) -> Result<(), FutalphaError> {
    if f.momentum_lookbacks.is_empty() || f.momentum_lookbacks.contains(&0) {
        return Err(FutalphaError::config_invalid(
            "features",
            "momentum_lookbacks",
            "need at least one positive lookback",
        ));
    }
    for (key, value, minimum) in [
        ("oi_window", f.oi_window, 1),
        ("volatility_window", f.volatility_window, 2),
        ("trend_span", f.trend_span, 1),
        ("temporal_window", f.temporal_window, 2),
    ] {
        if value < minimum {
            return Err(FutalphaError::config_invalid(
                "features",
                key,
                format!("must be at least {minimum}"),
            ));
        }
    }
    Ok(())
}

fn validate_scoring(s: &ScoringConfig, f: &FeatureConfig) -> Result<(), FutalphaError> {
    if s.momentum_weights.len() != f.momentum_lookbacks.len() {
        return Err(FutalphaError::config_invalid(
            "scoring",
            "momentum_weights",
            format!(
                "{} weights for {} lookbacks",
                s.momentum_weights.len(),
                f.momentum_lookbacks.len()
            ),
        ));
    }
    if s.momentum_weights.iter().any(|w| !w.is_finite()) {
        return Err(FutalphaError::config_invalid(
            "scoring",
            "momentum_weights",
            "weights must be finite",
        ));
    }
    if !(s.trend_boost.is_finite() && s.trend_boost >= 0.0) {
        return Err(FutalphaError::config_invalid(
            "scoring",
            "trend_boost",
            "must be non-negative",
        ));
    }
    if s.top_n == 0 {
        return Err(FutalphaError::config_invalid("scoring", "top_n", "must be at least 1"));
    }
    Ok(())
}

fn validate_sizing(s: &SizingConfig) -> Result<(), FutalphaError> {
    if !(s.target_portfolio_vol > 0.0 && s.target_portfolio_vol.is_finite()) {
        return Err(FutalphaError::config_invalid(
            "sizing",
            "target_portfolio_vol",
            "must be positive",
        ));
    }
    if !(s.max_weight > 0.0 && s.max_weight <= 1.0) {
        return Err(FutalphaError::config_invalid(
            "sizing",
            "max_weight",
            "must be in (0, 1]",
        ));
    }
    Ok(())
}

fn validate_backtest(b: &BacktestConfig, s: &ScoringConfig) -> Result<(), FutalphaError> {
    if b.top_n == 0 {
        return Err(FutalphaError::config_invalid("backtest", "top_n", "must be at least 1"));
    }
    // rankings are already cut to the scoring top_n
    if b.top_n > s.top_n {
        return Err(FutalphaError::config_invalid(
            "backtest",
            "top_n",
            format!("{} exceeds [scoring] top_n of {}", b.top_n, s.top_n),
        ));
    }
    if !(b.vol_target.target > 0.0) {
        return Err(FutalphaError::config_invalid("backtest", "target_vol", "must be positive"));
    }
    if !(b.vol_target.floor > 0.0) {
        return Err(FutalphaError::config_invalid("backtest", "vol_floor", "must be positive"));
    }
    let t = &b.slippage;
    if t.low_turnover >= t.mid_turnover {
        return Err(FutalphaError::config_invalid(
            "backtest",
            "slippage_low_turnover",
            "must be below slippage_mid_turnover",
        ));
    }
    for (key, cost) in [
        ("slippage_low", t.low_cost),
        ("slippage_mid", t.mid_cost),
        ("slippage_high", t.high_cost),
        ("slippage_default", t.default_cost),
    ] {
        if !(cost >= 0.0 && cost < 1.0) {
            return Err(FutalphaError::config_invalid("backtest", key, "must be in [0, 1)"));
        }
    }
    Ok(())
}

fn validate_gbm(g: &GbmParams) -> Result<(), FutalphaError> {
    if g.n_estimators == 0 {
        return Err(FutalphaError::config_invalid("model", "n_estimators", "must be at least 1"));
    }
    if !(g.learning_rate > 0.0 && g.learning_rate <= 1.0) {
        return Err(FutalphaError::config_invalid("model", "learning_rate", "must be in (0, 1]"));
    }
    if g.max_depth == 0 {
        return Err(FutalphaError::config_invalid("model", "max_depth", "must be at least 1"));
    }
    if g.min_samples_leaf == 0 {
        return Err(FutalphaError::config_invalid(
            "model",
            "min_samples_leaf",
            "must be at least 1",
        ));
    }
    if !(2..=1024).contains(&g.max_bins) {
        return Err(FutalphaError::config_invalid("model", "max_bins", "must be in 2..=1024"));
    }
    Ok(())
}

fn usize_key(
    port: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, FutalphaError> {
    let value = port.get_int(section, key, default as i64)?;
    usize::try_from(value)
        .map_err(|_| FutalphaError::config_invalid(section, key, "must not be negative"))
}

fn parsed<T>(
    port: &dyn ConfigPort,
    section: &str,
    key: &str,
    parse: fn(&str) -> Option<T>,
) -> Result<Option<T>, FutalphaError> {
    match port.get_string(section, key) {
        None => Ok(None),
        Some(raw) => parse(&raw).map(Some).ok_or_else(|| {
            FutalphaError::config_invalid(section, key, format!("unknown value '{raw}'"))
        }),
    }
}

fn list_key<T: FromStr>(
    port: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<Vec<T>>, FutalphaError> {
    let Some(raw) = port.get_string(section, key) else {
        return Ok(None);
    };
    raw.split(',')
        .map(|token| {
            token.trim().parse::<T>().map_err(|_| {
                FutalphaError::config_invalid(section, key, format!("bad list item '{}'", token.trim()))
            })
        })
        .collect::<Result<Vec<T>, _>>()
        .map(Some)
}

fn date_key(
    port: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, FutalphaError> {
    match port.get_string(section, key) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map(Some).map_err(|_| {
            FutalphaError::config_invalid(
                section,
                key,
                format!("invalid date '{raw}', expected YYYY-MM-DD"),
            )
        }),
    }
}
