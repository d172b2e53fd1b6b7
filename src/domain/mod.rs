//! Core domain types and logic.

pub mod series;
pub mod indicator;
pub mod features;
pub mod snapshot;
pub mod scoring;
pub mod sizing;
pub mod regime;
pub mod costs;
pub mod labels;
pub mod backtest;
pub mod metrics;
pub mod scorer;
pub mod gbm;
pub mod walkforward;
pub mod universe;
pub mod config;
pub mod pipeline;
pub mod error;
