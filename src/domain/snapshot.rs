//! Cross-sectional snapshots and the unified timeline.

use crate::domain::error::FutalphaError;
use crate::domain::features::{FeatureConfig, FeatureRow};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// All eligible feature rows sharing one date, one per symbol.
#[derive(Debug, Clone)]
pub struct CrossSectionalSnapshot {
    pub date: NaiveDate,
    pub rows: Vec<FeatureRow>,
}

impl CrossSectionalSnapshot {
    /// Rejects rows from another date and duplicate symbols.
    pub fn new(date: NaiveDate, rows: Vec<FeatureRow>) -> Result<Self, FutalphaError> {
        let mut seen = HashSet::new();
        for row in &rows {
            if row.date != date {
                return Err(FutalphaError::malformed(
                    row.symbol.clone(),
                    format!("row dated {} in snapshot for {}", row.date, date),
                ));
            }
            if !seen.insert(row.symbol.as_str()) {
                return Err(FutalphaError::malformed(
                    row.symbol.clone(),
                    format!("duplicate symbol in snapshot for {date}"),
                ));
            }
        }
        Ok(Self { date, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.symbol.as_str()).collect()
    }
}

/// Sorted union of every date any symbol has a row for.
pub fn build_unified_timeline(features: &[Vec<FeatureRow>]) -> Vec<NaiveDate> {
    let unique_dates: BTreeSet<NaiveDate> = features
        .iter()
        .flat_map(|rows| rows.iter().map(|r| r.date))
        .collect();
    unique_dates.into_iter().collect()
}

/// Groups per-symbol feature rows into per-date snapshots.
///
/// Rows still inside the momentum warmup are left out. Dates where no symbol
/// has enough history produce no snapshot.
pub fn build_snapshots(
    features: &[Vec<FeatureRow>],
    config: &FeatureConfig,
) -> Result<Vec<CrossSectionalSnapshot>, FutalphaError> {
    let timeline = build_unified_timeline(features);
    let mut snapshots = Vec::with_capacity(timeline.len());

    for date in timeline {
        let rows: Vec<FeatureRow> = features
            .iter()
            .filter_map(|symbol_rows| row_on(symbol_rows, date))
            .filter(|row| {
                let warm = row.has_history(config);
                if !warm {
                    debug!(
                        symbol = %row.symbol,
                        date = %date,
                        bars = row.bars_seen,
                        reason = "insufficient history",
                        "row excluded"
                    );
                }
                warm
            })
            .cloned()
            .collect();
        if rows.is_empty() {
            continue;
        }
        snapshots.push(CrossSectionalSnapshot::new(date, rows)?);
    }

    Ok(snapshots)
}

fn row_on(rows: &[FeatureRow], date: NaiveDate) -> Option<&FeatureRow> {
    rows.binary_search_by_key(&date, |r| r.date)
        .ok()
        .map(|i| &rows[i])
}
