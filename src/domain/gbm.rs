//! Gradient-boosted regression trees (squared error).
//!
//! F_0 = mean(y); each round fits a depth-limited tree to the residuals
//! y - F_{m-1} and adds it shrunk by the learning rate. Split candidates are
//! at most `max_bins` quantile cut points per feature, computed once from the
//! training matrix. No subsampling, so fits are deterministic.

use crate::domain::error::FutalphaError;
use crate::domain::scorer::{FeatureMatrix, PredictiveScorer};
use rayon::prelude::*;
use tracing::debug;

/// Smallest impurity reduction that justifies a split.
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct GbmParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub max_bins: usize,
}

impl Default for GbmParams {
    fn default() -> Self {
        GbmParams {
            n_estimators: 150,
            learning_rate: 0.05,
            max_depth: 3,
            min_samples_leaf: 20,
            max_bins: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        /// Values `<= threshold` go left.
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, x: &[f64]) -> f64 {
        match self {
            Node::Leaf(v) => *v,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if x[*feature] <= *threshold {
                    left.predict(x)
                } else {
                    right.predict(x)
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            Node::Leaf(_) => 0,
            Node::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Training matrix pre-binned against per-feature cut points.
struct BinnedMatrix {
    cuts: Vec<Vec<f64>>,
    /// `bins[f][i]`: bin of row `i` on feature `f`.
    bins: Vec<Vec<u16>>,
}

impl BinnedMatrix {
    fn new(features: &FeatureMatrix, max_bins: usize) -> Self {
        let n_features = features.n_features();
        let cuts: Vec<Vec<f64>> = (0..n_features)
            .map(|f| {
                let column: Vec<f64> = features.rows.iter().map(|r| r[f]).collect();
                cut_points(&column, max_bins)
            })
            .collect();
        let bins = (0..n_features)
            .map(|f| {
                features
                    .rows
                    .iter()
                    .map(|r| cuts[f].partition_point(|&t| t < r[f]) as u16)
                    .collect()
            })
            .collect();
        BinnedMatrix { cuts, bins }
    }

    fn n_features(&self) -> usize {
        self.cuts.len()
    }
}

/// Candidate thresholds: midpoints between distinct values when there are few,
/// otherwise evenly spaced quantiles. At most `max_bins - 1` cuts.
fn cut_points(values: &[f64], max_bins: usize) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    if sorted.len() < 2 || max_bins < 2 {
        return Vec::new();
    }
    if sorted.len() <= max_bins {
        return sorted.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
    }
    let mut all = values.to_vec();
    all.sort_by(f64::total_cmp);
    let n = all.len();
    let mut cuts: Vec<f64> = (1..max_bins).map(|k| all[k * n / max_bins]).collect();
    cuts.dedup();
    // the largest value as a cut would send everything left
    if cuts.last().is_some_and(|&c| c >= all[n - 1]) {
        cuts.pop();
    }
    cuts
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    bin: usize,
    gain: f64,
}

struct TreeBuilder<'a> {
    binned: &'a BinnedMatrix,
    residuals: &'a [f64],
    params: &'a GbmParams,
}

impl TreeBuilder<'_> {
    fn build(&self, indices: &[usize], depth: usize) -> Node {
        let n = indices.len();
        let sum: f64 = indices.iter().map(|&i| self.residuals[i]).sum();
        let leaf = Node::Leaf(self.params.learning_rate * sum / n.max(1) as f64);

        if depth >= self.params.max_depth || n < 2 * self.params.min_samples_leaf.max(1) {
            return leaf;
        }
        let Some(best) = self.best_split(indices, sum) else {
            return leaf;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| (self.binned.bins[best.feature][i] as usize) <= best.bin);
        Node::Split {
            feature: best.feature,
            threshold: self.binned.cuts[best.feature][best.bin],
            left: Box::new(self.build(&left, depth + 1)),
            right: Box::new(self.build(&right, depth + 1)),
        }
    }

    fn best_split(&self, indices: &[usize], total_sum: f64) -> Option<SplitCandidate> {
        let n = indices.len() as f64;
        let parent = total_sum * total_sum / n;
        let min_leaf = self.params.min_samples_leaf.max(1);

        let per_feature: Vec<Option<SplitCandidate>> = (0..self.binned.n_features())
            .into_par_iter()
            .map(|f| {
                let n_cuts = self.binned.cuts[f].len();
                if n_cuts == 0 {
                    return None;
                }
                let mut hist_sum = vec![0.0; n_cuts + 1];
                let mut hist_count = vec![0usize; n_cuts + 1];
                for &i in indices {
                    let b = self.binned.bins[f][i] as usize;
                    hist_sum[b] += self.residuals[i];
                    hist_count[b] += 1;
                }

                let mut best: Option<SplitCandidate> = None;
                let (mut left_sum, mut left_count) = (0.0, 0usize);
                for bin in 0..n_cuts {
                    left_sum += hist_sum[bin];
                    left_count += hist_count[bin];
                    let right_count = indices.len() - left_count;
                    if left_count < min_leaf || right_count < min_leaf {
                        continue;
                    }
                    let right_sum = total_sum - left_sum;
                    let gain = left_sum * left_sum / left_count as f64
                        + right_sum * right_sum / right_count as f64
                        - parent;
                    if gain > MIN_GAIN && best.is_none_or(|b| gain > b.gain) {
                        best = Some(SplitCandidate {
                            feature: f,
                            bin,
                            gain,
                        });
                    }
                }
                best
            })
            .collect();

        // first feature wins ties
        per_feature
            .into_iter()
            .flatten()
            .fold(None, |best: Option<SplitCandidate>, c| match best {
                Some(b) if b.gain >= c.gain => Some(b),
                _ => Some(c),
            })
    }
}

/// Gradient-boosted regression scorer.
#[derive(Debug, Clone)]
pub struct GradientBoostedScorer {
    params: GbmParams,
    base: f64,
    trees: Vec<Node>,
    columns: Vec<String>,
    fitted: bool,
}

impl GradientBoostedScorer {
    pub fn new(params: GbmParams) -> Self {
        GradientBoostedScorer {
            params,
            base: 0.0,
            trees: Vec::new(),
            columns: Vec::new(),
            fitted: false,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn max_tree_depth(&self) -> usize {
        self.trees.iter().map(Node::depth).max().unwrap_or(0)
    }

    fn predict_row(&self, x: &[f64]) -> f64 {
        self.base + self.trees.iter().map(|t| t.predict(x)).sum::<f64>()
    }
}

fn model_error(reason: impl Into<String>) -> FutalphaError {
    FutalphaError::Model {
        reason: reason.into(),
    }
}

fn check_rows(features: &FeatureMatrix) -> Result<(), FutalphaError> {
    let width = features.n_features();
    for (row, key) in features.rows.iter().zip(&features.keys) {
        if row.len() != width {
            return Err(model_error(format!(
                "row {} {} has {} values, expected {width}",
                key.0,
                key.1,
                row.len()
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(model_error(format!("non-finite feature for {} {}", key.0, key.1)));
        }
    }
    Ok(())
}

impl PredictiveScorer for GradientBoostedScorer {
    fn name(&self) -> &str {
        "gbm"
    }

    fn fit(&mut self, features: &FeatureMatrix, labels: &[f64]) -> Result<(), FutalphaError> {
        if features.is_empty() {
            return Err(model_error("cannot fit on an empty training set"));
        }
        if labels.len() != features.len() {
            return Err(model_error(format!(
                "{} labels for {} rows",
                labels.len(),
                features.len()
            )));
        }
        if labels.iter().any(|y| !y.is_finite()) {
            return Err(model_error("non-finite training label"));
        }
        check_rows(features)?;

        let binned = BinnedMatrix::new(features, self.params.max_bins);
        let base = labels.iter().sum::<f64>() / labels.len() as f64;
        let mut predictions = vec![base; labels.len()];
        let indices: Vec<usize> = (0..labels.len()).collect();
        let mut trees = Vec::with_capacity(self.params.n_estimators);

        for _ in 0..self.params.n_estimators {
            let residuals: Vec<f64> = labels
                .iter()
                .zip(&predictions)
                .map(|(y, p)| y - p)
                .collect();
            let tree = TreeBuilder {
                binned: &binned,
                residuals: &residuals,
                params: &self.params,
            }
            .build(&indices, 0);
            for (p, row) in predictions.iter_mut().zip(&features.rows) {
                *p += tree.predict(row);
            }
            trees.push(tree);
        }

        debug!(
            rows = features.len(),
            trees = trees.len(),
            base = base,
            "gradient boosting fitted"
        );
        self.base = base;
        self.trees = trees;
        self.columns = features.columns.clone();
        self.fitted = true;
        Ok(())
    }

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, FutalphaError> {
        if !self.fitted {
            return Err(model_error("predict called before fit"));
        }
        if features.columns != self.columns {
            return Err(model_error(format!(
                "feature columns {:?} differ from training columns {:?}",
                features.columns, self.columns
            )));
        }
        check_rows(features)?;
        Ok(features.rows.iter().map(|r| self.predict_row(r)).collect())
    }
}
