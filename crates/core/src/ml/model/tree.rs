//! CART decision trees shared by the ensemble models.
//!
//! Nodes live in a flat arena; children are referenced by index. A row goes left when
//! `row[feature] <= threshold`.

use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use super::majority;

/// Minimum impurity decrease for a split to be kept.
const MIN_IMPURITY_DECREASE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub(crate) enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    pub(crate) fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = row.get(*feature).copied().unwrap_or(f64::NAN);
                    idx = if value <= *threshold { *left } else { *right };
                }
                None => return f64::NAN,
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Impurity measure and leaf rule.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Criterion {
    /// Sum of squared deviations; leaves predict the mean.
    Variance,
    /// Gini impurity over class indices `0..n_classes`; leaves predict the majority class.
    Gini { n_classes: usize },
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Features considered per split; `None` considers all of them.
    pub max_features: Option<usize>,
}

struct Candidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

pub(crate) struct TreeBuilder<'a> {
    x: ArrayView2<'a, f64>,
    y: ArrayView1<'a, f64>,
    params: TreeParams,
    criterion: Criterion,
    nodes: Vec<Node>,
}

impl<'a> TreeBuilder<'a> {
    pub(crate) fn new(
        x: ArrayView2<'a, f64>,
        y: ArrayView1<'a, f64>,
        params: TreeParams,
        criterion: Criterion,
    ) -> Self {
        Self {
            x,
            y,
            params,
            criterion,
            nodes: Vec::new(),
        }
    }

    /// Grow a tree over `rows` (which may repeat for bootstrap samples).
    pub(crate) fn build(mut self, rows: &[usize], mut rng: Option<&mut StdRng>) -> DecisionTree {
        let mut rows = rows.to_vec();
        self.grow(&mut rows, 0, &mut rng);
        DecisionTree { nodes: self.nodes }
    }

    fn grow(&mut self, rows: &mut [usize], depth: usize, rng: &mut Option<&mut StdRng>) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: self.leaf_value(rows),
        });

        if depth >= self.params.max_depth || rows.len() < self.params.min_samples_split.max(2) {
            return idx;
        }
        let parent = self.impurity(rows);
        if parent <= MIN_IMPURITY_DECREASE {
            return idx;
        }

        let features = self.candidate_features(rng);
        let Some(best) = self.best_split(rows, &features) else {
            return idx;
        };
        if parent - best.impurity <= MIN_IMPURITY_DECREASE {
            return idx;
        }

        let x = self.x;
        rows.sort_by(|&a, &b| {
            let left_a = x[[a, best.feature]] <= best.threshold;
            let left_b = x[[b, best.feature]] <= best.threshold;
            left_b.cmp(&left_a)
        });
        let split_at = rows
            .iter()
            .position(|&r| x[[r, best.feature]] > best.threshold)
            .unwrap_or(rows.len());
        let (left_rows, right_rows) = rows.split_at_mut(split_at);

        let left = self.grow(left_rows, depth + 1, rng);
        let right = self.grow(right_rows, depth + 1, rng);
        self.nodes[idx] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        idx
    }

    fn candidate_features(&self, rng: &mut Option<&mut StdRng>) -> Vec<usize> {
        let n_features = self.x.ncols();
        match (self.params.max_features, rng.as_deref_mut()) {
            (Some(k), Some(rng)) if k < n_features => {
                let mut chosen = rand::seq::index::sample(rng, n_features, k).into_vec();
                chosen.sort_unstable();
                chosen
            }
            _ => (0..n_features).collect(),
        }
    }

    fn best_split(&self, rows: &[usize], features: &[usize]) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        let mut sorted = rows.to_vec();

        for &feature in features {
            sorted.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));
            let Some(candidate) = self.sweep(&sorted, feature) else {
                continue;
            };
            if best.as_ref().is_none_or(|b| candidate.impurity < b.impurity) {
                best = Some(candidate);
            }
        }
        best
    }

    /// Best threshold on one feature, given rows sorted by that feature.
    #[allow(clippy::cast_precision_loss)]
    fn sweep(&self, sorted: &[usize], feature: usize) -> Option<Candidate> {
        let n = sorted.len();
        let mut best: Option<Candidate> = None;
        let mut consider = |i: usize, impurity: f64| {
            let lo = self.x[[sorted[i], feature]];
            let hi = self.x[[sorted[i + 1], feature]];
            if lo < hi && best.as_ref().is_none_or(|b| impurity < b.impurity) {
                best = Some(Candidate {
                    feature,
                    threshold: (lo + hi) / 2.0,
                    impurity,
                });
            }
        };

        match self.criterion {
            Criterion::Variance => {
                let total_sum: f64 = sorted.iter().map(|&r| self.y[r]).sum();
                let total_sq: f64 = sorted.iter().map(|&r| self.y[r].powi(2)).sum();
                let mut left_sum = 0.0;
                let mut left_sq = 0.0;
                for i in 0..n - 1 {
                    let v = self.y[sorted[i]];
                    left_sum += v;
                    left_sq += v * v;
                    let n_left = (i + 1) as f64;
                    let n_right = (n - i - 1) as f64;
                    let right_sum = total_sum - left_sum;
                    let right_sq = total_sq - left_sq;
                    let impurity = (left_sq - left_sum * left_sum / n_left)
                        + (right_sq - right_sum * right_sum / n_right);
                    consider(i, impurity);
                }
            }
            Criterion::Gini { n_classes } => {
                let mut total = vec![0usize; n_classes];
                for &r in sorted {
                    total[class_index(self.y[r], n_classes)] += 1;
                }
                let mut left = vec![0usize; n_classes];
                for i in 0..n - 1 {
                    left[class_index(self.y[sorted[i]], n_classes)] += 1;
                    let n_left = i + 1;
                    let n_right = n - n_left;
                    let right: Vec<usize> = total.iter().zip(&left).map(|(t, l)| t - l).collect();
                    let impurity = n_left as f64 * gini(&left, n_left)
                        + n_right as f64 * gini(&right, n_right);
                    consider(i, impurity);
                }
            }
        }
        best
    }

    #[allow(clippy::cast_precision_loss)]
    fn impurity(&self, rows: &[usize]) -> f64 {
        match self.criterion {
            Criterion::Variance => {
                let n = rows.len() as f64;
                let sum: f64 = rows.iter().map(|&r| self.y[r]).sum();
                let sq: f64 = rows.iter().map(|&r| self.y[r].powi(2)).sum();
                sq - sum * sum / n
            }
            Criterion::Gini { n_classes } => {
                let counts = self.class_counts(rows, n_classes);
                rows.len() as f64 * gini(&counts, rows.len())
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn leaf_value(&self, rows: &[usize]) -> f64 {
        if rows.is_empty() {
            return 0.0;
        }
        match self.criterion {
            Criterion::Variance => rows.iter().map(|&r| self.y[r]).sum::<f64>() / rows.len() as f64,
            Criterion::Gini { n_classes } => majority(&self.class_counts(rows, n_classes)),
        }
    }

    fn class_counts(&self, rows: &[usize], n_classes: usize) -> Vec<usize> {
        let mut counts = vec![0usize; n_classes];
        for &r in rows {
            counts[class_index(self.y[r], n_classes)] += 1;
        }
        counts
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn class_index(value: f64, n_classes: usize) -> usize {
    (value as usize).min(n_classes.saturating_sub(1))
}

#[allow(clippy::cast_precision_loss)]
fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}
