use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::ForestError;

/// Euler–Mascheroni constant, used to approximate harmonic numbers.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Sub-sample size used when `MaxSamples::Auto` is selected.
const AUTO_MAX_SAMPLES: usize = 256;

/// Decision threshold under automatic contamination.
///
/// A score of exactly 0.5 means the average path length equals the
/// expected path length of an unsuccessful BST search, i.e. the point is
/// indistinguishable from the bulk of the data.
pub const AUTO_THRESHOLD: f64 = 0.5;

/// How many rows each tree is grown on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxSamples {
    /// `min(256, n)`.
    Auto,
    Count(usize),
}

/// Expected outlier share of the training data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Contamination {
    /// Fixed threshold of 0.5 on the anomaly score.
    Auto,
    /// Threshold set so this fraction of training rows scores above it.
    /// Must be in (0, 0.5].
    Fraction(f64),
}

/// Fitting parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_samples: MaxSamples,
    pub contamination: Contamination,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: MaxSamples::Auto,
            contamination: Contamination::Auto,
            seed: 42,
        }
    }
}

/// A node in an isolation tree, stored in a flat arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Split {
        feature: usize,
        value: f64,
        left: u32,
        right: u32,
    },
    Leaf {
        /// Number of training rows that ended up here.
        size: usize,
    },
}

/// One random partition tree. The root is `nodes[0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    /// Grow a tree over `sample` (row indices into `rows`).
    fn grow(rows: &[Vec<f64>], sample: &mut [usize], max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.build(rows, sample, 0, max_depth, rng);
        tree
    }

    fn build(
        &mut self,
        rows: &[Vec<f64>],
        idx: &mut [usize],
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> u32 {
        let id = self.nodes.len() as u32;

        if depth >= max_depth || idx.len() <= 1 {
            self.nodes.push(Node::Leaf { size: idx.len() });
            return id;
        }

        // Only features that still vary inside this node can split it.
        let dim = rows[idx[0]].len();
        let candidates: Vec<(usize, f64, f64)> = (0..dim)
            .filter_map(|f| {
                let (lo, hi) = idx.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                    (lo.min(rows[i][f]), hi.max(rows[i][f]))
                });
                (lo < hi).then_some((f, lo, hi))
            })
            .collect();

        if candidates.is_empty() {
            self.nodes.push(Node::Leaf { size: idx.len() });
            return id;
        }

        let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
        let value = rng.gen_range(lo..hi);

        // Partition in place: rows below the split move to the front.
        let mut mid = 0;
        for i in 0..idx.len() {
            if rows[idx[i]][feature] < value {
                idx.swap(i, mid);
                mid += 1;
            }
        }

        // `gen_range` is half-open, so `value == lo` can leave the left side
        // empty. Treat a split that separates nothing as a leaf.
        if mid == 0 || mid == idx.len() {
            self.nodes.push(Node::Leaf { size: idx.len() });
            return id;
        }

        self.nodes.push(Node::Split {
            feature,
            value,
            left: 0,
            right: 0,
        });

        let (left_idx, right_idx) = idx.split_at_mut(mid);
        let left = self.build(rows, left_idx, depth + 1, max_depth, rng);
        let right = self.build(rows, right_idx, depth + 1, max_depth, rng);

        if let Node::Split {
            left: l, right: r, ..
        } = &mut self.nodes[id as usize]
        {
            *l = left;
            *r = right;
        }
        id
    }

    /// Path length of `x`: edges walked to reach a leaf, plus the expected
    /// remaining depth for the rows that leaf still holds.
    pub fn path_length(&self, x: &[f64]) -> f64 {
        let mut node = 0usize;
        let mut depth = 0.0;
        loop {
            match &self.nodes[node] {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    value,
                    left,
                    right,
                } => {
                    let next = if x[*feature] < *value { *left } else { *right };
                    node = next as usize;
                    depth += 1.0;
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Children always sit after their parent in the arena, so a walk from
    /// the root that only follows in-range forward links ends at a leaf.
    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        let len = self.nodes.len();
        for (i, node) in self.nodes.iter().enumerate() {
            let Node::Split {
                feature,
                value,
                left,
                right,
            } = node
            else {
                continue;
            };
            if *feature >= n_features {
                return Err(format!(
                    "node {i} splits on feature {feature}, forest has {n_features}"
                ));
            }
            if value.is_nan() {
                return Err(format!("node {i} has a NaN split value"));
            }
            for child in [*left, *right] {
                let c = child as usize;
                if c <= i || c >= len {
                    return Err(format!("node {i} links to node {child} (tree has {len})"));
                }
            }
        }
        Ok(())
    }
}

/// Average path length of an unsuccessful search in a binary search tree
/// of `n` nodes: `c(n) = 2 H(n-1) - 2(n-1)/n`.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Isolation forest (Liu, Ting & Zhou, 2008).
///
/// Anomalies are few and different, so random axis-aligned splits isolate
/// them in fewer steps than normal points. The anomaly score is
/// `2^(-E[h(x)] / c(ψ))` where `h` is the path length and `ψ` the
/// per-tree sample size; it lies in (0, 1] and higher means more anomalous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    n_features: usize,
    /// Effective per-tree sample size ψ.
    max_samples: usize,
    params: ForestParams,
    /// Scores strictly above this are anomalous.
    threshold: f64,
}

impl IsolationForest {
    /// Fit a forest on `rows` (all rows must have the same length).
    ///
    /// Each tree gets its own RNG seeded from the master seed, so the same
    /// rows and params always give the same forest.
    pub fn fit(rows: &[Vec<f64>], params: ForestParams) -> Result<Self, ForestError> {
        if rows.is_empty() {
            return Err(ForestError::EmptyInput);
        }
        if rows.len() < 2 {
            return Err(ForestError::TooFewRows {
                min: 2,
                found: rows.len(),
            });
        }
        if params.n_estimators == 0 {
            return Err(ForestError::InvalidParameter(
                "n_estimators must be at least 1".into(),
            ));
        }

        let n_features = rows[0].len();
        if n_features == 0 {
            return Err(ForestError::InvalidParameter("rows have no features".into()));
        }
        if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_features) {
            return Err(ForestError::RaggedRows {
                row,
                expected: n_features,
                found: r.len(),
            });
        }

        let n = rows.len();
        let max_samples = match params.max_samples {
            MaxSamples::Auto => n.min(AUTO_MAX_SAMPLES),
            MaxSamples::Count(k) if k >= 2 => k.min(n),
            MaxSamples::Count(k) => {
                return Err(ForestError::InvalidParameter(format!(
                    "max_samples must be at least 2, got {k}"
                )))
            }
        };
        if let Contamination::Fraction(c) = params.contamination {
            if !(c > 0.0 && c <= 0.5) {
                return Err(ForestError::InvalidParameter(format!(
                    "contamination must be in (0, 0.5], got {c}"
                )));
            }
        }

        let max_depth = (max_samples as f64).log2().ceil() as usize;
        let mut master = StdRng::seed_from_u64(params.seed);

        let trees = (0..params.n_estimators)
            .map(|_| {
                let mut rng = StdRng::seed_from_u64(master.gen());
                let mut sample = rand::seq::index::sample(&mut rng, n, max_samples).into_vec();
                IsolationTree::grow(rows, &mut sample, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            n_features,
            max_samples,
            params,
            threshold: AUTO_THRESHOLD,
        };

        if let Contamination::Fraction(c) = params.contamination {
            let mut scores: Vec<f64> = rows.iter().map(|r| forest.score(r)).collect();
            forest.threshold = percentile(&mut scores, 1.0 - c);
        }

        Ok(forest)
    }

    /// Anomaly score in (0, 1]. Higher = more anomalous.
    ///
    /// # Panics
    /// Panics if `x` is shorter than the number of trained features.
    pub fn score(&self, x: &[f64]) -> f64 {
        assert!(
            x.len() >= self.n_features,
            "sample has {} features, forest expects {}",
            x.len(),
            self.n_features
        );
        let mean_path = self.trees.iter().map(|t| t.path_length(x)).sum::<f64>()
            / self.trees.len() as f64;
        2f64.powf(-mean_path / average_path_length(self.max_samples))
    }

    /// Check the structure of a forest that did not come straight from
    /// [`fit`](Self::fit), such as one decoded from disk. A forest that
    /// passes scores any sample of `n_features` values without panicking.
    pub fn validate(&self) -> Result<(), ForestError> {
        if self.trees.is_empty() {
            return Err(ForestError::Malformed("forest has no trees".into()));
        }
        if self.n_features == 0 {
            return Err(ForestError::Malformed("forest has no features".into()));
        }
        if self.max_samples < 2 {
            return Err(ForestError::Malformed(format!(
                "max_samples is {}, need at least 2",
                self.max_samples
            )));
        }
        if !self.threshold.is_finite() {
            return Err(ForestError::Malformed(format!(
                "threshold {} is not finite",
                self.threshold
            )));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|reason| ForestError::Malformed(format!("tree {t}: {reason}")))?;
        }
        Ok(())
    }

    pub fn is_anomaly(&self, x: &[f64]) -> bool {
        self.score(x) > self.threshold
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    pub fn max_samples(&self) -> usize {
        self.max_samples
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }
}

/// Linear-interpolated percentile (`q` in [0, 1]). Sorts `values` in place.
fn percentile(values: &mut [f64], q: f64) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let pos = q.clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    values[lo] + (values[hi] - values[lo]) * frac
}
