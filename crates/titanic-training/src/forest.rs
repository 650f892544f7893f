//! Random forest binary classifier.
//!
//! Bootstrap-sampled CART trees split on Gini impurity, with `sqrt(n_features)`
//! candidate features per node. Leaves store class distributions, so
//! `predict_proba` is the mean leaf distribution over all trees. Everything
//! random flows from one seeded `StdRng`, so the same data and parameters
//! always produce the same forest.

use crate::error::{TrainingError, TrainingResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub random_state: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// `row[feature] <= threshold` goes left.
    Split { feature: usize, threshold: f64, left: usize, right: usize },
    Leaf { proba: [f64; 2] },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn leaf_proba(&self, row: &[f64]) -> [f64; 2] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { proba } => return *proba,
                Node::Split { feature, threshold, left, right } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    params: ForestParams,
    n_features: usize,
    trees: Vec<DecisionTree>,
    feature_importances: Vec<f64>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

fn gini(counts: [usize; 2]) -> f64 {
    let n = (counts[0] + counts[1]) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let p0 = counts[0] as f64 / n;
    let p1 = counts[1] as f64 / n;
    1.0 - p0 * p0 - p1 * p1
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [u8],
    max_depth: usize,
    max_features: usize,
    n_features: usize,
    n_root: f64,
    rng: StdRng,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl TreeBuilder<'_> {
    fn counts(&self, samples: &[usize]) -> [usize; 2] {
        let mut counts = [0usize; 2];
        for &s in samples {
            counts[usize::from(self.y[s])] += 1;
        }
        counts
    }

    fn build(&mut self, samples: &mut [usize], depth: usize) -> usize {
        let counts = self.counts(samples);
        let n = samples.len() as f64;
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf { proba: [counts[0] as f64 / n, counts[1] as f64 / n] });

        if depth >= self.max_depth || samples.len() < 2 || counts[0] == 0 || counts[1] == 0 {
            return idx;
        }
        let Some(split) = self.best_split(samples, counts) else {
            return idx;
        };

        self.importances[split.feature] += n / self.n_root * split.decrease;

        let mut mid = 0;
        for i in 0..samples.len() {
            if self.x[samples[i]][split.feature] <= split.threshold {
                samples.swap(i, mid);
                mid += 1;
            }
        }
        let (left_samples, right_samples) = samples.split_at_mut(mid);
        let left = self.build(left_samples, depth + 1);
        let right = self.build(right_samples, depth + 1);
        self.nodes[idx] = Node::Split { feature: split.feature, threshold: split.threshold, left, right };
        idx
    }

    /// Best Gini split over a random subset of features. Constant features do
    /// not count toward `max_features`.
    fn best_split(&mut self, samples: &[usize], counts: [usize; 2]) -> Option<SplitCandidate> {
        let parent = gini(counts);
        let n = samples.len();
        let mut features: Vec<usize> = (0..self.n_features).collect();
        features.shuffle(&mut self.rng);

        let mut best: Option<SplitCandidate> = None;
        let mut visited = 0;
        let mut column: Vec<(f64, u8)> = Vec::with_capacity(n);

        for feature in features {
            if visited >= self.max_features {
                break;
            }
            column.clear();
            column.extend(samples.iter().map(|&s| (self.x[s][feature], self.y[s])));
            column.sort_by(|a, b| a.0.total_cmp(&b.0));
            if column[0].0 >= column[n - 1].0 {
                continue;
            }
            visited += 1;

            let mut left = [0usize; 2];
            for i in 0..n - 1 {
                left[usize::from(column[i].1)] += 1;
                let (lo, hi) = (column[i].0, column[i + 1].0);
                if lo >= hi {
                    continue;
                }
                let right = [counts[0] - left[0], counts[1] - left[1]];
                let n_left = (i + 1) as f64;
                let n_right = (n - i - 1) as f64;
                let weighted = (n_left * gini(left) + n_right * gini(right)) / n as f64;
                let decrease = parent - weighted;

                if best.as_ref().is_none_or(|b| decrease > b.decrease) {
                    let mut threshold = lo + (hi - lo) / 2.0;
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some(SplitCandidate { feature, threshold, decrease });
                }
            }
        }
        best
    }
}

impl RandomForestClassifier {
    pub fn fit(x: &[Vec<f64>], y: &[u8], params: ForestParams) -> TrainingResult<Self> {
        if params.n_estimators == 0 {
            return Err(TrainingError::InvalidSpec("n_estimators must be >= 1".to_string()));
        }
        if params.max_depth == 0 {
            return Err(TrainingError::InvalidSpec("max_depth must be >= 1".to_string()));
        }
        if x.is_empty() {
            return Err(TrainingError::ModelFit("training set is empty".to_string()));
        }
        if x.len() != y.len() {
            return Err(TrainingError::ModelFit(format!(
                "{} feature rows but {} targets",
                x.len(),
                y.len()
            )));
        }
        let n_features = x[0].len();
        if n_features == 0 {
            return Err(TrainingError::ModelFit("design matrix has zero columns".to_string()));
        }
        if x.iter().any(|row| row.len() != n_features) {
            return Err(TrainingError::ModelFit("design matrix rows differ in width".to_string()));
        }
        if x.iter().flatten().any(|v| !v.is_finite()) {
            return Err(TrainingError::ModelFit("design matrix contains non-finite values".to_string()));
        }
        if let Some(bad) = y.iter().find(|&&label| label > 1) {
            return Err(TrainingError::ModelFit(format!("target must be 0 or 1, found {bad}")));
        }

        let max_features = ((n_features as f64).sqrt() as usize).clamp(1, n_features);
        let n = x.len();
        let mut seeder = StdRng::seed_from_u64(params.random_state);
        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut importances = vec![0.0; n_features];

        for _ in 0..params.n_estimators {
            let mut rng = StdRng::seed_from_u64(seeder.next_u64());
            let mut samples: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();

            let mut builder = TreeBuilder {
                x,
                y,
                max_depth: params.max_depth,
                max_features,
                n_features,
                n_root: n as f64,
                rng,
                nodes: Vec::new(),
                importances: vec![0.0; n_features],
            };
            builder.build(&mut samples, 0);

            let total: f64 = builder.importances.iter().sum();
            if total > 0.0 {
                for (acc, imp) in importances.iter_mut().zip(&builder.importances) {
                    *acc += imp / total;
                }
            }
            trees.push(DecisionTree { nodes: builder.nodes });
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }

        Ok(Self { params, n_features, trees, feature_importances: importances })
    }

    fn check_width(&self, x: &[Vec<f64>]) -> TrainingResult<()> {
        match x.iter().find(|row| row.len() != self.n_features) {
            Some(row) => Err(TrainingError::SchemaMismatch(format!(
                "model expects {} features, got {}",
                self.n_features,
                row.len()
            ))),
            None => Ok(()),
        }
    }

    /// Class distribution per row: `[p(0), p(1)]`, summing to 1.
    pub fn predict_proba(&self, x: &[Vec<f64>]) -> TrainingResult<Vec<[f64; 2]>> {
        self.check_width(x)?;
        let n_trees = self.trees.len() as f64;
        Ok(x.iter()
            .map(|row| {
                let mut acc = [0.0; 2];
                for tree in &self.trees {
                    let p = tree.leaf_proba(row);
                    acc[0] += p[0];
                    acc[1] += p[1];
                }
                [acc[0] / n_trees, acc[1] / n_trees]
            })
            .collect())
    }

    /// Hard labels. Ties go to class 0.
    pub fn predict(&self, x: &[Vec<f64>]) -> TrainingResult<Vec<u8>> {
        Ok(self.predict_proba(x)?.into_iter().map(|p| u8::from(p[1] > p[0])).collect())
    }

    #[must_use]
    pub fn params(&self) -> ForestParams {
        self.params
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Mean decrease in impurity per feature, normalized to sum to 1 unless
    /// no tree ever split.
    #[must_use]
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}
