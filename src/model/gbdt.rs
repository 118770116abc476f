//! Gradient-boosted regression trees
//!
//! Squared-error gradient boosting over depth-limited regression trees: start
//! from the target mean, then repeatedly fit a tree to the residuals and add
//! its scaled output. Split search is an exact scan over sorted feature
//! values with midpoint thresholds. Deterministic for fixed inputs and
//! parameters.

/// Boosting hyperparameters
#[derive(Debug, Clone)]
pub struct GbdtParams {
    /// Number of boosting stages
    pub n_estimators: usize,
    /// Shrinkage applied to each tree's contribution
    pub learning_rate: f64,
    /// Maximum tree depth; `None` grows trees to purity
    pub max_depth: Option<usize>,
    /// Seed for the train/test shuffle
    pub random_state: u64,
}

impl Default for GbdtParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            learning_rate: 0.1,
            max_depth: None,
            random_state: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, row: &[f64]) -> f64 {
        match self {
            Node::Leaf { value } => *value,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.predict(row)
                } else {
                    right.predict(row)
                }
            }
        }
    }
}

/// One regression tree fit to residuals
#[derive(Debug, Clone)]
pub struct RegressionTree {
    root: Node,
}

impl RegressionTree {
    fn fit(x: &[Vec<f64>], targets: &[f64], indices: &[usize], max_depth: Option<usize>) -> Self {
        Self {
            root: build_node(x, targets, indices, 0, max_depth),
        }
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        self.root.predict(row)
    }
}

fn mean_at(targets: &[f64], indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    indices.iter().map(|&i| targets[i]).sum::<f64>() / indices.len() as f64
}

/// Best split for one node: scan every feature's sorted values, keep the
/// (feature, midpoint threshold) with the largest squared-error reduction
fn best_split(x: &[Vec<f64>], targets: &[f64], indices: &[usize]) -> Option<(usize, f64, f64)> {
    let n = indices.len();
    if n < 2 {
        return None;
    }
    let n_features = x[indices[0]].len();

    let total_sum: f64 = indices.iter().map(|&i| targets[i]).sum();
    let parent_score = total_sum * total_sum / n as f64;

    let mut best: Option<(usize, f64, f64)> = None;
    for feature in 0..n_features {
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

        let mut left_sum = 0.0;
        for (pos, &idx) in sorted.iter().enumerate().take(n - 1) {
            left_sum += targets[idx];
            let here = x[idx][feature];
            let next = x[sorted[pos + 1]][feature];
            if here == next {
                continue;
            }

            let left_n = (pos + 1) as f64;
            let right_n = (n - pos - 1) as f64;
            let right_sum = total_sum - left_sum;
            // Gain in sum-of-squares terms; constant parts cancel
            let gain =
                left_sum * left_sum / left_n + right_sum * right_sum / right_n - parent_score;
            let threshold = (here + next) / 2.0;

            match best {
                Some((_, _, best_gain)) if gain <= best_gain => {}
                _ => best = Some((feature, threshold, gain)),
            }
        }
    }

    best.filter(|&(_, _, gain)| gain > 1e-12)
}

fn build_node(
    x: &[Vec<f64>],
    targets: &[f64],
    indices: &[usize],
    depth: usize,
    max_depth: Option<usize>,
) -> Node {
    let value = mean_at(targets, indices);
    if indices.len() < 2 {
        return Node::Leaf { value };
    }
    if let Some(limit) = max_depth {
        if depth >= limit {
            return Node::Leaf { value };
        }
    }

    let Some((feature, threshold, _)) = best_split(x, targets, indices) else {
        return Node::Leaf { value };
    };

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .copied()
        .partition(|&i| x[i][feature] <= threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(build_node(x, targets, &left_idx, depth + 1, max_depth)),
        right: Box::new(build_node(x, targets, &right_idx, depth + 1, max_depth)),
    }
}

/// Fitted boosted ensemble
#[derive(Debug, Clone)]
pub struct GradientBoostedRegressor {
    init: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedRegressor {
    /// Fit the ensemble on a complete (imputed) matrix and aligned targets
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &GbdtParams) -> Self {
        debug_assert_eq!(x.len(), y.len());
        let init = if y.is_empty() {
            0.0
        } else {
            y.iter().sum::<f64>() / y.len() as f64
        };

        let indices: Vec<usize> = (0..x.len()).collect();
        let mut predictions = vec![init; x.len()];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let residuals: Vec<f64> = y
                .iter()
                .zip(&predictions)
                .map(|(target, pred)| target - pred)
                .collect();
            let tree = RegressionTree::fit(x, &residuals, &indices, params.max_depth);
            for (i, row) in x.iter().enumerate() {
                predictions[i] += params.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        Self {
            init,
            learning_rate: params.learning_rate,
            trees,
        }
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.init
            + self.learning_rate
                * self
                    .trees
                    .iter()
                    .map(|tree| tree.predict(row))
                    .sum::<f64>()
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<f64> {
        x.iter().map(|row| self.predict_row(row)).collect()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}
