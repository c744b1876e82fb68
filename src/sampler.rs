//! Discrete weighted-random sampling over integer outcomes.
//!
//! `WeightedSampler` holds per-index weights and a cumulative table built
//! lazily (single-flight, so a fully built sampler can be shared read-only
//! across worker threads). Sampling is a binary search over the cumulative
//! table: O(log N) per draw over millions of cells.
//!
//! Degenerate weight sets (zero, negative, or non-finite totals) degrade to
//! "no valid draw" (`None`) rather than propagating corrupt values; callers
//! check the sentinel explicitly.

use std::sync::OnceLock;

#[derive(Debug, Clone, Default)]
pub struct WeightedSampler {
    weights: Vec<f64>,
    cumulative: OnceLock<Vec<f64>>,
}

impl WeightedSampler {
    /// A sampler over `n` outcomes, all weights zero.
    pub fn new(n: usize) -> Self {
        Self {
            weights: vec![0.0; n],
            cumulative: OnceLock::new(),
        }
    }

    /// A sampler with the given weights. Weights must be non-negative and
    /// finite; offending sets are accepted but every draw returns `None`.
    pub fn from_weights(weights: Vec<f64>) -> Self {
        Self {
            weights,
            cumulative: OnceLock::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weight(&self, index: usize) -> f64 {
        self.weights[index]
    }

    /// Set the weight at `index`, invalidating the cumulative table.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn set(&mut self, index: usize, weight: f64) {
        self.weights[index] = weight;
        self.cumulative = OnceLock::new();
    }

    /// Add to the weight at `index`, invalidating the cumulative table.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn add(&mut self, index: usize, weight: f64) {
        self.weights[index] += weight;
        self.cumulative = OnceLock::new();
    }

    /// Multiply every weight by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for w in &mut self.weights {
            *w *= factor;
        }
        self.cumulative = OnceLock::new();
    }

    fn cumulative(&self) -> &[f64] {
        self.cumulative.get_or_init(|| {
            if self.weights.iter().any(|w| *w < 0.0 || !w.is_finite()) {
                // poisoned table: every draw sees a non-finite total
                return vec![f64::NAN; self.weights.len()];
            }
            let mut running = 0.0;
            self.weights
                .iter()
                .map(|w| {
                    running += w;
                    running
                })
                .collect()
        })
    }

    /// Sum of all weights (NaN if any weight is negative or non-finite).
    pub fn sum_of_weights(&self) -> f64 {
        self.cumulative().last().copied().unwrap_or(0.0)
    }

    /// Draw the index whose cumulative-weight bracket contains
    /// `u * total_weight`, for `u` in `[0, 1)` from a caller-supplied
    /// uniform source. Returns `None` for an empty sampler or a degenerate
    /// (zero/NaN/negative) weight set.
    pub fn sample(&self, u: f64) -> Option<usize> {
        let cumulative = self.cumulative();
        let total = *cumulative.last()?;
        if !total.is_finite() || total <= 0.0 {
            return None;
        }
        let target = u.clamp(0.0, 1.0) * total;
        let index = cumulative.partition_point(|c| *c <= target);
        Some(index.min(cumulative.len() - 1))
    }

    /// Indices whose weights, taken largest-first, account for fraction
    /// `fraction` of the total weight; returned sorted ascending. Used to
    /// prune negligible-probability cells. Empty for degenerate weight sets.
    pub fn indices_covering_top_fraction(&self, fraction: f64) -> Vec<usize> {
        let total = self.sum_of_weights();
        if !total.is_finite() || total <= 0.0 {
            return Vec::new();
        }
        let mut order: Vec<usize> = (0..self.weights.len()).collect();
        order.sort_by(|a, b| self.weights[*b].total_cmp(&self.weights[*a]));

        let target = fraction.clamp(0.0, 1.0) * total;
        let mut kept = Vec::new();
        let mut running = 0.0;
        for index in order {
            if running >= target {
                break;
            }
            running += self.weights[index];
            kept.push(index);
        }
        kept.sort_unstable();
        kept
    }
}
