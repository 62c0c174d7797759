//! Combination of the estimates of successive iterations.

use serde::{Deserialize, Serialize};

/// The estimate of a single iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationResult {
    /// The estimated value of the integral.
    pub mean: f64,
    /// The variance of `mean`.
    pub variance: f64,
    /// The number of integrand evaluations.
    pub calls: usize,
    /// The number of evaluations that returned a non-finite number.
    pub non_finite_calls: usize,
}

impl IterationResult {
    /// The standard deviation of `mean`.
    pub fn error(&self) -> f64 {
        self.variance.sqrt()
    }
}

/// Inverse-variance weighted combination of iteration estimates.
#[derive(Debug, Clone, Default)]
pub struct IterationStats {
    iterations: Vec<IterationResult>,
    weights: Vec<f64>,
    sum_wgts: f64,
    wtd_int_sum: f64,
    sum_means: f64,
}

impl IterationStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a new iteration into the cumulative estimate.
    ///
    /// An iteration with vanishing variance gets the average weight of the
    /// previous ones.
    pub fn push(&mut self, iteration: IterationResult) {
        let weight = if iteration.variance > 0.0 {
            1.0 / iteration.variance
        } else if self.sum_wgts > 0.0 {
            self.sum_wgts / self.iterations.len() as f64
        } else {
            0.0
        };

        self.sum_wgts += weight;
        self.wtd_int_sum += weight * iteration.mean;
        self.sum_means += iteration.mean;
        self.weights.push(weight);
        self.iterations.push(iteration);
    }

    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }

    pub fn iterations(&self) -> &[IterationResult] {
        &self.iterations
    }

    /// The combined estimate.
    pub fn value(&self) -> f64 {
        if self.sum_wgts > 0.0 {
            self.wtd_int_sum / self.sum_wgts
        } else if self.iterations.is_empty() {
            0.0
        } else {
            self.sum_means / self.iterations.len() as f64
        }
    }

    /// The standard deviation of the combined estimate.
    pub fn error(&self) -> f64 {
        if self.sum_wgts > 0.0 {
            (1.0 / self.sum_wgts).sqrt()
        } else {
            0.0
        }
    }

    /// The chi-square per degree of freedom of the iteration estimates around
    /// the combined value. Zero for fewer than two iterations.
    pub fn chi2_dof(&self) -> f64 {
        let n = self.iterations.len();
        if n < 2 {
            return 0.0;
        }
        let value = self.value();
        let chi2: f64 = self
            .iterations
            .iter()
            .zip(&self.weights)
            .map(|(it, &w)| w * (it.mean - value).powi(2))
            .sum();
        chi2 / (n - 1) as f64
    }

    /// The relative error in percent, infinite for a vanishing estimate.
    pub fn accuracy(&self) -> f64 {
        let value = self.value();
        if value == 0.0 {
            f64::INFINITY
        } else {
            self.error() / value.abs() * 100.0
        }
    }
}
