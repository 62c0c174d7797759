//! The adaptive grid used by the VEGAS algorithm.

/// Represents the adaptive grid for a single dimension.
#[derive(Debug, Clone)]
pub struct Grid {
    /// The number of bins in the grid.
    n_bins: usize,
    /// The grid boundaries, of size `n_bins + 1`.
    bins: Vec<f64>,
    /// The accumulated squared weights for each bin, of size `n_bins`.
    pub(crate) d: Vec<f64>,
    /// The accumulated weights for each bin, of size `n_bins`.
    sum_w: Vec<f64>,
    /// The damping factor for grid adaptation.
    alpha: f64,
}

impl Grid {
    /// Creates a new uniform grid for a given number of bins.
    ///
    /// # Panics
    ///
    /// Panics if `n_bins` is zero.
    pub fn new(n_bins: usize, alpha: f64) -> Self {
        assert!(n_bins >= 1, "a grid needs at least one bin");
        let bins = (0..=n_bins).map(|i| i as f64 / n_bins as f64).collect();

        Grid {
            n_bins,
            bins,
            d: vec![0.0; n_bins],
            sum_w: vec![0.0; n_bins],
            alpha,
        }
    }

    /// Resets the accumulated importance data to zero.
    pub fn reset_importance_data(&mut self) {
        self.d.fill(0.0);
        self.sum_w.fill(0.0);
    }

    /// Given a random number `y` in [0, 1], finds the corresponding grid bin,
    /// the mapped value `x`, and the jacobian for this dimension.
    pub fn map(&self, y: f64) -> (usize, f64, f64) {
        let y_scaled = y * self.n_bins as f64;
        let bin_index = (y_scaled.floor() as usize).min(self.n_bins - 1);
        let y_frac = y_scaled - bin_index as f64;

        let (x, jacobian) = self.locate(bin_index, y_frac);
        (bin_index, x, jacobian)
    }

    /// Interpolates linearly inside bin `bin_index` at the relative position
    /// `y_frac`, returning the mapped value and the jacobian.
    pub fn locate(&self, bin_index: usize, y_frac: f64) -> (f64, f64) {
        let x_low = self.bins[bin_index];
        let width = self.bins[bin_index + 1] - x_low;

        (x_low + y_frac * width, width * self.n_bins as f64)
    }

    /// Adds a weight and its square to the accumulators of a bin.
    pub fn accumulate(&mut self, bin_index: usize, weight: f64) {
        self.sum_w[bin_index] += weight;
        self.d[bin_index] += weight * weight;
    }

    /// Refines the grid based on the accumulated importance data.
    ///
    /// The squared weights are smoothed over neighbouring bins, compressed with
    /// the damping exponent and the boundaries moved so that each new bin holds
    /// the same share of the compressed importance.
    pub fn refine(&mut self) {
        let n = self.n_bins;
        // a single bin always spans the whole axis
        if n < 2 {
            return;
        }
        let mut smoothed_d = vec![0.0; n];
        smoothed_d[0] = (self.d[0] + self.d[1]) / 2.0;
        smoothed_d[n - 1] = (self.d[n - 2] + self.d[n - 1]) / 2.0;
        for i in 1..n - 1 {
            smoothed_d[i] = (self.d[i - 1] + self.d[i] + self.d[i + 1]) / 3.0;
        }

        let total_d: f64 = smoothed_d.iter().sum();
        if !(total_d > 0.0 && total_d.is_finite()) {
            return;
        }

        let compressed_d: Vec<f64> = smoothed_d
            .iter()
            .map(|&d| {
                if d <= 0.0 {
                    return 0.0;
                }
                let ratio = total_d / d;
                let r = ((ratio - 1.0) / ratio / ratio.ln()).powf(self.alpha);
                if r.is_finite() {
                    r
                } else {
                    1.0
                }
            })
            .collect();

        let total_compressed_d: f64 = compressed_d.iter().sum();
        if total_compressed_d <= 0.0 {
            return;
        }
        let desired_d_per_bin = total_compressed_d / n as f64;

        let mut new_bins = Vec::with_capacity(n + 1);
        new_bins.push(0.0);

        let mut current_d_sum = 0.0;
        for (i, &r) in compressed_d.iter().enumerate() {
            current_d_sum += r;
            let (x_low, x_high) = (self.bins[i], self.bins[i + 1]);
            while current_d_sum > desired_d_per_bin && new_bins.len() < n {
                current_d_sum -= desired_d_per_bin;
                new_bins.push(x_high - (x_high - x_low) * current_d_sum / r);
            }
        }

        // round-off starved the last boundary, keep the current grid
        if new_bins.len() < n {
            return;
        }
        new_bins.push(1.0);

        self.bins = new_bins;
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    /// The bin boundaries, of size `n_bins + 1`.
    pub fn edges(&self) -> &[f64] {
        &self.bins
    }

    /// The weights accumulated in each bin since the last reset.
    pub fn weights(&self) -> &[f64] {
        &self.sum_w
    }
}

/// The product of one adaptive [`Grid`] per dimension, mapping the unit
/// hypercube onto itself with an importance-weighted transform.
#[derive(Debug, Clone)]
pub struct ImportanceGrid {
    axes: Vec<Grid>,
    frozen: bool,
}

impl ImportanceGrid {
    /// Creates `dim` uniform grids with `n_bins` bins each.
    ///
    /// # Panics
    ///
    /// Panics if `n_bins` is zero.
    pub fn new(dim: usize, n_bins: usize, alpha: f64) -> Self {
        ImportanceGrid {
            axes: (0..dim).map(|_| Grid::new(n_bins, alpha)).collect(),
            frozen: false,
        }
    }

    pub fn dim(&self) -> usize {
        self.axes.len()
    }

    pub fn n_bins(&self) -> usize {
        self.axes.first().map_or(0, Grid::n_bins)
    }

    pub fn axes(&self) -> &[Grid] {
        &self.axes
    }

    /// Maps per-axis bin indices and relative offsets to the point `x`,
    /// returning the jacobian of the transform.
    pub fn map_coordinate(&self, bin_indices: &[usize], offsets: &[f64], x: &mut [f64]) -> f64 {
        let mut jacobian = 1.0;
        for (d, grid) in self.axes.iter().enumerate() {
            let (x_d, jac) = grid.locate(bin_indices[d], offsets[d]);
            x[d] = x_d;
            jacobian *= jac;
        }
        jacobian
    }

    /// Maps a uniform point `y` to `x`, storing the bins it falls in and
    /// returning the jacobian of the transform.
    pub fn transform(&self, y: &[f64], x: &mut [f64], bin_indices: &mut [usize]) -> f64 {
        let mut jacobian = 1.0;
        for (d, grid) in self.axes.iter().enumerate() {
            let (bin, x_d, jac) = grid.map(y[d]);
            bin_indices[d] = bin;
            x[d] = x_d;
            jacobian *= jac;
        }
        jacobian
    }

    /// Adds `weight` to the addressed bin of every axis.
    pub fn accumulate(&mut self, bin_indices: &[usize], weight: f64) {
        for (grid, &bin) in self.axes.iter_mut().zip(bin_indices) {
            grid.accumulate(bin, weight);
        }
    }

    pub fn reset_importance_data(&mut self) {
        self.axes.iter_mut().for_each(Grid::reset_importance_data);
    }

    /// Refines every axis, unless the grid was frozen.
    pub fn refine(&mut self) {
        if self.frozen {
            return;
        }
        self.axes.iter_mut().for_each(Grid::refine);
    }

    /// Stops any further refinement.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}
