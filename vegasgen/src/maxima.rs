//! The coarse partition of the hypercube holding the local maxima of the
//! integrand, used as envelope for the rejection sampling.

use rand::distributions::Open01;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// The largest number of cells a table may hold.
pub const MAX_CELLS: usize = 1 << 24;

/// Statistics gathered while seeding the maxima.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BootstrapSummary {
    /// The average function value.
    pub average: f64,
    /// The average squared function value.
    pub average_sq: f64,
    /// The overall standard deviation.
    pub sigma: f64,
    /// The average in-cell standard deviation.
    pub sigma_cells: f64,
    /// The largest weight observed.
    pub global_max: f64,
    /// The average local maximum over the average function value.
    pub mean_inefficiency: f64,
    /// The global maximum over the average function value.
    pub overall_inefficiency: f64,
}

/// The outcome of raising the maximum of a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Raise {
    /// The previous local maximum.
    pub old: f64,
    /// The increase of the local maximum.
    pub diff: f64,
    /// The expected number of catch-up trials missed by the previous hits.
    pub missed: f64,
}

/// Local maxima and hit counters over `mbin^dim` equal cells.
#[derive(Debug, Clone)]
pub struct MaximaTable {
    dim: usize,
    mbin: usize,
    local_max: Vec<f64>,
    hits: Vec<u64>,
    global_max: f64,
}

impl MaximaTable {
    /// Creates a table of vanishing maxima.
    pub fn new(dim: usize, mbin: usize) -> Result<Self> {
        Self::with_maximum(dim, mbin, 0.0)
    }

    /// Creates a table where every cell starts with the same maximum.
    pub fn with_maximum(dim: usize, mbin: usize, value: f64) -> Result<Self> {
        if dim == 0 {
            return Err(Error::ZeroDimension);
        }
        if mbin == 0 {
            return Err(Error::InvalidConfig(
                "the maxima table needs at least one cell per dimension".into(),
            ));
        }
        if !(value.is_finite() && value >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "a preset maximum must be finite and non-negative, got {value}"
            )));
        }
        let n_cells = u32::try_from(dim)
            .ok()
            .and_then(|d| mbin.checked_pow(d))
            .filter(|&n| n <= MAX_CELLS)
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "{mbin}^{dim} cells exceed the limit of {MAX_CELLS}"
                ))
            })?;

        Ok(MaximaTable {
            dim,
            mbin,
            local_max: vec![value; n_cells],
            hits: vec![0; n_cells],
            global_max: value,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn mbin(&self) -> usize {
        self.mbin
    }

    /// The number of cells.
    pub fn size(&self) -> usize {
        self.local_max.len()
    }

    pub fn local_max(&self, cell: usize) -> f64 {
        self.local_max[cell]
    }

    pub fn local_maxima(&self) -> &[f64] {
        &self.local_max
    }

    /// The number of generation draws that selected `cell`.
    pub fn hits(&self, cell: usize) -> u64 {
        self.hits[cell]
    }

    pub fn global_max(&self) -> f64 {
        self.global_max
    }

    /// Decomposes a flat cell index into its per-axis sub-indices, the first
    /// axis running fastest.
    pub fn cell_coordinates(&self, cell: usize, coords: &mut [usize]) {
        let mut jj = cell;
        for n in coords.iter_mut() {
            *n = jj % self.mbin;
            jj /= self.mbin;
        }
    }

    /// Draws a point strictly inside the cell with sub-indices `coords`.
    pub fn shoot<R: Rng>(&self, rng: &mut R, coords: &[usize], x: &mut [f64]) {
        for (x_d, &n) in x.iter_mut().zip(coords) {
            let u: f64 = rng.sample(Open01);
            *x_d = (u + n as f64) / self.mbin as f64;
        }
    }

    /// Seeds the local maxima with `points_per_cell` points per cell, in order
    /// of the flat cell index. Hit counters are left untouched.
    pub fn bootstrap<R, E>(
        &mut self,
        rng: &mut R,
        points_per_cell: usize,
        mut eval: E,
    ) -> BootstrapSummary
    where
        R: Rng,
        E: FnMut(&[f64]) -> f64,
    {
        let mut coords = vec![0usize; self.dim];
        let mut x = vec![0.0; self.dim];
        let inv_num_points = 1.0 / points_per_cell as f64;

        let (mut sum, mut sum2, mut sum2p) = (0.0, 0.0, 0.0);
        for cell in 0..self.size() {
            self.cell_coordinates(cell, &mut coords);
            let (mut fsum, mut fsum2) = (0.0, 0.0);
            for _ in 0..points_per_cell {
                self.shoot(rng, &coords, &mut x);
                let weight = eval(&x);
                self.record(cell, weight);
                fsum += weight;
                fsum2 += weight * weight;
            }
            let av = fsum * inv_num_points;
            let av2 = fsum2 * inv_num_points;
            let sig2 = (av2 - av * av).max(0.0);
            sum += av;
            sum2 += av2;
            sum2p += sig2;

            let fmax = self.local_max[cell];
            debug!(
                cell,
                n = ?coords,
                av,
                sig = sig2.sqrt(),
                fmax,
                eff = if fmax > 0.0 { av / fmax } else { 0.0 },
                "bootstrapped cell"
            );
        }

        let inv_cells = 1.0 / self.size() as f64;
        let average = sum * inv_cells;
        let average_sq = sum2 * inv_cells;
        let inefficiency = |max: f64| if average > 0.0 { max / average } else { f64::INFINITY };
        let summary = BootstrapSummary {
            average,
            average_sq,
            sigma: (average_sq - average * average).max(0.0).sqrt(),
            sigma_cells: (sum2p * inv_cells).sqrt(),
            global_max: self.global_max,
            mean_inefficiency: inefficiency(self.local_max.iter().sum::<f64>() * inv_cells),
            overall_inefficiency: inefficiency(self.global_max),
        };
        debug!(?summary, "maxima table bootstrapped");
        summary
    }

    /// Keeps `weight` if it exceeds the maximum of `cell`.
    fn record(&mut self, cell: usize, weight: f64) {
        if weight > self.local_max[cell] {
            self.local_max[cell] = weight;
            self.global_max = self.global_max.max(weight);
        }
    }

    pub(crate) fn increment(&mut self, cell: usize) {
        self.hits[cell] += 1;
    }

    /// Raises the maximum of `cell` to `weight`, and the global maximum with it
    /// if exceeded.
    ///
    /// Every previous hit of the cell drew its envelope value uniformly below
    /// the global maximum in force, so a fraction `diff / global_max` of them
    /// fell in the newly uncovered band and should have been tried again.
    pub(crate) fn raise(&mut self, cell: usize, weight: f64) -> Raise {
        let old = self.local_max[cell];
        let diff = weight - old;
        let missed = (self.hits[cell] as f64 - 1.0) * diff / self.global_max;

        self.local_max[cell] = weight;
        self.global_max = self.global_max.max(weight);

        Raise { old, diff, missed }
    }
}
