//! The main VEGAS integrator.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{check_dim, Error, Result};
use crate::grid::ImportanceGrid;
use crate::integrand::{filter_non_finite, Integrand};
use crate::stats::{IterationResult, IterationStats};

/// Stores the result of a VEGAS integration.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VegasResult {
    /// The estimated value of the integral.
    pub value: f64,
    /// The estimated statistical error (one standard deviation).
    pub error: f64,
    /// The chi-squared per degree of freedom of the partial results.
    pub chi2_dof: f64,
    /// The number of iterations combined into `value`.
    pub iterations: usize,
    /// The number of batches of iterations run, the last one giving `value`.
    pub batches: usize,
    /// Whether the requested accuracy was reached and the chi-square fell
    /// inside the cut. Always `true` when neither was requested.
    pub converged: bool,
}

/// The life cycle of the integrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The grid is still uniform.
    Uninitialized,
    /// The grid is being adapted by the warm-up pass.
    WarmUp,
    /// Iterations are being accumulated.
    Refining,
    /// The last integration finished; integrating again reuses the grid.
    Converged,
}

/// The VEGAS Monte Carlo integrator over the unit hypercube.
pub struct Vegas {
    /// The number of dimensions.
    dim: usize,
    /// The steering parameters.
    config: Config,
    /// The random number generator.
    rng: Pcg64,
    /// The adaptive grids for each dimension.
    grid: ImportanceGrid,
    stage: Stage,
    /// The iterations of the last integration.
    stats: IterationStats,
}

impl Vegas {
    /// Creates a new VEGAS integrator.
    ///
    /// # Arguments
    ///
    /// * `dim`: The number of dimensions of the integrand.
    /// * `config`: The steering parameters; only the integration ones are used.
    ///
    /// # Errors
    ///
    /// Fails before any sampling if `dim` is zero or the parameters are invalid.
    pub fn new(dim: usize, config: Config) -> Result<Self> {
        if dim == 0 {
            return Err(Error::ZeroDimension);
        }
        config.validate_integration()?;

        let rng = match config.seed {
            Some(seed) => Pcg64::seed_from_u64(seed),
            None => Pcg64::from_entropy(),
        };
        let grid = ImportanceGrid::new(dim, config.n_bins, config.alpha);

        Ok(Vegas {
            dim,
            config,
            rng,
            grid,
            stage: Stage::Uninitialized,
            stats: IterationStats::new(),
        })
    }

    /// Sets the seed for the random number generator.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = Pcg64::seed_from_u64(seed);
    }

    /// Returns the number of dimensions of the integrator.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The adapted grid, to be shared with an event sampler.
    pub fn grid(&self) -> &ImportanceGrid {
        &self.grid
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The iterations of the last integration.
    pub fn stats(&self) -> &IterationStats {
        &self.stats
    }

    /// Integrates the given function using the VEGAS algorithm.
    ///
    /// The first call runs a warm-up pass whose estimate is discarded. Every
    /// call then runs a batch of up to `n_iter` iterations, stopping early
    /// once the relative error drops below `target_accuracy`. With a
    /// `chi2_cut`, batches are run again from fresh statistics until the
    /// chi-square per degree of freedom is within the cut, at most
    /// `max_batches` times. Integrating again reuses the adapted grid.
    ///
    /// # Examples
    ///
    /// ```
    /// use vegasgen::config::Config;
    /// use vegasgen::integrand::Integrand;
    /// use vegasgen::vegas::Vegas;
    ///
    /// struct MyIntegrand;
    ///
    /// impl Integrand for MyIntegrand {
    ///     fn dim(&self) -> usize {
    ///         2
    ///     }
    ///
    ///     fn eval(&self, x: &[f64]) -> f64 {
    ///         4.0 * x[0] * x[1]
    ///     }
    /// }
    ///
    /// let config = Config {
    ///     n_iter: 5,
    ///     n_eval: 10_000,
    ///     seed: Some(1234),
    ///     ..Config::default()
    /// };
    /// let mut vegas = Vegas::new(2, config).unwrap();
    /// let result = vegas.integrate(&MyIntegrand).unwrap();
    ///
    /// assert!((result.value - 1.0).abs() < 3. * result.error);
    /// ```
    pub fn integrate<F: Integrand + ?Sized>(&mut self, integrand: &F) -> Result<VegasResult> {
        check_dim(self.dim, integrand.dim())?;

        if self.stage == Stage::Uninitialized {
            self.stage = Stage::WarmUp;
            let warm_up = self.run_iteration(integrand, self.config.n_warmup);
            self.grid.refine();
            info!(
                average = warm_up.mean,
                sigma = warm_up.error(),
                calls = warm_up.calls,
                "finished the VEGAS warm-up"
            );
        }

        self.stage = Stage::Refining;
        let mut accurate = false;
        let mut within_cut = false;
        let mut batches = 0;

        while batches < self.config.max_batches {
            batches += 1;
            accurate = self.run_batch(integrand, batches);
            within_cut = match self.config.chi2_cut {
                Some(cut) => (self.stats.chi2_dof() - 1.0).abs() <= cut - 1.0,
                None => true,
            };
            if within_cut {
                break;
            }
            info!(
                batch = batches,
                chi2_dof = self.stats.chi2_dof(),
                cut = ?self.config.chi2_cut,
                "chi-square outside the cut"
            );
        }

        if !accurate {
            warn!(
                accuracy = self.stats.accuracy(),
                requested = ?self.config.target_accuracy,
                chi2_dof = self.stats.chi2_dof(),
                "iteration cap reached before the requested accuracy"
            );
        }
        if !within_cut {
            warn!(
                batches,
                chi2_dof = self.stats.chi2_dof(),
                cut = ?self.config.chi2_cut,
                "batch cap reached before the chi-square entered the cut"
            );
        }
        self.stage = Stage::Converged;

        Ok(VegasResult {
            value: self.stats.value(),
            error: self.stats.error(),
            chi2_dof: self.stats.chi2_dof(),
            iterations: self.stats.len(),
            batches,
            converged: accurate && within_cut,
        })
    }

    /// Runs up to `n_iter` refining iterations into fresh statistics, and
    /// tells whether the requested accuracy was reached.
    fn run_batch<F: Integrand + ?Sized>(&mut self, integrand: &F, batch: usize) -> bool {
        self.stats = IterationStats::new();

        for iter in 0..self.config.n_iter {
            let iteration = self.run_iteration(integrand, self.config.n_eval);
            self.stats.push(iteration);
            info!(
                batch,
                iteration = iter + 1,
                average = iteration.mean,
                sigma = iteration.error(),
                cumulative = self.stats.value(),
                error = self.stats.error(),
                chi2_dof = self.stats.chi2_dof(),
                "iteration finished"
            );

            self.grid.refine();

            if let Some(acc_req) = self.config.target_accuracy {
                if self.stats.accuracy() < acc_req {
                    self.grid.freeze();
                    return true;
                }
            }
        }
        self.config.target_accuracy.is_none()
    }

    /// Returns the number of strata per dimension and the number of points per
    /// stratum for `n_eval` calls.
    fn strata(&self, n_eval: usize) -> (usize, usize) {
        let mut n_strat = ((n_eval / 2) as f64).powf(1.0 / self.dim as f64).floor() as usize;
        n_strat = n_strat.max(1);
        // powf round-off may overshoot the budget
        while n_strat > 1
            && n_strat
                .checked_pow(self.dim as u32)
                .map_or(true, |n| n > n_eval / 2)
        {
            n_strat -= 1;
        }
        let n_cubes = n_strat.pow(self.dim as u32);
        (n_strat, (n_eval / n_cubes).max(2))
    }

    /// Runs a single stratified iteration, feeding the grid accumulators.
    fn run_iteration<F: Integrand + ?Sized>(
        &mut self,
        integrand: &F,
        n_eval: usize,
    ) -> IterationResult {
        self.grid.reset_importance_data();

        let (n_strat, n_points) = self.strata(n_eval);
        let n_cubes = n_strat.pow(self.dim as u32);

        let mut k = vec![0usize; self.dim];
        let mut y = vec![0.0; self.dim];
        let mut x = vec![0.0; self.dim];
        let mut bin_indices = vec![0usize; self.dim];

        let mut total = 0.0;
        let mut total_var = 0.0;
        let mut non_finite_calls = 0;

        for cube in 0..n_cubes {
            let mut jj = cube;
            for k_d in k.iter_mut() {
                *k_d = jj % n_strat;
                jj /= n_strat;
            }

            let mut sum_f = 0.0;
            let mut sum_f2 = 0.0;
            for _ in 0..n_points {
                for (y_d, &k_d) in y.iter_mut().zip(&k) {
                    *y_d = (k_d as f64 + self.rng.gen::<f64>()) / n_strat as f64;
                }
                let jacobian = self.grid.transform(&y, &mut x, &mut bin_indices);

                let (f_val, non_finite) = filter_non_finite(integrand.eval(&x));
                if non_finite {
                    non_finite_calls += 1;
                }
                let weighted_f = f_val * jacobian;
                sum_f += weighted_f;
                sum_f2 += weighted_f * weighted_f;
                self.grid.accumulate(&bin_indices, weighted_f);
            }

            let avg_f = sum_f / n_points as f64;
            let avg_f2 = sum_f2 / n_points as f64;
            total += avg_f;
            total_var += ((avg_f2 - avg_f * avg_f) / (n_points - 1) as f64).max(0.0);
        }

        let calls = n_cubes * n_points;
        let mean = total / n_cubes as f64;
        let variance = total_var / (n_cubes * n_cubes) as f64;
        // spreads below the round-off of the accumulated sums are not resolved
        let round_off = calls as f64 * f64::EPSILON * mean;

        IterationResult {
            mean,
            variance: variance.max(round_off * round_off),
            calls,
            non_finite_calls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrand::Integrand;
    use std::cell::Cell;

    // Integral of the form exp(-x^2 - y^2) in [0, 1]^2.
    struct GaussianIntegrand;

    impl Integrand for GaussianIntegrand {
        fn dim(&self) -> usize {
            2
        }

        fn eval(&self, x: &[f64]) -> f64 {
            (-(x[0].powi(2)) - x[1].powi(2)).exp()
        }
    }

    const ANALYTICAL_RESULT: f64 = 0.557_746_285_351_034;

    struct Constant;

    impl Integrand for Constant {
        fn dim(&self) -> usize {
            2
        }

        fn eval(&self, _: &[f64]) -> f64 {
            1.0
        }
    }

    // Undefined on a quarter of the square.
    struct Holed;

    impl Integrand for Holed {
        fn dim(&self) -> usize {
            2
        }

        fn eval(&self, x: &[f64]) -> f64 {
            if x[0] < 0.5 && x[1] < 0.5 {
                f64::NAN
            } else {
                1.0
            }
        }
    }

    fn config(n_iter: usize, n_eval: usize) -> Config {
        Config {
            n_iter,
            n_eval,
            seed: Some(1234),
            ..Config::default()
        }
    }

    #[test]
    fn test_integrate_gaussian() {
        let mut vegas = Vegas::new(2, config(10, 20_000)).unwrap();
        let result = vegas.integrate(&GaussianIntegrand).unwrap();

        assert!(
            (result.value - ANALYTICAL_RESULT).abs() < 4.0 * result.error,
            "Analytical={} vs. VEGAS={}+/-{}",
            ANALYTICAL_RESULT,
            result.value,
            result.error
        );
        assert!(result.chi2_dof < 3.0, "chi2_dof: {}", result.chi2_dof);
        assert_eq!(result.iterations, 10);
        assert_eq!(result.batches, 1);
        assert!(result.converged);
        assert_eq!(vegas.stage(), Stage::Converged);
    }

    #[test]
    fn test_integrate_constant() {
        let mut vegas = Vegas::new(2, config(5, 10_000)).unwrap();
        let result = vegas.integrate(&Constant).unwrap();

        assert!((result.value - 1.0).abs() <= 3.0 * result.error + 1e-12);
        assert!(result.error < 1e-3);
        assert!(result.chi2_dof < 5.0, "chi2_dof: {}", result.chi2_dof);
    }

    #[test]
    fn non_finite_values_count_as_zero() {
        let mut vegas = Vegas::new(2, config(3, 10_000)).unwrap();
        let result = vegas.integrate(&Holed).unwrap();

        assert!((result.value - 0.75).abs() < 5.0 * result.error + 1e-3);
        let stats = vegas.stats().iterations();
        assert!(stats.iter().all(|it| it.non_finite_calls > 0));
    }

    #[test]
    fn target_accuracy_stops_early_and_freezes_grid() {
        let config = Config {
            target_accuracy: Some(1.0),
            ..config(50, 10_000)
        };
        let mut vegas = Vegas::new(2, config).unwrap();
        let result = vegas.integrate(&GaussianIntegrand).unwrap();

        assert!(result.converged);
        assert!(result.iterations < 50);
        assert!(result.error / result.value * 100.0 < 1.0);
        assert!(vegas.grid().is_frozen());
    }

    #[test]
    fn unreachable_accuracy_is_reported_not_fatal() {
        let config = Config {
            target_accuracy: Some(1e-12),
            ..config(2, 2_000)
        };
        let mut vegas = Vegas::new(2, config).unwrap();
        let result = vegas.integrate(&GaussianIntegrand).unwrap();

        assert!(!result.converged);
        assert_eq!(result.iterations, 2);
        assert!(result.chi2_dof.is_finite());
    }

    // A ramp whose scale flips between iterations during the first `drift`
    // calls, then settles.
    struct Drifting {
        calls: Cell<usize>,
        calls_per_iteration: usize,
        drift: usize,
    }

    impl Integrand for Drifting {
        fn dim(&self) -> usize {
            1
        }

        fn eval(&self, x: &[f64]) -> f64 {
            let call = self.calls.get();
            self.calls.set(call + 1);
            let scale = if call < self.drift && (call / self.calls_per_iteration) % 2 == 1 {
                2.0
            } else {
                1.0
            };
            2.0 * x[0] * scale
        }
    }

    fn batch_config(n_iter: usize) -> Config {
        Config {
            n_warmup: 2,
            chi2_cut: Some(4.0),
            ..config(n_iter, 10_000)
        }
    }

    #[test]
    fn inconsistent_batch_is_run_again() {
        let n_iter = 6;
        // one stratum of two points warms up, then 5000 strata of two points
        let integrand = Drifting {
            calls: Cell::new(0),
            calls_per_iteration: 10_000,
            drift: 2 + n_iter * 10_000,
        };
        let mut vegas = Vegas::new(1, batch_config(n_iter)).unwrap();
        let result = vegas.integrate(&integrand).unwrap();

        assert_eq!(integrand.calls.get(), 2 + 2 * n_iter * 10_000);
        assert_eq!(result.batches, 2);
        assert_eq!(result.iterations, n_iter);
        assert!(result.converged);
        assert!(result.chi2_dof <= 4.0, "chi2_dof: {}", result.chi2_dof);
        assert!((result.value - 1.0).abs() < 5.0 * result.error);
    }

    #[test]
    fn consistent_batch_is_not_repeated() {
        let integrand = Drifting {
            calls: Cell::new(0),
            calls_per_iteration: 10_000,
            drift: 0,
        };
        let mut vegas = Vegas::new(1, batch_config(6)).unwrap();
        let result = vegas.integrate(&integrand).unwrap();

        assert_eq!(result.batches, 1);
        assert!(result.converged);
    }

    #[test]
    fn batch_cap_is_reported_not_fatal() {
        let integrand = Drifting {
            calls: Cell::new(0),
            calls_per_iteration: 10_000,
            drift: usize::MAX,
        };
        let config = Config {
            max_batches: 3,
            ..batch_config(4)
        };
        let mut vegas = Vegas::new(1, config).unwrap();
        let result = vegas.integrate(&integrand).unwrap();

        assert_eq!(result.batches, 3);
        assert_eq!(result.iterations, 4);
        assert!(!result.converged);
        assert!(result.chi2_dof > 4.0);
        assert_eq!(vegas.stage(), Stage::Converged);
    }

    #[test]
    fn integrating_again_reuses_the_grid() {
        let mut vegas = Vegas::new(2, config(3, 5_000)).unwrap();
        vegas.integrate(&GaussianIntegrand).unwrap();
        let edges = vegas.grid().axes()[0].edges().to_vec();
        assert_ne!(edges[1], 1.0 / 50.0);

        let result = vegas.integrate(&GaussianIntegrand).unwrap();
        assert_eq!(result.iterations, 3);
        assert!((result.value - ANALYTICAL_RESULT).abs() < 4.0 * result.error);
    }

    #[test]
    fn invalid_configuration_fails_fast() {
        assert_eq!(
            Vegas::new(0, Config::default()).err(),
            Some(Error::ZeroDimension)
        );
        assert!(matches!(
            Vegas::new(2, config(0, 1000)),
            Err(Error::InvalidConfig(_))
        ));

        let mut vegas = Vegas::new(3, config(1, 1000)).unwrap();
        assert_eq!(
            vegas.integrate(&GaussianIntegrand).err(),
            Some(Error::DimensionMismatch {
                expected: 3,
                found: 2
            })
        );
        assert_eq!(vegas.stage(), Stage::Uninitialized);
    }

    #[test]
    fn strata_match_the_budget() {
        let vegas = Vegas::new(2, config(1, 10_000)).unwrap();
        let (n_strat, n_points) = vegas.strata(10_000);
        assert_eq!(n_strat, 70);
        assert_eq!(n_points, 2);

        let vegas = Vegas::new(3, config(1, 100)).unwrap();
        let (n_strat, n_points) = vegas.strata(100);
        assert_eq!(n_strat, 3);
        assert_eq!(n_points, 3);
    }
}
