//! Run parameters of the integrator and of the event generation.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Steering parameters consumed by [`Vegas`](crate::vegas::Vegas) and
/// [`EventSampler`](crate::sampler::EventSampler).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The maximum number of refining iterations.
    pub n_iter: usize,
    /// The number of integrand evaluations per iteration.
    pub n_eval: usize,
    /// The number of integrand evaluations of the warm-up pass.
    pub n_warmup: usize,
    /// The number of grid bins per dimension.
    pub n_bins: usize,
    /// The grid damping exponent.
    pub alpha: f64,
    /// Stop as soon as the relative error (in percent) drops below this value.
    pub target_accuracy: Option<f64>,
    /// Repeat the batch of `n_iter` iterations while the chi-square per degree
    /// of freedom lies further than `chi2_cut - 1` from one.
    pub chi2_cut: Option<f64>,
    /// The maximum number of batches run by a single integration.
    pub max_batches: usize,
    /// The number of maxima-table cells per dimension.
    pub mbin: usize,
    /// The number of points shot in each cell to seed its maximum.
    pub points_per_cell: usize,
    /// Evaluate the integrand through the adapted grid during generation.
    pub treat: bool,
    /// The maximum number of correction-cycle iterations spent on a single event.
    pub correction_cap: usize,
    /// The seed of the random number generators. Seeded from entropy if `None`.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            n_iter: 10,
            n_eval: 50_000,
            n_warmup: 25_000,
            n_bins: 50,
            alpha: 1.5,
            target_accuracy: None,
            chi2_cut: None,
            max_batches: 10,
            mbin: 3,
            points_per_cell: 100,
            treat: true,
            correction_cap: 1_000_000,
            seed: None,
        }
    }
}

impl Config {
    /// Checks the integration parameters.
    pub fn validate_integration(&self) -> Result<()> {
        if self.n_iter == 0 {
            return Err(invalid("the number of iterations must be positive"));
        }
        if self.n_eval < 2 {
            return Err(invalid("at least two calls per iteration are required"));
        }
        if self.n_warmup < 2 {
            return Err(invalid("at least two warm-up calls are required"));
        }
        if self.n_bins < 2 {
            return Err(invalid("the grid needs at least two bins per dimension"));
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(invalid(format!(
                "the damping exponent must be positive, got {}",
                self.alpha
            )));
        }
        if let Some(acc) = self.target_accuracy {
            if !(acc.is_finite() && acc > 0.0) {
                return Err(invalid(format!(
                    "the target accuracy must be positive, got {acc}"
                )));
            }
        }
        if self.max_batches == 0 {
            return Err(invalid("the number of batches must be positive"));
        }
        match self.chi2_cut {
            Some(cut) if !(cut.is_finite() && cut > 1.0) => Err(invalid(format!(
                "the chi-square cut must be larger than one, got {cut}"
            ))),
            Some(_) if self.n_iter < 2 => Err(invalid(
                "the chi-square cut needs at least two iterations per batch",
            )),
            _ => Ok(()),
        }
    }

    /// Checks the event generation parameters.
    pub fn validate_generation(&self) -> Result<()> {
        if self.mbin == 0 {
            return Err(invalid("the maxima table needs at least one cell per dimension"));
        }
        if self.points_per_cell == 0 {
            return Err(invalid("at least one bootstrap point per cell is required"));
        }
        if self.correction_cap == 0 {
            return Err(invalid("the correction cycle cap must be positive"));
        }
        Ok(())
    }

    /// Checks all parameters.
    pub fn validate(&self) -> Result<()> {
        self.validate_integration()?;
        self.validate_generation()
    }
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::InvalidConfig(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_non_positive_budgets() {
        let config = Config {
            n_iter: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = Config {
            n_eval: 1,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = Config {
            alpha: f64::NAN,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = Config {
            points_per_cell: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn chi2_cut_must_leave_room_around_one() {
        for cut in [1.0, 0.5, f64::INFINITY] {
            let config = Config {
                chi2_cut: Some(cut),
                ..Config::default()
            };
            assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        }

        let config = Config {
            chi2_cut: Some(1.5),
            n_iter: 1,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = Config {
            chi2_cut: Some(1.5),
            max_batches: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = Config {
            chi2_cut: Some(1.5),
            ..Config::default()
        };
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "n_iter": 5, "alpha": 0.5, "seed": 42 }"#).unwrap();
        assert_eq!(config.n_iter, 5);
        assert_eq!(config.alpha, 0.5);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.mbin, 3);
        assert_eq!(config.n_bins, 50);
        assert_eq!(config.chi2_cut, None);
        assert_eq!(config.max_batches, 10);
    }
}
