//! `vegasgen` is a multi-dimensional Monte Carlo integrator and unweighted
//! event generator.
//!
//! The [`Vegas`](vegas::Vegas) integrator adapts an importance grid to the
//! integrand over a number of iterations, combining their estimates. The
//! [`EventSampler`](sampler::EventSampler) then draws points distributed like
//! the integrand by rejection sampling under a table of local maxima, which is
//! corrected on the fly whenever a point exceeds it.
//!
//! ```
//! use vegasgen::config::Config;
//! use vegasgen::integrand::Integrand;
//! use vegasgen::sampler::EventSampler;
//! use vegasgen::vegas::Vegas;
//!
//! struct Ramp;
//!
//! impl Integrand for Ramp {
//!     fn dim(&self) -> usize {
//!         1
//!     }
//!
//!     fn eval(&self, x: &[f64]) -> f64 {
//!         2.0 * x[0]
//!     }
//! }
//!
//! let config = Config {
//!     n_eval: 5_000,
//!     n_warmup: 2_000,
//!     seed: Some(5),
//!     ..Config::default()
//! };
//! let mut vegas = Vegas::new(1, config).unwrap();
//! let result = vegas.integrate(&Ramp).unwrap();
//! assert!((result.value - 1.0).abs() < 5.0 * result.error + 1e-9);
//!
//! let mut sampler = EventSampler::from_vegas(&vegas, &Ramp).unwrap();
//! let mut session = sampler.bootstrap().unwrap();
//! let mut events = Vec::new();
//! sampler.generate(&mut session, 100, &mut events).unwrap();
//! assert_eq!(events.len(), 100);
//! ```

pub mod benchmark;
pub mod config;
pub mod error;
pub mod grid;
pub mod integrand;
pub mod maxima;
pub mod sampler;
pub mod stats;
pub mod vegas;

pub use error::{Error, Result};
