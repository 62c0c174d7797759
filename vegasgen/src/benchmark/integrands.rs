//! Standard benchmark integrands for Monte Carlo integration.
use crate::integrand::Integrand;

use libm::erf;
use std::f64::consts::PI;

/// Returns the parameters for the Genz test functions: the difficulties `c`,
/// in [1, 5), and the shifts `w`, in [0, 1).
fn genz_params(dim: usize) -> (Vec<f64>, Vec<f64>) {
    let mut c = Vec::with_capacity(dim);
    let mut w = Vec::with_capacity(dim);
    for i in 1..=dim {
        c.push(1.0 + 4.0 * (i as f64 * 0.618_033_988_749_895).fract());
        w.push((0.5 + i as f64 * 0.414_213_562_373_095).fract());
    }
    (c, w)
}

/// An integrand with a known integral over the unit hypercube.
pub trait Benchmark: Integrand {
    fn name(&self) -> &'static str;
    fn analytical_result(&self) -> f64;
}

/// Returns every benchmark integrand in `dim` dimensions.
pub fn all(dim: usize) -> Vec<Box<dyn Benchmark + Send + Sync>> {
    vec![
        Box::new(GenzOscillatory::new(dim)),
        Box::new(GenzProductPeak::new(dim)),
        Box::new(GenzGaussian::new(dim)),
        Box::new(EndpointSingularity::new(dim)),
    ]
}

// Genz Oscillatory
#[derive(Clone)]
pub struct GenzOscillatory {
    dim: usize,
    c: Vec<f64>,
    w: Vec<f64>,
}

impl GenzOscillatory {
    pub fn new(dim: usize) -> Self {
        let (c, w) = genz_params(dim);
        Self { dim, c, w }
    }
}

impl Benchmark for GenzOscillatory {
    fn name(&self) -> &'static str {
        "GenzOscillatory"
    }

    /// The real part of the product of the one-dimensional integrals of
    /// `exp(i c (x - w))`.
    fn analytical_result(&self) -> f64 {
        let (mut re, mut im) = (1.0, 0.0);
        for i in 0..self.dim {
            let (a, b) = (self.c[i] * (1. - self.w[i]), self.c[i] * self.w[i]);
            let f_re = (a.sin() + b.sin()) / self.c[i];
            let f_im = (b.cos() - a.cos()) / self.c[i];
            (re, im) = (re * f_re - im * f_im, re * f_im + im * f_re);
        }
        re
    }
}

impl Integrand for GenzOscillatory {
    fn dim(&self) -> usize {
        self.dim
    }

    fn eval(&self, x: &[f64]) -> f64 {
        let mut sum = 0.;
        for i in 0..self.dim {
            sum += self.c[i] * (x[i] - self.w[i]);
        }
        sum.cos()
    }
}

// Genz Product Peak
#[derive(Clone)]
pub struct GenzProductPeak {
    dim: usize,
    c: Vec<f64>,
    w: Vec<f64>,
}

impl GenzProductPeak {
    pub fn new(dim: usize) -> Self {
        let (c, w) = genz_params(dim);
        Self { dim, c, w }
    }
}

impl Benchmark for GenzProductPeak {
    fn name(&self) -> &'static str {
        "GenzProductPeak"
    }

    fn analytical_result(&self) -> f64 {
        let mut result = 1.0;
        for i in 0..self.dim {
            result *= self.c[i]
                * ((self.c[i] * (1. - self.w[i])).atan() + (self.c[i] * self.w[i]).atan());
        }
        result
    }
}

impl Integrand for GenzProductPeak {
    fn dim(&self) -> usize {
        self.dim
    }

    fn eval(&self, x: &[f64]) -> f64 {
        let mut result = 1.0;
        for i in 0..self.dim {
            result *= 1.0 / (self.c[i].powi(-2) + (x[i] - self.w[i]).powi(2));
        }
        result
    }
}

// Genz Gaussian
#[derive(Clone)]
pub struct GenzGaussian {
    dim: usize,
    c: Vec<f64>,
    w: Vec<f64>,
}

impl GenzGaussian {
    pub fn new(dim: usize) -> Self {
        let (c, w) = genz_params(dim);
        Self { dim, c, w }
    }
}

impl Benchmark for GenzGaussian {
    fn name(&self) -> &'static str {
        "GenzGaussian"
    }

    fn analytical_result(&self) -> f64 {
        let mut result = 1.0;
        for i in 0..self.dim {
            result *= (PI.sqrt() / (2. * self.c[i]))
                * (erf(self.c[i] * (1. - self.w[i])) + erf(self.c[i] * self.w[i]));
        }
        result
    }
}

impl Integrand for GenzGaussian {
    fn dim(&self) -> usize {
        self.dim
    }

    fn eval(&self, x: &[f64]) -> f64 {
        let mut sum = 0.0;
        for i in 0..self.dim {
            sum += self.c[i].powi(2) * (x[i] - self.w[i]).powi(2);
        }
        (-sum).exp()
    }
}

// Endpoint Singularity
#[derive(Clone)]
pub struct EndpointSingularity {
    dim: usize,
}

impl EndpointSingularity {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Benchmark for EndpointSingularity {
    fn name(&self) -> &'static str {
        "EndpointSingularity"
    }

    fn analytical_result(&self) -> f64 {
        2.0f64.powi(self.dim as i32)
    }
}

impl Integrand for EndpointSingularity {
    fn dim(&self) -> usize {
        self.dim
    }

    fn eval(&self, x: &[f64]) -> f64 {
        let mut result = 1.0;
        for &val in x {
            if val <= 0.0 {
                return 0.0;
            }
            result *= val.powf(-0.5);
        }
        result
    }
}
