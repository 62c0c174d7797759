//! The `Integrand` trait, which defines the function to be integrated and sampled.

/// A trait representing a function to be integrated over the unit hypercube.
///
/// Users of the library must implement this trait for their function. The
/// integrand should be deterministic: evaluating it twice at the same point must
/// give the same weight.
pub trait Integrand {
    /// Returns the number of dimensions of the integration space.
    fn dim(&self) -> usize;

    /// Evaluates the function at a given point `x`.
    ///
    /// # Arguments
    ///
    /// * `x`: A slice of `f64` of length [`dim`](Integrand::dim), each
    ///   coordinate lying in `[0, 1]`.
    ///
    /// # Returns
    ///
    /// The non-negative weight `f(x)`. A point where the function is undefined
    /// may return `NaN`; such values are counted and replaced by zero.
    fn eval(&self, x: &[f64]) -> f64;
}

impl<F: Integrand + ?Sized> Integrand for &F {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn eval(&self, x: &[f64]) -> f64 {
        (**self).eval(x)
    }
}

impl<F: Integrand + ?Sized> Integrand for Box<F> {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn eval(&self, x: &[f64]) -> f64 {
        (**self).eval(x)
    }
}

/// Replaces a non-finite weight by zero. The flag reports whether it happened.
pub(crate) fn filter_non_finite(weight: f64) -> (f64, bool) {
    if weight.is_finite() {
        (weight, false)
    } else {
        (0.0, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sum;

    impl Integrand for Sum {
        fn dim(&self) -> usize {
            3
        }

        fn eval(&self, x: &[f64]) -> f64 {
            x.iter().sum()
        }
    }

    #[test]
    fn references_and_boxes_forward() {
        let boxed: Box<dyn Integrand> = Box::new(Sum);
        assert_eq!(boxed.dim(), 3);
        assert_eq!((&boxed).eval(&[0.25, 0.25, 0.5]), 1.0);
    }

    #[test]
    fn non_finite_weights_are_zeroed() {
        assert_eq!(filter_non_finite(2.5), (2.5, false));
        assert_eq!(filter_non_finite(f64::NAN), (0.0, true));
        assert_eq!(filter_non_finite(f64::INFINITY), (0.0, true));
    }
}
