//! Integrands with known integrals, shared by the tests and benchmarks.

pub mod integrands;
