//! The C-language interface for `vegasgen`

use std::ffi::c_void;
use std::os::raw::c_int;

use vegasgen::config::Config;
use vegasgen::error::Error;
use vegasgen::integrand::Integrand;
use vegasgen::sampler::{Event, EventSampler, EventSink};
use vegasgen::vegas::{Vegas, VegasResult};

/// The C-style integrand function pointer.
/// The first argument is the point `x` (an array of f64).
/// The second argument is the dimension.
/// The third is a user-provided `user_data` pointer.
pub type CIntegrand = extern "C" fn(*const f64, c_int, *mut c_void) -> f64;

/// Receives an accepted event: its point, the dimension, its weight and a
/// user-provided pointer.
pub type CEventCallback = extern "C" fn(*const f64, c_int, f64, *mut c_void);

/// Called once all requested events were recorded.
pub type CFinishCallback = extern "C" fn(*mut c_void);

/// The outcome of a call.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VegasgenStatus {
    Ok = 0,
    InvalidConfig = 1,
    ZeroDimension = 2,
    DimensionMismatch = 3,
    VanishingMaximum = 4,
    NullPointer = 5,
}

impl From<&Error> for VegasgenStatus {
    fn from(err: &Error) -> Self {
        match err {
            Error::InvalidConfig(_) => VegasgenStatus::InvalidConfig,
            Error::ZeroDimension => VegasgenStatus::ZeroDimension,
            Error::DimensionMismatch { .. } => VegasgenStatus::DimensionMismatch,
            Error::VanishingMaximum => VegasgenStatus::VanishingMaximum,
        }
    }
}

/// A C-compatible mirror of [`Config`].
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct VegasgenConfig {
    pub n_iter: usize,
    pub n_eval: usize,
    pub n_warmup: usize,
    pub n_bins: usize,
    pub alpha: f64,
    /// The relative accuracy to reach, in percent. Non-positive for none.
    pub target_accuracy: f64,
    /// The chi-square per degree of freedom cut. Non-positive for none.
    pub chi2_cut: f64,
    pub max_batches: usize,
    pub mbin: usize,
    pub points_per_cell: usize,
    pub treat: bool,
    pub correction_cap: usize,
    pub seed: u64,
    /// Draw the seed from the operating system when false.
    pub use_seed: bool,
}

impl From<&VegasgenConfig> for Config {
    fn from(c: &VegasgenConfig) -> Self {
        Config {
            n_iter: c.n_iter,
            n_eval: c.n_eval,
            n_warmup: c.n_warmup,
            n_bins: c.n_bins,
            alpha: c.alpha,
            target_accuracy: (c.target_accuracy > 0.0).then_some(c.target_accuracy),
            chi2_cut: (c.chi2_cut > 0.0).then_some(c.chi2_cut),
            max_batches: c.max_batches,
            mbin: c.mbin,
            points_per_cell: c.points_per_cell,
            treat: c.treat,
            correction_cap: c.correction_cap,
            seed: c.use_seed.then_some(c.seed),
        }
    }
}

/// A wrapper that implements the Rust `Integrand` trait.
struct CIntegrandWrapper {
    dim: usize,
    func: CIntegrand,
    user_data: *mut c_void,
}

impl Integrand for CIntegrandWrapper {
    fn dim(&self) -> usize {
        self.dim
    }

    fn eval(&self, x: &[f64]) -> f64 {
        (self.func)(x.as_ptr(), self.dim as c_int, self.user_data)
    }
}

/// Forwards events to the C callbacks.
struct CEventSink {
    record: CEventCallback,
    finish: Option<CFinishCallback>,
    user_data: *mut c_void,
}

impl EventSink for CEventSink {
    fn record(&mut self, event: &Event) {
        (self.record)(
            event.point.as_ptr(),
            event.point.len() as c_int,
            event.weight,
            self.user_data,
        );
    }

    fn finish(&mut self) {
        if let Some(finish) = self.finish {
            finish(self.user_data);
        }
    }
}

/// The opaque pointer to the Vegas integrator.
pub type VegasC = c_void;

/// Returns the default configuration.
#[no_mangle]
pub extern "C" fn vegasgen_config_default() -> VegasgenConfig {
    let config = Config::default();
    VegasgenConfig {
        n_iter: config.n_iter,
        n_eval: config.n_eval,
        n_warmup: config.n_warmup,
        n_bins: config.n_bins,
        alpha: config.alpha,
        target_accuracy: config.target_accuracy.unwrap_or(0.0),
        chi2_cut: config.chi2_cut.unwrap_or(0.0),
        max_batches: config.max_batches,
        mbin: config.mbin,
        points_per_cell: config.points_per_cell,
        treat: config.treat,
        correction_cap: config.correction_cap,
        seed: config.seed.unwrap_or(0),
        use_seed: config.seed.is_some(),
    }
}

/// Creates a new VEGAS integrator, or returns null if the configuration is
/// invalid.
///
/// # Safety
///
/// `config` must be null or a valid pointer to a `VegasgenConfig`.
#[no_mangle]
pub unsafe extern "C" fn vegasgen_vegas_new(
    dim: usize,
    config: *const VegasgenConfig,
) -> *mut VegasC {
    let config = match config.as_ref() {
        Some(config) => Config::from(config),
        None => Config::default(),
    };

    match Vegas::new(dim, config) {
        Ok(vegas) => Box::into_raw(Box::new(vegas)) as *mut VegasC,
        Err(_) => std::ptr::null_mut(),
    }
}

/// Integrates the given function using the VEGAS algorithm, storing the
/// estimate in `result`.
///
/// # Safety
/// `vegas_ptr` must be a valid pointer returned by `vegasgen_vegas_new`.
/// `integrand_func` must be a valid function pointer.
/// `result` must be null or a valid pointer to a `VegasResult`.
#[no_mangle]
pub unsafe extern "C" fn vegasgen_vegas_integrate(
    vegas_ptr: *mut VegasC,
    integrand_func: CIntegrand,
    user_data: *mut c_void,
    result: *mut VegasResult,
) -> VegasgenStatus {
    let Some(vegas) = (vegas_ptr as *mut Vegas).as_mut() else {
        return VegasgenStatus::NullPointer;
    };

    let integrand = CIntegrandWrapper {
        dim: vegas.dim(),
        func: integrand_func,
        user_data,
    };

    match vegas.integrate(&integrand) {
        Ok(res) => {
            if let Some(out) = result.as_mut() {
                *out = res;
            }
            VegasgenStatus::Ok
        }
        Err(err) => VegasgenStatus::from(&err),
    }
}

/// Generates `n_events` unweighted events of the function integrated last,
/// passing each to `record` and calling `finish`, if not null, at the end.
///
/// # Safety
/// `vegas_ptr` must be a valid pointer returned by `vegasgen_vegas_new`.
/// `integrand_func` and `record` must be valid function pointers.
#[no_mangle]
pub unsafe extern "C" fn vegasgen_vegas_generate(
    vegas_ptr: *mut VegasC,
    integrand_func: CIntegrand,
    integrand_data: *mut c_void,
    n_events: u64,
    record: CEventCallback,
    finish: Option<CFinishCallback>,
    sink_data: *mut c_void,
) -> VegasgenStatus {
    let Some(vegas) = (vegas_ptr as *const Vegas).as_ref() else {
        return VegasgenStatus::NullPointer;
    };

    let integrand = CIntegrandWrapper {
        dim: vegas.dim(),
        func: integrand_func,
        user_data: integrand_data,
    };
    let mut sink = CEventSink {
        record,
        finish,
        user_data: sink_data,
    };

    let generated = EventSampler::from_vegas(vegas, &integrand).and_then(|mut sampler| {
        let mut session = sampler.bootstrap()?;
        sampler.generate(&mut session, n_events, &mut sink)
    });
    match generated {
        Ok(_) => VegasgenStatus::Ok,
        Err(err) => VegasgenStatus::from(&err),
    }
}

/// Frees the memory of the VEGAS integrator.
///
/// # Safety
///
/// `vegas_ptr` must be a valid pointer returned by `vegasgen_vegas_new`
/// and must not be used afterward.
#[no_mangle]
pub unsafe extern "C" fn vegasgen_vegas_free(vegas_ptr: *mut VegasC) {
    if !vegas_ptr.is_null() {
        drop(Box::from_raw(vegas_ptr as *mut Vegas));
    }
}
