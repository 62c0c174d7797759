//! Unweighted event generation by envelope rejection sampling.
//!
//! Cells of a [`MaximaTable`] are selected with a probability proportional to
//! their local maximum, and a point drawn in the cell is kept with a
//! probability proportional to its weight. The maxima are only estimates: when
//! a weight above the maximum of its cell shows up, the maximum is raised and
//! the events the cell should have produced under the higher envelope are
//! caught up by extra trials in the same cell, the correction cycle.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{check_dim, Error, Result};
use crate::grid::ImportanceGrid;
use crate::integrand::{filter_non_finite, Integrand};
use crate::maxima::{BootstrapSummary, MaximaTable};
use crate::vegas::Vegas;

/// An accepted, unweighted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The point in the unit hypercube, mapped through the grid if any.
    pub point: Vec<f64>,
    /// The weight the point was accepted with.
    pub weight: f64,
    /// The maxima-table cell the point was drawn in.
    pub cell: usize,
}

/// Receives the events once they are final.
pub trait EventSink {
    /// Called exactly once per accepted event.
    fn record(&mut self, event: &Event);

    /// Called once all requested events were recorded.
    fn finish(&mut self) {}
}

impl EventSink for Vec<Event> {
    fn record(&mut self, event: &Event) {
        self.push(event.clone());
    }
}

/// Counters of a generation session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    /// The number of events returned.
    pub events: u64,
    /// The number of those events accepted during correction cycles.
    pub correction_events: u64,
    /// The number of integrand evaluations, bootstrap excluded.
    pub evaluations: u64,
    /// The number of correction cycles started by a raised maximum.
    pub corrections: u64,
    /// The number of evaluations that returned a non-finite number.
    pub non_finite_calls: u64,
}

impl GenerationSummary {
    /// The fraction of evaluations that ended as events.
    pub fn efficiency(&self) -> f64 {
        if self.evaluations == 0 {
            0.0
        } else {
            self.events as f64 / self.evaluations as f64
        }
    }
}

/// The debt left by a raised maximum.
#[derive(Debug, Clone, Default)]
struct CorrectionState {
    /// The cell being corrected.
    cell: Option<usize>,
    /// The per-axis sub-indices of `cell`.
    coords: Vec<usize>,
    /// The number of catch-up trials still owed.
    correc: f64,
    /// Trials to be owed again once a larger weight found meanwhile is applied.
    correc2: f64,
    /// The local maximum before the raise.
    max_old: f64,
    /// The increase of the local maximum.
    max_diff: f64,
    /// The largest weight above the local maximum found during catch-up trials.
    max2: f64,
}

impl CorrectionState {
    fn clear(&mut self) {
        self.cell = None;
        self.correc = 0.0;
        self.correc2 = 0.0;
        self.max2 = 0.0;
    }
}

/// The mutable state of one generation: maxima, pending correction and
/// counters. Built by [`EventSampler::bootstrap`] or from a preset table, and
/// threaded through every [`EventSampler::generate_next`] call.
#[derive(Debug, Clone)]
pub struct GenerationSession {
    table: MaximaTable,
    correction: CorrectionState,
    summary: GenerationSummary,
    bootstrap: Option<BootstrapSummary>,
}

impl GenerationSession {
    /// Starts a session from an already filled maxima table.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::VanishingMaximum`] if no cell has a positive maximum.
    pub fn new(table: MaximaTable) -> Result<Self> {
        if !(table.global_max() > 0.0) {
            return Err(Error::VanishingMaximum);
        }
        Ok(GenerationSession {
            table,
            correction: CorrectionState::default(),
            summary: GenerationSummary::default(),
            bootstrap: None,
        })
    }

    pub fn table(&self) -> &MaximaTable {
        &self.table
    }

    pub fn summary(&self) -> &GenerationSummary {
        &self.summary
    }

    /// The statistics of the bootstrap pass, if the session was bootstrapped.
    pub fn bootstrap(&self) -> Option<&BootstrapSummary> {
        self.bootstrap.as_ref()
    }

    /// The cell whose correction cycle is pending.
    pub fn pending_correction(&self) -> Option<usize> {
        self.correction.cell
    }

    /// The number of catch-up trials owed by the pending correction.
    pub fn correction_debt(&self) -> f64 {
        match self.correction.cell {
            Some(_) => self.correction.correc,
            None => 0.0,
        }
    }
}

/// The phases of the production of a single event.
enum State {
    ResolvingCorrection,
    SelectingCell,
    EvaluatingCandidate { cell: usize, y: f64 },
    Accepted(Event),
}

/// Draws unweighted events distributed like an integrand.
pub struct EventSampler<'a, F: ?Sized> {
    integrand: &'a F,
    /// Evaluate through this transform when set.
    grid: Option<&'a ImportanceGrid>,
    rng: Pcg64,
    dim: usize,
    mbin: usize,
    points_per_cell: usize,
    correction_cap: usize,
    coords: Vec<usize>,
    y: Vec<f64>,
    x: Vec<f64>,
    bin_indices: Vec<usize>,
}

impl<'a, F: Integrand + ?Sized> EventSampler<'a, F> {
    /// Creates a sampler evaluating `integrand` directly.
    pub fn new(integrand: &'a F, config: &Config) -> Result<Self> {
        let dim = integrand.dim();
        if dim == 0 {
            return Err(Error::ZeroDimension);
        }
        config.validate_generation()?;

        let rng = match config.seed {
            // a stream distinct from the integrator's
            Some(seed) => Pcg64::seed_from_u64(seed.wrapping_add(1)),
            None => Pcg64::from_entropy(),
        };

        Ok(EventSampler {
            integrand,
            grid: None,
            rng,
            dim,
            mbin: config.mbin,
            points_per_cell: config.points_per_cell,
            correction_cap: config.correction_cap,
            coords: vec![0; dim],
            y: vec![0.0; dim],
            x: vec![0.0; dim],
            bin_indices: vec![0; dim],
        })
    }

    /// Creates a sampler sharing the configuration of `vegas`, and its adapted
    /// grid if `treat` is set.
    pub fn from_vegas(vegas: &'a Vegas, integrand: &'a F) -> Result<Self> {
        check_dim(vegas.dim(), integrand.dim())?;
        let sampler = Self::new(integrand, vegas.config())?;
        if vegas.config().treat {
            sampler.with_grid(vegas.grid())
        } else {
            Ok(sampler)
        }
    }

    /// Evaluates the integrand through the importance transform of `grid`,
    /// weighting by its jacobian.
    pub fn with_grid(mut self, grid: &'a ImportanceGrid) -> Result<Self> {
        check_dim(self.dim, grid.dim())?;
        self.grid = Some(grid);
        Ok(self)
    }

    /// Sets the seed for the random number generator.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = Pcg64::seed_from_u64(seed);
    }

    /// Seeds a maxima table by sampling every cell and starts a session with it.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::VanishingMaximum`] if the integrand vanished at every
    /// bootstrap point.
    pub fn bootstrap(&mut self) -> Result<GenerationSession> {
        let mut table = MaximaTable::new(self.dim, self.mbin)?;
        info!(
            cells = table.size(),
            points_per_cell = self.points_per_cell,
            "preparing the maxima table for the generation of unweighted events"
        );

        let integrand = self.integrand;
        let grid = self.grid;
        let x = &mut self.x;
        let bin_indices = &mut self.bin_indices;
        let mut non_finite_calls = 0;
        let summary = table.bootstrap(&mut self.rng, self.points_per_cell, |y| {
            let (weight, non_finite) = weigh(integrand, grid, y, &mut x[..], &mut bin_indices[..]);
            non_finite_calls += u64::from(non_finite);
            weight
        });
        info!(
            global_max = summary.global_max,
            average = summary.average,
            overall_inefficiency = summary.overall_inefficiency,
            "finished the maxima table preparation"
        );

        let mut session = GenerationSession::new(table)?;
        session.summary.non_finite_calls = non_finite_calls;
        session.bootstrap = Some(summary);
        Ok(session)
    }

    /// Produces the next unweighted event.
    ///
    /// A correction cycle left pending by the previous call is resolved first,
    /// which may itself yield the event.
    pub fn generate_next(&mut self, session: &mut GenerationSession) -> Result<Event> {
        check_dim(self.dim, session.table.dim())?;
        if !(session.table.global_max() > 0.0) {
            return Err(Error::VanishingMaximum);
        }

        let mut state = if session.correction.cell.is_some() {
            State::ResolvingCorrection
        } else {
            State::SelectingCell
        };

        loop {
            state = match state {
                State::ResolvingCorrection => match self.resolve_correction(session) {
                    Some(event) => State::Accepted(event),
                    None => State::SelectingCell,
                },
                State::SelectingCell => self.select_cell(&mut session.table),
                State::EvaluatingCandidate { cell, y } => {
                    session.table.cell_coordinates(cell, &mut self.coords);
                    session.table.shoot(&mut self.rng, &self.coords, &mut self.y);
                    let weight = self.evaluate(&mut session.summary);
                    if weight < y || weight <= 0.0 {
                        State::SelectingCell
                    } else {
                        self.update_maxima(session, cell, weight);
                        State::Accepted(self.event(weight, cell))
                    }
                }
                State::Accepted(event) => {
                    session.summary.events += 1;
                    if session.summary.events % 10_000 == 0 {
                        debug!(events = session.summary.events, "generated events");
                    }
                    return Ok(event);
                }
            };
        }
    }

    /// Generates `n_events` events, handing each to `sink`.
    pub fn generate<S: EventSink + ?Sized>(
        &mut self,
        session: &mut GenerationSession,
        n_events: u64,
        sink: &mut S,
    ) -> Result<GenerationSummary> {
        info!(n_events, "generating unweighted events");
        for _ in 0..n_events {
            let event = self.generate_next(session)?;
            sink.record(&event);
        }
        sink.finish();
        info!(
            events = session.summary.events,
            corrections = session.summary.corrections,
            efficiency = session.summary.efficiency(),
            "events generated"
        );
        Ok(session.summary)
    }

    /// Draws cells uniformly and an envelope value below the global maximum
    /// until the value falls below the maximum of the drawn cell.
    fn select_cell(&mut self, table: &mut MaximaTable) -> State {
        let n_cells = table.size();
        loop {
            let cell = self.rng.gen_range(0..n_cells);
            let y = self.rng.gen::<f64>() * table.global_max();
            table.increment(cell);
            if y <= table.local_max(cell) {
                return State::EvaluatingCandidate { cell, y };
            }
        }
    }

    /// Raises the maxima if `weight` exceeds them and schedules the correction.
    fn update_maxima(&mut self, session: &mut GenerationSession, cell: usize, weight: f64) {
        if weight <= session.table.local_max(cell) {
            session.correction.clear();
            return;
        }

        let raise = session.table.raise(cell, weight);
        let correction = &mut session.correction;
        correction.cell = Some(cell);
        correction.coords.clone_from(&self.coords);
        correction.max_old = raise.old;
        correction.max_diff = raise.diff;
        correction.correc = raise.missed - 1.0;
        correction.correc2 = 0.0;
        correction.max2 = 0.0;
        session.summary.corrections += 1;
        debug!(
            cell,
            weight,
            global_max = session.table.global_max(),
            correc = correction.correc,
            "maximum raised, correction cycle scheduled"
        );
    }

    /// Runs catch-up trials in the pending cell until one is accepted or the
    /// debt is paid.
    fn resolve_correction(&mut self, session: &mut GenerationSession) -> Option<Event> {
        let cell = session.correction.cell?;
        debug!(
            cell,
            correc = session.correction.correc,
            correc2 = session.correction.correc2,
            "correction cycles are started"
        );

        for _ in 0..self.correction_cap {
            let correction = &mut session.correction;
            if correction.correc >= 1.0 {
                correction.correc -= 1.0;
            } else if self.rng.gen::<f64>() < correction.correc {
                correction.correc = -1.0;
            } else {
                // a larger weight found meanwhile raises the maximum again
                if correction.max2 > session.table.local_max(cell) {
                    let raise = session.table.raise(cell, correction.max2);
                    correction.max_old = raise.old;
                    correction.max_diff = raise.diff;
                    correction.correc = raise.missed - correction.correc2;
                    correction.correc2 = 0.0;
                    correction.max2 = 0.0;
                    continue;
                }
                correction.clear();
                return None;
            }

            session
                .table
                .shoot(&mut self.rng, &correction.coords, &mut self.y);
            let weight = self.evaluate(&mut session.summary);
            let correction = &mut session.correction;
            if weight > session.table.local_max(cell) {
                correction.max2 = correction.max2.max(weight);
                correction.correc2 -= 1.0;
                correction.correc += 1.0;
            }
            let threshold = correction.max_diff * self.rng.gen::<f64>() + correction.max_old;
            if weight > 0.0 && weight >= threshold {
                session.summary.correction_events += 1;
                return Some(self.event(weight, cell));
            }
        }

        warn!(
            cell,
            cap = self.correction_cap,
            debt = session.correction.correc,
            "correction cycle cap reached, dropping the remaining debt"
        );
        session.correction.clear();
        None
    }

    /// Evaluates the weight of the point in `self.y`, leaving the evaluated
    /// coordinates in `self.x`.
    fn evaluate(&mut self, summary: &mut GenerationSummary) -> f64 {
        let (weight, non_finite) = weigh(
            self.integrand,
            self.grid,
            &self.y,
            &mut self.x,
            &mut self.bin_indices,
        );
        summary.evaluations += 1;
        summary.non_finite_calls += u64::from(non_finite);
        weight
    }

    fn event(&self, weight: f64, cell: usize) -> Event {
        Event {
            point: self.x.clone(),
            weight,
            cell,
        }
    }
}

/// Evaluates the integrand at `y`, through the grid transform if any.
fn weigh<F: Integrand + ?Sized>(
    integrand: &F,
    grid: Option<&ImportanceGrid>,
    y: &[f64],
    x: &mut [f64],
    bin_indices: &mut [usize],
) -> (f64, bool) {
    let jacobian = match grid {
        Some(grid) => grid.transform(y, x, bin_indices),
        None => {
            x.copy_from_slice(y);
            1.0
        }
    };
    let (f_val, non_finite) = filter_non_finite(integrand.eval(x));
    (jacobian * f_val, non_finite)
}
