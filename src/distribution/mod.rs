//! Cell aggregators
//!
//! A [`Distribution`] is one cell of one staggered sub-grid: Gaussian
//! sufficient statistics behind their own exclusive guard. Grids hand out
//! shared handles (`Arc<Distribution<D>>`) and callers mutate them through
//! [`Distribution::lock`] once the grid's structural guard has been released.
//!
//! Lock order: grid structural guard first, then at most one cell guard at a
//! time. Never acquire a structural guard while holding a cell guard.

pub mod statistics;

pub use statistics::{Gaussian, Statistics};

use crate::types::Point;
use parking_lot::{Mutex, MutexGuard};

struct DistributionState<const D: usize> {
    statistics: Statistics<D>,
    /// Fitted Gaussian; outer `None` means stale
    gaussian: Option<Option<Gaussian<D>>>,
}

/// Guarded aggregator for one sub-grid cell
pub struct Distribution<const D: usize> {
    state: Mutex<DistributionState<D>>,
}

impl<const D: usize> Default for Distribution<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const D: usize> std::fmt::Debug for Distribution<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Distribution")
            .field("statistics", &self.snapshot())
            .finish()
    }
}

impl<const D: usize> Distribution<D> {
    pub fn new() -> Self {
        Self::from_statistics(Statistics::default())
    }

    pub fn from_statistics(statistics: Statistics<D>) -> Self {
        Self {
            state: Mutex::new(DistributionState {
                statistics,
                gaussian: None,
            }),
        }
    }

    /// Acquire the cell guard. Released when the guard is dropped.
    #[inline]
    pub fn lock(&self) -> DistributionGuard<'_, D> {
        DistributionGuard {
            state: self.state.lock(),
        }
    }

    pub fn add(&self, p: &Point<D>) {
        self.lock().add(p);
    }

    pub fn evaluate(&self, p: &Point<D>) -> f64 {
        self.lock().evaluate(p)
    }

    pub fn evaluate_non_normalized(&self, p: &Point<D>) -> f64 {
        self.lock().evaluate_non_normalized(p)
    }

    /// Copy of the current statistics
    pub fn snapshot(&self) -> Statistics<D> {
        self.lock().statistics().clone()
    }

    pub fn replace(&self, statistics: Statistics<D>) {
        self.lock().replace(statistics);
    }

    pub fn count(&self) -> u64 {
        self.lock().statistics().count()
    }

    pub fn is_touched(&self) -> bool {
        self.count() > 0
    }
}

/// Scoped exclusive access to one aggregator
pub struct DistributionGuard<'a, const D: usize> {
    state: MutexGuard<'a, DistributionState<D>>,
}

impl<'a, const D: usize> DistributionGuard<'a, D> {
    pub fn add(&mut self, p: &Point<D>) {
        self.state.statistics.add(p);
        self.state.gaussian = None;
    }

    pub fn merge(&mut self, other: &Statistics<D>) {
        self.state.statistics.merge(other);
        self.state.gaussian = None;
    }

    pub fn replace(&mut self, statistics: Statistics<D>) {
        self.state.statistics = statistics;
        self.state.gaussian = None;
    }

    pub fn statistics(&self) -> &Statistics<D> {
        &self.state.statistics
    }

    pub fn is_touched(&self) -> bool {
        !self.state.statistics.is_empty()
    }

    fn gaussian(&mut self) -> Option<&Gaussian<D>> {
        let state = &mut *self.state;
        if state.gaussian.is_none() {
            state.gaussian = Some(state.statistics.gaussian());
        }
        state.gaussian.as_ref().and_then(Option::as_ref)
    }

    pub fn evaluate(&mut self, p: &Point<D>) -> f64 {
        self.gaussian().map_or(0.0, |g| g.evaluate(p))
    }

    pub fn evaluate_non_normalized(&mut self, p: &Point<D>) -> f64 {
        self.gaussian().map_or(0.0, |g| g.evaluate_non_normalized(p))
    }
}
