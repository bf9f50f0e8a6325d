//! NDT grid maps
//!
//! Both variants store 2^D staggered sub-grids of [`Distribution`] cells and
//! address them through bundles (see [`geometry`]):
//!
//! - [`SparseGrid`]: unbounded, grows on insertion, hash-indexed
//! - [`DenseGrid`]: fixed bundle range allocated up front

pub mod dense;
pub mod geometry;
pub mod sparse;

pub use dense::{DenseGrid, DenseGrid2d, DenseGrid3d};
pub use geometry::{components, storage_index, BundleIndex, GridGeometry};
pub use sparse::{SparseGrid, SparseGrid2d, SparseGrid3d};

use crate::distribution::{Distribution, Statistics};
use crate::types::Point;
use std::sync::Arc;

/// The 2^D cells (one per sub-grid) covering one bundle index.
///
/// Components are shared with neighbouring bundles; cloning a bundle clones
/// handles, not statistics. Statistics live in the world frame, the map frame
/// only selects the bundle.
#[derive(Clone)]
pub struct Bundle<const D: usize> {
    components: Box<[Arc<Distribution<D>>]>,
}

impl<const D: usize> std::fmt::Debug for Bundle<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.components.iter()).finish()
    }
}

impl<const D: usize> Bundle<D> {
    pub(crate) fn new(components: Vec<Arc<Distribution<D>>>) -> Self {
        debug_assert_eq!(components.len(), geometry::components(D));
        Self {
            components: components.into_boxed_slice(),
        }
    }

    /// Component of sub-grid `i`. Panics if `i >= 2^D`.
    #[inline]
    pub fn at(&self, i: usize) -> &Distribution<D> {
        &self.components[i]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Distribution<D>> {
        self.components.iter().map(|d| d.as_ref())
    }

    /// True if the two bundles reference the same cell for sub-grid `i`
    pub fn shares_component(&self, other: &Bundle<D>, i: usize) -> bool {
        Arc::ptr_eq(&self.components[i], &other.components[i])
    }

    pub fn is_touched(&self) -> bool {
        self.iter().any(|d| d.is_touched())
    }

    /// Add a world point to every component, one cell guard at a time
    pub fn add(&self, p_w: &Point<D>) {
        for d in self.iter() {
            d.add(p_w);
        }
    }

    /// Mean density over the components at a world point
    pub fn sample(&self, p_w: &Point<D>) -> f64 {
        let sum: f64 = self.iter().map(|d| d.evaluate(p_w)).sum();
        sum / self.len() as f64
    }

    pub fn sample_non_normalized(&self, p_w: &Point<D>) -> f64 {
        let sum: f64 = self.iter().map(|d| d.evaluate_non_normalized(p_w)).sum();
        sum / self.len() as f64
    }

    pub fn snapshot(&self) -> Vec<Statistics<D>> {
        self.iter().map(|d| d.snapshot()).collect()
    }

    /// Copy every component's statistics verbatim from `other`
    pub fn copy_from(&self, other: &Bundle<D>) {
        for (dst, src) in self.iter().zip(other.iter()) {
            // never hold two cell guards at once
            let statistics = src.snapshot();
            dst.replace(statistics);
        }
    }
}
