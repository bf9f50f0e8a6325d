//! Sparse (unbounded) NDT grid
//!
//! Two lock tiers:
//! 1. `state` (structural guard): bundle map, sub-grid cell maps and the
//!    min/max bundle indices. Held only for lookup/insert.
//! 2. Per-cell guards inside each [`Distribution`], taken after the
//!    structural guard has been released.

use super::geometry::{components, storage_index, BundleIndex, GridGeometry};
use super::Bundle;
use crate::config::GridConfig;
use crate::distribution::Distribution;
use crate::storage::IndexStorage;
use crate::types::{Bounds, Point, RigidTransform};
use crate::Result;
use parking_lot::RwLock;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::trace;

struct SparseState<const D: usize> {
    bundles: IndexStorage<D, Bundle<D>>,
    /// One cell map per sub-grid; bundles hold handles into these
    cells: Vec<IndexStorage<D, Arc<Distribution<D>>>>,
    min_index: BundleIndex<D>,
    max_index: BundleIndex<D>,
}

impl<const D: usize> SparseState<D> {
    fn new() -> Self {
        Self {
            bundles: IndexStorage::new(),
            cells: (0..components(D)).map(|_| IndexStorage::new()).collect(),
            min_index: [i32::MAX; D],
            max_index: [i32::MIN; D],
        }
    }

    fn update_indices(&mut self, index: &BundleIndex<D>) {
        for axis in 0..D {
            self.min_index[axis] = self.min_index[axis].min(index[axis]);
            self.max_index[axis] = self.max_index[axis].max(index[axis]);
        }
    }

    fn bundle_or_insert(&mut self, index: BundleIndex<D>) -> Bundle<D> {
        if let Some(bundle) = self.bundles.get(&index) {
            return bundle.clone();
        }

        let cells = &mut self.cells;
        let handles = (0..components(D))
            .map(|i| {
                let (cell, _) = cells[i]
                    .get_or_insert_with(storage_index(&index, i), || Arc::new(Distribution::new()));
                Arc::clone(cell)
            })
            .collect();
        let bundle = Bundle::new(handles);

        self.bundles.insert(index, bundle.clone());
        self.update_indices(&index);
        trace!(?index, bundles = self.bundles.len(), "created bundle");
        bundle
    }

    fn bounds(&self) -> Option<(BundleIndex<D>, BundleIndex<D>)> {
        if self.bundles.is_empty() {
            None
        } else {
            Some((self.min_index, self.max_index))
        }
    }
}

/// Unbounded NDT grid backed by hash-indexed bundles
pub struct SparseGrid<const D: usize> {
    geometry: GridGeometry<D>,
    state: RwLock<SparseState<D>>,
}

pub type SparseGrid2d = SparseGrid<2>;
pub type SparseGrid3d = SparseGrid<3>;

impl<const D: usize> SparseGrid<D> {
    /// Empty grid whose map frame sits at `origin` (world pose)
    pub fn new(origin: RigidTransform<D>, resolution: f64) -> Result<Self> {
        Ok(Self {
            geometry: GridGeometry::new(origin, resolution)?,
            state: RwLock::new(SparseState::new()),
        })
    }

    pub fn from_config(config: &GridConfig<D>) -> Result<Self> {
        config.validate()?;
        Self::new(config.origin, config.resolution)
    }

    // ===== Insertion =====

    /// Add a world point to all 2^D cells of its bundle
    pub fn add(&self, p_w: &Point<D>) {
        let index = self.to_bundle_index(p_w);
        let bundle = self.get_or_insert_bundle(index);
        bundle.add(p_w);
    }

    /// Parallel batch insertion
    pub fn insert_points(&self, points: &[Point<D>]) {
        points.par_iter().for_each(|p| self.add(p));
    }

    // ===== Sampling =====

    /// Normalized density at a world point, 0 where no bundle exists
    pub fn sample(&self, p_w: &Point<D>) -> f64 {
        let index = self.to_bundle_index(p_w);
        self.get_distribution_bundle(&index)
            .map_or(0.0, |bundle| bundle.sample(p_w))
    }

    pub fn sample_non_normalized(&self, p_w: &Point<D>) -> f64 {
        let index = self.to_bundle_index(p_w);
        self.get_distribution_bundle(&index)
            .map_or(0.0, |bundle| bundle.sample_non_normalized(p_w))
    }

    // ===== Bundle access =====

    /// Bundle at `index`, never creates one
    pub fn get_distribution_bundle(&self, index: &BundleIndex<D>) -> Option<Bundle<D>> {
        self.state.read().bundles.get(index).cloned()
    }

    /// Bundle at `index`, created (and the bounds extended) if missing
    pub fn get_or_insert_bundle(&self, index: BundleIndex<D>) -> Bundle<D> {
        let existing = self.state.read().bundles.get(&index).cloned();
        match existing {
            Some(bundle) => bundle,
            None => self.state.write().bundle_or_insert(index),
        }
    }

    /// Snapshot of all bundle handles, taken under one structural read
    pub fn bundles(&self) -> Vec<(BundleIndex<D>, Bundle<D>)> {
        let state = self.state.read();
        state
            .bundles
            .iter()
            .map(|(index, bundle)| (*index, bundle.clone()))
            .collect()
    }

    /// Visit every bundle. The structural guard is not held during `f`.
    pub fn traverse<F>(&self, mut f: F)
    where
        F: FnMut(&BundleIndex<D>, &Bundle<D>),
    {
        for (index, bundle) in self.bundles() {
            f(&index, &bundle);
        }
    }

    pub fn bundle_count(&self) -> usize {
        self.state.read().bundles.len()
    }

    /// Number of distinct cells over all sub-grids
    pub fn cell_count(&self) -> usize {
        self.state.read().cells.iter().map(|c| c.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bundle_count() == 0
    }

    // ===== Meta information =====

    pub fn get_min_index(&self) -> Option<BundleIndex<D>> {
        self.state.read().bounds().map(|(min, _)| min)
    }

    pub fn get_max_index(&self) -> Option<BundleIndex<D>> {
        self.state.read().bounds().map(|(_, max)| max)
    }

    /// World-frame footprint hull of all bundles, `None` while empty.
    /// See [`GridGeometry::world_bounds`] for the ½-bundle margin.
    pub fn get_bounds(&self) -> Option<Bounds<D>> {
        let bounds = self.state.read().bounds();
        bounds.map(|(min, max)| self.geometry.world_bounds(&min, &max))
    }

    /// Min corner of the footprint hull, `(min_index - ½) * br` before the
    /// world transform rather than `min_index * br`
    pub fn get_min(&self) -> Option<Point<D>> {
        self.get_bounds().map(|b| b.min)
    }

    pub fn get_max(&self) -> Option<Point<D>> {
        self.get_bounds().map(|b| b.max)
    }

    /// Map-frame extent of the occupied bundle range
    pub fn get_extent(&self) -> Option<Point<D>> {
        let bounds = self.state.read().bounds();
        bounds.map(|(min, max)| self.geometry.extent(&min, &max))
    }

    /// World pose of the min bundle centre; the initial origin while empty
    pub fn get_origin(&self) -> RigidTransform<D> {
        match self.get_min_index() {
            Some(min) => self.geometry.origin_at(&min),
            None => *self.geometry.initial_origin(),
        }
    }

    pub fn get_initial_origin(&self) -> RigidTransform<D> {
        *self.geometry.initial_origin()
    }

    pub fn get_resolution(&self) -> f64 {
        self.geometry.resolution()
    }

    pub fn get_bundle_resolution(&self) -> f64 {
        self.geometry.bundle_resolution()
    }

    pub fn geometry(&self) -> &GridGeometry<D> {
        &self.geometry
    }

    /// Bundle index of a world point
    pub fn to_bundle_index(&self, p_w: &Point<D>) -> BundleIndex<D> {
        self.geometry.bundle_index(p_w).0
    }
}

impl SparseGrid<2> {
    pub fn get_width(&self) -> f64 {
        self.get_extent().map_or(0.0, |e| e[0])
    }

    pub fn get_height(&self) -> f64 {
        self.get_extent().map_or(0.0, |e| e[1])
    }
}
