//! Dense (pre-sized) NDT grid
//!
//! `size` counts sub-grid-0 cells per axis. The declared bundle range is
//! `[min_index, min_index + 2 * size)` per axis; sub-grids with an offset on
//! an axis carry one extra cell along it to cover the boundary bundle.
//! Cells and bundles are allocated once; nothing grows afterwards.

use super::geometry::{components, has_offset, storage_index, BundleIndex, GridGeometry};
use super::Bundle;
use crate::config::GridConfig;
use crate::distribution::Distribution;
use crate::types::{Bounds, Point, RigidTransform};
use crate::{Result, StorageError};
use std::sync::Arc;
use tracing::debug;

/// Row-major offset with axis 0 varying fastest
#[inline]
fn flatten<const D: usize>(index: &[usize; D], extent: &[usize; D]) -> usize {
    let mut offset = 0;
    let mut stride = 1;
    for axis in 0..D {
        offset += index[axis] * stride;
        stride *= extent[axis];
    }
    offset
}

#[inline]
fn unflatten<const D: usize>(mut offset: usize, extent: &[usize; D]) -> [usize; D] {
    std::array::from_fn(|axis| {
        let v = offset % extent[axis];
        offset /= extent[axis];
        v
    })
}

/// Fixed-extent NDT grid backed by contiguous arrays
pub struct DenseGrid<const D: usize> {
    geometry: GridGeometry<D>,
    size: [usize; D],
    bundle_size: [usize; D],
    min_index: BundleIndex<D>,
    max_index: BundleIndex<D>,
    bundles: Vec<Bundle<D>>,
}

pub type DenseGrid2d = DenseGrid<2>;
pub type DenseGrid3d = DenseGrid<3>;

impl<const D: usize> DenseGrid<D> {
    /// Allocate a grid covering `2 * size` bundles per axis from `min_index`.
    ///
    /// `min_index` must be even on every axis so that bundle pairs sharing a
    /// cell line up with the sparse layout.
    pub fn new(
        origin: RigidTransform<D>,
        resolution: f64,
        size: [usize; D],
        min_index: BundleIndex<D>,
    ) -> Result<Self> {
        let geometry = GridGeometry::new(origin, resolution)?;

        if size.iter().any(|&s| s == 0) {
            return Err(StorageError::InvalidArgument(format!(
                "dense grid size must be positive on every axis, got {:?}",
                size
            )));
        }
        if min_index.iter().any(|i| i.rem_euclid(2) != 0) {
            return Err(StorageError::InvalidArgument(format!(
                "dense grid min bundle index must be even, got {:?}",
                min_index
            )));
        }

        let mut bundle_size = [0usize; D];
        let mut max_index = [0i32; D];
        for axis in 0..D {
            let span = size[axis].checked_mul(2);
            let last = span
                .and_then(|s| i64::try_from(s).ok())
                .and_then(|s| i64::from(min_index[axis]).checked_add(s - 1))
                .and_then(|last| i32::try_from(last).ok());
            let (span, last) = span.zip(last).ok_or_else(|| {
                StorageError::InvalidArgument(format!(
                    "dense grid size {:?} overflows the bundle index range",
                    size
                ))
            })?;
            bundle_size[axis] = span;
            max_index[axis] = last;
        }

        let bundle_count = bundle_size
            .iter()
            .try_fold(1usize, |acc, &s| acc.checked_mul(s))
            .ok_or_else(|| {
                StorageError::InvalidArgument(format!("dense grid size {:?} is too large", size))
            })?;

        // cells per sub-grid, then bundles wired into them
        let cell_extents: Vec<[usize; D]> = (0..components(D))
            .map(|i| std::array::from_fn(|axis| size[axis] + has_offset(i, axis) as usize))
            .collect();
        let cells: Vec<Vec<Arc<Distribution<D>>>> = cell_extents
            .iter()
            .map(|extent| {
                (0..extent.iter().product::<usize>())
                    .map(|_| Arc::new(Distribution::new()))
                    .collect()
            })
            .collect();

        let bundles = (0..bundle_count)
            .map(|slot| {
                let relative = unflatten(slot, &bundle_size);
                let relative: BundleIndex<D> = std::array::from_fn(|axis| relative[axis] as i32);
                let handles = (0..components(D))
                    .map(|i| {
                        let cell = storage_index(&relative, i);
                        let cell: [usize; D] = std::array::from_fn(|axis| cell[axis] as usize);
                        Arc::clone(&cells[i][flatten(&cell, &cell_extents[i])])
                    })
                    .collect();
                Bundle::new(handles)
            })
            .collect();

        debug!(?size, ?min_index, bundles = bundle_count, "allocated dense grid");

        Ok(Self {
            geometry,
            size,
            bundle_size,
            min_index,
            max_index,
            bundles,
        })
    }

    pub fn from_config(
        config: &GridConfig<D>,
        size: [usize; D],
        min_index: BundleIndex<D>,
    ) -> Result<Self> {
        config.validate()?;
        Self::new(config.origin, config.resolution, size, min_index)
    }

    fn slot(&self, index: &BundleIndex<D>) -> Result<usize> {
        let mut relative = [0usize; D];
        for axis in 0..D {
            let r = i64::from(index[axis]) - i64::from(self.min_index[axis]);
            if r < 0 || r >= self.bundle_size[axis] as i64 {
                return Err(StorageError::out_of_bounds(index, &self.min_index, &self.max_index));
            }
            relative[axis] = r as usize;
        }
        Ok(flatten(&relative, &self.bundle_size))
    }

    // ===== Insertion =====

    /// Add a world point; fails if it falls outside the declared range
    pub fn add(&self, p_w: &Point<D>) -> Result<()> {
        let index = self.to_bundle_index(p_w);
        self.get_distribution_bundle(&index)?.add(p_w);
        Ok(())
    }

    // ===== Sampling =====

    pub fn sample(&self, p_w: &Point<D>) -> Result<f64> {
        let index = self.to_bundle_index(p_w);
        Ok(self.get_distribution_bundle(&index)?.sample(p_w))
    }

    pub fn sample_non_normalized(&self, p_w: &Point<D>) -> Result<f64> {
        let index = self.to_bundle_index(p_w);
        Ok(self.get_distribution_bundle(&index)?.sample_non_normalized(p_w))
    }

    // ===== Bundle access =====

    pub fn get_distribution_bundle(&self, index: &BundleIndex<D>) -> Result<&Bundle<D>> {
        let slot = self.slot(index)?;
        Ok(&self.bundles[slot])
    }

    pub fn contains_index(&self, index: &BundleIndex<D>) -> bool {
        self.slot(index).is_ok()
    }

    /// Visit every bundle in slot order (axis 0 fastest)
    pub fn traverse<F>(&self, mut f: F)
    where
        F: FnMut(&BundleIndex<D>, &Bundle<D>),
    {
        for (slot, bundle) in self.bundles.iter().enumerate() {
            let relative = unflatten(slot, &self.bundle_size);
            let index: BundleIndex<D> =
                std::array::from_fn(|axis| self.min_index[axis] + relative[axis] as i32);
            f(&index, bundle);
        }
    }

    pub fn bundle_count(&self) -> usize {
        self.bundles.len()
    }

    // ===== Meta information =====

    pub fn get_size(&self) -> [usize; D] {
        self.size
    }

    pub fn get_bundle_size(&self) -> [usize; D] {
        self.bundle_size
    }

    pub fn get_min_index(&self) -> BundleIndex<D> {
        self.min_index
    }

    pub fn get_max_index(&self) -> BundleIndex<D> {
        self.max_index
    }

    /// World-frame bundle footprint hull, see [`GridGeometry::world_bounds`]
    pub fn get_bounds(&self) -> Bounds<D> {
        self.geometry.world_bounds(&self.min_index, &self.max_index)
    }

    /// Min corner of the footprint hull, `(min_index - ½) * br` before the
    /// world transform rather than `min_index * br`
    pub fn get_min(&self) -> Point<D> {
        self.get_bounds().min
    }

    pub fn get_max(&self) -> Point<D> {
        self.get_bounds().max
    }

    pub fn get_extent(&self) -> Point<D> {
        self.geometry.extent(&self.min_index, &self.max_index)
    }

    pub fn get_origin(&self) -> RigidTransform<D> {
        self.geometry.origin_at(&self.min_index)
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

    pub fn to_bundle_index(&self, p_w: &Point<D>) -> BundleIndex<D> {
        self.geometry.bundle_index(p_w).0
    }
}

impl DenseGrid<2> {
    pub fn get_width(&self) -> f64 {
        self.get_extent()[0]
    }

    pub fn get_height(&self) -> f64 {
        self.get_extent()[1]
    }
}
