//! Staggered multi-offset grid geometry
//!
//! ```text
//! bundle index   ... -2  -1   0   1   2   3   4 ...      (spacing = resolution / 2)
//! sub-grid 0       |  -1   |   0   |   1   |   2  ...    cells span bundles (2k, 2k+1)
//! sub-grid 1     ...   |   0   |   1   |   2   |  ...    cells span bundles (2k-1, 2k)
//! ```
//!
//! A grid is the overlay of 2^D sub-grids of equal resolution. Along each
//! axis, sub-grid `i` is shifted by -¼ resolution when bit `axis` of `i` is
//! set and by +¼ resolution otherwise. Every map-frame point is mapped to one
//! bundle index on the half-resolution lattice; the bundle names exactly one
//! cell in each sub-grid (see [`storage_index`]), so neighbouring bundles
//! share cells.

use crate::types::{Bounds, Point, RigidTransform};
use crate::{Result, StorageError};

/// Integer bundle coordinate on the half-resolution lattice
pub type BundleIndex<const D: usize> = [i32; D];

/// Number of staggered sub-grids (and bundle components) in D dimensions
#[inline]
pub const fn components(dim: usize) -> usize {
    1 << dim
}

/// Whether sub-grid `component` carries the odd-parity shift along `axis`
#[inline]
pub const fn has_offset(component: usize, axis: usize) -> bool {
    (component >> axis) & 1 == 1
}

/// Cell of sub-grid `component` addressed by `bundle`.
///
/// Per axis: `div(b, 2) + bit * mod(b, 2)` with floor division and a
/// non-negative modulus, so negative bundle indices land in the correct cell.
#[inline]
pub fn storage_index<const D: usize>(bundle: &BundleIndex<D>, component: usize) -> [i32; D] {
    std::array::from_fn(|axis| {
        let b = bundle[axis];
        let div = b.div_euclid(2);
        if has_offset(component, axis) {
            div + b.rem_euclid(2)
        } else {
            div
        }
    })
}

/// Frame and scale shared by the sparse and dense grids
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry<const D: usize> {
    resolution: f64,
    bundle_resolution: f64,
    bundle_resolution_inv: f64,
    w_t_m: RigidTransform<D>,
    m_t_w: RigidTransform<D>,
}

impl<const D: usize> GridGeometry<D> {
    pub fn new(origin: RigidTransform<D>, resolution: f64) -> Result<Self> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(StorageError::InvalidArgument(format!(
                "resolution must be finite and positive, got {}",
                resolution
            )));
        }
        let bundle_resolution = 0.5 * resolution;
        Ok(Self {
            resolution,
            bundle_resolution,
            bundle_resolution_inv: 1.0 / bundle_resolution,
            w_t_m: origin,
            m_t_w: origin.inverse(),
        })
    }

    #[inline]
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    #[inline]
    pub fn bundle_resolution(&self) -> f64 {
        self.bundle_resolution
    }

    /// World pose of the map frame
    #[inline]
    pub fn initial_origin(&self) -> &RigidTransform<D> {
        &self.w_t_m
    }

    #[inline]
    pub fn to_map(&self, p_w: &Point<D>) -> Point<D> {
        self.m_t_w.transform_point(p_w)
    }

    /// Round-to-nearest on the bundle lattice; ties go towards +inf
    #[inline]
    pub fn bundle_index_of_map(&self, p_m: &Point<D>) -> BundleIndex<D> {
        std::array::from_fn(|axis| (p_m[axis] * self.bundle_resolution_inv + 0.5).floor() as i32)
    }

    /// Bundle index of a world point, together with the map-frame point
    #[inline]
    pub fn bundle_index(&self, p_w: &Point<D>) -> (BundleIndex<D>, Point<D>) {
        let p_m = self.to_map(p_w);
        (self.bundle_index_of_map(&p_m), p_m)
    }

    /// Map-frame centre of a bundle, shifted by `shift` bundles per axis
    fn bundle_point(&self, index: &BundleIndex<D>, shift: f64) -> Point<D> {
        Point::<D>::from_fn(|axis, _| (index[axis] as f64 + shift) * self.bundle_resolution)
    }

    /// Map-frame centre of a bundle
    pub fn bundle_center(&self, index: &BundleIndex<D>) -> Point<D> {
        self.bundle_point(index, 0.0)
    }

    /// World pose of the centre of bundle `min_index`.
    ///
    /// A grid re-based on this pose maps every point to `index - min_index`.
    pub fn origin_at(&self, min_index: &BundleIndex<D>) -> RigidTransform<D> {
        self.w_t_m
            .compose(&RigidTransform::from_translation(self.bundle_center(min_index)))
    }

    /// World-frame hull of the map box `[(min - ½) * br, (max + ½) * br]`.
    ///
    /// This is the union of the bundle footprints, so every added point lies
    /// inside; it differs from the lattice-corner box `[min * br, (max + 1) * br]`.
    pub fn world_bounds(&self, min_index: &BundleIndex<D>, max_index: &BundleIndex<D>) -> Bounds<D> {
        Bounds::from_corners(
            self.bundle_point(min_index, -0.5),
            self.bundle_point(max_index, 0.5),
        )
        .transformed(&self.w_t_m)
    }

    /// Map-frame extent covered by the bundle range, per axis
    pub fn extent(&self, min_index: &BundleIndex<D>, max_index: &BundleIndex<D>) -> Point<D> {
        Point::<D>::from_fn(|axis, _| {
            (max_index[axis] - min_index[axis] + 1) as f64 * self.bundle_resolution
        })
    }

    /// Map-frame centre of a sub-grid cell
    pub fn cell_center(&self, component: usize, cell: &[i32; D]) -> Point<D> {
        Point::<D>::from_fn(|axis, _| {
            let shift = if has_offset(component, axis) { -0.25 } else { 0.25 };
            (cell[axis] as f64 + shift) * self.resolution
        })
    }
}
