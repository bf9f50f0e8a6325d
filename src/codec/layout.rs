//! Storage-slot arithmetic for persisted grids
//!
//! Array `i` holds the cells of sub-grid `i`. Array 0 is `size` cells wide
//! on every axis, the others `size + 1`. Bundle indices are relative to the
//! grid's (even) min index, so they run over `[0, 2 * size)` per axis:
//!
//! ```text
//! cell_j   = div(b_j, 2) + bit_j(i) * mod(b_j, 2)
//! offset   = Σ_j cell_j * Π_{k<j} width_k        (axis 0 fastest)
//! 2D:      offset = cell_y * width_x + cell_x
//! ```
//!
//! Bundles that share a cell share its offset, and distinct cells get
//! distinct offsets. Arrays 1.. are padded on every axis, so slots along an
//! axis without that sub-grid's shift stay at their default value.

use crate::grid::{storage_index, BundleIndex};

/// Extra cells per axis for sub-grid `component`
#[inline]
pub const fn padding(component: usize) -> usize {
    if component == 0 {
        0
    } else {
        1
    }
}

/// Row width per axis of array `component`
#[inline]
pub fn widths<const D: usize>(component: usize, size: &[usize; D]) -> [usize; D] {
    std::array::from_fn(|axis| size[axis] + padding(component))
}

/// Number of entries in array `component`
pub fn storage_len<const D: usize>(component: usize, size: &[usize; D]) -> usize {
    widths(component, size).iter().product()
}

/// Linear offset of `(bundle, component)` inside array `component`.
///
/// `bundle` is relative to the grid's min index and must lie in
/// `[0, 2 * size)` on every axis.
pub fn storage_offset<const D: usize>(
    bundle: &BundleIndex<D>,
    component: usize,
    size: &[usize; D],
) -> usize {
    debug_assert!(bundle.iter().all(|&b| b >= 0));
    let cell = storage_index(bundle, component);
    let widths = widths(component, size);

    let mut offset = 0usize;
    let mut stride = 1usize;
    for axis in 0..D {
        offset += cell[axis] as usize * stride;
        stride *= widths[axis];
    }
    offset
}
