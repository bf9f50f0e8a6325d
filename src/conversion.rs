//! Sparse ⇄ dense grid conversion
//!
//! Both directions copy cell statistics verbatim (no refitting), keep the
//! resolution and the initial world origin, and address bundles by their
//! absolute index.

use crate::grid::{BundleIndex, DenseGrid, SparseGrid};
use crate::{Result, StorageError};
use tracing::debug;

/// Smallest even-aligned dense range enclosing `[min, max]` bundles.
///
/// Returns `(min_index, size)` with `size` in sub-grid-0 cells.
pub fn enclosing_range<const D: usize>(
    min: &BundleIndex<D>,
    max: &BundleIndex<D>,
) -> (BundleIndex<D>, [usize; D]) {
    let mut min_index = [0i32; D];
    let mut size = [0usize; D];
    for axis in 0..D {
        let lo = i64::from(min[axis]).div_euclid(2) * 2;
        // ceil(max / 2) * 2 + 1
        let hi = -(-i64::from(max[axis])).div_euclid(2) * 2 + 1;
        min_index[axis] = lo as i32;
        size[axis] = ((hi - lo + 1) / 2) as usize;
    }
    (min_index, size)
}

/// Materialize a sparse grid over the enclosing even-aligned range
pub fn to_dense<const D: usize>(src: &SparseGrid<D>) -> Result<DenseGrid<D>> {
    let (min, max) = match (src.get_min_index(), src.get_max_index()) {
        (Some(min), Some(max)) => (min, max),
        _ => {
            return Err(StorageError::InvalidArgument(
                "cannot convert an empty sparse grid to a dense grid".into(),
            ))
        }
    };

    let (min_index, size) = enclosing_range(&min, &max);
    let dst = DenseGrid::new(src.get_initial_origin(), src.get_resolution(), size, min_index)?;

    let bundles = src.bundles();
    for (index, bundle) in &bundles {
        dst.get_distribution_bundle(index)?.copy_from(bundle);
    }

    debug!(bundles = bundles.len(), ?size, ?min_index, "converted sparse grid to dense");
    Ok(dst)
}

/// Copy every touched bundle of a dense grid into a fresh sparse grid
pub fn to_sparse<const D: usize>(src: &DenseGrid<D>) -> Result<SparseGrid<D>> {
    let dst = SparseGrid::new(src.get_initial_origin(), src.get_resolution())?;

    let mut copied = 0usize;
    src.traverse(|index, bundle| {
        if bundle.is_touched() {
            dst.get_or_insert_bundle(*index).copy_from(bundle);
            copied += 1;
        }
    });

    debug!(bundles = copied, "converted dense grid to sparse");
    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::SparseGrid2d;
    use crate::types::{Point2, Transform2};

    fn populated() -> SparseGrid2d {
        let g = SparseGrid::new(Transform2::planar(0.5, -0.25, 0.3), 0.5).unwrap();
        for i in 0..300 {
            let t = i as f64 * 0.173;
            g.add(&Point2::new(3.0 * t.cos() - 1.0, 2.0 * (1.7 * t).sin() + 0.4));
        }
        g
    }

    #[test]
    fn test_enclosing_range() {
        assert_eq!(enclosing_range(&[0, 0], &[0, 0]), ([0, 0], [1, 1]));
        assert_eq!(enclosing_range(&[-3, 1], &[4, 1]), ([-4, 0], [5, 2]));
        assert_eq!(enclosing_range(&[-1, -2], &[-1, -2]), ([-2, -2], [2, 1]));
        // the range always covers the input
        for lo in -5..5 {
            for hi in lo..lo + 6 {
                let (min, size) = enclosing_range(&[lo], &[hi]);
                assert_eq!(min[0] % 2, 0);
                assert!(min[0] <= lo);
                assert!(min[0] + 2 * size[0] as i32 - 1 >= hi);
            }
        }
    }

    #[test]
    fn test_sparse_to_dense_preserves_statistics() {
        let sparse = populated();
        let dense = to_dense(&sparse).unwrap();

        assert_eq!(dense.get_resolution(), sparse.get_resolution());
        assert_eq!(dense.get_initial_origin(), sparse.get_initial_origin());

        for (index, bundle) in sparse.bundles() {
            let target = dense.get_distribution_bundle(&index).unwrap();
            assert_eq!(target.snapshot(), bundle.snapshot());
        }

        let probe = Point2::new(2.0, 0.4);
        assert_eq!(dense.sample(&probe).unwrap(), sparse.sample(&probe));
    }

    #[test]
    fn test_round_trip_both_directions() {
        let sparse = populated();
        let before: Vec<_> = sparse
            .bundles()
            .into_iter()
            .map(|(i, b)| (i, b.snapshot()))
            .collect();

        let dense = to_dense(&sparse).unwrap();
        let back = to_sparse(&dense).unwrap();
        let dense_again = to_dense(&back).unwrap();

        // neighbours sharing a touched cell are materialized too
        assert!(back.bundle_count() >= sparse.bundle_count());
        assert_eq!(back.get_resolution(), sparse.get_resolution());
        assert_eq!(back.get_initial_origin(), sparse.get_initial_origin());
        assert_eq!(dense_again.get_resolution(), dense.get_resolution());
        assert_eq!(dense_again.get_initial_origin(), dense.get_initial_origin());

        for (index, stats) in &before {
            assert_eq!(&back.get_distribution_bundle(index).unwrap().snapshot(), stats);
            assert_eq!(&dense_again.get_distribution_bundle(index).unwrap().snapshot(), stats);
        }
    }

    #[test]
    fn test_round_trip_dense_first() {
        let origin = Transform2::planar(-1.0, 2.0, -0.7);
        let dense = DenseGrid::<2>::new(origin, 0.5, [4, 3], [-4, -2]).unwrap();
        // map-frame coverage is [-1.125, 0.875] x [-0.625, 0.875]
        for i in 0..200 {
            let t = i as f64 * 0.211;
            let p_m = Point2::new(-0.1 + 0.9 * t.sin(), 0.1 + 0.6 * (0.7 * t).cos());
            dense.add(&origin.transform_point(&p_m)).unwrap();
        }

        let mut touched = Vec::new();
        dense.traverse(|index, bundle| {
            if bundle.is_touched() {
                touched.push((*index, bundle.snapshot()));
            }
        });
        assert!(!touched.is_empty());

        let sparse = to_sparse(&dense).unwrap();
        let dense_again = to_dense(&sparse).unwrap();
        let sparse_again = to_sparse(&dense_again).unwrap();

        assert_eq!(sparse.bundle_count(), touched.len());
        assert_eq!(sparse_again.bundle_count(), touched.len());
        for grid_origin in [
            sparse.get_initial_origin(),
            dense_again.get_initial_origin(),
            sparse_again.get_initial_origin(),
        ] {
            assert_eq!(grid_origin, dense.get_initial_origin());
        }
        assert_eq!(dense_again.get_resolution(), dense.get_resolution());
        assert_eq!(sparse_again.get_resolution(), dense.get_resolution());

        for (index, stats) in &touched {
            assert_eq!(&sparse.get_distribution_bundle(index).unwrap().snapshot(), stats);
            assert_eq!(&dense_again.get_distribution_bundle(index).unwrap().snapshot(), stats);
            assert_eq!(&sparse_again.get_distribution_bundle(index).unwrap().snapshot(), stats);
        }
    }

    #[test]
    fn test_empty_sparse_rejected() {
        let empty = SparseGrid2d::new(Transform2::identity(), 1.0).unwrap();
        assert!(matches!(to_dense(&empty), Err(StorageError::InvalidArgument(_))));
    }

    #[test]
    fn test_untouched_dense_stays_empty() {
        let dense = DenseGrid::<2>::new(Transform2::identity(), 1.0, [2, 2], [0, 0]).unwrap();
        let sparse = to_sparse(&dense).unwrap();
        assert!(sparse.is_empty());
    }
}
