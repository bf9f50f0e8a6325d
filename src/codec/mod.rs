//! Compact persistence of dense grids
//!
//! A dense grid is flattened into a [`GridRecord`]: the origin pose, the
//! resolution, the size, then one statistics array per sub-grid. Cells shared
//! between neighbouring bundles are written once, so decoding restores the
//! sharing exactly.
//!
//! Cell statistics are world-frame, so re-anchoring the decoded grid at its
//! min bundle leaves them untouched.

pub mod layout;
pub mod record;

pub use record::{Field, GridRecord};

use crate::config::CodecConfig;
use crate::distribution::Statistics;
use crate::grid::{components, DenseGrid};
use crate::types::RigidTransform;
use crate::{Result, StorageError};
use layout::{storage_len, storage_offset};
use std::path::Path;
use tracing::debug;

/// Flatten a dense grid into a record
pub fn encode<const D: usize>(grid: &DenseGrid<D>) -> GridRecord<D> {
    let size = grid.get_size();
    let min_index = grid.get_min_index();

    let mut arrays: Vec<Vec<Statistics<D>>> = (0..components(D))
        .map(|i| vec![Statistics::default(); storage_len(i, &size)])
        .collect();

    grid.traverse(|index, bundle| {
        let relative: [i32; D] = std::array::from_fn(|axis| index[axis] - min_index[axis]);
        for (i, array) in arrays.iter_mut().enumerate() {
            let offset = storage_offset(&relative, i, &size);
            if array[offset].is_empty() {
                array[offset] = bundle.at(i).snapshot();
            }
        }
    });

    let mut fields = Vec::with_capacity(GridRecord::<D>::expected_len());
    fields.push(Field::Pose(grid.get_origin()));
    fields.push(Field::Scalar(grid.get_resolution()));
    fields.push(Field::Size(size.to_vec()));
    fields.extend(arrays.into_iter().map(Field::Storage));
    GridRecord::new(fields)
}

/// Rebuild a dense grid from a record.
///
/// The record is fully validated before the grid is allocated. The decoded
/// grid is anchored at bundle index zero with the recorded pose as origin.
pub fn decode<const D: usize>(record: &GridRecord<D>) -> Result<DenseGrid<D>> {
    let (origin, resolution, size, arrays) = validate(record)?;

    let grid = DenseGrid::new(origin, resolution, size, [0; D])?;
    grid.traverse(|relative, bundle| {
        for (i, array) in arrays.iter().enumerate() {
            let statistics = &array[storage_offset(relative, i, &size)];
            if !statistics.is_empty() && !bundle.at(i).is_touched() {
                bundle.at(i).replace(statistics.clone());
            }
        }
    });

    debug!(?size, resolution, "decoded dense grid");
    Ok(grid)
}

fn validate<const D: usize>(
    record: &GridRecord<D>,
) -> Result<(RigidTransform<D>, f64, [usize; D], Vec<&[Statistics<D>]>)> {
    let expected = GridRecord::<D>::expected_len();
    if record.len() != expected {
        return Err(StorageError::MalformedRecord(format!(
            "expected {} fields, got {}",
            expected,
            record.len()
        )));
    }

    let fields = record.fields();
    let origin = match &fields[0] {
        Field::Pose(pose) => *pose,
        other => return Err(unexpected(0, "pose", other)),
    };
    let resolution = match &fields[1] {
        Field::Scalar(resolution) => *resolution,
        other => return Err(unexpected(1, "scalar", other)),
    };
    let size: [usize; D] = match &fields[2] {
        Field::Size(size) => size.as_slice().try_into().map_err(|_| {
            StorageError::MalformedRecord(format!(
                "size has {} entries, expected {}",
                size.len(),
                D
            ))
        })?,
        other => return Err(unexpected(2, "size", other)),
    };
    if size.iter().any(|&s| s == 0) {
        return Err(StorageError::MalformedRecord(format!(
            "size must be positive on every axis, got {:?}",
            size
        )));
    }

    let mut arrays = Vec::with_capacity(components(D));
    for (i, field) in fields[3..].iter().enumerate() {
        let array = match field {
            Field::Storage(array) => array.as_slice(),
            other => return Err(unexpected(3 + i, "storage", other)),
        };
        let len = size
            .iter()
            .try_fold(1usize, |acc, &s| acc.checked_mul(s + layout::padding(i)))
            .ok_or_else(|| StorageError::MalformedRecord(format!("size {:?} overflows", size)))?;
        if array.len() != len {
            return Err(StorageError::MalformedRecord(format!(
                "storage array {} has {} entries, expected {}",
                i,
                array.len(),
                len
            )));
        }
        arrays.push(array);
    }

    Ok((origin, resolution, size, arrays))
}

fn unexpected<const D: usize>(position: usize, expected: &str, found: &Field<D>) -> StorageError {
    StorageError::MalformedRecord(format!(
        "field {} should be {}, found {}",
        position,
        expected,
        found.kind()
    ))
}

/// Encode a dense grid and write it to `path`
pub fn save<const D: usize, P: AsRef<Path>>(
    grid: &DenseGrid<D>,
    path: P,
    config: &CodecConfig,
) -> Result<()> {
    encode(grid).save(path, config)
}

/// Read a record from `path` and decode it
pub fn load<const D: usize, P: AsRef<Path>>(path: P) -> Result<DenseGrid<D>> {
    decode(&GridRecord::load(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecordFormat;
    use crate::types::{Point2, Point3, Transform2, Transform3};

    fn populated_grid() -> DenseGrid<2> {
        let origin = Transform2::planar(0.5, -1.0, 0.3);
        let grid = DenseGrid::new(origin, 0.5, [3, 2], [-2, 0]).unwrap();
        // map-frame coverage is [-0.625, 0.875] x [-0.125, 0.875]
        for i in 0..60 {
            let t = i as f64 * 0.173;
            let p_m = Point2::new(0.125 + (t * 1.7).sin() * 0.6, 0.375 + (t * 0.9).cos() * 0.45);
            grid.add(&origin.transform_point(&p_m)).unwrap();
        }
        grid
    }

    /// `b` is `a` decoded: same cells, anchored at bundle zero
    fn assert_same_statistics<const D: usize>(a: &DenseGrid<D>, b: &DenseGrid<D>) {
        let min_a = a.get_min_index();
        let mut bundles = Vec::new();
        a.traverse(|index, bundle| bundles.push((*index, bundle.snapshot())));
        for (index, stats) in bundles {
            let relative: [i32; D] = std::array::from_fn(|axis| index[axis] - min_a[axis]);
            let other = b.get_distribution_bundle(&relative).unwrap();
            assert_eq!(other.snapshot(), stats, "bundle {:?}", index);
        }
    }

    #[test]
    fn test_encode_shape() {
        let grid = populated_grid();
        let record = encode(&grid);
        assert_eq!(record.len(), 7);

        match &record.fields()[2] {
            Field::Size(size) => assert_eq!(size, &vec![3, 2]),
            other => panic!("unexpected field {:?}", other),
        }
        let lengths: Vec<usize> = record.fields()[3..]
            .iter()
            .map(|f| match f {
                Field::Storage(a) => a.len(),
                _ => 0,
            })
            .collect();
        assert_eq!(lengths, vec![6, 12, 12, 12]);
    }

    #[test]
    fn test_roundtrip_preserves_statistics_and_samples() {
        let grid = populated_grid();
        let decoded = decode(&encode(&grid)).unwrap();

        assert_eq!(decoded.get_size(), grid.get_size());
        assert_eq!(decoded.get_min_index(), [0, 0]);
        assert_eq!(decoded.get_resolution(), grid.get_resolution());
        assert_eq!(decoded.get_origin(), grid.get_origin());
        assert_eq!(decoded.get_initial_origin(), grid.get_origin());
        assert_same_statistics(&grid, &decoded);

        let mut touched = 0;
        grid.traverse(|_, bundle| touched += bundle.iter().filter(|d| d.is_touched()).count());
        assert!(touched > 0);

        let origin = grid.get_initial_origin();
        for p_m in [Point2::new(-0.1, 0.3), Point2::new(0.3, 0.6), Point2::new(0.6, 0.1)] {
            let p = origin.transform_point(&p_m);
            assert_eq!(decoded.sample(&p).unwrap(), grid.sample(&p).unwrap(), "at {:?}", p);
        }

        // encoding the decoded grid yields the same record
        assert_eq!(encode(&decoded).fields()[2..], encode(&grid).fields()[2..]);
    }

    #[test]
    fn test_roundtrip_restores_sharing() {
        let grid = populated_grid();
        let decoded = decode(&encode(&grid)).unwrap();
        let a = decoded.get_distribution_bundle(&[0, 0]).unwrap();
        let b = decoded.get_distribution_bundle(&[1, 0]).unwrap();
        assert!(a.shares_component(b, 0));
        assert!(!a.shares_component(b, 1));
    }

    #[test]
    fn test_roundtrip_3d() {
        let grid = DenseGrid::new(Transform3::identity(), 1.0, [1, 2, 1], [0, -2, 0]).unwrap();
        for i in 0..40 {
            let t = i as f64 * 0.31;
            grid.add(&Point3::new(0.2 + 0.3 * t.sin(), -0.5 + 0.6 * t.cos(), 0.4 + 0.02 * t))
                .unwrap();
        }
        let record = encode(&grid);
        assert_eq!(record.len(), 11);
        let decoded = decode(&record).unwrap();
        assert_same_statistics(&grid, &decoded);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        let record = encode(&populated_grid());

        let mut short = record.clone();
        short.fields_mut().pop();
        assert!(matches!(decode(&short), Err(StorageError::MalformedRecord(_))));

        let mut swapped = record.clone();
        swapped.fields_mut().swap(0, 1);
        assert!(matches!(decode(&swapped), Err(StorageError::MalformedRecord(_))));

        let mut bad_size = record.clone();
        bad_size.fields_mut()[2] = Field::Size(vec![3, 2, 1]);
        assert!(matches!(decode(&bad_size), Err(StorageError::MalformedRecord(_))));

        let mut zero_size = record.clone();
        zero_size.fields_mut()[2] = Field::Size(vec![0, 2]);
        assert!(matches!(decode(&zero_size), Err(StorageError::MalformedRecord(_))));

        let mut bad_array = record.clone();
        if let Field::Storage(array) = &mut bad_array.fields_mut()[4] {
            array.pop();
        }
        assert!(matches!(decode(&bad_array), Err(StorageError::MalformedRecord(_))));

        let mut bad_resolution = record;
        bad_resolution.fields_mut()[1] = Field::Scalar(-1.0);
        assert!(matches!(decode(&bad_resolution), Err(StorageError::InvalidArgument(_))));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let grid = populated_grid();

        for (name, config) in [
            ("compact.ndt", CodecConfig::compact()),
            ("readable.json", CodecConfig::readable()),
            ("plain.ndt", CodecConfig::default().with_compression(false)),
            ("json.snappy", CodecConfig::default().with_format(RecordFormat::Json)),
        ] {
            let path = temp_dir.path().join(name);
            save(&grid, &path, &config).unwrap();
            let loaded: DenseGrid<2> = load(&path).unwrap();
            assert_same_statistics(&grid, &loaded);
        }
    }
}
