//! NDT Grid Map
//!
//! Concurrent normal-distributions-transform grid maps for 2D and 3D scan
//! registration.
//!
//! ## Core features
//! - Incremental per-cell Gaussian statistics (count, mean, scatter)
//! - 2^D staggered sub-grids shifted by a quarter cell; each bundle owns one
//!   cell of every sub-grid and neighbouring bundles share cells
//! - Sparse (hash-indexed, growable) and dense (fixed-range) storage
//! - Sparse/dense conversion and a compact record codec with file persistence
//!
//! ## Concurrency
//! - Grid structure: one `RwLock` guarding bundle insertion
//! - Cell statistics: one `Mutex` per distribution, never held two at a time
//!
//! ```no_run
//! use ndtmap::{SparseGrid2d, Transform2, Point2};
//!
//! let grid = SparseGrid2d::new(Transform2::identity(), 0.5)?;
//! grid.add(&Point2::new(1.0, 2.0));
//! let density = grid.sample(&Point2::new(1.0, 2.0));
//! # let _ = density;
//! # Ok::<(), ndtmap::StorageError>(())
//! ```

pub mod codec;
pub mod config;
pub mod conversion;
pub mod distribution;
pub mod grid;
pub mod storage;
pub mod types;

mod error;

pub use config::{CodecConfig, GridConfig, RecordFormat};
pub use error::{Result, StorageError};

pub use codec::{decode, encode, Field, GridRecord};
pub use conversion::{to_dense, to_sparse};
pub use distribution::{Distribution, Gaussian, Statistics};
pub use grid::{
    Bundle, BundleIndex, DenseGrid, DenseGrid2d, DenseGrid3d, GridGeometry, SparseGrid,
    SparseGrid2d, SparseGrid3d,
};
pub use types::{Bounds, Point, Point2, Point3, RigidTransform, Transform2, Transform3};
