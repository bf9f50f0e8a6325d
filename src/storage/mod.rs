//! Storage backends shared by the grid variants

pub mod checksum;
pub mod index;

pub use checksum::{Checksum, ChecksumError, ChecksumType};
pub use index::IndexStorage;
