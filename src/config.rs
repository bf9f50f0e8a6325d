//! Grid and codec configuration
//!
//! Provides construction parameters for grids and the persistence options
//! for encoded records.

use crate::storage::checksum::ChecksumType;
use crate::types::RigidTransform;
use crate::{Result, StorageError};
use serde::{Deserialize, Serialize};

/// Default cell edge length (map units)
pub const DEFAULT_RESOLUTION: f64 = 1.0;

/// Grid construction parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig<const D: usize> {
    /// Edge length of one sub-grid cell
    pub resolution: f64,

    /// World pose of the map frame
    pub origin: RigidTransform<D>,
}

impl<const D: usize> Default for GridConfig<D> {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            origin: RigidTransform::identity(),
        }
    }
}

impl<const D: usize> GridConfig<D> {
    pub fn new(resolution: f64) -> Self {
        Self {
            resolution,
            ..Default::default()
        }
    }

    pub fn with_resolution(mut self, resolution: f64) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_origin(mut self, origin: RigidTransform<D>) -> Self {
        self.origin = origin;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            return Err(StorageError::InvalidArgument(format!(
                "resolution must be finite and positive, got {}",
                self.resolution
            )));
        }
        Ok(())
    }
}

/// Payload encoding of a persisted record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordFormat {
    /// bincode
    Binary,
    /// serde_json, for inspection and diffing
    Json,
}

impl Default for RecordFormat {
    fn default() -> Self {
        RecordFormat::Binary
    }
}

/// Persistence options for grid records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    pub format: RecordFormat,

    /// Snappy-compress the payload
    pub compression: bool,

    pub checksum: ChecksumType,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self::compact()
    }
}

impl CodecConfig {
    /// Binary + snappy + CRC32
    pub fn compact() -> Self {
        Self {
            format: RecordFormat::Binary,
            compression: true,
            checksum: ChecksumType::Crc32,
        }
    }

    /// JSON, uncompressed, CRC32
    pub fn readable() -> Self {
        Self {
            format: RecordFormat::Json,
            compression: false,
            checksum: ChecksumType::Crc32,
        }
    }

    pub fn with_format(mut self, format: RecordFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    pub fn with_checksum(mut self, checksum: ChecksumType) -> Self {
        self.checksum = checksum;
        self
    }
}
