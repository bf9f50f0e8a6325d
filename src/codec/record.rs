//! Structured grid records and their byte/file encoding
//!
//! A record is an ordered list of typed fields:
//!
//! ```text
//! [Pose(origin), Scalar(resolution), Size(size), Storage(array_0), ..., Storage(array_{2^D-1})]
//! ```
//!
//! On disk:
//!
//! ```text
//! ┌──────┬─────────┬───────┬──────────┬──────────────────────────────────────┐
//! │ NDTM │ version │ flags │ checksum │ [len: u32][payload][crc32: u32]      │
//! │ 4 B  │ 1 B     │ 1 B   │ 1 B      │ payload = bincode|json (+ snappy)    │
//! └──────┴─────────┴───────┴──────────┴──────────────────────────────────────┘
//! ```

use crate::config::{CodecConfig, RecordFormat};
use crate::distribution::Statistics;
use crate::grid::components;
use crate::storage::checksum::{Checksum, ChecksumType};
use crate::types::RigidTransform;
use crate::{Result, StorageError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

const MAGIC: &[u8; 4] = b"NDTM";
const VERSION: u8 = 1;
const HEADER_LEN: usize = 7;

const FLAG_JSON: u8 = 0b01;
const FLAG_SNAPPY: u8 = 0b10;

/// One typed record field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Field<const D: usize> {
    Pose(RigidTransform<D>),
    Scalar(f64),
    Size(Vec<usize>),
    Storage(Vec<Statistics<D>>),
}

impl<const D: usize> Field<D> {
    pub fn kind(&self) -> &'static str {
        match self {
            Field::Pose(_) => "pose",
            Field::Scalar(_) => "scalar",
            Field::Size(_) => "size",
            Field::Storage(_) => "storage",
        }
    }
}

/// Ordered field sequence describing one dense grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GridRecord<const D: usize> {
    fields: Vec<Field<D>>,
}

impl<const D: usize> GridRecord<D> {
    pub fn new(fields: Vec<Field<D>>) -> Self {
        Self { fields }
    }

    /// Field count of a well-formed record
    pub const fn expected_len() -> usize {
        3 + components(D)
    }

    pub fn fields(&self) -> &[Field<D>] {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Vec<Field<D>> {
        &mut self.fields
    }

    pub fn into_fields(self) -> Vec<Field<D>> {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_bytes(&self, config: &CodecConfig) -> Result<Vec<u8>> {
        let mut payload = match config.format {
            RecordFormat::Binary => bincode::serialize(self)?,
            RecordFormat::Json => serde_json::to_vec(self)?,
        };

        let mut flags = 0u8;
        if config.format == RecordFormat::Json {
            flags |= FLAG_JSON;
        }
        if config.compression {
            flags |= FLAG_SNAPPY;
            payload = snap::raw::Encoder::new()
                .compress_vec(&payload)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
        }

        let framed = Checksum::encode_with_checksum(config.checksum, &payload);
        let mut bytes = Vec::with_capacity(HEADER_LEN + framed.len());
        bytes.extend_from_slice(MAGIC);
        bytes.push(VERSION);
        bytes.push(flags);
        bytes.push(config.checksum.to_flag());
        bytes.extend_from_slice(&framed);
        Ok(bytes)
    }

    /// Parse bytes written by [`GridRecord::to_bytes`]; the header carries
    /// the format, compression and checksum settings.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
            warn!(len = bytes.len(), "rejected record without NDTM header");
            return Err(StorageError::Corruption("missing NDTM header".into()));
        }
        if bytes[4] != VERSION {
            return Err(StorageError::Corruption(format!(
                "unsupported record version {}",
                bytes[4]
            )));
        }
        let flags = bytes[5];
        let checksum = ChecksumType::from_flag(bytes[6]).ok_or_else(|| {
            StorageError::Corruption(format!("unknown checksum flag {}", bytes[6]))
        })?;

        let payload = Checksum::decode_with_checksum(checksum, &bytes[HEADER_LEN..]).map_err(|e| {
            warn!(error = %e, "record checksum verification failed");
            StorageError::from(e)
        })?;

        let decompressed;
        let payload = if flags & FLAG_SNAPPY != 0 {
            decompressed = snap::raw::Decoder::new()
                .decompress_vec(payload)
                .map_err(|e| StorageError::Corruption(e.to_string()))?;
            decompressed.as_slice()
        } else {
            payload
        };

        let record: Self = if flags & FLAG_JSON != 0 {
            serde_json::from_slice(payload)?
        } else {
            bincode::deserialize(payload)?
        };
        Ok(record)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P, config: &CodecConfig) -> Result<()> {
        let bytes = self.to_bytes(config)?;
        fs::write(path.as_ref(), &bytes)?;
        debug!(path = %path.as_ref().display(), bytes = bytes.len(), "saved grid record");
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        debug!(path = %path.as_ref().display(), bytes = bytes.len(), "loading grid record");
        Self::from_bytes(&bytes)
    }
}
