//! Checksum verification for persisted grid records
//!
//! Frames a payload as `[payload_len: u32][payload][checksum: u32]` so a
//! truncated or bit-flipped map file is rejected before decoding.
//!
//! ```ignore
//! use ndtmap::storage::checksum::{Checksum, ChecksumType};
//!
//! let framed = Checksum::encode_with_checksum(ChecksumType::Crc32, b"payload");
//! let payload = Checksum::decode_with_checksum(ChecksumType::Crc32, &framed)?;
//! ```

use crate::StorageError;
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

/// Checksum algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChecksumType {
    /// CRC32 (IEEE, SIMD accelerated by crc32fast)
    Crc32,
    /// No verification (tests only)
    None,
}

impl Default for ChecksumType {
    fn default() -> Self {
        Self::Crc32
    }
}

impl ChecksumType {
    pub(crate) fn to_flag(self) -> u8 {
        match self {
            Self::Crc32 => 1,
            Self::None => 0,
        }
    }

    pub(crate) fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            1 => Some(Self::Crc32),
            0 => Some(Self::None),
            _ => None,
        }
    }
}

pub struct Checksum;

impl Checksum {
    pub fn compute(checksum_type: ChecksumType, data: &[u8]) -> u32 {
        match checksum_type {
            ChecksumType::Crc32 => {
                let mut hasher = Hasher::new();
                hasher.update(data);
                hasher.finalize()
            }
            ChecksumType::None => 0,
        }
    }

    pub fn verify(
        checksum_type: ChecksumType,
        data: &[u8],
        expected: u32,
    ) -> Result<(), ChecksumError> {
        if checksum_type == ChecksumType::None {
            return Ok(());
        }

        let actual = Self::compute(checksum_type, data);
        if actual != expected {
            return Err(ChecksumError::Mismatch {
                expected,
                actual,
                data_len: data.len(),
            });
        }

        Ok(())
    }

    /// Format: `[data_len: u32][data][checksum: u32]`, little endian
    pub fn encode_with_checksum(checksum_type: ChecksumType, data: &[u8]) -> Vec<u8> {
        let checksum = Self::compute(checksum_type, data);
        let mut encoded = Vec::with_capacity(4 + data.len() + 4);
        encoded.extend_from_slice(&(data.len() as u32).to_le_bytes());
        encoded.extend_from_slice(data);
        encoded.extend_from_slice(&checksum.to_le_bytes());
        encoded
    }

    pub fn decode_with_checksum(
        checksum_type: ChecksumType,
        encoded: &[u8],
    ) -> Result<&[u8], ChecksumError> {
        let word = |bytes: &[u8]| u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if encoded.len() < 8 {
            return Err(ChecksumError::InvalidFormat(format!(
                "frame of {} bytes is shorter than its header",
                encoded.len()
            )));
        }

        let data_len = word(encoded) as usize;
        let (data, trailer) = encoded[4..].split_at(encoded.len() - 8);
        if data.len() != data_len {
            return Err(ChecksumError::InvalidFormat(format!(
                "frame declares {} payload bytes, carries {}",
                data_len,
                data.len()
            )));
        }

        Self::verify(checksum_type, data, word(trailer))?;
        Ok(data)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    #[error("Checksum mismatch: expected {expected:#010x}, got {actual:#010x} (data_len={data_len})")]
    Mismatch {
        expected: u32,
        actual: u32,
        data_len: usize,
    },

    #[error("Invalid checksum format: {0}")]
    InvalidFormat(String),
}

impl From<ChecksumError> for StorageError {
    fn from(err: ChecksumError) -> Self {
        StorageError::Corruption(err.to_string())
    }
}
