//! Error types for the NDT map engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Dense grid addressed outside its declared bundle range
    #[error("Bundle index {index:?} out of bounds [{min:?}, {max:?}]")]
    OutOfBounds {
        index: Vec<i32>,
        min: Vec<i32>,
        max: Vec<i32>,
    },

    /// Persisted record with wrong field count, field kind or array size
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Data corruption: {0}")]
    Corruption(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl StorageError {
    pub(crate) fn out_of_bounds(index: &[i32], min: &[i32], max: &[i32]) -> Self {
        StorageError::OutOfBounds {
            index: index.to_vec(),
            min: min.to_vec(),
            max: max.to_vec(),
        }
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
