//! Error types for partitioned dataset operations.

use thiserror::Error;

/// Errors from fragment discovery, storage access and column reads.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Missing fileset, column or attribute
    #[error("Not found: {0}")]
    NotFound(String),

    /// Requested row interval does not fit the dataset
    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    /// Storage/IO error while opening or reading a fragment
    #[error("Storage error: {0}")]
    Storage(String),

    /// Column type or shape mismatch
    #[error("Schema error: {0}")]
    Schema(String),

    /// A parallel read worker could not be started or did not finish
    #[error("Worker error: {0}")]
    Worker(String),
}

impl DatasetError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_interval(msg: impl Into<String>) -> Self {
        Self::InvalidInterval(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn worker(msg: impl Into<String>) -> Self {
        Self::Worker(msg.into())
    }

    /// True for the "missing file/column/attribute" class of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(feature = "hdf5")]
impl From<hdf5::Error> for DatasetError {
    fn from(err: hdf5::Error) -> Self {
        DatasetError::Storage(format!("HDF5 error: {}", err))
    }
}

/// Result type for dataset operations.
pub type Result<T> = std::result::Result<T, DatasetError>;
