//! Error types for simtrees-core

use simtrees_io::DatasetError;
use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Error from the partitioned dataset layer
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// Resource not found (config file, halo, root group)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unknown snapshot or otherwise unusable configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller-supplied argument out of range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Table columns disagree in length or shape
    #[error("Schema error: {0}")]
    Schema(String),

    /// Upstream tables violate a structural guarantee (duplicate group,
    /// cyclic descendant links, catalog row out of range)
    #[error("Data integrity error: {0}")]
    Integrity(String),
}

impl Error {
    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }

    /// Create a configuration parse error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create a schema error
    pub fn schema(msg: impl Into<String>) -> Self {
        Error::Schema(msg.into())
    }

    /// Create a data integrity error
    pub fn integrity(msg: impl Into<String>) -> Self {
        Error::Integrity(msg.into())
    }

    /// True for missing files, columns, attributes, config files and
    /// unresolvable root groups.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Dataset(err) => err.is_not_found(),
            _ => false,
        }
    }
}
