//! Partitioned column reads for simulation output files.
//!
//! Simulation codes write large tables (halo merger trees, subhalo catalogs)
//! split across numbered fragment files. This crate presents such a fileset
//! as one logical, randomly sliceable column store.
//!
//! # Features
//!
//! - `hdf5` - Enables [`Hdf5Storage`] (links against the system libhdf5)
//!
//! # Architecture
//!
//! - [`column`] - Typed column slices and attribute values
//! - [`storage`] - Fragment storage trait, in-memory and call-tracking backends
//! - [`dataset`] - Fragment discovery, interval planning and parallel reads
//! - `hdf5_storage` - HDF5 fragment backend (`hdf5` feature)
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use simtrees_io::{Hdf5Storage, PartitionedDataset, RowInterval};
//!
//! let ds = PartitionedDataset::open(Arc::new(Hdf5Storage::new()), "/data/treedir_028", "tree_028")?
//!     .with_workers(4);
//! let ids = ds.read("/haloTrees/nodeIndex", Some(RowInterval::new(0, 1000)?))?.into_i64()?;
//! ```

pub mod column;
pub mod dataset;
pub mod error;
#[cfg(feature = "hdf5")]
pub mod hdf5_storage;
pub mod storage;

pub use column::{AttributeValue, Column, ColumnData, ColumnInfo, ColumnKind};
pub use dataset::{PartitionedDataset, RowInterval, DEFAULT_EXTENSION};
pub use error::{DatasetError, Result};
pub use storage::{FragmentStorage, MemoryFragment, MemoryStorage, TrackingStorage};

#[cfg(feature = "hdf5")]
pub use hdf5_storage::Hdf5Storage;
