//! Halo catalog index and merger tree reconstruction.
//!
//! Reads flat merger tree tables through [`simtrees_io`], joins them with a
//! halo property catalog and rebuilds the progenitor tree of any cataloged
//! halo, named by its (snapshot, group, subgroup) identity.
//!
//! # Architecture
//!
//! - [`config`] - Snapshot identifiers and path resolution (TOML path config)
//! - [`catalog`] - Subfind and per-snapshot halo property catalogs
//! - [`index`] - [`HaloCatalogIndex`]: node linkage, catalog maps, mass filter
//! - [`tree`] - [`TreeBuilder`] and [`Tree`]: progenitor expansion and trunks
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use simtrees_core::{
//!     CatalogSource, GroupIdentity, HaloCatalogIndex, IndexOptions, PathConfig, SnapshotId,
//!     TreeBuilder,
//! };
//!
//! let config = PathConfig::load("snapshots.toml")?;
//! let snapshot = SnapshotId::new("L0012N0188_REFERENCE", 28);
//! let mut index = HaloCatalogIndex::build(
//!     &snapshot,
//!     &config,
//!     Arc::new(simtrees_io::Hdf5Storage::new()),
//!     &IndexOptions::default().with_workers(4),
//!     CatalogSource::Subfind,
//! )?;
//! index.mass_filter(1.0, 1)?;
//!
//! let trunk = TreeBuilder::new(&index).build_trunk(&GroupIdentity::new(28, 0, 0))?;
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod index;
pub mod tree;

pub use catalog::{
    HaloProperties, HaloRecords, SnapshotCatalogLoader, SubfindSnapshotLoader, SubhaloCatalog,
    PARTICLE_TYPES,
};
pub use config::{PathConfig, PathResolver, SnapshotId, SnapshotPaths};
pub use error::{Error, Result};
pub use index::{
    CatalogSource, FilterSummary, GroupIdentity, HaloCatalogIndex, IndexOptions, NodeId,
    NodeTable, DEFAULT_PHANTOM_THRESHOLD,
};
pub use tree::{build_tree, Tree, TreeBuilder, TreeNode};
