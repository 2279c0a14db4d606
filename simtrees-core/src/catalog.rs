//! Auxiliary halo property catalogs.
//!
//! Merger tree tables only link nodes; subgroup numbers, masses, positions
//! and velocities come from a halo catalog. Two kinds are supported:
//!
//! - a subfind-style catalog carrying `/Subhalo/nodeIndex`, joined to tree
//!   nodes by id ([`SubhaloCatalog`])
//! - per-snapshot catalogs addressed by row position, supplied through a
//!   [`SnapshotCatalogLoader`]

use std::sync::Arc;

use simtrees_io::{FragmentStorage, PartitionedDataset};

use crate::config::{PathResolver, SnapshotId};
use crate::error::{Error, Result};

/// Number of particle types in mass-by-type records
/// (0 gas, 1 dark matter, 2-3 boundary, 4 stars, 5 black holes).
pub const PARTICLE_TYPES: usize = 6;

pub const SUBHALO_NODE_INDEX: &str = "/Subhalo/nodeIndex";
pub const SUBHALO_SUBGROUP_NUMBER: &str = "/Subhalo/SubGroupNumber";
pub const SUBHALO_MASS_TYPE: &str = "/Subhalo/MassType";
pub const SUBHALO_CENTRE_OF_POTENTIAL: &str = "/Subhalo/CentreOfPotential";
pub const SUBHALO_VELOCITY: &str = "/Subhalo/Velocity";

/// Catalog data for one cataloged halo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HaloProperties {
    pub mass_by_type: [f64; PARTICLE_TYPES],
    pub position: [f64; 3],
    pub velocity: [f64; 3],
}

impl HaloProperties {
    /// Mass of one particle type, `None` if the type is out of range.
    #[inline]
    pub fn mass(&self, particle_type: usize) -> Option<f64> {
        self.mass_by_type.get(particle_type).copied()
    }
}

/// Row-indexed halo records: subgroup number plus properties per row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HaloRecords {
    subgroups: Vec<i64>,
    properties: Vec<HaloProperties>,
}

impl HaloRecords {
    pub fn new(
        subgroups: Vec<i64>,
        mass_by_type: Vec<[f64; PARTICLE_TYPES]>,
        positions: Vec<[f64; 3]>,
        velocities: Vec<[f64; 3]>,
    ) -> Result<Self> {
        let n = subgroups.len();
        if mass_by_type.len() != n || positions.len() != n || velocities.len() != n {
            return Err(Error::schema(format!(
                "Halo catalog columns disagree in length: {} subgroups, {} masses, {} positions, {} velocities",
                n,
                mass_by_type.len(),
                positions.len(),
                velocities.len()
            )));
        }
        let properties = mass_by_type
            .into_iter()
            .zip(positions)
            .zip(velocities)
            .map(|((mass_by_type, position), velocity)| HaloProperties {
                mass_by_type,
                position,
                velocity,
            })
            .collect();
        Ok(Self {
            subgroups,
            properties,
        })
    }

    /// Read the `/Subhalo/*` record columns of a fileset.
    pub fn read(dataset: &PartitionedDataset) -> Result<Self> {
        let subgroups = dataset.read(SUBHALO_SUBGROUP_NUMBER, None)?.into_i64()?;
        let masses = dataset
            .read(SUBHALO_MASS_TYPE, None)?
            .into_f64_rows::<PARTICLE_TYPES>()?;
        let positions = dataset
            .read(SUBHALO_CENTRE_OF_POTENTIAL, None)?
            .into_f64_rows::<3>()?;
        let velocities = dataset.read(SUBHALO_VELOCITY, None)?.into_f64_rows::<3>()?;
        Self::new(subgroups, masses, positions, velocities)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.subgroups.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subgroups.is_empty()
    }

    /// Subgroup number and properties of row `row`.
    #[inline]
    pub fn get(&self, row: usize) -> Option<(i64, &HaloProperties)> {
        Some((*self.subgroups.get(row)?, self.properties.get(row)?))
    }
}

/// Subfind-style catalog keyed by tree node id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubhaloCatalog {
    pub node_ids: Vec<i64>,
    pub records: HaloRecords,
}

impl SubhaloCatalog {
    pub fn new(node_ids: Vec<i64>, records: HaloRecords) -> Result<Self> {
        if node_ids.len() != records.len() {
            return Err(Error::schema(format!(
                "Subhalo catalog has {} node ids but {} records",
                node_ids.len(),
                records.len()
            )));
        }
        Ok(Self { node_ids, records })
    }

    pub fn read(dataset: &PartitionedDataset) -> Result<Self> {
        let node_ids = dataset.read(SUBHALO_NODE_INDEX, None)?.into_i64()?;
        let records = HaloRecords::read(dataset)?;
        tracing::debug!(
            stem = dataset.stem(),
            halos = node_ids.len(),
            "Read subhalo catalog"
        );
        Self::new(node_ids, records)
    }

    /// `(node id, subgroup number, properties)` per catalog row.
    pub fn iter(&self) -> impl Iterator<Item = (i64, i64, &HaloProperties)> + '_ {
        self.node_ids
            .iter()
            .enumerate()
            .filter_map(|(row, &id)| self.records.get(row).map(|(sg, props)| (id, sg, props)))
    }
}

/// Loads the row-indexed halo catalog of one snapshot.
pub trait SnapshotCatalogLoader {
    fn load(&self, id: &SnapshotId) -> Result<HaloRecords>;
}

impl<F> SnapshotCatalogLoader for F
where
    F: Fn(&SnapshotId) -> Result<HaloRecords>,
{
    fn load(&self, id: &SnapshotId) -> Result<HaloRecords> {
        self(id)
    }
}

/// Loads per-snapshot records from the subfind fileset each snapshot's
/// config entry names.
#[derive(Debug)]
pub struct SubfindSnapshotLoader<'a, R: PathResolver> {
    resolver: &'a R,
    storage: Arc<dyn FragmentStorage>,
    workers: usize,
}

impl<'a, R: PathResolver> SubfindSnapshotLoader<'a, R> {
    pub fn new(resolver: &'a R, storage: Arc<dyn FragmentStorage>, workers: usize) -> Self {
        Self {
            resolver,
            storage,
            workers,
        }
    }
}

impl<R: PathResolver> SnapshotCatalogLoader for SubfindSnapshotLoader<'_, R> {
    fn load(&self, id: &SnapshotId) -> Result<HaloRecords> {
        let paths = self.resolver.resolve(id)?;
        let stem = paths.subfind_stem.ok_or_else(|| {
            Error::invalid_config(format!("Snapshot {} has no subfind_stem configured", id))
        })?;
        let dataset = PartitionedDataset::open(self.storage.clone(), &paths.dir, &stem)?
            .with_workers(self.workers);
        HaloRecords::read(&dataset)
    }
}
